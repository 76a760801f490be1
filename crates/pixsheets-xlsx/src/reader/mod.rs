//! XLSX reader

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::document::XlsxDocument;
use crate::error::{XlsxError, XlsxResult};
use crate::package::{rels_path_for, resolve_target, XlsxPackage};
use crate::rels::{parse_relationships, Relationship, REL_OFFICE_DOCUMENT, REL_SHARED_STRINGS};
use pixsheets_core::{CellAddress, CellError, CellValue, SharedString, Workbook, Worksheet};

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// Decode the `_xHHHH_` escapes Excel writes for characters XML cannot carry
/// (`_x000d_` for CR, `_x005f_` for a literal underscore, ...).
fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &candidate[7..];
            }
            None => {
                result.push('_');
                rest = &candidate[1..];
            }
        }
    }

    result.push_str(rest);
    result
}

/// Text collected for a `<c>` element while its children stream past
#[derive(Default)]
struct PendingCell {
    row: u32,
    col: u16,
    cell_type: Option<String>,
    value: Option<String>,
    formula: Option<String>,
    inline: Option<String>,
}

/// Which text-bearing element the parser is currently inside
#[derive(Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    None,
    Value,
    Formula,
    InlineText,
}

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a document from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<XlsxDocument> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a document from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<XlsxDocument> {
        let package = XlsxPackage::from_archive(reader)?;
        Self::read_package(package)
    }

    /// Parse the workbook held in an already loaded package
    pub fn read_package(package: XlsxPackage) -> XlsxResult<XlsxDocument> {
        // Verify this is an XLSX file
        if !package.contains("[Content_Types].xml") {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let workbook_part = Self::find_workbook_part(&package)?;
        let workbook_rels = Self::read_rels(&package, &workbook_part)?;

        // Read shared strings (if present)
        let shared_strings_part = workbook_rels
            .iter()
            .find(|r| r.rel_type == REL_SHARED_STRINGS || r.rel_type.ends_with("/sharedStrings"))
            .map(|r| resolve_target(&workbook_part, &r.target))
            .unwrap_or_else(|| "xl/sharedStrings.xml".to_string());
        let shared_strings = match package.part(&shared_strings_part) {
            Some(data) => Self::read_shared_strings(data)?,
            None => Vec::new(),
        };

        // Read workbook.xml to get sheet names and rIds
        let workbook_xml = package
            .part(&workbook_part)
            .ok_or_else(|| XlsxError::MissingPart(workbook_part.clone()))?;
        let sheet_info = Self::read_workbook_xml(workbook_xml)?;

        let mut workbook = Workbook::empty();
        let mut sheet_parts = Vec::with_capacity(sheet_info.len());

        // Every `<sheet>` gets a worksheet so indices follow the tab order.
        // Sheets without readable cells are kept empty.
        for (name, r_id) in &sheet_info {
            let sheet_idx = workbook.add_worksheet_with_name(name)?;

            let Some(rel) = workbook_rels.iter().find(|r| &r.id == r_id) else {
                log::warn!("sheet '{}' references unknown relationship {}, read as empty", name, r_id);
                sheet_parts.push(None);
                continue;
            };
            if !rel.rel_type.ends_with("/worksheet") {
                // Chartsheets and dialog sheets carry no cells
                log::debug!("sheet '{}' is not a worksheet ({}), read as empty", name, rel.rel_type);
                sheet_parts.push(None);
                continue;
            }

            let path = resolve_target(&workbook_part, &rel.target);
            let Some(data) = package.part(&path) else {
                log::warn!("sheet '{}' part {} is missing, read as empty", name, path);
                sheet_parts.push(None);
                continue;
            };

            Self::read_worksheet(
                data,
                workbook.try_worksheet_mut(sheet_idx)?,
                &shared_strings,
            )?;
            sheet_parts.push(Some(path));
        }

        log::debug!(
            "read workbook {} with {} worksheet(s)",
            workbook_part,
            workbook.sheet_count()
        );

        Ok(XlsxDocument::from_parts(
            workbook,
            package,
            workbook_part,
            sheet_parts,
        ))
    }

    /// Locate the main workbook part through the package relationships
    fn find_workbook_part(package: &XlsxPackage) -> XlsxResult<String> {
        let root_rels = match package.part("_rels/.rels") {
            Some(data) => parse_relationships(data)?,
            None => Vec::new(),
        };

        let part = root_rels
            .iter()
            .find(|r| r.rel_type == REL_OFFICE_DOCUMENT || r.rel_type.ends_with("/officeDocument"))
            .map(|r| resolve_target("", &r.target))
            .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());

        if package.contains(&part) {
            Ok(part)
        } else {
            Err(XlsxError::MissingPart(part))
        }
    }

    fn read_rels(package: &XlsxPackage, part: &str) -> XlsxResult<Vec<Relationship>> {
        match package.part(&rels_path_for(part)) {
            Some(data) => parse_relationships(data),
            None => Ok(Vec::new()),
        }
    }

    /// Read the shared string table. Rich text runs are concatenated and
    /// phonetic (`rPh`) text is dropped.
    fn read_shared_strings(data: &[u8]) -> XlsxResult<Vec<SharedString>> {
        let mut xml_reader = Reader::from_reader(data);

        let mut buf = Vec::new();
        let mut strings = Vec::new();
        let mut current_string = String::new();
        let mut in_si = false;
        let mut in_t = false;
        let mut in_rph = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_string.clear();
                    }
                    b"rPh" => in_rph = true,
                    b"t" if in_si && !in_rph => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                    strings.push(SharedString::new(""));
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        strings.push(SharedString::new(decode_excel_escapes(&current_string)));
                        current_string.clear();
                        in_si = false;
                    }
                    b"rPh" => in_rph = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    current_string.push_str(&e.unescape()?);
                }
                Ok(Event::CData(e)) if in_t => {
                    current_string.push_str(&String::from_utf8_lossy(&e));
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read workbook.xml to get sheet names and rIds, in tab order
    fn read_workbook_xml(data: &[u8]) -> XlsxResult<Vec<(String, String)>> {
        let mut xml_reader = Reader::from_reader(data);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"sheet" =>
                {
                    let mut name = None;
                    let mut r_id = None;

                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"name" {
                            name = attr.unescape_value().ok().map(|s| s.to_string());
                        } else if attr.key.prefix().is_some()
                            && attr.key.local_name().as_ref() == b"id"
                        {
                            r_id = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                    }

                    if let (Some(name), Some(r_id)) = (name, r_id) {
                        sheets.push((name, r_id));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(sheets)
    }

    /// Read one worksheet's `sheetData` into `sheet`
    fn read_worksheet(
        data: &[u8],
        sheet: &mut Worksheet,
        shared_strings: &[SharedString],
    ) -> XlsxResult<()> {
        let mut xml_reader = Reader::from_reader(data);

        let mut buf = Vec::new();
        let mut current_row: Option<u32> = None;
        let mut next_col: u16 = 0;
        let mut cell: Option<PendingCell> = None;
        let mut target = TextTarget::None;
        let mut in_rph = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"row" => {
                        let row = Self::row_index(&e, current_row)?;
                        current_row = Some(row);
                        next_col = 0;
                    }
                    b"c" => {
                        let (row, col) = Self::cell_position(&e, current_row, next_col)?;
                        next_col = col.saturating_add(1);
                        cell = Some(PendingCell {
                            row,
                            col,
                            cell_type: Self::attr_string(&e, b"t"),
                            ..Default::default()
                        });
                    }
                    b"v" if cell.is_some() => target = TextTarget::Value,
                    b"f" if cell.is_some() => {
                        target = TextTarget::Formula;
                        if let Some(c) = cell.as_mut() {
                            c.formula.get_or_insert_with(String::new);
                        }
                    }
                    b"is" => {
                        if let Some(c) = cell.as_mut() {
                            c.inline.get_or_insert_with(String::new);
                        }
                    }
                    b"rPh" => in_rph = true,
                    b"t" if cell.is_some() && !in_rph => target = TextTarget::InlineText,
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"row" => {
                        current_row = Some(Self::row_index(&e, current_row)?);
                        next_col = 0;
                    }
                    b"c" => {
                        // A value-less cell only carries formatting
                        let (_, col) = Self::cell_position(&e, current_row, next_col)?;
                        next_col = col.saturating_add(1);
                    }
                    b"f" => {
                        // Shared formula follower: the text lives on the anchor cell
                        if let Some(c) = cell.as_mut() {
                            c.formula.get_or_insert_with(String::new);
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"c" => {
                        if let Some(pending) = cell.take() {
                            if let Some(value) = Self::finish_cell(&pending, shared_strings) {
                                sheet.set_cell_value_at(pending.row, pending.col, value)?;
                            }
                        }
                        target = TextTarget::None;
                    }
                    b"v" | b"f" | b"t" => target = TextTarget::None,
                    b"rPh" => in_rph = false,
                    b"sheetData" => break,
                    _ => {}
                },
                Ok(Event::Text(e)) if target != TextTarget::None => {
                    let text = e.unescape()?;
                    Self::push_text(&mut cell, target, &text);
                }
                Ok(Event::CData(e)) if target != TextTarget::None => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    Self::push_text(&mut cell, target, &text);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }

    fn push_text(cell: &mut Option<PendingCell>, target: TextTarget, text: &str) {
        let Some(c) = cell.as_mut() else {
            return;
        };
        let slot = match target {
            TextTarget::Value => c.value.get_or_insert_with(String::new),
            TextTarget::Formula => c.formula.get_or_insert_with(String::new),
            TextTarget::InlineText => c.inline.get_or_insert_with(String::new),
            TextTarget::None => return,
        };
        slot.push_str(text);
    }

    /// Convert the collected text of a cell into its value
    fn finish_cell(cell: &PendingCell, shared_strings: &[SharedString]) -> Option<CellValue> {
        let cached = Self::typed_value(cell, shared_strings);

        match &cell.formula {
            Some(text) => Some(CellValue::Formula {
                text: text.clone(),
                cached_value: cached.map(Box::new),
            }),
            None => cached,
        }
    }

    fn typed_value(cell: &PendingCell, shared_strings: &[SharedString]) -> Option<CellValue> {
        match cell.cell_type.as_deref() {
            Some("s") => {
                let raw = cell.value.as_deref()?;
                let index = raw.trim().parse::<usize>().ok();
                match index.and_then(|i| shared_strings.get(i)) {
                    Some(s) => Some(CellValue::String(s.clone())),
                    None => {
                        log::warn!(
                            "cell {} references missing shared string {}",
                            CellAddress::new(cell.row, cell.col),
                            raw
                        );
                        None
                    }
                }
            }
            Some("inlineStr") => cell
                .inline
                .as_deref()
                .map(|s| CellValue::string(decode_excel_escapes(s))),
            Some("str") => cell.value.as_deref().map(CellValue::string),
            Some("b") => cell
                .value
                .as_deref()
                .map(|v| CellValue::Boolean(matches!(v.trim(), "1" | "true"))),
            Some("e") => cell.value.as_deref().map(|v| match CellError::parse(v.trim()) {
                Some(err) => CellValue::Error(err),
                None => CellValue::string(v),
            }),
            // ISO 8601 dates stay textual
            Some("d") => cell.value.as_deref().map(CellValue::string),
            _ => {
                let raw = cell.value.as_deref()?;
                match raw.trim().parse::<f64>() {
                    Ok(n) => Some(CellValue::Number(n)),
                    Err(_) => Some(CellValue::string(raw)),
                }
            }
        }
    }

    fn row_index(e: &BytesStart<'_>, previous: Option<u32>) -> XlsxResult<u32> {
        match Self::attr_string(e, b"r") {
            Some(r) => r
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .ok_or_else(|| XlsxError::Parse(format!("invalid row number '{}'", r))),
            None => Ok(previous.map_or(0, |p| p + 1)),
        }
    }

    fn cell_position(
        e: &BytesStart<'_>,
        current_row: Option<u32>,
        next_col: u16,
    ) -> XlsxResult<(u32, u16)> {
        match Self::attr_string(e, b"r") {
            Some(r) => {
                let addr = CellAddress::parse(&r)?;
                Ok((addr.row, addr.col))
            }
            None => Ok((current_row.unwrap_or(0), next_col)),
        }
    }

    fn attr_string(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
        e.attributes()
            .flatten()
            .find(|a| a.key.as_ref() == key)
            .and_then(|a| a.unescape_value().ok().map(|s| s.to_string()))
    }
}
