//! A workbook paired with the package it was read from

use pixsheets_core::{CellAddress, CellValue, Workbook, Worksheet};

use crate::error::{XlsxError, XlsxResult};
use crate::package::{rels_path_for, resolve_target, XlsxPackage};
use crate::rels::{
    escape_xml, parse_relationships, write_relationships, Relationship, REL_OFFICE_DOCUMENT,
    REL_WORKSHEET,
};
use crate::writer::content_types::{ContentTypes, CONTENT_TYPES_PART};

const STYLES_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const VBA_PROJECT_REL: &str =
    "http://schemas.microsoft.com/office/2006/relationships/vbaProject";
const WORKBOOK_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

/// Parsed workbook plus the raw package parts backing it.
///
/// The workbook model only holds what image embedding needs (cell values and
/// pictures); everything else is carried in `package` and written back as-is.
#[derive(Debug, Clone)]
pub struct XlsxDocument {
    workbook: Workbook,
    package: XlsxPackage,
    /// Main workbook part, usually `xl/workbook.xml`
    workbook_part: String,
    /// Worksheet part path for each sheet index of `workbook`; `None` for
    /// sheets read as empty (chartsheets, missing parts)
    sheet_parts: Vec<Option<String>>,
}

impl XlsxDocument {
    pub(crate) fn from_parts(
        workbook: Workbook,
        package: XlsxPackage,
        workbook_part: String,
        sheet_parts: Vec<Option<String>>,
    ) -> Self {
        Self {
            workbook,
            package,
            workbook_part,
            sheet_parts,
        }
    }

    /// Build a fresh package around a workbook's cell values.
    ///
    /// Pictures already placed on the workbook are emitted by
    /// [`XlsxWriter`](crate::XlsxWriter) like those added after reading.
    pub fn from_workbook(workbook: Workbook) -> XlsxResult<Self> {
        if workbook.is_empty() {
            return Err(XlsxError::InvalidFormat(
                "a workbook needs at least one worksheet".into(),
            ));
        }

        let mut package = XlsxPackage::new();
        package.set_part("[Content_Types].xml", content_types_xml(&workbook).into_bytes());
        package.set_part(
            "_rels/.rels",
            write_relationships(&[Relationship::new(
                "rId1",
                REL_OFFICE_DOCUMENT,
                "xl/workbook.xml",
            )])
            .into_bytes(),
        );
        package.set_part("xl/workbook.xml", workbook_xml(&workbook).into_bytes());
        package.set_part(
            "xl/_rels/workbook.xml.rels",
            workbook_rels_xml(&workbook).into_bytes(),
        );
        package.set_part("xl/styles.xml", STYLES_XML.as_bytes().to_vec());

        let mut sheet_parts = Vec::with_capacity(workbook.sheet_count());
        for (i, sheet) in workbook.worksheets().enumerate() {
            let path = format!("xl/worksheets/sheet{}.xml", i + 1);
            package.set_part(&path, worksheet_xml(sheet).into_bytes());
            sheet_parts.push(Some(path));
        }

        Ok(Self::from_parts(
            workbook,
            package,
            "xl/workbook.xml".to_string(),
            sheet_parts,
        ))
    }

    /// The parsed workbook
    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// Mutable access to the workbook, used to place pictures
    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut self.workbook
    }

    /// The raw package parts
    pub fn package(&self) -> &XlsxPackage {
        &self.package
    }

    /// Worksheet part path of a sheet, e.g. `xl/worksheets/sheet2.xml`.
    /// `None` for sheets that were read as empty.
    pub fn sheet_part(&self, index: usize) -> Option<&str> {
        self.sheet_parts.get(index)?.as_deref()
    }

    /// Turn the package into a plain `.xlsx` workbook.
    ///
    /// Macro-enabled and template workbooks get the ordinary workbook content
    /// type, and the VBA project is dropped together with its relationship and
    /// signature parts. Returns whether anything changed.
    pub fn make_plain_xlsx(&mut self) -> XlsxResult<bool> {
        let types_xml = self
            .package
            .part(CONTENT_TYPES_PART)
            .ok_or_else(|| XlsxError::MissingPart(CONTENT_TYPES_PART.into()))?;
        let mut content_types = ContentTypes::parse(types_xml)?;
        let mut changed = content_types.set_override(&self.workbook_part, WORKBOOK_CONTENT_TYPE);

        let rels_part = rels_path_for(&self.workbook_part);
        let rels = match self.package.part(&rels_part) {
            Some(data) => parse_relationships(data)?,
            None => Vec::new(),
        };
        let (vba, kept): (Vec<Relationship>, Vec<Relationship>) = rels
            .into_iter()
            .partition(|r| r.rel_type == VBA_PROJECT_REL && !r.external);

        for rel in &vba {
            let project = resolve_target(&self.workbook_part, &rel.target);
            let project_rels = rels_path_for(&project);
            let signatures = match self.package.part(&project_rels) {
                Some(data) => parse_relationships(data)?,
                None => Vec::new(),
            };
            for signature in signatures.iter().filter(|r| !r.external) {
                let path = resolve_target(&project, &signature.target);
                self.package.remove_part(&path);
                content_types.remove_override(&path);
            }
            self.package.remove_part(&project_rels);
            self.package.remove_part(&project);
            content_types.remove_override(&project);
            log::debug!("dropped VBA project {}", project);
        }

        if !vba.is_empty() {
            self.package
                .set_part(&rels_part, write_relationships(&kept).into_bytes());
            changed = true;
        }
        if changed {
            self.package
                .set_part(CONTENT_TYPES_PART, content_types.to_xml().into_bytes());
        }
        Ok(changed)
    }
}

fn content_types_xml(workbook: &Workbook) -> String {
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );

    for i in 0..workbook.sheet_count() {
        content.push_str(&format!(
            r#"
    <Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i + 1
        ));
    }

    content.push_str("\n</Types>");
    content
}

fn workbook_xml(workbook: &Workbook) -> String {
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheets>"#,
    );

    for (i, sheet) in workbook.worksheets().enumerate() {
        content.push_str(&format!(
            r#"
        <sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(sheet.name()),
            i + 1,
            i + 1
        ));
    }

    content.push_str(
        r#"
    </sheets>
</workbook>"#,
    );
    content
}

fn workbook_rels_xml(workbook: &Workbook) -> String {
    let mut rels: Vec<Relationship> = (0..workbook.sheet_count())
        .map(|i| {
            Relationship::new(
                format!("rId{}", i + 1),
                REL_WORKSHEET,
                format!("worksheets/sheet{}.xml", i + 1),
            )
        })
        .collect();
    rels.push(Relationship::new(
        format!("rId{}", workbook.sheet_count() + 1),
        STYLES_REL,
        "styles.xml",
    ));
    write_relationships(&rels)
}

fn worksheet_xml(sheet: &Worksheet) -> String {
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheetData>"#,
    );

    // Write cell data (sparse, row-major)
    let mut current_row: Option<u32> = None;
    for (row, col, value) in sheet.iter_cells() {
        if current_row != Some(row) {
            if current_row.is_some() {
                content.push_str("\n        </row>");
            }
            content.push_str(&format!("\n        <row r=\"{}\">", row + 1));
            current_row = Some(row);
        }

        let cell_ref = CellAddress::new(row, col).to_a1_string();
        content.push_str(&format!("\n            {}", cell_xml(&cell_ref, value)));
    }

    if current_row.is_some() {
        content.push_str("\n        </row>");
    }

    content.push_str("\n    </sheetData>\n</worksheet>");
    content
}

fn cell_xml(cell_ref: &str, value: &CellValue) -> String {
    match value {
        CellValue::Empty => format!("<c r=\"{}\"/>", cell_ref),
        CellValue::Number(n) => format!("<c r=\"{}\"><v>{}</v></c>", cell_ref, n),
        CellValue::String(s) => format!(
            "<c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            cell_ref,
            escape_xml(s.as_str())
        ),
        CellValue::Boolean(b) => format!(
            "<c r=\"{}\" t=\"b\"><v>{}</v></c>",
            cell_ref,
            if *b { 1 } else { 0 }
        ),
        CellValue::Error(e) => format!(
            "<c r=\"{}\" t=\"e\"><v>{}</v></c>",
            cell_ref,
            escape_xml(e.as_str())
        ),
        CellValue::Formula { text, cached_value } => {
            let formula = escape_xml(text.strip_prefix('=').unwrap_or(text));
            match cached_value.as_deref() {
                Some(CellValue::String(s)) => format!(
                    "<c r=\"{}\" t=\"str\"><f>{}</f><v>{}</v></c>",
                    cell_ref,
                    formula,
                    escape_xml(s.as_str())
                ),
                Some(CellValue::Number(n)) => {
                    format!("<c r=\"{}\"><f>{}</f><v>{}</v></c>", cell_ref, formula, n)
                }
                Some(CellValue::Boolean(b)) => format!(
                    "<c r=\"{}\" t=\"b\"><f>{}</f><v>{}</v></c>",
                    cell_ref,
                    formula,
                    if *b { 1 } else { 0 }
                ),
                Some(CellValue::Error(e)) => format!(
                    "<c r=\"{}\" t=\"e\"><f>{}</f><v>{}</v></c>",
                    cell_ref,
                    formula,
                    e.as_str()
                ),
                _ => format!("<c r=\"{}\"><f>{}</f></c>", cell_ref, formula),
            }
        }
    }
}

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
    <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
    <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
    <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
    <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
    <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#;
