//! Drawing parts: anchoring pictures to worksheet cells

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use pixsheets_core::Picture;

use super::content_types::{ContentTypes, DRAWING_CONTENT_TYPE, RELS_CONTENT_TYPE};
use crate::error::{XlsxError, XlsxResult};
use crate::package::{rels_path_for, relative_target, resolve_target, XlsxPackage};
use crate::rels::{
    next_rel_id, parse_relationships, write_relationships, Relationship, OFFICE_REL_NS,
    REL_DRAWING, REL_IMAGE,
};

const XDR_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

/// DrawingML units per screen pixel at 96 dpi
pub const EMU_PER_PIXEL: u64 = 9525;

/// Worksheet children that must come after `<drawing>`
const AFTER_DRAWING: &[&[u8]] = &[
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// Media parts written so far, keyed by [`Picture::media_key`]
pub(crate) struct MediaParts {
    by_key: HashMap<String, String>,
    next_index: u32,
}

impl MediaParts {
    pub(crate) fn new(package: &XlsxPackage) -> Self {
        Self {
            by_key: HashMap::new(),
            next_index: package.max_numbered("xl/media/image", None) + 1,
        }
    }

    /// Media part holding the picture's bytes, added on first use
    fn part_for(
        &mut self,
        package: &mut XlsxPackage,
        content_types: &mut ContentTypes,
        picture: &Picture,
    ) -> String {
        if let Some(part) = self.by_key.get(&picture.media_key) {
            return part.clone();
        }

        let ext = picture.format.extension();
        let part = format!("xl/media/image{}.{}", self.next_index, ext);
        self.next_index += 1;

        package.set_part(&part, picture.data.to_vec());
        content_types.ensure_default(ext, picture.format.content_type());
        self.by_key.insert(picture.media_key.clone(), part.clone());
        part
    }
}

/// Add `pictures` to the drawing of `sheet_part`, creating the drawing when
/// the sheet has none.
pub(crate) fn attach_pictures(
    package: &mut XlsxPackage,
    content_types: &mut ContentTypes,
    media: &mut MediaParts,
    sheet_part: &str,
    pictures: &[Picture],
) -> XlsxResult<()> {
    let sheet_xml = package
        .part(sheet_part)
        .ok_or_else(|| XlsxError::MissingPart(sheet_part.to_string()))?
        .to_vec();
    let sheet_rels_part = rels_path_for(sheet_part);
    let mut sheet_rels = match package.part(&sheet_rels_part) {
        Some(data) => parse_relationships(data)?,
        None => Vec::new(),
    };

    let (drawing_part, existing_drawing) = match find_drawing_rel_id(&sheet_xml)? {
        Some(rel_id) => {
            let rel = sheet_rels
                .iter()
                .find(|r| r.id == rel_id && !r.external)
                .ok_or_else(|| {
                    XlsxError::InvalidFormat(format!(
                        "{} references missing drawing relationship {}",
                        sheet_part, rel_id
                    ))
                })?;
            let path = resolve_target(sheet_part, &rel.target);
            let xml = package
                .part(&path)
                .ok_or_else(|| XlsxError::MissingPart(path.clone()))?
                .to_vec();
            (path, Some(xml))
        }
        None => {
            let index = package.max_numbered("xl/drawings/drawing", Some(".xml")) + 1;
            let path = format!("xl/drawings/drawing{}.xml", index);
            let rel_id = next_rel_id(&sheet_rels);

            sheet_rels.push(Relationship::new(
                rel_id.clone(),
                REL_DRAWING,
                relative_target(sheet_part, &path),
            ));
            package.set_part(sheet_part, insert_drawing_element(&sheet_xml, &rel_id)?);
            package.set_part(&sheet_rels_part, write_relationships(&sheet_rels).into_bytes());
            content_types.ensure_override(&path, DRAWING_CONTENT_TYPE);
            (path, None)
        }
    };

    let drawing_rels_part = rels_path_for(&drawing_part);
    let mut drawing_rels = match package.part(&drawing_rels_part) {
        Some(data) => parse_relationships(data)?,
        None => Vec::new(),
    };

    let mut shape_id = match &existing_drawing {
        Some(xml) => max_shape_id(xml)? + 1,
        None => 1,
    };
    let mut anchors = String::new();

    for picture in pictures {
        let media_part = media.part_for(package, content_types, picture);
        let target = relative_target(&drawing_part, &media_part);
        let rel_id = match drawing_rels
            .iter()
            .find(|r| r.rel_type == REL_IMAGE && r.target == target)
        {
            Some(rel) => rel.id.clone(),
            None => {
                let id = next_rel_id(&drawing_rels);
                drawing_rels.push(Relationship::new(id.clone(), REL_IMAGE, target));
                id
            }
        };

        anchors.push_str(&anchor_xml(picture, shape_id, &rel_id, existing_drawing.is_some()));
        shape_id += 1;
    }

    let drawing_xml = match existing_drawing {
        Some(xml) => append_anchors(&xml, &anchors)?,
        None => new_drawing_xml(&anchors).into_bytes(),
    };
    package.set_part(&drawing_part, drawing_xml);
    package.set_part(&drawing_rels_part, write_relationships(&drawing_rels).into_bytes());
    content_types.ensure_default("rels", RELS_CONTENT_TYPE);

    log::debug!(
        "anchored {} picture(s) on {} via {}",
        pictures.len(),
        sheet_part,
        drawing_part
    );
    Ok(())
}

/// Relationship id of the worksheet's `<drawing>` element, if it has one
fn find_drawing_rel_id(sheet_xml: &[u8]) -> XlsxResult<Option<String>> {
    let mut xml_reader = Reader::from_reader(sheet_xml);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if depth == 1 && e.local_name().as_ref() == b"drawing" =>
            {
                let id = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
                    .and_then(|a| a.unescape_value().ok().map(|s| s.to_string()));
                return Ok(id);
            }
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

/// Copy the worksheet XML, adding `<drawing r:id="..."/>` at its schema
/// position and declaring the relationships namespace on the root if needed.
fn insert_drawing_element(sheet_xml: &[u8], rel_id: &str) -> XlsxResult<Vec<u8>> {
    let mut xml_reader = Reader::from_reader(sheet_xml);
    let mut writer = Writer::new(Vec::with_capacity(sheet_xml.len() + 64));

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut drawing: Option<BytesStart<'static>> = None;

    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) if depth == 0 => {
                let (root, element) = prepare_root(&e, rel_id);
                drawing = Some(element);
                writer.write_event(Event::Start(root))?;
                depth = 1;
            }
            Event::Empty(e) if depth == 0 => {
                let (root, element) = prepare_root(&e, rel_id);
                let end = root.to_end().into_owned();
                writer.write_event(Event::Start(root))?;
                writer.write_event(Event::Empty(element))?;
                writer.write_event(Event::End(end))?;
            }
            Event::Start(e) => {
                if depth == 1 && AFTER_DRAWING.contains(&e.local_name().as_ref()) {
                    if let Some(element) = drawing.take() {
                        writer.write_event(Event::Empty(element))?;
                    }
                }
                writer.write_event(Event::Start(e))?;
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 1 && AFTER_DRAWING.contains(&e.local_name().as_ref()) {
                    if let Some(element) = drawing.take() {
                        writer.write_event(Event::Empty(element))?;
                    }
                }
                writer.write_event(Event::Empty(e))?;
            }
            Event::End(e) => {
                if depth == 1 {
                    if let Some(element) = drawing.take() {
                        writer.write_event(Event::Empty(element))?;
                    }
                }
                writer.write_event(Event::End(e))?;
                depth = depth.saturating_sub(1);
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    if depth != 0 || drawing.is_some() {
        return Err(XlsxError::InvalidFormat(
            "worksheet XML ended before its root element closed".into(),
        ));
    }

    Ok(writer.into_inner())
}

/// Root element with the relationships namespace declared, plus the
/// `<drawing>` element to insert, using the prefixes the document already has
fn prepare_root(root: &BytesStart<'_>, rel_id: &str) -> (BytesStart<'static>, BytesStart<'static>) {
    let declared = root.attributes().flatten().find_map(|attr| {
        let prefix = attr.key.as_ref().strip_prefix(b"xmlns:")?;
        (attr.value.as_ref() == OFFICE_REL_NS.as_bytes())
            .then(|| String::from_utf8_lossy(prefix).into_owned())
    });

    let mut patched = root.clone().into_owned();
    let rel_prefix = match declared {
        Some(prefix) => prefix,
        None => {
            patched.push_attribute(("xmlns:r", OFFICE_REL_NS));
            "r".to_string()
        }
    };

    let name = match root.name().prefix() {
        Some(prefix) => format!("{}:drawing", String::from_utf8_lossy(prefix.as_ref())),
        None => "drawing".to_string(),
    };
    let mut element = BytesStart::new(name);
    element.push_attribute((format!("{}:id", rel_prefix).as_str(), rel_id));

    (patched, element)
}

/// Highest `cNvPr` id in an existing drawing
fn max_shape_id(drawing_xml: &[u8]) -> XlsxResult<u32> {
    let mut xml_reader = Reader::from_reader(drawing_xml);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut max = 0;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"cNvPr" =>
            {
                let id = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"id")
                    .and_then(|a| std::str::from_utf8(&a.value).ok()?.parse::<u32>().ok());
                if let Some(id) = id {
                    max = max.max(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(max)
}

/// Splice anchors in front of the closing `wsDr` tag
fn append_anchors(drawing_xml: &[u8], anchors: &str) -> XlsxResult<Vec<u8>> {
    let close = drawing_xml
        .windows(2)
        .rposition(|w| w == b"</")
        .filter(|&pos| {
            let tail = &drawing_xml[pos + 2..];
            let end = tail
                .iter()
                .position(|&b| b == b'>' || b.is_ascii_whitespace())
                .unwrap_or(tail.len());
            tail[..end].ends_with(b"wsDr")
        })
        .ok_or_else(|| {
            XlsxError::InvalidFormat("drawing part has no closing wsDr element".into())
        })?;

    let mut out = Vec::with_capacity(drawing_xml.len() + anchors.len());
    out.extend_from_slice(&drawing_xml[..close]);
    out.extend_from_slice(anchors.as_bytes());
    out.extend_from_slice(b"\n");
    out.extend_from_slice(&drawing_xml[close..]);
    Ok(out)
}

fn new_drawing_xml(anchors: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<xdr:wsDr xmlns:xdr="{}" xmlns:a="{}" xmlns:r="{}">{}
</xdr:wsDr>"#,
        XDR_NS, A_NS, OFFICE_REL_NS, anchors
    )
}

/// A `oneCellAnchor`: the picture's top-left sits on the cell's top-left and
/// it keeps its own size when rows or columns are resized.
fn anchor_xml(picture: &Picture, shape_id: u32, rel_id: &str, declare_namespaces: bool) -> String {
    let cx = u64::from(picture.width_px) * EMU_PER_PIXEL;
    let cy = u64::from(picture.height_px) * EMU_PER_PIXEL;
    // Appended anchors may sit under a root that binds other prefixes
    let namespaces = if declare_namespaces {
        format!(
            r#" xmlns:xdr="{}" xmlns:a="{}" xmlns:r="{}""#,
            XDR_NS, A_NS, OFFICE_REL_NS
        )
    } else {
        String::new()
    };

    format!(
        r#"
    <xdr:oneCellAnchor{ns}>
        <xdr:from><xdr:col>{col}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{row}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>
        <xdr:ext cx="{cx}" cy="{cy}"/>
        <xdr:pic>
            <xdr:nvPicPr><xdr:cNvPr id="{id}" name="Picture {id}"/><xdr:cNvPicPr><a:picLocks noChangeAspect="1"/></xdr:cNvPicPr></xdr:nvPicPr>
            <xdr:blipFill><a:blip r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill>
            <xdr:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></xdr:spPr>
        </xdr:pic>
        <xdr:clientData/>
    </xdr:oneCellAnchor>"#,
        ns = namespaces,
        col = picture.anchor.col,
        row = picture.anchor.row,
        cx = cx,
        cy = cy,
        id = shape_id,
        rel_id = rel_id,
    )
}
