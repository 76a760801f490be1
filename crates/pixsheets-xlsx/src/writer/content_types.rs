//! `[Content_Types].xml` editing

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::rels::escape_xml;

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const RELS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub(crate) const DRAWING_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";

/// The `Default` and `Override` entries of a package, in file order
#[derive(Debug, Default)]
pub(crate) struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub(crate) fn parse(data: &[u8]) -> XlsxResult<Self> {
        let mut xml_reader = Reader::from_reader(data);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut types = Self::default();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if matches!(e.local_name().as_ref(), b"Default" | b"Override") =>
                {
                    let (key_attr, list) = if e.local_name().as_ref() == b"Default" {
                        (&b"Extension"[..], &mut types.defaults)
                    } else {
                        (&b"PartName"[..], &mut types.overrides)
                    };

                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == key_attr {
                            key = attr.unescape_value().ok().map(|s| s.to_string());
                        } else if attr.key.as_ref() == b"ContentType" {
                            content_type = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                    }

                    if let (Some(key), Some(content_type)) = (key, content_type) {
                        list.push((key, content_type));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(types)
    }

    /// Register a content type for a file extension unless one exists
    pub(crate) fn ensure_default(&mut self, extension: &str, content_type: &str) {
        if !self
            .defaults
            .iter()
            .any(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        {
            self.defaults
                .push((extension.to_string(), content_type.to_string()));
        }
    }

    /// Register a content type for one part, `part` given without the leading slash
    pub(crate) fn ensure_override(&mut self, part: &str, content_type: &str) {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        if !self
            .overrides
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(&part_name))
        {
            self.overrides.push((part_name, content_type.to_string()));
        }
    }

    /// Set the content type of one part, returning whether it changed
    pub(crate) fn set_override(&mut self, part: &str, content_type: &str) -> bool {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        match self
            .overrides
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&part_name))
        {
            Some((_, current)) if current == content_type => false,
            Some((_, current)) => {
                *current = content_type.to_string();
                true
            }
            None => {
                self.overrides.push((part_name, content_type.to_string()));
                true
            }
        }
    }

    /// Drop the override of a removed part
    pub(crate) fn remove_override(&mut self, part: &str) {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        self.overrides
            .retain(|(name, _)| !name.eq_ignore_ascii_case(&part_name));
    }

    pub(crate) fn to_xml(&self) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );

        for (ext, content_type) in &self.defaults {
            content.push_str(&format!(
                r#"
    <Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(content_type)
            ));
        }
        for (part, content_type) in &self.overrides {
            content.push_str(&format!(
                r#"
    <Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(part),
                escape_xml(content_type)
            ));
        }

        content.push_str("\n</Types>");
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_entries_once() {
        let xml = r#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="PNG" ContentType="image/png"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#;
        let mut types = ContentTypes::parse(xml.as_bytes()).unwrap();
        types.ensure_default("png", "image/png");
        types.ensure_default("jpeg", "image/jpeg");
        types.ensure_override("xl/drawings/drawing1.xml", DRAWING_CONTENT_TYPE);
        types.ensure_override("/xl/drawings/drawing1.xml", DRAWING_CONTENT_TYPE);

        let out = types.to_xml();
        assert_eq!(out.matches("Extension=\"PNG\"").count(), 1);
        assert_eq!(out.matches("Extension=\"png\"").count(), 0);
        assert!(out.contains(r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#));
        assert_eq!(out.matches("/xl/drawings/drawing1.xml").count(), 1);
        assert!(out.contains("/xl/workbook.xml"));
    }

    #[test]
    fn test_set_and_remove_override() {
        let xml = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.ms-excel.sheet.macroEnabled.main+xml"/>
  <Override PartName="/xl/vbaProject.bin" ContentType="application/vnd.ms-office.vbaProject"/>
</Types>"#;
        let mut types = ContentTypes::parse(xml.as_bytes()).unwrap();
        let plain = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

        assert!(types.set_override("xl/workbook.xml", plain));
        assert!(!types.set_override("/xl/workbook.xml", plain));
        types.remove_override("xl/vbaProject.bin");

        let out = types.to_xml();
        assert!(!out.contains("macroEnabled"));
        assert!(!out.contains("vbaProject"));
        assert_eq!(out.matches("/xl/workbook.xml").count(), 1);
    }
}
