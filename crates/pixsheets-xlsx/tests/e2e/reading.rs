//! Reading packages laid out differently from what this crate writes.

use crate::{links_document, temp_xlsx};
use pixsheets_core::CellValue;
use pixsheets_xlsx::{XlsxError, XlsxPackage, XlsxReader, XlsxWriter};
use pretty_assertions::assert_eq;

const CONTENT_TYPES: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;

/// Workbook stored under `book/`, addressed with absolute targets, with a
/// chartsheet between two worksheets and a shared string table.
fn unusual_package() -> XlsxPackage {
    let mut package = XlsxPackage::new();
    package.set_part("[Content_Types].xml", CONTENT_TYPES.to_vec());
    package.set_part(
        "_rels/.rels",
        br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="/book/main.xml"/></Relationships>"#
            .to_vec(),
    );
    package.set_part(
        "book/main.xml",
        br#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="First" sheetId="1" r:id="rId1"/><sheet name="Chart" sheetId="2" r:id="rId2"/><sheet name="Second" sheetId="3" r:id="rId3"/></sheets></workbook>"#
            .to_vec(),
    );
    package.set_part(
        "book/_rels/main.xml.rels",
        br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/book/sheets/a.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/chartsheet" Target="charts/c.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="sheets/b.xml"/><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="strings.xml"/></Relationships>"#
            .to_vec(),
    );
    package.set_part(
        "book/strings.xml",
        br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>https://example.com/a.PNG</t></si><si><t>label_x005f_one</t></si></sst>"#
            .to_vec(),
    );
    package.set_part(
        "book/sheets/a.xml",
        br#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="2"><c r="B2" t="s"><v>0</v></c><c r="C2" t="s"><v>1</v></c></row></sheetData></worksheet>"#
            .to_vec(),
    );
    package.set_part(
        "book/sheets/b.xml",
        br#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#
            .to_vec(),
    );
    package
}

#[test]
fn test_follows_relationships() {
    let doc = XlsxReader::read_package(unusual_package()).unwrap();

    assert_eq!(doc.workbook().sheet_names(), vec!["First", "Chart", "Second"]);
    assert_eq!(doc.sheet_part(0), Some("book/sheets/a.xml"));
    assert_eq!(doc.sheet_part(1), None);
    assert_eq!(doc.sheet_part(2), Some("book/sheets/b.xml"));
    assert!(doc.workbook().worksheet(1).unwrap().is_empty());

    let first = doc.workbook().worksheet(0).unwrap();
    assert_eq!(
        first.get_value("B2").unwrap(),
        CellValue::string("https://example.com/a.PNG")
    );
    assert_eq!(first.get_value("C2").unwrap(), CellValue::string("label_one"));
}

#[test]
fn test_pictures_land_on_resolved_sheet_part() {
    let mut doc = XlsxReader::read_package(unusual_package()).unwrap();
    doc.workbook_mut()
        .worksheet_mut(2)
        .unwrap()
        .add_picture(crate::picture_at("A1", 5, 5, "x"));

    let written = XlsxWriter::to_package(&doc).unwrap();
    let sheet = std::str::from_utf8(written.part("book/sheets/b.xml").unwrap()).unwrap();
    assert!(sheet.contains(r#"<sheetData/><drawing r:id="rId1"/></worksheet>"#));
    assert!(sheet.contains(r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#));

    let rels = std::str::from_utf8(written.part("book/sheets/_rels/b.xml.rels").unwrap()).unwrap();
    assert!(rels.contains(r#"Target="../../xl/drawings/drawing1.xml""#));

    let types = std::str::from_utf8(written.part("[Content_Types].xml").unwrap()).unwrap();
    assert!(types.contains(r#"<Default Extension="rels""#));
}

#[test]
fn test_missing_sheet_part_reads_as_empty() {
    let mut package = unusual_package();
    assert!(package.remove_part("book/sheets/b.xml"));

    let doc = XlsxReader::read_package(package).unwrap();
    assert_eq!(doc.workbook().sheet_names(), vec!["First", "Chart", "Second"]);
    assert_eq!(doc.sheet_part(2), None);
    assert!(doc.workbook().worksheet(2).unwrap().is_empty());
    assert_eq!(
        doc.workbook().worksheet(0).unwrap().get_value("B2").unwrap(),
        CellValue::string("https://example.com/a.PNG")
    );
}

#[test]
fn test_unknown_relationship_keeps_later_indices() {
    let mut package = unusual_package();
    package.set_part(
        "book/main.xml",
        br#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Ghost" sheetId="9" r:id="rId99"/><sheet name="First" sheetId="1" r:id="rId1"/></sheets></workbook>"#
            .to_vec(),
    );

    let doc = XlsxReader::read_package(package).unwrap();
    assert_eq!(doc.workbook().sheet_names(), vec!["Ghost", "First"]);
    assert!(doc.workbook().worksheet(0).unwrap().is_empty());
    assert_eq!(doc.sheet_part(1), Some("book/sheets/a.xml"));
}

#[test]
fn test_document_clone_is_independent() {
    let doc = XlsxReader::read_package(unusual_package()).unwrap();
    let mut copy = doc.clone();
    copy.workbook_mut()
        .worksheet_mut(0)
        .unwrap()
        .set_cell_value("B2", "changed")
        .unwrap();

    assert_eq!(
        doc.workbook().worksheet(0).unwrap().get_value("B2").unwrap(),
        CellValue::string("https://example.com/a.PNG")
    );
    assert_eq!(copy.package().len(), doc.package().len());
}

#[test]
fn test_file_roundtrip_through_disk() {
    let (_dir, path) = temp_xlsx("plain.xlsx");
    XlsxWriter::write_file(&links_document(), &path).unwrap();

    let back = XlsxReader::read_file(&path).unwrap();
    assert_eq!(back.workbook().sheet_names(), vec!["Products", "Gallery"]);
    assert_eq!(
        back.workbook()
            .worksheet_by_name("Gallery")
            .unwrap()
            .get_value("A1")
            .unwrap(),
        CellValue::string("https://example.com/dog.jpg")
    );
}

#[test]
fn test_not_a_zip_is_an_error() {
    let (_dir, path) = temp_xlsx("broken.xlsx");
    std::fs::write(&path, b"definitely not a zip archive").unwrap();

    assert!(matches!(
        XlsxReader::read_file(&path),
        Err(XlsxError::Zip(_))
    ));
}

#[test]
fn test_missing_workbook_part() {
    let mut package = XlsxPackage::new();
    package.set_part("[Content_Types].xml", CONTENT_TYPES.to_vec());

    assert!(matches!(
        XlsxReader::read_package(package),
        Err(XlsxError::MissingPart(part)) if part == "xl/workbook.xml"
    ));
}
