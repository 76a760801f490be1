//! Writing pictures into packages and reading the result back.

use crate::{links_document, part_str, picture_at, temp_xlsx};
use pixsheets_core::CellValue;
use pixsheets_xlsx::{XlsxReader, XlsxWriter};
use pretty_assertions::assert_eq;

#[test]
fn test_same_key_shares_one_media_part() {
    let (_dir, path) = temp_xlsx("links_with_images.xlsx");
    let mut doc = links_document();
    {
        let sheet = doc.workbook_mut().worksheet_mut(0).unwrap();
        sheet.add_picture(picture_at("B2", 100, 25, "cat"));
        sheet.add_picture(picture_at("C2", 100, 25, "cat"));
    }
    doc.workbook_mut()
        .worksheet_mut(1)
        .unwrap()
        .add_picture(picture_at("A1", 80, 100, "dog"));

    XlsxWriter::write_file(&doc, &path).unwrap();
    let back = XlsxReader::read_file(&path).unwrap();
    let package = back.package();

    let media: Vec<&str> = package
        .part_names()
        .filter(|n| n.starts_with("xl/media/"))
        .collect();
    assert_eq!(media, vec!["xl/media/image1.png", "xl/media/image2.png"]);

    let drawing1 = part_str(package, "xl/drawings/drawing1.xml");
    assert_eq!(drawing1.matches("<xdr:oneCellAnchor").count(), 2);
    assert!(drawing1.contains("<xdr:col>1</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>1</xdr:row>"));
    assert!(drawing1.contains("<xdr:col>2</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>1</xdr:row>"));
    assert!(drawing1.contains(r#"<xdr:ext cx="952500" cy="238125"/>"#));
    assert!(drawing1.contains(r#"<xdr:cNvPr id="1" name="Picture 1"/>"#));
    assert!(drawing1.contains(r#"<xdr:cNvPr id="2" name="Picture 2"/>"#));

    // Both anchors point at one image relationship
    let drawing1_rels = part_str(package, "xl/drawings/_rels/drawing1.xml.rels");
    assert_eq!(drawing1_rels.matches("<Relationship ").count(), 1);
    assert!(drawing1_rels.contains(r#"Target="../media/image1.png""#));

    let drawing2 = part_str(package, "xl/drawings/drawing2.xml");
    assert!(drawing2.contains(r#"<xdr:ext cx="762000" cy="952500"/>"#));

    let sheet1 = part_str(package, "xl/worksheets/sheet1.xml");
    assert!(sheet1.contains(r#"<drawing r:id="rId1"/></worksheet>"#));
    let sheet1_rels = part_str(package, "xl/worksheets/_rels/sheet1.xml.rels");
    assert!(sheet1_rels.contains(r#"Target="../drawings/drawing1.xml""#));

    let types = part_str(package, "[Content_Types].xml");
    assert!(types.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
    assert!(types.contains(r#"PartName="/xl/drawings/drawing1.xml""#));
    assert!(types.contains(r#"PartName="/xl/drawings/drawing2.xml""#));

    // Cell values survive untouched
    let products = back.workbook().worksheet(0).unwrap();
    assert_eq!(
        products.get_value("B2").unwrap(),
        CellValue::string("https://example.com/cat.png")
    );
    assert_eq!(products.get_value("D2").unwrap(), CellValue::Number(19.99));
}

#[test]
fn test_untouched_parts_are_byte_identical() {
    let mut doc = links_document();
    doc.workbook_mut()
        .worksheet_mut(1)
        .unwrap()
        .add_picture(picture_at("A1", 10, 10, "dog"));

    let original = doc.package().clone();
    let written = XlsxWriter::to_package(&doc).unwrap();

    for name in [
        "xl/workbook.xml",
        "xl/styles.xml",
        "xl/_rels/workbook.xml.rels",
        "xl/worksheets/sheet1.xml",
    ] {
        assert_eq!(written.part(name), original.part(name), "{}", name);
    }
    assert_ne!(
        written.part("xl/worksheets/sheet2.xml"),
        original.part("xl/worksheets/sheet2.xml")
    );
    assert!(!written.contains("xl/worksheets/_rels/sheet1.xml.rels"));
}

#[test]
fn test_no_pictures_writes_package_unchanged() {
    let doc = links_document();
    let written = XlsxWriter::to_package(&doc).unwrap();

    let names: Vec<&str> = written.part_names().collect();
    let original: Vec<&str> = doc.package().part_names().collect();
    assert_eq!(names, original);
    for name in original {
        assert_eq!(written.part(name), doc.package().part(name));
    }
}

#[test]
fn test_appends_to_existing_drawing() {
    let mut package = links_document().package().clone();

    // Sheet 1 already carries a drawing with one shape and one media file
    let sheet = part_str(&package, "xl/worksheets/sheet1.xml")
        .replace("</worksheet>", r#"<drawing r:id="rId4"/></worksheet>"#);
    package.set_part("xl/worksheets/sheet1.xml", sheet.into_bytes());
    package.set_part(
        "xl/worksheets/_rels/sheet1.xml.rels",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing1.xml"/></Relationships>"#
            .to_vec(),
    );
    package.set_part(
        "xl/drawings/drawing1.xml",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><xdr:absoluteAnchor><xdr:pos x="0" y="0"/><xdr:ext cx="9525" cy="9525"/><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="7" name="Logo"/><xdr:cNvPicPr/></xdr:nvPicPr></xdr:pic><xdr:clientData/></xdr:absoluteAnchor></xdr:wsDr>"#
            .to_vec(),
    );
    package.set_part(
        "xl/drawings/_rels/drawing1.xml.rels",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.jpeg"/></Relationships>"#
            .to_vec(),
    );
    package.set_part("xl/media/image1.jpeg", b"jpeg".to_vec());

    let mut doc = XlsxReader::read_package(package).unwrap();
    doc.workbook_mut()
        .worksheet_mut(0)
        .unwrap()
        .add_picture(picture_at("B2", 100, 25, "cat"));

    let written = XlsxWriter::to_package(&doc).unwrap();

    assert!(!written.contains("xl/drawings/drawing2.xml"));
    assert_eq!(written.part("xl/media/image1.jpeg"), Some(&b"jpeg"[..]));
    assert!(written.contains("xl/media/image2.png"));

    let drawing = part_str(&written, "xl/drawings/drawing1.xml");
    assert!(drawing.contains(r#"<xdr:cNvPr id="7" name="Logo"/>"#));
    assert!(drawing.contains(r#"<xdr:cNvPr id="8" name="Picture 8"/>"#));
    assert!(drawing.contains(r#"<a:blip r:embed="rId2"/>"#));
    assert!(drawing.trim_end().ends_with("</xdr:oneCellAnchor>\n</xdr:wsDr>"));

    let rels = part_str(&written, "xl/drawings/_rels/drawing1.xml.rels");
    assert!(rels.contains(r#"Id="rId1""#));
    assert!(rels.contains(r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image2.png"/>"#));

    // The sheet keeps its single drawing reference
    let sheet = part_str(&written, "xl/worksheets/sheet1.xml");
    assert_eq!(sheet.matches("<drawing ").count(), 1);
}
