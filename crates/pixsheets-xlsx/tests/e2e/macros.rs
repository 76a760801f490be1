//! Macro-enabled packages converted to plain workbooks.

use crate::{links_document, part_str, picture_at};
use pixsheets_xlsx::{XlsxPackage, XlsxReader, XlsxWriter};
use pretty_assertions::assert_eq;

const PLAIN_MAIN: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const MACRO_MAIN: &str = "application/vnd.ms-excel.sheet.macroEnabled.main+xml";

/// The links workbook dressed up as an `.xlsm`: macro-enabled main part plus
/// a signed VBA project.
fn macro_package() -> XlsxPackage {
    let mut package = links_document().package().clone();

    let types = part_str(&package, "[Content_Types].xml")
        .replace(PLAIN_MAIN, MACRO_MAIN)
        .replace(
            "</Types>",
            r#"<Default Extension="bin" ContentType="application/vnd.ms-office.vbaProject"/><Override PartName="/xl/vbaProjectSignature.bin" ContentType="application/vnd.ms-office.vbaProjectSignature"/></Types>"#,
        );
    package.set_part("[Content_Types].xml", types.into_bytes());

    let rels = part_str(&package, "xl/_rels/workbook.xml.rels").replace(
        "</Relationships>",
        r#"<Relationship Id="rId9" Type="http://schemas.microsoft.com/office/2006/relationships/vbaProject" Target="vbaProject.bin"/></Relationships>"#,
    );
    package.set_part("xl/_rels/workbook.xml.rels", rels.into_bytes());

    package.set_part("xl/vbaProject.bin", b"vba".to_vec());
    package.set_part(
        "xl/_rels/vbaProject.bin.rels",
        br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.microsoft.com/office/2006/relationships/vbaProjectSignature" Target="vbaProjectSignature.bin"/></Relationships>"#
            .to_vec(),
    );
    package.set_part("xl/vbaProjectSignature.bin", b"sig".to_vec());
    package
}

#[test]
fn test_macro_package_becomes_plain_workbook() {
    let mut doc = XlsxReader::read_package(macro_package()).unwrap();
    doc.workbook_mut()
        .worksheet_mut(0)
        .unwrap()
        .add_picture(picture_at("B2", 10, 10, "cat"));

    assert!(doc.make_plain_xlsx().unwrap());
    assert!(!doc.make_plain_xlsx().unwrap());

    let written = XlsxWriter::to_package(&doc).unwrap();
    let types = part_str(&written, "[Content_Types].xml");
    assert!(!types.contains("macroEnabled"));
    assert!(!types.contains("vbaProjectSignature"));
    assert!(types.contains(&format!(
        r#"<Override PartName="/xl/workbook.xml" ContentType="{}"/>"#,
        PLAIN_MAIN
    )));

    for part in [
        "xl/vbaProject.bin",
        "xl/_rels/vbaProject.bin.rels",
        "xl/vbaProjectSignature.bin",
    ] {
        assert!(!written.contains(part), "{} should be gone", part);
    }
    let rels = part_str(&written, "xl/_rels/workbook.xml.rels");
    assert!(!rels.contains("vbaProject"));
    assert!(rels.contains("worksheets/sheet2.xml"));

    // Still readable, pictures still attached
    let back = XlsxReader::read_package(written.clone()).unwrap();
    assert_eq!(back.workbook().sheet_names(), vec!["Products", "Gallery"]);
    assert!(written.contains("xl/drawings/drawing1.xml"));
}

#[test]
fn test_plain_package_is_left_alone() {
    let mut doc = links_document();
    let before: Vec<String> = doc.package().part_names().map(str::to_string).collect();

    assert!(!doc.make_plain_xlsx().unwrap());

    let after: Vec<String> = doc.package().part_names().map(str::to_string).collect();
    assert_eq!(after, before);
}
