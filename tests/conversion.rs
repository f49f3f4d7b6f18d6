use pdf_layout_text::{ConversionSession, ConvertError, ConvertOptions, MemoryDocument, OutputFormat, PdfDict, PdfObject};

fn font(base: &str) -> PdfDict {
    let mut d = PdfDict::new();
    d.insert("Type".into(), PdfObject::Name("Font".into()));
    d.insert("Subtype".into(), PdfObject::Name("Type1".into()));
    d.insert("BaseFont".into(), PdfObject::Name(base.into()));
    d
}

fn convert(doc: &mut MemoryDocument, opts: ConvertOptions) -> Result<String, ConvertError> {
    let bytes = ConversionSession::new(opts).convert(doc)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[test]
fn test_single_hello_page_strips_to_text() {
    let mut doc = MemoryDocument::new();
    doc.add_font("F1", font("Helvetica"));
    doc.add_page(612.0, 792.0, b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");

    let mut opts = ConvertOptions::default();
    opts.pad_strip = true;
    assert_eq!(convert(&mut doc, opts).unwrap(), "Hello");
}

#[test]
fn test_restricted_ten_page_document() {
    let mut doc = MemoryDocument::new();
    doc.add_font("F1", font("Helvetica"));
    for i in 1..=10 {
        let content = format!("BT /F1 12 Tf 72 700 Td (Page {i}) Tj ET");
        doc.add_page(612.0, 792.0, content.as_bytes());
    }

    let mut opts = ConvertOptions::default();
    opts.restricted = true;
    opts.first_page = Some(5);
    let text = convert(&mut doc, opts).unwrap();

    for i in 1..=3 {
        assert!(text.contains(&format!("Page {i}")));
    }
    for i in 4..=10 {
        assert!(!text.contains(&format!("Page {i}")));
    }
    assert!(text.contains("=====================================\n Conversion limited to three pages.\n"));
    assert!(text.ends_with("   Thank you for trying Trapeze!\n=====================================\n"));
}

#[test]
fn test_markup_tab_between_label_and_value() {
    let mut doc = MemoryDocument::new();
    doc.add_font("F1", font("Helvetica"));
    doc.add_page(612.0, 792.0, b"BT /F1 12 Tf 0 700 Td (Name:) Tj 120 0 Td (Alice) Tj ET");

    let text = convert(&mut doc, ConvertOptions::with_format(OutputFormat::Rtf)).unwrap();
    assert!(text.contains("\\tx2400\n"));
    assert!(text.contains("Name:\tAlice"));
    assert_eq!(text.matches('\t').count(), 1);
}

#[test]
fn test_raised_ordinal_joins_baseline() {
    let mut doc = MemoryDocument::new();
    doc.add_font("F1", font("Times-Roman"));
    doc.add_page(
        612.0,
        792.0,
        b"BT /F1 12 Tf 72 700 Td (May ) Tj 28 5 Td /F1 8 Tf (2) Tj ET",
    );

    let mut opts = ConvertOptions::default();
    opts.pad_strip = true;
    let text = convert(&mut doc, opts).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("May"));
    assert!(text.ends_with('2'));
}

#[test]
fn test_html_document() {
    let mut doc = MemoryDocument::new();
    doc.add_font("F1", font("Helvetica-Bold"));
    doc.add_page(612.0, 792.0, b"BT /F1 12 Tf 72 700 Td (R&D) Tj ET");

    let mut opts = ConvertOptions::with_format(OutputFormat::Html);
    opts.pad_strip = true;
    opts.title = Some("report.pdf".into());
    let text = convert(&mut doc, opts).unwrap();
    assert!(text.starts_with("<html>\n<head>\n"));
    assert!(text.contains("<title>report.pdf</title>"));
    assert!(text.contains("R&amp;D"));
    assert!(text.trim_end().ends_with("</html>"));
}

#[test]
fn test_plist_output() {
    let mut doc = MemoryDocument::new();
    doc.add_font("F1", font("Helvetica"));
    doc.add_page(612.0, 792.0, b"BT ET");

    let text = convert(&mut doc, ConvertOptions::with_format(OutputFormat::PropertyList)).unwrap();
    assert!(text.contains("<plist version=\"1.0\">"));
    assert!(text.contains("<key>Page 1</key>"));
    assert!(text.contains("<string>Helvetica</string>"));
}

#[test]
fn test_json_config_drives_session() {
    let opts = ConvertOptions::from_json(r#"{"format":"ascii","pad_strip":true}"#).unwrap();
    let mut doc = MemoryDocument::new();
    doc.add_font("F1", font("Courier"));
    doc.add_page(612.0, 792.0, b"BT /F1 10 Tf 72 700 Td (plain) Tj ET");
    assert_eq!(convert(&mut doc, opts).unwrap(), "plain");
}

#[test]
fn test_bad_page_range() {
    let mut doc = MemoryDocument::new();
    doc.add_page(612.0, 792.0, b"");
    let mut opts = ConvertOptions::default();
    opts.first_page = Some(4);
    assert!(matches!(convert(&mut doc, opts), Err(ConvertError::BadPage(4))));
}
