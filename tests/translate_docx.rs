use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use docx_translator::backend::{TranslateRequest, Translator};
use docx_translator::docx::DocxDocument;
use docx_translator::error::BackendError;
use docx_translator::pipeline::batch::DEFAULT_OUTPUT_SUFFIX;
use docx_translator::pipeline::{
    collect_inputs, run_batch, write_zip, DocumentTranslator, OutcomeStatus, TableMode,
    TranslateOptions,
};
use docx_translator::progress::no_progress;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Upper-cases every line and prepends an instruction echo.
struct Shouting;

impl Translator for Shouting {
    fn name(&self) -> &str {
        "shouting"
    }

    fn translate(&self, req: &TranslateRequest<'_>) -> Result<String, BackendError> {
        Ok(format!("TRANSLATION:\n{}", req.source_text.to_uppercase()))
    }
}

fn write_docx(path: &Path, body: &str) {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#
    );
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    zout.start_file("[Content_Types].xml", opts).unwrap();
    zout.write_all(br#"<?xml version="1.0"?><Types/>"#).unwrap();
    zout.start_file("word/document.xml", opts).unwrap();
    zout.write_all(document.as_bytes()).unwrap();
    zout.start_file("word/styles.xml", opts).unwrap();
    zout.write_all(b"<w:styles/>").unwrap();
    let bytes = zout.finish().unwrap().into_inner();
    std::fs::write(path, bytes).unwrap();
}

fn sample_body() -> String {
    concat!(
        r#"<w:p><w:r><w:rPr><w:b/><w:sz w:val="32"/></w:rPr><w:t>Annual report</w:t></w:r></w:p>"#,
        r#"<w:p/>"#,
        r#"<w:p><w:r><w:t xml:space="preserve">Sales grew </w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>fast</w:t></w:r></w:p>"#,
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Region</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>2024</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        r#"<w:p><w:r><w:t>Closing words</w:t></w:r></w:p>"#,
    )
    .to_string()
}

fn read_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut zip = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut entry = zip.by_name(name).unwrap();
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).unwrap();
    buf
}

#[test]
fn translates_a_document_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("report.docx");
    write_docx(&input, &sample_body());
    let before = std::fs::read(&input).unwrap();

    let options = TranslateOptions {
        chunk_size: 2,
        ..Default::default()
    };
    let pass = DocumentTranslator::new(&Shouting, Default::default(), options);
    let output = dir.path().join("out").join("report_translated.docx");
    let report = pass.translate_file(&input, &output, &no_progress).unwrap();

    assert!(report.is_complete(), "{report:?}");
    assert_eq!(report.paragraphs, 4);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.replaced, 3);
    assert_eq!(report.tables.translated, 2);
    assert_eq!(std::fs::read(&input).unwrap(), before);

    let out = DocxDocument::open(&output).unwrap();
    let doc = out.document();
    assert_eq!(
        doc.paragraph_texts(),
        vec!["ANNUAL REPORT", "", "SALES GREW FAST", "CLOSING WORDS"]
    );
    let heading: Vec<_> = doc.paragraphs[0]
        .runs
        .iter()
        .filter(|r| !r.text.is_empty())
        .collect();
    assert_eq!(heading.len(), 1);
    assert_eq!(heading[0].format.bold, Some(true));
    assert_eq!(heading[0].format.font_size, Some(32));

    let cells: Vec<String> = doc.tables[0].cells().map(|c| c.text()).collect();
    assert_eq!(cells, vec!["REGION", "2024"]);

    let xml = String::from_utf8(read_entry(&output, "word/document.xml")).unwrap();
    assert!(xml.contains(r#"<w:pgSz w:w="11906" w:h="16838"/>"#));
    assert!(!xml.contains("TRANSLATION"));
    assert_eq!(read_entry(&output, "word/styles.xml"), b"<w:styles/>");
}

#[test]
fn folder_batch_with_zip_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let in_dir = dir.path().join("in");
    std::fs::create_dir(&in_dir).unwrap();
    write_docx(&in_dir.join("a.docx"), r#"<w:p><w:r><w:t>alpha</w:t></w:r></w:p>"#);
    write_docx(&in_dir.join("b.docx"), r#"<w:p><w:r><w:t>beta</w:t></w:r></w:p>"#);
    std::fs::write(in_dir.join("broken.docx"), b"not a zip").unwrap();
    std::fs::write(in_dir.join("~$a.docx"), b"lock").unwrap();

    let inputs = collect_inputs(&[in_dir.clone()], DEFAULT_OUTPUT_SUFFIX).unwrap();
    assert_eq!(inputs.len(), 3);

    let out_dir = dir.path().join("out");
    let options = TranslateOptions {
        table_mode: TableMode::Skip,
        autosave: false,
        ..Default::default()
    };
    let pass = DocumentTranslator::new(&Shouting, Default::default(), options);
    let batch = run_batch(&inputs, Some(out_dir.as_path()), DEFAULT_OUTPUT_SUFFIX, |input, output| {
        pass.translate_file(input, output, &no_progress)
    });

    assert_eq!(batch.count(OutcomeStatus::Translated), 2);
    assert_eq!(batch.count(OutcomeStatus::Failed), 1);
    let failed = batch
        .documents
        .iter()
        .find(|d| d.status == OutcomeStatus::Failed)
        .unwrap();
    assert!(failed.input.ends_with("broken.docx"));
    assert!(!out_dir.join("broken_translated.docx").exists());

    let archive = out_dir.join("bundle.zip");
    write_zip(&batch.outputs(), &archive).unwrap();
    let mut zip = ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a_translated.docx", "b_translated.docx"]);

    let b = DocxDocument::open(&out_dir.join("b_translated.docx")).unwrap();
    assert_eq!(b.document().paragraph_texts(), vec!["BETA"]);
}
