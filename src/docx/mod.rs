pub mod format;
pub mod model;
pub mod package;
pub mod read;
pub mod write;
pub mod xml;

use std::collections::HashMap;
use std::path::Path;

use crate::error::DocumentError;
use package::{DocxPackage, DOCUMENT_PART};
use xml::{parse_xml_part, write_events, XmlPart};

pub use format::{copy_run_format, RunFormat};
pub use model::{Cell, CellWrite, Document, Paragraph, Row, Run, Table};

/// Rejects anything that is not an existing `.docx` file before it is opened.
pub fn check_input_path(path: &Path) -> Result<(), DocumentError> {
    if !path.is_file() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "docx" => Ok(()),
        "doc" => Err(DocumentError::LegacyFormat(path.to_path_buf())),
        _ => Err(DocumentError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// An opened word-processing package with its main document part parsed into the model.
///
/// All other parts are carried through untouched when the document is saved.
pub struct DocxDocument {
    package: DocxPackage,
    part: XmlPart,
    document: Document,
}

impl DocxDocument {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        check_input_path(path)?;
        let package = DocxPackage::read(path)?;
        Self::from_package(package).map_err(|e| e.with_path(path))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        Self::from_package(DocxPackage::from_bytes(bytes)?)
    }

    fn from_package(package: DocxPackage) -> Result<Self, DocumentError> {
        let entry = package
            .entry(DOCUMENT_PART)
            .ok_or_else(|| DocumentError::MissingPart {
                part: DOCUMENT_PART.to_string(),
                path: Default::default(),
            })?;
        let part = parse_xml_part(DOCUMENT_PART, &entry.data)
            .map_err(|e| DocumentError::Malformed(format!("{DOCUMENT_PART}: {e:#}")))?;
        let document = read::read_document(&part);
        Ok(Self {
            package,
            part,
            document,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn replacements(&self) -> Result<HashMap<String, Vec<u8>>, DocumentError> {
        let events = write::render_document(&self.part, &self.document);
        let bytes = write_events(&events)
            .map_err(|e| DocumentError::Malformed(format!("{DOCUMENT_PART}: {e:#}")))?;
        Ok(HashMap::from([(DOCUMENT_PART.to_string(), bytes)]))
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let replacements = self.replacements()?;
        self.package.write_with_replacements(path, &replacements)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let replacements = self.replacements()?;
        self.package.to_bytes_with_replacements(&replacements)
    }
}
