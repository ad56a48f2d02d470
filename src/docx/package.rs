use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use zip::result::ZipResult;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::DocumentError;

pub const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Clone)]
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

#[derive(Clone)]
pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> Result<Self, DocumentError> {
        let f = File::open(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(f).map_err(|e| e.with_path(path))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        Self::from_reader(Cursor::new(bytes))
    }

    fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, DocumentError> {
        let mut zip = ZipArchive::new(reader).map_err(DocumentError::not_a_package)?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).map_err(DocumentError::not_a_package)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| DocumentError::Malformed(format!("read zip entry {}: {e}", file.name())))?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn entry(&self, name: &str) -> Option<&DocxEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn write_with_replacements(
        &self,
        output_path: &Path,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> Result<(), DocumentError> {
        let f = File::create(output_path).map_err(|source| DocumentError::Io {
            path: output_path.to_path_buf(),
            source,
        })?;
        self.write_into(f, replacements)
            .map_err(|e| DocumentError::Malformed(format!("write {}: {e}", output_path.display())))
    }

    pub fn to_bytes_with_replacements(
        &self,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> Result<Vec<u8>, DocumentError> {
        let mut buf = Cursor::new(Vec::new());
        self.write_into(&mut buf, replacements)
            .map_err(|e| DocumentError::Malformed(format!("write docx bytes: {e}")))?;
        Ok(buf.into_inner())
    }

    fn write_into<W: Write + Seek>(
        &self,
        writer: W,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> ZipResult<()> {
        let mut zout = ZipWriter::new(writer);
        for ent in &self.entries {
            let data = replacements.get(&ent.name).unwrap_or(&ent.data);
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)?;
            } else {
                zout.start_file(ent.name.as_str(), opts)?;
                zout.write_all(data)?;
            }
        }
        zout.finish()?;
        Ok(())
    }
}
