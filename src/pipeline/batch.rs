//! Several documents in one run: folder expansion, output naming, per-document outcomes
//! and the optional zip bundle.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Serialize;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::docx::DocxDocument;
use crate::error::{classify, ErrorKind};

use super::translator::DocumentReport;

pub const DEFAULT_OUTPUT_SUFFIX: &str = "_translated";
pub const DEFAULT_ARCHIVE_NAME: &str = "translated_documents.zip";

/// `<stem><suffix>.docx`, next to the input unless `out_dir` is given.
pub fn output_path_for(input: &Path, out_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}{suffix}.docx"))
}

fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("~$"))
        .unwrap_or(false)
}

fn has_docx_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("docx"))
        .unwrap_or(false)
}

/// Expands directories into their `.docx` files (not recursive, Office lock files and
/// earlier outputs carrying `suffix` left out). Files are passed through unchecked so
/// their problems are reported per document.
pub fn collect_inputs(paths: &[PathBuf], suffix: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if !path.is_dir() {
            out.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        let entries = std::fs::read_dir(path).with_context(|| format!("read dir: {}", path.display()))?;
        for entry in entries {
            let p = entry.with_context(|| format!("read dir: {}", path.display()))?.path();
            let is_output = !suffix.is_empty()
                && p.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.ends_with(suffix))
                    .unwrap_or(false);
            if p.is_file() && has_docx_extension(&p) && !is_lock_file(&p) && !is_output {
                found.push(p);
            }
        }
        found.sort();
        if found.is_empty() {
            warn!(dir = %path.display(), "no .docx files found");
        }
        out.extend(found);
    }
    Ok(out)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Translated,
    /// Output written, but some content kept its source text.
    Partial,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct DocumentOutcome {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DocumentReport>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
}

impl BatchReport {
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.documents.iter().filter(|d| d.status == status).count()
    }

    /// Outputs that exist on disk (translated or partial).
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.documents
            .iter()
            .filter(|d| d.status != OutcomeStatus::Failed)
            .filter_map(|d| d.output.clone())
            .collect()
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self).context("serialize report")?;
        std::fs::write(path, text).with_context(|| format!("write report: {}", path.display()))
    }
}

/// Runs `process(input, output)` for every input. One document failing does not stop
/// the others. An input whose output path was already claimed by an earlier input fails
/// without being processed.
pub fn run_batch<F>(inputs: &[PathBuf], out_dir: Option<&Path>, suffix: &str, mut process: F) -> BatchReport
where
    F: FnMut(&Path, &Path) -> anyhow::Result<DocumentReport>,
{
    let mut batch = BatchReport::default();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    for (idx, input) in inputs.iter().enumerate() {
        let output = output_path_for(input, out_dir, suffix);
        if let Some(first) = claimed.get(&output) {
            let error = format!(
                "output {} collides with the output of {}",
                output.display(),
                first.display()
            );
            warn!(input = %input.display(), "{error}");
            batch.documents.push(DocumentOutcome {
                input: input.clone(),
                output: None,
                status: OutcomeStatus::Failed,
                error_kind: Some(ErrorKind::Input),
                error: Some(error),
                report: None,
            });
            continue;
        }
        claimed.insert(output.clone(), input.clone());
        info!(
            n = idx + 1,
            of = inputs.len(),
            input = %input.display(),
            output = %output.display(),
            "document"
        );
        let outcome = match process(input, &output) {
            Ok(report) => DocumentOutcome {
                input: input.clone(),
                output: Some(output),
                status: if report.is_complete() {
                    OutcomeStatus::Translated
                } else {
                    OutcomeStatus::Partial
                },
                error_kind: None,
                error: None,
                report: Some(report),
            },
            Err(e) => {
                let kind = classify(&e);
                warn!(input = %input.display(), kind = ?kind, "document failed: {e:#}");
                DocumentOutcome {
                    input: input.clone(),
                    output: output.exists().then_some(output),
                    status: OutcomeStatus::Failed,
                    error_kind: Some(kind),
                    error: Some(format!("{e:#}")),
                    report: None,
                }
            }
        };
        batch.documents.push(outcome);
    }
    batch
}

/// Opens and re-saves without translating.
pub fn roundtrip_file(input: &Path, output: &Path) -> anyhow::Result<DocumentReport> {
    let docx = DocxDocument::open(input)?;
    docx.save(output)
        .with_context(|| format!("write output: {}", output.display()))?;
    Ok(DocumentReport {
        paragraphs: docx.document().paragraphs.len(),
        ..Default::default()
    })
}

/// `name`, or `<stem>_<n>.<ext>` with the first `n` not yet in `taken`.
fn unique_entry_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    (2..)
        .map(|n| format!("{stem}_{n}{ext}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Bundles `files` into `archive`, each entry named by its file name. Files from
/// different folders that share a name get a numbered entry name.
pub fn write_zip(files: &[PathBuf], archive: &Path) -> anyhow::Result<()> {
    if let Some(dir) = archive.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("create dir: {}", dir.display()))?;
    }
    let f = File::create(archive).with_context(|| format!("create archive: {}", archive.display()))?;
    let mut zout = ZipWriter::new(f);
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut taken = HashSet::new();
    for file in files {
        let base = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid file name: {}", file.display()))?;
        let name = unique_entry_name(base, &taken);
        if name != base {
            warn!(file = %file.display(), entry = %name, "duplicate file name in archive; renamed");
        }
        let data = std::fs::read(file).with_context(|| format!("read: {}", file.display()))?;
        zout.start_file(name.as_str(), opts)
            .with_context(|| format!("zip entry: {name}"))?;
        zout.write_all(&data)
            .with_context(|| format!("zip entry: {name}"))?;
        taken.insert(name);
    }
    zout.finish().context("finish archive")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::testdoc::{package_with_body, paragraphs};
    use crate::error::DocumentError;

    #[test]
    fn output_naming() {
        assert_eq!(
            output_path_for(Path::new("/docs/report.docx"), None, DEFAULT_OUTPUT_SUFFIX),
            PathBuf::from("/docs/report_translated.docx")
        );
        assert_eq!(
            output_path_for(Path::new("/docs/report.docx"), Some(Path::new("/out")), "_zh"),
            PathBuf::from("/out/report_zh.docx")
        );
    }

    #[test]
    fn folder_expansion_skips_lock_files_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.docx", "a.DOCX", "~$a.docx", "notes.txt", "a_translated.docx"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.docx")).unwrap();
        let got = collect_inputs(&[dir.path().to_path_buf()], DEFAULT_OUTPUT_SUFFIX).unwrap();
        let names: Vec<String> = got
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.DOCX", "b.docx"]);

        let explicit = vec![PathBuf::from("missing.doc")];
        assert_eq!(collect_inputs(&explicit, "_translated").unwrap(), explicit);
    }

    #[test]
    fn batch_keeps_going_and_classifies_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.docx");
        std::fs::write(&good, package_with_body(&paragraphs(&["Hi"]))).unwrap();
        let legacy = dir.path().join("old.doc");
        std::fs::write(&legacy, b"x").unwrap();

        let batch = run_batch(&[legacy.clone(), good.clone()], None, "_translated", roundtrip_file);
        assert_eq!(batch.documents.len(), 2);
        assert_eq!(batch.documents[0].status, OutcomeStatus::Failed);
        assert_eq!(batch.documents[0].error_kind, Some(ErrorKind::Input));
        assert!(batch.documents[0].output.is_none());
        assert_eq!(batch.documents[1].status, OutcomeStatus::Translated);
        assert_eq!(batch.outputs(), vec![dir.path().join("good_translated.docx")]);
        assert_eq!(batch.count(OutcomeStatus::Failed), 1);

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["documents"][0]["status"], "failed");
        assert_eq!(json["documents"][0]["error_kind"], "input");
        assert_eq!(json["documents"][1]["report"]["paragraphs"], 1);
    }

    #[test]
    fn partial_report_marks_partial_status() {
        let batch = run_batch(&[PathBuf::from("a.docx")], Some(Path::new("/nonexistent")), "_t", |_, _| {
            Ok(DocumentReport {
                shortfall: 1,
                ..Default::default()
            })
        });
        assert_eq!(batch.documents[0].status, OutcomeStatus::Partial);
    }

    #[test]
    fn zip_bundle_contains_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a_translated.docx");
        let b = dir.path().join("b_translated.docx");
        std::fs::write(&a, b"aaa").unwrap();
        std::fs::write(&b, b"bbb").unwrap();
        let archive = dir.path().join("bundle").join(DEFAULT_ARCHIVE_NAME);
        write_zip(&[a, b], &archive).unwrap();

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["a_translated.docx", "b_translated.docx"]);
    }

    #[test]
    fn inputs_sharing_an_output_name_fail_after_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut inputs = Vec::new();
        for sub in ["q1", "q2"] {
            let d = dir.path().join(sub);
            std::fs::create_dir(&d).unwrap();
            let input = d.join("report.docx");
            std::fs::write(&input, package_with_body(&paragraphs(&[sub]))).unwrap();
            inputs.push(input);
        }
        let out_dir = dir.path().join("out");

        let mut processed = Vec::new();
        let batch = run_batch(&inputs, Some(out_dir.as_path()), "_translated", |input, output| {
            processed.push(input.to_path_buf());
            roundtrip_file(input, output)
        });

        assert_eq!(processed, vec![inputs[0].clone()]);
        assert_eq!(batch.documents[0].status, OutcomeStatus::Translated);
        let second = &batch.documents[1];
        assert_eq!(second.status, OutcomeStatus::Failed);
        assert_eq!(second.error_kind, Some(ErrorKind::Input));
        assert!(second.output.is_none());
        assert!(second.error.as_deref().unwrap().contains("collides"));
        assert_eq!(batch.outputs(), vec![out_dir.join("report_translated.docx")]);

        let archive = dir.path().join("bundle.zip");
        write_zip(&batch.outputs(), &archive).unwrap();
    }

    #[test]
    fn zip_entries_with_the_same_file_name_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for sub in ["q1", "q2"] {
            let d = dir.path().join(sub);
            std::fs::create_dir(&d).unwrap();
            let f = d.join("report_translated.docx");
            std::fs::write(&f, sub.as_bytes()).unwrap();
            files.push(f);
        }
        let archive = dir.path().join(DEFAULT_ARCHIVE_NAME);
        write_zip(&files, &archive).unwrap();

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["report_translated.docx", "report_translated_2.docx"]);
    }

    #[test]
    fn roundtrip_of_missing_file_is_input_error() {
        let err = roundtrip_file(Path::new("/nonexistent/x.docx"), Path::new("/tmp/never.docx")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DocumentError>(),
            Some(DocumentError::NotFound(_))
        ));
    }
}
