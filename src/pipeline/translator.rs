use std::path::Path;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{LanguagePair, Translator};
use crate::cancel::CancelToken;
use crate::docx::{Document, DocxDocument};
use crate::error::BackendError;
use crate::progress::ProgressFn;
use crate::textutil::EchoFilter;

use super::chunker::{Chunk, Chunker};
use super::extract::source_text;
use super::invoker::{Invoker, RetryPolicy};
use super::realign::{realign_paragraphs, AlignmentReport};
use super::table::{translate_tables, TableMode, TableReport};
use super::trace::TraceWriter;

pub const DEFAULT_CHUNK_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub struct TranslateOptions {
    /// Paragraphs per backend call.
    pub chunk_size: usize,
    pub table_mode: TableMode,
    /// Write the output after every chunk, not only at the end.
    pub autosave: bool,
    pub echo_markers: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            table_mode: TableMode::default(),
            autosave: true,
            echo_markers: crate::textutil::DEFAULT_ECHO_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            retry: RetryPolicy::default(),
        }
    }
}

/// A chunk whose backend call failed; its paragraphs keep their source text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub start: usize,
    pub end: usize,
    pub error: String,
}

/// A chunk that ran out of translated lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkShortfall {
    pub start: usize,
    pub end: usize,
    pub untranslated: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    pub paragraphs: usize,
    pub chunks: usize,
    pub translated_chunks: usize,
    pub replaced: usize,
    pub shortfall: usize,
    pub surplus: usize,
    pub shortfalls: Vec<ChunkShortfall>,
    pub failures: Vec<ChunkFailure>,
    pub tables: TableReport,
    pub cancelled: bool,
}

impl DocumentReport {
    /// Every chunk and table translated with exact line counts.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
            && self.shortfall == 0
            && !self.cancelled
            && self.tables.is_complete()
    }

    fn absorb(&mut self, chunk: &Chunk, a: AlignmentReport) {
        self.replaced += a.replaced;
        self.shortfall += a.shortfall;
        self.surplus += a.surplus;
        if a.shortfall > 0 {
            self.shortfalls.push(ChunkShortfall {
                start: chunk.start,
                end: chunk.end,
                untranslated: a.shortfall,
            });
        }
    }
}

/// Where a pass reads and writes the document it is translating.
pub trait DocumentHandle {
    fn document_mut(&mut self) -> &mut Document;

    /// Makes the current state durable. Called after chunks when autosaving, and once at
    /// the end of the pass.
    fn persist(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl DocumentHandle for Document {
    fn document_mut(&mut self) -> &mut Document {
        self
    }
}

struct SaveTo<'a> {
    docx: &'a mut DocxDocument,
    path: &'a Path,
}

impl DocumentHandle for SaveTo<'_> {
    fn document_mut(&mut self) -> &mut Document {
        self.docx.document_mut()
    }

    fn persist(&mut self) -> anyhow::Result<()> {
        self.docx
            .save(self.path)
            .with_context(|| format!("write output: {}", self.path.display()))
    }
}

/// Runs translation passes over documents, one chunk at a time.
pub struct DocumentTranslator<'a> {
    translator: &'a dyn Translator,
    languages: LanguagePair,
    options: TranslateOptions,
    cancel: CancelToken,
    trace: TraceWriter,
}

impl<'a> DocumentTranslator<'a> {
    pub fn new(translator: &'a dyn Translator, languages: LanguagePair, options: TranslateOptions) -> Self {
        Self {
            translator,
            languages,
            options,
            cancel: CancelToken::new(),
            trace: TraceWriter::disabled(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_trace(mut self, trace: TraceWriter) -> Self {
        self.trace = trace;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    fn invoker(&self) -> Invoker<'_> {
        Invoker::new(
            self.translator,
            &self.languages,
            EchoFilter::new(self.options.echo_markers.clone()),
            self.options.retry.clone(),
            self.cancel.clone(),
        )
    }

    /// Translates `doc` in place.
    pub fn translate_document(&self, doc: &mut Document, progress: ProgressFn<'_>) -> anyhow::Result<DocumentReport> {
        self.run(doc, "document", progress)
    }

    /// Translates `input` into `output`. The input file is never written.
    pub fn translate_file(&self, input: &Path, output: &Path, progress: ProgressFn<'_>) -> anyhow::Result<DocumentReport> {
        if same_file(input, output) {
            bail!("output path must differ from the input: {}", output.display());
        }
        let mut docx = DocxDocument::open(input)?;
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create output dir: {}", dir.display()))?;
        }
        let label = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mut handle = SaveTo {
            docx: &mut docx,
            path: output,
        };
        self.run(&mut handle, &label, progress)
    }

    /// One pass: paragraphs chunk by chunk, then tables.
    pub fn run(&self, handle: &mut dyn DocumentHandle, label: &str, progress: ProgressFn<'_>) -> anyhow::Result<DocumentReport> {
        let chunk_size = self.options.chunk_size.max(1);
        let chunks: Vec<Chunk> = Chunker::new(handle.document_mut(), chunk_size).collect();
        let total = handle.document_mut().paragraphs.len();
        let invoker = self.invoker();

        let mut report = DocumentReport {
            paragraphs: total,
            chunks: chunks.len(),
            ..Default::default()
        };
        info!(
            document = label,
            paragraphs = total,
            chunks = chunks.len(),
            backend = self.translator.name(),
            source = %self.languages.source_lang,
            target = %self.languages.target_lang,
            "translating"
        );

        for chunk in &chunks {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let doc = handle.document_mut();
            let source = source_text(doc, chunk.range());
            self.trace_chunk(label, chunk, "chunk", &chunk.text);
            self.trace_chunk(label, chunk, "source", &source);

            match invoker.invoke(&source) {
                Ok(result) => {
                    self.trace_chunk(label, chunk, "raw", &result.raw);
                    self.trace_chunk(label, chunk, "lines", &result.text());
                    let alignment = realign_paragraphs(doc, &result.lines, chunk.start, chunk_size);
                    debug!(
                        start = chunk.start,
                        end = chunk.end,
                        replaced = alignment.replaced,
                        attempts = result.attempts,
                        "chunk done"
                    );
                    report.absorb(chunk, alignment);
                    report.translated_chunks += 1;
                }
                Err(BackendError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(start = chunk.start, end = chunk.end, error = %e, "chunk translation failed");
                    report.failures.push(ChunkFailure {
                        start: chunk.start,
                        end: chunk.end,
                        error: e.to_string(),
                    });
                }
            }

            if self.options.autosave {
                handle.persist()?;
            }
            progress(chunk.end, total);
        }

        if !report.cancelled {
            report.tables = translate_tables(handle.document_mut(), &invoker, self.options.table_mode);
            report.cancelled = report.tables.cancelled;
        }
        if report.cancelled {
            warn!(document = label, "translation cancelled; remaining content keeps its source text");
        }

        handle.persist()?;
        info!(
            document = label,
            replaced = report.replaced,
            failed_chunks = report.failures.len(),
            shortfall = report.shortfall,
            surplus = report.surplus,
            cells = report.tables.translated,
            "done"
        );
        Ok(report)
    }

    fn trace_chunk(&self, label: &str, chunk: &Chunk, kind: &str, text: &str) {
        if let Err(e) = self.trace.write_chunk_text(label, chunk.start, chunk.end, kind, text) {
            debug!(error = %e, "trace write failed");
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}
