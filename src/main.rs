use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use docx_translator::backend::openai::OpenAiTranslator;
use docx_translator::backend::{Preset, TranslateRequest, Translator};
use docx_translator::docx::DocxDocument;
use docx_translator::error::{classify, ErrorKind};
use docx_translator::logging::init_logging;
use docx_translator::pipeline::batch::{roundtrip_file, DEFAULT_ARCHIVE_NAME};
use docx_translator::pipeline::extract::extract_text;
use docx_translator::pipeline::trace::TraceWriter;
use docx_translator::pipeline::{
    collect_inputs, init_default_config, run_batch, write_zip, BatchReport, DocumentTranslator,
    OutcomeStatus, Overrides, PipelineConfig, TableMode,
};
use docx_translator::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "docx-translator")]
#[command(about = "Translate .docx documents paragraph by paragraph, keeping run formatting", long_about = None)]
struct Args {
    /// Input .docx files or folders of .docx files
    #[arg(value_name = "DOCX")]
    inputs: Vec<PathBuf>,

    /// Output directory (default: next to each input)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Direction preset: en-zh or zh-en
    #[arg(long, value_parser = parse_preset)]
    preset: Option<Preset>,

    /// Source language name (e.g. English)
    #[arg(long)]
    source_lang: Option<String>,

    /// Target language name (e.g. Chinese)
    #[arg(long)]
    target_lang: Option<String>,

    /// Country/region whose register the translation follows
    #[arg(long)]
    locale: Option<String>,

    /// Paragraphs per backend call
    #[arg(long)]
    chunk_size: Option<usize>,

    /// per_cell, whole_table or skip
    #[arg(long, value_parser = parse_table_mode)]
    table_mode: Option<TableMode>,

    /// Chat model name
    #[arg(long)]
    model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Single-pass translation (skip reflect + improve)
    #[arg(long)]
    no_reflect: bool,

    /// Config file path (default: search for docx-translator.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generate default config + prompt files into DIR (default: current directory), then exit
    #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = ".")]
    init_config: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Bundle all outputs into one zip (default name in the output directory)
    #[arg(long, value_name = "ZIP", num_args = 0..=1, default_missing_value = "")]
    zip: Option<PathBuf>,

    /// Write the batch report as JSON
    #[arg(long, value_name = "JSON")]
    report_json: Option<PathBuf>,

    /// Print paragraph counts and exit (no translation)
    #[arg(long)]
    count_paragraphs: bool,

    /// Print the content-bearing paragraph texts and exit (no translation)
    #[arg(long)]
    extract_text: bool,

    /// Translate "Hello, world!" with the configured backend and exit
    #[arg(long)]
    check_backend: bool,

    /// Only open + re-save each document (no translation)
    #[arg(long)]
    roundtrip_only: bool,

    /// Write the output once at the end instead of after every chunk
    #[arg(long)]
    no_autosave: bool,

    /// Dump per-chunk source/raw/filtered text into the trace directory
    #[arg(long)]
    trace: bool,

    /// Debug logging for this crate
    #[arg(short, long)]
    verbose: bool,

    /// No progress lines
    #[arg(short, long)]
    quiet: bool,
}

fn parse_preset(s: &str) -> Result<Preset, String> {
    Preset::parse(s).ok_or_else(|| format!("unknown preset: {s} (en-zh | zh-en)"))
}

fn parse_table_mode(s: &str) -> Result<TableMode, String> {
    TableMode::parse(s).ok_or_else(|| format!("unknown table mode: {s} (per_cell | whole_table | skip)"))
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            config_path: self.config.clone(),
            preset: self.preset,
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            locale: self.locale.clone(),
            chunk_size: self.chunk_size,
            table_mode: self.table_mode,
            no_autosave: self.no_autosave,
            trace: self.trace,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            no_reflect: self.no_reflect,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            let kind = classify(&e);
            eprintln!("{}: {e:#}", kind.label());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    if let Some(dir) = args.init_config.as_ref() {
        let cfg_path = init_default_config(dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let workdir = args
        .inputs
        .first()
        .and_then(|p| if p.is_dir() { Some(p.as_path()) } else { p.parent() })
        .filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let cfg = PipelineConfig::resolve(&workdir, &args.overrides()).context("build config")?;
    if let Some(p) = cfg.config_path.as_ref() {
        tracing::debug!(config = %p.display(), "config loaded");
    }

    if args.check_backend {
        return check_backend(&cfg);
    }

    if args.inputs.is_empty() {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        eprintln!(
            "\n\nUSAGE:\n  docx-translator <input.docx|folder>...\n\nTIPS:\n  - Default config search: docx-translator.toml (upwards), or set DOCX_TRANSLATOR_CONFIG.\n  - The API key is read from the variable named by backend.api_key_env (OPENAI_API_KEY).\n"
        );
        return Ok(ExitCode::SUCCESS);
    }

    let inputs = collect_inputs(&args.inputs, &cfg.output_suffix)?;

    if args.count_paragraphs || args.extract_text {
        let failed = inspect(&inputs, args.count_paragraphs, args.extract_text);
        return Ok(if failed > 0 {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    let progress = ConsoleProgress::new(!args.quiet);
    let out_dir = args.output_dir.as_deref();

    let mut batch = if args.roundtrip_only {
        run_batch(&inputs, out_dir, &cfg.output_suffix, roundtrip_file)
    } else {
        let backend = OpenAiTranslator::new(cfg.backend.clone(), cfg.prompts.clone())
            .context("create backend")?;
        let trace = match cfg.trace_dir.clone() {
            Some(dir) => TraceWriter::new(dir, true)?,
            None => TraceWriter::disabled(),
        };
        let pass = DocumentTranslator::new(&backend, cfg.languages.clone(), cfg.options.clone())
            .with_trace(trace);
        run_batch(&inputs, out_dir, &cfg.output_suffix, |input, output| {
            let label = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let report = progress.reporter(&label);
            pass.translate_file(input, output, &report)
        })
    };

    if let Some(zip) = args.zip.as_ref() {
        let archive = if zip.as_os_str().is_empty() {
            out_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| workdir.clone())
                .join(DEFAULT_ARCHIVE_NAME)
        } else {
            zip.clone()
        };
        let outputs = batch.outputs();
        if outputs.is_empty() {
            tracing::warn!("no outputs to bundle");
        } else {
            write_zip(&outputs, &archive)?;
            progress.info(format!("Wrote archive: {}", archive.display()));
            batch.archive = Some(archive);
        }
    }

    if let Some(path) = args.report_json.as_ref() {
        batch.write_json(path)?;
    }

    summarize(&batch);
    Ok(if batch.count(OutcomeStatus::Failed) > 0 {
        ExitCode::FAILURE
    } else if batch.count(OutcomeStatus::Partial) > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

/// Prints counts or text per document. A document that cannot be opened is reported
/// and skipped; returns how many were.
fn inspect(inputs: &[PathBuf], count: bool, text: bool) -> usize {
    let mut failed = 0usize;
    for input in inputs {
        let docx = match DocxDocument::open(input) {
            Ok(d) => d,
            Err(e) => {
                failed += 1;
                let e = anyhow::Error::new(e);
                eprintln!("{}: {}: {e:#}", classify(&e).label(), input.display());
                continue;
            }
        };
        let doc = docx.document();
        if count {
            println!(
                "{}: {} paragraphs ({} with content)",
                input.display(),
                doc.paragraphs.len(),
                doc.content_paragraph_count()
            );
        }
        if text {
            println!("{}", extract_text(doc));
        }
    }
    failed
}

fn check_backend(cfg: &PipelineConfig) -> anyhow::Result<ExitCode> {
    let backend = OpenAiTranslator::new(cfg.backend.clone(), cfg.prompts.clone())
        .context("create backend")?;
    let req = TranslateRequest {
        languages: &cfg.languages,
        source_text: "Hello, world!",
    };
    match backend.translate(&req) {
        Ok(text) => {
            println!("{} ({}): {}", backend.name(), cfg.backend.model, text.trim());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let err = anyhow::Error::new(e).context(format!("backend check against {}", cfg.backend.base_url));
            eprintln!("{}: {err:#}", ErrorKind::Backend.label());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn summarize(batch: &BatchReport) {
    for doc in &batch.documents {
        let input = doc.input.display();
        match doc.status {
            OutcomeStatus::Translated => {
                if let Some(out) = doc.output.as_ref() {
                    eprintln!("translated: {input} -> {}", out.display());
                }
            }
            OutcomeStatus::Partial => {
                let out = doc
                    .output
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                eprintln!("partial translation: {input} -> {out}");
                if let Some(r) = doc.report.as_ref() {
                    for f in &r.failures {
                        eprintln!("  failed paragraphs {}..{}: {}", f.start, f.end, f.error);
                    }
                    for s in &r.shortfalls {
                        eprintln!(
                            "  paragraphs {}..{}: {} left untranslated (too few lines returned)",
                            s.start, s.end, s.untranslated
                        );
                    }
                    let t = &r.tables;
                    if !t.failed.is_empty() || t.unassigned > 0 || t.surplus > 0 {
                        eprintln!(
                            "  tables: {} cells failed, {} cells unassigned, {} surplus lines dropped",
                            t.failed.len(),
                            t.unassigned,
                            t.surplus
                        );
                    }
                    if r.cancelled {
                        eprintln!("  cancelled before completion");
                    }
                }
            }
            OutcomeStatus::Failed => {
                let label = doc.error_kind.unwrap_or(ErrorKind::Other).label();
                eprintln!(
                    "{label}: {input}: {}",
                    doc.error.as_deref().unwrap_or_default()
                );
            }
        }
    }
    eprintln!(
        "{} translated, {} partial, {} failed",
        batch.count(OutcomeStatus::Translated),
        batch.count(OutcomeStatus::Partial),
        batch.count(OutcomeStatus::Failed)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_reports_every_unreadable_document() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.docx");
        let broken = dir.path().join("broken.docx");
        std::fs::write(&broken, b"not a zip").unwrap();
        let legacy = dir.path().join("old.doc");
        std::fs::write(&legacy, b"x").unwrap();

        assert_eq!(inspect(&[missing, broken, legacy], true, false), 3);
        assert_eq!(inspect(&[], true, true), 0);
    }
}
