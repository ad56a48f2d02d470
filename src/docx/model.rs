//! In-memory view of a word-processing document: body paragraphs in order and the
//! top-level tables of the body.
//!
//! Paragraphs and runs read from a package remember where they live in the part's
//! event stream so the writer can re-emit everything it did not touch verbatim.

use std::ops::Range;

use crate::docx::format::{copy_run_format, RunFormat};
use crate::textutil::has_content;

#[derive(Clone, Debug, Default)]
pub struct Document {
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<Table>,
}

impl Document {
    /// Unstyled document, one single-run paragraph per entry.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self {
            paragraphs: texts.iter().map(|t| Paragraph::from_text(t.as_ref())).collect(),
            tables: Vec::new(),
        }
    }

    pub fn paragraph_texts(&self) -> Vec<String> {
        self.paragraphs.iter().map(Paragraph::text).collect()
    }

    pub fn content_paragraph_count(&self) -> usize {
        self.paragraphs.iter().filter(|p| p.has_content()).count()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PartSpan {
    pub start: usize,
    pub end: usize,
    pub self_closing: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RunOrigin {
    /// Read from the part; `content` holds the event ranges of the run's own text
    /// children (`w:t`, `w:tab`, `w:br`, ...).
    Source {
        span: PartSpan,
        content: Vec<Range<usize>>,
        original_text: String,
    },
    Inserted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    pub text: String,
    pub format: RunFormat,
    pub(crate) origin: RunOrigin,
}

impl Run {
    /// A run that does not exist in the source part yet.
    pub fn new(text: &str, format: RunFormat) -> Self {
        Self {
            text: text.to_string(),
            format,
            origin: RunOrigin::Inserted,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self.origin, RunOrigin::Inserted)
    }

    pub(crate) fn text_changed(&self) -> bool {
        match &self.origin {
            RunOrigin::Source { original_text, .. } => *original_text != self.text,
            RunOrigin::Inserted => true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub(crate) span: Option<PartSpan>,
}

impl Paragraph {
    pub fn from_text(text: &str) -> Self {
        Self::from_runs(vec![Run::new(text, RunFormat::default())])
    }

    pub fn from_runs(runs: Vec<Run>) -> Self {
        Self { runs, span: None }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn has_content(&self) -> bool {
        self.runs.iter().any(|r| has_content(&r.text))
    }

    /// Guarantees at least one run so there is a format to clone from.
    pub fn ensure_run(&mut self) -> &mut Run {
        if self.runs.is_empty() {
            self.runs.push(Run::new("", RunFormat::default()));
        }
        &mut self.runs[0]
    }

    /// Blanks the text of every run; the runs themselves stay in place.
    pub fn clear_text(&mut self) {
        for run in &mut self.runs {
            run.text.clear();
        }
    }

    /// Replaces the paragraph's text with `text`, one new run per newline-delimited
    /// segment, each carrying the formatting of the paragraph's first run. Every segment
    /// after the first starts with a line break, so the paragraph text round-trips.
    pub fn replace_text(&mut self, text: &str) {
        let template = self.ensure_run().format.clone();
        self.clear_text();
        for (k, segment) in text.split('\n').enumerate() {
            let mut format = RunFormat::default();
            copy_run_format(&template, &mut format);
            let run_text = if k == 0 {
                segment.to_string()
            } else {
                format!("\n{segment}")
            };
            self.runs.push(Run::new(&run_text, format));
        }
    }

    /// Puts `text` into the first run and blanks the others. Embedded newlines stay in
    /// the run and are written as line breaks.
    pub fn set_text(&mut self, text: &str) {
        self.ensure_run();
        self.clear_text();
        self.runs[0].text = text.to_string();
    }
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows.iter().flat_map(|r| r.cells.iter())
    }

    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).sum()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, Default)]
pub struct Cell {
    pub paragraphs: Vec<Paragraph>,
}

/// How a cell write landed in its paragraphs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellWrite {
    /// One line per paragraph, or a single-paragraph cell.
    Distributed,
    /// Line count did not match a multi-paragraph cell; everything went into the first
    /// paragraph and the rest were blanked.
    Collapsed,
}

impl Cell {
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self {
            paragraphs: texts.iter().map(|t| Paragraph::from_text(t.as_ref())).collect(),
        }
    }

    /// Paragraph texts joined with newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn set_text(&mut self, text: &str) -> CellWrite {
        if self.paragraphs.is_empty() {
            self.paragraphs.push(Paragraph::default());
        }
        let lines: Vec<&str> = text.split('\n').collect();
        if self.paragraphs.len() > 1 && lines.len() == self.paragraphs.len() {
            for (p, line) in self.paragraphs.iter_mut().zip(lines) {
                p.set_text(line);
            }
            return CellWrite::Distributed;
        }
        self.paragraphs[0].set_text(text);
        for p in self.paragraphs.iter_mut().skip(1) {
            p.clear_text();
        }
        if self.paragraphs.len() > 1 {
            CellWrite::Collapsed
        } else {
            CellWrite::Distributed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_text_and_content() {
        let p = Paragraph::from_runs(vec![
            Run::new("Hello ", RunFormat::default()),
            Run::new("world", RunFormat::default()),
        ]);
        assert_eq!(p.text(), "Hello world");
        assert!(p.has_content());
        assert!(!Paragraph::from_text(" \t ").has_content());
        assert!(!Paragraph::default().has_content());
    }

    #[test]
    fn replace_text_materializes_dummy_run() {
        let mut p = Paragraph::default();
        p.replace_text("a\nb");
        assert_eq!(p.runs.len(), 3);
        assert_eq!(p.runs[0].text, "");
        assert_eq!(p.runs[2].text, "\nb");
        assert_eq!(p.text(), "a\nb");
    }

    #[test]
    fn cell_write_distributes_matching_lines() {
        let mut cell = Cell::from_texts(&["one", "two"]);
        assert_eq!(cell.set_text("un\ndeux"), CellWrite::Distributed);
        assert_eq!(cell.paragraphs[0].text(), "un");
        assert_eq!(cell.paragraphs[1].text(), "deux");
    }

    #[test]
    fn cell_write_collapses_mismatched_lines() {
        let mut cell = Cell::from_texts(&["one", "two"]);
        assert_eq!(cell.set_text("un deux"), CellWrite::Collapsed);
        assert_eq!(cell.paragraphs[0].text(), "un deux");
        assert_eq!(cell.paragraphs[1].text(), "");
        assert_eq!(cell.paragraphs.len(), 2);
    }
}
