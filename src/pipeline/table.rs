use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::docx::{Cell, CellWrite, Document, Table};
use crate::error::BackendError;
use crate::pipeline::invoker::Invoker;
use crate::textutil::{has_content, has_word_char};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableMode {
    /// One backend call per cell that contains a word character.
    #[default]
    PerCell,
    /// One call per table; lines are assigned back to cells by position.
    WholeTable,
    Skip,
}

impl TableMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_cell" | "cell" => Some(Self::PerCell),
            "whole_table" | "table" => Some(Self::WholeTable),
            "skip" | "none" | "off" => Some(Self::Skip),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerCell => "per_cell",
            Self::WholeTable => "whole_table",
            Self::Skip => "skip",
        }
    }
}

/// Position of a cell (or of a whole table when `row`/`cell` are `None`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CellFailure {
    pub table: usize,
    pub row: Option<usize>,
    pub cell: Option<usize>,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub tables: usize,
    /// Cells whose text was replaced.
    pub translated: usize,
    /// Cells without any word character.
    pub skipped: usize,
    pub failed: Vec<CellFailure>,
    /// Whole-table mode: cells left with their source text because the translation had
    /// fewer lines than the table has cells.
    pub unassigned: usize,
    /// Multi-paragraph cells whose translation was merged into the first paragraph.
    pub collapsed: usize,
    /// Whole-table mode: non-blank lines left over after every cell was filled. Logged,
    /// not counted against completeness.
    pub surplus: usize,
    pub cancelled: bool,
}

impl TableReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.unassigned == 0 && !self.cancelled
    }
}

/// Translates every top-level table of `doc` in `mode`.
pub fn translate_tables(doc: &mut Document, invoker: &Invoker<'_>, mode: TableMode) -> TableReport {
    let mut report = TableReport {
        tables: doc.tables.len(),
        ..Default::default()
    };
    if mode == TableMode::Skip {
        return report;
    }
    for (ti, table) in doc.tables.iter_mut().enumerate() {
        match mode {
            TableMode::PerCell => translate_per_cell(ti, table, invoker, &mut report),
            TableMode::WholeTable => translate_whole_table(ti, table, invoker, &mut report),
            TableMode::Skip => {}
        }
        if report.cancelled {
            break;
        }
    }
    report
}

fn note_collapse(report: &mut TableReport, write: CellWrite, ti: usize, ri: usize, ci: usize) {
    if write == CellWrite::Collapsed {
        report.collapsed += 1;
        warn!(
            table = ti,
            row = ri,
            cell = ci,
            "line count differs from the cell's paragraphs; text merged into the first one"
        );
    }
}

fn translate_per_cell(ti: usize, table: &mut Table, invoker: &Invoker<'_>, report: &mut TableReport) {
    for (ri, row) in table.rows.iter_mut().enumerate() {
        for (ci, cell) in row.cells.iter_mut().enumerate() {
            let text = cell.text();
            if !has_word_char(&text) {
                report.skipped += 1;
                continue;
            }
            match invoker.invoke(&text) {
                Ok(result) => {
                    let write = cell.set_text(&result.text());
                    note_collapse(report, write, ti, ri, ci);
                    report.translated += 1;
                }
                Err(BackendError::Cancelled) => {
                    report.cancelled = true;
                    return;
                }
                Err(e) => {
                    warn!(table = ti, row = ri, cell = ci, error = %e, "cell translation failed");
                    report.failed.push(CellFailure {
                        table: ti,
                        row: Some(ri),
                        cell: Some(ci),
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

/// One line per cell paragraph; breaks inside a paragraph are flattened to spaces.
fn cell_lines(cell: &Cell) -> Vec<String> {
    if cell.paragraphs.is_empty() {
        return vec![String::new()];
    }
    cell.paragraphs
        .iter()
        .map(|p| p.text().replace(['\r', '\n'], " "))
        .collect()
}

fn translate_whole_table(ti: usize, table: &mut Table, invoker: &Invoker<'_>, report: &mut TableReport) {
    let per_cell: Vec<Vec<String>> = table.cells().map(cell_lines).collect();
    let block = per_cell.iter().flatten().cloned().collect::<Vec<_>>().join("\n");
    if !has_word_char(&block) {
        report.skipped += per_cell.len();
        return;
    }
    let result = match invoker.invoke(&block) {
        Ok(r) => r,
        Err(BackendError::Cancelled) => {
            report.cancelled = true;
            return;
        }
        Err(e) => {
            warn!(table = ti, error = %e, "table translation failed");
            report.failed.push(CellFailure {
                table: ti,
                row: None,
                cell: None,
                error: e.to_string(),
            });
            return;
        }
    };

    let expected: usize = per_cell.iter().map(Vec::len).sum();
    let mut next = 0usize;
    let mut cells = 0usize;
    let mut unassigned = 0usize;
    for (ri, row) in table.rows.iter_mut().enumerate() {
        for (ci, cell) in row.cells.iter_mut().enumerate() {
            let want = per_cell[cells].len();
            cells += 1;
            let Some(lines) = result.lines.get(next..next + want) else {
                unassigned += 1;
                next = result.lines.len();
                continue;
            };
            next += want;
            let write = cell.set_text(&lines.join("\n"));
            note_collapse(report, write, ti, ri, ci);
            report.translated += 1;
        }
    }
    let surplus = result.lines[next.min(result.lines.len())..]
        .iter()
        .filter(|l| has_content(l))
        .count();
    debug!(table = ti, cells, expected, lines = result.lines.len(), "whole-table assignment");
    report.unassigned += unassigned;
    report.surplus += surplus;
    if unassigned > 0 {
        warn!(
            table = ti,
            unassigned,
            cells,
            expected,
            lines = result.lines.len(),
            "translated table has fewer lines than cell paragraphs; the rest keep their source text"
        );
    }
    if surplus > 0 {
        warn!(
            table = ti,
            surplus,
            expected,
            lines = result.lines.len(),
            "translated table has more lines than cell paragraphs; the extra lines were dropped"
        );
    }
}
