use std::ops::Range;

use crate::docx::format::RunFormat;
use crate::docx::model::{Cell, Document, Paragraph, PartSpan, Row, Run, RunOrigin, Table};
use crate::docx::xml::{find_attr, XmlEvent, XmlPart};

struct ParaCapture {
    start: usize,
    depth: usize,
    in_cell: bool,
    hyperlink_depth: Option<usize>,
    runs: Vec<Run>,
}

struct RunCapture {
    start: usize,
    depth: usize,
    format: RunFormat,
    text: String,
    content: Vec<Range<usize>>,
    rpr_depth: Option<usize>,
    open_content: Option<usize>,
}

impl RunCapture {
    fn new(start: usize, depth: usize) -> Self {
        Self {
            start,
            depth,
            format: RunFormat::default(),
            text: String::new(),
            content: Vec::new(),
            rpr_depth: None,
            open_content: None,
        }
    }

    fn finish(self, end: usize, self_closing: bool) -> Run {
        Run {
            format: self.format,
            origin: RunOrigin::Source {
                span: PartSpan {
                    start: self.start,
                    end,
                    self_closing,
                },
                content: self.content,
                original_text: self.text.clone(),
            },
            text: self.text,
        }
    }
}

/// Run children that stand for text. Page and column breaks are layout, not text, and
/// are carried over unchanged when the run is rewritten.
fn is_text_control(name: &str, attrs: &[(String, String)]) -> bool {
    match name {
        "w:tab" | "w:ptab" | "w:cr" | "w:noBreakHyphen" | "w:softHyphen" => true,
        "w:br" => find_attr(attrs, "w:type").unwrap_or("textWrapping") == "textWrapping",
        _ => false,
    }
}

fn control_append(buf: &mut String, name: &str) {
    match name {
        "w:tab" | "w:ptab" => buf.push('\t'),
        "w:cr" | "w:br" => buf.push('\n'),
        "w:noBreakHyphen" => buf.push('-'),
        _ => {}
    }
}

#[derive(Default)]
struct Reader {
    doc: Document,
    stack: Vec<String>,
    tbl_nesting: usize,
    table: Option<Table>,
    row: Option<Row>,
    cell: Option<Cell>,
    para: Option<ParaCapture>,
    run: Option<RunCapture>,
}

impl Reader {
    fn parent(&self) -> &str {
        self.stack.last().map(|s| s.as_str()).unwrap_or("")
    }

    fn paragraph_slot(&self, name: &str) -> Option<bool> {
        if name != "w:p" || self.para.is_some() {
            return None;
        }
        let parent = self.parent();
        if parent == "w:body" && self.tbl_nesting == 0 {
            Some(false)
        } else if parent == "w:tc" && self.tbl_nesting == 1 && self.cell.is_some() {
            Some(true)
        } else {
            None
        }
    }

    fn run_starts_here(&self, name: &str, depth: usize) -> bool {
        let Some(p) = self.para.as_ref() else {
            return false;
        };
        name == "w:r"
            && self.run.is_none()
            && (depth == p.depth + 1 || p.hyperlink_depth.map(|h| h + 1) == Some(depth))
    }

    fn push_paragraph(&mut self, paragraph: Paragraph, in_cell: bool) {
        if in_cell {
            if let Some(cell) = self.cell.as_mut() {
                cell.paragraphs.push(paragraph);
            }
        } else {
            self.doc.paragraphs.push(paragraph);
        }
    }

    fn open_structure(&mut self, name: &str) {
        if self.para.is_some() {
            if name == "w:tbl" {
                self.tbl_nesting += 1;
            }
            return;
        }
        let parent = self.parent().to_string();
        match name {
            "w:tbl" => {
                if parent == "w:body" && self.tbl_nesting == 0 {
                    self.table = Some(Table::default());
                }
                self.tbl_nesting += 1;
            }
            "w:tr" if parent == "w:tbl" && self.tbl_nesting == 1 && self.table.is_some() => {
                self.row = Some(Row::default());
            }
            "w:tc" if parent == "w:tr" && self.tbl_nesting == 1 && self.row.is_some() => {
                self.cell = Some(Cell::default());
            }
            _ => {}
        }
    }

    fn close_structure(&mut self, name: &str) {
        let parent = self.parent().to_string();
        match name {
            "w:tbl" => {
                self.tbl_nesting = self.tbl_nesting.saturating_sub(1);
                if self.tbl_nesting == 0 && parent == "w:body" {
                    if let Some(table) = self.table.take() {
                        self.doc.tables.push(table);
                    }
                }
            }
            "w:tr" if self.tbl_nesting == 1 && parent == "w:tbl" && self.para.is_none() => {
                if let (Some(row), Some(table)) = (self.row.take(), self.table.as_mut()) {
                    table.rows.push(row);
                }
            }
            "w:tc" if self.tbl_nesting == 1 && parent == "w:tr" && self.para.is_none() => {
                if let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) {
                    row.cells.push(cell);
                }
            }
            _ => {}
        }
    }

    fn on_start(&mut self, idx: usize, name: &str, attrs: &[(String, String)]) {
        let depth = self.stack.len();
        if let Some(in_cell) = self.paragraph_slot(name) {
            self.para = Some(ParaCapture {
                start: idx,
                depth,
                in_cell,
                hyperlink_depth: None,
                runs: Vec::new(),
            });
        } else {
            self.open_structure(name);
        }

        if self.run_starts_here(name, depth) {
            self.run = Some(RunCapture::new(idx, depth));
        } else if let Some(r) = self.run.as_mut() {
            if depth == r.depth + 1 {
                match name {
                    "w:rPr" => r.rpr_depth = Some(depth),
                    "w:t" => r.open_content = Some(idx),
                    n if is_text_control(n, attrs) => {
                        control_append(&mut r.text, n);
                        r.open_content = Some(idx);
                    }
                    _ => {}
                }
            } else if r.rpr_depth.map(|d| d + 1) == Some(depth) {
                r.format.apply_property(name, attrs);
            }
        } else if let Some(p) = self.para.as_mut() {
            if name == "w:hyperlink" && depth == p.depth + 1 {
                p.hyperlink_depth = Some(depth);
            }
        }

        self.stack.push(name.to_string());
    }

    fn on_empty(&mut self, idx: usize, name: &str, attrs: &[(String, String)]) {
        let depth = self.stack.len();
        if let Some(in_cell) = self.paragraph_slot(name) {
            let paragraph = Paragraph {
                runs: Vec::new(),
                span: Some(PartSpan {
                    start: idx,
                    end: idx,
                    self_closing: true,
                }),
            };
            self.push_paragraph(paragraph, in_cell);
            return;
        }
        if name == "w:tc" && self.para.is_none() && self.tbl_nesting == 1 && self.parent() == "w:tr" {
            if let Some(row) = self.row.as_mut() {
                row.cells.push(Cell::default());
            }
            return;
        }

        if self.run_starts_here(name, depth) {
            let run = RunCapture::new(idx, depth).finish(idx, true);
            if let Some(p) = self.para.as_mut() {
                p.runs.push(run);
            }
        } else if let Some(r) = self.run.as_mut() {
            if depth == r.depth + 1 {
                if name == "w:t" {
                    r.content.push(idx..idx + 1);
                } else if is_text_control(name, attrs) {
                    control_append(&mut r.text, name);
                    r.content.push(idx..idx + 1);
                }
            } else if r.rpr_depth.map(|d| d + 1) == Some(depth) {
                r.format.apply_property(name, attrs);
            }
        }
    }

    fn on_text(&mut self, text: &str) {
        let depth = self.stack.len();
        if let Some(r) = self.run.as_mut() {
            if r.open_content.is_some() && depth == r.depth + 2 && self.stack.last().map(|s| s.as_str()) == Some("w:t") {
                r.text.push_str(text);
            }
        }
    }

    fn on_end(&mut self, idx: usize, name: &str) {
        let _ = self.stack.pop();
        let depth = self.stack.len();

        // Tables inside text boxes only move the nesting counter.
        if name == "w:tbl" && self.para.is_some() {
            self.tbl_nesting = self.tbl_nesting.saturating_sub(1);
            return;
        }

        if let Some(r) = self.run.as_mut() {
            if depth == r.depth + 1 {
                if let Some(start) = r.open_content.take() {
                    r.content.push(start..idx + 1);
                }
                if name == "w:rPr" {
                    r.rpr_depth = None;
                }
            }
            if name == "w:r" && depth == r.depth {
                if let Some(r) = self.run.take() {
                    let run = r.finish(idx, false);
                    if let Some(p) = self.para.as_mut() {
                        p.runs.push(run);
                    }
                }
            }
            return;
        }

        if let Some(p) = self.para.as_mut() {
            if name == "w:hyperlink" && p.hyperlink_depth == Some(depth) {
                p.hyperlink_depth = None;
            }
            if name == "w:p" && depth == p.depth {
                if let Some(p) = self.para.take() {
                    let paragraph = Paragraph {
                        runs: p.runs,
                        span: Some(PartSpan {
                            start: p.start,
                            end: idx,
                            self_closing: false,
                        }),
                    };
                    self.push_paragraph(paragraph, p.in_cell);
                }
            }
            return;
        }

        self.close_structure(name);
    }
}

/// Builds the model from the events of `word/document.xml`: direct body paragraphs,
/// top-level tables, and the direct paragraphs of their cells.
pub fn read_document(part: &XmlPart) -> Document {
    let mut reader = Reader::default();
    for (idx, ev) in part.events.iter().enumerate() {
        match ev {
            XmlEvent::Start { name, attrs } => reader.on_start(idx, name, attrs),
            XmlEvent::Empty { name, attrs } => reader.on_empty(idx, name, attrs),
            XmlEvent::Text { text } => reader.on_text(text),
            XmlEvent::End { name } => reader.on_end(idx, name),
            _ => {}
        }
    }
    reader.doc
}
