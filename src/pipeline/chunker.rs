use std::ops::Range;

use crate::docx::Document;

/// A contiguous window of paragraph indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub start: usize,
    pub end: usize,
    /// Raw texts of every paragraph in the window joined by newlines; blank paragraphs
    /// contribute empty lines.
    pub text: String,
}

impl Chunk {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Lazily cuts a document into `[start, start + size)` windows, the last one clipped.
pub struct Chunker<'a> {
    doc: &'a Document,
    size: usize,
    next: usize,
}

impl<'a> Chunker<'a> {
    /// A `size` of zero is treated as one.
    pub fn new(doc: &'a Document, size: usize) -> Self {
        Self {
            doc,
            size: size.max(1),
            next: 0,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.doc.paragraphs.len().div_ceil(self.size)
    }
}

impl Iterator for Chunker<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let total = self.doc.paragraphs.len();
        if self.next >= total {
            return None;
        }
        let start = self.next;
        let end = (start + self.size).min(total);
        self.next = end;
        let text = self.doc.paragraphs[start..end]
            .iter()
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n");
        Some(Chunk { start, end, text })
    }
}

/// Index ranges only, for callers that re-read the document between chunks.
pub fn chunk_ranges(total: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}
