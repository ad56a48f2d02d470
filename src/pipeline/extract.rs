use std::ops::Range;

use crate::docx::Document;

/// A content-bearing paragraph and its position in the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceParagraph {
    pub index: usize,
    pub text: String,
}

/// Content-bearing paragraphs of `range`, in document order.
pub fn content_paragraphs(doc: &Document, range: Range<usize>) -> Vec<SourceParagraph> {
    let end = range.end.min(doc.paragraphs.len());
    let start = range.start.min(end);
    doc.paragraphs[start..end]
        .iter()
        .enumerate()
        .filter(|(_, p)| p.has_content())
        .map(|(offset, p)| SourceParagraph {
            index: start + offset,
            text: p.text(),
        })
        .collect()
}

/// Translation input for `range`: the content-bearing paragraph texts joined by newlines.
pub fn source_text(doc: &Document, range: Range<usize>) -> String {
    content_paragraphs(doc, range)
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whole-document plain text, blank paragraphs left out.
pub fn extract_text(doc: &Document) -> String {
    source_text(doc, 0..doc.paragraphs.len())
}
