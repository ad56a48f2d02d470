//! Greedy re-threading of translated lines onto the paragraphs they came from.
//!
//! Backends return flattened text whose line count rarely matches the input exactly.
//! Blank paragraphs and blank translated lines are skipped on both sides; when the
//! lines run out the remaining paragraphs keep their source text.

use serde::Serialize;
use tracing::warn;

use crate::docx::Document;
use crate::textutil::has_content;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AlignmentReport {
    /// Paragraphs whose text was replaced.
    pub replaced: usize,
    /// Content paragraphs left untranslated because the lines ran out.
    pub shortfall: usize,
    /// Content lines never consumed.
    pub surplus: usize,
}

impl AlignmentReport {
    pub fn is_exact(&self) -> bool {
        self.shortfall == 0 && self.surplus == 0
    }
}

/// Writes `lines` into the content paragraphs of `[start, start + chunk_size)`.
///
/// Each consumed line replaces its paragraph's runs with one run per newline-delimited
/// segment, all formatted like the paragraph's first run. Paragraphs without content
/// are never touched, so paragraph count and order are unchanged.
pub fn realign_paragraphs<S: AsRef<str>>(
    doc: &mut Document,
    lines: &[S],
    start: usize,
    chunk_size: usize,
) -> AlignmentReport {
    let end = start.saturating_add(chunk_size).min(doc.paragraphs.len());
    let mut report = AlignmentReport::default();
    let mut j = 0usize;

    for i in start.min(end)..end {
        if !doc.paragraphs[i].has_content() {
            continue;
        }
        while j < lines.len() && !has_content(lines[j].as_ref()) {
            j += 1;
        }
        if j >= lines.len() {
            report.shortfall = doc.paragraphs[i..end]
                .iter()
                .filter(|p| p.has_content())
                .count();
            break;
        }
        doc.paragraphs[i].replace_text(lines[j].as_ref());
        report.replaced += 1;
        j += 1;
    }

    report.surplus = lines
        .iter()
        .skip(j)
        .filter(|l| has_content(l.as_ref()))
        .count();

    if report.shortfall > 0 {
        warn!(
            start,
            end,
            shortfall = report.shortfall,
            "fewer translated lines than paragraphs; the rest keep their source text"
        );
    }
    if report.surplus > 0 {
        warn!(
            start,
            end,
            surplus = report.surplus,
            "translated lines left over after the last paragraph"
        );
    }
    report
}
