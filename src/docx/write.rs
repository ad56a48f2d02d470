use std::collections::HashMap;

use crate::docx::model::{Document, Paragraph, PartSpan, Run, RunOrigin};
use crate::docx::xml::{attr, XmlEvent, XmlPart};

/// Events for `w:t`/`w:tab`/`w:br` carrying `text`.
pub fn text_events(text: &str) -> Vec<XmlEvent> {
    let mut out = Vec::new();
    let mut buf = String::new();

    fn flush(out: &mut Vec<XmlEvent>, buf: &mut String) {
        if buf.is_empty() {
            return;
        }
        out.push(XmlEvent::start("w:t", vec![attr("xml:space", "preserve")]));
        out.push(XmlEvent::text(buf));
        out.push(XmlEvent::end("w:t"));
        buf.clear();
    }

    for ch in text.chars() {
        match ch {
            '\n' => {
                flush(&mut out, &mut buf);
                out.push(XmlEvent::empty("w:br", Vec::new()));
            }
            '\t' => {
                flush(&mut out, &mut buf);
                out.push(XmlEvent::empty("w:tab", Vec::new()));
            }
            '\r' => {}
            _ => buf.push(ch),
        }
    }
    flush(&mut out, &mut buf);
    out
}

fn as_start(ev: &XmlEvent) -> XmlEvent {
    match ev {
        XmlEvent::Empty { name, attrs } => XmlEvent::start(name, attrs.clone()),
        other => other.clone(),
    }
}

fn end_of(ev: &XmlEvent) -> Option<XmlEvent> {
    match ev {
        XmlEvent::Empty { name, .. } | XmlEvent::Start { name, .. } => Some(XmlEvent::end(name)),
        _ => None,
    }
}

fn render_inserted_run(run: &Run, out: &mut Vec<XmlEvent>) {
    out.push(XmlEvent::start("w:r", Vec::new()));
    out.extend(run.format.rpr_events());
    out.extend(text_events(&run.text));
    out.push(XmlEvent::end("w:r"));
}

fn render_source_run(
    events: &[XmlEvent],
    run: &Run,
    span: &PartSpan,
    content: &[std::ops::Range<usize>],
    out: &mut Vec<XmlEvent>,
) {
    if !run.text_changed() {
        out.extend_from_slice(&events[span.start..=span.end]);
        return;
    }
    if span.self_closing {
        out.push(as_start(&events[span.start]));
        out.extend(text_events(&run.text));
        out.extend(end_of(&events[span.start]));
        return;
    }

    let mut emitted = false;
    let mut k = span.start;
    while k <= span.end {
        if let Some(range) = content.iter().find(|r| r.start == k) {
            if !emitted {
                out.extend(text_events(&run.text));
                emitted = true;
            }
            k = range.end;
            continue;
        }
        if k == span.end && !emitted {
            out.extend(text_events(&run.text));
            emitted = true;
        }
        out.push(events[k].clone());
        k += 1;
    }
}

fn render_paragraph(events: &[XmlEvent], paragraph: &Paragraph, span: &PartSpan, out: &mut Vec<XmlEvent>) {
    if span.self_closing {
        let inserted: Vec<&Run> = paragraph
            .runs
            .iter()
            .filter(|r| !r.text.is_empty())
            .collect();
        if inserted.is_empty() {
            out.push(events[span.start].clone());
            return;
        }
        out.push(as_start(&events[span.start]));
        for run in inserted {
            render_inserted_run(run, out);
        }
        out.extend(end_of(&events[span.start]));
        return;
    }

    let mut source_runs: HashMap<usize, (&Run, &PartSpan, &[std::ops::Range<usize>])> = HashMap::new();
    for run in &paragraph.runs {
        if let RunOrigin::Source { span, content, .. } = &run.origin {
            source_runs.insert(span.start, (run, span, content.as_slice()));
        }
    }

    let mut k = span.start;
    while k < span.end {
        if let Some((run, run_span, content)) = source_runs.get(&k) {
            render_source_run(events, run, run_span, content, out);
            k = run_span.end + 1;
            continue;
        }
        out.push(events[k].clone());
        k += 1;
    }
    for run in paragraph.runs.iter().filter(|r| r.is_inserted()) {
        // Empty inserted runs add nothing visible.
        if !run.text.is_empty() {
            render_inserted_run(run, out);
        }
    }
    out.push(events[span.end].clone());
}

/// Re-renders `word/document.xml` with the texts of `doc`.
///
/// Every event outside a modelled paragraph is copied as is. Inside a paragraph, runs
/// whose text did not change are copied as is; changed runs keep their properties and
/// get new text children; runs added by the model are appended at the paragraph's end.
pub fn render_document(part: &XmlPart, doc: &Document) -> Vec<XmlEvent> {
    let mut by_start: HashMap<usize, &Paragraph> = HashMap::new();
    let cell_paragraphs = doc
        .tables
        .iter()
        .flat_map(|t| t.cells())
        .flat_map(|c| c.paragraphs.iter());
    for paragraph in doc.paragraphs.iter().chain(cell_paragraphs) {
        match paragraph.span.as_ref() {
            Some(span) => {
                by_start.insert(span.start, paragraph);
            }
            None => tracing::debug!("paragraph without a source position is not written"),
        }
    }

    let events = &part.events;
    let mut out = Vec::with_capacity(events.len());
    let mut i = 0;
    while i < events.len() {
        if let Some(paragraph) = by_start.get(&i) {
            if let Some(span) = paragraph.span.as_ref() {
                render_paragraph(events, paragraph, span, &mut out);
                i = span.end + 1;
                continue;
            }
        }
        out.push(events[i].clone());
        i += 1;
    }
    out
}
