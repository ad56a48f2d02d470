//! Event-level view of an XML part.
//!
//! Parsing keeps every event, including declarations, comments and processing
//! instructions, so a part written back without edits matches its source. Text is held
//! unescaped; attribute values are held exactly as they appeared in the source.

use std::borrow::Cow;

use anyhow::Context;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

/// Attributes as `(qualified name, escaped value)` pairs.
pub type Attrs = Vec<(String, String)>;

#[derive(Clone, Debug, PartialEq)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    Start { name: String, attrs: Attrs },
    End { name: String },
    Empty { name: String, attrs: Attrs },
    Text { text: String },
    CData { text: String },
    Comment { text: String },
    PI { content: String },
    DocType { text: String },
}

#[derive(Clone, Debug)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
}

fn lossy(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

fn read_attrs(tag: &BytesStart<'_>) -> anyhow::Result<Attrs> {
    tag.attributes()
        .map(|a| {
            let a = a.context("read attribute")?;
            // Kept escaped: VML payloads carry `&#xD;&#xA;` references that must survive.
            Ok((lossy(a.key.as_ref()), lossy(a.value.as_ref())))
        })
        .collect()
}

fn optional_decl_field<E>(field: Option<Result<Cow<'_, [u8]>, E>>) -> Option<String> {
    field.and_then(Result::ok).map(lossy)
}

impl XmlEvent {
    pub fn start(name: &str, attrs: Attrs) -> Self {
        Self::Start {
            name: name.to_string(),
            attrs,
        }
    }

    pub fn end(name: &str) -> Self {
        Self::End {
            name: name.to_string(),
        }
    }

    pub fn empty(name: &str, attrs: Attrs) -> Self {
        Self::Empty {
            name: name.to_string(),
            attrs,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::Text {
            text: text.to_string(),
        }
    }

    /// `None` for end of input.
    fn from_quick(ev: Event<'_>) -> anyhow::Result<Option<Self>> {
        let out = match ev {
            Event::Eof => return Ok(None),
            Event::Decl(d) => Self::Decl {
                version: lossy(d.version().context("xml declaration version")?),
                encoding: optional_decl_field(d.encoding()),
                standalone: optional_decl_field(d.standalone()),
            },
            Event::Start(tag) => Self::Start {
                name: lossy(tag.name().as_ref()),
                attrs: read_attrs(&tag)?,
            },
            Event::Empty(tag) => Self::Empty {
                name: lossy(tag.name().as_ref()),
                attrs: read_attrs(&tag)?,
            },
            Event::End(tag) => Self::End {
                name: lossy(tag.name().as_ref()),
            },
            Event::Text(t) => Self::Text {
                text: t.unescape().context("unescape text")?.into_owned(),
            },
            Event::CData(t) => Self::CData {
                text: lossy(t.into_inner()),
            },
            Event::Comment(t) => Self::Comment {
                text: lossy(t.into_inner()),
            },
            Event::PI(t) => Self::PI {
                content: format!("{}{}", lossy(t.target()), lossy(t.content())),
            },
            Event::DocType(t) => Self::DocType {
                text: lossy(t.into_inner()),
            },
        };
        Ok(Some(out))
    }

    fn write_into(&self, out: &mut Vec<u8>) -> anyhow::Result<()> {
        match self {
            Self::Decl {
                version,
                encoding,
                standalone,
            } => {
                let decl = BytesDecl::new(version, encoding.as_deref(), standalone.as_deref());
                let mut w = quick_xml::Writer::new(Vec::new());
                w.write_event(Event::Decl(decl)).context("write xml declaration")?;
                out.extend_from_slice(&w.into_inner());
            }
            Self::Start { name, attrs } => write_tag(out, name, attrs, b">"),
            Self::Empty { name, attrs } => write_tag(out, name, attrs, b"/>"),
            Self::End { name } => wrap(out, b"</", name, b">"),
            Self::Text { text } => escape_text(out, text),
            Self::CData { text } => wrap(out, b"<![CDATA[", text, b"]]>"),
            Self::Comment { text } => wrap(out, b"<!--", text, b"-->"),
            Self::PI { content } => wrap(out, b"<?", content, b"?>"),
            Self::DocType { text } => wrap(out, b"<!DOCTYPE", text, b">"),
        }
        Ok(())
    }
}

fn wrap(out: &mut Vec<u8>, open: &[u8], body: &str, close: &[u8]) {
    out.extend_from_slice(open);
    out.extend_from_slice(body.as_bytes());
    out.extend_from_slice(close);
}

fn write_tag(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], close: &[u8]) {
    out.push(b'<');
    out.extend_from_slice(name.as_bytes());
    for (k, v) in attrs {
        out.push(b' ');
        out.extend_from_slice(k.as_bytes());
        wrap(out, b"=\"", v, b"\"");
    }
    out.extend_from_slice(close);
}

fn escape_text(out: &mut Vec<u8>, text: &str) {
    let mut last = 0;
    for (i, b) in text.bytes().enumerate() {
        let rep: &[u8] = match b {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            _ => continue,
        };
        out.extend_from_slice(&text.as_bytes()[last..i]);
        out.extend_from_slice(rep);
        last = i + 1;
    }
    out.extend_from_slice(&text.as_bytes()[last..]);
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlPart> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("{name}: read xml event at byte {}", reader.buffer_position()))?;
        match XmlEvent::from_quick(ev)? {
            Some(ev) => events.push(ev),
            None => break,
        }
    }
    Ok(XmlPart {
        name: name.to_string(),
        events,
    })
}

pub fn write_events(events: &[XmlEvent]) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    for ev in events {
        ev.write_into(&mut out)?;
    }
    Ok(out)
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Attribute value with XML escapes resolved; the raw value if it does not unescape.
pub fn attr_text<'a>(attrs: &'a [(String, String)], key: &str) -> Option<Cow<'a, str>> {
    let raw = find_attr(attrs, key)?;
    Some(quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw)))
}

/// Attribute pair from plain text.
pub fn attr(key: &str, value: &str) -> (String, String) {
    (key.to_string(), quick_xml::escape::escape(value).into_owned())
}
