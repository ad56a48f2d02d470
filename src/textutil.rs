use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w").expect("word"));

/// Marker tokens the backend is known to echo back on their own line.
pub const DEFAULT_ECHO_MARKERS: [&str; 2] = ["TRANSLATION", "TRANSLATE"];

pub fn has_content(text: &str) -> bool {
    !text.trim().is_empty()
}

pub fn has_word_char(text: &str) -> bool {
    WORD_RE.is_match(text)
}

/// Drops instruction echoes from raw backend output.
///
/// A line is dropped when it contains any marker as a substring, so a genuine line that
/// happens to contain one is lost too.
#[derive(Clone, Debug)]
pub struct EchoFilter {
    markers: Vec<String>,
}

impl Default for EchoFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl EchoFilter {
    pub fn new(markers: Vec<String>) -> Self {
        let markers = markers
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }

    pub fn is_echo(&self, line: &str) -> bool {
        self.markers.iter().any(|m| line.contains(m.as_str()))
    }

    /// Splits on line breaks and keeps every non-echo line, blank lines included.
    pub fn lines(&self, raw: &str) -> Vec<String> {
        raw.split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .filter(|l| !self.is_echo(l))
            .map(str::to_string)
            .collect()
    }

    pub fn filter(&self, raw: &str) -> String {
        self.lines(raw).join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_bare_marker_line() {
        let f = EchoFilter::default();
        assert_eq!(f.lines("TRANSLATE\nHello\nWorld"), vec!["Hello", "World"]);
    }

    #[test]
    fn drops_any_line_containing_a_marker() {
        let f = EchoFilter::default();
        assert_eq!(
            f.lines("<TRANSLATION>\nBonjour\nA TRANSLATED line\n</TRANSLATION>"),
            vec!["Bonjour"]
        );
        assert_eq!(f.lines("TRANSLATE this: ok\nfine"), vec!["fine"]);
    }

    #[test]
    fn keeps_blank_lines_and_strips_cr() {
        let f = EchoFilter::default();
        assert_eq!(f.lines("a\r\n\r\nb"), vec!["a", "", "b"]);
        assert_eq!(f.filter("a\r\nTRANSLATION\r\nb"), "a\nb");
    }

    #[test]
    fn custom_markers_ignore_blanks() {
        let f = EchoFilter::new(vec!["<OUT>".into(), "  ".into()]);
        assert_eq!(f.lines("<OUT>\nx\n  y"), vec!["x", "  y"]);
        assert!(!f.is_echo("TRANSLATE"));
    }

    #[test]
    fn word_and_content_predicates() {
        assert!(has_content(" a "));
        assert!(!has_content("\t \n"));
        assert!(has_word_char("Hi there"));
        assert!(has_word_char("中文"));
        assert!(!has_word_char("-- / --"));
    }
}
