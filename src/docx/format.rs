use crate::docx::xml::{attr, attr_text, find_attr, XmlEvent};

/// Character formatting carried by a run. `None` means "inherit from the style chain".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunFormat {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    /// Half-points, as stored in `w:sz`.
    pub font_size: Option<u32>,
    /// ASCII / high-ANSI typeface.
    pub font_name: Option<String>,
    pub east_asia_font: Option<String>,
    /// Hex RGB (`"FF0000"`) or `"auto"`.
    pub color: Option<String>,
    pub all_caps: Option<bool>,
    pub small_caps: Option<bool>,
    pub strike: Option<bool>,
}

impl RunFormat {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = Some(italic);
        self
    }

    pub fn with_font_size_pt(mut self, points: u32) -> Self {
        self.font_size = Some(points * 2);
        self
    }

    pub fn font_size_pt(&self) -> Option<f32> {
        self.font_size.map(|hp| hp as f32 / 2.0)
    }

    /// Folds one direct child of `w:rPr` into the format.
    pub fn apply_property(&mut self, name: &str, attrs: &[(String, String)]) {
        match name {
            "w:b" => self.bold = Some(on_off(attrs)),
            "w:i" => self.italic = Some(on_off(attrs)),
            "w:caps" => self.all_caps = Some(on_off(attrs)),
            "w:smallCaps" => self.small_caps = Some(on_off(attrs)),
            "w:strike" => self.strike = Some(on_off(attrs)),
            "w:u" => {
                let val = find_attr(attrs, "w:val").unwrap_or("single");
                self.underline = Some(val != "none");
            }
            "w:sz" => {
                self.font_size = find_attr(attrs, "w:val").and_then(|v| v.trim().parse().ok());
            }
            "w:color" => {
                self.color = find_attr(attrs, "w:val").map(|v| v.to_string());
            }
            "w:rFonts" => {
                self.font_name = attr_text(attrs, "w:ascii")
                    .or_else(|| attr_text(attrs, "w:hAnsi"))
                    .map(|v| v.into_owned());
                self.east_asia_font = attr_text(attrs, "w:eastAsia").map(|v| v.into_owned());
            }
            _ => {}
        }
    }

    /// `w:rPr` element for a freshly written run; empty when nothing is set.
    /// Children follow the CT_RPr sequence order.
    pub fn rpr_events(&self) -> Vec<XmlEvent> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut out = vec![XmlEvent::start("w:rPr", Vec::new())];
        if self.font_name.is_some() || self.east_asia_font.is_some() {
            let mut attrs = Vec::new();
            if let Some(name) = self.font_name.as_deref() {
                attrs.push(attr("w:ascii", name));
                attrs.push(attr("w:hAnsi", name));
            }
            if let Some(name) = self.east_asia_font.as_deref() {
                attrs.push(attr("w:eastAsia", name));
            }
            out.push(XmlEvent::empty("w:rFonts", attrs));
        }
        push_on_off(&mut out, "w:b", self.bold);
        push_on_off(&mut out, "w:i", self.italic);
        push_on_off(&mut out, "w:caps", self.all_caps);
        push_on_off(&mut out, "w:smallCaps", self.small_caps);
        push_on_off(&mut out, "w:strike", self.strike);
        if let Some(color) = self.color.as_deref() {
            out.push(XmlEvent::empty("w:color", vec![attr("w:val", color)]));
        }
        if let Some(sz) = self.font_size {
            out.push(XmlEvent::empty("w:sz", vec![attr("w:val", &sz.to_string())]));
        }
        if let Some(u) = self.underline {
            let val = if u { "single" } else { "none" };
            out.push(XmlEvent::empty("w:u", vec![attr("w:val", val)]));
        }
        out.push(XmlEvent::end("w:rPr"));
        out
    }
}

/// Copies every formatting attribute from `source` onto `target`. Optional typographic
/// values (size, fonts, color) only overwrite when the source sets them.
pub fn copy_run_format(source: &RunFormat, target: &mut RunFormat) {
    target.bold = source.bold;
    target.italic = source.italic;
    target.underline = source.underline;
    if source.font_size.is_some() {
        target.font_size = source.font_size;
    }
    if source.font_name.is_some() {
        target.font_name = source.font_name.clone();
    }
    if source.east_asia_font.is_some() {
        target.east_asia_font = source.east_asia_font.clone();
    }
    if source.color.is_some() {
        target.color = source.color.clone();
    }
    target.all_caps = source.all_caps;
    target.small_caps = source.small_caps;
    target.strike = source.strike;
}

fn on_off(attrs: &[(String, String)]) -> bool {
    match find_attr(attrs, "w:val") {
        None => true,
        Some(v) => !matches!(v.trim(), "0" | "false" | "off"),
    }
}

fn push_on_off(out: &mut Vec<XmlEvent>, name: &str, value: Option<bool>) {
    match value {
        Some(true) => out.push(XmlEvent::empty(name, Vec::new())),
        Some(false) => out.push(XmlEvent::empty(name, vec![attr("w:val", "0")])),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::write_events;

    fn a(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn reads_on_off_and_values() {
        let mut f = RunFormat::default();
        f.apply_property("w:b", &[]);
        f.apply_property("w:i", &[a("w:val", "0")]);
        f.apply_property("w:u", &[a("w:val", "double")]);
        f.apply_property("w:sz", &[a("w:val", "24")]);
        f.apply_property("w:color", &[a("w:val", "FF0000")]);
        f.apply_property("w:rFonts", &[a("w:ascii", "Arial"), a("w:eastAsia", "SimSun")]);
        f.apply_property("w:strike", &[a("w:val", "false")]);

        assert_eq!(f.bold, Some(true));
        assert_eq!(f.italic, Some(false));
        assert_eq!(f.underline, Some(true));
        assert_eq!(f.font_size, Some(24));
        assert_eq!(f.font_size_pt(), Some(12.0));
        assert_eq!(f.color.as_deref(), Some("FF0000"));
        assert_eq!(f.font_name.as_deref(), Some("Arial"));
        assert_eq!(f.east_asia_font.as_deref(), Some("SimSun"));
        assert_eq!(f.strike, Some(false));
        assert_eq!(f.all_caps, None);
    }

    #[test]
    fn underline_none_reads_as_off() {
        let mut f = RunFormat::default();
        f.apply_property("w:u", &[a("w:val", "none")]);
        assert_eq!(f.underline, Some(false));
    }

    #[test]
    fn empty_format_writes_no_rpr() {
        assert!(RunFormat::default().rpr_events().is_empty());
    }

    #[test]
    fn rpr_written_in_schema_order() {
        let f = RunFormat {
            bold: Some(true),
            italic: Some(false),
            font_size: Some(24),
            font_name: Some("Times New Roman".into()),
            color: Some("00FF00".into()),
            underline: Some(true),
            ..Default::default()
        };
        let xml = String::from_utf8(write_events(&f.rpr_events()).unwrap()).unwrap();
        assert_eq!(
            xml,
            concat!(
                r#"<w:rPr><w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman"/>"#,
                r#"<w:b/><w:i w:val="0"/><w:color w:val="00FF00"/><w:sz w:val="24"/>"#,
                r#"<w:u w:val="single"/></w:rPr>"#
            )
        );
    }

    #[test]
    fn copy_keeps_target_values_the_source_leaves_unset() {
        let source = RunFormat::default().with_bold(true);
        let mut target = RunFormat {
            font_size: Some(20),
            italic: Some(true),
            ..Default::default()
        };
        copy_run_format(&source, &mut target);
        assert_eq!(target.bold, Some(true));
        assert_eq!(target.italic, None);
        assert_eq!(target.font_size, Some(20));
    }
}
