use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::PromptsSection;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

pub const DEFAULT_INITIAL: &str = "initial.txt";
pub const DEFAULT_REFLECT: &str = "reflect.txt";
pub const DEFAULT_IMPROVE: &str = "improve.txt";

/// User-prompt templates for the bundled chat backend. Placeholders use `{{name}}`.
#[derive(Clone, Debug)]
pub struct PromptSet {
    pub initial: String,
    pub reflect: String,
    pub improve: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_TEXT.to_string(),
            reflect: DEFAULT_REFLECT_TEXT.to_string(),
            improve: DEFAULT_IMPROVE_TEXT.to_string(),
        }
    }
}

impl PromptSet {
    /// Built-in templates, replaced by any file the `[prompts]` section names.
    /// Relative paths are resolved against `config_dir`.
    pub fn load(config_dir: &Path, p: &PromptsSection) -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            initial: read_prompt(config_dir, "initial", p.initial.as_deref())?
                .unwrap_or(defaults.initial),
            reflect: read_prompt(config_dir, "reflect", p.reflect.as_deref())?
                .unwrap_or(defaults.reflect),
            improve: read_prompt(config_dir, "improve", p.improve.as_deref())?
                .unwrap_or(defaults.improve),
        })
    }
}

fn read_prompt(config_dir: &Path, key: &str, configured: Option<&str>) -> anyhow::Result<Option<String>> {
    let Some(rel) = configured.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let mut path = PathBuf::from(rel);
    if path.is_relative() {
        path = config_dir.join(&path);
    }
    if !path.exists() {
        return Err(anyhow!(
            "prompt file not found for {key}: {} (run: docx-translator --init-config)",
            path.display()
        ));
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("read prompt: {}", path.display()))?;
    Ok(Some(text))
}

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (DEFAULT_INITIAL, DEFAULT_INITIAL_TEXT),
        (DEFAULT_REFLECT, DEFAULT_REFLECT_TEXT),
        (DEFAULT_IMPROVE, DEFAULT_IMPROVE_TEXT),
    ]
}

pub const SYSTEM_TRANSLATOR: &str =
    "You are an expert linguist, specializing in translation from {{source_lang}} to {{target_lang}}.";

pub const SYSTEM_REVIEWER: &str = "You are an expert linguist specializing in translation from {{source_lang}} to {{target_lang}}. You will be provided with a source text and its translation and your goal is to improve the translation.";

pub const DEFAULT_INITIAL_TEXT: &str = r#"This is a {{source_lang}} to {{target_lang}} translation, please provide the {{target_lang}} translation for this text.
Do not provide any explanations or text apart from the translation.
Keep one output line per input line, in the same order.

{{source_lang}}: {{source_text}}

{{target_lang}}:"#;

pub const DEFAULT_REFLECT_TEXT: &str = r#"Your task is to carefully read a source text and a translation from {{source_lang}} to {{target_lang}}, and then give constructive criticism and helpful suggestions to improve the translation.
The final style and tone of the translation should match the style of {{target_lang}} colloquially spoken in {{country}}.

The source text and initial translation, delimited by XML tags <SOURCE_TEXT></SOURCE_TEXT> and <TRANSLATION></TRANSLATION>, are as follows:

<SOURCE_TEXT>
{{source_text}}
</SOURCE_TEXT>

<TRANSLATION>
{{translation_1}}
</TRANSLATION>

When writing suggestions, pay attention to whether there are ways to improve the translation's
(i) accuracy (by correcting errors of addition, mistranslation, omission, or untranslated text),
(ii) fluency (by applying {{target_lang}} grammar, spelling and punctuation rules, and ensuring there are no unnecessary repetitions),
(iii) style (by ensuring the translations reflect the style of the source text and take into account any cultural context),
(iv) terminology (by ensuring terminology use is consistent and reflects the source text domain; and by only ensuring you use equivalent idioms in {{target_lang}}).

Write a list of specific, helpful and constructive suggestions for improving the translation.
Each suggestion should address one specific part of the translation.
Output only the suggestions and nothing else."#;

pub const DEFAULT_IMPROVE_TEXT: &str = r#"Your task is to carefully read, then edit, a translation from {{source_lang}} to {{target_lang}}, taking into account a list of expert suggestions and constructive criticisms.

The source text, the initial translation, and the expert linguist suggestions are delimited by XML tags <SOURCE_TEXT></SOURCE_TEXT>, <TRANSLATION></TRANSLATION> and <EXPERT_SUGGESTIONS></EXPERT_SUGGESTIONS> as follows:

<SOURCE_TEXT>
{{source_text}}
</SOURCE_TEXT>

<TRANSLATION>
{{translation_1}}
</TRANSLATION>

<EXPERT_SUGGESTIONS>
{{reflection}}
</EXPERT_SUGGESTIONS>

Please take into account the expert suggestions when editing the translation. Keep one output line per source line, in the same order.

Output only the new translation and nothing else."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_every_occurrence() {
        let out = render_template(
            "{{a}} and {{a}} then {{b}} but not {{c}}",
            &[("a", "x"), ("b", "y")],
        );
        assert_eq!(out, "x and x then y but not {{c}}");
    }

    #[test]
    fn defaults_without_overrides() {
        let set = PromptSet::load(Path::new("."), &PromptsSection::default()).unwrap();
        assert_eq!(set.initial, DEFAULT_INITIAL_TEXT);
        assert!(set.reflect.contains("{{country}}"));
        assert!(set.improve.contains("{{reflection}}"));
    }

    #[test]
    fn override_is_read_relative_to_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("prompts")).unwrap();
        std::fs::write(dir.path().join("prompts/mine.txt"), "custom {{source_text}}").unwrap();
        let section = PromptsSection {
            initial: Some("prompts/mine.txt".into()),
            ..Default::default()
        };
        let set = PromptSet::load(dir.path(), &section).unwrap();
        assert_eq!(set.initial, "custom {{source_text}}");
        assert_eq!(set.reflect, DEFAULT_REFLECT_TEXT);
    }

    #[test]
    fn missing_override_is_an_error() {
        let section = PromptsSection {
            improve: Some("nope/improve.txt".into()),
            ..Default::default()
        };
        let err = PromptSet::load(Path::new("/nonexistent"), &section).unwrap_err();
        assert!(err.to_string().contains("improve"));
    }
}
