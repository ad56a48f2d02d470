//! The translation collaborator: a blocking call taking source text, a language pair and
//! a locale hint, returning translated text.

pub mod openai;

use crate::error::BackendError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguagePair {
    pub source_lang: String,
    pub target_lang: String,
    /// Country/region whose register the translation should follow.
    pub locale: String,
}

impl LanguagePair {
    pub fn new(source_lang: &str, target_lang: &str, locale: &str) -> Self {
        Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            locale: locale.to_string(),
        }
    }
}

impl Default for LanguagePair {
    fn default() -> Self {
        Preset::EnZh.languages()
    }
}

/// Direction presets offered by the upload front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    EnZh,
    ZhEn,
}

impl Preset {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en-zh" | "en2zh" => Some(Self::EnZh),
            "zh-en" | "zh2en" => Some(Self::ZhEn),
            _ => None,
        }
    }

    pub fn languages(self) -> LanguagePair {
        match self {
            Self::EnZh => LanguagePair::new("English", "Chinese", "China"),
            Self::ZhEn => LanguagePair::new("Chinese", "English", "United States"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TranslateRequest<'a> {
    pub languages: &'a LanguagePair,
    pub source_text: &'a str,
}

pub trait Translator {
    fn name(&self) -> &str;

    /// May be slow and is not expected to preserve the input's line count.
    fn translate(&self, req: &TranslateRequest<'_>) -> Result<String, BackendError>;
}

impl<T: Translator + ?Sized> Translator for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn translate(&self, req: &TranslateRequest<'_>) -> Result<String, BackendError> {
        (**self).translate(req)
    }
}

impl<T: Translator + ?Sized> Translator for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn translate(&self, req: &TranslateRequest<'_>) -> Result<String, BackendError> {
        (**self).translate(req)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    use super::{TranslateRequest, Translator};
    use crate::error::BackendError;

    /// Answers from a lookup table first, then from a queue of scripted replies, and
    /// records every source text it was asked to translate.
    #[derive(Default)]
    pub struct ScriptedTranslator {
        pub by_input: HashMap<String, String>,
        pub replies: RefCell<VecDeque<Result<String, BackendError>>>,
        pub calls: RefCell<Vec<String>>,
    }

    impl ScriptedTranslator {
        pub fn with_replies(replies: Vec<Result<String, BackendError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                ..Default::default()
            }
        }

        pub fn with_table(pairs: &[(&str, &str)]) -> Self {
            Self {
                by_input: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl Translator for ScriptedTranslator {
        fn name(&self) -> &str {
            "scripted"
        }

        fn translate(&self, req: &TranslateRequest<'_>) -> Result<String, BackendError> {
            self.calls.borrow_mut().push(req.source_text.to_string());
            if let Some(out) = self.by_input.get(req.source_text) {
                return Ok(out.clone());
            }
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::InvalidResponse("no scripted reply".into())))
        }
    }
}
