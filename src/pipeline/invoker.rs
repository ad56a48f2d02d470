use std::time::Duration;

use tracing::warn;

use crate::backend::{LanguagePair, TranslateRequest, Translator};
use crate::cancel::CancelToken;
use crate::error::BackendError;
use crate::textutil::{has_content, EchoFilter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << retry.min(16))
    }
}

/// Backend output split into lines, echo lines removed. Blank lines are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranslationResult {
    pub lines: Vec<String>,
    pub raw: String,
    pub attempts: u32,
}

impl TranslationResult {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Calls the translator for one block of source text.
pub struct Invoker<'a> {
    translator: &'a dyn Translator,
    languages: &'a LanguagePair,
    filter: EchoFilter,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl<'a> Invoker<'a> {
    pub fn new(
        translator: &'a dyn Translator,
        languages: &'a LanguagePair,
        filter: EchoFilter,
        retry: RetryPolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            translator,
            languages,
            filter,
            retry,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Blank input returns an empty result without a backend call.
    pub fn invoke(&self, source_text: &str) -> Result<TranslationResult, BackendError> {
        if !has_content(source_text) {
            return Ok(TranslationResult::default());
        }
        let req = TranslateRequest {
            languages: self.languages,
            source_text,
        };
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(BackendError::Cancelled);
            }
            attempt += 1;
            match self.translator.translate(&req) {
                Ok(raw) => {
                    return Ok(TranslationResult {
                        lines: self.filter.lines(&raw),
                        raw,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() && attempt <= self.retry.max_retries => {
                    let delay = self.retry.delay(attempt - 1);
                    warn!(
                        backend = self.translator.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "backend call failed, retrying"
                    );
                    if !self.cancel.sleep(delay) {
                        return Err(BackendError::Cancelled);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::ScriptedTranslator;

    fn invoker<'a>(t: &'a ScriptedTranslator, langs: &'a LanguagePair, retry: RetryPolicy) -> Invoker<'a> {
        Invoker::new(t, langs, EchoFilter::default(), retry, CancelToken::new())
    }

    #[test]
    fn filters_echo_lines() {
        let t = ScriptedTranslator::with_replies(vec![Ok("TRANSLATE\nHello\nWorld".into())]);
        let langs = LanguagePair::default();
        let res = invoker(&t, &langs, RetryPolicy::none()).invoke("Bonjour\nMonde").unwrap();
        assert_eq!(res.lines, vec!["Hello", "World"]);
        assert_eq!(res.attempts, 1);
        assert_eq!(t.calls(), vec!["Bonjour\nMonde"]);
    }

    #[test]
    fn blank_input_skips_backend() {
        let t = ScriptedTranslator::default();
        let langs = LanguagePair::default();
        let res = invoker(&t, &langs, RetryPolicy::none()).invoke(" \n ").unwrap();
        assert!(res.lines.is_empty());
        assert!(t.calls().is_empty());
    }

    #[test]
    fn retries_transient_failures() {
        let t = ScriptedTranslator::with_replies(vec![
            Err(BackendError::Request("reset".into())),
            Err(BackendError::Status {
                status: 503,
                message: String::new(),
            }),
            Ok("ok".into()),
        ]);
        let langs = LanguagePair::default();
        let retry = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        };
        let res = invoker(&t, &langs, retry).invoke("x").unwrap();
        assert_eq!(res.lines, vec!["ok"]);
        assert_eq!(res.attempts, 3);
    }

    #[test]
    fn gives_up_after_budget_or_on_fatal_error() {
        let t = ScriptedTranslator::with_replies(vec![
            Err(BackendError::Request("a".into())),
            Err(BackendError::Request("b".into())),
        ]);
        let langs = LanguagePair::default();
        let retry = RetryPolicy {
            max_retries: 1,
            backoff: Duration::from_millis(1),
        };
        let err = invoker(&t, &langs, retry).invoke("x").unwrap_err();
        assert!(matches!(err, BackendError::Request(m) if m == "b"));

        let t = ScriptedTranslator::with_replies(vec![Err(BackendError::Auth("key".into()))]);
        let err = invoker(&t, &langs, RetryPolicy::default()).invoke("x").unwrap_err();
        assert!(matches!(err, BackendError::Auth(_)));
        assert_eq!(t.calls().len(), 1);
    }

    #[test]
    fn cancelled_token_stops_before_calling() {
        let t = ScriptedTranslator::with_replies(vec![Ok("never".into())]);
        let langs = LanguagePair::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let inv = Invoker::new(&t, &langs, EchoFilter::default(), RetryPolicy::none(), cancel);
        assert!(matches!(inv.invoke("x"), Err(BackendError::Cancelled)));
        assert!(t.calls().is_empty());
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay(0), Duration::from_millis(500));
        assert_eq!(p.delay(1), Duration::from_millis(1000));
        assert_eq!(p.delay(2), Duration::from_millis(2000));
    }
}
