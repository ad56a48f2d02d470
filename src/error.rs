//! Error taxonomy for a translation pass.
//!
//! Input problems are fatal for the document they concern. Backend problems are
//! recorded per chunk (or per cell) and the pass moves on.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Problems with the input document itself. No output is produced.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported file format: {path} (expected .docx)")]
    UnsupportedFormat { path: PathBuf },

    #[error("legacy .doc input: {0} (convert it to .docx before translating)")]
    LegacyFormat(PathBuf),

    #[error("not a word-processing package: {0}")]
    NotAPackage(String),

    #[error("missing part {part} in {path}")]
    MissingPart { part: String, path: PathBuf },

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    pub(crate) fn not_a_package(err: zip::result::ZipError) -> Self {
        Self::NotAPackage(err.to_string())
    }

    pub(crate) fn with_path(self, path: &Path) -> Self {
        match self {
            Self::NotAPackage(msg) => Self::NotAPackage(format!("{}: {msg}", path.display())),
            Self::Malformed(msg) => Self::Malformed(format!("{}: {msg}", path.display())),
            Self::MissingPart { part, .. } => Self::MissingPart {
                part,
                path: path.to_path_buf(),
            },
            other => other,
        }
    }
}

/// Failures of the translation collaborator.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("backend responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("translation cancelled")]
    Cancelled,
}

impl BackendError {
    /// Transport failures, server errors and rate limiting are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::RateLimited(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Auth(_) | Self::InvalidResponse(_) | Self::Cancelled => false,
        }
    }
}

/// Category of a document-level failure, as reported to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    Backend,
    Other,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Input => "input error",
            Self::Backend => "backend error",
            Self::Other => "error",
        }
    }
}

pub fn classify(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if cause.downcast_ref::<DocumentError>().is_some() {
            return ErrorKind::Input;
        }
        if cause.downcast_ref::<BackendError>().is_some() {
            return ErrorKind::Backend;
        }
    }
    ErrorKind::Other
}
