//! Unified error types for routemux.
//!
//! Defines [`RoutemuxError`] (command-level failures), [`ValidationError`]
//! for config validation failures, and [`ForwardError`] for the per-request
//! failures of a single backend call. All use `thiserror` for `Display` and
//! `Error` derives. Error messages include contextual hints to guide the user
//! toward a fix.

use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub server: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  server {}: {} - {}", self.server, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RoutemuxError {
    #[error("No config source found.\n\n  {hint}")]
    NoConfigSource { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid upstream host '{host}': {source}")]
    InvalidUpstreamHost {
        host: String,
        #[source]
        source: http::uri::InvalidUri,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Failure of one forwarding attempt.
///
/// Everything except [`ForwardError::InvalidTarget`] is request-scoped:
/// the handler answers the caller with [`ForwardError::status`] and keeps
/// serving.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ForwardError {
    #[error("invalid backend target {target}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: http::Error,
    },

    #[error("backend unreachable: {source}")]
    Unreachable {
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("backend did not respond within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("failed to read backend response body: {source}")]
    BodyRead {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("backend response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },
}

impl ForwardError {
    /// Status returned to the caller when this error ends a request.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether the error is an invariant violation rather than a backend failure.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidTarget { .. })
    }
}
