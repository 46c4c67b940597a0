//! Failure taxonomy for backend exchanges.
//!
//! Every failed attempt produces a raw [`Failure`]; [`classify`] maps it onto a
//! flat [`ErrorKind`] plus a display message. The transport client retries on
//! the kind, and the UI layer turns the kind into a notification, so neither
//! has to pattern-match on status codes or error strings itself.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Flat classification of a failed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Attempt exceeded the per-attempt deadline.
    Timeout,
    /// Transport-level failure: DNS, connection refused, backend offline.
    NetworkFailure,
    /// HTTP 5xx or 408.
    ServerError,
    /// HTTP 4xx other than 408.
    ClientError,
    /// Nothing more specific applies.
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind may succeed if the attempt is repeated.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::NetworkFailure | ErrorKind::ServerError
        )
    }

    fn fallback_message(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "Request timed out",
            ErrorKind::NetworkFailure => "Could not reach the backend",
            ErrorKind::ServerError => "The backend reported an internal error",
            ErrorKind::ClientError => "The backend rejected the request",
            ErrorKind::Unknown => "Unexpected error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkFailure => "network failure",
            ErrorKind::ServerError => "server error",
            ErrorKind::ClientError => "client error",
            ErrorKind::Unknown => "unknown error",
        };
        f.write_str(name)
    }
}

/// Raw artifact of one failed attempt, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Timeout { after: Duration },
    Network { message: String },
    Http { status: u16, body: String },
    Decode { message: String },
    /// The request could not be built or followed, e.g. a malformed URL.
    Request { message: String },
}

impl Failure {
    /// Builds a failure from a reqwest transport error.
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Failure::Timeout { after: timeout }
        } else if err.is_builder() || err.is_redirect() {
            Failure::Request {
                message: format!("invalid request: {err}"),
            }
        } else if err.is_decode() {
            Failure::Decode {
                message: err.to_string(),
            }
        } else if err.is_connect() {
            Failure::Network {
                message: format!("connection failed: {err}"),
            }
        } else {
            Failure::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Output of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Extracts the `error` field from a JSON error body, if there is one.
pub fn error_field(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        408 => ErrorKind::ServerError,
        500..=599 => ErrorKind::ServerError,
        400..=499 => ErrorKind::ClientError,
        _ => ErrorKind::Unknown,
    }
}

/// Maps a raw failure onto exactly one [`ErrorKind`].
///
/// Total and side-effect free. HTTP failures take their message from the
/// body's `error` field, then from the raw body text, then from a generic
/// per-kind message.
pub fn classify(failure: &Failure) -> Classification {
    match failure {
        Failure::Timeout { after } => Classification {
            kind: ErrorKind::Timeout,
            message: format!("Request timed out after {}s", after.as_secs_f64()),
            status: None,
        },
        Failure::Network { message } => Classification {
            kind: ErrorKind::NetworkFailure,
            message: non_empty_or(message, ErrorKind::NetworkFailure),
            status: None,
        },
        Failure::Http { status, body } => {
            let kind = kind_for_status(*status);
            let message = error_field(body).unwrap_or_else(|| {
                let text = body.trim();
                if text.is_empty() {
                    format!("{} (HTTP {})", kind.fallback_message(), status)
                } else {
                    text.to_string()
                }
            });
            Classification {
                kind,
                message,
                status: Some(*status),
            }
        }
        Failure::Decode { message } | Failure::Request { message } => Classification {
            kind: ErrorKind::Unknown,
            message: non_empty_or(message, ErrorKind::Unknown),
            status: None,
        },
    }
}

fn non_empty_or(message: &str, kind: ErrorKind) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        kind.fallback_message().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Terminal failure of a logical request, as surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkFailure, message)
    }

    pub fn timeout(after: Duration) -> Self {
        classify(&Failure::Timeout { after }).into()
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        classify(&Failure::Http {
            status,
            body: body.into(),
        })
        .into()
    }

    /// Request refused locally because the connectivity monitor reports offline.
    pub fn offline() -> Self {
        Self::network("Backend is offline")
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_transient()
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }

    /// Status-specific guidance for client errors.
    pub fn hint(&self) -> Option<&'static str> {
        if self.kind != ErrorKind::ClientError {
            return None;
        }
        match self.status? {
            401 => Some("Authentication failed. Check the API key in your settings."),
            403 => Some("Permission denied."),
            404 => Some("The requested resource was not found."),
            429 => Some("Too many requests. Wait a moment before trying again."),
            _ => None,
        }
    }
}

impl From<Classification> for ApiError {
    fn from(c: Classification) -> Self {
        Self {
            kind: c.kind,
            message: c.message,
            status: c.status,
        }
    }
}

impl From<Failure> for ApiError {
    fn from(failure: Failure) -> Self {
        classify(&failure).into()
    }
}
