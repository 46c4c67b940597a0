//! User-facing notifications.
//!
//! The single place where an [`ApiError`] or a connectivity [`Transition`]
//! becomes something shown to the user.

use crate::connectivity::{Connectivity, Transition};
use crate::error::{ApiError, ErrorKind};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    /// Timeouts, network failures and rate limiting are warnings; the user can
    /// simply try again. Everything else is an error.
    pub fn from_error(err: &ApiError) -> Self {
        let severity = match err.kind {
            ErrorKind::Timeout | ErrorKind::NetworkFailure => Severity::Warning,
            ErrorKind::ClientError if err.is_rate_limited() => Severity::Warning,
            _ => Severity::Error,
        };

        let message = match err.hint() {
            Some(hint) => format!("{} {}", err.message, hint),
            None => err.message.clone(),
        };

        Self { severity, message }
    }

    pub fn from_transition(transition: &Transition) -> Self {
        match transition.to {
            Connectivity::Online => Self::new(Severity::Success, "Connection restored"),
            Connectivity::Offline => Self::new(Severity::Warning, "Connection lost"),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}] {}", label, self.message)
    }
}

/// Renders notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Emits notifications as tracing events at a level matching their severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Info | Severity::Success => info!("{}", notification),
            Severity::Warning => warn!("{}", notification),
            Severity::Error => error!("{}", notification),
        }
    }
}

/// Writes each notification as one line, whatever the log filter says.
pub struct WriteNotifier<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriteNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WriteNotifier<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> Notifier for WriteNotifier<W> {
    fn notify(&self, notification: Notification) {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(out, "{}", notification).and_then(|_| out.flush()) {
            warn!("Failed to write notification: {}", e);
        }
    }
}

/// Builds a connectivity listener that announces each transition once.
pub fn connectivity_listener<N>(notifier: Arc<N>) -> impl Fn(&Transition) + Send + Sync + 'static
where
    N: Notifier + ?Sized + 'static,
{
    move |transition| notifier.notify(Notification::from_transition(transition))
}
