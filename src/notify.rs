//! User-facing notifications
//!
//! The host UI is external. Everything the core wants to tell the user goes
//! through [`Notifier`]; the binary renders it into the log.

use std::fmt;
use std::time::Duration;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub severity: Severity,
    /// How long to show the message; `None` keeps it until dismissed.
    pub duration: Option<Duration>,
}

impl Notification {
    pub fn new(text: impl Into<String>, severity: Severity, duration: Option<Duration>) -> Self {
        Self {
            text: text.into(),
            severity,
            duration,
        }
    }

    pub fn info(text: impl Into<String>, duration: Duration) -> Self {
        Self::new(text, Severity::Info, Some(duration))
    }

    pub fn warning(text: impl Into<String>, duration: Duration) -> Self {
        Self::new(text, Severity::Warning, Some(duration))
    }

    pub fn error(text: impl Into<String>, duration: Duration) -> Self {
        Self::new(text, Severity::Error, Some(duration))
    }

    pub fn sticky_error(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Error, None)
    }
}

/// Lifecycle of a historic run, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoricStatus {
    Started,
    Progress { current: usize, total: usize },
    Submitting,
    Finished { success: bool },
}

pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);

    fn historic_status(&self, status: HistoricStatus);
}

/// Renders notifications as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        let shown_secs = n.duration.map(|d| d.as_secs());
        match n.severity {
            Severity::Info => info!(shown_secs, "{}", n.text),
            Severity::Warning => warn!(shown_secs, "{}", n.text),
            Severity::Error => error!(shown_secs, "{}", n.text),
        }
    }

    fn historic_status(&self, status: HistoricStatus) {
        match status {
            HistoricStatus::Started => info!("Historic data: reading journal files..."),
            HistoricStatus::Progress { current, total } => {
                info!(current, total, "Historic data: parsed {current}/{total} files");
            }
            HistoricStatus::Submitting => info!("Historic data: submitting to the killboard..."),
            HistoricStatus::Finished { success: true } => info!("Historic data: done"),
            HistoricStatus::Finished { success: false } => {
                self.notify(Notification::sticky_error(
                    "Historic data: could not parse server response",
                ));
            }
        }
    }
}
