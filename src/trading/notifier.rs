//! Status notifications emitted while handling signals.

use tracing::{error, info, warn};

/// Severity of a status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Fire-and-forget sink for human-readable status messages.
pub trait StatusSink: Send + Sync {
    fn notify(&self, source: &str, message: &str, severity: Severity);
}

/// Renders notifications through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn notify(&self, source: &str, message: &str, severity: Severity) {
        match severity {
            Severity::Info => info!(source, "{}", message),
            Severity::Warning => warn!(source, "{}", message),
            Severity::Error => error!(source, "{}", message),
        }
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingSink;
