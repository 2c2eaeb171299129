//! Named logger handed to event handlers.
//!
//! A thin wrapper over `tracing` so handler code gets a stable
//! `info`/`error` surface without depending on the subscriber setup.
//! Every event carries a `logger` field with the dotted logger name and
//! inherits the fields of the reconcile span it is emitted in.

use std::fmt::Display;
use tracing::{debug, error, info};

/// Logger scoped by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: String,
}

impl Logger {
    /// Creates a root logger with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns a child logger, `parent.child`.
    #[must_use]
    pub fn with_name(&self, name: &str) -> Self {
        if self.name.is_empty() {
            return Self::new(name);
        }
        Self {
            name: format!("{}.{}", self.name, name),
        }
    }

    /// Dotted logger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logs an informational message.
    pub fn info(&self, msg: impl Display) {
        info!(logger = %self.name, "{}", msg);
    }

    /// Logs a debug message.
    pub fn debug(&self, msg: impl Display) {
        debug!(logger = %self.name, "{}", msg);
    }

    /// Logs an error together with a message.
    pub fn error(&self, err: impl Display, msg: impl Display) {
        error!(logger = %self.name, error = %err, "{}", msg);
    }
}
