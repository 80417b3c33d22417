//! ---
//! inv_section: "05-logging"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Structured logging adapters and sinks."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Managed object the event concerns, rendered as `kind:id`.
    pub object: Option<&'a str>,
    /// Private property collector the event concerns.
    pub collector: Option<&'a str>,
    /// Version cursor in effect.
    pub cursor: Option<&'a str>,
    /// Poll round, starting at one.
    pub round: Option<u64>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a managed object.
    pub fn with_object(mut self, object: &'a str) -> Self {
        self.object = Some(object);
        self
    }

    /// Attach a property collector.
    pub fn with_collector(mut self, collector: &'a str) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Attach a version cursor.
    pub fn with_cursor(mut self, cursor: &'a str) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Attach a poll round.
    pub fn with_round(mut self, round: u64) -> Self {
        self.round = Some(round);
        self
    }
}

/// Outcome attached to lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl EventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Success => "success",
            EventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized collector lifecycle event.
///
/// Successes are logged at info, faults at warn: a failed release is
/// reported but never aborts the caller.
pub fn log_collector_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: EventOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    match outcome {
        EventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            object = ctx.object.unwrap_or(""),
            collector = ctx.collector.unwrap_or(""),
            cursor = ctx.cursor.unwrap_or(""),
            round = ctx.round.unwrap_or_default(),
            message = %message
        ),
        EventOutcome::Fault => tracing::event!(
            Level::WARN,
            event,
            outcome = outcome.as_str(),
            object = ctx.object.unwrap_or(""),
            collector = ctx.collector.unwrap_or(""),
            cursor = ctx.cursor.unwrap_or(""),
            round = ctx.round.unwrap_or_default(),
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_object("VirtualMachine:vm-1")
            .with_collector("session[1]");
        inv_info!(context = ctx.clone(), "collector ready");
        inv_debug!("debug message");
        inv_warn!(context = ctx.clone().with_round(3), "slow round");
        inv_error!(context = ctx, "error code: {}", 42);
    }

    #[test]
    fn init_does_not_panic() {
        init();
    }

    #[test]
    fn collector_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_collector("session[2]").with_cursor("4");
        log_collector_event(
            Some(&ctx),
            "collector.destroy",
            "collector released",
            EventOutcome::Success,
        );
        log_collector_event(
            None,
            "collector.destroy",
            "collector release failed",
            EventOutcome::Fault,
        );
    }
}
