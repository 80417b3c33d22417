//! ---
//! inv_section: "04-property-collector"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Property retrieval, ancestry and change waiting."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use r_inv_transport::CallError;

use crate::Result;

/// Prometheus handles for calls issued through the property collector.
#[derive(Clone)]
pub struct PropertyMetrics {
    calls: IntCounterVec,
    failures: IntCounterVec,
    call_duration: HistogramVec,
    wait_rounds: IntCounter,
    ancestry_depth: Histogram,
}

impl PropertyMetrics {
    /// Register the metrics with `registry`, every name prefixed by `prefix`.
    pub fn new(registry: &Registry, prefix: &str) -> Result<Self> {
        let calls = IntCounterVec::new(
            Opts::new(
                format!("{prefix}_calls_total"),
                "Calls issued to the remote property collector",
            ),
            &["method"],
        )?;
        registry.register(Box::new(calls.clone()))?;

        let failures = IntCounterVec::new(
            Opts::new(
                format!("{prefix}_call_failures_total"),
                "Calls that ended in a transport error, server fault or cancellation",
            ),
            &["method", "reason"],
        )?;
        registry.register(Box::new(failures.clone()))?;

        let call_duration = HistogramVec::new(
            HistogramOpts::new(
                format!("{prefix}_call_duration_seconds"),
                "Wall-clock duration of calls, long-polls included",
            ),
            &["method"],
        )?;
        registry.register(Box::new(call_duration.clone()))?;

        let wait_rounds = IntCounter::with_opts(Opts::new(
            format!("{prefix}_wait_rounds_total"),
            "WaitForUpdates rounds completed by change waiters",
        ))?;
        registry.register(Box::new(wait_rounds.clone()))?;

        let ancestry_depth = Histogram::with_opts(
            HistogramOpts::new(
                format!("{prefix}_ancestry_depth"),
                "Length of resolved ancestry chains",
            )
            .buckets(vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0]),
        )?;
        registry.register(Box::new(ancestry_depth.clone()))?;

        Ok(Self {
            calls,
            failures,
            call_duration,
            wait_rounds,
            ancestry_depth,
        })
    }

    /// Record one call and its outcome.
    pub fn observe_call(&self, method: &str, elapsed: Duration, error: Option<&CallError>) {
        self.calls.with_label_values(&[method]).inc();
        self.call_duration
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
        if let Some(error) = error {
            let reason = match error {
                CallError::Transport(_) => "transport",
                CallError::Fault(_) => "fault",
                CallError::Cancelled => "cancelled",
            };
            self.failures.with_label_values(&[method, reason]).inc();
        }
    }

    /// Record a completed `WaitForUpdates` round.
    pub fn observe_wait_round(&self) {
        self.wait_rounds.inc();
    }

    /// Record the length of a resolved ancestry chain.
    pub fn observe_ancestry_depth(&self, depth: usize) {
        self.ancestry_depth.observe(depth as f64);
    }
}
