//! ---
//! inv_section: "04-property-collector"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Property retrieval, ancestry and change waiting."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! Block until a single object's attributes satisfy a predicate.
use r_inv_logging::{inv_debug, inv_warn, LogContext};
use r_inv_transport::{CallError, CancelToken};
use r_inv_types::{AttributeSpec, ChangeRecord, ObjectQuery, ObjectReference, VersionCursor};

use crate::collector::ChangeFilterCollector;
use crate::endpoint::Endpoint;
use crate::{PropertyError, Result};

/// Polling statistics of a completed wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome {
    /// `WaitForUpdates` rounds issued, the satisfying one included.
    pub rounds: u64,
    /// Cursor returned by the last round.
    pub cursor: VersionCursor,
}

/// Drives one private collector per wait.
#[derive(Clone)]
pub struct ChangeWaiter {
    endpoint: Endpoint,
}

impl ChangeWaiter {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Wait until `f` accepts a change set reported for `target`.
    ///
    /// The first round delivers the current values of `paths`, later rounds
    /// only what changed. Change sets of other objects never reach `f`.
    /// There is no deadline: the wait ends when `f` returns true, a call
    /// fails, or `cancel` fires. The private collector is released on every
    /// exit.
    pub fn wait<F>(
        &self,
        target: &ObjectReference,
        paths: &[String],
        cancel: &CancelToken,
        f: F,
    ) -> Result<()>
    where
        F: FnMut(&[ChangeRecord]) -> bool,
    {
        self.wait_with_rounds(target, paths, cancel, f).map(|_| ())
    }

    /// [`ChangeWaiter::wait`], reporting how many rounds it took.
    pub fn wait_with_rounds<F>(
        &self,
        target: &ObjectReference,
        paths: &[String],
        cancel: &CancelToken,
        mut f: F,
    ) -> Result<WaitOutcome>
    where
        F: FnMut(&[ChangeRecord]) -> bool,
    {
        let object = target.to_string();
        let mut collector = ChangeFilterCollector::new(self.endpoint.clone());
        collector.create()?;

        let attributes = AttributeSpec::paths(target.kind.clone(), paths.iter().cloned());
        if let Err(err) = collector.create_filter(ObjectQuery::new(target.clone()), attributes) {
            return Err(release_after_failure(&mut collector, &object, err));
        }

        let mut cursor = VersionCursor::initial();
        let mut rounds = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(release_after_failure(
                    &mut collector,
                    &object,
                    CallError::Cancelled.into(),
                ));
            }

            let batch = match collector.wait_for_updates(&cursor, cancel) {
                Ok(batch) => batch,
                Err(err) => return Err(release_after_failure(&mut collector, &object, err)),
            };
            rounds += 1;
            cursor = batch.cursor.clone();
            if let Some(metrics) = self.endpoint.metrics() {
                metrics.observe_wait_round();
            }
            inv_debug!(
                context = LogContext::new()
                    .with_object(&object)
                    .with_cursor(cursor.as_str())
                    .with_round(rounds),
                "received {} object update(s)",
                batch.objects.len()
            );

            let satisfied = batch.for_object(target).any(|update| f(&update.changes));
            if satisfied {
                collector.destroy()?;
                return Ok(WaitOutcome { rounds, cursor });
            }
        }
    }
}

/// Release `collector` after `err`, keeping `err` as the reported failure.
fn release_after_failure(
    collector: &mut ChangeFilterCollector,
    object: &str,
    err: PropertyError,
) -> PropertyError {
    if let Err(release) = collector.destroy() {
        inv_warn!(
            context = LogContext::new().with_object(object),
            "collector release failed after {}: {}",
            err,
            release
        );
    }
    err
}
