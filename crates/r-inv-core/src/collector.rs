//! ---
//! inv_section: "04-property-collector"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Property retrieval, ancestry and change waiting."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! Client-side view of a private property collector.
//!
//! The collector itself lives on the server. Locally we only keep the
//! reference the server handed out and a lifecycle tag; releasing the
//! server resource is tied to this value's scope.
use std::fmt;

use r_inv_logging::{log_collector_event, EventOutcome, LogContext};
use r_inv_transport::CancelToken;
use r_inv_types::{
    AttributeSpec, FilterHandle, ObjectQuery, QueryBatch, Request, Response, UpdateBatch,
    VersionCursor,
};
use tracing::warn;

use crate::endpoint::Endpoint;
use crate::{PropertyError, Result};

/// Lifecycle of a [`ChangeFilterCollector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// No server-side collector exists yet.
    Uninitialized,
    /// The server holds a collector for us.
    Active,
    /// The collector was released (or never created).
    Destroyed,
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CollectorState::Uninitialized => "uninitialized",
            CollectorState::Active => "active",
            CollectorState::Destroyed => "destroyed",
        };
        f.write_str(label)
    }
}

/// Owns one server-side property collector and the filters registered on it.
///
/// Dropping an active collector destroys it on the server.
pub struct ChangeFilterCollector {
    endpoint: Endpoint,
    state: CollectorState,
    handle: Option<FilterHandle>,
    filters: Vec<FilterHandle>,
}

impl ChangeFilterCollector {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: CollectorState::Uninitialized,
            handle: None,
            filters: Vec::new(),
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Server reference of the collector, once created.
    pub fn handle(&self) -> Option<&FilterHandle> {
        self.handle.as_ref()
    }

    /// Filters registered since creation.
    pub fn filters(&self) -> &[FilterHandle] {
        &self.filters
    }

    /// Create the server-side collector.
    pub fn create(&mut self) -> Result<FilterHandle> {
        if self.state != CollectorState::Uninitialized {
            return Err(PropertyError::InvalidState {
                operation: "create",
                state: self.state,
            });
        }

        let request = Request::CreatePropertyCollector {
            this: self.endpoint.root().clone(),
        };
        let handle = match self.endpoint.call(request)? {
            Response::Collector(reference) => FilterHandle::new(reference),
            other => {
                return Err(PropertyError::UnexpectedResponse {
                    method: "CreatePropertyCollector",
                    found: other.kind(),
                })
            }
        };

        self.state = CollectorState::Active;
        self.handle = Some(handle.clone());

        let collector = handle.to_string();
        log_collector_event(
            Some(&LogContext::new().with_collector(&collector)),
            "collector.create",
            "property collector created",
            EventOutcome::Success,
        );
        Ok(handle)
    }

    /// Register interest in `attributes` of the objects `query` selects.
    pub fn create_filter(
        &mut self,
        query: ObjectQuery,
        attributes: AttributeSpec,
    ) -> Result<FilterHandle> {
        let this = self.active_handle("create_filter")?.reference().clone();
        let spec = QueryBatch {
            queries: vec![query],
            attributes,
        };
        spec.validate()?;

        let request = Request::CreateFilter {
            this,
            spec,
            partial_updates: false,
        };
        match self.endpoint.call(request)? {
            Response::Filter(reference) => {
                let filter = FilterHandle::new(reference);
                self.filters.push(filter.clone());
                Ok(filter)
            }
            other => Err(PropertyError::UnexpectedResponse {
                method: "CreateFilter",
                found: other.kind(),
            }),
        }
    }

    /// Block until the server reports changes after `cursor`.
    ///
    /// This is a server-side long-poll; `cancel` is the only way to bound it.
    pub fn wait_for_updates(
        &mut self,
        cursor: &VersionCursor,
        cancel: &CancelToken,
    ) -> Result<UpdateBatch> {
        let this = self.active_handle("wait_for_updates")?.reference().clone();
        let request = Request::WaitForUpdates {
            this,
            version: cursor.clone(),
        };
        match self.endpoint.call_cancellable(request, cancel)? {
            Response::Updates(set) => Ok(set.into_batch()),
            other => Err(PropertyError::UnexpectedResponse {
                method: "WaitForUpdates",
                found: other.kind(),
            }),
        }
    }

    /// Release the server-side collector.
    ///
    /// Safe to call in any state and any number of times; only the first call
    /// on an active collector reaches the server. The collector counts as
    /// released even when that call fails, and the failure is returned.
    pub fn destroy(&mut self) -> Result<()> {
        match self.state {
            CollectorState::Destroyed => Ok(()),
            CollectorState::Uninitialized => {
                self.state = CollectorState::Destroyed;
                Ok(())
            }
            CollectorState::Active => {
                self.state = CollectorState::Destroyed;
                self.filters.clear();
                let Some(handle) = self.handle.as_ref() else {
                    return Ok(());
                };
                let collector = handle.to_string();
                let context = LogContext::new().with_collector(&collector);
                let request = Request::DestroyPropertyCollector {
                    this: handle.reference().clone(),
                };
                match self.endpoint.call(request) {
                    Ok(_) => {
                        log_collector_event(
                            Some(&context),
                            "collector.destroy",
                            "property collector released",
                            EventOutcome::Success,
                        );
                        Ok(())
                    }
                    Err(err) => {
                        log_collector_event(
                            Some(&context),
                            "collector.destroy",
                            &format!("property collector release failed: {err}"),
                            EventOutcome::Fault,
                        );
                        Err(err.into())
                    }
                }
            }
        }
    }

    fn active_handle(&self, operation: &'static str) -> Result<&FilterHandle> {
        match (self.state, self.handle.as_ref()) {
            (CollectorState::Active, Some(handle)) => Ok(handle),
            (state, _) => Err(PropertyError::InvalidState { operation, state }),
        }
    }
}

impl Drop for ChangeFilterCollector {
    fn drop(&mut self) {
        if self.state == CollectorState::Active {
            if let Err(err) = self.destroy() {
                warn!(error = %err, "dropping property collector failed to release it");
            }
        }
    }
}
