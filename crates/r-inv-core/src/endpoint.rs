//! ---
//! inv_section: "04-property-collector"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Property retrieval, ancestry and change waiting."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Instant;

use r_inv_transport::{CallError, CancelToken, Invoke};
use r_inv_types::{ObjectReference, Request, Response};
use tracing::trace;

use crate::metrics::PropertyMetrics;

/// The call primitive paired with the root property collector it addresses.
///
/// Every component issues its calls through an endpoint so metrics and call
/// tracing are recorded in one place.
#[derive(Clone)]
pub struct Endpoint {
    transport: Arc<dyn Invoke>,
    root: ObjectReference,
    metrics: Option<PropertyMetrics>,
}

impl Endpoint {
    /// Pair `transport` with the root collector `root`.
    pub fn new(transport: Arc<dyn Invoke>, root: ObjectReference) -> Self {
        Self {
            transport,
            root,
            metrics: None,
        }
    }

    /// Record calls into `metrics`.
    pub fn with_metrics(mut self, metrics: PropertyMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the call primitive with whatever `wrap` builds around it.
    pub fn map_transport<F>(mut self, wrap: F) -> Self
    where
        F: FnOnce(Arc<dyn Invoke>) -> Arc<dyn Invoke>,
    {
        self.transport = wrap(self.transport);
        self
    }

    /// Root property collector.
    pub fn root(&self) -> &ObjectReference {
        &self.root
    }

    /// Underlying call primitive.
    pub fn transport(&self) -> &Arc<dyn Invoke> {
        &self.transport
    }

    pub(crate) fn metrics(&self) -> Option<&PropertyMetrics> {
        self.metrics.as_ref()
    }

    /// Issue a call.
    pub fn call(&self, request: Request) -> Result<Response, CallError> {
        let method = request.method();
        let started = Instant::now();
        let result = self.transport.invoke(request);
        self.observe(method, started, &result);
        result
    }

    /// Issue a call that `cancel` may abort.
    pub fn call_cancellable(
        &self,
        request: Request,
        cancel: &CancelToken,
    ) -> Result<Response, CallError> {
        let method = request.method();
        let started = Instant::now();
        let result = self.transport.invoke_cancellable(request, cancel);
        self.observe(method, started, &result);
        result
    }

    fn observe(&self, method: &'static str, started: Instant, result: &Result<Response, CallError>) {
        let elapsed = started.elapsed();
        trace!(
            transport = self.transport.name(),
            method,
            ok = result.is_ok(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "property collector call"
        );
        if let Some(metrics) = &self.metrics {
            metrics.observe_call(method, elapsed, result.as_ref().err());
        }
    }
}
