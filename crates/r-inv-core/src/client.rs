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

use prometheus::Registry;
use r_inv_common::ClientConfig;
use r_inv_transport::{CancelToken, Invoke};
use r_inv_types::{AttributeRecord, ChangeRecord, Entity, ObjectReference, QueryBatch};

use crate::ancestry::AncestryResolver;
use crate::collector::ChangeFilterCollector;
use crate::endpoint::Endpoint;
use crate::fetch::{FromAttributeRecord, PropertyFetcher};
use crate::metrics::PropertyMetrics;
use crate::request::build_batch;
use crate::waiter::{ChangeWaiter, WaitOutcome};
use crate::Result;

/// Entry point bundling retrieval, change waiting and ancestry over one
/// call primitive.
#[derive(Clone)]
pub struct Client {
    endpoint: Endpoint,
    config: ClientConfig,
}

impl Client {
    /// Build a client addressing the root collector named in `config`.
    pub fn new(transport: Arc<dyn Invoke>, config: ClientConfig) -> Self {
        let endpoint = Endpoint::new(transport, config.property_collector.clone());
        Self { endpoint, config }
    }

    /// Record calls into `metrics`.
    pub fn with_metrics(mut self, metrics: PropertyMetrics) -> Self {
        self.endpoint = self.endpoint.with_metrics(metrics);
        self
    }

    /// Register metrics against `registry` when enabled in the configuration.
    pub fn register_metrics(self, registry: &Registry) -> Result<Self> {
        if !self.config.metrics.enabled {
            return Ok(self);
        }
        let metrics = PropertyMetrics::new(registry, &self.config.metrics.prefix)?;
        Ok(self.with_metrics(metrics))
    }

    /// Wrap the current call primitive, e.g. in a `LoggingTransport`.
    pub fn with_round_tripper<F>(mut self, wrap: F) -> Self
    where
        F: FnOnce(Arc<dyn Invoke>) -> Arc<dyn Invoke>,
    {
        self.endpoint = self.endpoint.map_transport(wrap);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fetcher mapping entities through the configured ancestry paths.
    pub fn fetcher(&self) -> PropertyFetcher {
        PropertyFetcher::new(self.endpoint.clone()).with_ancestry(self.config.ancestry.clone())
    }

    /// Retrieve `paths` of a single object; `None` selects every attribute.
    ///
    /// Returns `None` when the server reports nothing for `obj`.
    pub fn properties(
        &self,
        obj: &ObjectReference,
        paths: Option<&[String]>,
    ) -> Result<Option<AttributeRecord>> {
        let records = self.properties_n(std::slice::from_ref(obj), paths)?;
        Ok(records.into_iter().next())
    }

    /// Retrieve `paths` of several objects of one kind.
    pub fn properties_n(
        &self,
        objs: &[ObjectReference],
        paths: Option<&[String]>,
    ) -> Result<Vec<AttributeRecord>> {
        let batch = build_batch(objs, paths)?;
        self.retrieve(&batch)
    }

    /// Typed variant of [`Client::properties_n`].
    pub fn properties_as<T: FromAttributeRecord>(
        &self,
        objs: &[ObjectReference],
        paths: Option<&[String]>,
    ) -> Result<Vec<T>> {
        let batch = build_batch(objs, paths)?;
        self.fetcher().fetch_as(&batch)
    }

    /// Run a prepared batch as is.
    pub fn retrieve(&self, batch: &QueryBatch) -> Result<Vec<AttributeRecord>> {
        self.fetcher().fetch(batch)
    }

    /// Create a private collector owned by the caller.
    pub fn new_property_collector(&self) -> Result<ChangeFilterCollector> {
        let mut collector = ChangeFilterCollector::new(self.endpoint.clone());
        collector.create()?;
        Ok(collector)
    }

    /// Block until `f` accepts a change set of `paths` on `obj`.
    pub fn wait_for_properties<F>(
        &self,
        obj: &ObjectReference,
        paths: &[String],
        cancel: &CancelToken,
        f: F,
    ) -> Result<WaitOutcome>
    where
        F: FnMut(&[ChangeRecord]) -> bool,
    {
        ChangeWaiter::new(self.endpoint.clone()).wait_with_rounds(obj, paths, cancel, f)
    }

    /// Chain from the inventory root down to `obj`.
    pub fn ancestors(&self, obj: &ObjectReference) -> Result<Vec<Entity>> {
        AncestryResolver::new(self.fetcher(), self.config.ancestry.clone()).resolve(obj)
    }
}
