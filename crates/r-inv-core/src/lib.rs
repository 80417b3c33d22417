//! ---
//! inv_section: "04-property-collector"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Property retrieval, ancestry and change waiting."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! Property retrieval and change notification against a remote inventory.
//!
//! All operations are synchronous and go through one [`r_inv_transport::Invoke`]
//! call primitive. Batches are built by [`build_batch`], run by
//! [`PropertyFetcher`], watched with a [`ChangeFilterCollector`] or a
//! [`ChangeWaiter`], and parent chains come from [`AncestryResolver`].
//! [`Client`] bundles them behind one configuration.

pub mod ancestry;
pub mod client;
pub mod collector;
pub mod endpoint;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod request;
pub mod waiter;

pub use ancestry::{order_ancestry, AncestryResolver};
pub use client::Client;
pub use collector::{ChangeFilterCollector, CollectorState};
pub use endpoint::Endpoint;
pub use error::{PropertyError, Result};
pub use fetch::{decode_record, FromAttributeRecord, PropertyFetcher};
pub use metrics::PropertyMetrics;
pub use request::build_batch;
pub use waiter::{ChangeWaiter, WaitOutcome};
