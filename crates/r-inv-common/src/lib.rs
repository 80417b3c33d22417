//! ---
//! inv_section: "01-core-functionality"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Shared configuration and tracing setup."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! Shared primitives for the R-INV workspace.
//! This crate exposes client configuration loading and tracing
//! initialisation consumed by the core and by embedding applications.

pub mod config;
pub mod logging;

pub use config::{AncestryConfig, ClientConfig, LoadedClientConfig, LoggingConfig, MetricsConfig};
pub use logging::{init_tracing, log_file_name, LogFormat};
