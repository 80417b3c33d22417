//! ---
//! inv_section: "01-core-functionality"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Shared configuration and tracing setup."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use r_inv_types::ObjectReference;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_property_collector() -> ObjectReference {
    ObjectReference::new("PropertyCollector", "propertyCollector")
}

fn default_entity_kind() -> String {
    "ManagedEntity".to_owned()
}

fn default_parent_path() -> String {
    "parent".to_owned()
}

fn default_name_path() -> String {
    "name".to_owned()
}

fn default_traversal_name() -> String {
    "traverseParent".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_prefix() -> String {
    "r_inv".to_owned()
}

/// Configuration for a property client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root property collector every request is addressed to.
    #[serde(default = "default_property_collector")]
    pub property_collector: ObjectReference,
    #[serde(default)]
    pub ancestry: AncestryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where a [`ClientConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedClientConfig {
    pub config: ClientConfig,
    pub source: PathBuf,
}

impl ClientConfig {
    pub const ENV_CONFIG_PATH: &'static str = "R_INV_CONFIG";

    /// Load configuration from disk, respecting the `R_INV_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedClientConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedClientConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedClientConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<ClientConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.property_collector.kind.trim().is_empty()
            || self.property_collector.id.trim().is_empty()
        {
            return Err(anyhow!(
                "property_collector must carry a non-empty type and value"
            ));
        }
        self.ancestry.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            property_collector: default_property_collector(),
            ancestry: AncestryConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl std::str::FromStr for ClientConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: ClientConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Names used when walking an object's parent chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AncestryConfig {
    /// Generic kind every inventory entity satisfies.
    #[serde(default = "default_entity_kind")]
    pub entity_kind: String,
    #[serde(default = "default_parent_path")]
    pub parent_path: String,
    #[serde(default = "default_name_path")]
    pub name_path: String,
    /// Name of the self-referential traversal rule.
    #[serde(default = "default_traversal_name")]
    pub traversal_name: String,
}

impl Default for AncestryConfig {
    fn default() -> Self {
        Self {
            entity_kind: default_entity_kind(),
            parent_path: default_parent_path(),
            name_path: default_name_path(),
            traversal_name: default_traversal_name(),
        }
    }
}

impl AncestryConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("entity_kind", &self.entity_kind),
            ("parent_path", &self.parent_path),
            ("name_path", &self.name_path),
            ("traversal_name", &self.traversal_name),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("ancestry.{} must not be empty", field));
            }
        }
        if self.parent_path == self.name_path {
            return Err(anyhow!(
                "ancestry.parent_path and ancestry.name_path must differ"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Prefix prepended to every metric name.
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: default_metrics_prefix(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        let valid = !self.prefix.is_empty()
            && !self.prefix.starts_with(|c: char| c.is_ascii_digit())
            && self
                .prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(anyhow!(
                "metrics.prefix '{}' is not a valid metric name prefix",
                self.prefix
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ClientConfig = "".parse().expect("defaults parse");
        assert_eq!(
            config.property_collector,
            ObjectReference::new("PropertyCollector", "propertyCollector")
        );
        assert_eq!(config.ancestry, AncestryConfig::default());
        assert!(!config.metrics.enabled);
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
    }

    #[test]
    fn overrides_are_applied() {
        let config: ClientConfig = r#"
            [property_collector]
            type = "PropertyCollector"
            value = "pc-7"

            [ancestry]
            traversal_name = "up"

            [metrics]
            enabled = true
            prefix = "inventory"
        "#
        .parse()
        .expect("parse overrides");
        assert_eq!(config.property_collector.id, "pc-7");
        assert_eq!(config.ancestry.traversal_name, "up");
        assert_eq!(config.ancestry.parent_path, "parent");
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.prefix, "inventory");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = r#"
            [ancestry]
            parent_path = "name"
        "#
        .parse::<ClientConfig>()
        .expect_err("same paths rejected");
        assert!(err.to_string().contains("must differ"));

        let err = r#"
            [metrics]
            prefix = "bad-prefix"
        "#
        .parse::<ClientConfig>()
        .expect_err("prefix rejected");
        assert!(err.to_string().contains("bad-prefix"));
    }
}
