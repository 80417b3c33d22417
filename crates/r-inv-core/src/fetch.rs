//! ---
//! inv_section: "04-property-collector"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Property retrieval, ancestry and change waiting."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
use r_inv_common::AncestryConfig;
use r_inv_types::{AttributeRecord, Entity, ObjectReference, QueryBatch, Request, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::metrics::PropertyMetrics;
use crate::{PropertyError, Result};

/// Mapping from a generic attribute record onto a concrete shape.
///
/// Implementations run once per record at the fetch boundary. `ancestry`
/// names the paths entity-shaped targets read their name and parent from.
pub trait FromAttributeRecord: Sized {
    /// Convert `record`.
    fn from_record(record: AttributeRecord, ancestry: &AncestryConfig) -> Result<Self>;
}

impl FromAttributeRecord for AttributeRecord {
    fn from_record(record: AttributeRecord, _ancestry: &AncestryConfig) -> Result<Self> {
        Ok(record)
    }
}

impl FromAttributeRecord for Entity {
    fn from_record(record: AttributeRecord, ancestry: &AncestryConfig) -> Result<Self> {
        let name = match record.get(&ancestry.name_path) {
            Some(value) => decode_value::<String>(&record.obj, &ancestry.name_path, value)?,
            None => String::new(),
        };
        let parent = match record.get(&ancestry.parent_path) {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(decode_value::<ObjectReference>(
                &record.obj,
                &ancestry.parent_path,
                value,
            )?),
        };
        Ok(Entity::new(record.obj, parent, name))
    }
}

fn decode_value<T: DeserializeOwned>(
    obj: &ObjectReference,
    path: &str,
    value: &JsonValue,
) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|source| PropertyError::Decode {
        obj: obj.clone(),
        path: path.to_owned(),
        source,
    })
}

/// Decode `record` into any deserializable type.
///
/// The record is viewed as one JSON object keyed by attribute path, with the
/// object's own reference under `"self"`. Errors name the failing path.
pub fn decode_record<T: DeserializeOwned>(record: AttributeRecord) -> Result<T> {
    let AttributeRecord {
        obj, attributes, ..
    } = record;

    let mut object = Map::with_capacity(attributes.len() + 1);
    object.insert(
        "self".to_owned(),
        serde_json::json!({ "type": obj.kind, "value": obj.id }),
    );
    object.extend(attributes);

    serde_path_to_error::deserialize(JsonValue::Object(object)).map_err(|err| {
        let path = err.path().to_string();
        PropertyError::Decode {
            obj,
            path,
            source: err.into_inner(),
        }
    })
}

/// Issues batched retrievals and demarshals the results.
#[derive(Clone)]
pub struct PropertyFetcher {
    endpoint: Endpoint,
    ancestry: AncestryConfig,
}

impl PropertyFetcher {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ancestry: AncestryConfig::default(),
        }
    }

    /// Read entity names and parents from the paths in `ancestry`.
    pub fn with_ancestry(mut self, ancestry: AncestryConfig) -> Self {
        self.ancestry = ancestry;
        self
    }

    pub fn ancestry(&self) -> &AncestryConfig {
        &self.ancestry
    }

    pub(crate) fn metrics(&self) -> Option<&PropertyMetrics> {
        self.endpoint.metrics()
    }

    /// Retrieve the attributes selected by `batch`, in server order.
    pub fn fetch(&self, batch: &QueryBatch) -> Result<Vec<AttributeRecord>> {
        batch.validate()?;
        let request = Request::RetrieveProperties {
            this: self.endpoint.root().clone(),
            spec_set: vec![batch.clone()],
        };
        match self.endpoint.call(request)? {
            Response::ObjectContents(contents) => {
                debug!(
                    kind = batch.kind(),
                    queries = batch.queries.len(),
                    records = contents.len(),
                    "properties retrieved"
                );
                Ok(contents.into_iter().map(AttributeRecord::from).collect())
            }
            other => Err(PropertyError::UnexpectedResponse {
                method: "RetrieveProperties",
                found: other.kind(),
            }),
        }
    }

    /// Retrieve and map every record onto `T`.
    pub fn fetch_as<T: FromAttributeRecord>(&self, batch: &QueryBatch) -> Result<Vec<T>> {
        self.fetch(batch)?
            .into_iter()
            .map(|record| T::from_record(record, &self.ancestry))
            .collect()
    }
}
