//! ---
//! inv_section: "02-data-model"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Inventory data model and wire payloads."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! Request and response envelopes exchanged through the call primitive.
//!
//! Field names follow the remote property collector protocol so a transport
//! can encode the payloads without a translation layer.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    AttributeRecord, MissingProperty, ObjectReference, ObjectUpdate, QueryBatch, UpdateBatch,
    VersionCursor,
};

/// Calls understood by the remote property collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "body")]
pub enum Request {
    /// One-shot retrieval of the attributes selected by `spec_set`.
    RetrieveProperties {
        /// Collector the call is addressed to.
        this: ObjectReference,
        /// Filter specifications, one per batch.
        spec_set: Vec<QueryBatch>,
    },
    /// Create a private collector derived from `this`.
    CreatePropertyCollector {
        /// Root collector.
        this: ObjectReference,
    },
    /// Register a change filter on a private collector.
    CreateFilter {
        /// Private collector.
        this: ObjectReference,
        /// Objects and attributes to watch.
        spec: QueryBatch,
        /// Whether the server may report partial updates.
        partial_updates: bool,
    },
    /// Long-poll for changes since `version`.
    WaitForUpdates {
        /// Private collector.
        this: ObjectReference,
        /// Cursor returned by the previous round, empty on the first.
        version: VersionCursor,
    },
    /// Release a private collector and its filters.
    DestroyPropertyCollector {
        /// Private collector.
        this: ObjectReference,
    },
}

impl Request {
    /// Method name used in logs and metrics.
    pub fn method(&self) -> &'static str {
        match self {
            Request::RetrieveProperties { .. } => "RetrieveProperties",
            Request::CreatePropertyCollector { .. } => "CreatePropertyCollector",
            Request::CreateFilter { .. } => "CreateFilter",
            Request::WaitForUpdates { .. } => "WaitForUpdates",
            Request::DestroyPropertyCollector { .. } => "DestroyPropertyCollector",
        }
    }

    /// Collector the request is addressed to.
    pub fn this(&self) -> &ObjectReference {
        match self {
            Request::RetrieveProperties { this, .. }
            | Request::CreatePropertyCollector { this }
            | Request::CreateFilter { this, .. }
            | Request::WaitForUpdates { this, .. }
            | Request::DestroyPropertyCollector { this } => this,
        }
    }
}

/// Well-formed replies from the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Response {
    /// Result of `RetrieveProperties`.
    ObjectContents(Vec<ObjectContent>),
    /// Result of `CreatePropertyCollector`.
    Collector(ObjectReference),
    /// Result of `CreateFilter`.
    Filter(ObjectReference),
    /// Result of `WaitForUpdates`.
    Updates(UpdateSet),
    /// Calls without a return value.
    Empty,
}

impl Response {
    /// Variant name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Response::ObjectContents(_) => "object_contents",
            Response::Collector(_) => "collector",
            Response::Filter(_) => "filter",
            Response::Updates(_) => "updates",
            Response::Empty => "empty",
        }
    }
}

/// One named value inside an [`ObjectContent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicProperty {
    /// Attribute path.
    pub name: String,
    /// Attribute value.
    pub val: JsonValue,
}

/// Raw retrieval result for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectContent {
    /// Object the properties belong to.
    pub obj: ObjectReference,
    /// Retrieved properties.
    #[serde(default)]
    pub prop_set: Vec<DynamicProperty>,
    /// Properties that could not be read.
    #[serde(default)]
    pub missing_set: Vec<MissingProperty>,
}

impl From<ObjectContent> for AttributeRecord {
    fn from(content: ObjectContent) -> Self {
        AttributeRecord {
            obj: content.obj,
            attributes: content
                .prop_set
                .into_iter()
                .map(|prop| (prop.name, prop.val))
                .collect(),
            missing: content.missing_set,
        }
    }
}

/// Updates reported for one filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilterUpdate {
    /// Filter that matched.
    pub filter: ObjectReference,
    /// Per-object updates.
    #[serde(default)]
    pub object_set: Vec<ObjectUpdate>,
}

/// Raw `WaitForUpdates` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSet {
    /// Cursor for the next round.
    pub version: VersionCursor,
    /// Per-filter updates.
    #[serde(default)]
    pub filter_set: Vec<PropertyFilterUpdate>,
}

impl UpdateSet {
    /// Flatten every filter's object updates, keeping server order.
    pub fn into_batch(self) -> UpdateBatch {
        UpdateBatch {
            cursor: self.version,
            objects: self
                .filter_set
                .into_iter()
                .flat_map(|filter| filter.object_set)
                .collect(),
        }
    }
}

/// Rejection reported by the remote service in a well-formed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFault {
    /// Fault class, e.g. `InvalidArgument` or `ManagedObjectNotFound`.
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl ServerFault {
    /// Construct a fault.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ServerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttributeSpec, ChangeRecord, ObjectQuery, UpdateKind};
    use serde_json::json;

    #[test]
    fn object_content_keeps_property_order() {
        let content = ObjectContent {
            obj: ObjectReference::new("HostSystem", "host-9"),
            prop_set: vec![
                DynamicProperty {
                    name: "summary.runtime".into(),
                    val: json!({"connectionState": "connected"}),
                },
                DynamicProperty {
                    name: "name".into(),
                    val: json!("esx-01"),
                },
            ],
            missing_set: Vec::new(),
        };
        let record = AttributeRecord::from(content);
        let paths: Vec<_> = record.attributes.keys().cloned().collect();
        assert_eq!(paths, vec!["summary.runtime", "name"]);
    }

    #[test]
    fn update_set_flattens_filters_in_order() {
        let vm = ObjectReference::new("VirtualMachine", "vm-1");
        let host = ObjectReference::new("HostSystem", "host-1");
        let set = UpdateSet {
            version: VersionCursor::from("3"),
            filter_set: vec![
                PropertyFilterUpdate {
                    filter: ObjectReference::new("PropertyFilter", "f1"),
                    object_set: vec![ObjectUpdate {
                        obj: vm.clone(),
                        kind: UpdateKind::Modify,
                        changes: vec![ChangeRecord::assign("name", json!("web"))],
                    }],
                },
                PropertyFilterUpdate {
                    filter: ObjectReference::new("PropertyFilter", "f2"),
                    object_set: vec![ObjectUpdate {
                        obj: host.clone(),
                        kind: UpdateKind::Enter,
                        changes: Vec::new(),
                    }],
                },
            ],
        };
        let batch = set.into_batch();
        assert_eq!(batch.cursor.as_str(), "3");
        assert_eq!(
            batch.objects.iter().map(|u| u.obj.clone()).collect::<Vec<_>>(),
            vec![vm, host]
        );
    }

    #[test]
    fn request_is_method_tagged() {
        let request = Request::RetrieveProperties {
            this: ObjectReference::new("PropertyCollector", "propertyCollector"),
            spec_set: vec![QueryBatch {
                queries: vec![ObjectQuery::new(ObjectReference::new("Folder", "group-d1"))],
                attributes: AttributeSpec::paths("Folder", ["name"]),
            }],
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["method"], "RetrieveProperties");
        assert_eq!(json["body"]["spec_set"][0]["attributes"]["type"], "Folder");
        assert_eq!(request.method(), "RetrieveProperties");
    }
}
