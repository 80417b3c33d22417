//! ---
//! inv_section: "02-data-model"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Inventory data model and wire payloads."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::ObjectReference;

/// Attribute values retrieved for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// Object the values belong to.
    pub obj: ObjectReference,
    /// Attribute path to value, in the order the server delivered them.
    #[serde(default)]
    pub attributes: IndexMap<String, JsonValue>,
    /// Paths the server could not read for this object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<MissingProperty>,
}

impl AttributeRecord {
    /// Create an empty record for `obj`.
    pub fn new(obj: ObjectReference) -> Self {
        Self {
            obj,
            attributes: IndexMap::new(),
            missing: Vec::new(),
        }
    }

    /// Builder-style attribute insertion.
    pub fn with_attribute(mut self, path: impl Into<String>, value: JsonValue) -> Self {
        self.attributes.insert(path.into(), value);
        self
    }

    /// Look up a single attribute value.
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        self.attributes.get(path)
    }
}

/// A path the server reported as unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingProperty {
    /// Attribute path.
    pub path: String,
    /// Server-provided reason.
    pub fault: String,
}

/// Capability shared by every record shape that participates in a parent chain.
pub trait ManagedEntity {
    /// Reference of the record itself.
    fn self_ref(&self) -> &ObjectReference;
    /// Reference of the parent, `None` at the root of the fetched subtree.
    fn parent(&self) -> Option<&ObjectReference>;
    /// Display name.
    fn name(&self) -> &str;
}

/// Generic inventory entity: self reference, optional parent and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Reference of the entity.
    #[serde(rename = "self")]
    pub self_ref: ObjectReference,
    /// Parent entity, absent for the root.
    #[serde(default)]
    pub parent: Option<ObjectReference>,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

impl Entity {
    /// Construct an entity record.
    pub fn new(
        self_ref: ObjectReference,
        parent: Option<ObjectReference>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            self_ref,
            parent,
            name: name.into(),
        }
    }
}

impl ManagedEntity for Entity {
    fn self_ref(&self) -> &ObjectReference {
        &self.self_ref
    }

    fn parent(&self) -> Option<&ObjectReference> {
        self.parent.as_ref()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Server-owned property collector or filter, referenced by identifier only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterHandle(ObjectReference);

impl FilterHandle {
    /// Wrap a server-issued reference.
    pub fn new(reference: ObjectReference) -> Self {
        Self(reference)
    }

    /// Underlying server reference.
    pub fn reference(&self) -> &ObjectReference {
        &self.0
    }
}

impl fmt::Display for FilterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque position in the change stream. Empty means "initial snapshot".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionCursor(String);

impl VersionCursor {
    /// Cursor requesting the full current state.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Returns `true` for the initial (empty) cursor.
    pub fn is_initial(&self) -> bool {
        self.0.is_empty()
    }

    /// Token as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VersionCursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for VersionCursor {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}

impl fmt::Display for VersionCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operation applied to an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeOp {
    /// Value added to a collection attribute.
    Add,
    /// Value removed.
    Remove,
    /// Value replaced.
    Assign,
    /// Removed because the containing object went away.
    IndirectRemove,
}

/// One attribute change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Attribute path.
    #[serde(rename = "name")]
    pub path: String,
    /// Operation applied.
    pub op: ChangeOp,
    /// New value, absent for removals.
    #[serde(default, rename = "val", skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
}

impl ChangeRecord {
    /// Shorthand for an `assign` change.
    pub fn assign(path: impl Into<String>, value: JsonValue) -> Self {
        Self {
            path: path.into(),
            op: ChangeOp::Assign,
            value: Some(value),
        }
    }
}

/// How an object relates to the filter in an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Object entered the filter scope.
    Enter,
    /// Object stayed in scope and changed.
    Modify,
    /// Object left the filter scope.
    Leave,
}

/// Ordered attribute changes for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    /// Object that changed.
    pub obj: ObjectReference,
    /// Relation to the filter.
    pub kind: UpdateKind,
    /// Changes in server order.
    #[serde(default, rename = "change_set")]
    pub changes: Vec<ChangeRecord>,
}

/// Result of one `WaitForUpdates` round, flattened across filters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateBatch {
    /// Cursor to send on the next round.
    pub cursor: VersionCursor,
    /// Per-object updates in server order.
    pub objects: Vec<ObjectUpdate>,
}

impl UpdateBatch {
    /// Updates for `target` only.
    pub fn for_object<'a>(
        &'a self,
        target: &'a ObjectReference,
    ) -> impl Iterator<Item = &'a ObjectUpdate> + 'a {
        self.objects.iter().filter(move |update| &update.obj == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_decodes_from_self_keyed_object() {
        let entity: Entity = serde_json::from_value(json!({
            "self": {"type": "Folder", "value": "group-v3"},
            "parent": {"type": "Datacenter", "value": "datacenter-2"},
            "name": "vm"
        }))
        .expect("decode entity");
        assert_eq!(entity.name(), "vm");
        assert_eq!(
            entity.parent(),
            Some(&ObjectReference::new("Datacenter", "datacenter-2"))
        );
    }

    #[test]
    fn initial_cursor_is_empty() {
        assert!(VersionCursor::initial().is_initial());
        assert!(!VersionCursor::from("1").is_initial());
        assert_eq!(VersionCursor::from("7").as_str(), "7");
    }

    #[test]
    fn update_batch_filters_by_object() {
        let target = ObjectReference::new("VirtualMachine", "vm-1");
        let other = ObjectReference::new("VirtualMachine", "vm-2");
        let batch = UpdateBatch {
            cursor: VersionCursor::from("1"),
            objects: vec![
                ObjectUpdate {
                    obj: other.clone(),
                    kind: UpdateKind::Modify,
                    changes: vec![ChangeRecord::assign("name", json!("b"))],
                },
                ObjectUpdate {
                    obj: target.clone(),
                    kind: UpdateKind::Enter,
                    changes: vec![ChangeRecord::assign("name", json!("a"))],
                },
            ],
        };
        let hits: Vec<_> = batch.for_object(&target).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].obj, target);
    }
}
