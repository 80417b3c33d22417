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

use serde::{Deserialize, Serialize};

/// Identifies a managed object in the remote inventory.
///
/// Two references are equal when both the kind and the identifier match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectReference {
    /// Object kind, e.g. `Folder` or `VirtualMachine`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Server-assigned identifier, unique within the kind.
    #[serde(rename = "value")]
    pub id: String,
}

impl ObjectReference {
    /// Construct a reference from its kind and identifier.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Returns `true` when the reference is of the given kind.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_uses_kind_and_id() {
        let a = ObjectReference::new("Folder", "group-d1");
        let b = ObjectReference::new("Folder", "group-d1");
        let c = ObjectReference::new("Datacenter", "group-d1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let reference = ObjectReference::new("VirtualMachine", "vm-42");
        let json = serde_json::to_value(&reference).expect("serialize");
        assert_eq!(json, serde_json::json!({"type": "VirtualMachine", "value": "vm-42"}));
        assert_eq!(reference.to_string(), "VirtualMachine:vm-42");
    }
}
