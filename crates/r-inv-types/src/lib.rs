//! ---
//! inv_section: "02-data-model"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Inventory data model and wire payloads."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! Shared data model for the R-INV workspace.
//!
//! Everything that crosses the call primitive lives here: object references,
//! property query specifications with their selection rule tables, the
//! records demarshalled from retrieval results, change notifications and the
//! request/response envelopes a transport encodes.
#![warn(missing_docs)]

pub mod query;
pub mod record;
pub mod reference;
pub mod wire;

pub use query::{
    rule_table, validate_rules, AttributeSelection, AttributeSpec, ObjectQuery, QueryBatch,
    SelectionError, SelectionRule, TraversalRule,
};
pub use record::{
    AttributeRecord, ChangeOp, ChangeRecord, Entity, FilterHandle, ManagedEntity,
    MissingProperty, ObjectUpdate, UpdateBatch, UpdateKind, VersionCursor,
};
pub use reference::ObjectReference;
pub use wire::{
    DynamicProperty, ObjectContent, PropertyFilterUpdate, Request, Response, ServerFault,
    UpdateSet,
};
