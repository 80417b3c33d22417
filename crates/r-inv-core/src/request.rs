//! ---
//! inv_section: "04-property-collector"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Property retrieval, ancestry and change waiting."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
use r_inv_types::{AttributeSpec, ObjectQuery, ObjectReference, QueryBatch};

use crate::{PropertyError, Result};

/// Build one batched query for `refs`.
///
/// The first reference fixes the kind the attribute selection is scoped to;
/// any later reference of another kind fails the whole batch. `attrs` of
/// `None` selects every attribute, otherwise the paths are used verbatim.
pub fn build_batch(refs: &[ObjectReference], attrs: Option<&[String]>) -> Result<QueryBatch> {
    let (first, rest) = refs.split_first().ok_or(PropertyError::EmptyBatch)?;

    if let Some(other) = rest.iter().find(|obj| obj.kind != first.kind) {
        return Err(PropertyError::TypeMismatch {
            expected: first.kind.clone(),
            found: other.kind.clone(),
        });
    }

    let attributes = match attrs {
        None => AttributeSpec::all(first.kind.clone()),
        Some(paths) => AttributeSpec::paths(first.kind.clone(), paths.iter().cloned()),
    };

    Ok(QueryBatch {
        queries: refs.iter().cloned().map(ObjectQuery::new).collect(),
        attributes,
    })
}
