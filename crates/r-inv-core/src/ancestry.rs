//! ---
//! inv_section: "04-property-collector"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Property retrieval, ancestry and change waiting."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! Root-first parent chains of inventory objects.
//!
//! One retrieval follows the parent reference from the object upward with
//! a self-referencing traversal rule; the server returns the chain in no
//! particular order, so it is rebuilt locally from the parent links.
use std::collections::HashSet;

use r_inv_common::AncestryConfig;
use r_inv_types::{
    AttributeSpec, Entity, ManagedEntity, ObjectQuery, ObjectReference, QueryBatch,
    SelectionRule,
};
use tracing::debug;

use crate::fetch::PropertyFetcher;
use crate::{PropertyError, Result};

/// Resolves the ancestry of managed entities.
#[derive(Clone)]
pub struct AncestryResolver {
    fetcher: PropertyFetcher,
}

impl AncestryResolver {
    pub fn new(fetcher: PropertyFetcher, config: AncestryConfig) -> Self {
        Self {
            fetcher: fetcher.with_ancestry(config),
        }
    }

    fn config(&self) -> &AncestryConfig {
        self.fetcher.ancestry()
    }

    /// Query selecting `obj` and every entity reachable through its parents.
    pub fn query_for(&self, obj: &ObjectReference) -> ObjectQuery {
        ObjectQuery::with_selection(
            obj.clone(),
            vec![SelectionRule::follow(
                self.config().traversal_name.clone(),
                self.config().entity_kind.clone(),
                self.config().parent_path.clone(),
            )],
        )
    }

    /// Return the chain from the inventory root down to `obj`, inclusive.
    pub fn resolve(&self, obj: &ObjectReference) -> Result<Vec<Entity>> {
        let batch = QueryBatch {
            queries: vec![self.query_for(obj)],
            attributes: AttributeSpec::paths(
                self.config().entity_kind.clone(),
                [
                    self.config().name_path.clone(),
                    self.config().parent_path.clone(),
                ],
            ),
        };

        let entities = self.fetcher.fetch_as::<Entity>(&batch)?;
        let chain = order_ancestry(obj, entities)?;

        if let Some(metrics) = self.fetcher.metrics() {
            metrics.observe_ancestry_depth(chain.len());
        }
        debug!(obj = %obj, depth = chain.len(), "ancestry resolved");
        Ok(chain)
    }
}

/// Arrange `records` root first so that each element is the parent of the
/// next and the last one is `obj`.
///
/// Every record has to be placed exactly once. Missing links, forks, cycles
/// and repeated references fail with [`PropertyError::InconsistentAncestry`].
pub fn order_ancestry<E: ManagedEntity>(obj: &ObjectReference, records: Vec<E>) -> Result<Vec<E>> {
    let inconsistent = |reason: String| PropertyError::InconsistentAncestry {
        obj: obj.clone(),
        reason,
    };

    if records.is_empty() {
        return Err(inconsistent("no records returned".into()));
    }

    {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.self_ref()) {
                return Err(inconsistent(format!(
                    "{} appears more than once",
                    record.self_ref()
                )));
            }
        }
    }

    let (mut roots, mut remaining): (Vec<E>, Vec<E>) =
        records.into_iter().partition(|record| record.parent().is_none());
    let root = match roots.len() {
        0 => return Err(inconsistent("no record without a parent".into())),
        1 => roots.remove(0),
        n => return Err(inconsistent(format!("{n} records without a parent"))),
    };

    let mut chain = Vec::with_capacity(remaining.len() + 1);
    chain.push(root);
    while !remaining.is_empty() {
        let last = chain[chain.len() - 1].self_ref().clone();
        let index = {
            let mut children = remaining
                .iter()
                .enumerate()
                .filter(|(_, record)| record.parent() == Some(&last))
                .map(|(index, _)| index);
            match (children.next(), children.next()) {
                (Some(index), None) => index,
                (None, _) => {
                    return Err(inconsistent(format!(
                        "no child of {last} among {} remaining record(s)",
                        remaining.len()
                    )))
                }
                (Some(_), Some(_)) => {
                    return Err(inconsistent(format!("{last} has more than one child")))
                }
            }
        };
        chain.push(remaining.swap_remove(index));
    }

    let tail = chain[chain.len() - 1].self_ref();
    if tail != obj {
        return Err(inconsistent(format!("chain ends at {tail}")));
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str) -> ObjectReference {
        ObjectReference::new("Folder", id)
    }

    fn entity(id: &str, parent: Option<&str>) -> Entity {
        Entity::new(folder(id), parent.map(folder), id.to_uppercase())
    }

    fn ids(chain: &[Entity]) -> Vec<&str> {
        chain.iter().map(|e| e.self_ref.id.as_str()).collect()
    }

    #[test]
    fn orders_shuffled_records_root_first() {
        let records = vec![
            entity("c", Some("b")),
            entity("a", None),
            entity("b", Some("a")),
        ];
        let chain = order_ancestry(&folder("c"), records).expect("chain");
        assert_eq!(ids(&chain), vec!["a", "b", "c"]);
    }

    #[test]
    fn lone_root_is_its_own_ancestry() {
        let chain = order_ancestry(&folder("x"), vec![entity("x", None)]).expect("chain");
        assert_eq!(ids(&chain), vec!["x"]);
    }

    #[test]
    fn missing_root_is_rejected() {
        let records = vec![entity("b", Some("a")), entity("c", Some("b"))];
        let err = order_ancestry(&folder("c"), records).expect_err("no root");
        assert!(matches!(err, PropertyError::InconsistentAncestry { .. }));
    }

    #[test]
    fn cycle_below_root_is_rejected() {
        let records = vec![
            entity("a", None),
            entity("b", Some("c")),
            entity("c", Some("b")),
        ];
        let err = order_ancestry(&folder("c"), records).expect_err("cycle");
        assert!(err.to_string().contains("no child of Folder:a"));
    }

    #[test]
    fn orphan_and_duplicates_are_rejected() {
        let orphan = vec![
            entity("a", None),
            entity("b", Some("a")),
            entity("z", Some("y")),
        ];
        assert!(order_ancestry(&folder("b"), orphan).is_err());

        let duplicate = vec![entity("a", None), entity("a", None)];
        let err = order_ancestry(&folder("a"), duplicate).expect_err("duplicate");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn fork_and_wrong_tail_are_rejected() {
        let fork = vec![
            entity("a", None),
            entity("b", Some("a")),
            entity("c", Some("a")),
        ];
        let err = order_ancestry(&folder("c"), fork).expect_err("fork");
        assert!(err.to_string().contains("more than one child"));

        let chain = vec![entity("a", None), entity("b", Some("a"))];
        let err = order_ancestry(&folder("q"), chain).expect_err("wrong tail");
        assert!(err.to_string().contains("chain ends at Folder:b"));
    }

    #[test]
    fn empty_result_is_rejected() {
        assert!(order_ancestry::<Entity>(&folder("a"), Vec::new()).is_err());
    }
}
