//! ---
//! inv_section: "11-test-harness"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "In-memory inventory service for exercising the call primitive."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! Server-side evaluation of queries against the in-memory store.
use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use r_inv_types::{
    rule_table, AttributeSelection, AttributeSpec, ChangeRecord, DynamicProperty, ObjectContent,
    ObjectQuery, ObjectReference, SelectionError, SelectionRule, TraversalRule,
};
use serde_json::Value as JsonValue;

/// Kind every entity-valued rule or spec may be scoped to.
pub const GENERIC_KIND: &str = "ManagedEntity";

pub(crate) type Store = BTreeMap<ObjectReference, IndexMap<String, JsonValue>>;

pub(crate) fn kind_matches(kind: &str, obj: &ObjectReference) -> bool {
    kind == GENERIC_KIND || obj.is_kind(kind)
}

/// Objects reached by `query`, in discovery order.
pub(crate) fn select<'a>(
    store: &'a Store,
    query: &'a ObjectQuery,
) -> Result<Vec<ObjectReference>, SelectionError> {
    let mut walk = Walk {
        store,
        table: rule_table(&query.select_set)?,
        visited: HashSet::from([query.obj.clone()]),
        selected: Vec::new(),
    };
    if !query.skip {
        walk.selected.push(query.obj.clone());
    }
    walk.apply_all(&query.select_set, &query.obj)?;
    Ok(walk.selected)
}

struct Walk<'a> {
    store: &'a Store,
    table: HashMap<&'a str, &'a TraversalRule>,
    visited: HashSet<ObjectReference>,
    selected: Vec<ObjectReference>,
}

impl<'a> Walk<'a> {
    fn apply_all(
        &mut self,
        rules: &'a [SelectionRule],
        from: &ObjectReference,
    ) -> Result<(), SelectionError> {
        for rule in rules {
            let traversal = match rule {
                SelectionRule::Traverse(traversal) => traversal,
                SelectionRule::Named { name } => *self
                    .table
                    .get(name.as_str())
                    .ok_or_else(|| SelectionError::Unresolved(name.clone()))?,
            };
            self.follow(traversal, from)?;
        }
        Ok(())
    }

    fn follow(
        &mut self,
        rule: &'a TraversalRule,
        from: &ObjectReference,
    ) -> Result<(), SelectionError> {
        if !kind_matches(&rule.kind, from) {
            return Ok(());
        }
        let Some(value) = self.store.get(from).and_then(|attrs| attrs.get(&rule.path)) else {
            return Ok(());
        };
        for next in references(value) {
            if !self.store.contains_key(&next) || !self.visited.insert(next.clone()) {
                continue;
            }
            if !rule.skip {
                self.selected.push(next.clone());
            }
            self.apply_all(&rule.select_set, &next)?;
        }
        Ok(())
    }
}

fn references(value: &JsonValue) -> Vec<ObjectReference> {
    match value {
        JsonValue::Array(items) => items.iter().flat_map(references).collect(),
        JsonValue::Null => Vec::new(),
        other => serde_json::from_value(other.clone()).into_iter().collect(),
    }
}

/// Attributes of `obj` selected by `spec`, or `None` when out of scope.
pub(crate) fn content(store: &Store, obj: &ObjectReference, spec: &AttributeSpec) -> Option<ObjectContent> {
    if !kind_matches(&spec.kind, obj) {
        return None;
    }
    let attributes = store.get(obj)?;
    let prop_set = attributes
        .iter()
        .filter(|(path, _)| wants(spec, path))
        .map(|(path, value)| DynamicProperty {
            name: path.clone(),
            val: value.clone(),
        })
        .collect();
    Some(ObjectContent {
        obj: obj.clone(),
        prop_set,
        missing_set: Vec::new(),
    })
}

/// Current values of the attributes `spec` selects, as assignments.
pub(crate) fn snapshot(store: &Store, obj: &ObjectReference, spec: &AttributeSpec) -> Vec<ChangeRecord> {
    content(store, obj, spec)
        .map(|content| {
            content
                .prop_set
                .into_iter()
                .map(|prop| ChangeRecord::assign(prop.name, prop.val))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn wants(spec: &AttributeSpec, path: &str) -> bool {
    if spec.is_all() {
        return true;
    }
    matches!(&spec.selection, AttributeSelection::Paths(paths) if paths.iter().any(|p| p == path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn folder(id: &str) -> ObjectReference {
        ObjectReference::new("Folder", id)
    }

    fn store() -> Store {
        let mut store = Store::new();
        let mut root = IndexMap::new();
        root.insert("name".to_string(), json!("root"));
        store.insert(folder("root"), root);
        for (id, parent) in [("dc", "root"), ("vmfolder", "dc")] {
            let mut attrs = IndexMap::new();
            attrs.insert("name".to_string(), json!(id));
            attrs.insert("parent".to_string(), serde_json::to_value(folder(parent)).unwrap());
            store.insert(folder(id), attrs);
        }
        store
    }

    #[test]
    fn named_rule_walks_to_the_root() {
        let store = store();
        let query = ObjectQuery::with_selection(
            folder("vmfolder"),
            vec![SelectionRule::follow("up", GENERIC_KIND, "parent")],
        );
        let selected = select(&store, &query).expect("select");
        assert_eq!(selected, vec![folder("vmfolder"), folder("dc"), folder("root")]);
    }

    #[test]
    fn skip_hides_the_start_and_unknown_names_fail() {
        let store = store();
        let mut query = ObjectQuery::with_selection(
            folder("dc"),
            vec![SelectionRule::follow("up", "Folder", "parent")],
        );
        query.skip = true;
        assert_eq!(select(&store, &query).expect("select"), vec![folder("root")]);

        let broken = ObjectQuery::with_selection(folder("dc"), vec![SelectionRule::named("nope")]);
        assert_eq!(
            select(&store, &broken),
            Err(SelectionError::Unresolved("nope".into()))
        );
    }

    #[test]
    fn content_respects_kind_and_paths() {
        let store = store();
        let spec = AttributeSpec::paths("Folder", ["parent"]);
        let content = content(&store, &folder("dc"), &spec).expect("in scope");
        assert_eq!(content.prop_set.len(), 1);
        assert_eq!(content.prop_set[0].name, "parent");
        assert!(super::content(&store, &folder("dc"), &AttributeSpec::all("HostSystem")).is_none());
        let everything = super::content(&store, &folder("dc"), &AttributeSpec::all(GENERIC_KIND))
            .expect("generic kind");
        assert_eq!(everything.prop_set.len(), 2);
    }
}
