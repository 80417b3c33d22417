//! ---
//! inv_section: "02-data-model"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Inventory data model and wire payloads."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ObjectReference;

/// Which attributes a query retrieves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSelection {
    /// Every attribute the server knows for the kind.
    All,
    /// The listed attribute paths, in caller order.
    Paths(Vec<String>),
}

/// Attribute selection scoped to exactly one object kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Object kind the selection applies to.
    #[serde(rename = "type")]
    pub kind: String,
    /// Selected attributes.
    pub selection: AttributeSelection,
}

impl AttributeSpec {
    /// Select every attribute of `kind`.
    pub fn all(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            selection: AttributeSelection::All,
        }
    }

    /// Select the given paths of `kind`, verbatim.
    pub fn paths<I, S>(kind: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            selection: AttributeSelection::Paths(paths.into_iter().map(Into::into).collect()),
        }
    }

    /// Returns `true` when every attribute is requested.
    pub fn is_all(&self) -> bool {
        matches!(self.selection, AttributeSelection::All)
    }
}

/// A traversal step: from an object of `kind`, follow the reference(s) stored
/// at `path` and continue with `select_set` on whatever is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalRule {
    /// Name other rules use to refer back to this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Kind of object the rule applies to.
    #[serde(rename = "type")]
    pub kind: String,
    /// Attribute holding the reference(s) to follow.
    pub path: String,
    /// When set, objects reached through this rule are traversed but not reported.
    #[serde(default)]
    pub skip: bool,
    /// Rules applied to the objects reached.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select_set: Vec<SelectionRule>,
}

/// Entry of a selection rule table.
///
/// Recursion is expressed by name: a [`SelectionRule::Named`] entry points
/// at a [`TraversalRule`] declared elsewhere in the same table, possibly the
/// rule that contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SelectionRule {
    /// Inline traversal rule.
    Traverse(TraversalRule),
    /// Reference to a named traversal rule.
    Named {
        /// Name of the referenced rule.
        name: String,
    },
}

impl SelectionRule {
    /// Build a rule that follows `path` on objects of `kind` repeatedly until
    /// no further reference is found.
    pub fn follow(
        name: impl Into<String>,
        kind: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let name = name.into();
        SelectionRule::Traverse(TraversalRule {
            name: Some(name.clone()),
            kind: kind.into(),
            path: path.into(),
            skip: false,
            select_set: vec![SelectionRule::Named { name }],
        })
    }

    /// Reference a named rule.
    pub fn named(name: impl Into<String>) -> Self {
        SelectionRule::Named { name: name.into() }
    }
}

/// Problems detected while validating a selection rule table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// A named reference does not match any traversal rule in the table.
    #[error("selection rule references unknown rule '{0}'")]
    Unresolved(String),
    /// Two traversal rules share the same name.
    #[error("selection rule name '{0}' is declared more than once")]
    Duplicate(String),
}

/// Collect every named traversal rule reachable from `rules`.
pub fn rule_table(
    rules: &[SelectionRule],
) -> Result<HashMap<&str, &TraversalRule>, SelectionError> {
    fn collect<'a>(
        rules: &'a [SelectionRule],
        table: &mut HashMap<&'a str, &'a TraversalRule>,
    ) -> Result<(), SelectionError> {
        for rule in rules {
            if let SelectionRule::Traverse(traversal) = rule {
                if let Some(name) = traversal.name.as_deref() {
                    if table.insert(name, traversal).is_some() {
                        return Err(SelectionError::Duplicate(name.to_owned()));
                    }
                }
                collect(&traversal.select_set, table)?;
            }
        }
        Ok(())
    }

    let mut table = HashMap::new();
    collect(rules, &mut table)?;
    Ok(table)
}

/// Check that every named reference in `rules` resolves within the table.
pub fn validate_rules(rules: &[SelectionRule]) -> Result<(), SelectionError> {
    fn check(
        rules: &[SelectionRule],
        table: &HashMap<&str, &TraversalRule>,
    ) -> Result<(), SelectionError> {
        for rule in rules {
            match rule {
                SelectionRule::Named { name } => {
                    if !table.contains_key(name.as_str()) {
                        return Err(SelectionError::Unresolved(name.clone()));
                    }
                }
                SelectionRule::Traverse(traversal) => check(&traversal.select_set, table)?,
            }
        }
        Ok(())
    }

    let table = rule_table(rules)?;
    check(rules, &table)
}

/// Starting point of a query, optionally widened by selection rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectQuery {
    /// Object the query starts from.
    pub obj: ObjectReference,
    /// When set, the starting object itself is not reported.
    #[serde(default)]
    pub skip: bool,
    /// Selection rules applied from the starting object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select_set: Vec<SelectionRule>,
}

impl ObjectQuery {
    /// Query a single object.
    pub fn new(obj: ObjectReference) -> Self {
        Self {
            obj,
            skip: false,
            select_set: Vec::new(),
        }
    }

    /// Query an object and whatever the rules reach from it.
    pub fn with_selection(obj: ObjectReference, select_set: Vec<SelectionRule>) -> Self {
        Self {
            obj,
            skip: false,
            select_set,
        }
    }

    /// Validate the query's rule table.
    pub fn validate(&self) -> Result<(), SelectionError> {
        validate_rules(&self.select_set)
    }
}

/// Ordered object queries sharing one attribute selection, sent as one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBatch {
    /// Queries in submission order.
    pub queries: Vec<ObjectQuery>,
    /// Attribute selection shared by every query.
    pub attributes: AttributeSpec,
}

impl QueryBatch {
    /// Validate the rule tables of every query in the batch.
    pub fn validate(&self) -> Result<(), SelectionError> {
        self.queries.iter().try_for_each(ObjectQuery::validate)
    }

    /// Object kind the batch is scoped to.
    pub fn kind(&self) -> &str {
        &self.attributes.kind
    }
}
