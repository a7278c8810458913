//! Namespace definitions: object types, their relations, and rewrite rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A set-algebra expression defining how a relation is computed.
///
/// ```text
/// viewer = This ∪ editor ∪ parent->viewer
///
/// Rewrite::Union(vec![
///     Rewrite::This,
///     Rewrite::ComputedUserset("editor"),
///     Rewrite::TupleToUserset { tupleset: "parent", computed: "viewer" },
/// ])
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rewrite {
    /// Tuples stored directly under the relation.
    This,

    /// Another relation on the same object.
    ComputedUserset(String),

    /// Follow `tupleset` on this object, then evaluate `computed` on each
    /// object it points at.
    TupleToUserset {
        /// Relation on this object whose subjects are traversed.
        tupleset: String,
        /// Relation evaluated on each traversed object.
        computed: String,
    },

    /// Member of any child.
    Union(Vec<Rewrite>),

    /// Member of every child.
    Intersection(Vec<Rewrite>),

    /// Member of `base` and not of `subtract`.
    Exclusion {
        /// The including side.
        base: Box<Rewrite>,
        /// The excluded side.
        subtract: Box<Rewrite>,
    },
}

impl Rewrite {
    /// Shorthand for [`Rewrite::ComputedUserset`].
    pub fn computed(relation: impl Into<String>) -> Self {
        Rewrite::ComputedUserset(relation.into())
    }

    /// Shorthand for [`Rewrite::TupleToUserset`].
    pub fn tuple_to_userset(tupleset: impl Into<String>, computed: impl Into<String>) -> Self {
        Rewrite::TupleToUserset {
            tupleset: tupleset.into(),
            computed: computed.into(),
        }
    }

    /// Shorthand for [`Rewrite::Exclusion`].
    pub fn exclusion(base: Rewrite, subtract: Rewrite) -> Self {
        Rewrite::Exclusion {
            base: Box::new(base),
            subtract: Box::new(subtract),
        }
    }

    /// Calls `f` on this node and every node below it.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Rewrite)) {
        f(self);
        match self {
            Rewrite::Union(children) | Rewrite::Intersection(children) => {
                for child in children {
                    child.walk(f);
                }
            }
            Rewrite::Exclusion { base, subtract } => {
                base.walk(f);
                subtract.walk(f);
            }
            _ => {}
        }
    }

    /// Returns `true` if a member of `relation` on the same object can be a
    /// member of this rewrite through a computed userset.
    ///
    /// Subtracted branches never contribute membership and are skipped.
    pub fn computes_from(&self, relation: &str) -> bool {
        match self {
            Rewrite::ComputedUserset(r) => r == relation,
            Rewrite::Union(children) | Rewrite::Intersection(children) => {
                children.iter().any(|c| c.computes_from(relation))
            }
            Rewrite::Exclusion { base, .. } => base.computes_from(relation),
            _ => false,
        }
    }

    /// Returns `true` if this rewrite reads tuples stored under its own
    /// relation, outside any subtracted branch.
    pub fn includes_this(&self) -> bool {
        match self {
            Rewrite::This => true,
            Rewrite::Union(children) | Rewrite::Intersection(children) => {
                children.iter().any(Rewrite::includes_this)
            }
            Rewrite::Exclusion { base, .. } => base.includes_this(),
            _ => false,
        }
    }

    /// Collects the `(tupleset, computed)` arrows that contribute membership.
    pub fn arrows(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_arrows(&mut out);
        out
    }

    fn collect_arrows<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            Rewrite::TupleToUserset { tupleset, computed } => {
                out.push((tupleset.as_str(), computed.as_str()));
            }
            Rewrite::Union(children) | Rewrite::Intersection(children) => {
                for child in children {
                    child.collect_arrows(out);
                }
            }
            Rewrite::Exclusion { base, .. } => base.collect_arrows(out),
            _ => {}
        }
    }
}

/// A relation (or permission) on a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// The relation name.
    pub name: String,
    /// How membership is computed.
    pub rewrite: Rewrite,
}

impl Relation {
    /// A relation holding only directly stored tuples.
    pub fn direct(name: impl Into<String>) -> Self {
        Self::new(name, Rewrite::This)
    }

    /// A relation with the given rewrite.
    pub fn new(name: impl Into<String>, rewrite: Rewrite) -> Self {
        Self {
            name: name.into(),
            rewrite,
        }
    }
}

/// An object type with its relations.
///
/// ## Example
///
/// ```rust
/// use inferadb_graph::{NamespaceDefinition, Relation, Rewrite};
///
/// let folder = NamespaceDefinition::new("folder")
///     .with_relation(Relation::direct("owner"))
///     .with_relation(Relation::direct("parent"))
///     .with_relation(Relation::new(
///         "viewer",
///         Rewrite::Union(vec![
///             Rewrite::This,
///             Rewrite::computed("owner"),
///             Rewrite::tuple_to_userset("parent", "viewer"),
///         ]),
///     ));
///
/// assert!(folder.validate().is_ok());
/// assert!(folder.relation("viewer").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDefinition {
    /// The namespace (object type) name.
    pub name: String,
    /// Relations in declaration order.
    pub relations: Vec<Relation>,
}

impl NamespaceDefinition {
    /// Creates an empty namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relations: Vec::new(),
        }
    }

    /// Adds a relation.
    #[must_use]
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Looks up a relation by name.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Returns `true` if `name` is defined on this namespace.
    #[inline]
    pub fn has_relation(&self, name: &str) -> bool {
        self.relation(name).is_some()
    }

    /// Checks the definition is self-consistent.
    ///
    /// Fails with `SchemaViolation` when a relation name repeats, when a
    /// union or intersection has no children, or when a computed userset or
    /// tupleset names a relation this namespace does not define.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::schema_violation("namespace name cannot be empty"));
        }

        let mut seen = HashSet::new();
        for relation in &self.relations {
            if relation.name.is_empty() {
                return Err(Error::schema_violation(format!(
                    "namespace `{}` has a relation with an empty name",
                    self.name
                )));
            }
            if !seen.insert(relation.name.as_str()) {
                return Err(Error::schema_violation(format!(
                    "duplicate relation `{}` in namespace `{}`",
                    relation.name, self.name
                )));
            }
        }

        for relation in &self.relations {
            let mut problem = None;
            relation.rewrite.walk(&mut |node| {
                if problem.is_some() {
                    return;
                }
                problem = match node {
                    Rewrite::ComputedUserset(r) if !seen.contains(r.as_str()) => {
                        Some(format!("computed userset references undefined relation `{}`", r))
                    }
                    Rewrite::TupleToUserset { tupleset, .. }
                        if !seen.contains(tupleset.as_str()) =>
                    {
                        Some(format!(
                            "tuple-to-userset references undefined tupleset `{}`",
                            tupleset
                        ))
                    }
                    Rewrite::Union(children) if children.is_empty() => {
                        Some("union has no children".to_owned())
                    }
                    Rewrite::Intersection(children) if children.is_empty() => {
                        Some("intersection has no children".to_owned())
                    }
                    _ => None,
                };
            });
            if let Some(problem) = problem {
                return Err(Error::schema_violation(format!(
                    "{}#{}: {}",
                    self.name, relation.name, problem
                )));
            }
        }

        Ok(())
    }
}
