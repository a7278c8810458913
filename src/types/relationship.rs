//! Relationship tuples and the object/subject references they are made of.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The relation name that means "the object itself" rather than a userset.
pub const ELLIPSIS: &str = "...";

/// A reference to a single object: `type:id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// The object type (namespace name), e.g. `document`.
    pub object_type: String,
    /// The object ID, e.g. `readme`.
    pub object_id: String,
}

impl ObjectRef {
    /// Creates an object reference.
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }

    /// Returns the userset `self#relation`.
    pub fn with_relation(&self, relation: impl Into<String>) -> ObjectAndRelation {
        ObjectAndRelation::new(self.clone(), relation)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

impl FromStr for ObjectRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (object_type, object_id) = s.split_once(':').ok_or_else(|| {
            Error::invalid_argument(format!(
                "invalid object reference: missing ':' separator in '{}'",
                s
            ))
        })?;
        if object_type.is_empty() {
            return Err(Error::invalid_argument("object type cannot be empty"));
        }
        if object_id.is_empty() {
            return Err(Error::invalid_argument("object ID cannot be empty"));
        }
        Ok(ObjectRef::new(object_type, object_id))
    }
}

/// A userset: a relation on a specific object, `type:id#relation`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectAndRelation {
    /// The object.
    pub object: ObjectRef,
    /// The relation or permission on that object.
    pub relation: String,
}

impl ObjectAndRelation {
    /// Creates a userset reference.
    pub fn new(object: ObjectRef, relation: impl Into<String>) -> Self {
        Self {
            object,
            relation: relation.into(),
        }
    }
}

impl fmt::Display for ObjectAndRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.object, self.relation)
    }
}

/// The subject of a tuple or query.
///
/// Either a concrete object (`user:alice`) or, when `relation` is set, the
/// set of subjects defined by that relation on the object
/// (`group:eng#member`).
///
/// `...` and the empty string are normalized to "no relation":
///
/// ```rust
/// use inferadb_graph::SubjectRef;
///
/// let alice = SubjectRef::new("user", "alice", Some("..."));
/// assert_eq!(alice, SubjectRef::object("user", "alice"));
/// assert!(alice.relation.is_none());
///
/// let members: SubjectRef = "group:eng#member".parse().unwrap();
/// assert_eq!(members.relation.as_deref(), Some("member"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    /// The subject object.
    pub object: ObjectRef,
    /// Optional relation making this subject a userset.
    pub relation: Option<String>,
}

impl SubjectRef {
    /// Creates a subject reference, normalizing `...` and `""` to `None`.
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: Option<&str>,
    ) -> Self {
        Self {
            object: ObjectRef::new(object_type, object_id),
            relation: normalize_relation(relation),
        }
    }

    /// Creates a subject that is a concrete object.
    pub fn object(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object: ObjectRef::new(object_type, object_id),
            relation: None,
        }
    }

    /// Creates a userset subject.
    pub fn userset(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self::from(ObjectAndRelation::new(
            ObjectRef::new(object_type, object_id),
            relation,
        ))
    }

    /// Returns `true` if this subject is a userset.
    #[inline]
    pub fn is_userset(&self) -> bool {
        self.relation.is_some()
    }

    /// Returns the userset this subject denotes, if any.
    pub fn as_userset(&self) -> Option<ObjectAndRelation> {
        self.relation
            .as_ref()
            .map(|relation| ObjectAndRelation::new(self.object.clone(), relation.clone()))
    }

    /// Returns `true` if this subject is exactly the userset `onr`.
    pub fn is_userset_of(&self, onr: &ObjectAndRelation) -> bool {
        self.relation.as_deref() == Some(onr.relation.as_str()) && self.object == onr.object
    }
}

impl From<ObjectAndRelation> for SubjectRef {
    fn from(onr: ObjectAndRelation) -> Self {
        let relation = normalize_relation(Some(&onr.relation));
        Self {
            object: onr.object,
            relation,
        }
    }
}

impl From<ObjectRef> for SubjectRef {
    fn from(object: ObjectRef) -> Self {
        Self {
            object,
            relation: None,
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}#{}", self.object, relation),
            None => write!(f, "{}", self.object),
        }
    }
}

impl FromStr for SubjectRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (object, relation) = match s.split_once('#') {
            Some((object, relation)) => (object, Some(relation)),
            None => (s, None),
        };
        let object: ObjectRef = object.parse()?;
        Ok(SubjectRef {
            object,
            relation: normalize_relation(relation),
        })
    }
}

fn normalize_relation(relation: Option<&str>) -> Option<String> {
    match relation {
        None | Some("") | Some(ELLIPSIS) => None,
        Some(relation) => Some(relation.to_owned()),
    }
}

/// A stored relationship fact: `resource#relation@subject`.
///
/// ```rust
/// use inferadb_graph::RelationTuple;
///
/// let tuple: RelationTuple = "folder:company#viewer@folder:auditors#viewer".parse().unwrap();
/// assert_eq!(tuple.resource.to_string(), "folder:company");
/// assert_eq!(tuple.relation, "viewer");
/// assert!(tuple.subject.is_userset());
/// assert_eq!(tuple.to_string(), "folder:company#viewer@folder:auditors#viewer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationTuple {
    /// The resource the relation is stored on.
    pub resource: ObjectRef,
    /// The relation name.
    pub relation: String,
    /// The subject.
    pub subject: SubjectRef,
}

impl RelationTuple {
    /// Creates a tuple.
    pub fn new(resource: ObjectRef, relation: impl Into<String>, subject: SubjectRef) -> Self {
        Self {
            resource,
            relation: relation.into(),
            subject,
        }
    }

    /// Returns the userset `resource#relation` this tuple contributes to.
    pub fn userset(&self) -> ObjectAndRelation {
        self.resource.with_relation(self.relation.clone())
    }
}

impl fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.resource, self.relation, self.subject)
    }
}

impl FromStr for RelationTuple {
    type Err = Error;

    /// Parses `resource#relation@subject`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (userset, subject) = s.split_once('@').ok_or_else(|| {
            Error::invalid_argument(format!(
                "invalid relationship format: missing '@' separator in '{}'",
                s
            ))
        })?;
        let (resource, relation) = userset.split_once('#').ok_or_else(|| {
            Error::invalid_argument(format!(
                "invalid relationship format: missing '#' separator in '{}'",
                s
            ))
        })?;
        if relation.is_empty() {
            return Err(Error::invalid_argument(
                "relationship relation cannot be empty",
            ));
        }
        Ok(RelationTuple::new(resource.parse()?, relation, subject.parse()?))
    }
}
