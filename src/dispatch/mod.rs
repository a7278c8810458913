//! Permission graph evaluation.
//!
//! A [`Dispatcher`] answers three questions against a pinned revision:
//!
//! - **Check**: is the subject a member of `resource#relation`?
//! - **Expand**: what is the tree of subjects behind `resource#relation`?
//! - **LookupResources**: which objects of a type does the subject reach?
//!
//! [`LocalDispatcher`] evaluates everything in-process. Rewrite branches run
//! as futures polled concurrently within the calling task; a branch whose
//! result is no longer needed is dropped, which cancels everything below it.
//!
//! ## Key Invariant
//!
//! A subject that is not a member is [`Membership::NotMember`], never an
//! error. Errors mean no complete answer could be produced: schema
//! violations, datastore failures and exhausted depth all abort the whole
//! request.

mod check;
mod expand;
mod local;
mod lookup;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

pub use expand::{ExpandTree, SetOperation};
pub use local::LocalDispatcher;
pub use lookup::LookupStream;

use crate::types::{ObjectAndRelation, Revision, SubjectRef};
use crate::Error;

// ============================================================================
// Results
// ============================================================================

/// Whether a subject belongs to a userset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// The subject is a member.
    Member,
    /// The subject is not a member.
    NotMember,
}

impl Membership {
    /// Returns `true` for [`Membership::Member`].
    #[inline]
    pub fn is_member(&self) -> bool {
        matches!(self, Membership::Member)
    }
}

impl From<bool> for Membership {
    fn from(member: bool) -> Self {
        if member {
            Membership::Member
        } else {
            Membership::NotMember
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Membership::Member => write!(f, "member"),
            Membership::NotMember => write!(f, "not_member"),
        }
    }
}

/// Cost of answering a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Number of userset evaluations performed.
    pub dispatch_count: u32,
    /// Deepest recursion level reached.
    pub depth_required: u32,
}

/// Outcome of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult {
    /// The answer.
    pub membership: Membership,
    /// What it cost.
    pub meta: ResponseMeta,
}

/// Outcome of an expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandResult {
    /// The expansion.
    pub tree: ExpandTree,
    /// What it cost.
    pub meta: ResponseMeta,
}

/// How far an expansion follows userset subjects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandMode {
    /// Userset subjects appear as leaf subjects.
    #[default]
    Shallow,
    /// Userset subjects are expanded into child trees.
    Recursive,
}

// ============================================================================
// Requests
// ============================================================================

/// Is `subject` a member of `resource`?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    /// The userset being checked, e.g. `document:readme#viewer`.
    pub resource: ObjectAndRelation,
    /// The subject.
    pub subject: SubjectRef,
    /// The revision every read is pinned to.
    pub revision: Revision,
}

/// Expand `resource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandRequest {
    /// The userset to expand.
    pub resource: ObjectAndRelation,
    /// How far to follow userset subjects.
    pub mode: ExpandMode,
    /// The revision every read is pinned to.
    pub revision: Revision,
}

/// Find objects of `resource_type` on which `subject` has `permission`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    /// The object type to search.
    pub resource_type: String,
    /// The relation or permission.
    pub permission: String,
    /// The subject.
    pub subject: SubjectRef,
    /// The revision every read is pinned to.
    pub revision: Revision,
}

// ============================================================================
// Dispatcher trait
// ============================================================================

/// Evaluates permission queries.
#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync {
    /// Decides membership of a subject in a userset.
    async fn check(&self, request: CheckRequest) -> Result<CheckResult, Error>;

    /// Builds the subject tree of a userset.
    async fn expand(&self, request: ExpandRequest) -> Result<ExpandResult, Error>;

    /// Streams the IDs of matching resources.
    ///
    /// Validation happens before the stream is returned. The stream yields
    /// each ID at most once, in no particular order, and stops at the first
    /// error.
    async fn lookup_resources(&self, request: LookupRequest) -> Result<LookupStream, Error>;
}

/// Per-request counters shared by every branch of one evaluation.
#[derive(Debug)]
pub(crate) struct RequestStats {
    max_depth: u32,
    dispatch_count: AtomicU32,
    depth_required: AtomicU32,
}

impl RequestStats {
    pub(crate) fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            dispatch_count: AtomicU32::new(0),
            depth_required: AtomicU32::new(0),
        }
    }

    /// Records one evaluation with `remaining` depth left.
    pub(crate) fn record(&self, remaining: u32) {
        self.dispatch_count.fetch_add(1, Ordering::Relaxed);
        let depth = self.max_depth.saturating_sub(remaining).saturating_add(1);
        self.depth_required.fetch_max(depth, Ordering::Relaxed);
    }

    pub(crate) fn meta(&self) -> ResponseMeta {
        ResponseMeta {
            dispatch_count: self.dispatch_count.load(Ordering::Relaxed),
            depth_required: self.depth_required.load(Ordering::Relaxed),
        }
    }
}
