//! ConsistencyToken and consistency requirements.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::types::Revision;
use crate::Error;

const TOKEN_VERSION: u8 = 1;

/// Payload carried inside a token. Kept small and versioned so the encoding
/// can evolve without breaking tokens already handed to callers.
#[derive(Serialize, Deserialize)]
struct TokenPayload {
    #[serde(rename = "v")]
    version: u8,
    #[serde(rename = "r")]
    revision: String,
}

/// An opaque token representing a point-in-time snapshot of the graph.
///
/// Every query response carries the token of the revision it was evaluated
/// at. Passing it back as [`ConsistencyRequirement::AtLeastAsFresh`] gives
/// read-after-write consistency; [`ConsistencyRequirement::AtExactSnapshot`]
/// replays a query against exactly that snapshot.
///
/// Tokens round-trip exactly and are compared and ordered by the revision
/// they carry. Tokens that do not decode compare by their raw value.
///
/// ```rust
/// use inferadb_graph::{ConsistencyToken, Revision};
///
/// let token = ConsistencyToken::from_revision(Revision::new(42));
/// assert_eq!(token.revision().unwrap(), Revision::new(42));
///
/// let later = ConsistencyToken::from_revision(Revision::new(43));
/// assert!(token < later);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyToken {
    /// The opaque token value.
    #[serde(rename = "token")]
    value: String,
}

impl ConsistencyToken {
    /// Creates a token from a raw value as received from a caller.
    ///
    /// The value is not validated until [`revision()`](Self::revision) is called.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Encodes a revision into a token.
    pub fn from_revision(revision: Revision) -> Self {
        let payload = TokenPayload {
            version: TOKEN_VERSION,
            revision: revision.to_string(),
        };
        // Serializing two plain fields cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        Self::new(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes the revision carried by this token.
    ///
    /// Fails with `InvalidArgument` when the token is empty, not produced by
    /// [`from_revision`](Self::from_revision), or of an unknown version.
    pub fn revision(&self) -> Result<Revision, Error> {
        if self.value.is_empty() {
            return Err(Error::invalid_argument("consistency token cannot be empty"));
        }
        let bytes = URL_SAFE_NO_PAD.decode(self.value.as_bytes())?;
        let payload: TokenPayload = serde_json::from_slice(&bytes)?;
        if payload.version != TOKEN_VERSION {
            return Err(Error::invalid_argument(format!(
                "unsupported consistency token version {}",
                payload.version
            )));
        }
        payload.revision.parse()
    }

    /// Returns the raw token value.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Consumes the token and returns the inner value.
    #[inline]
    pub fn into_value(self) -> String {
        self.value
    }

    /// Returns `true` if the token value is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl PartialEq for ConsistencyToken {
    fn eq(&self, other: &Self) -> bool {
        match (self.revision(), other.revision()) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.value == other.value,
        }
    }
}

impl Eq for ConsistencyToken {}

impl Hash for ConsistencyToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.revision() {
            Ok(revision) => revision.hash(state),
            Err(_) => self.value.hash(state),
        }
    }
}

impl PartialOrd for ConsistencyToken {
    /// Tokens compare by revision; an undecodable token is only comparable
    /// to an identical one.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.revision(), other.revision()) {
            (Ok(a), Ok(b)) => Some(a.cmp(&b)),
            _ => (self.value == other.value).then_some(Ordering::Equal),
        }
    }
}

impl fmt::Display for ConsistencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for ConsistencyToken {
    type Err = Error;

    /// Parses and validates a token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = ConsistencyToken::new(s);
        token.revision()?;
        Ok(token)
    }
}

impl From<Revision> for ConsistencyToken {
    fn from(revision: Revision) -> Self {
        ConsistencyToken::from_revision(revision)
    }
}

impl AsRef<str> for ConsistencyToken {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// The freshness a read requires.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConsistencyRequirement {
    /// Minimize latency: evaluate at the datastore's optimized revision,
    /// which may lag the head by up to the configured fuzzing window.
    #[default]
    Eventual,

    /// Evaluate at a revision no older than the token's.
    AtLeastAsFresh(ConsistencyToken),

    /// Evaluate at exactly the token's revision.
    AtExactSnapshot(ConsistencyToken),

    /// Evaluate at the current head revision.
    Full,
}

impl ConsistencyRequirement {
    /// Returns the token, if this requirement carries one.
    pub fn token(&self) -> Option<&ConsistencyToken> {
        match self {
            ConsistencyRequirement::AtLeastAsFresh(token)
            | ConsistencyRequirement::AtExactSnapshot(token) => Some(token),
            _ => None,
        }
    }

    /// Returns `true` if this is `Eventual` consistency.
    pub fn is_eventual(&self) -> bool {
        matches!(self, ConsistencyRequirement::Eventual)
    }

    /// Returns `true` if this requires full consistency.
    pub fn is_full(&self) -> bool {
        matches!(self, ConsistencyRequirement::Full)
    }
}

impl From<ConsistencyToken> for ConsistencyRequirement {
    fn from(token: ConsistencyToken) -> Self {
        ConsistencyRequirement::AtLeastAsFresh(token)
    }
}
