//! Revision: the logical timestamp every read is pinned to.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A totally ordered logical timestamp identifying a datastore snapshot.
///
/// Every datastore mutation is stamped with a revision strictly greater than
/// the previous one. A read "as of" revision `R` observes exactly the tuples
/// created at or before `R` and not deleted at or before `R`.
///
/// Revisions are non-negative decimals, so a datastore may stamp writes with
/// fractional values (`1700000000.5`) as well as plain integers. They travel
/// as decimal strings inside [`ConsistencyToken`](crate::ConsistencyToken)s
/// and compare by value: `"1.50"` and `"1.5"` are the same revision.
///
/// ```rust
/// use inferadb_graph::Revision;
///
/// let r: Revision = "1700000000000000001".parse().unwrap();
/// assert!(r > Revision::new(1700000000000000000));
/// assert_eq!(r.to_string(), "1700000000000000001");
///
/// let half: Revision = "1700000000.50".parse().unwrap();
/// assert_eq!(half.to_string(), "1700000000.5");
/// assert!(half > Revision::new(1700000000) && half < Revision::new(1700000001));
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Revision(Decimal);

impl Revision {
    /// The revision before any write.
    pub const ZERO: Revision = Revision(Decimal::ZERO);

    /// Creates a revision from an integer value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Returns the decimal value.
    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns the revision one whole unit later.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0.checked_add(Decimal::ONE).unwrap_or(Decimal::MAX))
    }

    /// Returns this revision moved back by `delta`, stopping at zero.
    pub fn saturating_sub(&self, delta: u64) -> Self {
        match self.0.checked_sub(Decimal::from(delta)) {
            Some(value) if value > Decimal::ZERO => Self(value.normalize()),
            _ => Self::ZERO,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Revision {
    type Err = Error;

    /// Parses a non-negative decimal. Values that cannot be represented
    /// exactly are rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return Err(Error::invalid_argument(format!("invalid revision `{}`", s)));
        }
        let value = Decimal::from_str_exact(s).map_err(|e| {
            Error::invalid_argument(format!("invalid revision `{}`", s)).with_source(e)
        })?;
        Ok(Revision(value.normalize()))
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Revision::new(value)
    }
}

impl TryFrom<Decimal> for Revision {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::invalid_argument(format!(
                "revision cannot be negative: {}",
                value
            )));
        }
        Ok(Revision(value.normalize()))
    }
}
