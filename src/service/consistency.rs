//! Resolving a consistency requirement to a concrete revision.

use crate::datastore::Datastore;
use crate::types::{ConsistencyRequirement, Revision};
use crate::Error;

/// Picks the revision a request is evaluated at and checks it is readable.
///
/// | requirement | revision |
/// |---|---|
/// | `Full` | head |
/// | `Eventual` | optimized |
/// | `AtExactSnapshot(t)` | `t` |
/// | `AtLeastAsFresh(t)` | `max(t, optimized)` |
///
/// The `max` keeps revision fuzzing from ever serving a snapshot older than
/// the caller has already observed.
pub async fn resolve_revision(
    datastore: &dyn Datastore,
    requirement: &ConsistencyRequirement,
) -> Result<Revision, Error> {
    let revision = match requirement {
        ConsistencyRequirement::Full => datastore.head_revision().await?,
        ConsistencyRequirement::Eventual => datastore.optimized_revision().await?,
        ConsistencyRequirement::AtExactSnapshot(token) => token.revision()?,
        ConsistencyRequirement::AtLeastAsFresh(token) => {
            let requested = token.revision()?;
            let optimized = datastore.optimized_revision().await?;
            requested.max(optimized)
        }
    };
    datastore.check_revision(revision).await?;
    Ok(revision)
}
