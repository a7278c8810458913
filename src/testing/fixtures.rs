//! The standard document/folder/user world.

use crate::datastore::{Datastore, TupleUpdate};
use crate::types::{NamespaceDefinition, Relation, RelationTuple, Revision, Rewrite};
use crate::Error;

/// Relationships of the standard world, in text form.
pub const STANDARD_TUPLES: &[&str] = &[
    "document:companyplan#parent@folder:company",
    "document:masterplan#parent@folder:strategy",
    "folder:strategy#parent@folder:company",
    "folder:company#owner@user:owner",
    "folder:company#viewer@user:legal",
    "folder:strategy#owner@user:vp_product",
    "document:masterplan#owner@user:product_manager",
    "document:masterplan#viewer@user:eng_lead",
    "document:masterplan#parent@folder:plans",
    "folder:plans#viewer@user:chief_financial_officer",
    "folder:auditors#viewer@user:auditor",
    "folder:company#viewer@folder:auditors#viewer",
    "document:healthplan#parent@folder:plans",
    "folder:isolated#viewer@user:villain",
    "document:specialplan#viewer_and_editor@user:multiroleguy",
    "document:specialplan#editor@user:multiroleguy",
    "document:specialplan#viewer_and_editor@user:missingrolegal",
];

/// Namespaces of the standard world:
///
/// ```text
/// user
///
/// folder
///   owner, parent
///   editor = this + owner
///   viewer = this + editor + parent->viewer
///
/// document
///   owner, parent, lock
///   editor = this + owner
///   viewer = this + editor + parent->viewer
///   viewer_and_editor = this & editor
///   viewer_and_editor_derived = viewer_and_editor & viewer
/// ```
pub fn standard_namespaces() -> Vec<NamespaceDefinition> {
    let editor = || {
        Relation::new(
            "editor",
            Rewrite::Union(vec![Rewrite::This, Rewrite::computed("owner")]),
        )
    };
    let viewer = || {
        Relation::new(
            "viewer",
            Rewrite::Union(vec![
                Rewrite::This,
                Rewrite::computed("editor"),
                Rewrite::tuple_to_userset("parent", "viewer"),
            ]),
        )
    };

    vec![
        NamespaceDefinition::new("user"),
        NamespaceDefinition::new("folder")
            .with_relation(Relation::direct("owner"))
            .with_relation(Relation::direct("parent"))
            .with_relation(editor())
            .with_relation(viewer()),
        NamespaceDefinition::new("document")
            .with_relation(Relation::direct("owner"))
            .with_relation(editor())
            .with_relation(Relation::direct("parent"))
            .with_relation(Relation::direct("lock"))
            .with_relation(viewer())
            .with_relation(Relation::new(
                "viewer_and_editor",
                Rewrite::Intersection(vec![Rewrite::This, Rewrite::computed("editor")]),
            ))
            .with_relation(Relation::new(
                "viewer_and_editor_derived",
                Rewrite::Intersection(vec![
                    Rewrite::computed("viewer_and_editor"),
                    Rewrite::computed("viewer"),
                ]),
            )),
    ]
}

/// Tuples of the standard world.
pub fn standard_tuples() -> Result<Vec<RelationTuple>, Error> {
    STANDARD_TUPLES.iter().map(|s| s.parse()).collect()
}

/// Writes the standard world into `datastore` and returns the revision at
/// which all of it is visible.
pub async fn load_standard_fixture(datastore: &dyn Datastore) -> Result<Revision, Error> {
    for namespace in standard_namespaces() {
        datastore.write_namespace(namespace).await?;
    }
    let updates = standard_tuples()?.into_iter().map(TupleUpdate::touch).collect();
    let revision = datastore.write_tuples(updates).await?;
    tracing::debug!(
        revision = %revision,
        tuples = STANDARD_TUPLES.len(),
        "standard fixture loaded"
    );
    Ok(revision)
}
