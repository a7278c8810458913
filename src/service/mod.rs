//! Service facade: consistency resolution in front of the dispatcher.
//!
//! Network transports are out of scope; a gRPC or HTTP layer calls
//! [`PermissionsService`] and maps [`ErrorKind`](crate::ErrorKind) through
//! `grpc_code_name()` / `http_status_code()`.

mod builder;
mod consistency;
mod permissions;

pub use builder::{NoDatastore, PermissionsServiceBuilder};
pub use consistency::resolve_revision;
pub use permissions::{
    CheckPermissionRequest, CheckPermissionResponse, ExpandPermissionTreeRequest,
    ExpandPermissionTreeResponse, LookupResourcesRequest, LookupResourcesResponse,
    PermissionsService,
};
