//! Bearer-token authentication with role-based access control.
//!
//! Access tokens are presented as `Authorization: Bearer`; refresh tokens are
//! only accepted by the refresh endpoint. Nothing is tracked server side, so a
//! token stays usable until it expires.

mod errors;
mod extractors;
mod identity;
mod ip;
pub mod policy;
mod resolver;
mod service;
mod state;

pub use errors::AuthError;
pub use extractors::{AdminOnly, Auth, OptionalAuth};
pub use identity::{AuthenticatedIdentity, ROLE_PREFIX, authority};
pub use ip::client_key;
pub use resolver::{bearer_token, identity_middleware, resolve_identity};
pub use service::{AuthService, LoginOutcome, RefreshOutcome};
pub use state::HasAuthBackend;
