//! Authentication state trait and macro.

use crate::db::Database;
use crate::jwt::TokenService;

/// Trait for state types that can resolve a bearer token into an identity.
pub trait HasAuthBackend {
    fn tokens(&self) -> &TokenService;
    fn db(&self) -> &Database;
}

/// Implement [`HasAuthBackend`] for a state struct with the standard fields.
///
/// The struct must have these fields:
/// - `tokens: Arc<TokenService>`
/// - `db: Database`
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub tokens: Arc<TokenService>,
/// }
///
/// quillpost::impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn tokens(&self) -> &$crate::jwt::TokenService {
                &self.tokens
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
        }
    };
}
