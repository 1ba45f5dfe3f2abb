//! Authentication state trait.

use crate::jwt::TokenService;

/// Trait for router state types that support cookie-JWT authentication.
/// Verification is stateless, so extractors only need the token service and
/// the cookie security policy.
pub trait HasAuthState {
    fn tokens(&self) -> &TokenService;
    fn secure_cookies(&self) -> bool;
}

/// Implement `HasAuthState` for state structs with the standard fields
/// `tokens: Arc<TokenService>` and `secure_cookies: bool`.
#[macro_export]
macro_rules! impl_has_auth_state {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthState for $state_type {
            fn tokens(&self) -> &$crate::jwt::TokenService {
                &self.tokens
            }
            fn secure_cookies(&self) -> bool {
                self.secure_cookies
            }
        }
    };
}
