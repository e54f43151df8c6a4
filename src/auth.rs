//! Auth-domain models: scopes, secrets, PKCE auth state, token sets, and ID-token claims.

pub mod claims;
pub mod scope;
pub mod secret;
pub mod state;
pub mod token;

pub use claims::*;
pub use scope::*;
pub use secret::*;
pub use state::*;
pub use token::*;
