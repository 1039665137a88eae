//! Auth providers that stamp credentials onto outgoing headers.
//!
//! Every provider implements [`AuthProvider::apply`], which runs last in the client's header
//! merge so its headers win over every other layer.

pub mod credentials;
pub mod oidc;
pub mod static_auth;
pub mod token;

pub use credentials::*;
pub use oidc::*;
pub use static_auth::*;
pub use token::*;

// self
use crate::_prelude::*;

/// `Authorization` header name.
pub const AUTHORIZATION: &str = "Authorization";

/// Adds credentials to an outgoing header set.
pub trait AuthProvider: Send + Sync {
	/// Mutates `headers` in place; may block while a token is fetched.
	fn apply(&self, headers: &mut Headers) -> Result<()>;
}
