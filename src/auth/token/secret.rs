//! Redacting wrapper for bearer tokens and client secrets.
//!
//! Everything the token manager caches or sends to the identity provider passes through
//! [`TokenSecret`], so `Debug` output of [`OidcAuth`](crate::auth::OidcAuth), its cached state
//! and its credentials can be logged safely.

// self
use crate::_prelude::*;

/// Secret string whose `Debug` and `Display` output never reveal the value.
///
/// Deserializes from a plain JSON string, which is how `access_token` arrives in token
/// endpoint responses.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw value, e.g. for the `Authorization: Bearer` header or a token form.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
