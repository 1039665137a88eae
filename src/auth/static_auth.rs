//! Providers whose credentials never change.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	auth::{AUTHORIZATION, AuthProvider, TokenSecret},
};

/// Leaves headers untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAuth;
impl AuthProvider for NoAuth {
	fn apply(&self, _: &mut Headers) -> Result<()> {
		Ok(())
	}
}

/// Sends a fixed bearer token.
#[derive(Clone, Debug)]
pub struct BearerAuth {
	token: TokenSecret,
}
impl BearerAuth {
	/// Wraps a pre-issued access token.
	pub fn new(token: impl Into<String>) -> Self {
		Self { token: TokenSecret::new(token) }
	}
}
impl AuthProvider for BearerAuth {
	fn apply(&self, headers: &mut Headers) -> Result<()> {
		headers.insert(AUTHORIZATION.into(), format!("Bearer {}", self.token.expose()));

		Ok(())
	}
}

/// Sends HTTP Basic credentials.
#[derive(Clone, Debug)]
pub struct BasicAuth {
	username: String,
	password: TokenSecret,
}
impl BasicAuth {
	/// Creates a provider for `username`/`password`.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: TokenSecret::new(password) }
	}
}
impl AuthProvider for BasicAuth {
	fn apply(&self, headers: &mut Headers) -> Result<()> {
		let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password.expose()));

		headers.insert(AUTHORIZATION.into(), format!("Basic {encoded}"));

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn stamped(auth: &dyn AuthProvider) -> Option<String> {
		let mut headers = Headers::from([(AUTHORIZATION.into(), "stale".into())]);

		auth.apply(&mut headers).expect("Static providers should never fail.");

		headers.remove(AUTHORIZATION)
	}

	#[test]
	fn static_providers_stamp_authorization() {
		assert_eq!(stamped(&NoAuth).as_deref(), Some("stale"));
		assert_eq!(stamped(&BearerAuth::new("abc")).as_deref(), Some("Bearer abc"));
		assert_eq!(
			stamped(&BasicAuth::new("Aladdin", "open sesame")).as_deref(),
			Some("Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==")
		);
	}

	#[test]
	fn debug_output_hides_secrets() {
		let rendered = format!("{:?}", BasicAuth::new("user", "hunter2"));

		assert!(!rendered.contains("hunter2"));
		assert!(rendered.contains("user"));
	}
}
