//! Client credentials for the token endpoint.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Client identity plus the knobs that shape token requests and caching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
	client_id: String,
	client_secret: TokenSecret,
	scope: Option<String>,
	expiry_reduction: Duration,
}
impl Credentials {
	/// Safety buffer subtracted from the reported token lifetime unless overridden.
	pub const DEFAULT_EXPIRY_REDUCTION: Duration = Duration::seconds(1);

	/// Creates credentials with no scope and the default expiry reduction.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			scope: None,
			expiry_reduction: Self::DEFAULT_EXPIRY_REDUCTION,
		}
	}

	/// Requests `scope` with client-credentials grants.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Overrides the expiry reduction; negative values are treated as zero.
	pub fn with_expiry_reduction(mut self, margin: Duration) -> Self {
		self.expiry_reduction = margin.max(Duration::ZERO);

		self
	}

	/// Client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Client secret.
	pub fn client_secret(&self) -> &TokenSecret {
		&self.client_secret
	}

	/// Requested scope.
	pub fn scope(&self) -> Option<&str> {
		self.scope.as_deref()
	}

	/// Margin subtracted from every reported lifetime.
	pub fn expiry_reduction(&self) -> Duration {
		self.expiry_reduction
	}
}
