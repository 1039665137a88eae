//! Token endpoint responses and the cache entry derived from them.

// self
use crate::{_prelude::*, auth::TokenSecret, error::AuthError};

/// Token issued by the identity provider; never mutated after it is produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
	/// Bearer token value.
	pub token: TokenSecret,
	/// Lifetime reported by the identity provider.
	pub expires_in: Duration,
}

/// Token endpoint JSON body; unknown fields are ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
	/// Issued token.
	pub access_token: TokenSecret,
	/// Lifetime in seconds.
	pub expires_in: u64,
	/// Token type, usually `Bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
}
impl TryFrom<TokenResponse> for AccessToken {
	type Error = AuthError;

	fn try_from(response: TokenResponse) -> Result<Self, Self::Error> {
		let seconds =
			i64::try_from(response.expires_in).map_err(|_| AuthError::ExpiresInOutOfRange)?;

		Ok(Self { token: response.access_token, expires_in: Duration::seconds(seconds) })
	}
}

/// Cached token together with its absolute expiry.
///
/// The pair is always replaced as one value so no reader can see a new token with an old
/// expiry or the reverse.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CachedTokenState {
	entry: Option<(TokenSecret, OffsetDateTime)>,
}
impl CachedTokenState {
	/// State before the first successful fetch.
	pub fn empty() -> Self {
		Self::default()
	}

	/// State holding `token` until `expires_at`.
	pub fn issued(token: TokenSecret, expires_at: OffsetDateTime) -> Self {
		Self { entry: Some((token, expires_at)) }
	}

	/// Cached token, if one was ever fetched.
	pub fn token(&self) -> Option<&TokenSecret> {
		self.entry.as_ref().map(|(token, _)| token)
	}

	/// Absolute expiry of the cached token.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.entry.as_ref().map(|(_, at)| *at)
	}

	/// Returns `true` when nothing is cached or `instant` is at or past the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		match self.entry {
			Some((_, expires_at)) => instant >= expires_at,
			None => true,
		}
	}

	/// Returns the cached token when it is still usable at `instant`.
	pub fn valid_token_at(&self, instant: OffsetDateTime) -> Option<&TokenSecret> {
		if self.is_expired_at(instant) { None } else { self.token() }
	}
}
impl Debug for CachedTokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedTokenState")
			.field("token", &self.token())
			.field("expires_at", &self.expires_at())
			.finish()
	}
}

/// Computes `now + max(lifetime - margin, 0)`.
///
/// A margin at or above the lifetime yields `now`, i.e. a token that is already expired.
pub fn compute_expiry(
	now: OffsetDateTime,
	lifetime: Duration,
	margin: Duration,
) -> Result<OffsetDateTime, AuthError> {
	let validity = lifetime.saturating_sub(margin).max(Duration::ZERO);

	now.checked_add(validity).ok_or(AuthError::ExpiresInOutOfRange)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	const NOW: OffsetDateTime = datetime!(2025-01-01 00:00:00 UTC);

	#[test]
	fn expiry_subtracts_margin_and_clamps_at_zero() {
		let lifetime = Duration::seconds(300);

		for margin in [0, 1, 60, 299] {
			assert_eq!(
				compute_expiry(NOW, lifetime, Duration::seconds(margin))
					.expect("Expiry should be representable."),
				NOW + Duration::seconds(300 - margin)
			);
		}
		for margin in [300, 301, 10_000] {
			assert_eq!(
				compute_expiry(NOW, lifetime, Duration::seconds(margin))
					.expect("Expiry should be representable."),
				NOW
			);
		}
	}

	#[test]
	fn expiry_is_monotonic_in_lifetime() {
		let margin = Duration::seconds(5);
		let mut previous = NOW;

		for lifetime in [0, 5, 6, 60, 3_600] {
			let expiry = compute_expiry(NOW, Duration::seconds(lifetime), margin)
				.expect("Expiry should be representable.");

			assert!(expiry >= previous);

			previous = expiry;
		}
	}

	#[test]
	fn unrepresentable_expiry_is_rejected() {
		assert!(matches!(
			compute_expiry(NOW, Duration::MAX, Duration::ZERO),
			Err(AuthError::ExpiresInOutOfRange)
		));
		assert!(matches!(
			AccessToken::try_from(TokenResponse {
				access_token: TokenSecret::new("t"),
				expires_in: u64::MAX,
				token_type: None,
			}),
			Err(AuthError::ExpiresInOutOfRange)
		));
	}

	#[test]
	fn expiry_boundary_is_inclusive_at_full_precision() {
		let expires_at = NOW + Duration::seconds(10);
		let state = CachedTokenState::issued(TokenSecret::new("t"), expires_at);

		assert!(!state.is_expired_at(expires_at - Duration::nanoseconds(1)));
		assert!(state.is_expired_at(expires_at));
		assert!(state.is_expired_at(expires_at + Duration::nanoseconds(1)));
		assert_eq!(
			state.valid_token_at(expires_at - Duration::nanoseconds(1)).map(TokenSecret::expose),
			Some("t")
		);
		assert!(state.valid_token_at(expires_at).is_none());
	}

	#[test]
	fn empty_state_is_always_expired() {
		let state = CachedTokenState::empty();

		assert!(state.is_expired_at(OffsetDateTime::UNIX_EPOCH));
		assert!(state.token().is_none());
	}

	#[test]
	fn token_response_ignores_unknown_fields() {
		let response: TokenResponse = serde_json::from_str(
			r#"{"access_token":"abc","expires_in":300,"refresh_expires_in":0,"scope":"email"}"#,
		)
		.expect("Token response should decode.");
		let token = AccessToken::try_from(response).expect("Lifetime should convert.");

		assert_eq!(token.token.expose(), "abc");
		assert_eq!(token.expires_in, Duration::seconds(300));
	}
}
