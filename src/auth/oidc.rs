//! OIDC bearer tokens with caching and singleflight refresh.
//!
//! [`OidcAuth`] fetches client-credentials tokens from an identity provider and reuses them
//! until their reduced expiry passes. Readers check the cache under a shared lock; a miss
//! serializes on a refresh guard and re-checks before calling the token endpoint, so a burst of
//! concurrent callers on an expired cache produces one token request, not one per caller. A
//! failed refresh leaves the previous cache entry in place.
//!
//! Password-grant exchanges go through the same token client but never read or write the
//! cache, since each exchange represents a different principal.

mod metrics;
pub use metrics::*;

// self
use crate::{
	_prelude::*,
	auth::{
		AUTHORIZATION, AccessToken, AuthProvider, CachedTokenState, Credentials, TokenResponse,
		TokenSecret, compute_expiry,
	},
	config::ClientConfig,
	handler::AuthErrorHandler,
	http::HttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::HttpClientFactory,
	request::{Operation, Request, ResponseType},
};

const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";
const PASSWORD_GRANT: &str = "password";

/// Token endpoint location relative to the token client's endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenEndpoint {
	template: String,
	params: Vec<String>,
}
impl TokenEndpoint {
	/// Keycloak token path template; the realm fills the placeholder.
	pub const KEYCLOAK_TEMPLATE: &'static str = "realms/%s/protocol/openid-connect/token";

	/// Posts to the token client's endpoint itself.
	pub fn root() -> Self {
		Self::default()
	}

	/// Posts to the Keycloak token path for `realm`; the realm is percent-encoded.
	pub fn keycloak_realm(realm: impl Into<String>) -> Self {
		Self::custom(Self::KEYCLOAK_TEMPLATE, [realm])
	}

	/// Posts to an arbitrary `%s` path template.
	pub fn custom<I, S>(template: impl Into<String>, params: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { template: template.into(), params: params.into_iter().map(Into::into).collect() }
	}
}

#[derive(Serialize)]
struct ClientCredentialsForm<'a> {
	grant_type: &'static str,
	client_id: &'a str,
	client_secret: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	scope: Option<&'a str>,
}

#[derive(Serialize)]
struct PasswordForm<'a> {
	grant_type: &'static str,
	client_id: &'a str,
	client_secret: &'a str,
	username: &'a str,
	password: &'a str,
}

/// Client-credentials bearer auth backed by an OIDC token endpoint.
pub struct OidcAuth {
	token_client: HttpClient,
	credentials: Credentials,
	endpoint: TokenEndpoint,
	state: RwLock<CachedTokenState>,
	refresh_guard: Mutex<()>,
	metrics: Arc<TokenMetrics>,
}
impl OidcAuth {
	/// Wraps a token client that is already bound to the identity provider.
	///
	/// The client should carry [`AuthErrorHandler`] so token failures surface as
	/// [`AuthError`](crate::error::AuthError); [`connect`](Self::connect) sets that up.
	pub fn new(token_client: HttpClient, credentials: Credentials) -> Self {
		Self {
			token_client,
			credentials,
			endpoint: TokenEndpoint::root(),
			state: RwLock::new(CachedTokenState::empty()),
			refresh_guard: Mutex::new(()),
			metrics: Default::default(),
		}
	}

	/// Builds the token client through `factory` with [`AuthErrorHandler`].
	pub fn connect(
		factory: &HttpClientFactory,
		token_url: &str,
		config: &ClientConfig,
		credentials: Credentials,
	) -> Result<Self> {
		let token_client = factory.create(token_url, config, None, Arc::new(AuthErrorHandler))?;

		Ok(Self::new(token_client, credentials))
	}

	/// Targets `endpoint` instead of the token client's root.
	pub fn with_token_endpoint(mut self, endpoint: TokenEndpoint) -> Self {
		self.endpoint = endpoint;

		self
	}

	/// Returns a usable token, fetching a new one when nothing valid is cached.
	pub fn ensure_token(&self) -> Result<TokenSecret> {
		self.ensure_token_with(OffsetDateTime::now_utc)
	}

	/// Exchanges end-user credentials for a token; the result is never cached.
	pub fn exchange_password(&self, username: &str, password: &str) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::PasswordGrant;

		let _span = FlowSpan::new(KIND, "exchange_password").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = self.request_token(&PasswordForm {
			grant_type: PASSWORD_GRANT,
			client_id: self.credentials.client_id(),
			client_secret: self.credentials.client_secret().expose(),
			username,
			password,
		});

		record_outcome(KIND, &result);

		result
	}

	/// Snapshot of the cached token and its expiry.
	pub fn cached_state(&self) -> CachedTokenState {
		self.state.read().clone()
	}

	/// Shared token counters.
	pub fn metrics(&self) -> Arc<TokenMetrics> {
		self.metrics.clone()
	}

	/// Credentials used for every grant.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	/// Closes the token client.
	pub fn close(&self) {
		self.token_client.close();
	}

	pub(crate) fn ensure_token_with<C>(&self, clock: C) -> Result<TokenSecret>
	where
		C: Fn() -> OffsetDateTime,
	{
		const KIND: FlowKind = FlowKind::ClientCredentials;

		if let Some(token) = self.state.read().valid_token_at(clock()).cloned() {
			self.metrics.record_cache_hit();

			return Ok(token);
		}

		let _singleflight = self.refresh_guard.lock();
		// Expiry counts from before the request so latency never extends a token's life.
		let issued_at = clock();

		if let Some(token) = self.state.read().valid_token_at(issued_at).cloned() {
			self.metrics.record_cache_hit();

			return Ok(token);
		}

		let _span = FlowSpan::new(KIND, "ensure_token").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_request();

		let result = self
			.request_token(&ClientCredentialsForm {
				grant_type: CLIENT_CREDENTIALS_GRANT,
				client_id: self.credentials.client_id(),
				client_secret: self.credentials.client_secret().expose(),
				scope: self.credentials.scope(),
			})
			.and_then(|access| {
				let expires_at = compute_expiry(
					issued_at,
					access.expires_in,
					self.credentials.expiry_reduction(),
				)?;

				*self.state.write() = CachedTokenState::issued(access.token.clone(), expires_at);

				Ok(access.token)
			});

		if result.is_err() {
			self.metrics.record_failure();
		}

		record_outcome(KIND, &result);

		result
	}

	fn request_token<F>(&self, form: &F) -> Result<AccessToken>
	where
		F: Serialize,
	{
		let request = Request::builder(Operation::Post, ResponseType::<TokenResponse>::json())
			.path(self.endpoint.template.as_str())
			.path_params(self.endpoint.params.iter().cloned())
			.form(form)
			.build();
		let response = self.token_client.send_request(request)?;

		Ok(AccessToken::try_from(response)?)
	}
}
impl AuthProvider for OidcAuth {
	fn apply(&self, headers: &mut Headers) -> Result<()> {
		let token = self.ensure_token()?;

		headers.insert(AUTHORIZATION.into(), format!("Bearer {}", token.expose()));

		Ok(())
	}
}
impl Debug for OidcAuth {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OidcAuth")
			.field("token_client", &self.token_client)
			.field("client_id", &self.credentials.client_id())
			.field("endpoint", &self.endpoint)
			.field("state", &*self.state.read())
			.finish()
	}
}

fn record_outcome<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_e) => {
			#[cfg(feature = "tracing")]
			tracing::warn!(flow = kind.as_str(), error = %_e, "Token request failed.");

			obs::record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		collections::VecDeque,
		sync::Barrier,
		thread,
		time::Duration as StdDuration,
	};
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::{
		error::{AuthError, LocalFailure},
		http::{Transport, TransportRequest, TransportResponse},
		request::{CONTENT_TYPE, FORM_URL_ENCODED},
	};

	const NOW: OffsetDateTime = datetime!(2025-06-01 12:00:00 UTC);

	#[derive(Default)]
	struct TokenServer {
		script: Mutex<VecDeque<Result<TransportResponse, LocalFailure>>>,
		seen: Arc<Mutex<Vec<TransportRequest>>>,
		delay: Option<StdDuration>,
	}
	impl Transport for TokenServer {
		fn name(&self) -> &'static str {
			"token-server"
		}

		fn dispatch(&self, request: TransportRequest) -> Result<TransportResponse, LocalFailure> {
			if let Some(delay) = self.delay {
				thread::sleep(delay);
			}

			let issued = {
				let mut seen = self.seen.lock();

				seen.push(request);

				seen.len()
			};

			self.script.lock().pop_front().unwrap_or_else(|| Ok(token(&format!("t{issued}"), 300)))
		}

		fn close(&self) {}
	}

	fn token(value: &str, expires_in: u64) -> TransportResponse {
		TransportResponse {
			status: 200,
			body: format!(r#"{{"access_token":"{value}","expires_in":{expires_in}}}"#).into_bytes(),
		}
	}

	fn auth_with(
		server: TokenServer,
		credentials: Credentials,
	) -> (OidcAuth, Arc<Mutex<Vec<TransportRequest>>>) {
		let seen = server.seen.clone();
		let client = HttpClient::new(
			"https://idp.example.com/auth",
			&ClientConfig::default(),
			None,
			Arc::new(AuthErrorHandler),
			Box::new(server),
		)
		.expect("Token client should build.");

		(OidcAuth::new(client, credentials), seen)
	}

	fn credentials() -> Credentials {
		Credentials::new("registry-api", "s3cr3t")
	}

	fn body(request: &TransportRequest) -> String {
		String::from_utf8(request.body.clone().unwrap_or_default()).expect("Form body should be UTF-8.")
	}

	#[test]
	fn token_is_reused_until_expiry_then_refreshed_once() {
		let (auth, seen) = auth_with(TokenServer::default(), credentials());
		let first = auth.ensure_token_with(|| NOW).expect("First fetch should succeed.");
		let again = auth.ensure_token_with(|| NOW + Duration::seconds(298)).expect("Reuse should succeed.");

		assert_eq!(first.expose(), "t1");
		assert_eq!(again.expose(), "t1");
		assert_eq!(seen.lock().len(), 1);

		// 300s lifetime minus the 1s default reduction.
		let expires_at = NOW + Duration::seconds(299);

		assert_eq!(auth.cached_state().expires_at(), Some(expires_at));
		assert_eq!(
			auth.ensure_token_with(|| expires_at - Duration::nanoseconds(1))
				.expect("Token should still be valid.")
				.expose(),
			"t1"
		);

		let refreshed = auth.ensure_token_with(|| expires_at).expect("Refresh should succeed.");

		assert_eq!(refreshed.expose(), "t2");
		assert_eq!(seen.lock().len(), 2);

		let metrics = auth.metrics();

		assert_eq!(metrics.requests(), 2);
		assert_eq!(metrics.cache_hits(), 2);
		assert_eq!(metrics.failures(), 0);
	}

	#[test]
	fn client_credentials_form_is_url_encoded() {
		let (auth, seen) =
			auth_with(TokenServer::default(), credentials().with_scope("registry:read write"));

		auth.ensure_token_with(|| NOW).expect("Fetch should succeed.");

		let seen = seen.lock();

		assert_eq!(seen[0].method, Operation::Post);
		assert_eq!(seen[0].url.as_str(), "https://idp.example.com/auth/");
		assert_eq!(seen[0].headers.get(CONTENT_TYPE).map(String::as_str), Some(FORM_URL_ENCODED));
		assert_eq!(
			body(&seen[0]),
			"grant_type=client_credentials&client_id=registry-api&client_secret=s3cr3t&scope=registry%3Aread+write"
		);
	}

	#[test]
	fn keycloak_realm_path_is_encoded() {
		let (auth, seen) = auth_with(TokenServer::default(), credentials());
		let auth = auth.with_token_endpoint(TokenEndpoint::keycloak_realm("my realm"));

		auth.ensure_token_with(|| NOW).expect("Fetch should succeed.");

		assert_eq!(
			seen.lock()[0].url.path(),
			"/auth/realms/my%20realm/protocol/openid-connect/token"
		);
	}

	#[test]
	fn margin_at_or_above_lifetime_expires_immediately() {
		let (auth, seen) =
			auth_with(TokenServer::default(), credentials().with_expiry_reduction(Duration::seconds(300)));

		assert_eq!(auth.ensure_token_with(|| NOW).expect("First fetch should succeed.").expose(), "t1");
		assert_eq!(auth.ensure_token_with(|| NOW).expect("Second fetch should succeed.").expose(), "t2");
		assert_eq!(seen.lock().len(), 2);
	}

	#[test]
	fn zero_lifetime_token_is_still_returned() {
		let server = TokenServer::default();

		server.script.lock().push_back(Ok(token("instant", 0)));

		let (auth, _) = auth_with(server, credentials().with_expiry_reduction(Duration::ZERO));

		assert_eq!(auth.ensure_token_with(|| NOW).expect("Fetch should succeed.").expose(), "instant");
		assert!(auth.cached_state().is_expired_at(NOW));
	}

	#[test]
	fn failed_refresh_keeps_previous_state() {
		let server = TokenServer::default();

		server.script.lock().extend([
			Ok(token("kept", 10)),
			Ok(TransportResponse { status: 503, body: b"maintenance".to_vec() }),
		]);

		let (auth, _) = auth_with(server, credentials());

		auth.ensure_token_with(|| NOW).expect("First fetch should succeed.");

		let before = auth.cached_state();
		let err = auth
			.ensure_token_with(|| NOW + Duration::seconds(60))
			.expect_err("Expired cache with failing endpoint should error.");

		assert!(matches!(err, Error::Auth(AuthError::Rejected { status: 503, .. })));
		assert_eq!(auth.cached_state(), before);
		assert_eq!(auth.metrics().failures(), 1);
	}

	#[test]
	fn malformed_token_response_is_an_auth_error() {
		let server = TokenServer::default();

		server
			.script
			.lock()
			.push_back(Ok(TransportResponse { status: 200, body: br#"{"token":"x"}"#.to_vec() }));

		let (auth, _) = auth_with(server, credentials());

		assert!(matches!(
			auth.ensure_token_with(|| NOW),
			Err(Error::Auth(AuthError::TokenResponseParse { .. }))
		));
		assert!(auth.cached_state().token().is_none());
	}

	#[test]
	fn password_grant_bypasses_the_cache() {
		let (auth, seen) = auth_with(TokenServer::default(), credentials().with_scope("ignored"));
		let first = auth.exchange_password("alice", "p@ss word").expect("First exchange should succeed.");
		let second =
			auth.exchange_password("alice", "p@ss word").expect("Second exchange should succeed.");

		assert_eq!(first.token.expose(), "t1");
		assert_eq!(second.token.expose(), "t2");
		assert_eq!(first.expires_in, Duration::seconds(300));
		assert!(auth.cached_state().token().is_none());
		assert_eq!(auth.metrics().requests(), 0);

		let seen = seen.lock();

		assert_eq!(seen.len(), 2);
		assert_eq!(
			body(&seen[0]),
			"grant_type=password&client_id=registry-api&client_secret=s3cr3t&username=alice&password=p%40ss+word"
		);
	}

	#[test]
	fn concurrent_callers_share_one_refresh() {
		const THREADS: usize = 8;

		let server = TokenServer { delay: Some(StdDuration::from_millis(50)), ..Default::default() };
		let (auth, seen) = auth_with(server, credentials());
		let auth = Arc::new(auth);
		let barrier = Arc::new(Barrier::new(THREADS));
		let handles = (0..THREADS)
			.map(|_| {
				let auth = auth.clone();
				let barrier = barrier.clone();

				thread::spawn(move || {
					barrier.wait();

					auth.ensure_token().expect("Concurrent fetch should succeed.")
				})
			})
			.collect::<Vec<_>>();

		for handle in handles {
			assert_eq!(handle.join().expect("Caller thread should not panic.").expose(), "t1");
		}

		assert_eq!(seen.lock().len(), 1);
	}

	#[test]
	fn apply_stamps_bearer_header() {
		let (auth, _) = auth_with(TokenServer::default(), credentials());
		let mut headers = Headers::from([(AUTHORIZATION.into(), "Basic old".into())]);

		auth.apply(&mut headers).expect("Apply should succeed.");

		assert_eq!(headers.get(AUTHORIZATION).map(String::as_str), Some("Bearer t1"));
		assert!(!format!("{auth:?}").contains("t1"));
	}
}
