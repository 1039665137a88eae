//! Transport-agnostic REST client core: typed requests, pluggable HTTP transports, and OIDC
//! bearer tokens that are cached and refreshed safely across any number of caller threads.
//!
//! # Demos
//!
//! Runnable demos live in `demos/` instead of `examples/` and are registered with explicit
//! `[[example]] path` entries in `Cargo.toml`, so they still run as
//! `cargo run --example client_credentials`.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod obs;
pub mod provider;
pub mod request;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{AuthProvider, Credentials, OidcAuth},
		config::ClientConfig,
		handler::{AuthErrorHandler, DefaultErrorHandler, ErrorHandler},
		http::{BlockingTransport, HttpClient},
	};

	/// Renders a minimal token endpoint response body.
	pub fn token_body(token: &str, expires_in: u64) -> String {
		format!(
			"{{\"access_token\":\"{token}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in}}}"
		)
	}

	/// Builds a blocking reqwest-backed client for `base_url` with the provided collaborators.
	pub fn blocking_http_client(
		base_url: &str,
		config: &ClientConfig,
		auth: Option<Arc<dyn AuthProvider>>,
		error_handler: Arc<dyn ErrorHandler>,
	) -> HttpClient {
		let transport = BlockingTransport::new(config)
			.expect("Failed to build blocking transport for tests.");

		HttpClient::new(base_url, config, auth, error_handler, Box::new(transport))
			.expect("Failed to build HTTP client for tests.")
	}

	/// Builds a blocking client for ordinary API calls with the default error handler.
	pub fn api_http_client(base_url: &str, auth: Option<Arc<dyn AuthProvider>>) -> HttpClient {
		blocking_http_client(
			base_url,
			&ClientConfig::default(),
			auth,
			Arc::new(DefaultErrorHandler),
		)
	}

	/// Constructs an [`OidcAuth`] posting to `token_url`, normalized with a trailing `/` like
	/// every other endpoint.
	pub fn build_oidc_auth(token_url: &str, credentials: Credentials) -> OidcAuth {
		let token_client = blocking_http_client(
			token_url,
			&ClientConfig::default(),
			None,
			Arc::new(AuthErrorHandler),
		);

		OidcAuth::new(token_client, credentials)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")] pub use reqwest::Error as ReqwestError;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::{
		error::{Error, Result},
		http::Headers,
	};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
#[cfg(all(test, not(feature = "reqwest")))] use {color_eyre as _, httpmock as _, tokio as _};
