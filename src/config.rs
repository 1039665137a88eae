//! Transport-level client configuration.
//!
//! [`ClientConfig`] is the value handed to
//! [`TransportProvider::create`](crate::provider::TransportProvider::create). It can be built in
//! code, deserialized with serde, or read from flat `key = value` properties using the
//! `rest.client.*` prefix convention (see [`ClientConfig::from_properties`]).

// std
use std::path::PathBuf;
// self
use crate::_prelude::*;

/// Prefix for headers attached to every request, e.g. `rest.client.request.headers.X-Tenant`.
pub const REQUEST_HEADERS_PREFIX: &str = "rest.client.request.headers.";
/// Base path appended to the endpoint unless disabled.
pub const AUTO_BASE_PATH: &str = "rest.client.auto-base-path";
/// Boolean flag disabling the automatic base-path append.
pub const DISABLE_AUTO_BASE_PATH_APPEND: &str = "rest.client.disable-auto-basepath-append";
/// PEM CA bundle used to verify servers.
pub const CA_BUNDLE_LOCATION: &str = "rest.client.request.ssl.ca-bundle.location";
/// Per-request timeout in milliseconds, enforced by the transport.
pub const REQUEST_TIMEOUT_MS: &str = "rest.client.request.timeout-ms";

/// Options a transport provider receives at client construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Headers attached to every request before any other header layer.
	pub default_headers: Headers,
	/// Path appended to the base URL (e.g. `apis/registry/v2/`).
	pub auto_base_path: Option<String>,
	/// Skips [`auto_base_path`](Self::auto_base_path) when true.
	pub disable_auto_base_path_append: bool,
	/// TLS trust material.
	pub tls: TlsConfig,
	/// Timeout enforced by the transport; `None` keeps the transport default.
	#[serde(with = "duration_ms")]
	pub request_timeout: Option<std::time::Duration>,
}
impl ClientConfig {
	/// Reads configuration from flat properties.
	///
	/// Unknown keys are ignored. Boolean values are parsed case-insensitively and anything
	/// other than `true` counts as `false`; an unparsable timeout is ignored.
	pub fn from_properties<I, K, V>(properties: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: Into<String>,
	{
		let mut config = Self::default();

		for (key, value) in properties {
			let key = key.as_ref();
			let value = value.into();

			if let Some(header) = key.strip_prefix(REQUEST_HEADERS_PREFIX) {
				if !header.is_empty() {
					config.default_headers.insert(header.to_owned(), value);
				}

				continue;
			}

			match key {
				AUTO_BASE_PATH => config.auto_base_path = Some(value),
				DISABLE_AUTO_BASE_PATH_APPEND =>
					config.disable_auto_base_path_append = value.trim().eq_ignore_ascii_case("true"),
				CA_BUNDLE_LOCATION => config.tls.ca_bundle = Some(PathBuf::from(value)),
				REQUEST_TIMEOUT_MS =>
					if let Ok(ms) = value.trim().parse::<u64>() {
						config.request_timeout = Some(std::time::Duration::from_millis(ms));
					},
				_ => {},
			}
		}

		config
	}

	/// Adds a default header.
	pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.default_headers.insert(name.into(), value.into());

		self
	}

	/// Sets the base path appended to every endpoint.
	pub fn with_auto_base_path(mut self, path: impl Into<String>) -> Self {
		self.auto_base_path = Some(path.into());

		self
	}

	/// Normalizes `base_url` into the endpoint every request path is joined onto.
	///
	/// The result always ends with `/`. The auto base path is appended unless disabled or
	/// already present at the end of the URL.
	pub fn resolve_endpoint(&self, base_url: &str) -> String {
		let mut endpoint = ensure_trailing_slash(base_url.to_owned());

		if self.disable_auto_base_path_append {
			return endpoint;
		}
		if let Some(base_path) = self.auto_base_path.as_deref() {
			let base_path = ensure_trailing_slash(base_path.trim_start_matches('/').to_owned());

			if base_path != "/" && !endpoint.ends_with(&base_path) {
				endpoint.push_str(&base_path);
			}
		}

		endpoint
	}
}

/// TLS trust configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
	/// PEM bundle of additional trusted CA certificates.
	pub ca_bundle: Option<PathBuf>,
}

fn ensure_trailing_slash(mut value: String) -> String {
	if !value.ends_with('/') {
		value.push('/');
	}

	value
}

mod duration_ms {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &Option<std::time::Duration>, s: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			// Saturates instead of wrapping for durations beyond `u64::MAX` milliseconds.
			Some(duration) =>
				s.serialize_some(&u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
			None => s.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(d: D) -> Result<Option<std::time::Duration>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Option::<u64>::deserialize(d)?.map(std::time::Duration::from_millis))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn properties_follow_prefix_convention() {
		let config = ClientConfig::from_properties([
			("rest.client.request.headers.X-Tenant", "acme"),
			("rest.client.request.headers.", "ignored"),
			("rest.client.auto-base-path", "apis/registry/v2/"),
			("rest.client.disable-auto-basepath-append", "TRUE"),
			("rest.client.request.timeout-ms", "1500"),
			("unrelated.key", "value"),
		]);

		assert_eq!(config.default_headers.len(), 1);
		assert_eq!(config.default_headers.get("X-Tenant").map(String::as_str), Some("acme"));
		assert_eq!(config.auto_base_path.as_deref(), Some("apis/registry/v2/"));
		assert!(config.disable_auto_base_path_append);
		assert_eq!(config.request_timeout, Some(std::time::Duration::from_millis(1500)));
	}

	#[test]
	fn invalid_boolean_counts_as_false() {
		let config =
			ClientConfig::from_properties([("rest.client.disable-auto-basepath-append", "yes")]);

		assert!(!config.disable_auto_base_path_append);
	}

	#[test]
	fn endpoint_appends_base_path_once() {
		let config = ClientConfig::default().with_auto_base_path("apis/registry/v2");

		assert_eq!(
			config.resolve_endpoint("http://localhost:8080"),
			"http://localhost:8080/apis/registry/v2/"
		);
		assert_eq!(
			config.resolve_endpoint("http://localhost:8080/apis/registry/v2/"),
			"http://localhost:8080/apis/registry/v2/"
		);

		let disabled = ClientConfig { disable_auto_base_path_append: true, ..config };

		assert_eq!(disabled.resolve_endpoint("http://localhost:8080"), "http://localhost:8080/");
	}

	#[test]
	fn serde_defaults_fill_missing_fields() {
		let config: ClientConfig =
			serde_json::from_str(r#"{"default_headers":{"A":"1"},"request_timeout":250}"#)
				.expect("Partial configuration should deserialize.");

		assert_eq!(config.default_headers.get("A").map(String::as_str), Some("1"));
		assert_eq!(config.request_timeout, Some(std::time::Duration::from_millis(250)));
		assert!(config.tls.ca_bundle.is_none());
	}

	#[test]
	fn oversized_timeout_saturates_when_serialized() {
		let config = ClientConfig {
			request_timeout: Some(std::time::Duration::MAX),
			..Default::default()
		};
		let json = serde_json::to_value(&config).expect("Configuration should serialize.");

		assert_eq!(json["request_timeout"], serde_json::json!(u64::MAX));
	}
}
