//! Client-level error types shared across requests, transports, and auth providers.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used wherever a transport or serializer hands back its own error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Callers can match on the variant to tell "re-authenticate" (`NotAuthorized`) apart from
/// "permission problem" (`Forbidden`), identity-provider failures (`Auth`), and ordinary
/// API or network failures (`Transport`). Nothing in this crate retries on any of them.
#[derive(Debug, ThisError)]
pub enum Error {
	/// HTTP 401 from an identity-provider or API call.
	#[error("Request is not authorized: {message}.")]
	NotAuthorized {
		/// Response body or a short description.
		message: String,
	},
	/// HTTP 403 from an identity-provider or API call.
	#[error("Request is forbidden: {message}.")]
	Forbidden {
		/// Response body or a short description.
		message: String,
	},
	/// Identity-provider failure other than 401/403.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Ordinary API failure (non-2xx or local I/O).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem or caller misuse.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Generic identity-provider failures.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Token endpoint answered with a non-2xx status other than 401/403.
	#[error("Identity provider rejected the token request with status {status}: {message}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Response body preview.
		message: String,
	},
	/// Local failure (network, I/O) while calling the token endpoint.
	#[error("Token request could not be completed.")]
	TokenRequest {
		/// Underlying failure.
		#[source]
		source: BoxError,
	},
	/// Token endpoint responded with a body that is not a valid token response.
	#[error("Token endpoint returned a malformed response.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token request body could not be encoded.
	#[error("Token request body could not be serialized.")]
	RequestSerialization {
		/// Underlying serializer failure.
		#[source]
		source: BoxError,
	},
	/// Token endpoint returned an `expires_in` that cannot be represented.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}

/// Ordinary API call failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Server answered with a non-2xx status not otherwise classified.
	#[error("Server responded with status {status}: {body}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body preview.
		body: String,
	},
	/// Underlying HTTP stack reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying I/O failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
	/// Successful response body did not match the expected shape.
	#[error("Response body with status {status} could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: u16,
	},
	/// Request body could not be encoded.
	#[error("Request body could not be serialized.")]
	Serialization {
		/// Underlying serializer failure.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Configuration and usage failures raised before anything reaches the wire.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL `{url}` is invalid.")]
	InvalidBaseUrl {
		/// Offending base URL.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Final request URI cannot be parsed.
	#[error("Request URI `{uri}` is invalid.")]
	InvalidUri {
		/// Offending URI string.
		uri: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Path template placeholders and supplied path parameters disagree.
	#[error("Path template `{template}` expects {expected} parameter(s) but {actual} were given.")]
	PathParamCount {
		/// Path template.
		template: String,
		/// Placeholder count.
		expected: usize,
		/// Supplied parameter count.
		actual: usize,
	},
	/// TLS material could not be loaded.
	#[error("TLS material at `{path}` could not be loaded.")]
	TlsMaterial {
		/// File path from the configuration.
		path: String,
		/// Underlying failure.
		#[source]
		source: BoxError,
	},
	/// Registry has neither an explicit nor a discoverable transport provider.
	#[error(
		"No transport provider is available; register one with `ProviderRegistry::set_provider`."
	)]
	NoTransportProvider,
	/// Client was used after `close`.
	#[error("HTTP client has been closed.")]
	ClientClosed,
	/// Blocking call was issued from the event loop that would have to serve it.
	#[error("Blocking HTTP calls must not be made from the transport's own event loop.")]
	BlockingInAsyncContext,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Local failures a transport reports back to the client before any status is known.
///
/// Transports never classify these themselves; the client hands them to its
/// [`ErrorHandler`](crate::handler::ErrorHandler) so identity-provider calls and ordinary API
/// calls can surface different typed errors for the same root cause.
#[derive(Debug, ThisError)]
pub enum LocalFailure {
	/// Connection, DNS, TLS, or timeout failure.
	#[error("Network failure: {0}.")]
	Network(#[source] BoxError),
	/// Raw I/O failure.
	#[error("I/O failure: {0}.")]
	Io(#[from] std::io::Error),
	/// 2xx body did not match the expected response shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: u16,
	},
	/// Transport was entered from its own event-loop thread, where waiting would deadlock.
	#[error("Transport entered from its own event-loop thread.")]
	AsyncContext,
}
impl LocalFailure {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network(Box::new(src))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for LocalFailure {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as _;
	// self
	use super::*;

	#[test]
	fn config_error_message_names_remediation() {
		let err: Error = ConfigError::NoTransportProvider.into();

		assert!(err.to_string().contains("ProviderRegistry::set_provider"));
	}

	#[test]
	fn auth_error_keeps_source_chain() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
		let err: Error = AuthError::TokenRequest { source: Box::new(io) }.into();
		let source = err.source().expect("Transparent auth error should expose its source.");

		assert_eq!(source.to_string(), "refused");
	}
}
