//! Pluggable error classification for non-2xx responses and local failures.
//!
//! Every [`HttpClient`](crate::http::HttpClient) owns one [`ErrorHandler`]. The handler never
//! sees successful responses; it is consulted when the server answers with a non-2xx status,
//! when the transport fails locally, and when the request body could not be serialized.
//! Different protocols plug in different handlers: [`DefaultErrorHandler`] for ordinary API
//! calls, [`AuthErrorHandler`] for identity-provider calls.

// self
use crate::{
	_prelude::*,
	error::{AuthError, BoxError, LocalFailure, TransportError},
};

const UNAUTHORIZED: u16 = 401;
const FORBIDDEN: u16 = 403;
const BODY_PREVIEW_LIMIT: usize = 256;

/// Maps raw failures into the crate's [`Error`] taxonomy.
pub trait ErrorHandler: Send + Sync {
	/// Classifies a non-2xx response.
	fn handle_error_response(&self, status: u16, body: &[u8]) -> Error;

	/// Classifies a failure that happened before a status was available, or while decoding.
	fn handle_local_failure(&self, failure: LocalFailure) -> Error;

	/// Classifies a request-body serialization failure.
	fn handle_serialization_failure(&self, source: BoxError) -> Error;
}

/// Handler for ordinary REST calls.
///
/// 401 and 403 become [`Error::NotAuthorized`] and [`Error::Forbidden`]; any other non-2xx
/// and every local failure become [`TransportError`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultErrorHandler;
impl ErrorHandler for DefaultErrorHandler {
	fn handle_error_response(&self, status: u16, body: &[u8]) -> Error {
		let message = body_preview(body);

		match status {
			UNAUTHORIZED => Error::NotAuthorized { message },
			FORBIDDEN => Error::Forbidden { message },
			_ => TransportError::Status { status, body: message }.into(),
		}
	}

	fn handle_local_failure(&self, failure: LocalFailure) -> Error {
		match failure {
			LocalFailure::Network(source) => TransportError::Network { source }.into(),
			LocalFailure::Io(e) => TransportError::Io(e).into(),
			LocalFailure::Decode { source, status } =>
				TransportError::Decode { source, status }.into(),
			other @ LocalFailure::AsyncContext =>
				TransportError::Network { source: Box::new(other) }.into(),
		}
	}

	fn handle_serialization_failure(&self, source: BoxError) -> Error {
		TransportError::Serialization { source }.into()
	}
}

/// Handler for identity-provider (token endpoint) calls.
///
/// 401 and 403 keep their dedicated variants; every other failure, local or remote, becomes
/// an [`AuthError`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthErrorHandler;
impl ErrorHandler for AuthErrorHandler {
	fn handle_error_response(&self, status: u16, body: &[u8]) -> Error {
		let message = body_preview(body);

		match status {
			UNAUTHORIZED => Error::NotAuthorized { message },
			FORBIDDEN => Error::Forbidden { message },
			_ => AuthError::Rejected { status, message }.into(),
		}
	}

	fn handle_local_failure(&self, failure: LocalFailure) -> Error {
		match failure {
			LocalFailure::Decode { source, .. } => AuthError::TokenResponseParse { source }.into(),
			other => AuthError::TokenRequest { source: Box::new(other) }.into(),
		}
	}

	fn handle_serialization_failure(&self, source: BoxError) -> Error {
		AuthError::RequestSerialization { source }.into()
	}
}

/// Lossy UTF-8 preview of a response body, bounded to keep error messages readable.
pub fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);

	if text.chars().count() <= BODY_PREVIEW_LIMIT {
		return text.into_owned();
	}

	let mut buf = text.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}
