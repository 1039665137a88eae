//! Transport-independent HTTP client.
//!
//! [`HttpClient`] owns everything that is identical across backends: URI construction, the
//! header merge, the one-shot staged headers, auth stamping, response decoding and error
//! classification. Backends only implement [`Transport`], which moves bytes for a fully
//! prepared [`TransportRequest`] and reports local failures as [`LocalFailure`]. Two clients
//! built over different transports therefore produce identical results for identical inputs.
//!
//! Headers are merged in this order, later layers winning on conflict:
//!
//! 1. default headers from [`ClientConfig`]
//! 2. headers staged with [`HttpClient::set_next_request_headers`] (consumed by the next call on
//!    the same thread)
//! 3. the explicit [`CallContext`] passed to [`HttpClient::send_request_with`]
//! 4. per-request headers
//! 5. the auth provider

#[cfg(feature = "reqwest")] pub mod backend;
#[cfg(feature = "reqwest")] pub use backend::*;

// std
use std::{
	cell::RefCell,
	sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::AuthProvider,
	config::ClientConfig,
	error::{ConfigError, LocalFailure},
	handler::ErrorHandler,
	obs::{FlowKind, FlowSpan},
	request::{Body, Operation, Request, uri},
};

/// Header map used at every layer; names are case-sensitive at this level.
pub type Headers = BTreeMap<String, String>;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
	// Staged one-shot headers of this thread, keyed by client id; freed when the thread exits.
	static STAGED_HEADERS: RefCell<HashMap<u64, Headers>> = RefCell::new(HashMap::new());
}

/// Fully prepared request handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct TransportRequest {
	/// HTTP operation.
	pub method: Operation,
	/// Final URI with path parameters and query string applied.
	pub url: Url,
	/// Merged headers, auth included.
	pub headers: Headers,
	/// Encoded body.
	pub body: Option<Vec<u8>>,
}

/// Raw response returned by a [`Transport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Wire-level backend contract.
///
/// Implementations must be shareable across threads and must never classify failures
/// themselves; they return [`LocalFailure`] and let the owning client's handler decide.
/// Event-loop implementations return [`LocalFailure::AsyncContext`] when entered from their own
/// loop thread rather than waiting on it.
pub trait Transport: Send + Sync {
	/// Stable backend label used in logs and `Debug` output.
	fn name(&self) -> &'static str;

	/// Sends one request and waits for the complete response.
	fn dispatch(&self, request: TransportRequest) -> Result<TransportResponse, LocalFailure>;

	/// Releases pooled connections and background workers. Idempotent.
	fn close(&self);
}

/// Explicit per-call header layer.
///
/// Prefer this over [`HttpClient::set_next_request_headers`] when calls hop between threads or
/// run on a task pool, since nothing here depends on which thread sends the request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallContext {
	headers: Headers,
}
impl CallContext {
	/// Creates an empty context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a header applied to this call only.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Returns the headers carried by this context.
	pub fn headers(&self) -> &Headers {
		&self.headers
	}
}
impl From<Headers> for CallContext {
	fn from(headers: Headers) -> Self {
		Self { headers }
	}
}

/// Client bound to one endpoint, one auth provider, one error handler and one transport.
pub struct HttpClient {
	id: u64,
	endpoint: String,
	default_headers: Headers,
	auth: Option<Arc<dyn AuthProvider>>,
	error_handler: Arc<dyn ErrorHandler>,
	transport: Box<dyn Transport>,
	closed: AtomicBool,
}
impl HttpClient {
	/// Builds a client over `transport`.
	///
	/// `base_url` is normalized with [`ClientConfig::resolve_endpoint`] and must parse as an
	/// absolute URL.
	pub fn new(
		base_url: &str,
		config: &ClientConfig,
		auth: Option<Arc<dyn AuthProvider>>,
		error_handler: Arc<dyn ErrorHandler>,
		transport: Box<dyn Transport>,
	) -> Result<Self> {
		let endpoint = config.resolve_endpoint(base_url);

		Url::parse(&endpoint)
			.map_err(|source| ConfigError::InvalidBaseUrl { url: base_url.to_owned(), source })?;

		Ok(Self {
			id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
			endpoint,
			default_headers: config.default_headers.clone(),
			auth,
			error_handler,
			transport,
			closed: AtomicBool::new(false),
		})
	}

	/// Normalized endpoint every request path is joined onto; always ends with `/`.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Sends `request` and decodes the 2xx body into `T`.
	pub fn send_request<T>(&self, request: Request<T>) -> Result<T> {
		self.send_request_with(request, &CallContext::default())
	}

	/// Sends `request` with an explicit per-call header layer.
	pub fn send_request_with<T>(&self, mut request: Request<T>, context: &CallContext) -> Result<T> {
		if self.is_closed() {
			return Err(ConfigError::ClientClosed.into());
		}

		let _span = FlowSpan::new(FlowKind::ApiCall, "send_request").entered();
		// Consumed up front so a failing call still clears them.
		let staged = self.take_staged();

		if let Some(source) = request.take_deferred_error() {
			return Err(self.error_handler.handle_serialization_failure(source));
		}

		let url = self.resolve_uri(&request)?;
		let mut headers = self.default_headers.clone();

		headers.extend(staged.unwrap_or_default());
		headers.extend(context.headers().iter().map(|(k, v)| (k.clone(), v.clone())));
		headers.extend(request.headers().iter().map(|(k, v)| (k.clone(), v.clone())));

		if let Some(auth) = self.auth.as_ref() {
			auth.apply(&mut headers)?;
		}

		let transport_request = TransportRequest {
			method: request.operation(),
			url,
			headers,
			body: request.take_body().map(Body::into_bytes),
		};
		let response = match self.transport.dispatch(transport_request) {
			Ok(response) => response,
			Err(LocalFailure::AsyncContext) => return Err(ConfigError::BlockingInAsyncContext.into()),
			Err(failure) => return Err(self.error_handler.handle_local_failure(failure)),
		};

		if !response.is_success() {
			#[cfg(feature = "tracing")]
			tracing::debug!(status = response.status, transport = self.transport.name(), "Request failed.");

			return Err(self.error_handler.handle_error_response(response.status, &response.body));
		}

		let status = response.status;

		request.response_type().decode(response.body).map_err(|source| {
			self.error_handler.handle_local_failure(LocalFailure::Decode { source, status })
		})
	}

	/// Resolves the final URI `request` would be sent to.
	pub fn resolve_uri<T>(&self, request: &Request<T>) -> Result<Url> {
		Ok(uri::build_uri(
			&self.endpoint,
			request.path(),
			request.path_params(),
			request.query_params(),
		)?)
	}

	/// Stages headers for the next request sent from the calling thread.
	///
	/// Staging again before that request replaces the previous set. Other threads never see
	/// these headers, and they are discarded if the thread exits without sending.
	pub fn set_next_request_headers(&self, headers: Headers) {
		STAGED_HEADERS.with(|staged| staged.borrow_mut().insert(self.id, headers));
	}

	/// Returns the headers staged by the calling thread without consuming them.
	pub fn next_request_headers(&self) -> Option<Headers> {
		STAGED_HEADERS.with(|staged| staged.borrow().get(&self.id).cloned())
	}

	/// Releases transport resources; later sends fail with [`ConfigError::ClientClosed`].
	pub fn close(&self) {
		if !self.closed.swap(true, Ordering::AcqRel) {
			self.take_staged();
			self.transport.close();
		}
	}

	/// Returns true once [`close`](Self::close) has been called.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	fn take_staged(&self) -> Option<Headers> {
		// `try_with` fails only while this thread's locals are being torn down.
		STAGED_HEADERS.try_with(|staged| staged.borrow_mut().remove(&self.id)).ok().flatten()
	}
}
impl Drop for HttpClient {
	fn drop(&mut self) {
		self.take_staged();
	}
}
impl Debug for HttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpClient")
			.field("endpoint", &self.endpoint)
			.field("transport", &self.transport.name())
			.field("has_auth", &self.auth.is_some())
			.field("closed", &self.is_closed())
			.finish()
	}
}
