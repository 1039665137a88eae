//! Bundled reqwest transports.
//!
//! [`BlockingTransport`] dispatches on `reqwest::blocking` and [`RuntimeTransport`] submits the
//! async reqwest client to an owned tokio runtime and parks the caller until completion. Both
//! honor the same [`ClientConfig`] knobs (CA bundle, timeout) and never follow redirects.
//!
//! Either transport may be called from any thread, including tokio blocking-pool threads and
//! the body of a foreign `block_on`. The only rejected caller is a thread of the runtime that
//! [`RuntimeTransport`] drives itself, since waiting there on its own I/O would deadlock.

// std
use std::{
	cell::Cell,
	fs,
	panic,
	path::Path,
	sync::{
		atomic::{AtomicU64, Ordering},
		mpsc,
	},
	thread,
};
// crates.io
use reqwest::{Certificate, Method, redirect::Policy};
use tokio::runtime::{Builder as RuntimeBuilder, Handle, Runtime};
// self
use crate::{
	_prelude::*,
	auth::AuthProvider,
	config::{ClientConfig, TlsConfig},
	error::{ConfigError, LocalFailure},
	handler::ErrorHandler,
	http::{HttpClient, Transport, TransportRequest, TransportResponse},
	provider::TransportProvider,
	request::Operation,
};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
	// Id of the transport runtime that spawned this thread, if any.
	static RUNTIME_OWNER: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Thread-blocking transport backed by `reqwest::blocking::Client` (HTTP/1.1).
///
/// `reqwest::blocking` refuses to run on a thread inside a tokio runtime context, so from such
/// a thread construction and dispatch move to a short-lived scoped thread.
pub struct BlockingTransport {
	client: RwLock<Option<reqwest::blocking::Client>>,
}
impl BlockingTransport {
	/// Builds the transport from `config`.
	pub fn new(config: &ClientConfig) -> Result<Self> {
		let client = off_runtime(|| {
			let mut builder =
				reqwest::blocking::Client::builder().redirect(Policy::none()).http1_only();

			if let Some(timeout) = config.request_timeout {
				builder = builder.timeout(timeout);
			}
			for cert in load_ca_bundle(&config.tls)? {
				builder = builder.add_root_certificate(cert);
			}

			builder.build().map_err(ConfigError::from)
		})?;

		Ok(Self { client: RwLock::new(Some(client)) })
	}

	fn send(&self, request: TransportRequest) -> Result<TransportResponse, LocalFailure> {
		let client = self.client.read().clone().ok_or_else(transport_closed)?;
		let mut builder = client.request(method(request.method), request.url);

		for (name, value) in request.headers {
			builder = builder.header(name, value);
		}
		if let Some(body) = request.body {
			builder = builder.body(body);
		}

		let response = builder.send()?;
		let status = response.status().as_u16();
		let body = response.bytes()?.to_vec();

		Ok(TransportResponse { status, body })
	}
}
impl Transport for BlockingTransport {
	fn name(&self) -> &'static str {
		"reqwest-blocking"
	}

	fn dispatch(&self, request: TransportRequest) -> Result<TransportResponse, LocalFailure> {
		off_runtime(|| self.send(request))
	}

	fn close(&self) {
		self.client.write().take();
	}
}

/// Transport that drives the async reqwest client on an owned tokio runtime.
///
/// Requests are spawned onto the runtime and the calling thread waits on a channel until the
/// response body has been read. The runtime uses a single worker and is shut down in the
/// background on [`close`](Transport::close) or drop, so closing never blocks on in-flight I/O;
/// a caller still waiting at that point gets a closed-transport failure.
pub struct RuntimeTransport {
	id: u64,
	inner: Mutex<Option<RuntimeInner>>,
}
impl RuntimeTransport {
	/// Builds the transport and its runtime from `config`.
	pub fn new(config: &ClientConfig) -> Result<Self> {
		let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
		let mut builder = reqwest::Client::builder().redirect(Policy::none()).http1_only();

		if let Some(timeout) = config.request_timeout {
			builder = builder.timeout(timeout);
		}
		for cert in load_ca_bundle(&config.tls)? {
			builder = builder.add_root_certificate(cert);
		}

		let runtime = RuntimeBuilder::new_multi_thread()
			.worker_threads(1)
			.thread_name("oidc-rest-client-io")
			.on_thread_start(move || RUNTIME_OWNER.with(|owner| owner.set(Some(id))))
			.enable_all()
			.build()
			.map_err(ConfigError::http_client_build)?;
		let client = {
			let _entered = runtime.enter();

			builder.build()
		};
		let client = match client {
			Ok(client) => client,
			Err(e) => {
				// Plain drop would wait for the runtime, which panics inside an async context.
				runtime.shutdown_background();

				return Err(ConfigError::from(e).into());
			},
		};

		Ok(Self { id, inner: Mutex::new(Some(RuntimeInner { runtime, client })) })
	}
}
impl Transport for RuntimeTransport {
	fn name(&self) -> &'static str {
		"reqwest-runtime"
	}

	fn dispatch(&self, request: TransportRequest) -> Result<TransportResponse, LocalFailure> {
		if RUNTIME_OWNER.with(Cell::get) == Some(self.id) {
			return Err(LocalFailure::AsyncContext);
		}

		let (handle, client) = {
			let inner = self.inner.lock();
			let inner = inner.as_ref().ok_or_else(transport_closed)?;

			(inner.runtime.handle().clone(), inner.client.clone())
		};
		let (tx, rx) = mpsc::sync_channel(1);

		handle.spawn(async move {
			let result = async {
				let mut builder = client.request(method(request.method), request.url);

				for (name, value) in request.headers {
					builder = builder.header(name, value);
				}
				if let Some(body) = request.body {
					builder = builder.body(body);
				}

				let response = builder.send().await?;
				let status = response.status().as_u16();
				let body = response.bytes().await?.to_vec();

				Ok::<_, LocalFailure>(TransportResponse { status, body })
			}
			.await;

			// The caller may have given up; nothing is waiting for the result then.
			let _ = tx.send(result);
		});

		// A runtime shut down mid-request drops the task and with it the sender.
		rx.recv().map_err(|_| transport_closed())?
	}

	fn close(&self) {
		if let Some(inner) = self.inner.lock().take() {
			drop(inner.client);
			inner.runtime.shutdown_background();
		}
	}
}
impl Drop for RuntimeTransport {
	fn drop(&mut self) {
		self.close();
	}
}

struct RuntimeInner {
	runtime: Runtime,
	client: reqwest::Client,
}

/// [`TransportProvider`] producing clients over [`BlockingTransport`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockingTransportProvider;
impl TransportProvider for BlockingTransportProvider {
	fn name(&self) -> &'static str {
		"reqwest-blocking"
	}

	fn create(
		&self,
		base_url: &str,
		config: &ClientConfig,
		auth: Option<Arc<dyn AuthProvider>>,
		error_handler: Arc<dyn ErrorHandler>,
	) -> Result<HttpClient> {
		let transport = BlockingTransport::new(config)?;

		HttpClient::new(base_url, config, auth, error_handler, Box::new(transport))
	}
}

/// [`TransportProvider`] producing clients over [`RuntimeTransport`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RuntimeTransportProvider;
impl TransportProvider for RuntimeTransportProvider {
	fn name(&self) -> &'static str {
		"reqwest-runtime"
	}

	fn create(
		&self,
		base_url: &str,
		config: &ClientConfig,
		auth: Option<Arc<dyn AuthProvider>>,
		error_handler: Arc<dyn ErrorHandler>,
	) -> Result<HttpClient> {
		let transport = RuntimeTransport::new(config)?;

		HttpClient::new(base_url, config, auth, error_handler, Box::new(transport))
	}
}

fn method(operation: Operation) -> Method {
	match operation {
		Operation::Get => Method::GET,
		Operation::Put => Method::PUT,
		Operation::Post => Method::POST,
		Operation::Delete => Method::DELETE,
	}
}

/// Runs `f` on the calling thread, or on a scoped thread when the caller is inside a tokio
/// runtime context.
fn off_runtime<F, T>(f: F) -> T
where
	F: Send + FnOnce() -> T,
	T: Send,
{
	if Handle::try_current().is_err() {
		return f();
	}

	thread::scope(|scope| {
		scope.spawn(f).join().unwrap_or_else(|payload| panic::resume_unwind(payload))
	})
}

fn transport_closed() -> LocalFailure {
	LocalFailure::Io(std::io::Error::new(std::io::ErrorKind::NotConnected, "transport is closed"))
}

fn load_ca_bundle(tls: &TlsConfig) -> Result<Vec<Certificate>, ConfigError> {
	let Some(path) = tls.ca_bundle.as_deref() else {
		return Ok(Vec::new());
	};
	let pem = fs::read(path).map_err(|e| tls_material(path, e))?;

	Certificate::from_pem_bundle(&pem).map_err(|e| tls_material(path, e))
}

fn tls_material(path: &Path, e: impl 'static + Send + Sync + StdError) -> ConfigError {
	ConfigError::TlsMaterial { path: path.display().to_string(), source: Box::new(e) }
}
