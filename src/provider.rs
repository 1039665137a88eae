//! Transport provider selection.
//!
//! A [`ProviderRegistry`] decides which [`TransportProvider`] builds every [`HttpClient`]. An
//! explicit [`set_provider`](ProviderRegistry::set_provider) wins when it happens before the
//! first resolution; otherwise the first registered candidate constructor that yields a
//! provider is selected. Whatever is selected first stays selected: concurrent first
//! resolutions serialize on one lock, so exactly one provider is ever constructed and every
//! caller observes that same instance.
//!
//! The registry is an ordinary value owned by an [`HttpClientFactory`] (or by the caller), so
//! tests can build isolated registries or [`reset`](ProviderRegistry::reset) one between
//! cases.

// self
use crate::{
	_prelude::*,
	auth::AuthProvider,
	config::ClientConfig,
	error::ConfigError,
	handler::ErrorHandler,
	http::HttpClient,
};

/// Lazily-invoked discovery hook; returning `None` means the backend is unavailable.
pub type ProviderCandidate = Box<dyn Fn() -> Option<Arc<dyn TransportProvider>> + Send + Sync>;

/// Factory for [`HttpClient`]s over one transport backend.
pub trait TransportProvider: Send + Sync {
	/// Stable provider label.
	fn name(&self) -> &'static str;

	/// Creates a client bound to `base_url`, `config`, `auth` and `error_handler`.
	fn create(
		&self,
		base_url: &str,
		config: &ClientConfig,
		auth: Option<Arc<dyn AuthProvider>>,
		error_handler: Arc<dyn ErrorHandler>,
	) -> Result<HttpClient>;
}

/// Memoized, single-winner provider selection.
#[derive(Default)]
pub struct ProviderRegistry {
	candidates: RwLock<Vec<ProviderCandidate>>,
	selected: Mutex<Option<Arc<dyn TransportProvider>>>,
}
impl ProviderRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a registry that discovers the bundled reqwest transports, blocking first.
	pub fn with_builtin_transports() -> Self {
		let registry = Self::new();

		#[cfg(feature = "reqwest")]
		{
			use crate::http::{BlockingTransportProvider, RuntimeTransportProvider};

			registry.register_candidate(|| {
				Some(Arc::new(BlockingTransportProvider) as Arc<dyn TransportProvider>)
			});
			registry.register_candidate(|| {
				Some(Arc::new(RuntimeTransportProvider) as Arc<dyn TransportProvider>)
			});
		}

		registry
	}

	/// Appends a discovery candidate; candidates are tried in registration order.
	pub fn register_candidate<F>(&self, candidate: F)
	where
		F: 'static + Fn() -> Option<Arc<dyn TransportProvider>> + Send + Sync,
	{
		self.candidates.write().push(Box::new(candidate));
	}

	/// Selects `provider` unless one has already been selected.
	///
	/// Returns `true` when `provider` became the selected provider.
	pub fn set_provider(&self, provider: Arc<dyn TransportProvider>) -> bool {
		let mut selected = self.selected.lock();

		if selected.is_some() {
			return false;
		}

		*selected = Some(provider);

		true
	}

	/// Returns the selected provider, resolving it on first use.
	pub fn resolve(&self) -> Result<Arc<dyn TransportProvider>> {
		let mut selected = self.selected.lock();

		if let Some(provider) = selected.as_ref() {
			return Ok(provider.clone());
		}

		let provider = self
			.candidates
			.read()
			.iter()
			.find_map(|candidate| candidate())
			.ok_or(ConfigError::NoTransportProvider)?;

		#[cfg(feature = "tracing")]
		tracing::debug!(provider = provider.name(), "Transport provider selected.");

		*selected = Some(provider.clone());

		Ok(provider)
	}

	/// Returns the selected provider without triggering resolution.
	pub fn resolved(&self) -> Option<Arc<dyn TransportProvider>> {
		self.selected.lock().clone()
	}

	/// Forgets the selected provider so the next [`resolve`](Self::resolve) starts over.
	pub fn reset(&self) {
		self.selected.lock().take();
	}
}
impl Debug for ProviderRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderRegistry")
			.field("candidates", &self.candidates.read().len())
			.field("selected", &self.selected.lock().as_ref().map(|p| p.name()))
			.finish()
	}
}

/// Builds clients through a shared [`ProviderRegistry`].
#[derive(Clone, Debug)]
pub struct HttpClientFactory {
	registry: Arc<ProviderRegistry>,
}
impl HttpClientFactory {
	/// Wraps an existing registry.
	pub fn new(registry: Arc<ProviderRegistry>) -> Self {
		Self { registry }
	}

	/// Factory over [`ProviderRegistry::with_builtin_transports`].
	pub fn with_builtin_transports() -> Self {
		Self::new(Arc::new(ProviderRegistry::with_builtin_transports()))
	}

	/// Registry used by this factory.
	pub fn registry(&self) -> &Arc<ProviderRegistry> {
		&self.registry
	}

	/// Resolves the provider and creates a client.
	pub fn create(
		&self,
		base_url: &str,
		config: &ClientConfig,
		auth: Option<Arc<dyn AuthProvider>>,
		error_handler: Arc<dyn ErrorHandler>,
	) -> Result<HttpClient> {
		self.registry.resolve()?.create(base_url, config, auth, error_handler)
	}
}
