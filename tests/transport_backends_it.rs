// crates.io
use httpmock::prelude::*;
// self
use oidc_rest_client::{
	_preludet::*,
	config::ClientConfig,
	error::TransportError,
	handler::DefaultErrorHandler,
	http::{BlockingTransportProvider, HttpClient, RuntimeTransportProvider},
	provider::{HttpClientFactory, ProviderRegistry, TransportProvider},
	request::{Operation, Request, ResponseType},
};

#[derive(Debug, PartialEq, Deserialize)]
struct Artifact {
	id: String,
	version: u32,
}

fn client_for(provider: &dyn TransportProvider, base_url: &str) -> HttpClient {
	provider
		.create(base_url, &ClientConfig::default(), None, Arc::new(DefaultErrorHandler))
		.expect("Provider should create a client.")
}

fn fetch(client: &HttpClient, id: &str) -> Result<Artifact> {
	client.send_request(
		Request::builder(Operation::Get, ResponseType::<Artifact>::json())
			.path("groups/%s/artifacts/%s")
			.path_params(["default", id])
			.query_param("canonical", "true")
			.build(),
	)
}

#[test]
fn blocking_and_runtime_transports_agree() {
	let server = MockServer::start();
	let ok = server.mock(|when, then| {
		when.method(GET).path("/groups/default/artifacts/schema-v1").query_param("canonical", "true");
		then.status(200)
			.header("content-type", "application/json")
			.body("{\"id\":\"schema-v1\",\"version\":3}");
	});
	let missing = server.mock(|when, then| {
		when.method(GET).path("/groups/default/artifacts/missing");
		then.status(404).body("artifact not found");
	});
	let providers: [&dyn TransportProvider; 2] =
		[&BlockingTransportProvider, &RuntimeTransportProvider];
	let mut outcomes = Vec::new();

	for provider in providers {
		let client = client_for(provider, &server.base_url());
		let found = fetch(&client, "schema-v1").expect("Existing artifact should decode.");
		let err = fetch(&client, "missing").expect_err("Missing artifact should fail.");
		let status = match err {
			Error::Transport(TransportError::Status { status, body }) => (status, body),
			other => panic!("Unexpected classification from {}: {other:?}.", provider.name()),
		};

		client.close();
		outcomes.push((found, status));
	}

	assert_eq!(outcomes[0], outcomes[1]);
	assert_eq!(outcomes[0].0, Artifact { id: "schema-v1".into(), version: 3 });
	assert_eq!(outcomes[0].1, (404, "artifact not found".into()));

	ok.assert_calls(2);
	missing.assert_calls(2);
}

#[test]
fn blocking_pool_callers_are_served() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(GET).path("/groups/default/artifacts/pooled");
		then.status(200).body("{\"id\":\"pooled\",\"version\":2}");
	});
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.worker_threads(1)
		.enable_all()
		.build()
		.expect("Test runtime should build.");

	for provider in [&BlockingTransportProvider as &dyn TransportProvider, &RuntimeTransportProvider]
	{
		let client = Arc::new(client_for(provider, &server.base_url()));
		let pooled = client.clone();
		let found = runtime
			.block_on(runtime.spawn_blocking(move || fetch(&pooled, "pooled")))
			.expect("Blocking task should not panic.");

		assert_eq!(
			found.unwrap_or_else(|e| panic!("{} failed on the blocking pool: {e:?}.", provider.name())),
			Artifact { id: "pooled".into(), version: 2 }
		);
	}

	mock.assert_calls(2);
}

#[test]
fn clients_live_entirely_inside_a_runtime() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(GET).path("/groups/default/artifacts/inline");
		then.status(200).body("{\"id\":\"inline\",\"version\":1}");
	});
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.expect("Test runtime should build.");

	for provider in [&BlockingTransportProvider as &dyn TransportProvider, &RuntimeTransportProvider]
	{
		let found = runtime.block_on(async {
			let client = client_for(provider, &server.base_url());
			let found = fetch(&client, "inline");

			client.close();

			found
		});

		assert_eq!(
			found.unwrap_or_else(|e| panic!("{} failed inside block_on: {e:?}.", provider.name())),
			Artifact { id: "inline".into(), version: 1 }
		);
	}

	mock.assert_calls(2);
}

#[test]
fn factory_uses_the_registered_provider() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(GET).path("/groups/default/artifacts/a1");
		then.status(200).body("{\"id\":\"a1\",\"version\":1}");
	});
	let registry = Arc::new(ProviderRegistry::with_builtin_transports());

	assert!(registry.set_provider(Arc::new(RuntimeTransportProvider)));

	let factory = HttpClientFactory::new(registry.clone());
	let client = factory
		.create(&server.base_url(), &ClientConfig::default(), None, Arc::new(DefaultErrorHandler))
		.expect("Factory should create a client.");

	assert_eq!(
		fetch(&client, "a1").expect("Runtime-backed call should succeed."),
		Artifact { id: "a1".into(), version: 1 }
	);
	assert_eq!(
		registry.resolved().map(|provider| provider.name()),
		Some("reqwest-runtime")
	);

	mock.assert_calls(1);
}
