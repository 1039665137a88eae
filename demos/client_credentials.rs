//! Demonstrates an API client that stamps cached client-credentials tokens onto every request,
//! using the default transport registry and a mock identity provider.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oidc_rest_client::{
	auth::{AuthProvider, Credentials, OidcAuth, TokenEndpoint},
	config::ClientConfig,
	handler::DefaultErrorHandler,
	provider::HttpClientFactory,
	request::{Operation, Request, ResponseType},
};

fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start();
	let token_mock = server.mock(|when, then| {
		when.method(POST).path("/realms/demo/protocol/openid-connect/token");
		then.status(200).header("content-type", "application/json").body(
			"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":900}",
		);
	});
	let api_mock = server.mock(|when, then| {
		when.method(GET).path("/apis/registry/v2/system/info").header("authorization", "Bearer demo-access");
		then.status(200).header("content-type", "application/json").body("{\"version\":\"2.5.0\"}");
	});
	let factory = HttpClientFactory::with_builtin_transports();
	let auth = OidcAuth::connect(
		&factory,
		&server.base_url(),
		&ClientConfig::default(),
		Credentials::new("demo-client", "super-secret").with_scope("registry"),
	)?
	.with_token_endpoint(TokenEndpoint::keycloak_realm("demo"));
	let auth = Arc::new(auth);
	let provider: Arc<dyn AuthProvider> = auth.clone();
	let config = ClientConfig::default().with_auto_base_path("apis/registry/v2");
	let api = factory.create(&server.base_url(), &config, Some(provider), Arc::new(DefaultErrorHandler))?;

	for _ in 0..3 {
		let info = api.send_request(
			Request::builder(Operation::Get, ResponseType::<serde_json::Value>::json())
				.path("system/info")
				.build(),
		)?;

		println!("Registry info: {info}.");
	}

	println!(
		"Token endpoint calls: {}, cache hits: {}.",
		auth.metrics().requests(),
		auth.metrics().cache_hits()
	);

	token_mock.assert();
	api_mock.assert_calls(3);

	Ok(())
}
