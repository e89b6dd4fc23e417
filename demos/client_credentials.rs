//! Acquires a client-credentials token against a local mock authorization server, then calls a
//! protected endpoint through the authenticated transport.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use oauth2::http::{Method, Request};
// self
use oauth2_cc::{
	client::{AuthClient, CallContext},
	config::AuthConfig,
	endpoint::{EndpointResolver, Environment, EnvironmentEndpoints},
	http::ReqwestHttpClient,
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let discovery_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/acme/.well-known/openid-configuration");
			then.status(404);
		})
		.await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/acme/oauth2/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/widgets").header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let resolver =
		EndpointResolver::default().with_templates(Environment::Production, EnvironmentEndpoints {
			authorization_base: server.base_url(),
			api_base: server.url("/api"),
		});
	let config = AuthConfig::builder("demo-client", "super-secret", "acme")
		.resolver(resolver)
		.scopes(["widgets.read"])
		.build()?;
	let http = ReqwestHttpClient::with_client(
		Client::builder().redirect(oauth2_cc::reqwest::redirect::Policy::none()).build()?,
	);
	let client = AuthClient::with_http_client(config, Arc::new(http))?;
	let ctx = CallContext::new();
	let token = client.get_token(&ctx).await?;

	println!("Acquired token {} ({:?}).", token.access_token.fingerprint(), client.state());

	let request = Request::builder()
		.method(Method::GET)
		.uri(server.url("/api/widgets"))
		.body(Vec::new())?;
	let response = client.transport().send(request, &ctx).await?;

	println!("Protected endpoint answered HTTP {}.", response.status());

	client.close();
	discovery_mock.assert_async().await;
	token_mock.assert_async().await;
	api_mock.assert_async().await;

	Ok(())
}
