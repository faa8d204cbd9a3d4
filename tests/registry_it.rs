// crates.io
use httpmock::prelude::*;
// self
use oauth2_issuer::{
	_preludet::*,
	auth::{ClientCredentials, ClientId, ClientSecret},
	error::ErrorBody,
	issuer::TokenIssuer,
	jwt::{TokenMinter, TokenResponse},
	registry::{ClientRecord, ClientRegistry, RemoteRegistry},
};

const REGISTRY_PATH: &str = "/clients.json";

fn document() -> String {
	let client_id = ClientId::new(TEST_CLIENT_ID).expect("Client fixture should be valid.");
	let records = [ClientRecord::with_secret(client_id, TEST_ISSUER, TEST_CLIENT_SECRET, "salt")];

	serde_json::to_string(&records).expect("Registry document should serialize.")
}

fn remote(server: &MockServer) -> Arc<dyn ClientRegistry> {
	Arc::new(RemoteRegistry::new(
		test_http_client(),
		Url::parse(&server.url(REGISTRY_PATH)).expect("Mock URL should parse."),
	))
}

fn issuer(registry: Arc<dyn ClientRegistry>) -> TokenIssuer {
	TokenIssuer::new(
		registry,
		Arc::new(TokenMinter::new(Arc::new(test_signer()))),
		test_key_id(),
		TEST_AUDIENCE,
	)
}

#[tokio::test]
async fn remote_registry_is_consulted_on_every_request() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REGISTRY_PATH);
			then.status(200).header("content-type", "application/json").body(document());
		})
		.await;
	let issuer = issuer(remote(&server));

	for _ in 0..2 {
		let response = issuer.handle(&client_credentials_request()).await;
		let body: TokenResponse = response.json_body().expect("Token response should be JSON.");

		assert_eq!(response.status, 200);
		assert_eq!(body.expires_in, 3600);
	}

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn unknown_clients_are_invalid_client() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(REGISTRY_PATH);
			then.status(200).header("content-type", "application/json").body(document());
		})
		.await;

	let credentials = ClientCredentials::new(
		ClientId::new("stranger").expect("Client fixture should be valid."),
		ClientSecret::new(TEST_CLIENT_SECRET),
	);
	let err = remote(&server)
		.resolve_issuer(&credentials)
		.await
		.expect_err("Unknown client should be rejected.");

	assert!(matches!(err, AuthError::InvalidClient));
	assert_eq!(err.status(), 400);
}

#[tokio::test]
async fn failing_registry_is_a_generic_server_error() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(REGISTRY_PATH);
			then.status(503).body("maintenance");
		})
		.await;

	let response = issuer(remote(&server)).handle(&client_credentials_request()).await;

	assert_eq!(response.status, 500);
	assert_eq!(
		response.json_body::<ErrorBody>().expect("Error body should be JSON."),
		ErrorBody { error: "server_error".into(), error_description: "Server Error".into() }
	);
}

#[tokio::test]
async fn malformed_registry_document_is_a_server_error() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(REGISTRY_PATH);
			then.status(200).body(r#"{"clients":[]}"#);
		})
		.await;

	let credentials = ClientCredentials::new(
		ClientId::new(TEST_CLIENT_ID).expect("Client fixture should be valid."),
		ClientSecret::new(TEST_CLIENT_SECRET),
	);
	let err = remote(&server)
		.resolve_issuer(&credentials)
		.await
		.expect_err("Malformed document should fail.");

	assert!(err.is_server_error());
	assert_eq!(err.to_string(), "Failed to query client registry");
}
