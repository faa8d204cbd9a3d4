// crates.io
use httpmock::prelude::*;
// self
use oauth2_issuer::{
	_preludet::*,
	encrypt::TokenEncrypter,
	jwks::{Jwk, Jwks, JwksFetcher},
};

const JWKS_PATH: &str = "/.well-known/jwks.json";

fn encrypter(url: &str) -> TokenEncrypter {
	TokenEncrypter::new(JwksFetcher::new(
		test_http_client(),
		Url::parse(url).expect("JWKS URL should parse."),
	))
}

async fn serve(server: &MockServer, status: u16, body: String) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path(JWKS_PATH);
			then.status(status).header("content-type", "application/json").body(body);
		})
		.await
}

async fn failure_for(status: u16, body: String) -> AuthError {
	let server = MockServer::start_async().await;
	let mock = serve(&server, status, body).await;
	let err = encrypter(&server.url(JWKS_PATH))
		.encrypt("header.payload.signature")
		.await
		.expect_err("Encryption should fail.");

	mock.assert_calls_async(1).await;

	err
}

#[tokio::test]
async fn encrypts_to_the_published_encryption_key() {
	let server = MockServer::start_async().await;
	let signing = Jwk { key_use: Some("sig".into()), kid: Some("other".into()), ..test_encryption_jwk() };
	let jwks = Jwks { keys: vec![signing, test_encryption_jwk()] };
	let mock = serve(&server, 200, serde_json::to_string(&jwks).expect("JWKS should serialize."))
		.await;
	let encrypter = encrypter(&server.url(JWKS_PATH));
	let first = encrypter.encrypt("header.payload.signature").await.expect("First encryption.");
	let second = encrypter.encrypt("header.payload.signature").await.expect("Second encryption.");

	assert_ne!(first, second);
	assert_eq!(decrypt_jwe(first.as_str()), b"header.payload.signature");
	assert_eq!(decrypt_jwe(second.as_str()), b"header.payload.signature");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn jwks_without_keys_member_is_not_a_jwks() {
	let err = failure_for(200, "{}".into()).await;

	assert!(err.is_server_error());
	assert_eq!(err.to_string(), "Not a valid JWKS");
}

#[tokio::test]
async fn jwks_without_encryption_key_is_rejected() {
	let signing = Jwk { key_use: Some("sig".into()), ..test_encryption_jwk() };
	let body = serde_json::to_string(&Jwks { keys: vec![signing] }).expect("JWKS should serialize.");
	let err = failure_for(200, body).await;

	assert_eq!(err.to_string(), "No encryption key in JWKS");
}

#[tokio::test]
async fn error_statuses_and_bodies_are_reported() {
	let err = failure_for(500, "{\"message\":\"down\"}".into()).await;

	assert!(err.is_server_error());
	assert_eq!(err.to_string(), "Error fetching JWKS");

	let err = failure_for(200, "<html>not json</html>".into()).await;

	assert_eq!(err.to_string(), "Response body cannot be parsed as JSON");

	let err = failure_for(200, r#"{"keys":[{"kty":7}]}"#.into()).await;

	assert_eq!(err.to_string(), "Not a valid JWKS");
}

#[tokio::test]
async fn unreachable_jwks_is_a_network_error() {
	let err = encrypter("http://127.0.0.1:1/.well-known/jwks.json")
		.encrypt("header.payload.signature")
		.await
		.expect_err("Unreachable endpoint should fail.");

	assert!(err.is_server_error());
	assert_eq!(err.to_string(), "Unexpected network error fetching JWKS");
	assert_eq!(err.to_body().error_description, "Server Error");
}
