//! Issues a `client_credentials` token from an in-memory registry and verifies it against the
//! JWKS the same issuer publishes.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use oauth2_issuer::{
	api::ApiRequest,
	auth::{ClientId, KeyId},
	config::HttpTimeouts,
	http,
	issuer::TokenIssuer,
	jwks::{JwksFetcher, JwksPublisher},
	jwt::TokenMinter,
	registry::{ClientRecord, MemoryRegistry},
	signer::{KeySigner, LocalSigner},
	verify::TokenVerifier,
};

const ISSUER: &str = "https://issuer.demo";
const AUDIENCE: &str = "https://api.demo";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let key_id = KeyId::new("demo-signing-key")?;
	let signer: Arc<dyn KeySigner> = Arc::new(LocalSigner::default().with_generated_key(key_id.clone()));
	let registry = MemoryRegistry::from_records([ClientRecord::with_secret(
		ClientId::new("demo-client")?,
		ISSUER,
		"super-secret",
		"demo-salt",
	)]);
	let issuer = TokenIssuer::new(
		Arc::new(registry),
		Arc::new(TokenMinter::new(signer.clone())),
		key_id.clone(),
		AUDIENCE,
	);
	let request = ApiRequest::new(Some("grant_type=client_credentials&scope=reports.read".into()))
		.with_header(
			"Authorization",
			format!("Basic {}", STANDARD.encode("demo-client:super-secret")),
		);
	let token = issuer.issue(&request).await?;

	println!("Issued {} token valid for {}s.", token.token_type, token.expires_in);

	let jwks = JwksPublisher::new(signer, key_id).handle().await;
	let server = MockServer::start_async().await;
	let jwks_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/jwks.json");
			then.status(jwks.status).header("content-type", "application/json").body(jwks.body);
		})
		.await;
	let http_client = http::build_http_client(&HttpTimeouts::default())?;
	let fetcher =
		JwksFetcher::new(http_client, Url::parse(&server.url("/.well-known/jwks.json"))?);
	let claims = TokenVerifier::new(fetcher, ISSUER, AUDIENCE)
		.verify(&token.access_token, Some("reports.read"))
		.await?;

	println!("Verified token for client {:?} with scope {}.", claims.client_id, claims.scope);

	jwks_mock.assert_async().await;

	Ok(())
}
