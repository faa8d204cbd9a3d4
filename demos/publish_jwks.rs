//! Publishes the JWKS for a key held by a KMS-compatible signer, served here by a mock endpoint.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use oauth2_issuer::{
	auth::KeyId,
	config::HttpTimeouts,
	http,
	jwks::JwksPublisher,
	signer::{KeySigner, KmsSigner, LocalSigner},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let key_id = KeyId::new("alias/token-signing")?;
	// Stand-in for the key material that lives inside the KMS.
	let der = LocalSigner::default()
		.with_generated_key(key_id.clone())
		.public_key(&key_id)
		.await?;
	let server = MockServer::start_async().await;
	let kms_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/").header("x-amz-target", "TrentService.GetPublicKey");
			then.status(200).header("content-type", "application/x-amz-json-1.1").body(
				serde_json::json!({
					"KeyId": "alias/token-signing",
					"KeyUsage": "SIGN_VERIFY",
					"PublicKey": STANDARD.encode(&der.0),
				})
				.to_string(),
			);
		})
		.await;
	let http_client = http::build_http_client(&HttpTimeouts::default())?;
	let signer = KmsSigner::new(http_client, Url::parse(&server.url("/"))?);
	let response = JwksPublisher::new(Arc::new(signer), key_id).handle().await;

	for (name, value) in response.headers.iter() {
		println!("{name}: {value}");
	}

	println!("\n{}", response.body);

	kms_mock.assert_async().await;

	Ok(())
}
