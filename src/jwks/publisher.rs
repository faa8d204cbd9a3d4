//! JWKS publishing for the well-known endpoint.

// self
use crate::{
	_prelude::*,
	api::{ApiResponse, CACHE_CONTROL},
	auth::KeyId,
	jwks::{Jwk, Jwks},
	obs::{self, Operation, OperationSpan, Outcome},
	signer::KeySigner,
};

/// `Cache-Control` value for a successfully published key set.
pub const JWKS_CACHE_CONTROL: &str = "max-age=300";

/// Publishes the public half of the signing key as a one-key JWKS.
///
/// Unlike issuance, publishing cannot degrade: without the public key there is nothing to serve,
/// so every failure is a server error.
#[derive(Clone)]
pub struct JwksPublisher {
	signer: Arc<dyn KeySigner>,
	key_id: KeyId,
}
impl JwksPublisher {
	/// Creates a publisher for `key_id`.
	pub fn new(signer: Arc<dyn KeySigner>, key_id: KeyId) -> Self {
		Self { signer, key_id }
	}

	/// Builds the JWKS. Deterministic for a fixed key.
	pub async fn publish(&self) -> Result<Jwks> {
		const OPERATION: Operation = Operation::JwksPublish;

		let span = OperationSpan::new(OPERATION, "publish");

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let der = self
					.signer
					.public_key(&self.key_id)
					.await
					.map_err(|e| AuthError::server("Failed to fetch public key", e))?;
				let jwk = Jwk::signing_key_from_spki_der(der.as_ref())
					.map_err(|e| AuthError::server("Failed to convert public key to JWK", e))?;

				Ok(Jwks { keys: vec![jwk] })
			})
			.await;

		obs::finish(OPERATION, &result);

		result
	}

	/// Serves `GET /.well-known/jwks.json`.
	pub async fn handle(&self) -> ApiResponse {
		match self.publish().await {
			Ok(jwks) => ApiResponse::json(200, &jwks).with_header(CACHE_CONTROL, JWKS_CACHE_CONTROL),
			Err(e) => ApiResponse::from_error(&e),
		}
	}
}
impl Debug for JwksPublisher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JwksPublisher").field("key_id", &self.key_id).finish()
	}
}
