//! JWKS retrieval shared by the token encrypter and the token verifier.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	http,
	jwks::{JwkError, Jwks},
};

/// Failures while fetching a JWKS or selecting a key from it.
///
/// Display strings are stable; callers and tests match on them.
#[derive(Debug, ThisError)]
pub enum JwksFetchError {
	/// The request failed before a response arrived (DNS, connect, timeout).
	#[error("Unexpected network error fetching JWKS")]
	Network(#[source] ReqwestError),
	/// The endpoint answered with a non-success status.
	#[error("Error fetching JWKS")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Body preview for logging.
		body: String,
	},
	/// The body is not JSON.
	#[error("Response body cannot be parsed as JSON")]
	NotJson(#[source] serde_json::Error),
	/// The JSON document has no `keys` array or its entries are not JWKs.
	#[error("Not a valid JWKS")]
	NotJwks {
		/// Path-aware deserialization failure, when the `keys` array exists.
		#[source]
		source: Option<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// No key declares `use: "enc"`.
	#[error("No encryption key in JWKS")]
	NoEncryptionKey,
	/// No key declares `use: "sig"` (matching the requested `kid`, if any).
	#[error("No signing key in JWKS")]
	NoSigningKey,
	/// The selected encryption key cannot be turned into a public key.
	#[error("Error creating public encryption key")]
	PublicKey(#[source] JwkError),
}
impl From<JwksFetchError> for AuthError {
	fn from(e: JwksFetchError) -> Self {
		AuthError::server(e.to_string(), e)
	}
}

/// Fetches a JWKS document from a fixed URL using the shared HTTP client.
///
/// Every call hits the network; caching by `kid` is left to the caller.
#[derive(Clone, Debug)]
pub struct JwksFetcher {
	http_client: ReqwestClient,
	url: Url,
}
impl JwksFetcher {
	/// Creates a fetcher for `url`.
	pub fn new(http_client: ReqwestClient, url: Url) -> Self {
		Self { http_client, url }
	}

	/// JWKS location.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Fetches and validates the JWKS.
	pub async fn fetch(&self) -> Result<Jwks, JwksFetchError> {
		let response =
			self.http_client.get(self.url.clone()).send().await.map_err(JwksFetchError::Network)?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(JwksFetchError::Network)?;

		if !status.is_success() {
			return Err(JwksFetchError::Status {
				status: status.as_u16(),
				body: http::body_preview(&bytes),
			});
		}

		parse_jwks(&bytes)
	}
}

/// Parses a JWKS body, distinguishing non-JSON bodies from JSON that is not a key set.
pub fn parse_jwks(body: &[u8]) -> Result<Jwks, JwksFetchError> {
	let document: Value = serde_json::from_slice(body).map_err(JwksFetchError::NotJson)?;

	if !document.get("keys").is_some_and(Value::is_array) {
		return Err(JwksFetchError::NotJwks { source: None });
	}

	serde_path_to_error::deserialize(document)
		.map_err(|e| JwksFetchError::NotJwks { source: Some(e) })
}
