//! Client credentials carried in an HTTP Basic `Authorization` header.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, ClientSecret},
};

const BASIC_SCHEME: &str = "basic";

/// `client_id`/`client_secret` pair decoded from a Basic authorization header.
///
/// Values are created per request and never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCredentials {
	/// Client identifier.
	pub client_id: ClientId,
	/// Client secret; redacted in formatting.
	pub client_secret: ClientSecret,
}
impl ClientCredentials {
	/// Creates a credential pair from already-validated parts.
	pub fn new(client_id: ClientId, client_secret: ClientSecret) -> Self {
		Self { client_id, client_secret }
	}

	/// Decodes `Basic base64(client_id:client_secret)`.
	///
	/// Every malformation (wrong scheme, bad base64, non UTF-8, missing `:`, empty halves)
	/// collapses to [`AuthError::InvalidAuthorizationHeader`].
	pub fn from_authorization_header(value: &str) -> Result<Self> {
		let (scheme, encoded) =
			value.trim().split_once(' ').ok_or(AuthError::InvalidAuthorizationHeader)?;

		if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
			return Err(AuthError::InvalidAuthorizationHeader);
		}

		let decoded = STANDARD
			.decode(encoded.trim())
			.map_err(|_| AuthError::InvalidAuthorizationHeader)?;
		let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidAuthorizationHeader)?;
		let (client_id, client_secret) =
			decoded.split_once(':').ok_or(AuthError::InvalidAuthorizationHeader)?;

		if client_secret.is_empty() {
			return Err(AuthError::InvalidAuthorizationHeader);
		}

		let client_id = ClientId::new(client_id).map_err(|_| AuthError::InvalidAuthorizationHeader)?;

		Ok(Self::new(client_id, ClientSecret::new(client_secret)))
	}
}
