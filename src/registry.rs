//! Client registry contract and built-in registry implementations.
//!
//! A registry maps a `client_id` to the issuer it is trusted for and a salted digest of its secret.
//! Lookups are read-only and never cached inside the issuer.

pub mod memory;
pub mod remote;

pub use memory::MemoryRegistry;
pub use remote::RemoteRegistry;

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, ClientId, ClientSecret},
};

/// Future returned by [`ClientRegistry`] operations.
pub type RegistryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RegistryError>> + 'a + Send>>;

/// Lookup contract implemented by client registries.
pub trait ClientRegistry
where
	Self: Send + Sync,
{
	/// Fetches the record registered for `client_id`, if any.
	fn lookup<'a>(&'a self, client_id: &'a ClientId) -> RegistryFuture<'a, Option<ClientRecord>>;
}
impl dyn ClientRegistry {
	/// Resolves the issuer for a credential pair.
	///
	/// Unknown clients and wrong secrets are indistinguishable to the caller; a failing registry is
	/// a server error.
	pub async fn resolve_issuer(&self, credentials: &ClientCredentials) -> Result<RegisteredIssuer> {
		let record = self
			.lookup(&credentials.client_id)
			.await
			.map_err(|e| AuthError::server("Failed to query client registry", e))?
			.ok_or(AuthError::InvalidClient)?;

		if !record.matches_secret(&credentials.client_secret) {
			return Err(AuthError::InvalidClient);
		}

		Ok(RegisteredIssuer { issuer_url: record.issuer })
	}
}

/// Issuer a client is trusted for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredIssuer {
	/// Issuer URL stamped into the `iss` claim.
	pub issuer_url: String,
}

/// Registry entry as stored in the registry document.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
	/// Registered client identifier.
	pub client_id: ClientId,
	/// Issuer the client is trusted for.
	pub issuer: String,
	/// Per-client salt appended to the secret before hashing.
	pub salt: String,
	/// `base64(sha256(secret || salt))`.
	pub hashed_client_secret: String,
}
impl ClientRecord {
	/// Builds a record by hashing `secret` with `salt`.
	pub fn with_secret(
		client_id: ClientId,
		issuer: impl Into<String>,
		secret: &str,
		salt: impl Into<String>,
	) -> Self {
		let salt = salt.into();
		let hashed_client_secret = ClientSecret::new(secret).encoded_digest(&salt);

		Self { client_id, issuer: issuer.into(), salt, hashed_client_secret }
	}

	/// Returns true when `secret` hashes to the stored digest.
	pub fn matches_secret(&self, secret: &ClientSecret) -> bool {
		secret.matches_digest(&self.salt, &self.hashed_client_secret)
	}
}
impl Debug for ClientRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientRecord")
			.field("client_id", &self.client_id)
			.field("issuer", &self.issuer)
			.finish_non_exhaustive()
	}
}

/// Error type produced by [`ClientRegistry`] implementations.
#[derive(Debug, ThisError)]
pub enum RegistryError {
	/// The registry could not be reached or answered with a failure.
	#[error("Client registry is unavailable: {message}.")]
	Unavailable {
		/// Failure summary.
		message: String,
		/// Transport failure, if any.
		#[source]
		source: Option<ReqwestError>,
	},
	/// The registry document is not a list of client records.
	#[error("Client registry document is malformed.")]
	Malformed(#[source] serde_path_to_error::Error<serde_json::Error>),
}

/// Parses a registry document (a JSON array of [`ClientRecord`]s).
pub fn parse_registry_document(document: &[u8]) -> Result<Vec<ClientRecord>, RegistryError> {
	let deserializer = &mut serde_json::Deserializer::from_slice(document);

	serde_path_to_error::deserialize(deserializer).map_err(RegistryError::Malformed)
}
