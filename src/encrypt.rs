//! Compact JWE (RSA-OAEP-256 + A256GCM) for tokens handed to downstream services.

// crates.io
use aes_gcm::{
	AeadCore, Aes256Gcm, KeyInit,
	aead::{Aead, OsRng, Payload},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::Oaep;
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	config::IssuerConfig,
	jwks::{Jwk, Jwks, JwksFetchError, JwksFetcher, USE_ENCRYPTION},
	obs::{self, Operation, OperationSpan, Outcome},
};

/// Key-management algorithm.
pub const ALG_RSA_OAEP_256: &str = "RSA-OAEP-256";
/// Content-encryption algorithm.
pub const ENC_A256GCM: &str = "A256GCM";

const GCM_TAG_LEN: usize = 16;

/// Failures while building the JWE once a public key is available.
#[derive(Debug, ThisError)]
pub enum EncryptError {
	/// The protected header could not be serialized.
	#[error("JWE header could not be serialized.")]
	Header(#[source] serde_json::Error),
	/// RSA-OAEP wrapping of the content key failed.
	#[error("Content encryption key could not be wrapped.")]
	KeyWrap(#[source] rsa::Error),
	/// AES-GCM sealing failed.
	#[error("Payload could not be sealed.")]
	Seal,
}
impl From<EncryptError> for AuthError {
	fn from(e: EncryptError) -> Self {
		AuthError::server("Error encrypting token", e)
	}
}

/// JWE protected header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweHeader {
	/// Key-management algorithm.
	pub alg: String,
	/// Content-encryption algorithm.
	pub enc: String,
	/// Payload media type.
	pub cty: String,
	/// Recipient key identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
}

/// Compact JWE (`header.key.iv.ciphertext.tag`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedToken(String);
impl EncryptedToken {
	/// Borrows the serialized JWE.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns the serialized JWE.
	pub fn into_string(self) -> String {
		self.0
	}
}
impl Debug for EncryptedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("EncryptedToken(..)")
	}
}

/// Encrypts tokens to the `enc` key published at a JWKS URL.
///
/// The JWKS is fetched on every call, so key rotation at the endpoint takes effect immediately.
#[derive(Clone, Debug)]
pub struct TokenEncrypter {
	fetcher: JwksFetcher,
}
impl TokenEncrypter {
	/// Creates an encrypter over a JWKS fetcher.
	pub fn new(fetcher: JwksFetcher) -> Self {
		Self { fetcher }
	}

	/// Creates an encrypter from `ENCRYPTION_JWKS_URL`; `None` when it is not configured.
	pub fn from_config(config: &IssuerConfig, http_client: ReqwestClient) -> Option<Self> {
		config
			.encryption_jwks_url
			.clone()
			.map(|url| Self::new(JwksFetcher::new(http_client, url)))
	}

	/// Fetches the JWKS, selects the first encryption key, and encrypts `token`.
	pub async fn encrypt(&self, token: &str) -> Result<EncryptedToken> {
		const OPERATION: Operation = Operation::TokenEncrypt;

		let span = OperationSpan::new(OPERATION, "encrypt");

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let jwks = self.fetcher.fetch().await?;
				let jwk = select_encryption_key(&jwks)?;

				encrypt_with_key(jwk, token.as_bytes())
			})
			.await;

		obs::finish(OPERATION, &result);

		result
	}
}

/// First key declaring `use: "enc"`.
pub fn select_encryption_key(jwks: &Jwks) -> Result<&Jwk, JwksFetchError> {
	jwks.first_with_use(USE_ENCRYPTION).ok_or(JwksFetchError::NoEncryptionKey)
}

/// Encrypts `plaintext` to `jwk`; only RSA keys can be used.
pub fn encrypt_with_key(jwk: &Jwk, plaintext: &[u8]) -> Result<EncryptedToken> {
	let public_key = jwk.to_rsa_public_key().map_err(JwksFetchError::PublicKey)?;
	let header = JweHeader {
		alg: ALG_RSA_OAEP_256.into(),
		enc: ENC_A256GCM.into(),
		cty: "JWT".into(),
		kid: jwk.kid.clone(),
	};
	let protected =
		URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).map_err(EncryptError::Header)?);
	let cek = Aes256Gcm::generate_key(OsRng);
	let wrapped_key = public_key
		.encrypt(&mut OsRng, Oaep::new::<Sha256>(), cek.as_slice())
		.map_err(EncryptError::KeyWrap)?;
	let iv = Aes256Gcm::generate_nonce(&mut OsRng);
	let mut ciphertext = Aes256Gcm::new(&cek)
		.encrypt(&iv, Payload { msg: plaintext, aad: protected.as_bytes() })
		.map_err(|_| EncryptError::Seal)?;
	let tag = ciphertext.split_off(ciphertext.len() - GCM_TAG_LEN);

	Ok(EncryptedToken(format!(
		"{protected}.{}.{}.{}.{}",
		URL_SAFE_NO_PAD.encode(wrapped_key),
		URL_SAFE_NO_PAD.encode(iv),
		URL_SAFE_NO_PAD.encode(ciphertext),
		URL_SAFE_NO_PAD.encode(tag),
	)))
}
