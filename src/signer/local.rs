//! In-process P-256 signer for development and tests.

// crates.io
use p256::{
	PublicKey,
	ecdsa::{Signature, SigningKey, signature::Signer},
	pkcs8::EncodePublicKey,
};
// self
use crate::{
	_prelude::*,
	auth::KeyId,
	signer::{DerSignature, KeySigner, PublicKeyDer, SignerError, SignerFuture},
};

/// Signer holding P-256 keys in memory.
///
/// Mirrors the remote contract exactly: DER signatures and SPKI public keys.
#[derive(Clone, Default)]
pub struct LocalSigner {
	keys: HashMap<KeyId, SigningKey>,
}
impl LocalSigner {
	/// Registers a key from a raw 32-byte P-256 scalar.
	pub fn with_key_bytes(mut self, key: KeyId, scalar: &[u8]) -> Result<Self, SignerError> {
		let signing_key = SigningKey::from_slice(scalar)
			.map_err(|e| SignerError::InvalidKey { reason: e.to_string() })?;

		self.keys.insert(key, signing_key);

		Ok(self)
	}

	/// Registers a freshly generated key.
	pub fn with_generated_key(mut self, key: KeyId) -> Self {
		let signing_key = loop {
			let scalar: [u8; 32] = rand::random();

			// Zero and out-of-range scalars are astronomically rare; draw again.
			if let Ok(signing_key) = SigningKey::from_slice(&scalar) {
				break signing_key;
			}
		};

		self.keys.insert(key, signing_key);

		self
	}

	fn key(&self, key: &KeyId) -> Result<&SigningKey, SignerError> {
		self.keys.get(key).ok_or_else(|| SignerError::KeyUnavailable {
			kind: "NotFoundException".into(),
			message: format!("key {key} is not registered"),
		})
	}
}
impl KeySigner for LocalSigner {
	fn sign<'a>(&'a self, key: &'a KeyId, message: &'a [u8]) -> SignerFuture<'a, DerSignature> {
		Box::pin(async move {
			let signature: Signature = self.key(key)?.sign(message);

			Ok(DerSignature(signature.to_der().as_bytes().to_vec()))
		})
	}

	fn public_key<'a>(&'a self, key: &'a KeyId) -> SignerFuture<'a, PublicKeyDer> {
		Box::pin(async move {
			let public_key = PublicKey::from(*self.key(key)?.verifying_key());
			let der = public_key
				.to_public_key_der()
				.map_err(|e| SignerError::InvalidKey { reason: e.to_string() })?;

			Ok(PublicKeyDer(der.as_bytes().to_vec()))
		})
	}
}
impl Debug for LocalSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LocalSigner").field("keys", &self.keys.keys().collect::<Vec<_>>()).finish()
	}
}
