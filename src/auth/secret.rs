//! Client secrets as presented in Basic credentials.
//!
//! A secret is only ever compared through its salted SHA-256 digest; the raw value is not
//! serializable and is redacted in every formatter.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Client secret presented by the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret(String);
impl ClientSecret {
	/// Wraps a presented secret.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw secret. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `sha256(secret || salt)`, the form registries store.
	pub fn salted_digest(&self, salt: &str) -> [u8; 32] {
		let mut hasher = Sha256::new();

		hasher.update(self.0.as_bytes());
		hasher.update(salt.as_bytes());

		hasher.finalize().into()
	}

	/// Base64 of [`Self::salted_digest`].
	pub fn encoded_digest(&self, salt: &str) -> String {
		STANDARD.encode(self.salted_digest(salt))
	}

	/// Returns true when this secret hashes with `salt` to the base64 digest `stored`.
	///
	/// The comparison touches every byte regardless of where the first mismatch is; an
	/// undecodable `stored` value never matches.
	pub fn matches_digest(&self, salt: &str, stored: &str) -> bool {
		let Ok(stored) = STANDARD.decode(stored) else {
			return false;
		};
		let presented = self.salted_digest(salt);

		stored.len() == presented.len()
			&& stored.iter().zip(presented.iter()).fold(0, |acc, (a, b)| acc | (a ^ b)) == 0
	}
}
impl Debug for ClientSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ClientSecret(**redacted**)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn digest_uses_secret_then_salt() {
		let secret = ClientSecret::new("secret");

		// base64(sha256("secretsalt"))
		assert_eq!(secret.encoded_digest("salt"), "+E+iFJ27Yu1ODPH1UNKUmzOmUT06dwfghQJRHHnMsO4=");
	}

	#[test]
	fn digest_comparison_rejects_near_misses() {
		let secret = ClientSecret::new("secret");
		let stored = secret.encoded_digest("salt");

		assert!(secret.matches_digest("salt", &stored));
		assert!(!secret.matches_digest("pepper", &stored));
		assert!(!ClientSecret::new("secrets").matches_digest("salt", &stored));
		assert!(!secret.matches_digest("salt", "not base64!"));
		assert!(!secret.matches_digest("salt", &stored[..stored.len() - 4]));
	}

	#[test]
	fn secret_is_redacted() {
		let secret = ClientSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "ClientSecret(**redacted**)");
		assert_eq!(secret.expose(), "super-secret");
	}
}
