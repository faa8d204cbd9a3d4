//! Remote asymmetric signing contracts.
//!
//! The issuer never holds private key material. A [`KeySigner`] produces detached ECDSA
//! signatures (DER encoded, as KMS returns them) over a JWT signing input and exposes the
//! matching SPKI public key for JWKS publishing.

pub mod kms;
pub mod local;
pub mod retry;
pub mod sigv4;

pub use kms::KmsSigner;
pub use local::LocalSigner;
pub use retry::RetryPolicy;
pub use sigv4::{AwsCredentials, RequestSigner};

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, auth::KeyId};

/// Future returned by [`KeySigner`] operations.
pub type SignerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SignerError>> + 'a + Send>>;

/// Remote signer contract.
///
/// Implementations are shared across concurrent requests; signing must not mutate local state.
pub trait KeySigner
where
	Self: Send + Sync,
{
	/// Signs `message` with the key named by `key`, returning a DER-encoded ECDSA signature.
	fn sign<'a>(&'a self, key: &'a KeyId, message: &'a [u8]) -> SignerFuture<'a, DerSignature>;

	/// Returns the DER (SubjectPublicKeyInfo) public key for `key`.
	fn public_key<'a>(&'a self, key: &'a KeyId) -> SignerFuture<'a, PublicKeyDer>;
}

/// DER-encoded ECDSA signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerSignature(pub Vec<u8>);
impl AsRef<[u8]> for DerSignature {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

/// DER-encoded SubjectPublicKeyInfo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyDer(pub Vec<u8>);
impl AsRef<[u8]> for PublicKeyDer {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

/// Failures reported by [`KeySigner`] implementations.
#[derive(Debug, ThisError)]
pub enum SignerError {
	/// The call did not complete within the configured timeouts.
	#[error("Signer call timed out.")]
	Timeout(#[source] ReqwestError),
	/// Connection-level failure before a response was received.
	#[error("Network error occurred while calling the signer.")]
	Transport(#[source] ReqwestError),
	/// The signer rejected the call because of request rate.
	#[error("Signer throttled the request: {message}.")]
	Throttled {
		/// Upstream message.
		message: String,
	},
	/// The caller lacks permission to use the key.
	#[error("Signer denied access: {message}.")]
	AccessDenied {
		/// Upstream message.
		message: String,
	},
	/// The key is missing, disabled, pending deletion, or not a signing key.
	#[error("Signing key unavailable ({kind}): {message}.")]
	KeyUnavailable {
		/// Upstream exception type.
		kind: String,
		/// Upstream message.
		message: String,
	},
	/// Upstream returned an unexpected status.
	#[error("Signer returned status {status}: {message}.")]
	Upstream {
		/// HTTP status code.
		status: u16,
		/// Upstream message or body preview.
		message: String,
	},
	/// The call, retries included, did not finish within its time budget.
	#[error("Signer call `{operation}` exceeded its {budget:?} budget.")]
	DeadlineExceeded {
		/// Signer operation that ran out of time.
		operation: &'static str,
		/// Budget that was exhausted.
		budget: StdDuration,
	},
	/// Upstream response could not be interpreted.
	#[error("Signer response is malformed: {reason}.")]
	MalformedResponse {
		/// Parse failure summary.
		reason: String,
	},
	/// The outbound request could not be authenticated.
	#[error("Signer request could not be signed: {reason}.")]
	RequestSigning {
		/// Signing failure summary.
		reason: String,
	},
	/// Local key material is unusable.
	#[error("Signing key is invalid: {reason}.")]
	InvalidKey {
		/// Validation failure summary.
		reason: String,
	},
}
impl SignerError {
	/// Returns true when another attempt may succeed.
	///
	/// Authorization and key-state failures are terminal.
	pub fn is_retryable(&self) -> bool {
		match self {
			SignerError::Timeout(_) | SignerError::Transport(_) | SignerError::Throttled { .. } =>
				true,
			SignerError::Upstream { status, .. } => *status >= 500,
			SignerError::AccessDenied { .. }
			| SignerError::DeadlineExceeded { .. }
			| SignerError::KeyUnavailable { .. }
			| SignerError::MalformedResponse { .. }
			| SignerError::RequestSigning { .. }
			| SignerError::InvalidKey { .. } => false,
		}
	}
}
impl From<ReqwestError> for SignerError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout(e) } else { Self::Transport(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn authorization_failures_are_terminal() {
		assert!(!SignerError::AccessDenied { message: "no".into() }.is_retryable());
		assert!(
			!SignerError::KeyUnavailable { kind: "DisabledException".into(), message: "off".into() }
				.is_retryable()
		);
		assert!(SignerError::Throttled { message: "slow down".into() }.is_retryable());
		assert!(SignerError::Upstream { status: 503, message: "busy".into() }.is_retryable());
		assert!(!SignerError::Upstream { status: 400, message: "bad".into() }.is_retryable());
		assert!(
			!SignerError::DeadlineExceeded { operation: "sign", budget: StdDuration::from_secs(29) }
				.is_retryable()
		);
	}
}
