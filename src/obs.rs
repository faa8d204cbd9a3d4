//! Observability helpers for issuer operations.
//!
//! # Feature Flags
//!
//! - `tracing` (default) emits structured spans named `oauth2_issuer.operation` with the
//!   `operation` and `stage` fields, plus failure, lifecycle, and retry events.
//! - `metrics` increments the `oauth2_issuer_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`. Failures also increment
//!   `oauth2_issuer_failure_total` labeled by `operation`, `category`, and `code`, and each
//!   retried signer call increments `oauth2_issuer_signer_retry_total{call}`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Public operations observed by the issuer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// `client_credentials` token issuance.
	ClientCredentials,
	/// Token exchange on the verification endpoint.
	TokenExchange,
	/// JWKS publishing.
	JwksPublish,
	/// JWE construction for downstream services.
	TokenEncrypt,
	/// Presented-token verification.
	TokenVerify,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::ClientCredentials => "client_credentials",
			Operation::TokenExchange => "token_exchange",
			Operation::JwksPublish => "jwks_publish",
			Operation::TokenEncrypt => "token_encrypt",
			Operation::TokenVerify => "token_verify",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records the outcome of `result` and logs the failure, if any, exactly once.
pub fn finish<T>(operation: Operation, result: &Result<T>) {
	match result {
		Ok(_) => record_outcome(operation, Outcome::Success),
		Err(e) => {
			record_outcome(operation, Outcome::Failure);
			record_failure(operation, e);
			log_failure(operation, e);
		},
	}
}

/// Renders an error and its `source` chain on one line.
pub(crate) fn error_chain(e: &dyn StdError) -> String {
	let mut rendered = e.to_string();
	let mut source = e.source();

	while let Some(cause) = source {
		rendered.push_str(": ");
		rendered.push_str(&cause.to_string());

		source = cause.source();
	}

	rendered
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn error_chain_includes_sources() {
		let err = AuthError::server("Failed to sign token", std::io::Error::other("throttled"));

		assert_eq!(error_chain(&err), "Failed to sign token: throttled");
	}

	#[test]
	fn labels_are_stable() {
		assert_eq!(Operation::JwksPublish.to_string(), "jwks_publish");
		assert_eq!(Outcome::Failure.as_str(), "failure");
	}
}
