// self
use crate::{
	_prelude::*,
	obs::{Operation, Outcome},
};

/// Counter incremented for every operation outcome.
pub const OPERATION_TOTAL: &str = "oauth2_issuer_operation_total";
/// Counter incremented for every failed operation, split by error category and code.
pub const FAILURE_TOTAL: &str = "oauth2_issuer_failure_total";
/// Counter incremented for every retried signer call.
pub const SIGNER_RETRY_TOTAL: &str = "oauth2_issuer_signer_retry_total";

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_outcome(operation: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			OPERATION_TOTAL,
			"operation" => operation.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}

/// Records a failed operation; `category` separates caller mistakes from alert-worthy failures.
pub fn record_failure(operation: Operation, error: &AuthError) {
	#[cfg(feature = "metrics")]
	{
		let [(_, operation), (_, category), (_, code)] = failure_labels(operation, error);

		metrics::counter!(
			FAILURE_TOTAL,
			"operation" => operation,
			"category" => category,
			"code" => code
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, error);
	}
}

/// Records that a signer call is about to be retried.
pub fn record_signer_retry(call: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(SIGNER_RETRY_TOTAL, "call" => call).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = call;
	}
}

/// Label set attached to [`FAILURE_TOTAL`].
pub fn failure_labels(operation: Operation, error: &AuthError) -> [(&'static str, &'static str); 3] {
	[
		("operation", operation.as_str()),
		("category", error.category().as_str()),
		("code", error.code()),
	]
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn failure_labels_separate_server_errors() {
		let server = failure_labels(
			Operation::ClientCredentials,
			&AuthError::server_message("Failed to sign token"),
		);
		let client = failure_labels(Operation::TokenExchange, &AuthError::InvalidClient);

		assert_eq!(server, [
			("operation", "client_credentials"),
			("category", "SERVER_ERROR"),
			("code", "INTERNAL_SERVER_ERROR"),
		]);
		assert_eq!(client[1], ("category", "CLIENT_ERROR"));
		assert_eq!(client[2], ("code", "INVALID_CLIENT"));
	}

	#[test]
	fn recorders_are_noops_without_global_recorder() {
		record_outcome(Operation::ClientCredentials, Outcome::Failure);
		record_failure(Operation::JwksPublish, &AuthError::server_message("Failed to fetch public key"));
		record_signer_retry("sign");
	}
}
