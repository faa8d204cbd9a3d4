//! Issuer-level error taxonomy shared by validation, issuance, publishing, and verification.
//!
//! Every public operation returns [`AuthError`]. Collaborator failures (signer, registry, JWKS
//! retrieval) are converted at the call site so the caller-facing body never echoes internals,
//! while the original error stays reachable through [`std::error::Error::source`] for logging.

// self
use crate::_prelude::*;

/// Issuer-wide result type alias returning [`AuthError`] by default.
pub type Result<T, E = AuthError> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Caller-facing description returned for every server-side failure.
pub const SERVER_ERROR_DESCRIPTION: &str = "Server Error";

/// Whether a failure was caused by the caller or by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
	/// Deterministic rejection of the caller's input; safe to return verbatim.
	ClientError,
	/// Internal or upstream failure; alert-worthy and never echoed to the caller.
	ServerError,
}
impl ErrorCategory {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorCategory::ClientError => "CLIENT_ERROR",
			ErrorCategory::ServerError => "SERVER_ERROR",
		}
	}
}
impl Display for ErrorCategory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// The request is missing a required part or carries an unsupported value.
	#[error("{description}")]
	InvalidRequest {
		/// Caller-facing description (e.g. `Missing scope`).
		description: String,
	},
	/// `grant_type` is absent or not the grant this endpoint serves.
	#[error("Invalid grant type or grant type not specified")]
	InvalidGrant,
	/// `Authorization` header is absent, not Basic, or not `client_id:client_secret`.
	#[error("Invalid authorization header")]
	InvalidAuthorizationHeader,
	/// Credentials decoded correctly but are not registered.
	#[error("Supplied client credentials not recognised")]
	InvalidClient,
	/// A presented token failed structural, signature, or claim checks.
	#[error("Invalid token: {reason}")]
	InvalidToken {
		/// Caller-facing reason.
		reason: String,
	},
	/// Signer, registry, JWKS, or encryption failure.
	#[error("{message}")]
	Server {
		/// Internal message; distinguishes failure points and is asserted on by tests.
		message: String,
		/// Underlying collaborator failure, if any.
		#[source]
		source: Option<BoxError>,
	},
}
impl AuthError {
	/// Builds an [`AuthError::InvalidRequest`] with the provided description.
	pub fn invalid_request(description: impl Into<String>) -> Self {
		Self::InvalidRequest { description: description.into() }
	}

	/// Builds an [`AuthError::InvalidToken`] with the provided reason.
	pub fn invalid_token(reason: impl Into<String>) -> Self {
		Self::InvalidToken { reason: reason.into() }
	}

	/// Builds an [`AuthError::Server`] that keeps `source` for internal logging.
	pub fn server(
		message: impl Into<String>,
		source: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Server { message: message.into(), source: Some(Box::new(source)) }
	}

	/// Builds an [`AuthError::Server`] without an underlying cause.
	pub fn server_message(message: impl Into<String>) -> Self {
		Self::Server { message: message.into(), source: None }
	}

	/// Stable machine-readable code for the error kind.
	pub fn code(&self) -> &'static str {
		match self {
			AuthError::InvalidRequest { .. } => "INVALID_REQUEST",
			AuthError::InvalidGrant => "INVALID_GRANT",
			AuthError::InvalidAuthorizationHeader => "INVALID_AUTHORIZATION_HEADER",
			AuthError::InvalidClient => "INVALID_CLIENT",
			AuthError::InvalidToken { .. } => "INVALID_TOKEN",
			AuthError::Server { .. } => "INTERNAL_SERVER_ERROR",
		}
	}

	/// Category used to pick the HTTP status and log severity.
	pub fn category(&self) -> ErrorCategory {
		match self {
			AuthError::Server { .. } => ErrorCategory::ServerError,
			_ => ErrorCategory::ClientError,
		}
	}

	/// HTTP status code for the error response.
	pub fn status(&self) -> u16 {
		match self {
			AuthError::InvalidToken { .. } => 401,
			AuthError::Server { .. } => 500,
			_ => 400,
		}
	}

	/// Value of the OAuth `error` response member.
	pub fn oauth_error(&self) -> &'static str {
		match self {
			AuthError::InvalidRequest { .. } | AuthError::InvalidAuthorizationHeader =>
				"invalid_request",
			AuthError::InvalidGrant => "invalid_grant",
			AuthError::InvalidClient => "invalid_client",
			AuthError::InvalidToken { .. } => "invalid_token",
			AuthError::Server { .. } => "server_error",
		}
	}

	/// Value of the OAuth `error_description` response member.
	///
	/// Server errors collapse to [`SERVER_ERROR_DESCRIPTION`] so signer or registry internals
	/// never reach the caller.
	pub fn description(&self) -> String {
		match self {
			AuthError::Server { .. } => SERVER_ERROR_DESCRIPTION.into(),
			other => other.to_string(),
		}
	}

	/// Caller-facing response body.
	pub fn to_body(&self) -> ErrorBody {
		ErrorBody { error: self.oauth_error().into(), error_description: self.description() }
	}

	/// Returns true for [`ErrorCategory::ServerError`] failures.
	pub fn is_server_error(&self) -> bool {
		matches!(self.category(), ErrorCategory::ServerError)
	}
}

/// OAuth-style error response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// OAuth `error` code.
	pub error: String,
	/// Human-readable description.
	pub error_description: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn client_errors_are_returned_verbatim() {
		let err = AuthError::invalid_request("Missing scope");

		assert_eq!(err.code(), "INVALID_REQUEST");
		assert_eq!(err.category(), ErrorCategory::ClientError);
		assert_eq!(err.status(), 400);
		assert_eq!(
			err.to_body(),
			ErrorBody { error: "invalid_request".into(), error_description: "Missing scope".into() }
		);
		assert_eq!(
			AuthError::InvalidGrant.description(),
			"Invalid grant type or grant type not specified"
		);
		assert_eq!(AuthError::InvalidClient.oauth_error(), "invalid_client");
	}

	#[test]
	fn server_errors_hide_their_cause() {
		let cause = std::io::Error::other("kms throttled: arn:aws:kms:key/123");
		let err = AuthError::server("Failed to sign token", cause);

		assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
		assert!(err.is_server_error());
		assert_eq!(err.status(), 500);
		assert_eq!(
			err.to_body(),
			ErrorBody { error: "server_error".into(), error_description: "Server Error".into() }
		);
		assert_eq!(err.to_string(), "Failed to sign token");

		let source = StdError::source(&err).expect("Server error should keep its cause.");

		assert!(source.to_string().contains("kms throttled"));
	}

	#[test]
	fn category_labels_are_stable() {
		assert_eq!(ErrorCategory::ClientError.to_string(), "CLIENT_ERROR");
		assert_eq!(
			serde_json::to_string(&ErrorCategory::ServerError)
				.expect("Category should serialize to JSON."),
			"\"SERVER_ERROR\""
		);
	}
}
