//! `client_credentials` issuance: validate → resolve issuer → sign → respond.
//!
//! Each request walks `RECEIVED → VALIDATED → ISSUER_RESOLVED → SIGNED → RETURNED`; any step may
//! end in `FAILED`. Only the signer retries, inside `SIGNED`.

// self
use crate::{
	_prelude::*,
	api::{ApiRequest, ApiResponse},
	auth::KeyId,
	config::IssuerConfig,
	jwt::{ACCESS_TOKEN_TTL, AccessTokenInput, TokenMinter, TokenResponse},
	obs::{self, Operation, OperationSpan, Outcome},
	registry::ClientRegistry,
	request,
};

/// Token lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenState {
	/// Request accepted for processing.
	Received,
	/// Request passed validation.
	Validated,
	/// Client resolved to a trusted issuer.
	IssuerResolved,
	/// Token signed.
	Signed,
	/// Response produced.
	Returned,
	/// Terminal failure.
	Failed,
}
impl TokenState {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenState::Received => "RECEIVED",
			TokenState::Validated => "VALIDATED",
			TokenState::IssuerResolved => "ISSUER_RESOLVED",
			TokenState::Signed => "SIGNED",
			TokenState::Returned => "RETURNED",
			TokenState::Failed => "FAILED",
		}
	}

	pub(crate) fn enter(self, operation: Operation) {
		obs::log_transition(operation, self.as_str());
	}
}
impl Display for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Serves `POST /token` for the `client_credentials` grant.
#[derive(Clone)]
pub struct TokenIssuer {
	registry: Arc<dyn ClientRegistry>,
	minter: Arc<TokenMinter>,
	key_id: KeyId,
	audience: String,
}
impl TokenIssuer {
	/// Creates an issuer from explicitly constructed collaborators.
	pub fn new(
		registry: Arc<dyn ClientRegistry>,
		minter: Arc<TokenMinter>,
		key_id: KeyId,
		audience: impl Into<String>,
	) -> Self {
		Self { registry, minter, key_id, audience: audience.into() }
	}

	/// Creates an issuer using the configured signing key and audience.
	pub fn from_config(
		config: &IssuerConfig,
		registry: Arc<dyn ClientRegistry>,
		minter: Arc<TokenMinter>,
	) -> Self {
		Self::new(registry, minter, config.signing_key_id.clone(), config.audience.clone())
	}

	/// Validates the request, authenticates the client, and mints a one-hour access token.
	pub async fn issue(&self, api_request: &ApiRequest) -> Result<TokenResponse> {
		const OPERATION: Operation = Operation::ClientCredentials;

		let span = OperationSpan::new(OPERATION, "issue");

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span
			.instrument(async move {
				TokenState::Received.enter(OPERATION);

				let request = request::validate_token_request(
					api_request.body.as_deref(),
					&api_request.headers,
				)?;

				TokenState::Validated.enter(OPERATION);

				let issuer = self.registry.resolve_issuer(&request.credentials).await?;

				TokenState::IssuerResolved.enter(OPERATION);

				let input = AccessTokenInput::new(issuer.issuer_url, self.audience.as_str())
					.with_scope(request.scope)
					.with_client_id(request.credentials.client_id);
				let token = self.minter.mint(&input, &self.key_id).await?;

				TokenState::Signed.enter(OPERATION);

				Ok(TokenResponse::bearer(token, ACCESS_TOKEN_TTL))
			})
			.await;

		match &result {
			Ok(_) => TokenState::Returned.enter(OPERATION),
			Err(_) => TokenState::Failed.enter(OPERATION),
		}

		obs::finish(OPERATION, &result);

		result
	}

	/// Runs [`TokenIssuer::issue`] and frames the result for the gateway.
	pub async fn handle(&self, request: &ApiRequest) -> ApiResponse {
		ApiResponse::from_result(&self.issue(request).await)
	}
}
impl Debug for TokenIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenIssuer")
			.field("key_id", &self.key_id)
			.field("audience", &self.audience)
			.finish_non_exhaustive()
	}
}
