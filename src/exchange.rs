//! Token exchange for the verification endpoint.

// self
use crate::{
	_prelude::*,
	api::{ApiRequest, ApiResponse},
	auth::{KeyId, ScopeSet},
	config::IssuerConfig,
	issuer::TokenState,
	jwt::{AccessTokenInput, EXCHANGE_TOKEN_TTL, TokenMinter, TokenResponse},
	obs::{self, Operation, OperationSpan, Outcome},
	request,
};

/// Exchanges a `subject_token` for a short-lived access token carrying an allow-listed scope.
#[derive(Clone)]
pub struct TokenExchange {
	minter: Arc<TokenMinter>,
	key_id: KeyId,
	issuer: String,
	audience: String,
	allowed_scopes: ScopeSet,
}
impl TokenExchange {
	/// Creates an exchange from explicitly constructed collaborators.
	pub fn new(
		minter: Arc<TokenMinter>,
		key_id: KeyId,
		issuer: impl Into<String>,
		audience: impl Into<String>,
		allowed_scopes: ScopeSet,
	) -> Self {
		Self { minter, key_id, issuer: issuer.into(), audience: audience.into(), allowed_scopes }
	}

	/// Creates an exchange from process configuration.
	pub fn from_config(config: &IssuerConfig, minter: Arc<TokenMinter>) -> Self {
		Self::new(
			minter,
			config.signing_key_id.clone(),
			config.issuer.clone(),
			config.audience.clone(),
			config.exchange_scopes.clone(),
		)
	}

	/// Validates the form body and mints a 180-second token with `sub = subject_token`.
	pub async fn issue(&self, body: Option<&str>) -> Result<TokenResponse> {
		const OPERATION: Operation = Operation::TokenExchange;

		let span = OperationSpan::new(OPERATION, "issue");

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span
			.instrument(async move {
				TokenState::Received.enter(OPERATION);

				let request = request::validate_exchange_request(body, &self.allowed_scopes)?;

				TokenState::Validated.enter(OPERATION);

				let input = AccessTokenInput::new(self.issuer.as_str(), self.audience.as_str())
					.with_subject(request.subject_token)
					.with_scope(request.scope)
					.with_lifetime(EXCHANGE_TOKEN_TTL);
				let token = self.minter.mint(&input, &self.key_id).await?;

				TokenState::Signed.enter(OPERATION);

				Ok(TokenResponse::bearer(token, EXCHANGE_TOKEN_TTL))
			})
			.await;

		match &result {
			Ok(_) => TokenState::Returned.enter(OPERATION),
			Err(_) => TokenState::Failed.enter(OPERATION),
		}

		obs::finish(OPERATION, &result);

		result
	}

	/// Runs [`TokenExchange::issue`] and frames the result for the gateway.
	pub async fn handle(&self, request: &ApiRequest) -> ApiResponse {
		ApiResponse::from_result(&self.issue(request.body.as_deref()).await)
	}
}
impl Debug for TokenExchange {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenExchange")
			.field("key_id", &self.key_id)
			.field("issuer", &self.issuer)
			.field("allowed_scopes", &self.allowed_scopes)
			.finish_non_exhaustive()
	}
}
