//! Token request parsing and validation.
//!
//! Validation is pure and order-sensitive. The first failing check wins, so a request that is
//! wrong in several ways always reports the same error:
//!
//! - issuance: body → `grant_type` → `scope` → `Authorization` header;
//! - exchange: body → `grant_type` (when present) → `subject_token` → `scope` presence →
//!   `scope` allow-list.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	api::Headers,
	auth::{ClientCredentials, ScopeSet},
};

/// Description reported when the gateway delivered no body.
pub const MISSING_BODY: &str = "Missing request body";
/// Description reported for an absent or empty `subject_token`.
pub const MISSING_SUBJECT_TOKEN: &str = "Missing subject_token";
/// Description reported for an absent or empty `scope`.
pub const MISSING_SCOPE: &str = "Missing scope";
/// Description reported for a scope outside the allow-list.
pub const UNSUPPORTED_SCOPE: &str = "Unsupported scope";
/// Description reported for a scope that is present but not a valid scope list.
pub const INVALID_SCOPE: &str = "Invalid scope";

const AUTHORIZATION: &str = "authorization";

/// Grants served by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
	/// Client Credentials grant (RFC 6749 section 4.4).
	#[serde(rename = "client_credentials")]
	ClientCredentials,
	/// Token Exchange grant (RFC 8693).
	#[serde(rename = "urn:ietf:params:oauth:grant-type:token-exchange")]
	TokenExchange,
}
impl GrantType {
	/// Returns the wire identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::ClientCredentials => "client_credentials",
			GrantType::TokenExchange => "urn:ietf:params:oauth:grant-type:token-exchange",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Validated `client_credentials` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
	/// Always [`GrantType::ClientCredentials`].
	pub grant_type: GrantType,
	/// Requested scopes; empty when the request carried none.
	pub scope: ScopeSet,
	/// Credentials decoded from the `Authorization` header.
	pub credentials: ClientCredentials,
}

/// Validated token-exchange request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenExchangeRequest {
	/// Token presented by the caller; becomes the `sub` of the minted token.
	pub subject_token: String,
	/// Requested scopes; a non-empty subset of the allow-list.
	pub scope: ScopeSet,
}

/// Validates a `client_credentials` token request.
pub fn validate_token_request(body: Option<&str>, headers: &Headers) -> Result<TokenRequest> {
	let form = Form::parse(body)?;

	if form.get("grant_type") != Some(GrantType::ClientCredentials.as_str()) {
		return Err(AuthError::InvalidGrant);
	}

	let scope = match form.get("scope") {
		Some(raw) =>
			ScopeSet::from_str(raw).map_err(|_| AuthError::invalid_request(INVALID_SCOPE))?,
		None => ScopeSet::default(),
	};
	let header = headers.get(AUTHORIZATION).ok_or(AuthError::InvalidAuthorizationHeader)?;
	let credentials = ClientCredentials::from_authorization_header(header)?;

	Ok(TokenRequest { grant_type: GrantType::ClientCredentials, scope, credentials })
}

/// Validates a token-exchange request against the `allowed` scopes.
///
/// `grant_type` is optional on this endpoint, but when present it must name the token-exchange
/// grant.
pub fn validate_exchange_request(
	body: Option<&str>,
	allowed: &ScopeSet,
) -> Result<TokenExchangeRequest> {
	let form = Form::parse(body)?;

	if form.get("grant_type").is_some_and(|grant| grant != GrantType::TokenExchange.as_str()) {
		return Err(AuthError::InvalidGrant);
	}

	let subject_token = form
		.non_empty("subject_token")
		.ok_or_else(|| AuthError::invalid_request(MISSING_SUBJECT_TOKEN))?;
	let raw_scope = form.non_empty("scope").ok_or_else(|| AuthError::invalid_request(MISSING_SCOPE))?;
	let scope = ScopeSet::from_str(raw_scope)
		.ok()
		.filter(|scope| scope.is_subset_of(allowed))
		.ok_or_else(|| AuthError::invalid_request(UNSUPPORTED_SCOPE))?;

	Ok(TokenExchangeRequest { subject_token: subject_token.to_owned(), scope })
}

/// Decoded `application/x-www-form-urlencoded` body; the first occurrence of a key wins.
struct Form(Vec<(String, String)>);
impl Form {
	fn parse(body: Option<&str>) -> Result<Self> {
		let body = body
			.filter(|body| !body.trim().is_empty())
			.ok_or_else(|| AuthError::invalid_request(MISSING_BODY))?;

		Ok(Self(form_urlencoded::parse(body.as_bytes()).into_owned().collect()))
	}

	fn get(&self, key: &str) -> Option<&str> {
		self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	fn non_empty(&self, key: &str) -> Option<&str> {
		self.get(key).map(str::trim).filter(|value| !value.is_empty())
	}
}
