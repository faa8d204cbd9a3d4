//! Compact JWT construction over a remote signer.
//!
//! [`TokenMinter`] computes every time-based claim from the mint instant, serializes the header
//! and payload, and asks the [`KeySigner`] for a detached signature over `header.payload`. The
//! signer answers in DER; JOSE wants the fixed 64-byte `r || s` form, so the signature is
//! re-encoded before it is appended.

// std
use std::time::Duration as StdDuration;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::ecdsa::Signature;
use serde::de::DeserializeOwned;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::{ClientId, KeyId, ScopeSet},
	config::IssuerConfig,
	jwks::Jwk,
	obs,
	signer::{KeySigner, SignerError},
};

/// Lifetime of `client_credentials` access tokens.
pub const ACCESS_TOKEN_TTL: Duration = Duration::hours(1);
/// Lifetime of tokens minted by the token-exchange endpoint.
pub const EXCHANGE_TOKEN_TTL: Duration = Duration::seconds(180);
/// The only signing algorithm produced or accepted.
pub const ALG_ES256: &str = "ES256";

/// JOSE header of a signed token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
	/// Signing algorithm.
	pub alg: String,
	/// Media type; always `JWT` when minted here.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub typ: Option<String>,
	/// RFC 7638 thumbprint of the signing key.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
}
impl JwtHeader {
	/// ES256 header, optionally bound to a key thumbprint.
	pub fn es256(kid: Option<String>) -> Self {
		Self { alg: ALG_ES256.into(), typ: Some("JWT".into()), kid }
	}
}

/// Claims carried by access tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
	/// Issuer resolved for the client.
	pub iss: String,
	/// Subject, set for exchanged tokens.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sub: Option<String>,
	/// Intended audience.
	pub aud: String,
	/// Issued-at (Unix seconds).
	pub iat: i64,
	/// Expiry (Unix seconds).
	pub exp: i64,
	/// Optional not-before (Unix seconds); access tokens minted here never set it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nbf: Option<i64>,
	/// Granted scopes.
	#[serde(default, skip_serializing_if = "ScopeSet::is_empty")]
	pub scope: ScopeSet,
	/// Client the token was issued to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_id: Option<ClientId>,
}

/// Claims carried by verifiable-credential JWTs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredentialClaims {
	/// Credential subject.
	pub sub: String,
	/// Issued-at (Unix seconds).
	pub iat: i64,
	/// Not-before (Unix seconds); equal to `iat`.
	pub nbf: i64,
	/// Credential issuer.
	pub iss: String,
	/// Unique token identifier.
	pub jti: String,
	/// Opaque verifiable-credential payload.
	pub vc: serde_json::Value,
}

/// Caller-controlled parts of an access token; time-based claims are always computed at mint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessTokenInput {
	/// `iss` claim.
	pub issuer: String,
	/// `aud` claim.
	pub audience: String,
	/// `scope` claim.
	pub scope: ScopeSet,
	/// `client_id` claim.
	pub client_id: Option<ClientId>,
	/// `sub` claim.
	pub subject: Option<String>,
	/// Token lifetime.
	pub lifetime: Duration,
}
impl AccessTokenInput {
	/// Creates an input with the default one-hour lifetime.
	pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
		Self {
			issuer: issuer.into(),
			audience: audience.into(),
			scope: ScopeSet::default(),
			client_id: None,
			subject: None,
			lifetime: ACCESS_TOKEN_TTL,
		}
	}

	/// Sets the granted scopes.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Sets the client the token is issued to.
	pub fn with_client_id(mut self, client_id: ClientId) -> Self {
		self.client_id = Some(client_id);

		self
	}

	/// Sets the subject.
	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = Some(subject.into());

		self
	}

	/// Overrides the lifetime.
	pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = lifetime;

		self
	}

	fn claims_at(&self, now: OffsetDateTime) -> AccessTokenClaims {
		AccessTokenClaims {
			iss: self.issuer.clone(),
			sub: self.subject.clone(),
			aud: self.audience.clone(),
			iat: now.unix_timestamp(),
			exp: (now + self.lifetime).unix_timestamp(),
			nbf: None,
			scope: self.scope.clone(),
			client_id: self.client_id.clone(),
		}
	}
}

/// Signed compact JWT (`header.payload.signature`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompactJwt(String);
impl CompactJwt {
	/// Wraps an already-serialized token.
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	/// Borrows the serialized token.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns the serialized token.
	pub fn into_string(self) -> String {
		self.0
	}

	/// Splits the token into its three segments.
	pub fn segments(&self) -> Option<(&str, &str, &str)> {
		let mut parts = self.0.split('.');
		let segments = (parts.next()?, parts.next()?, parts.next()?);

		if parts.next().is_some() { None } else { Some(segments) }
	}
}
impl AsRef<str> for CompactJwt {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for CompactJwt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CompactJwt(**redacted**)")
	}
}

/// Successful token endpoint body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Signed token.
	pub access_token: String,
	/// Always `Bearer`.
	pub token_type: String,
	/// Lifetime in seconds.
	pub expires_in: i64,
}
impl TokenResponse {
	/// Bearer response for `token` valid for `lifetime`.
	pub fn bearer(token: CompactJwt, lifetime: Duration) -> Self {
		Self {
			access_token: token.into_string(),
			token_type: "Bearer".into(),
			expires_in: lifetime.whole_seconds(),
		}
	}
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &"**redacted**")
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Default bound on resolving the `kid`; issuance continues without one past this point.
pub const KID_RESOLUTION_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// Mints ES256 tokens through a [`KeySigner`].
///
/// The `kid` is resolved through `get_public_key` on every mint, so a key re-pointed behind the
/// same [`KeyId`] is picked up by the next token. That lookup gets its own short timeout; a
/// failure there is logged and the token is minted without `kid`, because issuance must not
/// depend on the public half of the key. An optional deadline bounds each mint as a whole.
pub struct TokenMinter {
	signer: Arc<dyn KeySigner>,
	kid_timeout: StdDuration,
	deadline: Option<StdDuration>,
}
impl TokenMinter {
	/// Creates a minter over the shared signer with no overall deadline.
	pub fn new(signer: Arc<dyn KeySigner>) -> Self {
		Self { signer, kid_timeout: KID_RESOLUTION_TIMEOUT, deadline: None }
	}

	/// Creates a minter whose mints are bounded by the configured request timeout.
	pub fn from_config(config: &IssuerConfig, signer: Arc<dyn KeySigner>) -> Self {
		Self::new(signer).with_deadline(config.timeouts.request)
	}

	/// Overrides how long the `kid` lookup may take before minting proceeds without it.
	pub fn with_kid_timeout(mut self, timeout: StdDuration) -> Self {
		self.kid_timeout = timeout;

		self
	}

	/// Bounds every mint, `kid` lookup and signature included, by `deadline`.
	pub fn with_deadline(mut self, deadline: StdDuration) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Mints an access token at the current instant.
	pub async fn mint(&self, input: &AccessTokenInput, key: &KeyId) -> Result<CompactJwt> {
		self.mint_at(input, key, OffsetDateTime::now_utc()).await
	}

	/// Mints an access token as of `now`.
	pub async fn mint_at(
		&self,
		input: &AccessTokenInput,
		key: &KeyId,
		now: OffsetDateTime,
	) -> Result<CompactJwt> {
		self.sign_compact(key, &input.claims_at(now)).await
	}

	/// Mints a verifiable-credential JWT for `subject`.
	pub async fn mint_credential(
		&self,
		key: &KeyId,
		issuer: impl Into<String>,
		subject: impl Into<String>,
		vc: serde_json::Value,
	) -> Result<CompactJwt> {
		let now = OffsetDateTime::now_utc().unix_timestamp();
		let claims = CredentialClaims {
			sub: subject.into(),
			iat: now,
			nbf: now,
			iss: issuer.into(),
			jti: Uuid::new_v4().to_string(),
			vc,
		};

		self.sign_compact(key, &claims).await
	}

	/// Signs arbitrary claims as an ES256 compact JWT.
	pub async fn sign_compact<C>(&self, key: &KeyId, claims: &C) -> Result<CompactJwt>
	where
		C: Serialize,
	{
		let Some(deadline) = self.deadline else {
			return self.sign_unbounded(key, claims).await;
		};

		tokio::time::timeout(deadline, self.sign_unbounded(key, claims)).await.unwrap_or_else(|_| {
			Err(AuthError::server(
				"Failed to sign token",
				SignerError::DeadlineExceeded { operation: "mint", budget: deadline },
			))
		})
	}

	async fn sign_unbounded<C>(&self, key: &KeyId, claims: &C) -> Result<CompactJwt>
	where
		C: Serialize,
	{
		let header = JwtHeader::es256(self.kid(key).await);
		let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(claims)?);
		let der = self
			.signer
			.sign(key, signing_input.as_bytes())
			.await
			.map_err(|e| AuthError::server("Failed to sign token", e))?;
		let signature = Signature::from_der(der.as_ref()).map_err(|e| {
			AuthError::server_message(format!("Signer returned a malformed signature: {e}"))
		})?;

		Ok(CompactJwt(format!(
			"{signing_input}.{}",
			URL_SAFE_NO_PAD.encode(signature.to_bytes())
		)))
	}

	async fn kid(&self, key: &KeyId) -> Option<String> {
		let budget = self.kid_timeout;

		tokio::time::timeout(budget, self.resolve_kid(key))
			.await
			.unwrap_or_else(|_| {
				Err(AuthError::server(
					"Failed to fetch public key",
					SignerError::DeadlineExceeded { operation: "get_public_key", budget },
				))
			})
			.inspect_err(|e| obs::log_kid_unavailable(key, e))
			.ok()
	}

	async fn resolve_kid(&self, key: &KeyId) -> Result<String> {
		let der = self
			.signer
			.public_key(key)
			.await
			.map_err(|e| AuthError::server("Failed to fetch public key", e))?;

		Jwk::from_spki_der(der.as_ref())
			.and_then(|jwk| jwk.thumbprint())
			.map_err(|e| AuthError::server("Failed to compute key thumbprint", e))
	}
}
impl Debug for TokenMinter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenMinter")
			.field("kid_timeout", &self.kid_timeout)
			.field("deadline", &self.deadline)
			.finish_non_exhaustive()
	}
}

/// Serializes `value` as JSON and base64url-encodes it without padding.
pub fn encode_segment<T>(value: &T) -> Result<String>
where
	T: ?Sized + Serialize,
{
	let json =
		serde_json::to_vec(value).map_err(|e| AuthError::server("Failed to encode token", e))?;

	Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes a base64url JSON segment; `None` when either layer is malformed.
pub fn decode_segment<T>(segment: &str) -> Option<T>
where
	T: DeserializeOwned,
{
	let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;

	serde_json::from_slice(&bytes).ok()
}
