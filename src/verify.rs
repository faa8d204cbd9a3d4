//! Verification of presented ES256 access tokens against a fetched JWKS.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::ecdsa::{Signature, signature::Verifier};
// self
use crate::{
	_prelude::*,
	jwks::{Jwk, Jwks, JwksFetchError, JwksFetcher, USE_SIGNATURE},
	jwt::{self, ALG_ES256, AccessTokenClaims, JwtHeader},
	obs::{self, Operation, OperationSpan, Outcome},
};

const MALFORMED_TOKEN: &str = "Malformed token";
const SIGNATURE_FAILED: &str = "Signature verification failed";

/// Checks signature, lifetime, issuer, audience, and scope of presented tokens.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
	fetcher: JwksFetcher,
	issuer: String,
	audience: String,
}
impl TokenVerifier {
	/// Creates a verifier expecting tokens from `issuer` for `audience`.
	pub fn new(fetcher: JwksFetcher, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
		Self { fetcher, issuer: issuer.into(), audience: audience.into() }
	}

	/// Fetches the JWKS and verifies `token` as of now.
	pub async fn verify(&self, token: &str, required_scope: Option<&str>) -> Result<AccessTokenClaims> {
		const OPERATION: Operation = Operation::TokenVerify;

		let span = OperationSpan::new(OPERATION, "verify");

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let jwks = self.fetcher.fetch().await?;

				self.verify_with_jwks(token, &jwks, required_scope, OffsetDateTime::now_utc())
			})
			.await;

		obs::finish(OPERATION, &result);

		result
	}

	/// Verifies `token` against an already-fetched key set as of `now`.
	///
	/// Checks run in a fixed order: structure, algorithm, key selection, signature, claims,
	/// lifetime (no leeway), issuer, audience, scope.
	pub fn verify_with_jwks(
		&self,
		token: &str,
		jwks: &Jwks,
		required_scope: Option<&str>,
		now: OffsetDateTime,
	) -> Result<AccessTokenClaims> {
		let (header_segment, payload_segment, signature_segment) =
			split_token(token).ok_or_else(|| AuthError::invalid_token(MALFORMED_TOKEN))?;
		let header: JwtHeader = jwt::decode_segment(header_segment)
			.ok_or_else(|| AuthError::invalid_token(MALFORMED_TOKEN))?;

		if header.alg != ALG_ES256 {
			return Err(AuthError::invalid_token("Unsupported algorithm"));
		}

		let jwk = select_signing_key(jwks, header.kid.as_deref())?;
		let verifying_key = jwk
			.to_p256_verifying_key()
			.map_err(|e| AuthError::server("Error creating public signing key", e))?;
		let signature = URL_SAFE_NO_PAD
			.decode(signature_segment)
			.ok()
			.and_then(|bytes| Signature::from_slice(&bytes).ok())
			.ok_or_else(|| AuthError::invalid_token(SIGNATURE_FAILED))?;
		let signing_input = &token[..header_segment.len() + 1 + payload_segment.len()];

		verifying_key
			.verify(signing_input.as_bytes(), &signature)
			.map_err(|_| AuthError::invalid_token(SIGNATURE_FAILED))?;

		let claims: AccessTokenClaims = jwt::decode_segment(payload_segment)
			.ok_or_else(|| AuthError::invalid_token("Malformed claims"))?;
		let now = now.unix_timestamp();

		if claims.exp <= now {
			return Err(AuthError::invalid_token("Token expired"));
		}
		if claims.nbf.is_some_and(|nbf| nbf > now) {
			return Err(AuthError::invalid_token("Token not yet valid"));
		}
		if claims.iss != self.issuer {
			return Err(AuthError::invalid_token("Unexpected issuer"));
		}
		if claims.aud != self.audience {
			return Err(AuthError::invalid_token("Unexpected audience"));
		}
		if required_scope.is_some_and(|scope| !claims.scope.contains(scope)) {
			return Err(AuthError::invalid_token("Insufficient scope"));
		}

		Ok(claims)
	}
}

/// Picks the P-256 `sig` key named by `kid`, or the first one when the token has no `kid`.
///
/// A key set without any such key is a server-side fault; a `kid` naming no P-256 signing key,
/// including one naming a key of another type, is the caller's.
pub fn select_signing_key<'a>(jwks: &'a Jwks, kid: Option<&str>) -> Result<&'a Jwk> {
	let mut candidates = jwks.with_use(USE_SIGNATURE).filter(|jwk| jwk.is_p256()).peekable();

	if candidates.peek().is_none() {
		return Err(JwksFetchError::NoSigningKey.into());
	}

	match kid {
		Some(kid) => candidates
			.find(|jwk| jwk.kid.as_deref() == Some(kid))
			.ok_or_else(|| AuthError::invalid_token("Unknown signing key")),
		None => candidates.next().ok_or_else(|| JwksFetchError::NoSigningKey.into()),
	}
}

fn split_token(token: &str) -> Option<(&str, &str, &str)> {
	let mut parts = token.split('.');
	let segments = (parts.next()?, parts.next()?, parts.next()?);

	if parts.next().is_some() || segments.0.is_empty() || segments.1.is_empty() {
		None
	} else {
		Some(segments)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::ScopeSet,
		jwks::JwksPublisher,
		jwt::{AccessTokenInput, TokenMinter},
	};

	const READ: &str = "read";

	fn now() -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Timestamp is valid.")
	}

	fn verifier() -> TokenVerifier {
		let fetcher = JwksFetcher::new(
			test_http_client(),
			Url::parse("http://127.0.0.1:1/jwks.json").expect("URL should parse."),
		);

		TokenVerifier::new(fetcher, TEST_ISSUER, TEST_AUDIENCE)
	}

	async fn fixtures(input: AccessTokenInput) -> (String, Jwks) {
		let signer = Arc::new(test_signer());
		let token = TokenMinter::new(signer.clone())
			.mint_at(&input, &test_key_id(), now())
			.await
			.expect("Minting should succeed.");
		let jwks = JwksPublisher::new(signer, test_key_id())
			.publish()
			.await
			.expect("Publishing should succeed.");

		(token.into_string(), jwks)
	}

	fn input() -> AccessTokenInput {
		AccessTokenInput::new(TEST_ISSUER, TEST_AUDIENCE)
			.with_scope(ScopeSet::new([READ]).expect("Scope fixture should be valid."))
	}

	fn reason(err: AuthError) -> String {
		match err {
			AuthError::InvalidToken { reason } => reason,
			other => panic!("Expected an invalid token error, got {other:?}."),
		}
	}

	#[tokio::test]
	async fn accepts_freshly_minted_tokens() {
		let (token, jwks) = fixtures(input()).await;
		let claims = verifier()
			.verify_with_jwks(&token, &jwks, Some(READ), now())
			.expect("Fresh token should verify.");

		assert_eq!(claims.iss, TEST_ISSUER);
		assert_eq!(claims.exp - claims.iat, 3600);
	}

	#[tokio::test]
	async fn rejects_tampering_and_expiry() {
		let (token, jwks) = fixtures(input()).await;
		let verifier = verifier();
		let (header, _, signature) = split_token(&token).expect("Token should split.");
		let forged_claims = jwt::encode_segment(&serde_json::json!({
			"iss": TEST_ISSUER, "aud": TEST_AUDIENCE, "iat": 0, "exp": i64::MAX, "scope": "admin"
		}))
		.expect("Claims should encode.");
		let forged = format!("{header}.{forged_claims}.{signature}");
		let expired_at = now() + Duration::hours(1);

		assert_eq!(
			reason(verifier.verify_with_jwks(&forged, &jwks, None, now()).expect_err("Forged.")),
			"Signature verification failed"
		);
		assert_eq!(
			reason(verifier.verify_with_jwks(&token, &jwks, None, expired_at).expect_err("Expired.")),
			"Token expired"
		);
		assert_eq!(
			reason(verifier.verify_with_jwks("abc", &jwks, None, now()).expect_err("Malformed.")),
			"Malformed token"
		);
	}

	#[tokio::test]
	async fn enforces_issuer_audience_and_scope() {
		let (token, jwks) = fixtures(input()).await;
		let other = TokenVerifier::new(verifier().fetcher, "https://elsewhere", TEST_AUDIENCE);

		assert_eq!(
			reason(other.verify_with_jwks(&token, &jwks, None, now()).expect_err("Issuer.")),
			"Unexpected issuer"
		);
		assert_eq!(
			reason(
				verifier()
					.verify_with_jwks(&token, &jwks, Some("write"), now())
					.expect_err("Scope."),
			),
			"Insufficient scope"
		);
	}

	#[tokio::test]
	async fn key_selection_distinguishes_server_and_client_faults() {
		let (token, jwks) = fixtures(input()).await;
		let encryption_only = Jwks { keys: vec![test_encryption_jwk()] };
		let err = verifier()
			.verify_with_jwks(&token, &encryption_only, None, now())
			.expect_err("No signing key.");

		assert!(err.is_server_error());
		assert_eq!(err.to_string(), "No signing key in JWKS");

		let mut rotated = jwks.clone();

		rotated.keys[0].kid = Some("rotated".into());

		assert_eq!(
			reason(verifier().verify_with_jwks(&token, &rotated, None, now()).expect_err("Kid.")),
			"Unknown signing key"
		);
	}

	#[tokio::test]
	async fn kid_naming_a_non_ec_key_is_the_callers_fault() {
		let (token, mut jwks) = fixtures(input()).await;
		let mut rsa_signing = test_encryption_jwk();

		rsa_signing.kid = Some("rsa".into());
		rsa_signing.key_use = Some(USE_SIGNATURE.into());
		jwks.keys.push(rsa_signing);

		let (_, payload, signature) = split_token(&token).expect("Token should split.");
		let header = jwt::encode_segment(&JwtHeader::es256(Some("rsa".into())))
			.expect("Header should encode.");
		let retargeted = format!("{header}.{payload}.{signature}");
		let err = verifier()
			.verify_with_jwks(&retargeted, &jwks, None, now())
			.expect_err("An RSA key cannot verify ES256.");

		assert!(!err.is_server_error());
		assert_eq!(reason(err), "Unknown signing key");
		assert!(verifier().verify_with_jwks(&token, &jwks, None, now()).is_ok());
	}

	#[test]
	fn key_set_of_only_rsa_signing_keys_has_no_signing_key() {
		let mut rsa_signing = test_encryption_jwk();

		rsa_signing.key_use = Some(USE_SIGNATURE.into());

		let err = select_signing_key(&Jwks { keys: vec![rsa_signing] }, None)
			.expect_err("No P-256 signing key.");

		assert!(err.is_server_error());
		assert_eq!(err.to_string(), "No signing key in JWKS");
	}

	#[tokio::test]
	async fn unreachable_jwks_is_a_server_error() {
		let err = verifier().verify("a.b.c", None).await.expect_err("JWKS is unreachable.");

		assert!(err.is_server_error());
		assert_eq!(err.to_string(), "Unexpected network error fetching JWKS");
	}
}
