// self
use oauth2_issuer::{
	_preludet::*,
	api::{ApiRequest, NO_STORE},
	error::ErrorBody,
	issuer::TokenIssuer,
	jwks::{JwksFetcher, JwksPublisher},
	jwt::{self, AccessTokenClaims, JwtHeader, TokenMinter, TokenResponse},
	signer::{KeySigner, LocalSigner},
	verify::TokenVerifier,
};

fn build_issuer(signer: Arc<dyn KeySigner>) -> TokenIssuer {
	TokenIssuer::new(
		Arc::new(test_registry()),
		Arc::new(TokenMinter::new(signer)),
		test_key_id(),
		TEST_AUDIENCE,
	)
}

fn unused_fetcher() -> JwksFetcher {
	JwksFetcher::new(
		test_http_client(),
		Url::parse("http://127.0.0.1:1/.well-known/jwks.json").expect("URL should parse."),
	)
}

#[tokio::test]
async fn issued_token_verifies_against_published_jwks() {
	let signer: Arc<dyn KeySigner> = Arc::new(test_signer());
	let response = build_issuer(signer.clone()).handle(&client_credentials_request()).await;

	assert_eq!(response.status, 200);

	let body: TokenResponse = response.json_body().expect("Token response should be JSON.");
	let jwks = JwksPublisher::new(signer, test_key_id())
		.publish()
		.await
		.expect("JWKS should publish for the signing key.");
	let token = jwt::CompactJwt::new(body.access_token.clone());
	let (header, _, _) = token.segments().expect("Access token should have three segments.");
	let header: JwtHeader = jwt::decode_segment(header).expect("JWT header should decode.");

	assert_eq!(body.token_type, "Bearer");
	assert_eq!(body.expires_in, 3600);
	assert_eq!(header.kid, jwks.keys[0].kid);

	let claims: AccessTokenClaims = TokenVerifier::new(unused_fetcher(), TEST_ISSUER, TEST_AUDIENCE)
		.verify_with_jwks(&body.access_token, &jwks, None, OffsetDateTime::now_utc())
		.expect("Issued token should verify against the published key.");

	assert_eq!(claims.exp - claims.iat, 3600);
	assert_eq!(claims.client_id.as_deref(), Some(TEST_CLIENT_ID));
}

#[tokio::test]
async fn requested_scope_is_carried_into_the_token() {
	let request = ApiRequest::new(Some("grant_type=client_credentials&scope=b.read+a.read".into()))
		.with_header("authorization", basic_authorization(TEST_CLIENT_ID, TEST_CLIENT_SECRET));
	let body = build_issuer(Arc::new(test_signer()))
		.issue(&request)
		.await
		.expect("Scoped request should succeed.");
	let token = jwt::CompactJwt::new(body.access_token);
	let (_, payload, _) = token.segments().expect("Access token should have three segments.");
	let claims: AccessTokenClaims = jwt::decode_segment(payload).expect("Claims should decode.");

	assert_eq!(claims.scope.normalized(), "a.read b.read");
}

#[tokio::test]
async fn missing_body_wins_over_missing_header() {
	let response = build_issuer(Arc::new(test_signer())).handle(&ApiRequest::new(None)).await;

	assert_eq!(response.status, 400);
	assert_eq!(
		response.json_body::<ErrorBody>().expect("Error body should be JSON."),
		ErrorBody {
			error: "invalid_request".into(),
			error_description: "Missing request body".into()
		}
	);
}

#[tokio::test]
async fn validation_precedence_is_stable() {
	let issuer = build_issuer(Arc::new(test_signer()));
	let cases = [
		(ApiRequest::new(Some("grant_type=refresh_token".into())), "invalid_grant"),
		(
			ApiRequest::new(Some("grant_type=client_credentials".into()))
				.with_header("Authorization", "Bearer opaque"),
			"invalid_request",
		),
		(
			ApiRequest::new(Some("grant_type=client_credentials".into()))
				.with_header("Authorization", basic_authorization("stranger", "secret")),
			"invalid_client",
		),
	];

	for (request, expected) in cases {
		let response = issuer.handle(&request).await;
		let body: ErrorBody = response.json_body().expect("Error body should be JSON.");

		assert_eq!(response.status, 400);
		assert_eq!(body.error, expected);
		assert_eq!(response.headers.get("cache-control"), Some(NO_STORE));
	}
}

#[tokio::test]
async fn signer_failures_return_generic_server_error() {
	let response =
		build_issuer(Arc::new(LocalSigner::default())).handle(&client_credentials_request()).await;

	assert_eq!(response.status, 500);
	assert_eq!(response.headers.get("cache-control"), Some(NO_STORE));
	assert_eq!(
		response.json_body::<ErrorBody>().expect("Error body should be JSON."),
		ErrorBody { error: "server_error".into(), error_description: "Server Error".into() }
	);
	assert!(!response.body.contains(TEST_KEY_ID));
}
