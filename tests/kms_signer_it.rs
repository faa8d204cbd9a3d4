// std
use std::time::Duration as StdDuration;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::prelude::*;
// self
use oauth2_issuer::{
	_preludet::*,
	config::IssuerConfig,
	jwks::JwksPublisher,
	signer::{AwsCredentials, KeySigner, KmsSigner, RetryPolicy, SignerError},
};

fn kms(server: &MockServer) -> KmsSigner {
	KmsSigner::new(test_http_client(), Url::parse(&server.url("/")).expect("Mock URL should parse."))
		.with_retry_policy(RetryPolicy::new(3, StdDuration::from_millis(1)))
}

#[tokio::test]
async fn sign_returns_der_signature_from_kms() {
	let server = MockServer::start_async().await;
	let expected = test_signer()
		.sign(&test_key_id(), b"header.payload")
		.await
		.expect("Local signing should succeed.");
	let response = serde_json::json!({
		"KeyId": TEST_KEY_ID,
		"Signature": STANDARD.encode(&expected.0),
		"SigningAlgorithm": "ECDSA_SHA_256",
	});
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/")
				.header("x-amz-target", "TrentService.Sign")
				.header("content-type", "application/x-amz-json-1.1");
			then.status(200)
				.header("content-type", "application/x-amz-json-1.1")
				.body(response.to_string());
		})
		.await;
	let signature = kms(&server)
		.sign(&test_key_id(), b"header.payload")
		.await
		.expect("KMS signing should succeed.");

	assert_eq!(signature, expected);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn throttling_is_retried_up_to_the_attempt_cap() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/").header("x-amz-target", "TrentService.Sign");
			then.status(400)
				.header("content-type", "application/x-amz-json-1.1")
				.body(r#"{"__type":"ThrottlingException","message":"Rate exceeded"}"#);
		})
		.await;
	let err = kms(&server)
		.sign(&test_key_id(), b"header.payload")
		.await
		.expect_err("Persistent throttling should fail.");

	assert!(matches!(err, SignerError::Throttled { .. }));

	mock.assert_calls_async(3).await;
}

#[tokio::test]
async fn access_denied_is_not_retried() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/").header("x-amz-target", "TrentService.Sign");
			then.status(400)
				.header("content-type", "application/x-amz-json-1.1")
				.body(r#"{"__type":"AccessDeniedException","Message":"not allowed"}"#);
		})
		.await;
	let err = kms(&server)
		.sign(&test_key_id(), b"header.payload")
		.await
		.expect_err("Access denied should fail.");

	assert!(matches!(&err, SignerError::AccessDenied { message } if message == "not allowed"));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn internal_errors_exhaust_the_retry_budget() {
	let server = MockServer::start_async().await;
	let failing = server
		.mock_async(|when, then| {
			when.method(POST).path("/").header("x-amz-target", "TrentService.GetPublicKey");
			then.status(500).body(r#"{"__type":"KMSInternalException"}"#);
		})
		.await;
	let signer = kms(&server);
	let err = signer.public_key(&test_key_id()).await.expect_err("Upstream failure should surface.");

	assert!(matches!(err, SignerError::Upstream { status: 500, .. }));

	failing.assert_calls_async(3).await;
}

#[tokio::test]
async fn published_jwks_matches_local_key_material() {
	let server = MockServer::start_async().await;
	let der = test_signer().public_key(&test_key_id()).await.expect("Local public key.");
	let response = serde_json::json!({
		"KeyId": TEST_KEY_ID,
		"KeyUsage": "SIGN_VERIFY",
		"PublicKey": STANDARD.encode(&der.0),
	});
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/").header("x-amz-target", "TrentService.GetPublicKey");
			then.status(200).body(response.to_string());
		})
		.await;
	let remote = JwksPublisher::new(Arc::new(kms(&server)), test_key_id())
		.publish()
		.await
		.expect("Publishing through KMS should succeed.");
	let local = JwksPublisher::new(Arc::new(test_signer()), test_key_id())
		.publish()
		.await
		.expect("Publishing locally should succeed.");

	assert_eq!(remote, local);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unreachable_kms_surfaces_as_transport_failure() {
	let signer = KmsSigner::new(
		test_http_client(),
		Url::parse("http://127.0.0.1:1/").expect("URL should parse."),
	)
	.with_retry_policy(RetryPolicy::no_retry());
	let err = signer.sign(&test_key_id(), b"m").await.expect_err("Unreachable KMS should fail.");

	assert!(err.is_retryable());
}

fn config_for(server: &MockServer) -> IssuerConfig {
	IssuerConfig::builder()
		.signing_key_id(test_key_id())
		.issuer(TEST_ISSUER)
		.audience(TEST_AUDIENCE)
		.kms_endpoint(Url::parse(&server.url("/")).expect("Mock URL should parse."))
		.aws_signing(
			AwsCredentials::new("AKIDEXAMPLE", "secret").with_session_token("session"),
			"eu-west-2",
		)
		.build()
		.expect("Config fixture should build.")
}

#[tokio::test]
async fn configured_credentials_authenticate_every_call() {
	let server = MockServer::start_async().await;
	let der = test_signer().public_key(&test_key_id()).await.expect("Local public key.");
	let response =
		serde_json::json!({ "KeyUsage": "SIGN_VERIFY", "PublicKey": STANDARD.encode(&der.0) });
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/")
				.header("x-amz-target", "TrentService.GetPublicKey")
				.header_exists("authorization")
				.header_exists("x-amz-date")
				.header("x-amz-security-token", "session");
			then.status(200).body(response.to_string());
		})
		.await;
	let signer = KmsSigner::from_config(&config_for(&server), test_http_client());

	signer.public_key(&test_key_id()).await.expect("Signed call should reach the mock.");
	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn signer_without_credentials_sends_no_authorization() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/").header_missing("authorization").header_missing("x-amz-date");
			then.status(400).body(r#"{"__type":"AccessDeniedException","Message":"proxy says no"}"#);
		})
		.await;
	let err = kms(&server).sign(&test_key_id(), b"m").await.expect_err("The mock denies access.");

	assert!(matches!(err, SignerError::AccessDenied { .. }));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn stalled_kms_is_cut_off_by_the_retry_budget() {
	let server = MockServer::start_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/");
			then.status(200).delay(StdDuration::from_secs(10)).body("{}");
		})
		.await;
	let signer = kms(&server).with_retry_policy(
		RetryPolicy::new(3, StdDuration::from_millis(1)).with_budget(StdDuration::from_millis(200)),
	);
	let started = std::time::Instant::now();
	let err = signer.sign(&test_key_id(), b"m").await.expect_err("The budget should expire first.");

	assert!(matches!(err, SignerError::DeadlineExceeded { operation: "sign", .. }));
	assert!(!err.is_retryable());
	assert!(started.elapsed() < StdDuration::from_secs(5));
}
