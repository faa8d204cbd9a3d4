//! KMS-compatible signer speaking the `TrentService` JSON protocol.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::KeyId,
	config::IssuerConfig,
	http,
	signer::{
		DerSignature, KeySigner, PublicKeyDer, RequestSigner, RetryPolicy, SignerError,
		SignerFuture, sigv4::SERVICE_KMS,
	},
};

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const AMZ_TARGET: &str = "X-Amz-Target";
const TARGET_SIGN: &str = "TrentService.Sign";
const TARGET_GET_PUBLIC_KEY: &str = "TrentService.GetPublicKey";
const SIGNING_ALGORITHM: &str = "ECDSA_SHA_256";

/// Signer backed by a remote KMS key; the private key never leaves the service.
///
/// Every call is bounded by the timeouts of the injected client and retried according to the
/// [`RetryPolicy`]. Throttling, 5xx, and network failures are retried; permission and key-state
/// failures are terminal.
///
/// With a [`RequestSigner`] each call carries SigV4 authentication, as AWS KMS requires. Without
/// one, calls go out unauthenticated, which only a KMS-compatible proxy or emulator accepts.
#[derive(Clone, Debug)]
pub struct KmsSigner {
	http_client: ReqwestClient,
	endpoint: Url,
	retry: RetryPolicy,
	request_signer: Option<RequestSigner>,
}
impl KmsSigner {
	/// Creates an unauthenticated signer for `endpoint` using a shared client.
	pub fn new(http_client: ReqwestClient, endpoint: Url) -> Self {
		Self { http_client, endpoint, retry: RetryPolicy::default(), request_signer: None }
	}

	/// Creates a signer from process configuration.
	///
	/// Requests are SigV4-signed when AWS credentials are configured, and every operation,
	/// retries included, is bounded by the request timeout.
	pub fn from_config(config: &IssuerConfig, http_client: ReqwestClient) -> Self {
		let signer = Self::new(http_client, config.kms_endpoint.clone()).with_retry_policy(
			RetryPolicy { max_attempts: config.max_attempts, ..Default::default() }
				.with_budget(config.timeouts.request),
		);

		match &config.aws {
			Some(aws) => signer.with_request_signer(RequestSigner::new(
				aws.credentials.clone(),
				aws.region.clone(),
				SERVICE_KMS,
			)),
			None => signer,
		}
	}

	/// Overrides the retry policy.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Authenticates every call with `request_signer`.
	pub fn with_request_signer(mut self, request_signer: RequestSigner) -> Self {
		self.request_signer = Some(request_signer);

		self
	}

	async fn call<Req, Res>(&self, target: &'static str, request: &Req) -> Result<Res, SignerError>
	where
		Req: Serialize,
		Res: DeserializeOwned,
	{
		let body = serde_json::to_vec(request)
			.map_err(|e| SignerError::MalformedResponse { reason: e.to_string() })?;
		let mut request = self
			.http_client
			.post(self.endpoint.clone())
			.header(CONTENT_TYPE, AMZ_JSON)
			.header(AMZ_TARGET, target);

		if let Some(request_signer) = &self.request_signer {
			let signed = [(CONTENT_TYPE.as_str(), AMZ_JSON), (AMZ_TARGET, target)];

			for (name, value) in request_signer.sign(
				"POST",
				&self.endpoint,
				&signed,
				&body,
				OffsetDateTime::now_utc(),
			)? {
				request = request.header(name, value);
			}
		}

		let response = request.body(body).send().await?;
		let status = response.status();
		let bytes = response.bytes().await?;

		if !status.is_success() {
			return Err(classify_error(status.as_u16(), &bytes));
		}

		serde_json::from_slice(&bytes)
			.map_err(|e| SignerError::MalformedResponse { reason: e.to_string() })
	}
}
impl KeySigner for KmsSigner {
	fn sign<'a>(&'a self, key: &'a KeyId, message: &'a [u8]) -> SignerFuture<'a, DerSignature> {
		Box::pin(async move {
			let request = SignRequest {
				key_id: key.as_ref(),
				message: STANDARD.encode(message),
				message_type: "RAW",
				signing_algorithm: SIGNING_ALGORITHM,
			};
			let response: SignResponse =
				self.retry.run("sign", || self.call(TARGET_SIGN, &request)).await?;
			let signature = STANDARD
				.decode(response.signature)
				.map_err(|e| SignerError::MalformedResponse { reason: e.to_string() })?;

			Ok(DerSignature(signature))
		})
	}

	fn public_key<'a>(&'a self, key: &'a KeyId) -> SignerFuture<'a, PublicKeyDer> {
		Box::pin(async move {
			let request = GetPublicKeyRequest { key_id: key.as_ref() };
			let response: GetPublicKeyResponse = self
				.retry
				.run("get_public_key", || self.call(TARGET_GET_PUBLIC_KEY, &request))
				.await?;

			if let Some(usage) =
				response.key_usage.as_deref().filter(|usage| *usage != "SIGN_VERIFY")
			{
				return Err(SignerError::KeyUnavailable {
					kind: "InvalidKeyUsageException".into(),
					message: format!("key usage is {usage}"),
				});
			}

			let der = STANDARD
				.decode(response.public_key)
				.map_err(|e| SignerError::MalformedResponse { reason: e.to_string() })?;

			Ok(PublicKeyDer(der))
		})
	}
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SignRequest<'a> {
	key_id: &'a str,
	message: String,
	message_type: &'static str,
	signing_algorithm: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignResponse {
	signature: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetPublicKeyRequest<'a> {
	key_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetPublicKeyResponse {
	public_key: String,
	#[serde(default)]
	key_usage: Option<String>,
}

#[derive(Default, Deserialize)]
struct KmsErrorBody {
	#[serde(rename = "__type", default)]
	kind: Option<String>,
	#[serde(alias = "Message", default)]
	message: Option<String>,
}

fn classify_error(status: u16, body: &[u8]) -> SignerError {
	let parsed: KmsErrorBody = serde_json::from_slice(body).unwrap_or_default();
	// Types may arrive namespaced, e.g. `com.amazonaws.kms#ThrottlingException`.
	let kind = parsed
		.kind
		.as_deref()
		.map(|raw| raw.rsplit('#').next().unwrap_or(raw).to_owned())
		.unwrap_or_default();
	let message = parsed.message.unwrap_or_else(|| http::body_preview(body));

	match kind.as_str() {
		"ThrottlingException" | "LimitExceededException" => SignerError::Throttled { message },
		"AccessDeniedException" | "UnrecognizedClientException" =>
			SignerError::AccessDenied { message },
		"NotFoundException"
		| "DisabledException"
		| "KMSInvalidStateException"
		| "InvalidKeyUsageException"
		| "KeyUnavailableException" => SignerError::KeyUnavailable { kind, message },
		"KMSInternalException" | "DependencyTimeoutException" =>
			SignerError::Upstream { status: status.max(500), message },
		_ if status == 401 || status == 403 => SignerError::AccessDenied { message },
		_ if status == 429 => SignerError::Throttled { message },
		_ => SignerError::Upstream { status, message },
	}
}
