//! Process-level configuration for the issuer, verifier, and encrypter.
//!
//! Values are read once at process start (see [`IssuerConfig::from_env`]) and the resulting
//! collaborators are shared across requests.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, KeyId, ScopeSet, ScopeValidationError},
	signer::AwsCredentials,
};

/// Scope accepted by the token-exchange endpoint when none is configured.
pub const DEFAULT_EXCHANGE_SCOPE: &str = "idCheck.activeSession.read";
/// Upper bound on signer attempts per operation.
pub const MAX_SIGNER_ATTEMPTS: u32 = 3;

/// Errors raised while building or validating configuration.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required setting was not supplied.
	#[error("Missing required setting `{name}`.")]
	Missing {
		/// Setting name (environment variable when loaded from the environment).
		name: &'static str,
	},
	/// A setting could not be parsed.
	#[error("Setting `{name}` is invalid: {reason}.")]
	Invalid {
		/// Setting name.
		name: &'static str,
		/// Parse or validation failure.
		reason: String,
	},
	/// Endpoints must use HTTP(S).
	#[error("The {endpoint} endpoint must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Connect timeout exceeds the overall request timeout, or either is zero.
	#[error("Timeouts must be non-zero and the connect timeout must not exceed the request timeout.")]
	InvalidTimeouts,
	/// Retry budget outside `1..=MAX_SIGNER_ATTEMPTS`.
	#[error("Signer attempts must be between 1 and {max}, got {attempts}.")]
	InvalidAttempts {
		/// Requested attempts.
		attempts: u32,
		/// Maximum permitted attempts.
		max: u32,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild(#[source] ReqwestError),
}
impl From<IdentifierError> for ConfigError {
	fn from(e: IdentifierError) -> Self {
		Self::Invalid { name: "SIGNING_KEY_ID", reason: e.to_string() }
	}
}
impl From<ScopeValidationError> for ConfigError {
	fn from(e: ScopeValidationError) -> Self {
		Self::Invalid { name: "TOKEN_EXCHANGE_SCOPES", reason: e.to_string() }
	}
}

/// Connect and overall timeouts applied to every outbound call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpTimeouts {
	/// TCP/TLS connect timeout.
	pub connect: StdDuration,
	/// Whole-request timeout, kept inside the Lambda execution budget.
	pub request: StdDuration,
}
impl HttpTimeouts {
	fn validate(&self) -> Result<(), ConfigError> {
		if self.connect.is_zero() || self.request.is_zero() || self.connect > self.request {
			Err(ConfigError::InvalidTimeouts)
		} else {
			Ok(())
		}
	}
}
impl Default for HttpTimeouts {
	fn default() -> Self {
		Self { connect: StdDuration::from_secs(5), request: StdDuration::from_secs(29) }
	}
}

/// Credentials and region used to SigV4-sign KMS calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AwsSigning {
	/// Access key pair, plus session token for role credentials.
	pub credentials: AwsCredentials,
	/// Region named in the signing scope; must match the endpoint's region.
	pub region: String,
}

/// Immutable issuer configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuerConfig {
	/// Remote signing key handle.
	pub signing_key_id: KeyId,
	/// `iss` claim stamped into every token.
	pub issuer: String,
	/// `aud` claim stamped into access tokens.
	pub audience: String,
	/// KMS-compatible signer endpoint.
	pub kms_endpoint: Url,
	/// Request signing for the KMS endpoint; `None` sends unauthenticated calls.
	pub aws: Option<AwsSigning>,
	/// Client registry document location, when not supplied in-process.
	pub client_registry_url: Option<Url>,
	/// JWKS used by the token encrypter.
	pub encryption_jwks_url: Option<Url>,
	/// Scopes the token-exchange endpoint accepts.
	pub exchange_scopes: ScopeSet,
	/// Outbound timeouts.
	pub timeouts: HttpTimeouts,
	/// Attempts per signer operation (bounded by [`MAX_SIGNER_ATTEMPTS`]).
	pub max_attempts: u32,
}
impl IssuerConfig {
	/// Creates a new builder.
	pub fn builder() -> IssuerConfigBuilder {
		IssuerConfigBuilder::default()
	}

	/// Loads configuration from process environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads configuration through an arbitrary variable lookup.
	///
	/// Reads `SIGNING_KEY_ID`, `ISSUER`, `AUDIENCE`, `KMS_ENDPOINT`, and optionally
	/// `CLIENT_REGISTRY_URL`, `ENCRYPTION_JWKS_URL`, `TOKEN_EXCHANGE_SCOPES`,
	/// `HTTP_CONNECT_TIMEOUT_SECS`, `HTTP_REQUEST_TIMEOUT_SECS`.
	///
	/// KMS calls are signed when `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY` are set (with
	/// `AWS_SESSION_TOKEN` for role credentials); `AWS_REGION` is then required.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let optional = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
		let required =
			|name: &'static str| optional(name).ok_or(ConfigError::Missing { name });
		let url = |name: &'static str, raw: String| {
			Url::parse(&raw).map_err(|e| ConfigError::Invalid { name, reason: e.to_string() })
		};
		let secs = |name: &'static str| -> Result<Option<StdDuration>, ConfigError> {
			lookup(name)
				.map(|raw| {
					raw.trim()
						.parse::<u64>()
						.map(StdDuration::from_secs)
						.map_err(|e| ConfigError::Invalid { name, reason: e.to_string() })
				})
				.transpose()
		};
		let mut builder = Self::builder()
			.signing_key_id(KeyId::new(required("SIGNING_KEY_ID")?)?)
			.issuer(required("ISSUER")?)
			.audience(required("AUDIENCE")?)
			.kms_endpoint(url("KMS_ENDPOINT", required("KMS_ENDPOINT")?)?);

		if let Some(raw) = lookup("CLIENT_REGISTRY_URL") {
			builder = builder.client_registry_url(url("CLIENT_REGISTRY_URL", raw)?);
		}
		if let Some(raw) = lookup("ENCRYPTION_JWKS_URL") {
			builder = builder.encryption_jwks_url(url("ENCRYPTION_JWKS_URL", raw)?);
		}
		if let Some(raw) = lookup("TOKEN_EXCHANGE_SCOPES") {
			builder = builder.exchange_scopes(ScopeSet::from_str(&raw)?);
		}

		match (optional("AWS_ACCESS_KEY_ID"), optional("AWS_SECRET_ACCESS_KEY")) {
			(Some(access_key_id), Some(secret_access_key)) => {
				let mut credentials = AwsCredentials::new(access_key_id, secret_access_key);

				if let Some(token) = optional("AWS_SESSION_TOKEN") {
					credentials = credentials.with_session_token(token);
				}

				builder = builder.aws_signing(credentials, required("AWS_REGION")?);
			},
			(Some(_), None) => return Err(ConfigError::Missing { name: "AWS_SECRET_ACCESS_KEY" }),
			(None, Some(_)) => return Err(ConfigError::Missing { name: "AWS_ACCESS_KEY_ID" }),
			(None, None) => {},
		}

		let mut timeouts = HttpTimeouts::default();

		if let Some(connect) = secs("HTTP_CONNECT_TIMEOUT_SECS")? {
			timeouts.connect = connect;
		}
		if let Some(request) = secs("HTTP_REQUEST_TIMEOUT_SECS")? {
			timeouts.request = request;
		}

		builder.timeouts(timeouts).build()
	}

	fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("kms", &self.kms_endpoint)?;

		if let Some(aws) = self.aws.as_ref() {
			if aws.credentials.access_key_id.trim().is_empty() {
				return Err(ConfigError::Missing { name: "AWS_ACCESS_KEY_ID" });
			}

			let valid_region = !aws.region.is_empty()
				&& aws.region.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

			if !valid_region {
				return Err(ConfigError::Invalid {
					name: "AWS_REGION",
					reason: format!("`{}` is not a region name", aws.region),
				});
			}
		}

		if let Some(url) = self.client_registry_url.as_ref() {
			validate_endpoint("client registry", url)?;
		}
		if let Some(url) = self.encryption_jwks_url.as_ref() {
			validate_endpoint("encryption jwks", url)?;
		}

		self.timeouts.validate()?;

		if !(1..=MAX_SIGNER_ATTEMPTS).contains(&self.max_attempts) {
			return Err(ConfigError::InvalidAttempts {
				attempts: self.max_attempts,
				max: MAX_SIGNER_ATTEMPTS,
			});
		}

		Ok(())
	}
}

/// Builder for [`IssuerConfig`] values.
#[derive(Debug, Default)]
pub struct IssuerConfigBuilder {
	signing_key_id: Option<KeyId>,
	issuer: Option<String>,
	audience: Option<String>,
	kms_endpoint: Option<Url>,
	aws: Option<AwsSigning>,
	client_registry_url: Option<Url>,
	encryption_jwks_url: Option<Url>,
	exchange_scopes: Option<ScopeSet>,
	timeouts: HttpTimeouts,
	max_attempts: Option<u32>,
}
impl IssuerConfigBuilder {
	/// Sets the signing key handle.
	pub fn signing_key_id(mut self, key: KeyId) -> Self {
		self.signing_key_id = Some(key);

		self
	}

	/// Sets the `iss` claim.
	pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = Some(issuer.into());

		self
	}

	/// Sets the `aud` claim.
	pub fn audience(mut self, audience: impl Into<String>) -> Self {
		self.audience = Some(audience.into());

		self
	}

	/// Sets the signer endpoint.
	pub fn kms_endpoint(mut self, url: Url) -> Self {
		self.kms_endpoint = Some(url);

		self
	}

	/// Signs KMS calls with `credentials` for `region`.
	pub fn aws_signing(mut self, credentials: AwsCredentials, region: impl Into<String>) -> Self {
		self.aws = Some(AwsSigning { credentials, region: region.into() });

		self
	}

	/// Sets the client registry document location.
	pub fn client_registry_url(mut self, url: Url) -> Self {
		self.client_registry_url = Some(url);

		self
	}

	/// Sets the JWKS consulted by the token encrypter.
	pub fn encryption_jwks_url(mut self, url: Url) -> Self {
		self.encryption_jwks_url = Some(url);

		self
	}

	/// Overrides the token-exchange scope allow-list.
	pub fn exchange_scopes(mut self, scopes: ScopeSet) -> Self {
		self.exchange_scopes = Some(scopes);

		self
	}

	/// Overrides outbound timeouts.
	pub fn timeouts(mut self, timeouts: HttpTimeouts) -> Self {
		self.timeouts = timeouts;

		self
	}

	/// Overrides the signer attempt budget.
	pub fn max_attempts(mut self, attempts: u32) -> Self {
		self.max_attempts = Some(attempts);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<IssuerConfig, ConfigError> {
		let exchange_scopes = match self.exchange_scopes {
			Some(scopes) => scopes,
			None => ScopeSet::new([DEFAULT_EXCHANGE_SCOPE])?,
		};
		let config = IssuerConfig {
			signing_key_id: self
				.signing_key_id
				.ok_or(ConfigError::Missing { name: "SIGNING_KEY_ID" })?,
			issuer: self.issuer.ok_or(ConfigError::Missing { name: "ISSUER" })?,
			audience: self.audience.ok_or(ConfigError::Missing { name: "AUDIENCE" })?,
			kms_endpoint: self.kms_endpoint.ok_or(ConfigError::Missing { name: "KMS_ENDPOINT" })?,
			aws: self.aws,
			client_registry_url: self.client_registry_url,
			encryption_jwks_url: self.encryption_jwks_url,
			exchange_scopes,
			timeouts: self.timeouts,
			max_attempts: self.max_attempts.unwrap_or(MAX_SIGNER_ATTEMPTS),
		};

		config.validate()?;

		Ok(config)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"http" | "https" => Ok(()),
		_ => Err(ConfigError::UnsupportedScheme { endpoint: name, url: url.to_string() }),
	}
}
