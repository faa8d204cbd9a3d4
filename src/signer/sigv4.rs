//! AWS Signature Version 4 request signing for the KMS JSON API.
//!
//! Only what the KMS client sends is covered: a fixed set of headers and a fully buffered body.
//! The canonical request hashes the body, so no unsigned-payload mode exists.

// crates.io
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::macros::format_description;
// self
use crate::{_prelude::*, signer::SignerError};

type HmacSha256 = Hmac<Sha256>;

/// Signing scope name for AWS KMS.
pub const SERVICE_KMS: &str = "kms";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const TERMINATOR: &str = "aws4_request";

/// Long-term or session credentials used to sign requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
	/// Access key id; appears in the `Credential` scope of every request.
	pub access_key_id: String,
	secret_access_key: String,
	/// Session token for temporary credentials (e.g. a Lambda execution role).
	pub session_token: Option<String>,
}
impl AwsCredentials {
	/// Creates long-term credentials.
	pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
		Self {
			access_key_id: access_key_id.into(),
			secret_access_key: secret_access_key.into(),
			session_token: None,
		}
	}

	/// Attaches the session token of temporary credentials.
	pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
		self.session_token = Some(token.into());

		self
	}
}
impl Debug for AwsCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AwsCredentials")
			.field("access_key_id", &self.access_key_id)
			.field("secret_access_key", &"**redacted**")
			.field("session_token", &self.session_token.as_ref().map(|_| "**redacted**"))
			.finish()
	}
}

/// Signs outbound requests for one region and service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSigner {
	credentials: AwsCredentials,
	region: String,
	service: String,
}
impl RequestSigner {
	/// Creates a signer for `service` in `region`.
	pub fn new(
		credentials: AwsCredentials,
		region: impl Into<String>,
		service: impl Into<String>,
	) -> Self {
		Self { credentials, region: region.into(), service: service.into() }
	}

	/// Returns the headers to add so the request authenticates as of `at`.
	///
	/// `headers` are the request's own headers that must be covered by the signature;
	/// `host`, `x-amz-date`, and the session token header are added here. Header names are
	/// matched case-insensitively.
	pub fn sign(
		&self,
		method: &str,
		url: &Url,
		headers: &[(&str, &str)],
		payload: &[u8],
		at: OffsetDateTime,
	) -> Result<Vec<(&'static str, String)>, SignerError> {
		let at = at.to_offset(time::UtcOffset::UTC);
		let amz_date = at
			.format(format_description!("[year][month][day]T[hour][minute][second]Z"))
			.map_err(|e| SignerError::RequestSigning { reason: e.to_string() })?;
		let date = &amz_date[..8];
		let host = url
			.host_str()
			.map(|host| match url.port() {
				Some(port) => format!("{host}:{port}"),
				None => host.to_owned(),
			})
			.ok_or_else(|| SignerError::RequestSigning { reason: "endpoint has no host".into() })?;
		let mut canonical_headers: Vec<(String, String)> = headers
			.iter()
			.map(|(name, value)| (name.to_ascii_lowercase(), collapse_whitespace(value)))
			.collect();

		canonical_headers.push(("host".into(), host));
		canonical_headers.push(("x-amz-date".into(), amz_date.clone()));

		if let Some(token) = &self.credentials.session_token {
			canonical_headers.push(("x-amz-security-token".into(), token.clone()));
		}

		canonical_headers.sort();

		let signed_headers =
			canonical_headers.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(";");
		let canonical_request = format!(
			"{method}\n{path}\n{query}\n{headers}\n{signed_headers}\n{payload}",
			path = canonical_path(url),
			query = canonical_query(url),
			headers = canonical_headers
				.iter()
				.map(|(name, value)| format!("{name}:{value}\n"))
				.collect::<String>(),
			payload = hex::encode(Sha256::digest(payload)),
		);
		let scope = format!("{date}/{}/{}/{TERMINATOR}", self.region, self.service);
		let string_to_sign = format!(
			"{ALGORITHM}\n{amz_date}\n{scope}\n{}",
			hex::encode(Sha256::digest(canonical_request.as_bytes()))
		);
		let signature = hex::encode(self.signing_key(date)?.mac(string_to_sign)?);
		let mut added = vec![
			("x-amz-date", amz_date),
			(
				"authorization",
				format!(
					"{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
					self.credentials.access_key_id
				),
			),
		];

		if let Some(token) = &self.credentials.session_token {
			added.push(("x-amz-security-token", token.clone()));
		}

		Ok(added)
	}

	fn signing_key(&self, date: &str) -> Result<Vec<u8>, SignerError> {
		format!("AWS4{}", self.credentials.secret_access_key)
			.into_bytes()
			.mac(date)?
			.mac(&self.region)?
			.mac(&self.service)?
			.mac(TERMINATOR)
	}
}

/// One HMAC-SHA256 step of the key derivation, keyed by `self`.
trait HmacKey
where
	Self: Sized,
{
	fn mac(self, data: impl AsRef<[u8]>) -> Result<Vec<u8>, SignerError>;
}
impl HmacKey for Vec<u8> {
	fn mac(self, data: impl AsRef<[u8]>) -> Result<Vec<u8>, SignerError> {
		let mut mac = <HmacSha256 as Mac>::new_from_slice(&self)
			.map_err(|e| SignerError::RequestSigning { reason: e.to_string() })?;

		mac.update(data.as_ref());

		Ok(mac.finalize().into_bytes().to_vec())
	}
}

fn canonical_path(url: &Url) -> &str {
	match url.path() {
		"" => "/",
		path => path,
	}
}

fn canonical_query(url: &Url) -> String {
	let mut pairs: Vec<&str> =
		url.query().unwrap_or_default().split('&').filter(|pair| !pair.is_empty()).collect();

	pairs.sort_unstable();

	pairs.join("&")
}

fn collapse_whitespace(value: &str) -> String {
	value.split_whitespace().collect::<Vec<_>>().join(" ")
}
