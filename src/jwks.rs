//! JSON Web Keys, RFC 7638 thumbprints, and JWKS publishing/retrieval.

pub mod fetch;
pub mod publisher;

pub use fetch::*;
pub use publisher::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::{ecdsa::VerifyingKey, elliptic_curve::sec1::ToEncodedPoint, pkcs8::DecodePublicKey};
use rsa::{BigUint, RsaPublicKey, traits::PublicKeyParts};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// `use` value for signature verification keys.
pub const USE_SIGNATURE: &str = "sig";
/// `use` value for encryption keys.
pub const USE_ENCRYPTION: &str = "enc";

/// Failures while converting or fingerprinting key material.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum JwkError {
	/// The DER bytes are neither a P-256 nor an RSA SubjectPublicKeyInfo.
	#[error("Public key is not a supported P-256 or RSA key.")]
	UnsupportedKey,
	/// `kty` has no thumbprint member set we know of.
	#[error("Unsupported key type `{kty}`.")]
	UnsupportedKeyType {
		/// Offending key type.
		kty: String,
	},
	/// A member required for the key type is absent.
	#[error("JWK is missing required member `{member}`.")]
	MissingMember {
		/// Missing member name.
		member: &'static str,
	},
	/// A member is present but unusable.
	#[error("JWK member `{member}` is invalid.")]
	InvalidMember {
		/// Invalid member name.
		member: &'static str,
	},
}

/// Public JSON Web Key (RFC 7517) restricted to the EC and RSA members in use here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
	/// Key type (`EC`, `RSA`).
	#[serde(default)]
	pub kty: String,
	/// Curve for EC keys.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub crv: Option<String>,
	/// EC x coordinate (base64url).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub x: Option<String>,
	/// EC y coordinate (base64url).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub y: Option<String>,
	/// RSA modulus (base64url).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub n: Option<String>,
	/// RSA public exponent (base64url).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub e: Option<String>,
	/// Intended algorithm.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub alg: Option<String>,
	/// Key identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
	/// Intended use (`sig` or `enc`).
	#[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
	pub key_use: Option<String>,
}
impl Jwk {
	/// Converts a DER SubjectPublicKeyInfo into its JWK members (no `kid`/`use`).
	pub fn from_spki_der(der: &[u8]) -> Result<Self, JwkError> {
		if let Ok(public_key) = p256::PublicKey::from_public_key_der(der) {
			let point = public_key.to_encoded_point(false);
			let (Some(x), Some(y)) = (point.x(), point.y()) else {
				return Err(JwkError::UnsupportedKey);
			};

			return Ok(Self {
				kty: "EC".into(),
				crv: Some("P-256".into()),
				x: Some(URL_SAFE_NO_PAD.encode(x)),
				y: Some(URL_SAFE_NO_PAD.encode(y)),
				alg: Some("ES256".into()),
				..Default::default()
			});
		}
		if let Ok(public_key) = RsaPublicKey::from_public_key_der(der) {
			return Ok(Self {
				kty: "RSA".into(),
				n: Some(URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be())),
				e: Some(URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be())),
				alg: Some("RS256".into()),
				..Default::default()
			});
		}

		Err(JwkError::UnsupportedKey)
	}

	/// Builds a signature-use JWK whose `kid` is the RFC 7638 thumbprint.
	pub fn signing_key_from_spki_der(der: &[u8]) -> Result<Self, JwkError> {
		let mut jwk = Self::from_spki_der(der)?;

		jwk.kid = Some(jwk.thumbprint()?);
		jwk.key_use = Some(USE_SIGNATURE.into());

		Ok(jwk)
	}

	/// Computes the RFC 7638 SHA-256 thumbprint (base64url, no padding).
	///
	/// The hash input is built from an explicit, lexicographically ordered member list with no
	/// whitespace, so it never depends on map iteration order.
	pub fn thumbprint(&self) -> Result<String, JwkError> {
		let members: Vec<(&str, &str)> = match self.kty.as_str() {
			"EC" => vec![
				("crv", required("crv", self.crv.as_deref())?),
				("kty", "EC"),
				("x", required("x", self.x.as_deref())?),
				("y", required("y", self.y.as_deref())?),
			],
			"RSA" => vec![
				("e", required("e", self.e.as_deref())?),
				("kty", "RSA"),
				("n", required("n", self.n.as_deref())?),
			],
			"" => return Err(JwkError::MissingMember { member: "kty" }),
			other => return Err(JwkError::UnsupportedKeyType { kty: other.into() }),
		};
		let body = members
			.iter()
			.map(|(name, value)| format!("\"{name}\":{}", json_string(value)))
			.collect::<Vec<_>>()
			.join(",");
		let canonical = format!("{{{body}}}");

		Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes())))
	}

	/// Returns true when the key declares the provided `use`.
	pub fn has_use(&self, key_use: &str) -> bool {
		self.key_use.as_deref() == Some(key_use)
	}

	/// Returns true for `kty: EC` keys on `P-256`, the only keys ES256 tokens can name.
	pub fn is_p256(&self) -> bool {
		self.kty == "EC" && self.crv.as_deref() == Some("P-256")
	}

	/// Builds a P-256 verifying key from `x`/`y`.
	pub fn to_p256_verifying_key(&self) -> Result<VerifyingKey, JwkError> {
		if self.kty != "EC" {
			return Err(JwkError::UnsupportedKeyType { kty: self.kty.clone() });
		}
		if !self.is_p256() {
			return Err(JwkError::InvalidMember { member: "crv" });
		}

		let x = decode_member("x", self.x.as_deref())?;
		let y = decode_member("y", self.y.as_deref())?;

		if x.len() != 32 {
			return Err(JwkError::InvalidMember { member: "x" });
		}
		if y.len() != 32 {
			return Err(JwkError::InvalidMember { member: "y" });
		}

		let mut sec1 = Vec::with_capacity(65);

		sec1.push(0x04);
		sec1.extend_from_slice(&x);
		sec1.extend_from_slice(&y);

		VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| JwkError::InvalidMember { member: "x" })
	}

	/// Builds an RSA public key from `n`/`e`.
	pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey, JwkError> {
		if self.kty != "RSA" {
			return Err(JwkError::UnsupportedKeyType { kty: self.kty.clone() });
		}

		let n = decode_member("n", self.n.as_deref())?;
		let e = decode_member("e", self.e.as_deref())?;

		RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
			.map_err(|_| JwkError::InvalidMember { member: "n" })
	}
}

/// JSON Web Key Set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
	/// Published keys; each `kid` is unique and order carries no meaning.
	pub keys: Vec<Jwk>,
}
impl Jwks {
	/// First key declaring the provided `use`.
	pub fn first_with_use(&self, key_use: &str) -> Option<&Jwk> {
		self.keys.iter().find(|jwk| jwk.has_use(key_use))
	}

	/// All keys declaring the provided `use`.
	pub fn with_use<'a>(&'a self, key_use: &'a str) -> impl Iterator<Item = &'a Jwk> {
		self.keys.iter().filter(move |jwk| jwk.has_use(key_use))
	}

	/// Key with the provided `kid`, if any.
	pub fn find(&self, kid: &str) -> Option<&Jwk> {
		self.keys.iter().find(|jwk| jwk.kid.as_deref() == Some(kid))
	}
}

fn required<'a>(member: &'static str, value: Option<&'a str>) -> Result<&'a str, JwkError> {
	value.ok_or(JwkError::MissingMember { member })
}

fn json_string(value: &str) -> String {
	serde_json::Value::String(value.to_owned()).to_string()
}

fn decode_member(member: &'static str, value: Option<&str>) -> Result<Vec<u8>, JwkError> {
	URL_SAFE_NO_PAD.decode(required(member, value)?).map_err(|_| JwkError::InvalidMember { member })
}
