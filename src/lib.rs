//! Client-credentials token issuance for serverless backends: validate clients against a registry,
//! mint JWTs signed by a remote KMS key, publish thumbprinted JWKS, and verify or encrypt tokens
//! destined for downstream services.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod config;
pub mod encrypt;
pub mod error;
pub mod exchange;
pub mod http;
pub mod issuer;
pub mod jwks;
pub mod jwt;
pub mod obs;
pub mod registry;
pub mod request;
pub mod signer;
pub mod verify;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use aes_gcm::{
		Aes256Gcm, KeyInit,
		aead::{Aead, Payload, generic_array::GenericArray},
	};
	use base64::{
		Engine as _,
		engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
	};
	use rsa::{
		Oaep, RsaPrivateKey,
		pkcs8::{DecodePrivateKey, EncodePublicKey},
	};
	use sha2::Sha256;
	// self
	use crate::{
		api::ApiRequest,
		auth::{ClientId, KeyId},
		config::HttpTimeouts,
		encrypt::ALG_RSA_OAEP_256,
		jwks::{Jwk, USE_ENCRYPTION},
		registry::{ClientRecord, MemoryRegistry},
		signer::LocalSigner,
	};

	/// Key identifier registered with [`test_signer`].
	pub const TEST_KEY_ID: &str = "test-signing-key";
	/// Issuer registered for [`TEST_CLIENT_ID`].
	pub const TEST_ISSUER: &str = "https://issuer.example.test";
	/// Audience stamped into test tokens.
	pub const TEST_AUDIENCE: &str = "https://audience.example.test";
	/// Client identifier present in [`test_registry`].
	pub const TEST_CLIENT_ID: &str = "test-client";
	/// Client secret matching [`TEST_CLIENT_ID`].
	pub const TEST_CLIENT_SECRET: &str = "test-secret";

	/// `kid` of the RSA key returned by [`test_encryption_jwk`].
	pub const TEST_ENCRYPTION_KID: &str = "test-encryption-key";

	const TEST_ENCRYPTION_KEY_PEM: &str = include_str!("../tests/fixtures/rsa_encryption_key.pem");

	/// Fixed P-256 scalar so test signatures and thumbprints are reproducible.
	const TEST_SIGNING_SCALAR: [u8; 32] = [
		0x1f, 0x3a, 0x52, 0x9c, 0x07, 0x44, 0xe1, 0x6b, 0x2d, 0x90, 0x5e, 0xa8, 0x13, 0x77, 0xc4,
		0x0b, 0x6f, 0x21, 0xd8, 0x3e, 0x95, 0x4a, 0x0c, 0xb7, 0x58, 0x12, 0xe6, 0x39, 0x81, 0xfd,
		0x2a, 0x64,
	];

	/// Builds a [`LocalSigner`] holding one deterministic key under [`TEST_KEY_ID`].
	pub fn test_signer() -> LocalSigner {
		LocalSigner::default()
			.with_key_bytes(test_key_id(), &TEST_SIGNING_SCALAR)
			.expect("Test signing scalar should be a valid P-256 key.")
	}

	/// Returns the [`KeyId`] used by [`test_signer`].
	pub fn test_key_id() -> KeyId {
		KeyId::new(TEST_KEY_ID).expect("Test key identifier should be valid.")
	}

	/// Builds an in-memory registry containing the [`TEST_CLIENT_ID`] client.
	pub fn test_registry() -> MemoryRegistry {
		let client_id = ClientId::new(TEST_CLIENT_ID).expect("Test client identifier should be valid.");
		let record = ClientRecord::with_secret(client_id, TEST_ISSUER, TEST_CLIENT_SECRET, "pepper");

		MemoryRegistry::from_records([record])
	}

	/// Builds the `Authorization: Basic ...` value for the supplied credential pair.
	pub fn basic_authorization(client_id: &str, client_secret: &str) -> String {
		format!("Basic {}", STANDARD.encode(format!("{client_id}:{client_secret}")))
	}

	/// Builds a well-formed `client_credentials` request for the test client.
	pub fn client_credentials_request() -> ApiRequest {
		ApiRequest::new(Some("grant_type=client_credentials".into()))
			.with_header("Authorization", basic_authorization(TEST_CLIENT_ID, TEST_CLIENT_SECRET))
	}

	/// Loads the fixed RSA-2048 key used as the downstream encryption recipient.
	pub fn test_encryption_key() -> RsaPrivateKey {
		RsaPrivateKey::from_pkcs8_pem(TEST_ENCRYPTION_KEY_PEM)
			.expect("Test encryption key fixture should be valid PKCS#8.")
	}

	/// Public half of [`test_encryption_key`] as an `enc` JWK.
	pub fn test_encryption_jwk() -> Jwk {
		let der = test_encryption_key()
			.to_public_key()
			.to_public_key_der()
			.expect("Test encryption key should encode as SPKI.");
		let jwk = Jwk::from_spki_der(der.as_bytes()).expect("RSA SPKI should convert to a JWK.");

		Jwk {
			alg: Some(ALG_RSA_OAEP_256.into()),
			kid: Some(TEST_ENCRYPTION_KID.into()),
			key_use: Some(USE_ENCRYPTION.into()),
			..jwk
		}
	}

	/// Decrypts a compact JWE addressed to [`test_encryption_key`].
	pub fn decrypt_jwe(jwe: &str) -> Vec<u8> {
		let segments: Vec<&str> = jwe.split('.').collect();
		let [protected, wrapped_key, iv, ciphertext, tag] = segments[..] else {
			panic!("JWE should have five segments.");
		};
		let decode = |segment: &str| {
			URL_SAFE_NO_PAD.decode(segment).expect("JWE segments should be base64url.")
		};
		let cek = test_encryption_key()
			.decrypt(Oaep::new::<Sha256>(), &decode(wrapped_key))
			.expect("Content key should unwrap.");
		let mut sealed = decode(ciphertext);

		sealed.extend_from_slice(&decode(tag));

		Aes256Gcm::new_from_slice(&cek)
			.expect("Content key should be 256 bits.")
			.decrypt(
				GenericArray::from_slice(&decode(iv)),
				Payload { msg: &sealed, aad: protected.as_bytes() },
			)
			.expect("Payload should open.")
	}

	/// Builds the shared HTTP client with short timeouts suitable for mock servers.
	pub fn test_http_client() -> ReqwestClient {
		let timeouts = HttpTimeouts {
			connect: std::time::Duration::from_secs(2),
			request: std::time::Duration::from_secs(5),
		};

		crate::http::build_http_client(&timeouts).expect("Failed to build reqwest client for tests.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{AuthError, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
