//! Outbound HTTP client shared by the signer, registry, and JWKS consumers.
//!
//! One [`ReqwestClient`] is built per process and cloned into each collaborator, so
//! connection pools are reused across requests without module-level singletons.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	config::{ConfigError, HttpTimeouts},
};

/// Builds the shared reqwest client.
///
/// Redirects are never followed: the signer, registry, and JWKS endpoints must answer directly.
/// Every request is bounded by `timeouts.connect` and `timeouts.request`, so no outbound call
/// can wait past the invocation budget.
pub fn build_http_client(timeouts: &HttpTimeouts) -> Result<ReqwestClient, ConfigError> {
	ReqwestClient::builder()
		.redirect(Policy::none())
		.connect_timeout(timeouts.connect)
		.timeout(timeouts.request)
		.pool_idle_timeout(StdDuration::from_secs(60))
		.build()
		.map_err(ConfigError::HttpClientBuild)
}

/// Returns a short preview of a response body for error messages.
pub(crate) fn body_preview(body: &[u8]) -> String {
	const LIMIT: usize = 256;

	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	if trimmed.chars().count() <= LIMIT {
		trimmed.to_owned()
	} else {
		let mut preview: String = trimmed.chars().take(LIMIT).collect();

		preview.push('…');

		preview
	}
}
