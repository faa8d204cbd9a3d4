//! Thin request/response framing for the gateway-facing handlers.
//!
//! The gateway owns HTTP parsing; handlers only see an optional body and a header map, and return
//! a status, headers, and a JSON body.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::_prelude::*;

/// `Cache-Control` value attached to every error response.
pub const NO_STORE: &str = "no-store";
/// Header carrying the JSON content type.
pub const CONTENT_TYPE: &str = "content-type";
/// Header carrying cache directives.
pub const CACHE_CONTROL: &str = "cache-control";

const APPLICATION_JSON: &str = "application/json";

/// Case-insensitive header map; names are stored lowercased.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, String>);
impl Headers {
	/// Inserts or replaces a header.
	pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
		self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
	}

	/// Looks a header up by name, ignoring case.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns true when no headers are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterator over `(lowercased name, value)` pairs.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
	}
}
impl<K, V> FromIterator<(K, V)> for Headers
where
	K: AsRef<str>,
	V: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		let mut headers = Self::default();

		for (name, value) in iter {
			headers.insert(name, value);
		}

		headers
	}
}

/// Incoming request as handed over by the gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiRequest {
	/// Raw body; `None` when the gateway delivered no body.
	pub body: Option<String>,
	/// Request headers.
	pub headers: Headers,
}
impl ApiRequest {
	/// Creates a request with no headers.
	pub fn new(body: Option<String>) -> Self {
		Self { body, headers: Headers::default() }
	}

	/// Adds a header.
	pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.insert(name, value);

		self
	}
}

/// Response returned to the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: Headers,
	/// JSON body.
	pub body: String,
}
impl ApiResponse {
	/// Serializes `body` as a JSON response.
	pub fn json<T>(status: u16, body: &T) -> Self
	where
		T: ?Sized + Serialize,
	{
		match serde_json::to_string(body) {
			Ok(body) => Self { status, headers: json_headers(), body },
			Err(e) => Self::from_error(&AuthError::server("Failed to serialize response", e)),
		}
	}

	/// Builds the OAuth error response for `error`; caching is always disabled.
	pub fn from_error(error: &AuthError) -> Self {
		let body = serde_json::json!({
			"error": error.oauth_error(),
			"error_description": error.description(),
		});

		Self { status: error.status(), headers: json_headers(), body: body.to_string() }
			.with_header(CACHE_CONTROL, NO_STORE)
	}

	/// Maps a handler result to `200` or the error response.
	pub fn from_result<T>(result: &Result<T>) -> Self
	where
		T: Serialize,
	{
		match result {
			Ok(body) => Self::json(200, body),
			Err(e) => Self::from_error(e),
		}
	}

	/// Adds a header.
	pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Deserializes the JSON body.
	pub fn json_body<T>(&self) -> serde_json::Result<T>
	where
		T: DeserializeOwned,
	{
		serde_json::from_str(&self.body)
	}
}

fn json_headers() -> Headers {
	[(CONTENT_TYPE, APPLICATION_JSON)].into_iter().collect()
}
