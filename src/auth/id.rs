//! Strongly typed identifiers for clients and signing keys.
//!
//! A `client_id` travels inside `Basic base64(client_id:client_secret)`, so it can never contain a
//! colon. A signing key is named by whatever the signer accepts: a bare key id, an `alias/...`
//! name, or a full ARN.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (client, key).
		kind: &'static str,
	},
	/// The identifier contains a whitespace or control character.
	#[error("{kind} identifier contains whitespace or control characters.")]
	ContainsWhitespace {
		/// Kind of identifier (client, key).
		kind: &'static str,
	},
	/// The identifier contains a character its kind reserves.
	#[error("{kind} identifier cannot contain `{character}`.")]
	ReservedCharacter {
		/// Kind of identifier (client, key).
		kind: &'static str,
		/// Offending character.
		character: char,
	},
	/// The identifier exceeded the allowed byte length.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Kind of identifier (client, key).
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
}

struct Rules {
	kind: &'static str,
	max_len: usize,
	reserved: &'static [char],
}
impl Rules {
	fn check(&self, view: &str) -> Result<(), IdentifierError> {
		let kind = self.kind;

		if view.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if view.chars().any(|c| c.is_whitespace() || c.is_control()) {
			return Err(IdentifierError::ContainsWhitespace { kind });
		}
		if let Some(character) = view.chars().find(|c| self.reserved.contains(c)) {
			return Err(IdentifierError::ReservedCharacter { kind, character });
		}
		if view.len() > self.max_len {
			return Err(IdentifierError::TooLong { kind, max: self.max_len });
		}

		Ok(())
	}
}

macro_rules! def_id {
	($name:ident, $doc:literal, $rules:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			const RULES: Rules = $rules;

			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				Self::RULES.check(view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::RULES.check(&value)?;

				Ok(Self(value))
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", Self::RULES.kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

def_id! {
	ClientId,
	"OAuth client identifier presented in the Basic credentials.",
	Rules { kind: "Client", max_len: 255, reserved: &[':'] }
}
def_id! {
	KeyId,
	"Opaque handle (key id, alias, or ARN) naming a remote signing key.",
	Rules { kind: "Key", max_len: 2048, reserved: &[] }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn client_ids_cannot_break_basic_credentials() {
		assert!(ClientId::new(" client-123").is_err(), "Leading whitespace must be rejected.");
		assert!(ClientId::new("client\t123").is_err());
		assert_eq!(
			ClientId::new("client:123"),
			Err(IdentifierError::ReservedCharacter { kind: "Client", character: ':' })
		);

		let client = ClientId::new("client-123").expect("Client fixture should be valid.");

		assert_eq!(client.as_ref(), "client-123");
		assert_eq!(format!("{client:?}"), "Client(client-123)");
	}

	#[test]
	fn key_ids_accept_aliases_and_arns() {
		let arn = "arn:aws:kms:eu-west-2:123456789012:key/1a2b3c4d-5e6f-7a8b-9c0d-1e2f3a4b5c6d";
		let key = KeyId::new(arn).expect("KMS key ARNs should be valid key identifiers.");

		assert_eq!(&*key, arn);
		assert!(KeyId::new("alias/token-signing").is_ok());
		assert!(KeyId::new("").is_err());
		assert!(serde_json::from_str::<KeyId>("\"alias/signing key\"").is_err());
	}

	#[test]
	fn length_limits_differ_per_kind() {
		assert!(KeyId::new("k".repeat(2048)).is_ok());
		assert!(ClientId::new("c".repeat(255)).is_ok());
		assert_eq!(
			ClientId::new("c".repeat(256)),
			Err(IdentifierError::TooLong { kind: "Client", max: 255 })
		);
	}

	#[test]
	fn client_ids_index_maps_by_str() {
		let map: HashMap<ClientId, u8> = HashMap::from_iter([(
			ClientId::new("client-123").expect("Client used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("client-123"), Some(&7));
	}
}
