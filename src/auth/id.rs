//! Validated identifiers for client applications and browsing contexts.
//!
//! Both kinds travel through URLs, storage keys, and the context registry, so neither may
//! be empty or contain whitespace. Client ids are also bounded in length.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

/// Longest accepted client id.
pub const CLIENT_ID_MAX_LEN: usize = 128;

macro_rules! identifier {
	($(#[$meta:meta])* $name:ident, kind = $kind:literal, max_len = $max:expr) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Label used in validation errors and `Debug` output.
			pub const KIND: &'static str = $kind;

			/// Validates and wraps `value`.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				check(Self::KIND, &value, $max)?;

				Ok(Self(value))
			}

			/// Borrows the raw identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", Self::KIND, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

/// Reason an identifier was rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// Nothing was supplied.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind.
		kind: &'static str,
	},
	/// A whitespace character was found.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Identifier kind.
		kind: &'static str,
	},
	/// The value is longer than its kind allows.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Identifier kind.
		kind: &'static str,
		/// Maximum length in bytes.
		max: usize,
	},
}

identifier! {
	/// Application (client) id registered with the authority.
	ClientId, kind = "Client", max_len = Some(CLIENT_ID_MAX_LEN)
}
identifier! {
	/// Browsing context (window, popup, or iframe) used as a registry key.
	WindowId, kind = "Window", max_len = None
}

fn check(kind: &'static str, value: &str, max: Option<usize>) -> Result<(), IdentifierError> {
	match max {
		_ if value.is_empty() => Err(IdentifierError::Empty { kind }),
		_ if value.contains(char::is_whitespace) =>
			Err(IdentifierError::ContainsWhitespace { kind }),
		Some(max) if value.len() > max => Err(IdentifierError::TooLong { kind, max }),
		_ => Ok(()),
	}
}
