//! Tokens delivered to renewal listeners and the completion hook.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Kind of token carried by a [`TokenGrant`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
	/// Identity token returned by a login.
	IdToken,
	/// Access token (or identity token used as one) returned by a renewal.
	AccessToken,
}
impl TokenKind {
	/// Returns the fragment parameter name for this kind.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKind::IdToken => "id_token",
			TokenKind::AccessToken => "access_token",
		}
	}
}
impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token produced by a completed login or renewal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
	/// Token value.
	pub token: TokenSecret,
	/// Kind of token.
	pub kind: TokenKind,
}
impl TokenGrant {
	/// Wraps an identity token.
	pub fn id_token(token: impl Into<String>) -> Self {
		Self { token: TokenSecret::new(token), kind: TokenKind::IdToken }
	}

	/// Wraps an access token.
	pub fn access_token(token: impl Into<String>) -> Self {
		Self { token: TokenSecret::new(token), kind: TokenKind::AccessToken }
	}
}
