//! Access and identity token strings kept out of formatted output.

// self
use crate::_prelude::*;

const REDACTED: &str = "<redacted>";

/// Token string whose `Debug` and `Display` forms never reveal the value.
///
/// Logging goes through [`Display`], so a token interpolated into a log line by mistake
/// prints as `<redacted>`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a raw token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw token; never pass it to the logger.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `Authorization` header value carrying this token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}

	/// Unwraps the raw token.
	pub fn into_inner(self) -> String {
		self.0
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret({REDACTED}, len={})", self.0.len())
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(REDACTED)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatting_never_leaks_the_token() {
		let secret = TokenSecret::new("eyJ0eXAiOiJKV1QifQ.e30.sig");

		assert_eq!(format!("{secret:?}"), "TokenSecret(<redacted>, len=26)");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.bearer(), "Bearer eyJ0eXAiOiJKV1QifQ.e30.sig");
		assert_eq!(secret.into_inner(), "eyJ0eXAiOiJKV1QifQ.e30.sig");
	}
}
