//! Unverified identity-token decoding.
//!
//! The signature is never checked here; the token arrives over the front channel from the
//! authority and only its payload claims are read.

// crates.io
use base64::{
	Engine as _, alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
// self
use crate::_prelude::*;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new()
		.with_decode_padding_mode(DecodePaddingMode::Indifferent)
		.with_decode_allow_trailing_bits(true),
);

/// Failures raised while decoding an identity token payload.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// The token is empty.
	#[error("The id_token is empty.")]
	Empty,
	/// The token is not three dot-delimited segments with a non-empty payload.
	#[error("The returned id_token is not parseable.")]
	Malformed,
	/// The payload segment is not valid base64url.
	#[error("The returned id_token could not be base64 url safe decoded.")]
	Base64(#[from] base64::DecodeError),
	/// The decoded payload is not UTF-8.
	#[error("The returned id_token payload is not valid UTF-8.")]
	Utf8(#[from] std::string::FromUtf8Error),
	/// The decoded payload is not a JSON claims object.
	#[error("The returned id_token could not be decoded.")]
	Json(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// Claims read from an identity token payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Audience; must match the client id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aud: Option<String>,
	/// User principal name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub upn: Option<String>,
	/// E-mail address, used when `upn` is absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Nonce echoed from the authorization request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// Session identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sid: Option<String>,
	/// Expiry in epoch seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exp: Option<i64>,
	/// Remaining claims, kept verbatim.
	#[serde(flatten)]
	pub other: serde_json::Map<String, serde_json::Value>,
}
impl IdTokenClaims {
	/// Decodes the payload segment of `token`.
	pub fn decode(token: &str) -> Result<Self, DecodeError> {
		if token.is_empty() {
			return Err(DecodeError::Empty);
		}

		let payload = payload_segment(token).ok_or(DecodeError::Malformed)?;
		let bytes = URL_SAFE_LENIENT.decode(payload)?;
		let json = String::from_utf8(bytes)?;
		let mut deserializer = serde_json::Deserializer::from_str(&json);

		Ok(serde_path_to_error::deserialize(&mut deserializer)?)
	}

	/// Returns `true` when `aud` equals `client_id`, ignoring ASCII case.
	pub fn audience_matches(&self, client_id: &str) -> bool {
		self.aud.as_deref().is_some_and(|aud| aud.eq_ignore_ascii_case(client_id))
	}
}

fn payload_segment(token: &str) -> Option<&str> {
	if token.chars().any(char::is_whitespace) {
		return None;
	}

	let mut parts = token.split('.');
	let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);

	if parts.next().is_some() || payload.is_empty() {
		return None;
	}

	Some(payload)
}
