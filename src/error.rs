//! Crate-level error types shared by the context, stores, and the bearer adapter.

// self
use crate::{_prelude::*, auth::IdentifierError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Login, renewal, or callback failure reported by the authentication context.
	#[error(transparent)]
	Auth(#[from] AuthFailure),
	/// Transport failure raised by the bearer-token HTTP adapter.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl Error {
	/// Returns the authentication failure carried by this error, if any.
	pub fn as_auth(&self) -> Option<&AuthFailure> {
		match self {
			Self::Auth(failure) => Some(failure),
			_ => None,
		}
	}
}

/// Configuration failures raised while constructing an authentication context.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client identifier is missing or malformed.
	#[error("clientId is required: {0}")]
	InvalidClientId(#[from] IdentifierError),
	/// A configured URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Configuration field that failed to parse.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The authority instance cannot carry a path (e.g. `data:` URLs).
	#[error("The instance URL `{url}` cannot be used as an authority base.")]
	InvalidInstance {
		/// Offending instance URL.
		url: String,
	},
}
impl ConfigError {
	/// Builds an [`ConfigError::InvalidUrl`] for the named field.
	pub fn invalid_url(field: &'static str, source: url::ParseError) -> Self {
		Self::InvalidUrl { field, source }
	}
}

/// Failures surfaced to callers of login and token acquisition.
///
/// The type is `Clone` because a single renewal outcome fans out to every listener that
/// joined it. [`code`](Self::code) and [`description`](Self::description) return the
/// strings persisted under `adal.error` and `adal.error.description`.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthFailure {
	/// The resource argument was empty.
	#[error("resource is required")]
	ResourceRequired,
	/// No user is known and no login hint was configured.
	#[error("User login is required")]
	LoginRequired,
	/// Another interactive acquisition is still outstanding.
	#[error("Acquire token interactive is already in progress")]
	InteractionInProgress,
	/// `claims` was supplied both explicitly and inside the extra query parameters.
	#[error("Claims cannot be passed as an extraQueryParameter")]
	ClaimsConflict,
	/// No usable identity token is cached.
	#[error("User information is not available")]
	UserUnavailable,
	/// The authorization server returned an OAuth error.
	#[error("{description}")]
	Server {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`.
		description: String,
	},
	/// The response state matched no outstanding request.
	#[error("Invalid_state. state: {state}")]
	InvalidState {
		/// State value carried by the response.
		state: String,
	},
	/// The identity token could not be decoded or was issued for another audience.
	#[error("Invalid id_token. id_token: {id_token}")]
	InvalidIdToken {
		/// Raw identity token from the response.
		id_token: String,
	},
	/// The identity token nonce differs from every nonce that was requested.
	#[error("Nonce received: {received} is not same as requested: {requested}")]
	NonceMismatch {
		/// Nonce carried by the identity token.
		received: String,
		/// Nonce values recorded when the request was issued.
		requested: String,
	},
	/// The response carried neither a token nor an error.
	#[error("Response did not contain the requested {expected}")]
	MissingToken {
		/// Token type the request expected.
		expected: &'static str,
	},
	/// The hidden-frame renewal did not complete before the load timeout.
	#[error("Token renewal operation failed due to timeout")]
	RenewalTimeout,
	/// The host refused to open a popup window.
	#[error("Popup Window is null. This can happen if you are using IE")]
	PopupBlocked,
	/// The popup window closed before reaching the redirect URI.
	#[error(
		"Popup Window closed by UI action/ Popup Window handle destroyed due to cross zone navigation in IE/Edge"
	)]
	PopupClosed,
	/// The context was dropped while the renewal was still pending.
	#[error("Token renewal was abandoned before completion")]
	Abandoned,
}
impl AuthFailure {
	/// Short error code, mirroring the OAuth `error` field.
	pub fn code(&self) -> &str {
		match self {
			Self::ResourceRequired => "resource is required",
			Self::LoginRequired => "login required",
			Self::InteractionInProgress => "Acquire token interactive is already in progress",
			Self::ClaimsConflict => "invalid claims",
			Self::UserUnavailable => "user unavailable",
			Self::Server { error, .. } => error,
			Self::InvalidState { .. } => "Invalid_state",
			Self::InvalidIdToken { .. } => "invalid id_token",
			Self::NonceMismatch { .. } => "nonce mismatch",
			Self::MissingToken { .. } => "missing token",
			Self::RenewalTimeout => "Token Renewal Failed",
			Self::PopupBlocked => "Error opening popup",
			Self::PopupClosed => "Popup Window closed",
			Self::Abandoned => "renewal abandoned",
		}
	}

	/// Human-readable description, mirroring the OAuth `error_description` field.
	pub fn description(&self) -> String {
		self.to_string()
	}

	/// Returns `true` for failures raised before any navigation happened.
	pub fn is_usage(&self) -> bool {
		matches!(
			self,
			Self::ResourceRequired
				| Self::LoginRequired
				| Self::InteractionInProgress
				| Self::ClaimsConflict
				| Self::UserUnavailable
		)
	}
}

/// Transport-level failures raised while the bearer adapter talks to the resource server.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the resource endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Outbound request could not be assembled.
	#[error("HTTP request could not be constructed.")]
	Request(#[from] oauth2::http::Error),
	/// The acquired token cannot be carried in an HTTP header.
	#[error("Access token contains characters that are invalid in an HTTP header.")]
	InvalidHeader(#[from] oauth2::http::header::InvalidHeaderValue),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
