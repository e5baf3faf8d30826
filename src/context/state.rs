//! Explicit session, resource, and callback state types.

// self
use crate::{_prelude::*, host::FrameInfo};

/// Sign-in state of an authentication context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
	/// No identity token is known.
	NoUser,
	/// A login has been started and has not completed.
	LoginInProgress,
	/// An identity token has been accepted.
	Authenticated {
		/// `upn` or `email` of the signed-in user.
		user_name: String,
	},
}

/// Token state of a single resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceState {
	/// Nothing cached and nothing in flight.
	Idle,
	/// A renewal is pending.
	Acquiring {
		/// Correlation state of the pending request.
		expected_state: String,
	},
	/// A valid token is cached.
	TokenCached,
}

/// Which kind of request a callback answers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RequestType {
	/// Login returning an identity token.
	#[default]
	Login,
	/// Silent or interactive token renewal.
	RenewToken,
	/// The state could not be attributed.
	Unknown,
}
impl RequestType {
	/// Returns a stable label for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestType::Login => "LOGIN",
			RequestType::RenewToken => "RENEW_TOKEN",
			RequestType::Unknown => "UNKNOWN",
		}
	}
}
impl Display for RequestType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// `response_type` values sent to the authorization endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseType {
	/// `id_token`
	IdToken,
	/// `token`
	Token,
	/// `id_token token`
	IdTokenToken,
}
impl ResponseType {
	/// Wire value.
	pub const fn as_str(self) -> &'static str {
		match self {
			ResponseType::IdToken => "id_token",
			ResponseType::Token => "token",
			ResponseType::IdTokenToken => "id_token token",
		}
	}
}

/// Renewal status persisted per resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenewStatus {
	/// A hidden frame is loading.
	InProgress,
	/// A response was processed.
	Completed,
	/// The renewal timed out.
	Canceled,
}
impl RenewStatus {
	/// Persisted value.
	pub const fn as_str(self) -> &'static str {
		match self {
			RenewStatus::InProgress => "In Progress",
			RenewStatus::Completed => "Completed",
			RenewStatus::Canceled => "Canceled",
		}
	}
}

/// Where a callback was observed relative to the context that issued the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackOrigin {
	/// The issuing window itself, after a full-page redirect.
	TopLevel,
	/// A popup opened by the issuing window.
	Popup,
	/// A hidden iframe embedded in the issuing window.
	Frame,
}
impl CallbackOrigin {
	/// Origin of a callback processed by the context living in `frame` itself.
	///
	/// Only a top-level window counts as [`CallbackOrigin::TopLevel`]; popups and iframes
	/// never navigate away from the callback page.
	pub fn of_frame(frame: &FrameInfo) -> Self {
		if frame.is_top_level() {
			Self::TopLevel
		} else if frame.opener.is_some() {
			Self::Popup
		} else {
			Self::Frame
		}
	}
}

/// Parameters recognized in a callback fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParameters {
	/// `access_token`
	pub access_token: Option<String>,
	/// `id_token`
	pub id_token: Option<String>,
	/// `expires_in` in seconds.
	pub expires_in: Option<String>,
	/// `session_state`
	pub session_state: Option<String>,
	/// OAuth `error`.
	pub error: Option<String>,
	/// OAuth `error_description`.
	pub error_description: Option<String>,
	/// Correlation `state`.
	pub state: Option<String>,
	/// Every other parameter.
	pub other: BTreeMap<String, String>,
}
impl CallbackParameters {
	/// Splits decoded fragment parameters into the recognized fields.
	pub fn from_map(mut params: BTreeMap<String, String>) -> Self {
		Self {
			access_token: params.remove("access_token"),
			id_token: params.remove("id_token"),
			expires_in: params.remove("expires_in"),
			session_state: params.remove("session_state"),
			error: params.remove("error"),
			error_description: params.remove("error_description"),
			state: params.remove("state"),
			other: params,
		}
	}

	/// Returns `true` when the fragment carries a token or an error description.
	pub fn is_callback(&self) -> bool {
		self.error_description.is_some() || self.access_token.is_some() || self.id_token.is_some()
	}
}

/// Structured view of a callback fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestInfo {
	/// Decoded parameters.
	pub parameters: CallbackParameters,
	/// Request kind the state was matched to.
	pub request_type: RequestType,
	/// Whether the state matched an outstanding request.
	pub state_match: bool,
	/// State returned by the authority.
	pub state_response: String,
	/// Whether the fragment is a callback at all.
	pub valid: bool,
}
