//! Optional observability for authentication flows.
//!
//! # Feature Flags
//!
//! - `tracing` opens spans named `oauth2_implicit.flow` with `flow` and `stage` fields and
//!   routes [`crate::log::TracingSink`] lines to `tracing` events.
//! - `metrics` increments the `oauth2_implicit_flow_total` counter, labeled by `flow` and
//!   `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flows driven by an authentication context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Redirect or popup login.
	Login,
	/// Hidden-iframe token or identity token renewal.
	SilentRenewal,
	/// Popup or redirect token acquisition with user interaction.
	InteractiveRenewal,
	/// Processing of an authorization response fragment.
	Callback,
	/// Cache clearing and logout navigation.
	Logout,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Login => "login",
			FlowKind::SilentRenewal => "silent_renewal",
			FlowKind::InteractiveRenewal => "interactive_renewal",
			FlowKind::Callback => "callback",
			FlowKind::Logout => "logout",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded per flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// A flow was started.
	Attempt,
	/// A caller joined a flow that was already pending.
	Joined,
	/// The flow delivered a token.
	Success,
	/// The flow delivered a failure.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Joined => "joined",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}

	/// Maps a delivered result onto its outcome label.
	pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure }
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
