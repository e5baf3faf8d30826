//! Authentication context: login, token acquisition, callback handling, and cache upkeep.
//!
//! An [`AuthenticationContext`] is a cheap, clonable handle over one browsing context's
//! state. Every renewal is keyed by resource; callers that ask for a resource already
//! being renewed join the pending renewal and observe the same outcome. Listeners are
//! always notified after the state lock is released.

mod cache;
mod callback;
mod common;
mod interactive;
mod login;
mod renewal;
mod state;

pub use common::guid;
pub use state::*;

// std
use std::panic::{self, AssertUnwindSafe};
// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{TokenGrant, TokenSecret, User},
	config::{AuthConfig, CompletionHook, SessionConfig},
	error::AuthFailure,
	host::Host,
	log::Logger,
	obs::{self, FlowKind, FlowOutcome},
	store::{Store, keys},
};

/// Library version reported in logs and authorization URLs.
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Future returned by token acquisition.
pub type TokenFuture = Pin<Box<dyn Future<Output = Result<TokenSecret>> + Send>>;

type Outcome = std::result::Result<TokenGrant, AuthFailure>;

/// Party waiting for a renewal to settle.
enum Listener {
	Future(oneshot::Sender<Outcome>),
	Hook(CompletionHook),
}

/// Per-resource renewal bookkeeping.
enum Renewal {
	Pending { expected_state: String, kind: FlowKind, listeners: Vec<Listener> },
	Resolved { expected_state: String, status: RenewStatus },
}
impl Renewal {
	fn expected_state(&self) -> &str {
		match self {
			Renewal::Pending { expected_state, .. } | Renewal::Resolved { expected_state, .. } =>
				expected_state,
		}
	}
}

#[derive(Default)]
struct ContextState {
	user: Option<User>,
	renewals: HashMap<String, Renewal>,
	login_in_progress: bool,
	acquire_token_in_progress: bool,
	renew_states: Vec<String>,
	request_type: RequestType,
	opened_popups: usize,
}

struct ContextInner {
	settings: SessionConfig,
	host: Arc<dyn Host>,
	store: Store,
	logger: Logger,
	state: Mutex<ContextState>,
}

/// Handle to a browsing context's authentication state.
#[derive(Clone)]
pub struct AuthenticationContext(Arc<ContextInner>);
impl AuthenticationContext {
	/// Creates a context for `host`, back-filling location-dependent defaults.
	pub fn new(config: AuthConfig, host: Arc<dyn Host>) -> Self {
		let settings = SessionConfig::resolve(config, &host.location());
		let correlation_id = settings.correlation_id.clone().unwrap_or_else(guid);
		let logger = Logger::new(correlation_id, LIB_VERSION);
		let store =
			Store::new(host.storage(settings.cache_location), settings.cache_location, logger.clone());

		Self(Arc::new(ContextInner {
			settings,
			host,
			store,
			logger,
			state: Mutex::new(ContextState::default()),
		}))
	}

	/// Resolved configuration.
	pub fn settings(&self) -> &SessionConfig {
		&self.0.settings
	}

	/// Host the context drives.
	pub fn host(&self) -> &Arc<dyn Host> {
		&self.0.host
	}

	/// Persistent cache.
	pub fn store(&self) -> &Store {
		&self.0.store
	}

	/// Context logger.
	pub fn logger(&self) -> &Logger {
		&self.0.logger
	}

	/// Returns `true` when both handles share the same state.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}

	/// Number of popups opened since the last completed popup flow.
	pub fn opened_popups(&self) -> usize {
		self.0.state.lock().opened_popups
	}

	fn push_renew_state(&self, expected_state: &str) {
		let serialized = {
			let mut state = self.0.state.lock();

			state.renew_states.push(expected_state.to_owned());

			serde_json::to_string(&state.renew_states)
		};

		match serialized {
			Ok(json) => {
				self.store().save(keys::RENEW_STATES, &json, false);
			},
			Err(e) => self.logger().error("Failed to serialize renewal states", Some(&e)),
		}
	}

	/// Starts tracking a renewal for `resource`, or joins the one already pending.
	fn register_renewal(
		&self,
		resource: &str,
		expected_state: &str,
		kind: FlowKind,
		listener: Option<Listener>,
	) {
		let mut state = self.0.state.lock();

		if let Some(Renewal::Pending { expected_state: current, listeners, .. }) =
			state.renewals.get_mut(resource)
		{
			expected_state.clone_into(current);
			listeners.extend(listener);

			return;
		}

		state.renewals.insert(
			resource.to_owned(),
			Renewal::Pending {
				expected_state: expected_state.to_owned(),
				kind,
				listeners: listener.into_iter().collect(),
			},
		);
	}

	/// Settles the renewal of `resource` if it is still waiting for `expected_state`.
	fn resolve_renewal(&self, resource: &str, expected_state: &str, outcome: Outcome) -> bool {
		let (kind, listeners) = {
			let mut state = self.0.state.lock();

			if !is_waiting_for(&state, resource, expected_state) {
				return false;
			}

			let status = match outcome {
				Err(AuthFailure::RenewalTimeout) => RenewStatus::Canceled,
				_ => RenewStatus::Completed,
			};
			let previous = state.renewals.insert(
				resource.to_owned(),
				Renewal::Resolved { expected_state: expected_state.to_owned(), status },
			);

			match previous {
				Some(Renewal::Pending { kind, listeners, .. }) => (kind, listeners),
				_ => return false,
			}
		};

		obs::record_flow_outcome(kind, FlowOutcome::of(&outcome));

		for listener in listeners {
			self.deliver(listener, outcome.clone());
		}

		true
	}

	fn is_pending(&self, resource: &str, expected_state: &str) -> bool {
		is_waiting_for(&self.0.state.lock(), resource, expected_state)
	}

	/// Settles whichever pending renewal expects `state_response`.
	fn resolve_state(&self, state_response: &str, outcome: Outcome) -> bool {
		let resource = {
			let state = self.0.state.lock();

			state.renewals.iter().find_map(|(resource, renewal)| match renewal {
				Renewal::Pending { expected_state, .. } if expected_state == state_response =>
					Some(resource.clone()),
				_ => None,
			})
		};

		match resource {
			Some(resource) => self.resolve_renewal(&resource, state_response, outcome),
			None => false,
		}
	}

	fn deliver(&self, listener: Listener, outcome: Outcome) {
		match listener {
			Listener::Future(sender) => {
				let _ = sender.send(outcome);
			},
			Listener::Hook(hook) => self.invoke_hook(&hook, outcome),
		}
	}

	fn invoke_hook(&self, hook: &CompletionHook, outcome: Outcome) {
		if panic::catch_unwind(AssertUnwindSafe(|| hook(outcome))).is_err() {
			self.logger().warn("Error occurred in user defined callback function");
		}
	}
}
impl Debug for AuthenticationContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticationContext")
			.field("client_id", &self.0.settings.client_id)
			.field("store", &self.0.store)
			.finish_non_exhaustive()
	}
}

fn is_waiting_for(state: &ContextState, resource: &str, expected_state: &str) -> bool {
	matches!(
		state.renewals.get(resource),
		Some(Renewal::Pending { expected_state: current, .. }) if current == expected_state
	)
}

fn ready(outcome: std::result::Result<TokenSecret, AuthFailure>) -> TokenFuture {
	Box::pin(futures::future::ready(outcome.map_err(Error::from)))
}

async fn wait_for(receiver: oneshot::Receiver<Outcome>) -> Result<TokenSecret> {
	match receiver.await {
		Ok(Ok(grant)) => Ok(grant.token),
		Ok(Err(failure)) => Err(failure.into()),
		Err(oneshot::Canceled) => Err(AuthFailure::Abandoned.into()),
	}
}
