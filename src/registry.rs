//! Process-local registry of authentication contexts keyed by window.
//!
//! Popups and hidden iframes load the application on the redirect URI with their own
//! context. The registry lets that context find the one that issued the request by
//! walking the frame hierarchy instead of reaching through global window properties.

// self
use crate::{
	_prelude::*,
	auth::WindowId,
	config::AuthConfig,
	context::{AuthenticationContext, CallbackOrigin},
	host::{FrameInfo, Host},
};

/// Shared map from window id to the context living in that window.
#[derive(Clone, Debug, Default)]
pub struct ContextRegistry(Arc<RwLock<HashMap<WindowId, AuthenticationContext>>>);
impl ContextRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a context for `host` and registers it under the host's window id.
	pub fn install(&self, config: AuthConfig, host: Arc<dyn Host>) -> AuthenticationContext {
		let context = AuthenticationContext::new(config, host);

		self.register(context.host().frame().id, context.clone());

		context
	}

	/// Registers `context` for `window`, returning the context it replaced.
	pub fn register(
		&self,
		window: WindowId,
		context: AuthenticationContext,
	) -> Option<AuthenticationContext> {
		self.0.write().insert(window, context)
	}

	/// Context registered for `window`.
	pub fn get(&self, window: &WindowId) -> Option<AuthenticationContext> {
		self.0.read().get(window).cloned()
	}

	/// Removes the context registered for `window`.
	pub fn remove(&self, window: &WindowId) -> Option<AuthenticationContext> {
		self.0.write().remove(window)
	}

	/// Finds the context that should process a callback observed in `frame`.
	///
	/// The popup opener is tried first, then the embedding parent, then the window itself.
	pub fn resolve(&self, frame: &FrameInfo) -> Option<(AuthenticationContext, CallbackOrigin)> {
		let contexts = self.0.read();

		if let Some(context) = frame.opener.as_ref().and_then(|opener| contexts.get(opener)) {
			return Some((context.clone(), CallbackOrigin::Popup));
		}
		if let Some(context) = frame.parent.as_ref().and_then(|parent| contexts.get(parent)) {
			return Some((context.clone(), CallbackOrigin::Frame));
		}

		contexts.get(&frame.id).map(|context| (context.clone(), CallbackOrigin::of_frame(frame)))
	}
}
