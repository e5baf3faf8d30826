// self
use crate::{
	_prelude::*,
	context::{
		AuthenticationContext, CallbackOrigin, Listener, RequestType, ResponseType,
		common::{append_query_param, guid},
	},
	error::AuthFailure,
	host::{PopupGeometry, PopupWindow},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::keys,
};

const POPUP_NAME: &str = "login";

impl AuthenticationContext {
	/// Starts a login returning an identity token.
	///
	/// Does nothing while another login is in progress. The URL goes to the display hook
	/// when one is installed, otherwise to a popup, a new window (in-iframe apps), or a
	/// top-level redirect.
	pub fn login(&self) {
		let _span = FlowSpan::new(FlowKind::Login, "login").entered();
		let started = {
			let mut state = self.0.state.lock();

			if state.login_in_progress {
				None
			} else {
				state.login_in_progress = true;
				state.request_type = RequestType::Login;

				Some((guid(), guid()))
			}
		};
		let Some((expected_state, nonce)) = started else {
			self.logger().info("Login in progress");

			return;
		};

		obs::record_flow_outcome(FlowKind::Login, FlowOutcome::Attempt);

		let store = self.store();
		let start_page = store
			.get_non_empty(keys::LOGIN_REQUEST)
			.unwrap_or_else(|| self.host().location().to_string());

		self.logger().verbose(&format!("Expected state: {expected_state} startPage:{start_page}"));
		store.save(keys::LOGIN_REQUEST, &start_page, false);
		store.save(keys::LOGIN_ERROR, "", false);
		store.save(keys::STATE_LOGIN, &expected_state, true);
		store.save(keys::NONCE_IDTOKEN, &nonce, true);
		store.save(keys::ERROR, "", false);
		store.save(keys::ERROR_DESCRIPTION, "", false);

		let mut url = self.navigate_url(ResponseType::IdToken, None, &expected_state);

		append_query_param(&mut url, "nonce", &nonce);

		let settings = self.settings();

		if let Some(display) = settings.hooks.display_call.as_ref() {
			display(&url);
		} else if settings.popup {
			let resource = settings.client_id.to_string();

			store.save(keys::STATE_LOGIN, "", false);
			self.push_renew_state(&expected_state);
			self.register_renewal(
				&resource,
				&expected_state,
				FlowKind::Login,
				settings.hooks.callback.clone().map(Listener::Hook),
			);
			self.login_popup(&url, resource, expected_state);
		} else if settings.in_iframe {
			self.prompt_user_for_iframe(&url);
		} else {
			self.prompt_user(&url);
		}
	}

	/// Opens a centered popup on `url` and polls it until it reaches the redirect URI.
	pub(crate) fn login_popup(&self, url: &Url, resource: String, expected_state: String) {
		let host = self.host();
		let geometry =
			PopupGeometry::centered(host.viewport(), PopupGeometry::WIDTH, PopupGeometry::HEIGHT);
		let Some(popup) = host.open_popup(url, POPUP_NAME, geometry) else {
			self.handle_popup_error(&resource, &expected_state, AuthFailure::PopupBlocked);

			return;
		};

		self.0.state.lock().opened_popups += 1;

		let ctx = self.clone();

		host.spawn(Box::pin(async move { ctx.poll_popup(popup, resource, expected_state).await }));
	}

	async fn poll_popup(self, popup: Box<dyn PopupWindow>, resource: String, expected_state: String) {
		let registered = {
			let mut redirect = self.settings().redirect_uri.clone();

			redirect.set_fragment(None);

			redirect.to_string()
		};
		let interval = self.settings().popup_poll_interval;

		loop {
			if popup.is_closed() {
				self.handle_popup_error(&resource, &expected_state, AuthFailure::PopupClosed);

				return;
			}

			if let Some(location) =
				popup.location().filter(|location| location.as_str().contains(&registered))
			{
				{
					let mut state = self.0.state.lock();

					state.login_in_progress = false;
					state.acquire_token_in_progress = false;
					state.opened_popups = 0;
				}

				self.logger().info("Closing popup window");
				popup.close();

				let hash = location.fragment().map(|f| format!("#{f}")).unwrap_or_default();
				let outcome = self.process_callback(&hash, CallbackOrigin::Popup);

				self.resolve_renewal(&resource, &expected_state, outcome);

				return;
			}

			self.host().sleep(interval).await;
		}
	}

	/// Records a popup failure and settles the renewal it belonged to.
	pub(crate) fn handle_popup_error(
		&self,
		resource: &str,
		expected_state: &str,
		failure: AuthFailure,
	) {
		let store = self.store();

		self.logger().warn(&failure.description());
		store.save(keys::ERROR, failure.code(), false);
		store.save(keys::ERROR_DESCRIPTION, &failure.description(), false);
		store.save(keys::LOGIN_ERROR, &failure.description(), false);

		{
			let mut state = self.0.state.lock();

			state.login_in_progress = false;
			state.acquire_token_in_progress = false;
		}

		self.resolve_renewal(resource, expected_state, Err(failure));
	}

	/// Navigates the current window to `url`.
	pub(crate) fn prompt_user(&self, url: &Url) {
		self.logger().info_pii(&format!("Navigate to:{url}"));
		self.host().navigate(url);
	}

	/// Opens `url` in a new window, falling back to the popup-disabled hook.
	pub(crate) fn prompt_user_for_iframe(&self, url: &Url) {
		self.logger().info_pii(&format!("Navigate to:{url}"));

		if self.host().open_window(url) {
			return;
		}

		self.logger().info_pii("PopUps are disabled");

		if let Some(hook) = self.settings().hooks.popup_disabled_callback.as_ref() {
			hook(url);
		}
	}
}
