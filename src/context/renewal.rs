// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	context::{
		AuthenticationContext, Listener, Renewal, RequestType, ResponseType, TokenFuture,
		common::{append_query_param, guid, remove_query_param},
		ready,
		state::RenewStatus,
		wait_for,
	},
	error::AuthFailure,
	host::ABOUT_BLANK,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::keys,
};

const FRAME_RETRY_DELAY: Duration = Duration::milliseconds(500);
const RENEW_FRAME_PREFIX: &str = "adalRenewFrame";
const ID_TOKEN_FRAME: &str = "adalIdTokenFrame";

impl AuthenticationContext {
	/// Returns a token for `resource`, renewing it silently in a hidden iframe when needed.
	///
	/// A valid cached token resolves immediately. Concurrent calls for a resource whose
	/// renewal is pending share that renewal's outcome. The client id as resource renews
	/// the identity token itself.
	pub fn acquire_token(&self, resource: &str) -> TokenFuture {
		let span = FlowSpan::new(FlowKind::SilentRenewal, "acquire_token").with_resource(resource);

		if resource.is_empty() {
			self.logger().warn("resource is required");

			return ready(Err(AuthFailure::ResourceRequired));
		}
		if let Some(token) = self.cached_token(resource) {
			self.logger().info(&format!("Token is already in cache for resource:{resource}"));

			return ready(Ok(token));
		}

		let user = self.cached_user();

		if user.is_none() && !self.settings().has_login_hint() {
			self.logger().warn("User login is required");

			return ready(Err(AuthFailure::LoginRequired));
		}

		let (sender, receiver) = oneshot::channel();
		let fresh = {
			let mut state = self.0.state.lock();

			if let Some(Renewal::Pending { listeners, .. }) = state.renewals.get_mut(resource) {
				listeners.push(Listener::Future(sender));

				None
			} else {
				state.request_type = RequestType::RenewToken;

				Some(sender)
			}
		};

		if let Some(sender) = fresh {
			obs::record_flow_outcome(FlowKind::SilentRenewal, FlowOutcome::Attempt);

			let listener = Listener::Future(sender);

			if resource == &*self.settings().client_id {
				let response_type = if user.is_some() {
					self.logger().verbose("renewing idtoken");

					ResponseType::IdToken
				} else {
					self.logger().verbose("renewing idtoken and access_token");

					ResponseType::IdTokenToken
				};

				self.renew_id_token(listener, response_type);
			} else {
				let response_type = if user.is_some() {
					self.logger().verbose("renewing access_token");

					ResponseType::Token
				} else {
					self.logger().verbose("renewing access_token and idtoken");

					ResponseType::IdTokenToken
				};

				self.renew_token(resource, listener, response_type);
			}
		} else {
			obs::record_flow_outcome(FlowKind::SilentRenewal, FlowOutcome::Joined);
			self.logger().verbose(&format!("Renewal already pending for resource:{resource}"));
		}

		Box::pin(span.instrument(wait_for(receiver)))
	}

	fn renew_token(&self, resource: &str, listener: Listener, response_type: ResponseType) {
		self.logger().info(&format!("renewToken is called for resource:{resource}"));

		let frame_name = format!("{RENEW_FRAME_PREFIX}{resource}");
		let expected_state = format!("{}|{resource}", guid());
		let url = self.renewal_url(response_type, resource, &expected_state);

		self.start_silent_renewal(url, frame_name, resource, expected_state, listener);
	}

	fn renew_id_token(&self, listener: Listener, response_type: ResponseType) {
		self.logger().info("renewIdToken is called");

		let resource = self.settings().client_id.to_string();
		let expected_state = format!("{}|{resource}", guid());
		let url = self.renewal_url(response_type, &resource, &expected_state);

		self.start_silent_renewal(url, ID_TOKEN_FRAME.to_owned(), &resource, expected_state, listener);
	}

	/// Builds a `prompt=none` authorization URL; identity-token responses carry a fresh nonce.
	fn renewal_url(&self, response_type: ResponseType, resource: &str, expected_state: &str) -> Url {
		let mut url = self.navigate_url(response_type, Some(resource), expected_state);

		remove_query_param(&mut url, "prompt");

		if response_type != ResponseType::Token {
			let nonce = guid();

			self.store().save(keys::NONCE_IDTOKEN, &nonce, true);
			append_query_param(&mut url, "nonce", &nonce);
		}

		append_query_param(&mut url, "prompt", "none");
		self.add_hint_parameters(&mut url, self.cached_user().as_ref());

		url
	}

	fn start_silent_renewal(
		&self,
		url: Url,
		frame_name: String,
		resource: &str,
		expected_state: String,
		listener: Listener,
	) {
		self.push_renew_state(&expected_state);
		self.logger().verbose(&format!("Renew token Expected state: {expected_state}"));
		self.register_renewal(resource, &expected_state, FlowKind::SilentRenewal, Some(listener));
		self.logger().verbose_pii(&format!("Navigate to:{url}"));

		if let (Some(frame), Ok(blank)) =
			(self.host().hidden_frame(&frame_name), Url::parse(ABOUT_BLANK))
		{
			frame.navigate(&blank);
		}

		self.load_frame_timeout(url, frame_name, resource.to_owned(), expected_state);
	}

	/// Marks the renewal in progress, loads the frame, and arms the renewal timeout.
	fn load_frame_timeout(
		&self,
		url: Url,
		frame_name: String,
		resource: String,
		expected_state: String,
	) {
		self.logger().verbose(&format!("Set loading state to pending for: {resource}"));
		self.store().save(
			&keys::scoped(keys::RENEW_STATUS, &resource),
			RenewStatus::InProgress.as_str(),
			false,
		);
		self.load_frame(url, frame_name);

		let ctx = self.clone();
		let timeout = self.settings().load_frame_timeout;

		self.host().spawn(Box::pin(async move {
			ctx.host().sleep(timeout).await;
			ctx.expire_renewal(&resource, &expected_state);
		}));
	}

	/// Points the hidden frame at `url` once it has settled on a blank page.
	fn load_frame(&self, url: Url, frame_name: String) {
		self.logger().info(&format!("LoadFrame: {frame_name}"));

		let ctx = self.clone();

		self.host().spawn(Box::pin(async move {
			loop {
				ctx.host().sleep(FRAME_RETRY_DELAY).await;

				let Some(frame) = ctx.host().hidden_frame(&frame_name) else {
					return;
				};

				if !frame.is_blank() {
					return;
				}

				frame.navigate(&url);
			}
		}));
	}

	/// Fails the renewal with a timeout unless a response already settled it.
	fn expire_renewal(&self, resource: &str, expected_state: &str) {
		if !self.is_pending(resource, expected_state) {
			return;
		}

		self.logger().verbose(&format!(
			"Loading frame has timed out after: {} seconds for resource {resource}",
			self.settings().load_frame_timeout.whole_seconds()
		));
		self.store().save(
			&keys::scoped(keys::RENEW_STATUS, resource),
			RenewStatus::Canceled.as_str(),
			false,
		);
		self.resolve_renewal(resource, expected_state, Err(AuthFailure::RenewalTimeout));
	}
}
