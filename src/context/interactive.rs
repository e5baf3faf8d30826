// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	context::{
		AuthenticationContext, Listener, RequestType, ResponseType, TokenFuture,
		common::{
			append_query_param, append_raw_query, guid, has_query_param, remove_query_param,
		},
		ready, wait_for,
	},
	error::AuthFailure,
	obs::{FlowKind, FlowSpan},
	store::keys,
};

impl AuthenticationContext {
	/// Acquires a token for `resource` through a popup with `prompt=select_account`.
	///
	/// `extra_query_parameters` is a raw `a=b&c=d` string; `claims` may only be given when
	/// the extra parameters do not already carry one.
	pub fn acquire_token_popup(
		&self,
		resource: &str,
		extra_query_parameters: Option<&str>,
		claims: Option<&str>,
	) -> TokenFuture {
		let span =
			FlowSpan::new(FlowKind::InteractiveRenewal, "acquire_token_popup").with_resource(resource);
		let (url, expected_state) =
			match self.interactive_url(resource, extra_query_parameters, claims) {
				Ok(prepared) => prepared,
				Err(failure) => return ready(Err(failure)),
			};
		let (sender, receiver) = oneshot::channel();

		self.push_renew_state(&expected_state);
		self.register_renewal(
			resource,
			&expected_state,
			FlowKind::InteractiveRenewal,
			Some(Listener::Future(sender)),
		);
		self.login_popup(&url, resource.to_owned(), expected_state);

		Box::pin(span.instrument(wait_for(receiver)))
	}

	/// Acquires a token for `resource` through a full-page redirect.
	///
	/// The outcome is delivered to the completion hook when the application reloads on
	/// the redirect URI and processes the callback.
	pub fn acquire_token_redirect(
		&self,
		resource: &str,
		extra_query_parameters: Option<&str>,
		claims: Option<&str>,
	) -> std::result::Result<(), AuthFailure> {
		let _span = FlowSpan::new(FlowKind::InteractiveRenewal, "acquire_token_redirect")
			.with_resource(resource)
			.entered();
		let (url, expected_state) = self.interactive_url(resource, extra_query_parameters, claims)?;
		let store = self.store();

		store.save(keys::LOGIN_REQUEST, self.host().location().as_str(), false);
		store.save(keys::STATE_RENEW, &expected_state, true);
		self.prompt_user(&url);

		Ok(())
	}

	fn interactive_url(
		&self,
		resource: &str,
		extra_query_parameters: Option<&str>,
		claims: Option<&str>,
	) -> std::result::Result<(Url, String), AuthFailure> {
		if resource.is_empty() {
			self.logger().warn("resource is required");

			return Err(AuthFailure::ResourceRequired);
		}

		let Some(user) = self.cached_user() else {
			self.logger().warn("User login is required");

			return Err(AuthFailure::LoginRequired);
		};

		if self.0.state.lock().acquire_token_in_progress {
			self.logger().warn("Acquire token interactive is already in progress");

			return Err(AuthFailure::InteractionInProgress);
		}

		let expected_state = format!("{}|{resource}", guid());
		let mut url = self.navigate_url(ResponseType::Token, Some(resource), &expected_state);

		remove_query_param(&mut url, "prompt");
		append_query_param(&mut url, "prompt", "select_account");

		if let Some(extra) = extra_query_parameters {
			append_raw_query(&mut url, extra);
		}

		if let Some(claims) = claims.filter(|claims| !claims.is_empty()) {
			if has_query_param(&url, "claims") {
				self.logger().warn("Claims cannot be passed as an extraQueryParameter");

				return Err(AuthFailure::ClaimsConflict);
			}

			append_query_param(&mut url, "claims", claims);
		}

		self.add_hint_parameters(&mut url, Some(&user));

		{
			let mut state = self.0.state.lock();

			state.request_type = RequestType::RenewToken;
			state.acquire_token_in_progress = true;
		}

		self.logger().info(&format!("acquireToken interactive is called for the resource {resource}"));

		Ok((url, expected_state))
	}
}
