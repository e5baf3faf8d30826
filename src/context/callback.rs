// self
use crate::{
	_prelude::*,
	auth::{CachedToken, TokenGrant},
	context::{
		AuthenticationContext, CallbackOrigin, CallbackParameters, Outcome, RenewStatus,
		RequestInfo, RequestType,
		common::{deserialize, expires_at, resource_from_state, split_cached, strip_hash},
	},
	error::AuthFailure,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	registry::ContextRegistry,
	store::keys,
};

impl AuthenticationContext {
	/// Returns `true` when `hash` carries a token or an error description.
	pub fn is_callback(&self, hash: &str) -> bool {
		CallbackParameters::from_map(deserialize(strip_hash(hash))).is_callback()
	}

	/// Parses `hash` and attributes its state to an outstanding request.
	pub fn request_info(&self, hash: &str) -> RequestInfo {
		let mut info = RequestInfo {
			parameters: CallbackParameters::from_map(deserialize(strip_hash(hash))),
			request_type: RequestType::Unknown,
			..Default::default()
		};

		if !info.parameters.is_callback() {
			return info;
		}

		info.valid = true;

		let Some(state) = info.parameters.state.clone() else {
			self.logger().warn("No state returned");

			return info;
		};

		self.logger().verbose(&format!("State: {state}"));
		info.state_response = state;

		if self.stored_state_matches(keys::STATE_LOGIN, &info.state_response) {
			info.request_type = RequestType::Login;
			info.state_match = true;

			return info;
		}
		if self.stored_state_matches(keys::STATE_RENEW, &info.state_response) {
			info.request_type = RequestType::RenewToken;
			info.state_match = true;

			return info;
		}

		let (request_type, tracked) = {
			let state = self.0.state.lock();

			(state.request_type, state.renew_states.contains(&info.state_response))
		};

		info.request_type = request_type;
		info.state_match = tracked || self.persisted_renew_states().contains(&info.state_response);

		info
	}

	/// Persists the tokens or error carried by `info`.
	///
	/// The renewal status of the state's resource is always set to `Completed`. Protocol
	/// failures are written back into `info.parameters` as `error`/`error_description`.
	pub fn save_token_from_hash(
		&self,
		info: &mut RequestInfo,
	) -> std::result::Result<(), AuthFailure> {
		let store = self.store();

		self.logger()
			.info(&format!("State status:{}; Request type:{}", info.state_match, info.request_type));
		store.save(keys::ERROR, "", false);
		store.save(keys::ERROR_DESCRIPTION, "", false);

		let resource = resource_from_state(&info.state_response).to_owned();
		let result = if let Some(description) = info.parameters.error_description.clone() {
			let error = info.parameters.error.clone().unwrap_or_default();

			self.logger().info_pii(&format!("Error :{error}; Error description:{description}"));
			store.save(keys::ERROR, &error, false);
			store.save(keys::ERROR_DESCRIPTION, &description, false);

			if info.request_type == RequestType::Login {
				self.0.state.lock().login_in_progress = false;
				store.save(keys::LOGIN_ERROR, &description, false);
			}

			Err(AuthFailure::Server { error, description })
		} else if info.state_match {
			self.save_tokens(info, &resource)
		} else {
			let failure = AuthFailure::InvalidState { state: info.state_response.clone() };

			self.record_protocol_error(info, &failure);

			Err(failure)
		};

		let status_key = keys::scoped(keys::RENEW_STATUS, &resource);

		store.save(&status_key, RenewStatus::Completed.as_str(), false);

		result
	}

	/// Processes the callback in the host's current location, or in `hash` when given.
	///
	/// The owning context is looked up in `registry` through the frame hierarchy, so a
	/// popup or hidden iframe hands its response to the window that issued the request.
	/// Returns `false` when there is nothing to process.
	pub fn handle_window_callback(&self, registry: &ContextRegistry, hash: Option<&str>) -> bool {
		let hash = match hash {
			Some(hash) => hash.to_owned(),
			None => self.host().location().fragment().map(|f| format!("#{f}")).unwrap_or_default(),
		};

		if !self.is_callback(&hash) {
			return false;
		}

		let frame = self.host().frame();
		let (owner, origin) = registry
			.resolve(&frame)
			.unwrap_or_else(|| (self.clone(), CallbackOrigin::of_frame(&frame)));

		if let Err(failure) = owner.process_callback(&hash, origin) {
			self.logger().warn(&format!("Callback failed: {}", failure.code()));
			self.logger().warn_pii(&format!("Callback failed: {failure}"));
		}

		true
	}

	/// Saves the response in `hash` and delivers its outcome.
	///
	/// Popup and frame responses settle the pending renewal that expects their state.
	/// Top-level responses fall back to the completion hook and then leave the callback
	/// page: back to the login start page, or by clearing the fragment.
	pub fn process_callback(
		&self,
		hash: &str,
		origin: CallbackOrigin,
	) -> std::result::Result<TokenGrant, AuthFailure> {
		let _span = FlowSpan::new(FlowKind::Callback, "process_callback").entered();
		let mut info = self.request_info(hash);

		self.logger().info("Returned from redirect url");

		let outcome = self.save_token_from_hash(&mut info).and_then(|()| token_for(&info));
		let delivered = self.resolve_state(&info.state_response, outcome.clone());

		obs::record_flow_outcome(FlowKind::Callback, FlowOutcome::of(&outcome));

		match origin {
			CallbackOrigin::Frame => {},
			CallbackOrigin::Popup => self.0.state.lock().acquire_token_in_progress = false,
			CallbackOrigin::TopLevel => {
				let fallback = self.settings().hooks.callback.as_ref().filter(|_| !delivered);

				if let Some(hook) = fallback {
					self.invoke_hook(hook, outcome.clone());
				}

				self.0.state.lock().acquire_token_in_progress = false;
				self.leave_callback_page();
			},
		}

		outcome
	}

	fn leave_callback_page(&self) {
		let target = if self.settings().navigate_to_login_request_url {
			self.store().get_non_empty(keys::LOGIN_REQUEST).and_then(|raw| Url::parse(&raw).ok())
		} else {
			None
		};

		match target {
			Some(url) => self.host().navigate(&url),
			None => self.host().clear_hash(),
		}
	}

	fn save_tokens(
		&self,
		info: &mut RequestInfo,
		resource: &str,
	) -> std::result::Result<(), AuthFailure> {
		let store = self.store();

		self.logger().info("State is right");

		if let Some(session_state) = info.parameters.session_state.as_deref() {
			store.save(keys::SESSION_STATE, session_state, false);
		}
		if let Some(access_token) = info.parameters.access_token.as_deref() {
			let expiry = expires_at(self.host().now(), info.parameters.expires_in.as_deref());

			self.logger().info("Fragment has access token");
			self.cache_token(&CachedToken::expiring_at(resource, access_token, expiry));
		}

		let Some(id_token) = info.parameters.id_token.clone() else {
			return Ok(());
		};

		self.logger().info("Fragment has id token");
		self.0.state.lock().login_in_progress = false;

		let Some(user) = self.create_user(&id_token) else {
			let failure = AuthFailure::InvalidIdToken { id_token };

			self.record_protocol_error(info, &failure);

			return Err(failure);
		};

		if !self.match_nonce(&user) {
			let requested = store.get(keys::NONCE_IDTOKEN).unwrap_or_default();
			let failure = AuthFailure::NonceMismatch {
				received: user.profile.nonce.clone().unwrap_or_default(),
				requested: split_cached(&requested).collect::<Vec<_>>().join(", "),
			};

			store.save(keys::LOGIN_ERROR, &failure.description(), false);
			self.0.state.lock().user = None;

			return Err(failure);
		}

		let login_resource = self.settings().login_resource.clone();
		let expiry = user.profile.exp.unwrap_or_default();

		store.save(keys::IDTOKEN, &id_token, false);
		self.cache_token(&CachedToken::expiring_at(login_resource, id_token, expiry));

		self.0.state.lock().user = Some(user);

		Ok(())
	}

	fn cache_token(&self, entry: &CachedToken) {
		let store = self.store();

		self.remember_resource(&entry.resource);
		store.save(
			&keys::scoped(keys::ACCESS_TOKEN_KEY, &entry.resource),
			entry.access_token.expose(),
			false,
		);
		store.save(&keys::scoped(keys::EXPIRATION_KEY, &entry.resource), &entry.expiry_slot(), false);
	}

	fn record_protocol_error(&self, info: &mut RequestInfo, failure: &AuthFailure) {
		let description = failure.description();

		info.parameters.error = Some(failure.code().to_owned());
		info.parameters.error_description = Some(description.clone());
		self.store().save(keys::ERROR, failure.code(), false);
		self.store().save(keys::ERROR_DESCRIPTION, &description, false);
	}

	fn stored_state_matches(&self, key: &str, state: &str) -> bool {
		self.store().get_non_empty(key).is_some_and(|raw| split_cached(&raw).any(|s| s == state))
	}

	fn persisted_renew_states(&self) -> Vec<String> {
		self.store()
			.get_non_empty(keys::RENEW_STATES)
			.and_then(|raw| serde_json::from_str(&raw).ok())
			.unwrap_or_default()
	}
}

fn token_for(info: &RequestInfo) -> Outcome {
	let params = &info.parameters;

	match info.request_type {
		RequestType::RenewToken => params
			.access_token
			.clone()
			.or_else(|| params.id_token.clone())
			.map(TokenGrant::access_token)
			.ok_or(AuthFailure::MissingToken { expected: "access_token" }),
		RequestType::Login => params
			.id_token
			.clone()
			.map(TokenGrant::id_token)
			.ok_or(AuthFailure::MissingToken { expected: "id_token" }),
		RequestType::Unknown =>
			Err(AuthFailure::InvalidState { state: info.state_response.clone() }),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use super::*;
	use crate::{
		config::AuthConfig,
		context::{SessionState, tests::context_with},
	};

	fn config() -> AuthConfig {
		AuthConfig::builder("client-1")
			.instance("https://login.example/")
			.build()
			.expect("Test config should build.")
	}

	fn id_token(nonce: &str) -> String {
		let payload = format!(
			r#"{{"aud":"client-1","upn":"jane@contoso.com","nonce":"{nonce}","exp":4102444800}}"#
		);

		format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(payload))
	}

	#[test]
	fn callbacks_need_a_token_or_error_description() {
		let (ctx, _) = context_with(config());

		assert!(ctx.is_callback("#id_token=a.b.c&state=s"));
		assert!(ctx.is_callback("#/error=x&error_description=y"));
		assert!(!ctx.is_callback("#/home"));
		assert!(!ctx.is_callback("#error=only"));
	}

	#[test]
	fn login_states_are_matched_first() {
		let (ctx, _) = context_with(config());

		ctx.store().save(keys::STATE_LOGIN, "s-login", false);
		ctx.store().save(keys::STATE_RENEW, "s-renew||", false);

		let login = ctx.request_info("#id_token=x&state=s-login");
		let renew = ctx.request_info("#access_token=x&state=s-renew");
		let unknown = ctx.request_info("#access_token=x&state=s-other");
		let stateless = ctx.request_info("#access_token=x");

		assert_eq!((login.request_type, login.state_match), (RequestType::Login, true));
		assert_eq!((renew.request_type, renew.state_match), (RequestType::RenewToken, true));
		assert!(unknown.valid && !unknown.state_match);
		assert!(stateless.valid && stateless.state_response.is_empty());
	}

	#[test]
	fn redirect_login_saves_the_identity_token() {
		let (ctx, host) = context_with(config());

		ctx.login();

		let nonce = ctx.store().get(keys::NONCE_IDTOKEN).unwrap_or_default();
		let state = ctx.store().get(keys::STATE_LOGIN).unwrap_or_default();
		let token = id_token(&nonce);
		let outcome = ctx.process_callback(
			&format!("#id_token={token}&state={state}&session_state=ss"),
			CallbackOrigin::TopLevel,
		);

		assert_eq!(outcome, Ok(TokenGrant::id_token(token.clone())));
		assert_eq!(ctx.store().get(keys::IDTOKEN), Some(token.clone()));
		assert_eq!(ctx.store().get(keys::SESSION_STATE).as_deref(), Some("ss"));
		assert_eq!(ctx.cached_token("client-1").map(|t| t.into_inner()), Some(token));
		assert_eq!(
			ctx.session_state(),
			SessionState::Authenticated { user_name: "jane@contoso.com".into() }
		);
		assert_eq!(
			ctx.store().get(&keys::scoped(keys::RENEW_STATUS, "")).as_deref(),
			Some("Completed")
		);

		let navigations = host.navigations.lock();

		assert_eq!(
			navigations.last().map(Url::as_str),
			Some("https://app.example/index.html#/home")
		);
	}

	#[test]
	fn nonce_mismatch_records_a_login_error() {
		let (ctx, _) = context_with(config());

		ctx.login();

		let state = ctx.store().get(keys::STATE_LOGIN).unwrap_or_default();
		let outcome = ctx.process_callback(
			&format!("#id_token={}&state={state}", id_token("forged")),
			CallbackOrigin::TopLevel,
		);

		assert!(matches!(
			outcome,
			Err(AuthFailure::NonceMismatch { ref received, .. }) if received == "forged"
		));
		assert!(ctx.login_error().is_some_and(|e| e.starts_with("Nonce received: forged")));
		assert_eq!(ctx.store().get(keys::IDTOKEN), None);
		assert_eq!(ctx.session_state(), SessionState::NoUser);
	}

	#[test]
	fn server_errors_are_persisted() {
		let outcomes = Arc::new(Mutex::new(Vec::new()));
		let sink = outcomes.clone();
		let config = AuthConfig::builder("client-1")
			.instance("https://login.example/")
			.navigate_to_login_request_url(false)
			.callback(move |outcome| sink.lock().push(outcome))
			.build()
			.expect("Test config should build.");
		let (ctx, host) = context_with(config);

		ctx.login();

		let state = ctx.store().get(keys::STATE_LOGIN).unwrap_or_default();
		let failure = AuthFailure::Server {
			error: "access_denied".into(),
			description: "AADSTS65004 declined".into(),
		};
		let outcome = ctx.process_callback(
			&format!("#error=access_denied&error_description=AADSTS65004+declined&state={state}"),
			CallbackOrigin::TopLevel,
		);

		assert_eq!(outcome, Err(failure.clone()));
		assert_eq!(*outcomes.lock(), [Err(failure)]);
		assert_eq!(ctx.store().get(keys::ERROR).as_deref(), Some("access_denied"));
		assert_eq!(ctx.login_error().as_deref(), Some("AADSTS65004 declined"));
		assert!(!ctx.is_login_in_progress());
		assert_eq!(host.navigations.lock().len(), 1, "Only the login navigation should happen.");
	}

	#[test]
	fn unknown_states_are_rejected() {
		let (ctx, _) = context_with(config());
		let mut info = ctx.request_info("#access_token=AT&state=forged|https://graph");
		let result = ctx.save_token_from_hash(&mut info);

		assert_eq!(result, Err(AuthFailure::InvalidState { state: "forged|https://graph".into() }));
		assert_eq!(info.parameters.error.as_deref(), Some("Invalid_state"));
		assert_eq!(ctx.store().get(keys::ERROR).as_deref(), Some("Invalid_state"));
		assert_eq!(ctx.cached_token("https://graph"), None);
		assert_eq!(
			ctx.store().get(&keys::scoped(keys::RENEW_STATUS, "https://graph")).as_deref(),
			Some("Completed")
		);
	}

	#[test]
	fn renewal_states_tracked_in_storage_are_accepted() {
		let (ctx, _) = context_with(config());

		ctx.store().save(keys::RENEW_STATES, r#"["s1|https://graph"]"#, false);
		ctx.0.state.lock().request_type = RequestType::RenewToken;

		let mut info = ctx.request_info("#access_token=AT&expires_in=3600&state=s1%7Chttps://graph");

		assert!(info.state_match);
		assert_eq!(ctx.save_token_from_hash(&mut info), Ok(()));
		assert_eq!(ctx.cached_token("https://graph").map(|t| t.into_inner()).as_deref(), Some("AT"));
		assert_eq!(token_for(&info), Ok(TokenGrant::access_token("AT")));
	}
}
