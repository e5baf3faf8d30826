// self
use crate::{
	auth::{CachedToken, IdTokenClaims, TokenSecret, User},
	context::{
		AuthenticationContext, Renewal, ResourceState, SessionState,
		common::{host_from_uri, split_cached},
		state::RenewStatus,
	},
	error::AuthFailure,
	obs::{FlowKind, FlowSpan},
	store::keys,
};

impl AuthenticationContext {
	/// Returns the cached token for `resource` while it is outside the renewal window.
	///
	/// Expired entries are blanked (token `""`, expiry `"0"`) on first observation.
	pub fn cached_token(&self, resource: &str) -> Option<TokenSecret> {
		if !self.has_resource(resource) {
			return None;
		}

		let store = self.store();
		let token_key = keys::scoped(keys::ACCESS_TOKEN_KEY, resource);
		let expiry_key = keys::scoped(keys::EXPIRATION_KEY, resource);
		let token = store.get(&token_key).unwrap_or_default();
		let expiry = store.get(&expiry_key).unwrap_or_default();
		let now = self.host().now();

		match CachedToken::from_slots(resource, &token, &expiry) {
			Some(entry) if entry.is_valid_at(now, self.settings().expire_offset) =>
				Some(entry.access_token),
			_ => {
				if !token.is_empty() || expiry != "0" {
					store.save(&token_key, "", false);
					store.save(&expiry_key, "0", false);
				}

				None
			},
		}
	}

	/// Returns `true` when `resource` was ever recorded in the token key list.
	pub fn has_resource(&self, resource: &str) -> bool {
		let needle = format!("{resource}{}", keys::RESOURCE_DELIMITER);

		self.store().get(keys::TOKEN_KEYS).is_some_and(|list| list.contains(&needle))
	}

	/// Returns the in-memory user, loading it from the stored identity token on first use.
	pub fn cached_user(&self) -> Option<User> {
		if let Some(user) = self.0.state.lock().user.clone() {
			return Some(user);
		}

		let id_token = self.store().get_non_empty(keys::IDTOKEN)?;
		let user = self.create_user(&id_token)?;

		self.0.state.lock().user = Some(user.clone());

		Some(user)
	}

	/// Returns the signed-in user or [`AuthFailure::UserUnavailable`].
	pub fn user(&self) -> std::result::Result<User, AuthFailure> {
		match self.cached_user() {
			Some(user) => {
				self.logger().info("User exists in cache");

				Ok(user)
			},
			None => {
				self.logger().warn("User information is not available");

				Err(AuthFailure::UserUnavailable)
			},
		}
	}

	/// Last login failure description.
	pub fn login_error(&self) -> Option<String> {
		self.store().get_non_empty(keys::LOGIN_ERROR)
	}

	/// Current sign-in state.
	pub fn session_state(&self) -> SessionState {
		if self.0.state.lock().login_in_progress {
			return SessionState::LoginInProgress;
		}

		match self.cached_user() {
			Some(user) => SessionState::Authenticated { user_name: user.user_name },
			None => SessionState::NoUser,
		}
	}

	/// Current token state of `resource`.
	pub fn resource_state(&self, resource: &str) -> ResourceState {
		let pending = match self.0.state.lock().renewals.get(resource) {
			Some(Renewal::Pending { expected_state, .. }) => Some(expected_state.clone()),
			_ => None,
		};

		if let Some(expected_state) = pending {
			ResourceState::Acquiring { expected_state }
		} else if self.cached_token(resource).is_some() {
			ResourceState::TokenCached
		} else {
			ResourceState::Idle
		}
	}

	/// Correlation state of the latest renewal of `resource`.
	pub fn expected_state_for(&self, resource: &str) -> Option<String> {
		self.0.state.lock().renewals.get(resource).map(|renewal| renewal.expected_state().to_owned())
	}

	/// In-memory status of the latest renewal of `resource`.
	pub fn renewal_status(&self, resource: &str) -> Option<RenewStatus> {
		match self.0.state.lock().renewals.get(resource)? {
			Renewal::Pending { .. } => Some(RenewStatus::InProgress),
			Renewal::Resolved { status, .. } => Some(*status),
		}
	}

	/// Returns `true` while a login is outstanding.
	pub fn is_login_in_progress(&self) -> bool {
		self.0.state.lock().login_in_progress
	}

	/// Returns `true` while an interactive acquisition is outstanding.
	pub fn is_acquire_token_in_progress(&self) -> bool {
		self.0.state.lock().acquire_token_in_progress
	}

	/// Blanks every persisted slot and every cached token.
	pub fn clear_cache(&self) {
		let store = self.store();

		for key in [
			keys::LOGIN_REQUEST,
			keys::SESSION_STATE,
			keys::STATE_LOGIN,
			keys::STATE_RENEW,
			keys::RENEW_STATES,
			keys::NONCE_IDTOKEN,
			keys::IDTOKEN,
			keys::ERROR,
			keys::ERROR_DESCRIPTION,
			keys::LOGIN_ERROR,
		] {
			store.save(key, "", false);
		}

		if let Some(list) = store.get_non_empty(keys::TOKEN_KEYS) {
			for resource in list.split(keys::RESOURCE_DELIMITER).filter(|r| !r.is_empty()) {
				store.save(&keys::scoped(keys::ACCESS_TOKEN_KEY, resource), "", false);
				store.save(&keys::scoped(keys::EXPIRATION_KEY, resource), "0", false);
			}
		}

		store.save(keys::TOKEN_KEYS, "", false);

		let mut state = self.0.state.lock();

		state.renew_states.clear();
		state.renewals.retain(|_, renewal| matches!(renewal, Renewal::Pending { .. }));
	}

	/// Blanks the cached token of a single resource.
	pub fn clear_cache_for_resource(&self, resource: &str) {
		let store = self.store();

		store.save(keys::STATE_RENEW, "", false);
		store.save(keys::ERROR, "", false);
		store.save(keys::ERROR_DESCRIPTION, "", false);

		if self.has_resource(resource) {
			store.save(&keys::scoped(keys::ACCESS_TOKEN_KEY, resource), "", false);
			store.save(&keys::scoped(keys::EXPIRATION_KEY, resource), "0", false);
		}
	}

	/// Clears the cache, forgets the user, and navigates to the logout endpoint.
	pub fn log_out(&self) {
		let _span = FlowSpan::new(FlowKind::Logout, "log_out").entered();

		self.clear_cache();
		self.0.state.lock().user = None;

		let settings = self.settings();
		let url = match settings.logout_uri.clone() {
			Some(url) => url,
			None => {
				let mut url = settings.authority_endpoint("logout");

				url.query_pairs_mut()
					.append_pair("post_logout_redirect_uri", settings.post_logout_redirect_uri.as_str());

				url
			},
		};

		self.logger().info_pii(&format!("Logout navigate to: {url}"));
		self.prompt_user(&url);
	}

	/// Maps an endpoint to the resource whose token it should carry.
	///
	/// Anonymous substrings win, then configured substrings in order. Any other endpoint on
	/// the application's own host, or any relative endpoint, maps to the login resource.
	pub fn resource_for_endpoint(&self, endpoint: &str) -> Option<String> {
		let settings = self.settings();

		if settings.anonymous_endpoints.iter().any(|anonymous| endpoint.contains(anonymous.as_str()))
		{
			return None;
		}
		if let Some((_, resource)) =
			settings.endpoints.iter().find(|(configured, _)| endpoint.contains(configured.as_str()))
		{
			return Some(resource.clone());
		}

		if endpoint.contains("http://") || endpoint.contains("https://") {
			if host_from_uri(endpoint) == host_from_uri(settings.redirect_uri.as_str()) {
				return Some(settings.login_resource.clone());
			}

			None
		} else {
			Some(settings.login_resource.clone())
		}
	}

	/// Decodes `id_token` and checks its audience against the client id.
	pub(crate) fn create_user(&self, id_token: &str) -> Option<User> {
		let claims = match IdTokenClaims::decode(id_token) {
			Ok(claims) => claims,
			Err(e) => {
				self.logger().error("The returned id_token could not be decoded", Some(&e));

				return None;
			},
		};

		if claims.aud.is_none() {
			return None;
		}

		if claims.audience_matches(&self.settings().client_id) {
			Some(User::from_claims(claims))
		} else {
			self.logger().warn("IdToken has invalid aud field");

			None
		}
	}

	/// Returns `true` when the user's nonce is one of the nonces that were requested.
	pub(crate) fn match_nonce(&self, user: &User) -> bool {
		let Some(nonce) = user.profile.nonce.as_deref() else {
			return false;
		};

		self.store()
			.get_non_empty(keys::NONCE_IDTOKEN)
			.is_some_and(|stored| split_cached(&stored).any(|requested| requested == nonce))
	}

	/// Records `resource` in the token key list once.
	pub(crate) fn remember_resource(&self, resource: &str) {
		if !self.has_resource(resource) {
			let mut list = self.store().get(keys::TOKEN_KEYS).unwrap_or_default();

			list.push_str(resource);
			list.push_str(keys::RESOURCE_DELIMITER);

			self.store().save(keys::TOKEN_KEYS, &list, false);
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use super::*;
	use crate::{config::AuthConfig, context::tests::context_with};

	fn config() -> AuthConfig {
		AuthConfig::builder("client-1")
			.instance("https://login.example/")
			.redirect_uri("https://app.example/index.html")
			.endpoint("https://graph.example/", "https://graph")
			.endpoint("https://graph.example/me", "https://never")
			.anonymous_endpoint("/public/")
			.build()
			.expect("Test config should build.")
	}

	fn id_token(payload: &str) -> String {
		format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(payload))
	}

	fn seed_token(ctx: &AuthenticationContext, resource: &str, token: &str, expiry: i64) {
		ctx.remember_resource(resource);
		ctx.store().save(&keys::scoped(keys::ACCESS_TOKEN_KEY, resource), token, false);
		ctx.store().save(&keys::scoped(keys::EXPIRATION_KEY, resource), &expiry.to_string(), false);
	}

	#[test]
	fn expired_tokens_are_blanked_once() {
		let (ctx, _) = context_with(config());
		let now = ctx.host().now().unix_timestamp();

		seed_token(&ctx, "fresh", "AT1", now + 3_600);
		seed_token(&ctx, "stale", "AT2", now + 100);

		assert_eq!(ctx.cached_token("fresh").map(TokenSecret::into_inner).as_deref(), Some("AT1"));
		assert_eq!(ctx.cached_token("stale"), None);
		assert_eq!(
			ctx.store().get(&keys::scoped(keys::ACCESS_TOKEN_KEY, "stale")).as_deref(),
			Some("")
		);
		assert_eq!(
			ctx.store().get(&keys::scoped(keys::EXPIRATION_KEY, "stale")).as_deref(),
			Some("0")
		);
		assert_eq!(ctx.cached_token("stale"), None);
		assert_eq!(ctx.cached_token("unknown"), None);
		assert_eq!(ctx.resource_state("fresh"), ResourceState::TokenCached);
		assert_eq!(ctx.resource_state("stale"), ResourceState::Idle);
	}

	#[test]
	fn token_keys_are_recorded_once() {
		let (ctx, _) = context_with(config());

		ctx.remember_resource("a");
		ctx.remember_resource("a");
		ctx.remember_resource("b");

		assert_eq!(ctx.store().get(keys::TOKEN_KEYS).as_deref(), Some("a|b|"));
	}

	#[test]
	fn endpoints_map_to_resources() {
		let (ctx, _) = context_with(config());

		assert_eq!(ctx.resource_for_endpoint("https://graph.example/public/x"), None);
		assert_eq!(
			ctx.resource_for_endpoint("https://graph.example/me").as_deref(),
			Some("https://graph")
		);
		assert_eq!(ctx.resource_for_endpoint("https://app.example/api").as_deref(), Some("client-1"));
		assert_eq!(ctx.resource_for_endpoint("/api/values").as_deref(), Some("client-1"));
		assert_eq!(ctx.resource_for_endpoint("https://elsewhere.example/api"), None);
	}

	#[test]
	fn users_load_lazily_from_the_stored_id_token() {
		let (ctx, _) = context_with(config());

		assert_eq!(ctx.user(), Err(AuthFailure::UserUnavailable));
		assert_eq!(ctx.session_state(), SessionState::NoUser);

		ctx.store().save(
			keys::IDTOKEN,
			&id_token(r#"{"aud":"CLIENT-1","upn":"jane@contoso.com"}"#),
			false,
		);

		let user = ctx.user().expect("Stored id token should yield a user.");

		assert_eq!(user.user_name, "jane@contoso.com");
		assert_eq!(
			ctx.session_state(),
			SessionState::Authenticated { user_name: "jane@contoso.com".into() }
		);
	}

	#[test]
	fn foreign_or_missing_audiences_are_rejected() {
		let (ctx, _) = context_with(config());

		assert_eq!(ctx.create_user(&id_token(r#"{"aud":"other"}"#)), None);
		assert_eq!(ctx.create_user(&id_token(r#"{"upn":"jane@contoso.com"}"#)), None);
		assert_eq!(ctx.create_user("not-a-jwt"), None);
	}

	#[test]
	fn nonces_match_any_requested_entry() {
		let (ctx, _) = context_with(config());
		let user = User::from_claims(IdTokenClaims { nonce: Some("n2".into()), ..Default::default() });

		assert!(!ctx.match_nonce(&user));

		ctx.store().save(keys::NONCE_IDTOKEN, "n1||n2||", false);

		assert!(ctx.match_nonce(&user));
		assert!(!ctx.match_nonce(&User::from_claims(IdTokenClaims::default())));
	}

	#[test]
	fn clear_cache_blanks_every_resource() {
		let (ctx, _) = context_with(config());
		let now = ctx.host().now().unix_timestamp();

		seed_token(&ctx, "a", "AT1", now + 3_600);
		seed_token(&ctx, "b", "AT2", now + 3_600);
		ctx.store().save(keys::LOGIN_ERROR, "boom", false);
		ctx.clear_cache();

		for resource in ["a", "b"] {
			assert_eq!(
				ctx.store().get(&keys::scoped(keys::ACCESS_TOKEN_KEY, resource)).as_deref(),
				Some("")
			);
			assert_eq!(
				ctx.store().get(&keys::scoped(keys::EXPIRATION_KEY, resource)).as_deref(),
				Some("0")
			);
		}

		assert_eq!(ctx.store().get(keys::TOKEN_KEYS).as_deref(), Some(""));
		assert_eq!(ctx.login_error(), None);
	}

	#[test]
	fn clear_cache_for_resource_leaves_others() {
		let (ctx, _) = context_with(config());
		let now = ctx.host().now().unix_timestamp();

		seed_token(&ctx, "a", "AT1", now + 3_600);
		seed_token(&ctx, "b", "AT2", now + 3_600);
		ctx.clear_cache_for_resource("a");

		assert_eq!(ctx.cached_token("a"), None);
		assert_eq!(ctx.cached_token("b").map(TokenSecret::into_inner).as_deref(), Some("AT2"));
	}

	#[test]
	fn log_out_navigates_to_the_logout_endpoint() {
		let (ctx, host) = context_with(config());

		ctx.log_out();

		let navigations = host.navigations.lock();

		assert_eq!(navigations.len(), 1);
		assert_eq!(
			navigations[0].as_str(),
			"https://login.example/common/oauth2/logout?post_logout_redirect_uri=https%3A%2F%2Fapp.example%2Findex.html"
		);
	}
}
