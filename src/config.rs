//! Authentication context configuration.
//!
//! [`AuthConfig`] captures what the application supplies; [`SessionConfig`] is the
//! immutable, fully defaulted view the context works from once it knows the host location.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TokenGrant},
	error::{AuthFailure, ConfigError},
	store::CacheLocation,
};

/// Authority used when no instance is configured.
pub const DEFAULT_INSTANCE: &str = "https://login.microsoftonline.com/";
/// Tenant used when none is configured.
pub const DEFAULT_TENANT: &str = "common";
/// Default window before expiry in which cached tokens are renewed.
pub const DEFAULT_EXPIRE_OFFSET: Duration = Duration::seconds(300);
/// Default time a silent renewal may take before it is failed.
pub const DEFAULT_LOAD_FRAME_TIMEOUT: Duration = Duration::seconds(6);
/// Default delay between popup location checks.
pub const DEFAULT_POPUP_POLL_INTERVAL: Duration = Duration::milliseconds(1);

/// Receives login and renewal outcomes that have no dedicated listener.
pub type CompletionHook = Arc<dyn Fn(Result<TokenGrant, AuthFailure>) + Send + Sync>;
/// Receives an authorization URL instead of the default navigation.
pub type NavigationHook = Arc<dyn Fn(&Url) + Send + Sync>;

/// Optional application callbacks.
#[derive(Clone, Default)]
pub struct Hooks {
	/// Called with top-level redirect results and login popup results.
	pub callback: Option<CompletionHook>,
	/// Replaces navigation to the login URL.
	pub display_call: Option<NavigationHook>,
	/// Called when an in-iframe login cannot open a new window.
	pub popup_disabled_callback: Option<NavigationHook>,
}
impl Debug for Hooks {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Hooks")
			.field("callback", &self.callback.is_some())
			.field("display_call", &self.display_call.is_some())
			.field("popup_disabled_callback", &self.popup_disabled_callback.is_some())
			.finish()
	}
}

/// Validated application configuration.
#[derive(Clone, Debug)]
pub struct AuthConfig {
	/// Application (client) id.
	pub client_id: ClientId,
	/// Tenant; defaults to `common`.
	pub tenant: Option<String>,
	/// Authority base; always ends with `/`.
	pub instance: Url,
	/// Redirect URI; defaults to the host location without query or fragment.
	pub redirect_uri: Option<Url>,
	/// Post-logout redirect URI; defaults like `redirect_uri`.
	pub post_logout_redirect_uri: Option<Url>,
	/// Full logout URL override.
	pub logout_uri: Option<Url>,
	/// Resource the identity token is cached under; defaults to the client id.
	pub login_resource: Option<String>,
	/// Storage area backing the cache.
	pub cache_location: CacheLocation,
	/// Ordered endpoint-substring to resource mapping.
	pub endpoints: Vec<(String, String)>,
	/// Endpoint substrings that never receive a token.
	pub anonymous_endpoints: Vec<String>,
	/// Renewal window before expiry.
	pub expire_offset: Duration,
	/// Silent renewal timeout.
	pub load_frame_timeout: Duration,
	/// Log in through a popup instead of a redirect.
	pub popup: bool,
	/// The application itself runs inside an iframe.
	pub in_iframe: bool,
	/// Return to the page that started the login after a top-level redirect.
	pub navigate_to_login_request_url: bool,
	/// Raw `key=value&...` string appended to authorization URLs.
	pub extra_query_parameter: Option<String>,
	/// Fixed correlation id; a fresh one is generated per request otherwise.
	pub correlation_id: Option<String>,
	/// Delay between popup location checks.
	pub popup_poll_interval: Duration,
	/// Application callbacks.
	pub hooks: Hooks,
}
impl AuthConfig {
	/// Starts a builder for the given client id.
	pub fn builder(client_id: impl Into<String>) -> AuthConfigBuilder {
		AuthConfigBuilder::new(client_id)
	}
}

/// Builder for [`AuthConfig`].
#[derive(Debug)]
pub struct AuthConfigBuilder {
	client_id: String,
	tenant: Option<String>,
	instance: Option<String>,
	redirect_uri: Option<String>,
	post_logout_redirect_uri: Option<String>,
	logout_uri: Option<String>,
	login_resource: Option<String>,
	cache_location: CacheLocation,
	endpoints: Vec<(String, String)>,
	anonymous_endpoints: Vec<String>,
	expire_offset: Duration,
	load_frame_timeout: Duration,
	popup: bool,
	in_iframe: bool,
	navigate_to_login_request_url: bool,
	extra_query_parameter: Option<String>,
	correlation_id: Option<String>,
	popup_poll_interval: Duration,
	hooks: Hooks,
}
impl AuthConfigBuilder {
	/// Creates a builder with every option at its default.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			tenant: None,
			instance: None,
			redirect_uri: None,
			post_logout_redirect_uri: None,
			logout_uri: None,
			login_resource: None,
			cache_location: CacheLocation::default(),
			endpoints: Vec::new(),
			anonymous_endpoints: Vec::new(),
			expire_offset: DEFAULT_EXPIRE_OFFSET,
			load_frame_timeout: DEFAULT_LOAD_FRAME_TIMEOUT,
			popup: false,
			in_iframe: false,
			navigate_to_login_request_url: true,
			extra_query_parameter: None,
			correlation_id: None,
			popup_poll_interval: DEFAULT_POPUP_POLL_INTERVAL,
			hooks: Hooks::default(),
		}
	}

	/// Sets the tenant.
	pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
		self.tenant = Some(tenant.into());

		self
	}

	/// Sets the authority instance.
	pub fn instance(mut self, instance: impl Into<String>) -> Self {
		self.instance = Some(instance.into());

		self
	}

	/// Sets the redirect URI.
	pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.redirect_uri = Some(uri.into());

		self
	}

	/// Sets the post-logout redirect URI.
	pub fn post_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.post_logout_redirect_uri = Some(uri.into());

		self
	}

	/// Overrides the full logout URL.
	pub fn logout_uri(mut self, uri: impl Into<String>) -> Self {
		self.logout_uri = Some(uri.into());

		self
	}

	/// Sets the resource the identity token is cached under.
	pub fn login_resource(mut self, resource: impl Into<String>) -> Self {
		self.login_resource = Some(resource.into());

		self
	}

	/// Selects the storage area.
	pub fn cache_location(mut self, location: CacheLocation) -> Self {
		self.cache_location = location;

		self
	}

	/// Maps endpoints containing `endpoint` to `resource`; earlier mappings win.
	pub fn endpoint(mut self, endpoint: impl Into<String>, resource: impl Into<String>) -> Self {
		self.endpoints.push((endpoint.into(), resource.into()));

		self
	}

	/// Marks endpoints containing `endpoint` as anonymous.
	pub fn anonymous_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.anonymous_endpoints.push(endpoint.into());

		self
	}

	/// Sets the renewal window before expiry.
	pub fn expire_offset(mut self, offset: Duration) -> Self {
		self.expire_offset = offset;

		self
	}

	/// Sets the silent renewal timeout.
	pub fn load_frame_timeout(mut self, timeout: Duration) -> Self {
		self.load_frame_timeout = timeout;

		self
	}

	/// Logs in through a popup.
	pub fn popup(mut self, enabled: bool) -> Self {
		self.popup = enabled;

		self
	}

	/// Declares that the application runs inside an iframe.
	pub fn in_iframe(mut self, enabled: bool) -> Self {
		self.in_iframe = enabled;

		self
	}

	/// Controls the return navigation after a top-level redirect.
	pub fn navigate_to_login_request_url(mut self, enabled: bool) -> Self {
		self.navigate_to_login_request_url = enabled;

		self
	}

	/// Sets the raw extra query string, e.g. `login_hint=jane@contoso.com`.
	pub fn extra_query_parameter(mut self, query: impl Into<String>) -> Self {
		self.extra_query_parameter = Some(query.into());

		self
	}

	/// Fixes the correlation id.
	pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
		self.correlation_id = Some(id.into());

		self
	}

	/// Sets the popup polling interval.
	pub fn popup_poll_interval(mut self, interval: Duration) -> Self {
		self.popup_poll_interval = interval;

		self
	}

	/// Installs the completion hook.
	pub fn callback<F>(mut self, hook: F) -> Self
	where
		F: 'static + Fn(Result<TokenGrant, AuthFailure>) + Send + Sync,
	{
		self.hooks.callback = Some(Arc::new(hook));

		self
	}

	/// Installs the display hook used instead of login navigation.
	pub fn display_call<F>(mut self, hook: F) -> Self
	where
		F: 'static + Fn(&Url) + Send + Sync,
	{
		self.hooks.display_call = Some(Arc::new(hook));

		self
	}

	/// Installs the hook used when an in-iframe login cannot open a window.
	pub fn popup_disabled_callback<F>(mut self, hook: F) -> Self
	where
		F: 'static + Fn(&Url) + Send + Sync,
	{
		self.hooks.popup_disabled_callback = Some(Arc::new(hook));

		self
	}

	/// Validates and freezes the configuration.
	pub fn build(self) -> Result<AuthConfig, ConfigError> {
		let client_id = ClientId::new(&self.client_id)?;
		let mut instance =
			parse_url("instance", self.instance.as_deref().unwrap_or(DEFAULT_INSTANCE))?;

		if instance.cannot_be_a_base() {
			return Err(ConfigError::InvalidInstance { url: instance.into() });
		}
		if !instance.path().ends_with('/') {
			let path = format!("{}/", instance.path());

			instance.set_path(&path);
		}

		Ok(AuthConfig {
			client_id,
			tenant: self.tenant.filter(|t| !t.is_empty()),
			instance,
			redirect_uri: parse_optional("redirect_uri", self.redirect_uri)?,
			post_logout_redirect_uri: parse_optional(
				"post_logout_redirect_uri",
				self.post_logout_redirect_uri,
			)?,
			logout_uri: parse_optional("logout_uri", self.logout_uri)?,
			login_resource: self.login_resource.filter(|r| !r.is_empty()),
			cache_location: self.cache_location,
			endpoints: self.endpoints,
			anonymous_endpoints: self.anonymous_endpoints,
			expire_offset: self.expire_offset,
			load_frame_timeout: self.load_frame_timeout,
			popup: self.popup,
			in_iframe: self.in_iframe,
			navigate_to_login_request_url: self.navigate_to_login_request_url,
			extra_query_parameter: self.extra_query_parameter.filter(|q| !q.is_empty()),
			correlation_id: self.correlation_id.filter(|c| !c.is_empty()),
			popup_poll_interval: self.popup_poll_interval,
			hooks: self.hooks,
		})
	}
}

/// Fully defaulted configuration used by an authentication context.
#[derive(Clone, Debug)]
pub struct SessionConfig {
	/// Application (client) id.
	pub client_id: ClientId,
	/// Tenant.
	pub tenant: String,
	/// Authority base ending with `/`.
	pub instance: Url,
	/// Redirect URI.
	pub redirect_uri: Url,
	/// Post-logout redirect URI.
	pub post_logout_redirect_uri: Url,
	/// Full logout URL override.
	pub logout_uri: Option<Url>,
	/// Resource the identity token is cached under.
	pub login_resource: String,
	/// Storage area backing the cache.
	pub cache_location: CacheLocation,
	/// Ordered endpoint-substring to resource mapping.
	pub endpoints: Vec<(String, String)>,
	/// Endpoint substrings that never receive a token.
	pub anonymous_endpoints: Vec<String>,
	/// Renewal window before expiry.
	pub expire_offset: Duration,
	/// Silent renewal timeout.
	pub load_frame_timeout: Duration,
	/// Log in through a popup.
	pub popup: bool,
	/// The application runs inside an iframe.
	pub in_iframe: bool,
	/// Return to the login start page after a top-level redirect.
	pub navigate_to_login_request_url: bool,
	/// Raw extra query string.
	pub extra_query_parameter: Option<String>,
	/// Fixed correlation id.
	pub correlation_id: Option<String>,
	/// Delay between popup location checks.
	pub popup_poll_interval: Duration,
	/// Application callbacks.
	pub hooks: Hooks,
}
impl SessionConfig {
	/// Back-fills defaults that depend on the host `location`.
	pub fn resolve(config: AuthConfig, location: &Url) -> Self {
		let page = strip_query_and_fragment(location);
		let login_resource = config.login_resource.unwrap_or_else(|| config.client_id.to_string());

		Self {
			tenant: config.tenant.unwrap_or_else(|| DEFAULT_TENANT.to_owned()),
			instance: config.instance,
			redirect_uri: config.redirect_uri.unwrap_or_else(|| page.clone()),
			post_logout_redirect_uri: config.post_logout_redirect_uri.unwrap_or(page),
			logout_uri: config.logout_uri,
			login_resource,
			cache_location: config.cache_location,
			endpoints: config.endpoints,
			anonymous_endpoints: config.anonymous_endpoints,
			expire_offset: config.expire_offset,
			load_frame_timeout: config.load_frame_timeout,
			popup: config.popup,
			in_iframe: config.in_iframe,
			navigate_to_login_request_url: config.navigate_to_login_request_url,
			extra_query_parameter: config.extra_query_parameter,
			correlation_id: config.correlation_id,
			popup_poll_interval: config.popup_poll_interval,
			hooks: config.hooks,
			client_id: config.client_id,
		}
	}

	/// `{instance}{tenant}/oauth2/{endpoint}`.
	pub fn authority_endpoint(&self, endpoint: &str) -> Url {
		let mut url = self.instance.clone();
		let path = format!("{}{}/oauth2/{endpoint}", self.instance.path(), self.tenant);

		url.set_path(&path);
		url.set_query(None);
		url.set_fragment(None);

		url
	}

	/// Returns `true` when `login_hint` appears in the extra query string.
	pub fn has_login_hint(&self) -> bool {
		self.extra_query_parameter.as_deref().is_some_and(|query| query.contains("login_hint"))
	}
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|e| ConfigError::invalid_url(field, e))
}

fn parse_optional(field: &'static str, raw: Option<String>) -> Result<Option<Url>, ConfigError> {
	raw.filter(|r| !r.is_empty()).map(|r| parse_url(field, &r)).transpose()
}

fn strip_query_and_fragment(location: &Url) -> Url {
	let mut page = location.clone();

	page.set_query(None);
	page.set_fragment(None);

	page
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::IdentifierError;

	fn location() -> Url {
		Url::parse("https://app.contoso.com/spa/index.html?tab=2#/home")
			.expect("Location fixture should parse.")
	}

	#[test]
	fn defaults_are_back_filled_from_the_location() {
		let config = AuthConfig::builder("abc").build().expect("Minimal config should build.");
		let session = SessionConfig::resolve(config, &location());

		assert_eq!(session.tenant, "common");
		assert_eq!(session.instance.as_str(), DEFAULT_INSTANCE);
		assert_eq!(session.redirect_uri.as_str(), "https://app.contoso.com/spa/index.html");
		assert_eq!(session.post_logout_redirect_uri, session.redirect_uri);
		assert_eq!(session.login_resource, "abc");
		assert_eq!(session.cache_location, CacheLocation::SessionStorage);
		assert_eq!(session.expire_offset, Duration::seconds(300));
		assert_eq!(session.load_frame_timeout, Duration::seconds(6));
		assert!(session.navigate_to_login_request_url);
		assert!(!session.popup);
	}

	#[test]
	fn explicit_values_win_over_defaults() {
		let config = AuthConfig::builder("abc")
			.tenant("contoso.onmicrosoft.com")
			.instance("https://login.example.net/base")
			.redirect_uri("https://app.contoso.com/callback")
			.login_resource("https://api.contoso.com")
			.cache_location(CacheLocation::LocalStorage)
			.endpoint("/api/", "https://api.contoso.com")
			.extra_query_parameter("login_hint=jane@contoso.com")
			.build()
			.expect("Full config should build.");
		let session = SessionConfig::resolve(config, &location());

		assert_eq!(session.instance.as_str(), "https://login.example.net/base/");
		assert_eq!(
			session.authority_endpoint("authorize").as_str(),
			"https://login.example.net/base/contoso.onmicrosoft.com/oauth2/authorize"
		);
		assert_eq!(session.redirect_uri.as_str(), "https://app.contoso.com/callback");
		assert_eq!(
			session.post_logout_redirect_uri.as_str(),
			"https://app.contoso.com/spa/index.html"
		);
		assert_eq!(session.login_resource, "https://api.contoso.com");
		assert!(session.has_login_hint());
	}

	#[test]
	fn invalid_input_is_rejected() {
		assert!(matches!(
			AuthConfig::builder("").build(),
			Err(ConfigError::InvalidClientId(IdentifierError::Empty { .. }))
		));
		assert!(matches!(
			AuthConfig::builder("abc").redirect_uri("not a url").build(),
			Err(ConfigError::InvalidUrl { field: "redirect_uri", .. })
		));
		assert!(matches!(
			AuthConfig::builder("abc").instance("data:text/plain,hi").build(),
			Err(ConfigError::InvalidInstance { .. })
		));
	}
}
