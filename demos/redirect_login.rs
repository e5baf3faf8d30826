//! Walks through a full-page redirect login: the first page load sends the user to the
//! authority, and the reloaded page on the redirect URI turns the returned fragment into a
//! signed-in user.
//!
//! The authority's reply is simulated with an unsigned identity token that echoes the nonce
//! from the authorization URL.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::{Result, eyre::eyre};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use oauth2_implicit::{
	auth::WindowId,
	config::{AuthConfig, AuthConfigBuilder},
	context::AuthenticationContext,
	host::{FrameInfo, HiddenFrame, Host, HostFuture, PopupGeometry, PopupWindow, Viewport},
	registry::ContextRegistry,
	store::{CacheLocation, MemoryStorage, StorageBackend},
	url::Url,
};

const CLIENT_ID: &str = "6731de76-14a6-49ae-97bc-6eba6914391e";
const REDIRECT_URI: &str = "https://app.example.com/callback";

/// Top-level window that prints navigations instead of performing them.
struct ConsoleHost {
	frame: FrameInfo,
	location: Mutex<Url>,
	storage: MemoryStorage,
	navigations: Mutex<Vec<Url>>,
}
impl ConsoleHost {
	fn new(location: &str, storage: MemoryStorage) -> Result<Arc<Self>> {
		Ok(Arc::new(Self {
			frame: FrameInfo::top_level(WindowId::new("main")?),
			location: Mutex::new(Url::parse(location)?),
			storage,
			navigations: Mutex::new(Vec::new()),
		}))
	}
}
impl Host for ConsoleHost {
	fn frame(&self) -> FrameInfo {
		self.frame.clone()
	}

	fn location(&self) -> Url {
		self.location.lock().clone()
	}

	fn navigate(&self, url: &Url) {
		println!("Navigating to {url}.");

		self.navigations.lock().push(url.clone());
	}

	fn clear_hash(&self) {
		self.location.lock().set_fragment(None);
	}

	fn open_window(&self, url: &Url) -> bool {
		self.navigate(url);

		true
	}

	fn open_popup(&self, _: &Url, _: &str, _: PopupGeometry) -> Option<Box<dyn PopupWindow>> {
		None
	}

	fn viewport(&self) -> Viewport {
		Viewport { left: 0, top: 0, width: 1280, height: 800 }
	}

	fn hidden_frame(&self, _: &str) -> Option<Arc<dyn HiddenFrame>> {
		None
	}

	fn storage(&self, _: CacheLocation) -> Option<Arc<dyn StorageBackend>> {
		Some(Arc::new(self.storage.clone()))
	}

	fn spawn(&self, task: HostFuture) {
		tokio::spawn(task);
	}

	fn sleep(&self, duration: Duration) -> HostFuture {
		Box::pin(tokio::time::sleep(duration.unsigned_abs()))
	}
}

fn settings() -> AuthConfigBuilder {
	AuthConfig::builder(CLIENT_ID)
		.instance("https://login.example.com/")
		.tenant("contoso.onmicrosoft.com")
		.redirect_uri(REDIRECT_URI)
}

fn simulated_id_token(nonce: &str) -> String {
	let claims = serde_json::json!({
		"aud": CLIENT_ID,
		"upn": "jane@contoso.com",
		"nonce": nonce,
		"exp": OffsetDateTime::now_utc().unix_timestamp() + 3600,
	});

	format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(claims.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let storage = MemoryStorage::default();
	let landing = ConsoleHost::new("https://app.example.com/#/inbox", storage.clone())?;
	let ctx = AuthenticationContext::new(settings().build()?, landing.clone());

	ctx.login();

	let authorize =
		landing.navigations.lock().pop().ok_or_else(|| eyre!("Login did not navigate."))?;
	let param = |name: &str| {
		authorize
			.query_pairs()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.into_owned())
			.ok_or_else(|| eyre!("Authorization URL is missing `{name}`."))
	};
	let (state, nonce) = (param("state")?, param("nonce")?);
	// The authority redirects back; the reloaded page shares the same storage.
	let reloaded = ConsoleHost::new(
		&format!("{REDIRECT_URI}#id_token={}&state={state}", simulated_id_token(&nonce)),
		storage,
	)?;
	let registry = ContextRegistry::new();
	let page = registry.install(
		settings().callback(|outcome| println!("Login finished: ok={}.", outcome.is_ok())).build()?,
		reloaded,
	);

	if !page.handle_window_callback(&registry, None) {
		return Err(eyre!("The reloaded page carried no callback."));
	}

	let user = page.user()?;

	println!("Signed in as {}.", user.user_name);

	Ok(())
}
