//! Scripted browser host shared by the integration tests.
//!
//! Tasks and timers run on the tokio test runtime, so `start_paused` tests drive popup
//! polling, frame loading, and renewal timeouts without waiting in real time.

#![allow(dead_code)]

// std
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use oauth2_implicit::{
	auth::WindowId,
	config::AuthConfig,
	host::{FrameInfo, HiddenFrame, Host, HostFuture, PopupGeometry, PopupWindow, Viewport},
	store::{CacheLocation, MemoryStorage, StorageBackend},
	url::Url,
};

pub const CLIENT_ID: &str = "client-it";
pub const REDIRECT_URI: &str = "https://app.example/callback";

pub fn url(raw: &str) -> Url {
	Url::parse(raw).expect("Test URL should parse.")
}

pub fn window(raw: &str) -> WindowId {
	WindowId::new(raw).expect("Window fixture should be valid.")
}

pub fn config() -> oauth2_implicit::config::AuthConfigBuilder {
	AuthConfig::builder(CLIENT_ID).instance("https://login.example/").redirect_uri(REDIRECT_URI)
}

/// Unsigned identity token for [`CLIENT_ID`], valid for an hour.
pub fn id_token(upn: &str, nonce: Option<&str>) -> String {
	let exp = OffsetDateTime::now_utc().unix_timestamp() + 3600;
	let mut claims = serde_json::json!({ "aud": CLIENT_ID, "upn": upn, "exp": exp, "oid": "oid-1" });

	if let Some(nonce) = nonce {
		claims["nonce"] = nonce.into();
	}

	format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(claims.to_string()))
}

/// Value of `name` in the query string of `url`.
pub fn query_value(url: &Url, name: &str) -> Option<String> {
	url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
}

/// Hidden iframe that records every source it is pointed at.
#[derive(Debug, Default)]
pub struct TestFrame {
	pub history: Mutex<Vec<Url>>,
}
impl TestFrame {
	/// Non-blank sources, in navigation order.
	pub fn loaded(&self) -> Vec<Url> {
		self.history.lock().iter().filter(|src| src.scheme() != "about").cloned().collect()
	}
}
impl HiddenFrame for TestFrame {
	fn source(&self) -> Option<Url> {
		self.history.lock().last().cloned()
	}

	fn navigate(&self, url: &Url) {
		self.history.lock().push(url.clone());
	}
}

/// Popup whose location and lifetime the test scripts.
#[derive(Debug)]
pub struct TestPopup {
	pub opened_with: Url,
	pub location: Mutex<Option<Url>>,
	pub closed: AtomicBool,
}
impl TestPopup {
	/// Lands the popup on the redirect URI with `fragment`.
	pub fn redirect(&self, fragment: &str) {
		*self.location.lock() = Some(url(&format!("{REDIRECT_URI}#{fragment}")));
	}

	pub fn state(&self) -> String {
		query_value(&self.opened_with, "state").unwrap_or_default()
	}
}

struct PopupHandle(Arc<TestPopup>);
impl PopupWindow for PopupHandle {
	fn is_closed(&self) -> bool {
		self.0.closed.load(Ordering::SeqCst)
	}

	fn location(&self) -> Option<Url> {
		self.0.location.lock().clone()
	}

	fn close(&self) {
		self.0.closed.store(true, Ordering::SeqCst);
	}
}

/// Browsing context backed by the tokio runtime and in-memory storage.
pub struct TestHost {
	pub frame: FrameInfo,
	pub location: Mutex<Url>,
	pub storage: MemoryStorage,
	pub navigations: Mutex<Vec<Url>>,
	pub frames: Mutex<HashMap<String, Arc<TestFrame>>>,
	pub popups: Mutex<Vec<Arc<TestPopup>>>,
	pub block_popups: AtomicBool,
}
impl TestHost {
	pub fn top_level(id: &str, location: &str) -> Arc<Self> {
		Self::with_frame(FrameInfo::top_level(window(id)), location, MemoryStorage::default())
	}

	/// Child browsing context sharing `parent`'s storage.
	pub fn child(parent: &TestHost, frame: FrameInfo, location: &str) -> Arc<Self> {
		Self::with_frame(frame, location, parent.storage.clone())
	}

	fn with_frame(frame: FrameInfo, location: &str, storage: MemoryStorage) -> Arc<Self> {
		Arc::new(Self {
			frame,
			location: Mutex::new(url(location)),
			storage,
			navigations: Mutex::new(Vec::new()),
			frames: Mutex::new(HashMap::new()),
			popups: Mutex::new(Vec::new()),
			block_popups: AtomicBool::new(false),
		})
	}

	pub fn hidden(&self, name: &str) -> Option<Arc<TestFrame>> {
		self.frames.lock().get(name).cloned()
	}

	pub fn last_popup(&self) -> Option<Arc<TestPopup>> {
		self.popups.lock().last().cloned()
	}
}
impl Host for TestHost {
	fn frame(&self) -> FrameInfo {
		self.frame.clone()
	}

	fn location(&self) -> Url {
		self.location.lock().clone()
	}

	fn navigate(&self, url: &Url) {
		self.navigations.lock().push(url.clone());
	}

	fn clear_hash(&self) {
		self.location.lock().set_fragment(None);
	}

	fn open_window(&self, url: &Url) -> bool {
		self.navigations.lock().push(url.clone());

		true
	}

	fn open_popup(&self, url: &Url, _: &str, _: PopupGeometry) -> Option<Box<dyn PopupWindow>> {
		if self.block_popups.load(Ordering::SeqCst) {
			return None;
		}

		let popup = Arc::new(TestPopup {
			opened_with: url.clone(),
			location: Mutex::new(None),
			closed: AtomicBool::new(false),
		});

		self.popups.lock().push(popup.clone());

		Some(Box::new(PopupHandle(popup)))
	}

	fn viewport(&self) -> Viewport {
		Viewport { left: 0, top: 0, width: 1280, height: 800 }
	}

	fn hidden_frame(&self, name: &str) -> Option<Arc<dyn HiddenFrame>> {
		let frame = self.frames.lock().entry(name.to_owned()).or_default().clone();

		Some(frame)
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
