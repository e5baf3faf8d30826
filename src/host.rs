//! Browser environment seam.
//!
//! [`Host`] exposes exactly what the authentication context needs from a browsing context:
//! its own location and place in the window hierarchy, navigation, popups, hidden iframes,
//! storage areas, and a timer-capable executor. A `wasm32` binding maps these onto
//! `web_sys`; native hosts and tests script them.

// self
use crate::{
	_prelude::*,
	auth::WindowId,
	store::{CacheLocation, StorageBackend},
};

/// Boxed task or timer future handed to and returned by the host.
pub type HostFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Position of the current browsing context in the window hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameInfo {
	/// Identifier of this browsing context.
	pub id: WindowId,
	/// Embedding window when this context is an iframe.
	pub parent: Option<WindowId>,
	/// Window that opened this context when it is a popup.
	pub opener: Option<WindowId>,
}
impl FrameInfo {
	/// Describes a top-level window with neither parent nor opener.
	pub fn top_level(id: WindowId) -> Self {
		Self { id, parent: None, opener: None }
	}

	/// Returns `true` for a top-level window.
	pub fn is_top_level(&self) -> bool {
		self.parent.is_none() && self.opener.is_none()
	}
}

/// Outer window placement used to center popups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
	/// Screen x of the window.
	pub left: i32,
	/// Screen y of the window.
	pub top: i32,
	/// Inner width.
	pub width: u32,
	/// Inner height.
	pub height: u32,
}

/// Requested popup placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PopupGeometry {
	/// Screen x.
	pub left: i32,
	/// Screen y.
	pub top: i32,
	/// Popup width.
	pub width: u32,
	/// Popup height.
	pub height: u32,
}
impl PopupGeometry {
	/// Width of login and interactive popups.
	pub const WIDTH: u32 = 483;
	/// Height of login and interactive popups.
	pub const HEIGHT: u32 = 600;

	/// Centers a `width` x `height` popup over `viewport`.
	pub fn centered(viewport: Viewport, width: u32, height: u32) -> Self {
		let offset = |outer: u32, inner: u32| (i64::from(outer) - i64::from(inner)) / 2;
		let left = i64::from(viewport.left) + offset(viewport.width, width);
		let top = i64::from(viewport.top) + offset(viewport.height, height);

		Self {
			left: left.clamp(i32::MIN.into(), i32::MAX.into()) as i32,
			top: top.clamp(i32::MIN.into(), i32::MAX.into()) as i32,
			width,
			height,
		}
	}
}

/// Handle to a popup window opened by [`Host::open_popup`].
pub trait PopupWindow
where
	Self: Send + Sync,
{
	/// Returns `true` once the window is gone.
	fn is_closed(&self) -> bool;

	/// Current location, or `None` while it is unreadable (e.g. cross-origin).
	fn location(&self) -> Option<Url>;

	/// Closes the window.
	fn close(&self);
}

/// Hidden iframe used for silent renewal.
pub trait HiddenFrame
where
	Self: Send + Sync,
{
	/// Current `src`, or `None` when unset.
	fn source(&self) -> Option<Url>;

	/// Points the frame at `url`.
	fn navigate(&self, url: &Url);

	/// Returns `true` while the frame has no source or shows `about:blank`.
	fn is_blank(&self) -> bool {
		self.source().is_none_or(|src| src.as_str() == ABOUT_BLANK)
	}
}

/// URL used to reset hidden frames.
pub const ABOUT_BLANK: &str = "about:blank";

/// Browsing-context services required by the authentication context.
pub trait Host
where
	Self: Send + Sync,
{
	/// Identity and hierarchy of this browsing context.
	fn frame(&self) -> FrameInfo;

	/// Current location, including any fragment.
	fn location(&self) -> Url;

	/// Replaces the current page with `url`.
	fn navigate(&self, url: &Url);

	/// Clears the location fragment without navigating.
	fn clear_hash(&self);

	/// Opens `url` in a new top-level window; `false` means the host refused.
	fn open_window(&self, url: &Url) -> bool;

	/// Opens a named popup; `None` means it was blocked.
	fn open_popup(
		&self,
		url: &Url,
		name: &str,
		geometry: PopupGeometry,
	) -> Option<Box<dyn PopupWindow>>;

	/// Placement of this window, used to center popups.
	fn viewport(&self) -> Viewport;

	/// Finds or creates the hidden iframe called `name`.
	fn hidden_frame(&self, name: &str) -> Option<Arc<dyn HiddenFrame>>;

	/// Storage area for `location`, or `None` when the host has none.
	fn storage(&self, location: CacheLocation) -> Option<Arc<dyn StorageBackend>>;

	/// Runs `task` to completion in the background.
	fn spawn(&self, task: HostFuture);

	/// Resolves after `duration`.
	fn sleep(&self, duration: Duration) -> HostFuture;

	/// Wall-clock time used for token expiry.
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn popups_center_over_the_viewport() {
		let viewport = Viewport { left: 100, top: 50, width: 1283, height: 1000 };
		let geometry =
			PopupGeometry::centered(viewport, PopupGeometry::WIDTH, PopupGeometry::HEIGHT);

		assert_eq!(geometry, PopupGeometry { left: 500, top: 250, width: 483, height: 600 });

		let tiny = PopupGeometry::centered(Viewport::default(), 483, 600);

		assert_eq!((tiny.left, tiny.top), (-241, -300));
	}

	#[test]
	fn top_level_frames_have_no_relatives() {
		let id = WindowId::new("main").expect("Window fixture should be valid.");
		let frame = FrameInfo::top_level(id.clone());

		assert!(frame.is_top_level());
		assert!(!FrameInfo { opener: Some(id), ..frame }.is_top_level());
	}
}
