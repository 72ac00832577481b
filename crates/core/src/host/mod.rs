//! Host environment seam.
//!
//! The session never touches a browser API directly. Everything it needs from
//! the embedding page (document, window messaging, history, timers and the
//! local task queue) is reached through [`Host`]. The browser binding
//! implements it over `web-sys`; [`fake::FakeHost`] implements it in memory
//! for tests.

pub mod fake;

use std::time::Duration;

use futures::future::LocalBoxFuture;
use serde_json::Value;
use url::Url;

use crate::error::Result;

/// Callback receiving the raw `data` of every window `message` event.
pub type MessageCallback = std::rc::Rc<dyn Fn(Value)>;

/// A `'static` task for the host's local (single-threaded) executor.
pub type LocalTask = LocalBoxFuture<'static, ()>;

/// Handle of a registered window message listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle of a pending one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Capabilities the session requires from the embedding page.
///
/// Implementations are single-threaded. Callbacks handed to the host
/// (`load_frame`, message listeners, timers) must be invoked from the host's
/// event loop, never re-entrantly from inside the registering call.
pub trait Host: 'static {
	/// Handle to a DOM element.
	type Element: Clone + 'static;

	/// Current address of the host page.
	fn page_url(&self) -> Result<Url>;

	/// Replaces the visible page address without adding a history entry.
	fn replace_page_url(&self, url: &Url) -> Result<()>;

	/// Navigates the top-level page.
	fn assign_location(&self, url: &str) -> Result<()>;

	fn head(&self) -> Result<Self::Element>;

	fn element_by_id(&self, id: &str) -> Option<Self::Element>;

	fn create_element(&self, tag: &str) -> Result<Self::Element>;

	/// Creates an element in the SVG namespace.
	fn create_svg_element(&self, tag: &str) -> Result<Self::Element>;

	/// Sets an inline style property (CSS property name, e.g. `z-index`).
	fn set_style(&self, element: &Self::Element, property: &str, value: &str) -> Result<()>;

	fn set_attribute(&self, element: &Self::Element, name: &str, value: &str) -> Result<()>;

	fn set_text(&self, element: &Self::Element, text: &str);

	fn append_child(&self, parent: &Self::Element, child: &Self::Element) -> Result<()>;

	/// Detaches `element` and its subtree. Detached elements are left alone.
	fn remove(&self, element: &Self::Element);

	/// Points `iframe` at `src`; `on_load` runs once when the frame finishes loading.
	fn load_frame(&self, iframe: &Self::Element, src: &str, on_load: Box<dyn FnOnce()>) -> Result<()>;

	/// Posts `message` to the iframe's content window, scoped to `target_origin`.
	fn post_message(&self, iframe: &Self::Element, message: &Value, target_origin: &str) -> Result<()>;

	fn add_message_listener(&self, listener: MessageCallback) -> Result<ListenerId>;

	fn remove_message_listener(&self, id: ListenerId);

	fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Result<TimerId>;

	fn clear_timeout(&self, id: TimerId);

	fn spawn_local(&self, task: LocalTask);
}
