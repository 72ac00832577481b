//! Iframe lifecycle manager.
//!
//! An [`EmbeddedView`] owns one wrapper element containing the experience
//! iframe and a spinner overlay. Its lifecycle is
//! `Constructed -> Loading -> Loaded -> Destroyed`; destroy is reachable from
//! every state and is final.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cohort_embed_protocol::OutboundMessage;
use serde_json::json;
use url::Url;

use crate::config::{IframeOptions, IframeStyle, SpinnerStyle};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::logger::Logger;

const SPINNER_BACKGROUND: &str = "#E8E9E8";
const SPINNER_COLOR: &str = "#000";
const SPINNER_ARC: &str =
	"M4 12a8 8 0 018-8V0C5.373 0 0 5.373 0 12h4zm2 5.291A7.962 7.962 0 014 12H0c0 3.042 1.135 5.824 3 7.938l3-2.647z";

/// Keyframes the spinner animation refers to; injected once per session.
pub const SPINNER_KEYFRAMES: &str = "@keyframes sdk-spin { to { transform: rotate(360deg); } }";

/// Lifecycle state of an [`EmbeddedView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
	Constructed,
	Loading,
	Loaded,
	Destroyed,
}

/// Resolves the element a view attaches to.
///
/// Exactly one of `container` and `container_id` must be set.
pub fn resolve_container<H: Host>(host: &H, options: &IframeOptions<H::Element>) -> Result<H::Element> {
	match (&options.container, &options.container_id) {
		(Some(_), Some(_)) => Err(Error::ConflictingContainer),
		(Some(container), None) => Ok(container.clone()),
		(None, Some(id)) => host.element_by_id(id).ok_or_else(|| Error::ContainerNotFound(id.clone())),
		(None, None) => Err(Error::NoContainer),
	}
}

/// One rendered experience iframe.
pub struct EmbeddedView<H: Host> {
	host: Rc<H>,
	wrapper: H::Element,
	iframe: H::Element,
	spinner: RefCell<Option<H::Element>>,
	url: Url,
	target_origin: String,
	state: Rc<Cell<ViewState>>,
	logger: Logger,
}

impl<H: Host> EmbeddedView<H> {
	/// Builds the wrapper, iframe and spinner and attaches them to `container`.
	///
	/// The subtree is assembled detached and attached with a single append, so
	/// a failure leaves the container untouched.
	pub fn mount(
		host: Rc<H>,
		container: &H::Element,
		url: Url,
		options: &IframeOptions<H::Element>,
		logger: Logger,
	) -> Result<Self> {
		let wrapper = create_wrapper(host.as_ref(), &options.iframe_style)?;
		let iframe = host.create_element("iframe")?;
		for (property, value) in [("width", "100%"), ("height", "100%"), ("border", "0")] {
			host.set_style(&iframe, property, value)?;
		}
		host.set_attribute(&iframe, "loading", "lazy")?;
		let spinner = create_spinner(host.as_ref(), &options.spinner_style)?;

		host.append_child(&wrapper, &iframe)?;
		host.append_child(&wrapper, &spinner)?;
		host.append_child(container, &wrapper)?;

		let target_origin = url.origin().ascii_serialization();
		Ok(Self {
			host,
			wrapper,
			iframe,
			spinner: RefCell::new(Some(spinner)),
			url,
			target_origin,
			state: Rc::new(Cell::new(ViewState::Constructed)),
			logger,
		})
	}

	/// Resolved address, including every query parameter.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Origin messages to the iframe are scoped to.
	pub fn target_origin(&self) -> &str {
		&self.target_origin
	}

	pub fn state(&self) -> ViewState {
		self.state.get()
	}

	pub fn is_loaded(&self) -> bool {
		self.state.get() == ViewState::Loaded
	}

	pub fn is_destroyed(&self) -> bool {
		self.state.get() == ViewState::Destroyed
	}

	pub fn has_spinner(&self) -> bool {
		self.spinner.borrow().is_some()
	}

	pub fn wrapper(&self) -> &H::Element {
		&self.wrapper
	}

	pub fn iframe(&self) -> &H::Element {
		&self.iframe
	}

	/// Starts loading the resolved URL; `on_loaded` runs once on load completion.
	pub fn load(&self, on_loaded: Option<Box<dyn FnOnce()>>) -> Result<()> {
		if self.state.get() != ViewState::Constructed {
			return Ok(());
		}
		self.logger.log_with("Loading iframe", json!({ "url": self.url.as_str() }));
		self.state.set(ViewState::Loading);

		let state = Rc::clone(&self.state);
		let logger = self.logger;
		self.host.load_frame(
			&self.iframe,
			self.url.as_str(),
			Box::new(move || {
				if state.get() != ViewState::Loading {
					return;
				}
				logger.log("Iframe loaded");
				state.set(ViewState::Loaded);
				if let Some(on_loaded) = on_loaded {
					on_loaded();
				}
			}),
		)
	}

	/// Removes the spinner overlay. Idempotent.
	pub fn hide_spinner(&self) {
		let spinner = self.spinner.borrow_mut().take();
		if let Some(spinner) = spinner {
			self.logger.log("Hiding spinner");
			self.host.remove(&spinner);
		}
	}

	/// Delivers an auth token to the experience.
	pub fn login(&self, auth_token: &str) -> Result<()> {
		self.logger.log("Sending authToken...");
		self.post(&OutboundMessage::login(auth_token))
	}

	/// Asks the experience to navigate to `pathname`.
	pub fn navigate_to(&self, pathname: &str) -> Result<()> {
		self.logger.log_with("Navigating to", json!({ "pathname": pathname }));
		self.post(&OutboundMessage::navigate(pathname))
	}

	fn post(&self, message: &OutboundMessage) -> Result<()> {
		if self.is_destroyed() {
			return Ok(());
		}
		self.host.post_message(&self.iframe, &message.to_value(), &self.target_origin)
	}

	/// Removes the wrapper and its subtree. Idempotent.
	pub fn destroy(&self) {
		if self.state.replace(ViewState::Destroyed) == ViewState::Destroyed {
			return;
		}
		self.spinner.borrow_mut().take();
		self.host.remove(&self.wrapper);
	}
}

fn create_wrapper<H: Host>(host: &H, style: &IframeStyle) -> Result<H::Element> {
	let wrapper = host.create_element("div")?;
	let width = style.width.as_deref().unwrap_or("100%");
	let height = style.height.as_deref().unwrap_or("100%");
	let border = style.border.as_deref().unwrap_or("0");
	for (property, value) in [
		("position", "relative"),
		("width", width),
		("height", height),
		("border", border),
	] {
		host.set_style(&wrapper, property, value)?;
	}
	Ok(wrapper)
}

fn create_spinner<H: Host>(host: &H, style: &SpinnerStyle) -> Result<H::Element> {
	let overlay = host.create_element("div")?;
	let background = style.background_color.as_deref().unwrap_or(SPINNER_BACKGROUND);
	for (property, value) in [
		("display", "flex"),
		("justify-content", "center"),
		("align-items", "center"),
		("position", "absolute"),
		("top", "0"),
		("left", "0"),
		("width", "100%"),
		("height", "100%"),
		("background-color", background),
		("z-index", "9999"),
	] {
		host.set_style(&overlay, property, value)?;
	}

	let svg = host.create_svg_element("svg")?;
	let color = style.color.as_deref().unwrap_or(SPINNER_COLOR);
	for (property, value) in [
		("animation", "sdk-spin 1s linear infinite"),
		("width", "24px"),
		("height", "24px"),
		("color", color),
	] {
		host.set_style(&svg, property, value)?;
	}
	host.set_attribute(&svg, "viewBox", "0 0 24 24")?;

	let circle = host.create_svg_element("circle")?;
	for (property, value) in [
		("opacity", "0.2"),
		("stroke", "currentColor"),
		("stroke-width", "4"),
		("fill", "none"),
	] {
		host.set_style(&circle, property, value)?;
	}
	for (name, value) in [("cx", "12"), ("cy", "12"), ("r", "10")] {
		host.set_attribute(&circle, name, value)?;
	}

	let arc = host.create_svg_element("path")?;
	host.set_style(&arc, "opacity", "1")?;
	host.set_style(&arc, "fill", "currentColor")?;
	host.set_attribute(&arc, "d", SPINNER_ARC)?;

	host.append_child(&svg, &circle)?;
	host.append_child(&svg, &arc)?;
	host.append_child(&overlay, &svg)?;
	Ok(overlay)
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use serde_json::json;

	use super::*;
	use crate::host::fake::{FakeElement, FakeHost, Namespace};

	fn root_options(host: &FakeHost) -> IframeOptions<FakeElement> {
		host.create_container("root");
		IframeOptions {
			container_id: Some("root".to_string()),
			..Default::default()
		}
	}

	fn mount(host: &Rc<FakeHost>, options: &IframeOptions<FakeElement>) -> EmbeddedView<FakeHost> {
		let container = resolve_container(host.as_ref(), options).unwrap();
		let url = Url::parse("https://xps.test/space/home?embedded=true").unwrap();
		EmbeddedView::mount(Rc::clone(host), &container, url, options, Logger::new(false)).unwrap()
	}

	#[test]
	fn container_selection_is_exclusive() {
		let host = FakeHost::new();
		let container = host.create_container("root");

		let both = IframeOptions {
			container: Some(container),
			container_id: Some("root".to_string()),
			..Default::default()
		};
		assert!(matches!(resolve_container(&host, &both), Err(Error::ConflictingContainer)));

		let missing = IframeOptions::<FakeElement> {
			container_id: Some("invalid-id".to_string()),
			..Default::default()
		};
		let err = resolve_container(&host, &missing).unwrap_err();
		assert_eq!(err.to_string(), "Container with id invalid-id not found");

		let by_id = IframeOptions::<FakeElement> {
			container_id: Some("root".to_string()),
			..Default::default()
		};
		assert_eq!(resolve_container(&host, &by_id).unwrap(), container);
		assert!(matches!(
			resolve_container(&host, &IframeOptions::default()),
			Err(Error::NoContainer)
		));
	}

	#[test]
	fn mount_builds_wrapper_iframe_and_spinner() {
		let host = Rc::new(FakeHost::new());
		let container = host.create_container("root");
		let options = IframeOptions {
			container: Some(container),
			iframe_style: IframeStyle {
				width: Some("400px".to_string()),
				..Default::default()
			},
			spinner_style: SpinnerStyle {
				background_color: Some("red".to_string()),
				color: Some("blue".to_string()),
			},
			..Default::default()
		};
		let view = mount(&host, &options);

		let iframe = *view.iframe();
		let wrapper = *view.wrapper();
		assert_eq!(host.parent(iframe), Some(wrapper));
		assert_eq!(host.parent(wrapper), Some(container));
		assert_eq!(host.style(wrapper, "width").as_deref(), Some("400px"));
		assert_eq!(host.style(wrapper, "height").as_deref(), Some("100%"));
		assert_eq!(host.style(wrapper, "position").as_deref(), Some("relative"));
		assert_eq!(host.style(iframe, "width").as_deref(), Some("100%"));
		assert_eq!(host.attribute(iframe, "loading").as_deref(), Some("lazy"));

		let spinner = host.next_sibling(iframe).unwrap();
		assert_eq!(host.style(spinner, "background-color").as_deref(), Some("red"));
		assert_eq!(host.style(spinner, "z-index").as_deref(), Some("9999"));
		let svg = host.children(spinner)[0];
		assert_eq!(host.namespace(svg), Some(Namespace::Svg));
		assert_eq!(host.style(svg, "color").as_deref(), Some("blue"));
		assert_eq!(host.children(svg).len(), 2);
		assert_eq!(view.state(), ViewState::Constructed);
	}

	#[test]
	fn load_sets_src_and_runs_continuation_once() {
		let host = Rc::new(FakeHost::new());
		let view = mount(&host, &root_options(&host));
		let calls = Rc::new(Cell::new(0));
		let counter = Rc::clone(&calls);

		view.load(Some(Box::new(move || counter.set(counter.get() + 1)))).unwrap();
		assert_eq!(view.state(), ViewState::Loading);
		assert!(!view.is_loaded());
		assert_eq!(
			host.attribute(*view.iframe(), "src").as_deref(),
			Some("https://xps.test/space/home?embedded=true")
		);

		assert!(host.fire_load(*view.iframe()));
		assert!(!host.fire_load(*view.iframe()));
		assert!(view.is_loaded());
		assert_eq!(calls.get(), 1);
	}

	#[test]
	fn hide_spinner_is_idempotent() {
		let host = Rc::new(FakeHost::new());
		let view = mount(&host, &root_options(&host));
		let iframe = *view.iframe();

		view.hide_spinner();
		view.hide_spinner();

		assert!(!view.has_spinner());
		assert_eq!(host.next_sibling(iframe), None);
	}

	#[test]
	fn messages_are_scoped_to_the_resolved_origin() {
		let host = Rc::new(FakeHost::new());
		let view = mount(&host, &root_options(&host));

		view.login("tok").unwrap();
		view.navigate_to("/test").unwrap();

		let posted = host.take_posted();
		assert_eq!(posted.len(), 2);
		assert_eq!(
			posted[0].message,
			json!({"event": "login.authToken", "payload": {"authToken": "tok"}})
		);
		assert_eq!(posted[0].target_origin, "https://xps.test");
		assert_eq!(
			posted[1].message,
			json!({"event": "location.update", "payload": {"pathname": "/test"}})
		);
		assert!(posted.iter().all(|p| p.target_origin != "*"));
	}

	#[test]
	fn destroy_removes_subtree_and_silences_view() {
		let host = Rc::new(FakeHost::new());
		let view = mount(&host, &root_options(&host));
		let continuation = Rc::new(Cell::new(false));
		let flag = Rc::clone(&continuation);
		view.load(Some(Box::new(move || flag.set(true)))).unwrap();

		view.destroy();
		view.destroy();

		assert!(host.elements_by_tag("iframe").is_empty());
		assert!(!host.is_connected(*view.wrapper()));
		assert!(!host.fire_load(*view.iframe()));
		assert!(!continuation.get());

		view.login("late").unwrap();
		assert!(host.posted_messages().is_empty());
	}
}
