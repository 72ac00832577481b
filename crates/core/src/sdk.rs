//! Session controller.
//!
//! A [`Session`] owns at most one [`EmbeddedView`], the single window message
//! listener, the subscriber registry and the login handshake of the live view.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use cohort_embed_protocol::{InboundMessage, MessageKind, validate_message};
use serde_json::{Value, json};
use url::Url;

use crate::config::EmbedConfig;
use crate::embed_url::{EmbedUrlRequest, QueryParams, build_embed_url};
use crate::error::{Error, Result};
use crate::events::{Handler, HandlerRegistry, Subscription};
use crate::handshake::{AuthPlan, HANDSHAKE_TIMEOUT, Handshake, HandshakeState, Outcome};
use crate::host::{Host, ListenerId};
use crate::iframe::{EmbeddedView, SPINNER_KEYFRAMES, resolve_container};
use crate::logger::{self, Logger};

/// Embed session bound to one host page.
///
/// Dropping the session destroys it.
pub struct Session<H: Host> {
	inner: Rc<SessionInner<H>>,
}

struct SessionInner<H: Host> {
	host: Rc<H>,
	origin: Url,
	logger: Logger,
	registry: Rc<HandlerRegistry>,
	listener: Cell<Option<ListenerId>>,
	stylesheet: RefCell<Option<H::Element>>,
	view: RefCell<Option<Rc<EmbeddedView<H>>>>,
	handshake: RefCell<Option<Rc<Handshake>>>,
	generation: Cell<u64>,
	destroyed: Cell<bool>,
}

impl<H: Host> Session<H> {
	/// Creates a session targeting `origin`.
	///
	/// `origin` must be an absolute URL; only its scheme, host and port are
	/// kept. Installs the spinner stylesheet and the window message listener.
	pub fn new(host: Rc<H>, origin: &str, verbose: bool) -> Result<Self> {
		let parsed = Url::parse(origin).map_err(|_| Error::InvalidOrigin)?;
		let origin = parsed.origin();
		if !origin.is_tuple() {
			return Err(Error::InvalidOrigin);
		}
		let origin = Url::parse(&origin.ascii_serialization()).map_err(|_| Error::InvalidOrigin)?;

		logger::set_verbose(verbose);
		let logger = Logger::new(verbose);

		let head = host.head()?;
		let stylesheet = host.create_element("style")?;
		host.set_text(&stylesheet, SPINNER_KEYFRAMES);
		host.append_child(&head, &stylesheet)?;

		let inner = Rc::new(SessionInner {
			host,
			origin,
			logger,
			registry: Rc::new(HandlerRegistry::new()),
			listener: Cell::new(None),
			stylesheet: RefCell::new(Some(stylesheet)),
			view: RefCell::new(None),
			handshake: RefCell::new(None),
			generation: Cell::new(0),
			destroyed: Cell::new(false),
		});

		let weak = Rc::downgrade(&inner);
		let listener = inner.host.add_message_listener(Rc::new(move |data: Value| {
			if let Some(inner) = weak.upgrade() {
				inner.handle_message(&data);
			}
		}));
		match listener {
			Ok(id) => inner.listener.set(Some(id)),
			Err(err) => {
				inner.remove_stylesheet();
				return Err(err);
			}
		}

		Ok(Self { inner })
	}

	/// Serialized experience origin, e.g. `https://xps.example.com`.
	pub fn origin(&self) -> String {
		self.inner.origin.origin().ascii_serialization()
	}

	pub fn host(&self) -> &Rc<H> {
		&self.inner.host
	}

	/// Renders the experience, replacing any live view.
	///
	/// Configuration and container checks run before the document is touched;
	/// when one fails the prior view, if any, is left in place.
	pub fn render_experience_space(&self, config: EmbedConfig<H::Element>) -> Result<()> {
		SessionInner::render(&self.inner, config)
	}

	/// Registers `handler` for every accepted inbound message of `kind`.
	pub fn on<F>(&self, kind: MessageKind, handler: F) -> Subscription
	where
		F: Fn(&InboundMessage) + 'static,
	{
		let handler: Handler = Rc::new(handler);
		Subscription::new(&self.inner.registry, kind, handler)
	}

	/// Asks the live view to navigate to `pathname`.
	pub fn navigate_to(&self, pathname: &str) -> Result<()> {
		let view = self.inner.view.borrow().clone().ok_or(Error::NoView)?;
		view.navigate_to(pathname)
	}

	/// Removes the live view, the stylesheet and the window listener. Idempotent.
	pub fn destroy(&self) {
		self.inner.destroy();
	}

	pub fn is_destroyed(&self) -> bool {
		self.inner.destroyed.get()
	}

	/// Whether the live view finished loading.
	pub fn view_loaded(&self) -> bool {
		self.inner.view.borrow().as_ref().is_some_and(|view| view.is_loaded())
	}

	/// Resolved address of the live view.
	pub fn view_url(&self) -> Option<Url> {
		self.inner.view.borrow().as_ref().map(|view| view.url().clone())
	}

	pub fn view(&self) -> Option<Rc<EmbeddedView<H>>> {
		self.inner.view.borrow().clone()
	}

	pub fn handshake_state(&self) -> HandshakeState {
		self.inner
			.handshake
			.borrow()
			.as_ref()
			.map_or(HandshakeState::Idle, |handshake| handshake.state())
	}
}

impl<H: Host> Drop for Session<H> {
	fn drop(&mut self) {
		self.inner.destroy();
	}
}

impl<H: Host> std::fmt::Debug for Session<H> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("origin", &self.origin())
			.field("destroyed", &self.is_destroyed())
			.field("handshake", &self.handshake_state())
			.finish_non_exhaustive()
	}
}

impl<H: Host> SessionInner<H> {
	fn render(this: &Rc<Self>, config: EmbedConfig<H::Element>) -> Result<()> {
		if this.destroyed.get() {
			return Err(Error::Destroyed);
		}
		let plan = AuthPlan::from_config(&config.auth)?;
		let container = resolve_container(this.host.as_ref(), &config.iframe_options)?;
		let page_url = this.host.page_url()?;

		let mut params = QueryParams::new();
		if let Some(show) = config.show_navbar {
			params.set("navbar", show.to_string());
		}
		if let Some(navigation_type) = config.navigation_type {
			params.set("navigationType", navigation_type.as_str());
		}
		if let Some(locale) = &config.locale {
			params.set("lng", locale.as_str());
		}
		for (key, value) in &config.url_params {
			params.set(key.as_str(), value.as_str());
		}
		let request = EmbedUrlRequest {
			pathname: config.pathname.as_deref(),
			identity: plan.identity_params(),
			params,
		};
		let embed = build_embed_url(&this.origin, &page_url, &request)?;

		this.teardown_view();
		let generation = this.generation.get() + 1;
		this.generation.set(generation);

		let view = Rc::new(EmbeddedView::mount(
			Rc::clone(&this.host),
			&container,
			embed.url,
			&config.iframe_options,
			this.logger,
		)?);
		if let Some(stripped) = &embed.stripped_page_url {
			this.host.replace_page_url(stripped)?;
		}

		*this.view.borrow_mut() = Some(Rc::clone(&view));
		*this.handshake.borrow_mut() = Some(Rc::new(Handshake::new(generation, plan)));

		let weak = Rc::downgrade(this);
		view.load(Some(Box::new(move || {
			if let Some(inner) = weak.upgrade() {
				inner.on_view_loaded(generation);
			}
		})))
	}

	fn handle_message(&self, data: &Value) {
		if self.destroyed.get() {
			return;
		}
		let Some(message) = validate_message(data) else {
			return;
		};
		let kind = message.kind();
		if !self.registry.has_handlers(kind) {
			return;
		}
		self.logger.log_with(
			"Received message",
			json!({ "event": kind.as_str(), "payload": message.payload() }),
		);
		self.registry.emit(&message);
	}

	/// View and handshake of `generation`, if it is still the live one.
	fn current(&self, generation: u64) -> Option<(Rc<EmbeddedView<H>>, Rc<Handshake>)> {
		if self.destroyed.get() {
			return None;
		}
		let handshake = self.handshake.borrow().clone()?;
		if handshake.generation() != generation {
			return None;
		}
		let view = self.view.borrow().clone()?;
		Some((view, handshake))
	}

	fn listen<F>(self: &Rc<Self>, handshake: &Handshake, kind: MessageKind, on_message: F)
	where
		F: Fn(&Rc<Self>, &InboundMessage) + 'static,
	{
		let weak: Weak<Self> = Rc::downgrade(self);
		let handler: Handler = Rc::new(move |message: &InboundMessage| {
			if let Some(inner) = weak.upgrade() {
				on_message(&inner, message);
			}
		});
		handshake.hold(Subscription::new(&self.registry, kind, handler));
	}

	fn on_view_loaded(self: &Rc<Self>, generation: u64) {
		let Some((_, handshake)) = self.current(generation) else {
			return;
		};
		if let AuthPlan::HostIdentity { .. } = handshake.plan() {
			handshake.set_state(HandshakeState::AwaitingAuth { token_requested: false });
			self.listen(&handshake, MessageKind::AuthUpdated, move |inner, message| {
				if let InboundMessage::AuthUpdated(update) = message {
					inner.on_auth_updated(generation, update.is_logged_in);
				}
			});
		} else {
			handshake.set_state(HandshakeState::AwaitingAppLoaded);
			self.listen(&handshake, MessageKind::AppLoaded, move |inner, _| {
				inner.on_app_loaded(generation);
			});
		}
	}

	fn on_app_loaded(self: &Rc<Self>, generation: u64) {
		let Some((view, handshake)) = self.current(generation) else {
			return;
		};
		if handshake.state() != HandshakeState::AwaitingAppLoaded {
			return;
		}
		self.logger.log("App loaded");
		handshake.release(MessageKind::AppLoaded);
		handshake.set_state(HandshakeState::Settled(Outcome::AppLoaded));
		view.hide_spinner();

		if let AuthPlan::AnonymousCustom { .. } = handshake.plan() {
			self.listen(&handshake, MessageKind::AuthRedirect, move |inner, message| {
				if let InboundMessage::AuthRedirect(redirect) = message {
					inner.on_auth_redirect(generation, &redirect.url);
				}
			});
		}
	}

	fn on_auth_redirect(&self, generation: u64, url: &str) {
		let Some((_, handshake)) = self.current(generation) else {
			return;
		};
		self.logger.log_with("Redirecting to custom login URL", json!({ "url": url }));
		handshake.release(MessageKind::AuthRedirect);
		if let Err(err) = self.host.assign_location(url) {
			self.logger.error_with("Redirect failed", json!({ "error": err.to_string() }));
		}
	}

	fn on_auth_updated(self: &Rc<Self>, generation: u64, is_logged_in: bool) {
		let Some((view, handshake)) = self.current(generation) else {
			return;
		};
		if is_logged_in {
			self.logger.log("User is logged in");
			handshake.release(MessageKind::AuthUpdated);
			handshake.disarm(self.host.as_ref());
			handshake.set_state(HandshakeState::Settled(Outcome::LoggedIn));
			view.hide_spinner();
			return;
		}

		let AuthPlan::HostIdentity {
			user_email,
			get_auth_token,
			..
		} = handshake.plan()
		else {
			return;
		};
		if !handshake.request_token() {
			return;
		}
		self.logger.log("User is logged out, calling getAuthToken...");

		let weak = Rc::downgrade(self);
		let timer = self.host.set_timeout(
			HANDSHAKE_TIMEOUT,
			Box::new(move || {
				if let Some(inner) = weak.upgrade() {
					inner.on_timeout(generation);
				}
			}),
		);
		match timer {
			Ok(timer) => handshake.set_timer(timer),
			Err(err) => self.logger.error_with("Could not arm login timeout", json!({ "error": err.to_string() })),
		}

		let token = get_auth_token(user_email.clone());
		let weak = Rc::downgrade(self);
		self.host.spawn_local(Box::pin(async move {
			let token = token.await;
			if let Some(inner) = weak.upgrade() {
				inner.deliver_token(generation, token);
			}
		}));
	}

	fn on_timeout(&self, generation: u64) {
		let Some((view, handshake)) = self.current(generation) else {
			return;
		};
		handshake.timer_fired();
		if handshake.state().is_settled() {
			return;
		}
		self.logger.error("Took too long to validate login, timing out...");
		handshake.release(MessageKind::AuthUpdated);
		handshake.set_state(HandshakeState::Settled(Outcome::TimedOut));
		view.hide_spinner();
	}

	fn deliver_token(&self, generation: u64, token: std::result::Result<String, crate::error::AuthTokenError>) {
		let Some((view, _)) = self.current(generation) else {
			return;
		};
		match token {
			Ok(token) => {
				if let Err(err) = view.login(&token) {
					self.logger.error_with("Could not deliver authToken", json!({ "error": err.to_string() }));
				}
			}
			Err(err) => self.logger.error_with("getAuthToken failed", json!({ "error": err.to_string() })),
		}
	}

	fn teardown_view(&self) {
		let handshake = self.handshake.borrow_mut().take();
		if let Some(handshake) = handshake {
			handshake.abandon(self.host.as_ref());
		}
		let view = self.view.borrow_mut().take();
		if let Some(view) = view {
			view.destroy();
		}
	}

	fn remove_stylesheet(&self) {
		let stylesheet = self.stylesheet.borrow_mut().take();
		if let Some(stylesheet) = stylesheet {
			self.host.remove(&stylesheet);
		}
	}

	fn destroy(&self) {
		if self.destroyed.get() {
			return;
		}
		self.logger.log("Destroying SDK instance");
		self.destroyed.set(true);
		self.teardown_view();
		if let Some(listener) = self.listener.take() {
			self.host.remove_message_listener(listener);
		}
		self.remove_stylesheet();
	}
}
