// Shared fixtures for session integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use cohort_embed::host::fake::{FakeElement, FakeHost};
use cohort_embed::{AuthTokenError, CustomAuth, EmbedConfig, Host, Session, TokenProvider, token_provider};
use serde_json::{Value, json};
use url::Url;

pub const ORIGIN: &str = "https://testouze.com";
pub const EMAIL: &str = "test-sdk@getcohort.com";
pub const LOGIN_URL: &str = "https://host.test/login";
pub const ROOT_ID: &str = "root";

pub fn verbose_session(host: &Rc<FakeHost>) -> Session<FakeHost> {
	Session::new(Rc::clone(host), ORIGIN, true).unwrap()
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

/// Runs `f` with a thread-local subscriber and returns everything it logged.
pub fn capture_logs(f: impl FnOnce()) -> String {
	let captured = Captured::default();
	let writer = captured.clone();
	let subscriber = tracing_subscriber::fmt()
		.with_ansi(false)
		.with_max_level(tracing::Level::INFO)
		.with_writer(move || writer.clone())
		.finish();
	tracing::subscriber::with_default(subscriber, f);
	let bytes = captured.0.lock().unwrap().clone();
	String::from_utf8(bytes).unwrap()
}

pub fn host() -> Rc<FakeHost> {
	Rc::new(FakeHost::new())
}

pub fn host_at(page_url: &str) -> Rc<FakeHost> {
	Rc::new(FakeHost::with_page_url(Url::parse(page_url).unwrap()))
}

pub fn session(host: &Rc<FakeHost>) -> Session<FakeHost> {
	Session::new(Rc::clone(host), ORIGIN, false).unwrap()
}

/// Token provider that counts its calls and resolves to `token`.
pub struct CountingProvider {
	pub calls: Rc<Cell<usize>>,
	pub emails: Rc<RefCell<Vec<String>>>,
	pub provider: TokenProvider,
}

pub fn counting_provider(token: &'static str) -> CountingProvider {
	let calls = Rc::new(Cell::new(0));
	let emails = Rc::new(RefCell::new(Vec::new()));
	let (c, e) = (Rc::clone(&calls), Rc::clone(&emails));
	let provider = token_provider(move |email: String| {
		c.set(c.get() + 1);
		e.borrow_mut().push(email);
		async move { Ok::<_, AuthTokenError>(token.to_string()) }
	});
	CountingProvider { calls, emails, provider }
}

/// Token provider whose result is released manually.
pub struct DeferredProvider {
	pub provider: TokenProvider,
	release: Rc<RefCell<Option<futures::channel::oneshot::Sender<Result<String, AuthTokenError>>>>>,
}

impl DeferredProvider {
	pub fn resolve(&self, host: &FakeHost, token: &str) {
		if let Some(sender) = self.release.borrow_mut().take() {
			let _ = sender.send(Ok(token.to_string()));
		}
		host.run_until_stalled();
	}

	pub fn reject(&self, host: &FakeHost, message: &str) {
		if let Some(sender) = self.release.borrow_mut().take() {
			let _ = sender.send(Err(AuthTokenError::new(message)));
		}
		host.run_until_stalled();
	}
}

pub fn deferred_provider() -> DeferredProvider {
	let release = Rc::new(RefCell::new(None));
	let slot = Rc::clone(&release);
	let provider = token_provider(move |_email: String| {
		let (sender, receiver) = futures::channel::oneshot::channel();
		*slot.borrow_mut() = Some(sender);
		async move {
			receiver
				.await
				.unwrap_or_else(|_| Err(AuthTokenError::new("provider dropped")))
		}
	});
	DeferredProvider { provider, release }
}

/// The `#root` container, created on first use.
pub fn root(host: &FakeHost) -> FakeElement {
	host.element_by_id(ROOT_ID)
		.unwrap_or_else(|| host.create_container(ROOT_ID))
}

/// Native-mode config targeting `#root`.
pub fn config(host: &FakeHost) -> EmbedConfig<FakeElement> {
	root(host);
	EmbedConfig::new().with_container_id(ROOT_ID)
}

pub fn custom_config(host: &FakeHost, provider: TokenProvider) -> EmbedConfig<FakeElement> {
	config(host).with_custom_auth(CustomAuth::new(Some(EMAIL.to_string()), provider, LOGIN_URL))
}

pub fn auth_updated(is_logged_in: bool) -> Value {
	json!({ "event": "auth.updated", "payload": { "isLoggedIn": is_logged_in } })
}

pub fn app_loaded() -> Value {
	json!({ "event": "app.loaded", "payload": {} })
}

pub fn login_message(token: &str) -> Value {
	json!({ "event": "login.authToken", "payload": { "authToken": token } })
}

/// Fires the load event of the single live iframe.
pub fn load_iframe(host: &FakeHost) -> FakeElement {
	let frames = host.elements_by_tag("iframe");
	assert_eq!(frames.len(), 1, "expected exactly one iframe");
	assert!(host.fire_load(frames[0]));
	frames[0]
}

/// Spinner overlay of `iframe`, if still attached.
pub fn spinner(host: &FakeHost, iframe: FakeElement) -> Option<FakeElement> {
	host.next_sibling(iframe)
}
