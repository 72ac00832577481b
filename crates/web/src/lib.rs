//! Browser binding for the Cohort embed session controller.
//!
//! ```javascript
//! import init, { CohortSdk } from 'cohort-embed-web';
//!
//! await init();
//! const sdk = new CohortSdk('https://xps.example.com', true);
//! sdk.renderExperienceSpace({
//!   auth: { authMode: 'custom', userEmail, getAuthToken, customLoginUrl },
//!   iframeOptions: { containerId: 'cohort' },
//! });
//! const off = sdk.on('order.created', payload => console.log(payload.orderId));
//! ```

pub mod host;
pub mod options;

use std::rc::Rc;
use std::sync::Once;

use cohort_embed::logger::Logger;
use cohort_embed::{MessageKind, Session};
use js_sys::Function;
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

pub use host::BrowserHost;

static CONSOLE_LOGGING: Once = Once::new();

/// Routes `tracing` output to the browser console. Safe to call repeatedly.
#[wasm_bindgen(js_name = initConsoleLogging)]
pub fn init_console_logging() {
	CONSOLE_LOGGING.call_once(tracing_wasm::set_as_global_default);
}

/// Embed session exported to JavaScript.
#[wasm_bindgen]
pub struct CohortSdk {
	session: Session<BrowserHost>,
}

#[wasm_bindgen]
impl CohortSdk {
	/// Creates a session. Throws `Invalid XPS origin URL` for a malformed origin.
	#[wasm_bindgen(constructor)]
	pub fn new(xps_origin: &str, verbose: Option<bool>) -> Result<CohortSdk, JsError> {
		console_error_panic_hook::set_once();
		let verbose = verbose.unwrap_or(false);
		if verbose {
			init_console_logging();
		}
		let host = Rc::new(BrowserHost::new()?);
		let session = Session::new(host, xps_origin, verbose)?;
		Ok(Self { session })
	}

	#[wasm_bindgen(js_name = renderExperienceSpace)]
	pub fn render_experience_space(&self, config: JsValue) -> Result<(), JsError> {
		let config = options::read_config(&config)?;
		self.session.render_experience_space(config)?;
		Ok(())
	}

	/// Registers `handler` for `event`; returns a function that unregisters it.
	pub fn on(&self, event: &str, handler: Function) -> Result<Function, JsError> {
		let kind: MessageKind = event.parse()?;
		let subscription = self.session.on(kind, move |message| {
			let serializer = serde_wasm_bindgen::Serializer::json_compatible();
			match message.payload().serialize(&serializer) {
				Ok(payload) => {
					if let Err(err) = handler.call1(&JsValue::NULL, &payload) {
						Logger::global().error(&format!("handler for {kind} threw: {err:?}"));
					}
				}
				Err(err) => {
					Logger::global().error(&format!("could not convert payload: {err}"));
				}
			}
		});
		let off = Closure::<dyn Fn()>::new(move || subscription.unsubscribe());
		Ok(off.into_js_value().unchecked_into())
	}

	#[wasm_bindgen(js_name = navigateTo)]
	pub fn navigate_to(&self, path: &str) -> Result<(), JsError> {
		self.session.navigate_to(path)?;
		Ok(())
	}

	pub fn destroy(&self) {
		self.session.destroy();
	}

	#[wasm_bindgen(getter)]
	pub fn origin(&self) -> String {
		self.session.origin()
	}
}
