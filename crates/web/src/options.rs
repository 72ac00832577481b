//! Reads a JS configuration object into an [`EmbedConfig`].
//!
//! The declarative part is deserialized straight from the JS value; the token
//! provider function and the container element are skipped by serde and read
//! off the caller's object by reflection.

use cohort_embed::{AuthTokenError, EmbedConfig, EmbedOptions, TokenProvider, token_provider};
use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::Element;

fn property(target: &JsValue, key: &str) -> Option<JsValue> {
	if !target.is_object() {
		return None;
	}
	Reflect::get(target, &JsValue::from_str(key))
		.ok()
		.filter(|value| !value.is_undefined() && !value.is_null())
}

fn describe(err: JsValue) -> String {
	err.dyn_ref::<js_sys::Error>()
		.map(|e| String::from(e.message()))
		.or_else(|| err.as_string())
		.unwrap_or_else(|| format!("{err:?}"))
}

/// Wraps a JS `getAuthToken(email)` function returning a string or a promise of one.
pub fn js_token_provider(function: Function) -> TokenProvider {
	token_provider(move |email: String| {
		let function = function.clone();
		async move {
			let returned = function
				.call1(&JsValue::NULL, &JsValue::from_str(&email))
				.map_err(|err| AuthTokenError::new(describe(err)))?;
			let resolved = JsFuture::from(Promise::resolve(&returned))
				.await
				.map_err(|err| AuthTokenError::new(describe(err)))?;
			resolved
				.as_string()
				.ok_or_else(|| AuthTokenError::new("getAuthToken did not resolve to a string"))
		}
	})
}

/// Converts `config` (possibly `undefined`) into a typed configuration.
pub fn read_config(config: &JsValue) -> Result<EmbedConfig<Element>, JsError> {
	if config.is_undefined() || config.is_null() {
		return Ok(EmbedConfig::new());
	}

	let options: EmbedOptions =
		serde_wasm_bindgen::from_value(config.clone()).map_err(|err| JsError::new(&err.to_string()))?;

	let get_auth_token = property(config, "auth")
		.and_then(|auth| property(&auth, "getAuthToken"))
		.and_then(|value| value.dyn_into::<Function>().ok())
		.map(js_token_provider);

	let container = match property(config, "iframeOptions").and_then(|options| property(&options, "container")) {
		Some(value) => Some(
			value
				.dyn_into::<Element>()
				.map_err(|_| JsError::new("iframeOptions.container must be an Element"))?,
		),
		None => None,
	};

	Ok(options.into_config(container, get_auth_token))
}
