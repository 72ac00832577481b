//! [`Host`] implementation over the browser DOM.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use cohort_embed::error::{Error, Result};
use cohort_embed::host::{Host, ListenerId, LocalTask, MessageCallback, TimerId};
use cohort_embed::logger::Logger;
use serde::Serialize;
use serde_json::Value;
use url::Url;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CssStyleDeclaration, Document, Element, HtmlElement, HtmlIFrameElement, MessageEvent, SvgElement, Window};

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

type MessageClosure = Closure<dyn FnMut(MessageEvent)>;
type TimerClosure = Closure<dyn FnMut()>;

/// Pending timers keyed by [`TimerId`], each with its browser handle and the
/// value keeping its callback alive. An entry leaves the table when the timer
/// fires or is cleared, whichever happens first.
pub struct TimerTable<C> {
	entries: HashMap<u64, (i32, C)>,
}

impl<C> Default for TimerTable<C> {
	fn default() -> Self {
		Self { entries: HashMap::new() }
	}
}

impl<C> TimerTable<C> {
	pub fn insert(&mut self, id: u64, handle: i32, closure: C) {
		self.entries.insert(id, (handle, closure));
	}

	pub fn remove(&mut self, id: u64) -> Option<(i32, C)> {
		self.entries.remove(&id)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn drain(&mut self) -> impl Iterator<Item = (i32, C)> + '_ {
		self.entries.drain().map(|(_, entry)| entry)
	}
}

/// Runs a fired timer: forgets `id`, then calls `callback` at most once.
///
/// The table is not borrowed while `callback` runs, so it may set or clear
/// other timers. Returns the removed closure, which is still executing and
/// must only be dropped after the current task.
fn fire_timer<C>(timers: &RefCell<TimerTable<C>>, id: u64, callback: &mut Option<Box<dyn FnOnce()>>) -> Option<C> {
	let entry = timers.borrow_mut().remove(id);
	if let Some(callback) = callback.take() {
		callback();
	}
	entry.map(|(_, closure)| closure)
}

fn js_error(err: JsValue) -> Error {
	let message = err
		.dyn_ref::<js_sys::Error>()
		.map(|e| String::from(e.message()))
		.or_else(|| err.as_string())
		.unwrap_or_else(|| format!("{err:?}"));
	Error::Host(message)
}

/// The current page's window and document.
pub struct BrowserHost {
	window: Window,
	document: Document,
	listeners: RefCell<HashMap<u64, MessageClosure>>,
	timers: Rc<RefCell<TimerTable<TimerClosure>>>,
	next_id: Cell<u64>,
}

impl BrowserHost {
	pub fn new() -> Result<Self> {
		let window = web_sys::window().ok_or_else(|| Error::Host("no window".to_string()))?;
		let document = window
			.document()
			.ok_or_else(|| Error::Host("no document".to_string()))?;
		Ok(Self {
			window,
			document,
			listeners: RefCell::new(HashMap::new()),
			timers: Rc::new(RefCell::new(TimerTable::default())),
			next_id: Cell::new(1),
		})
	}

	fn next_id(&self) -> u64 {
		let id = self.next_id.get();
		self.next_id.set(id + 1);
		id
	}

	fn style_of(element: &Element) -> Result<CssStyleDeclaration> {
		if let Some(html) = element.dyn_ref::<HtmlElement>() {
			return Ok(html.style());
		}
		if let Some(svg) = element.dyn_ref::<SvgElement>() {
			return Ok(svg.style());
		}
		Err(Error::Host(format!("<{}> has no inline style", element.tag_name())))
	}
}

impl Host for BrowserHost {
	type Element = Element;

	fn page_url(&self) -> Result<Url> {
		let href = self.window.location().href().map_err(js_error)?;
		Ok(Url::parse(&href)?)
	}

	fn replace_page_url(&self, url: &Url) -> Result<()> {
		let history = self.window.history().map_err(js_error)?;
		history
			.replace_state_with_url(&JsValue::NULL, "", Some(url.as_str()))
			.map_err(js_error)
	}

	fn assign_location(&self, url: &str) -> Result<()> {
		self.window.location().assign(url).map_err(js_error)
	}

	fn head(&self) -> Result<Element> {
		self.document
			.head()
			.map(Element::from)
			.ok_or_else(|| Error::Host("document has no head".to_string()))
	}

	fn element_by_id(&self, id: &str) -> Option<Element> {
		self.document.get_element_by_id(id)
	}

	fn create_element(&self, tag: &str) -> Result<Element> {
		self.document.create_element(tag).map_err(js_error)
	}

	fn create_svg_element(&self, tag: &str) -> Result<Element> {
		self.document
			.create_element_ns(Some(SVG_NAMESPACE), tag)
			.map_err(js_error)
	}

	fn set_style(&self, element: &Element, property: &str, value: &str) -> Result<()> {
		Self::style_of(element)?
			.set_property(property, value)
			.map_err(js_error)
	}

	fn set_attribute(&self, element: &Element, name: &str, value: &str) -> Result<()> {
		element.set_attribute(name, value).map_err(js_error)
	}

	fn set_text(&self, element: &Element, text: &str) {
		element.set_text_content(Some(text));
	}

	fn append_child(&self, parent: &Element, child: &Element) -> Result<()> {
		parent.append_child(child).map(drop).map_err(js_error)
	}

	fn remove(&self, element: &Element) {
		element.remove();
	}

	fn load_frame(&self, iframe: &Element, src: &str, on_load: Box<dyn FnOnce()>) -> Result<()> {
		let frame = iframe
			.dyn_ref::<HtmlIFrameElement>()
			.ok_or_else(|| Error::Host("load_frame target is not an iframe".to_string()))?;
		let handler = Closure::once_into_js(move || on_load());
		frame.set_onload(Some(handler.unchecked_ref()));
		frame.set_src(src);
		Ok(())
	}

	fn post_message(&self, iframe: &Element, message: &Value, target_origin: &str) -> Result<()> {
		let Some(content) = iframe
			.dyn_ref::<HtmlIFrameElement>()
			.and_then(HtmlIFrameElement::content_window)
		else {
			return Ok(());
		};
		let serializer = serde_wasm_bindgen::Serializer::json_compatible();
		let data = message
			.serialize(&serializer)
			.map_err(|err| Error::Host(err.to_string()))?;
		content.post_message(&data, target_origin).map_err(js_error)
	}

	fn add_message_listener(&self, listener: MessageCallback) -> Result<ListenerId> {
		let closure: MessageClosure = Closure::new(move |event: MessageEvent| {
			// Foreign traffic that is not plain data is dropped like any other invalid message.
			if let Ok(data) = serde_wasm_bindgen::from_value::<Value>(event.data()) {
				listener(data);
			}
		});
		self.window
			.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
			.map_err(js_error)?;
		let id = self.next_id();
		self.listeners.borrow_mut().insert(id, closure);
		Ok(ListenerId(id))
	}

	fn remove_message_listener(&self, id: ListenerId) {
		let Some(closure) = self.listeners.borrow_mut().remove(&id.0) else {
			return;
		};
		if let Err(err) = self
			.window
			.remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
		{
			Logger::global().warn(&format!("failed to remove message listener: {}", js_error(err)));
		}
		// The listener may be the one currently running; free it once the task ends.
		wasm_bindgen_futures::spawn_local(async move { drop(closure) });
	}

	fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Result<TimerId> {
		let id = self.next_id();
		let timers = Rc::clone(&self.timers);
		let mut callback = Some(callback);
		let closure: TimerClosure = Closure::new(move || {
			if let Some(closure) = fire_timer(&timers, id, &mut callback) {
				wasm_bindgen_futures::spawn_local(async move { drop(closure) });
			}
		});
		let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
		let handle = self
			.window
			.set_timeout_with_callback_and_timeout_and_arguments_0(closure.as_ref().unchecked_ref(), millis)
			.map_err(js_error)?;
		self.timers.borrow_mut().insert(id, handle, closure);
		Ok(TimerId(id))
	}

	fn clear_timeout(&self, id: TimerId) {
		let entry = self.timers.borrow_mut().remove(id.0);
		if let Some((handle, closure)) = entry {
			self.window.clear_timeout_with_handle(handle);
			drop(closure);
		}
	}

	fn spawn_local(&self, task: LocalTask) {
		wasm_bindgen_futures::spawn_local(task);
	}
}

impl Drop for BrowserHost {
	fn drop(&mut self) {
		for (_, closure) in self.listeners.get_mut().drain() {
			let _ = self
				.window
				.remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref());
		}
		let pending: Vec<(i32, TimerClosure)> = self.timers.borrow_mut().drain().collect();
		for (handle, _closure) in pending {
			self.window.clear_timeout_with_handle(handle);
		}
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use super::*;

	#[test]
	fn fired_timer_leaves_the_table_and_runs_once() {
		let timers = RefCell::new(TimerTable::default());
		timers.borrow_mut().insert(1, 10, "handshake");
		timers.borrow_mut().insert(2, 11, "other");
		let calls = Rc::new(Cell::new(0));
		let counter = Rc::clone(&calls);
		let mut callback: Option<Box<dyn FnOnce()>> = Some(Box::new(move || counter.set(counter.get() + 1)));

		assert_eq!(fire_timer(&timers, 1, &mut callback), Some("handshake"));
		assert_eq!(fire_timer(&timers, 1, &mut callback), None);

		assert_eq!(calls.get(), 1);
		assert_eq!(timers.borrow().len(), 1);
		assert!(timers.borrow_mut().remove(1).is_none());
	}

	#[test]
	fn callback_may_reschedule_while_firing() {
		let timers = Rc::new(RefCell::new(TimerTable::default()));
		timers.borrow_mut().insert(1, 10, 1u8);
		let inner = Rc::clone(&timers);
		let mut callback: Option<Box<dyn FnOnce()>> = Some(Box::new(move || {
			inner.borrow_mut().insert(2, 20, 2u8);
			assert!(inner.borrow_mut().remove(1).is_none());
		}));

		assert_eq!(fire_timer(&timers, 1, &mut callback), Some(1));
		assert_eq!(timers.borrow().len(), 1);
	}

	#[test]
	fn cleared_and_drained_timers_are_released() {
		let mut table = TimerTable::default();
		table.insert(1, 10, "a");
		table.insert(2, 11, "b");

		assert_eq!(table.remove(2), Some((11, "b")));
		let rest: Vec<_> = table.drain().collect();

		assert_eq!(rest, vec![(10, "a")]);
		assert!(table.is_empty());
	}
}
