//! In-memory host for unit testing sessions without a browser.
//!
//! Provides a tiny node arena standing in for the document, a manual clock
//! for timers, a local executor for spawned tasks, and recorders for posted
//! messages, history replacements and top-level navigations.
//!
//! # Example
//!
//! ```ignore
//! let host = Rc::new(FakeHost::new());
//! let session = Session::new(Rc::clone(&host), "https://xps.test", false)?;
//! host.create_container("root");
//! session.render_experience_space(EmbedConfig::new().with_container_id("root"))?;
//!
//! let iframe = host.elements_by_tag("iframe")[0];
//! host.fire_load(iframe);
//! host.dispatch_message(json!({"event": "app.loaded", "payload": {}}));
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use serde_json::Value;
use url::Url;

use super::{Host, ListenerId, LocalTask, MessageCallback, TimerId};
use crate::error::{Error, Result};

/// Page address used by [`FakeHost::new`].
pub const DEFAULT_PAGE_URL: &str = "http://localhost:3000/";

const ROOT: usize = 0;
const HEAD: usize = 1;
const BODY: usize = 2;

/// Handle to a node in the fake document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FakeElement(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
	Html,
	Svg,
}

#[derive(Debug)]
struct Node {
	tag: String,
	namespace: Namespace,
	attributes: BTreeMap<String, String>,
	style: BTreeMap<String, String>,
	text: Option<String>,
	children: Vec<usize>,
	parent: Option<usize>,
}

impl Node {
	fn new(tag: &str, namespace: Namespace) -> Self {
		Self {
			tag: tag.to_string(),
			namespace,
			attributes: BTreeMap::new(),
			style: BTreeMap::new(),
			text: None,
			children: Vec::new(),
			parent: None,
		}
	}
}

/// A message recorded by [`Host::post_message`].
#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
	pub frame: FakeElement,
	pub message: Value,
	pub target_origin: String,
}

struct Timer {
	id: TimerId,
	due: Duration,
	callback: Box<dyn FnOnce()>,
}

/// In-memory [`Host`].
pub struct FakeHost {
	nodes: RefCell<Vec<Node>>,
	page_url: RefCell<Url>,
	history_replacements: Cell<usize>,
	assigned: RefCell<Vec<String>>,
	posted: RefCell<Vec<PostedMessage>>,
	load_callbacks: RefCell<HashMap<usize, Box<dyn FnOnce()>>>,
	listeners: RefCell<Vec<(ListenerId, MessageCallback)>>,
	timers: RefCell<Vec<Timer>>,
	now: Cell<Duration>,
	next_id: Cell<u64>,
	pool: RefCell<LocalPool>,
	spawner: LocalSpawner,
}

impl FakeHost {
	/// Creates a host whose page lives at [`DEFAULT_PAGE_URL`].
	pub fn new() -> Self {
		Self::with_page_url(Url::parse(DEFAULT_PAGE_URL).expect("default page URL is valid"))
	}

	pub fn with_page_url(page_url: Url) -> Self {
		let mut nodes = vec![
			Node::new("html", Namespace::Html),
			Node::new("head", Namespace::Html),
			Node::new("body", Namespace::Html),
		];
		nodes[ROOT].children = vec![HEAD, BODY];
		nodes[HEAD].parent = Some(ROOT);
		nodes[BODY].parent = Some(ROOT);

		let pool = LocalPool::new();
		let spawner = pool.spawner();

		Self {
			nodes: RefCell::new(nodes),
			page_url: RefCell::new(page_url),
			history_replacements: Cell::new(0),
			assigned: RefCell::new(Vec::new()),
			posted: RefCell::new(Vec::new()),
			load_callbacks: RefCell::new(HashMap::new()),
			listeners: RefCell::new(Vec::new()),
			timers: RefCell::new(Vec::new()),
			now: Cell::new(Duration::ZERO),
			next_id: Cell::new(1),
			pool: RefCell::new(pool),
			spawner,
		}
	}

	fn next_id(&self) -> u64 {
		let id = self.next_id.get();
		self.next_id.set(id + 1);
		id
	}

	fn insert(&self, tag: &str, namespace: Namespace) -> FakeElement {
		let mut nodes = self.nodes.borrow_mut();
		nodes.push(Node::new(tag, namespace));
		FakeElement(nodes.len() - 1)
	}

	fn with_node<T>(&self, element: FakeElement, f: impl FnOnce(&Node) -> T) -> Option<T> {
		self.nodes.borrow().get(element.0).map(f)
	}

	fn with_node_mut<T>(&self, element: FakeElement, f: impl FnOnce(&mut Node) -> T) -> Result<T> {
		self.nodes
			.borrow_mut()
			.get_mut(element.0)
			.map(f)
			.ok_or_else(|| Error::Host(format!("unknown element {}", element.0)))
	}

	fn subtree(&self, element: FakeElement) -> Vec<usize> {
		let nodes = self.nodes.borrow();
		let mut out = Vec::new();
		let mut stack = vec![element.0];
		while let Some(id) = stack.pop() {
			out.push(id);
			if let Some(node) = nodes.get(id) {
				stack.extend(node.children.iter().rev());
			}
		}
		out
	}

	fn connected_in_order(&self) -> Vec<usize> {
		self.subtree(FakeElement(ROOT))
	}

	fn is_ancestor(&self, ancestor: usize, mut id: usize) -> bool {
		let nodes = self.nodes.borrow();
		loop {
			if id == ancestor {
				return true;
			}
			match nodes.get(id).and_then(|n| n.parent) {
				Some(parent) => id = parent,
				None => return false,
			}
		}
	}

	/// Returns `true` when `element` is attached to the document.
	pub fn is_connected(&self, element: FakeElement) -> bool {
		self.is_ancestor(ROOT, element.0)
	}

	/// Attached elements with `tag`, in document order.
	pub fn elements_by_tag(&self, tag: &str) -> Vec<FakeElement> {
		let order = self.connected_in_order();
		let nodes = self.nodes.borrow();
		order
			.into_iter()
			.filter(|id| nodes[*id].tag == tag)
			.map(FakeElement)
			.collect()
	}

	pub fn tag(&self, element: FakeElement) -> Option<String> {
		self.with_node(element, |n| n.tag.clone())
	}

	pub fn namespace(&self, element: FakeElement) -> Option<Namespace> {
		self.with_node(element, |n| n.namespace)
	}

	pub fn parent(&self, element: FakeElement) -> Option<FakeElement> {
		self.with_node(element, |n| n.parent).flatten().map(FakeElement)
	}

	pub fn children(&self, element: FakeElement) -> Vec<FakeElement> {
		self.with_node(element, |n| n.children.iter().copied().map(FakeElement).collect())
			.unwrap_or_default()
	}

	pub fn next_sibling(&self, element: FakeElement) -> Option<FakeElement> {
		let parent = self.parent(element)?;
		let siblings = self.children(parent);
		let pos = siblings.iter().position(|s| *s == element)?;
		siblings.get(pos + 1).copied()
	}

	pub fn style(&self, element: FakeElement, property: &str) -> Option<String> {
		self.with_node(element, |n| n.style.get(property).cloned()).flatten()
	}

	pub fn attribute(&self, element: FakeElement, name: &str) -> Option<String> {
		self.with_node(element, |n| n.attributes.get(name).cloned()).flatten()
	}

	pub fn text(&self, element: FakeElement) -> Option<String> {
		self.with_node(element, |n| n.text.clone()).flatten()
	}

	/// The document body.
	pub fn body(&self) -> FakeElement {
		FakeElement(BODY)
	}

	/// Creates a `div` with `id` and attaches it to the body.
	pub fn create_container(&self, id: &str) -> FakeElement {
		let element = self.insert("div", Namespace::Html);
		if let Ok(()) = self.with_node_mut(element, |n| {
			n.attributes.insert("id".to_string(), id.to_string());
		}) {
			let _ = self.append_child(&FakeElement(BODY), &element);
		}
		element
	}

	/// Current page address, including in-place replacements.
	pub fn current_page_url(&self) -> Url {
		self.page_url.borrow().clone()
	}

	/// Number of in-place page address replacements.
	pub fn history_replacements(&self) -> usize {
		self.history_replacements.get()
	}

	/// Top-level navigations requested through [`Host::assign_location`].
	pub fn assigned_locations(&self) -> Vec<String> {
		self.assigned.borrow().clone()
	}

	pub fn posted_messages(&self) -> Vec<PostedMessage> {
		self.posted.borrow().clone()
	}

	pub fn take_posted(&self) -> Vec<PostedMessage> {
		std::mem::take(&mut *self.posted.borrow_mut())
	}

	pub fn listener_count(&self) -> usize {
		self.listeners.borrow().len()
	}

	pub fn pending_timers(&self) -> usize {
		self.timers.borrow().len()
	}

	/// Elapsed time on the manual clock.
	pub fn now(&self) -> Duration {
		self.now.get()
	}

	/// Completes the pending load of `iframe`. Returns `false` if nothing was pending.
	pub fn fire_load(&self, iframe: FakeElement) -> bool {
		let callback = self.load_callbacks.borrow_mut().remove(&iframe.0);
		let fired = match callback {
			Some(callback) => {
				callback();
				true
			}
			None => false,
		};
		self.run_until_stalled();
		fired
	}

	/// Delivers a window `message` event with `data` to every listener.
	pub fn dispatch_message(&self, data: Value) {
		let listeners: Vec<MessageCallback> = self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
		for listener in listeners {
			listener(data.clone());
		}
		self.run_until_stalled();
	}

	/// Moves the clock forward, firing due timers in order.
	pub fn advance(&self, delta: Duration) {
		let target = self.now.get() + delta;
		loop {
			let next = {
				let mut timers = self.timers.borrow_mut();
				let due = timers
					.iter()
					.enumerate()
					.filter(|(_, t)| t.due <= target)
					.min_by_key(|(_, t)| (t.due, t.id.0))
					.map(|(idx, _)| idx);
				due.map(|idx| timers.remove(idx))
			};
			let Some(timer) = next else {
				break;
			};
			self.now.set(timer.due);
			(timer.callback)();
			self.run_until_stalled();
		}
		self.now.set(target);
		self.run_until_stalled();
	}

	/// Polls spawned tasks until none can make progress.
	pub fn run_until_stalled(&self) {
		self.pool.borrow_mut().run_until_stalled();
	}
}

impl Default for FakeHost {
	fn default() -> Self {
		Self::new()
	}
}

impl Host for FakeHost {
	type Element = FakeElement;

	fn page_url(&self) -> Result<Url> {
		Ok(self.page_url.borrow().clone())
	}

	fn replace_page_url(&self, url: &Url) -> Result<()> {
		*self.page_url.borrow_mut() = url.clone();
		self.history_replacements.set(self.history_replacements.get() + 1);
		Ok(())
	}

	fn assign_location(&self, url: &str) -> Result<()> {
		self.assigned.borrow_mut().push(url.to_string());
		Ok(())
	}

	fn head(&self) -> Result<FakeElement> {
		Ok(FakeElement(HEAD))
	}

	fn element_by_id(&self, id: &str) -> Option<FakeElement> {
		let order = self.connected_in_order();
		let nodes = self.nodes.borrow();
		order
			.into_iter()
			.find(|node| nodes[*node].attributes.get("id").is_some_and(|v| v == id))
			.map(FakeElement)
	}

	fn create_element(&self, tag: &str) -> Result<FakeElement> {
		Ok(self.insert(tag, Namespace::Html))
	}

	fn create_svg_element(&self, tag: &str) -> Result<FakeElement> {
		Ok(self.insert(tag, Namespace::Svg))
	}

	fn set_style(&self, element: &FakeElement, property: &str, value: &str) -> Result<()> {
		self.with_node_mut(*element, |n| {
			n.style.insert(property.to_string(), value.to_string());
		})
	}

	fn set_attribute(&self, element: &FakeElement, name: &str, value: &str) -> Result<()> {
		self.with_node_mut(*element, |n| {
			n.attributes.insert(name.to_string(), value.to_string());
		})
	}

	fn set_text(&self, element: &FakeElement, text: &str) {
		let _ = self.with_node_mut(*element, |n| n.text = Some(text.to_string()));
	}

	fn append_child(&self, parent: &FakeElement, child: &FakeElement) -> Result<()> {
		if self.is_ancestor(child.0, parent.0) {
			return Err(Error::Host("HierarchyRequestError: cannot append an ancestor".into()));
		}
		self.remove(child);
		let mut nodes = self.nodes.borrow_mut();
		if parent.0 >= nodes.len() || child.0 >= nodes.len() {
			return Err(Error::Host("unknown element".into()));
		}
		nodes[parent.0].children.push(child.0);
		nodes[child.0].parent = Some(parent.0);
		Ok(())
	}

	fn remove(&self, element: &FakeElement) {
		let parent = {
			let mut nodes = self.nodes.borrow_mut();
			let Some(parent) = nodes.get_mut(element.0).and_then(|n| n.parent.take()) else {
				return;
			};
			nodes[parent].children.retain(|c| *c != element.0);
			parent
		};

		// A removed frame never finishes loading.
		if self.is_ancestor(ROOT, parent) {
			let dropped: Vec<Box<dyn FnOnce()>> = {
				let mut callbacks = self.load_callbacks.borrow_mut();
				self.subtree(*element).iter().filter_map(|id| callbacks.remove(id)).collect()
			};
			drop(dropped);
		}
	}

	fn load_frame(&self, iframe: &FakeElement, src: &str, on_load: Box<dyn FnOnce()>) -> Result<()> {
		self.with_node_mut(*iframe, |n| {
			n.attributes.insert("src".to_string(), src.to_string());
		})?;
		let previous = self.load_callbacks.borrow_mut().insert(iframe.0, on_load);
		drop(previous);
		Ok(())
	}

	fn post_message(&self, iframe: &FakeElement, message: &Value, target_origin: &str) -> Result<()> {
		// Detached frames have no content window.
		let is_frame = self.tag(*iframe).is_some_and(|t| t == "iframe");
		if !is_frame || !self.is_connected(*iframe) {
			return Ok(());
		}
		self.posted.borrow_mut().push(PostedMessage {
			frame: *iframe,
			message: message.clone(),
			target_origin: target_origin.to_string(),
		});
		Ok(())
	}

	fn add_message_listener(&self, listener: MessageCallback) -> Result<ListenerId> {
		let id = ListenerId(self.next_id());
		self.listeners.borrow_mut().push((id, listener));
		Ok(id)
	}

	fn remove_message_listener(&self, id: ListenerId) {
		let removed: Vec<(ListenerId, MessageCallback)> = {
			let mut listeners = self.listeners.borrow_mut();
			let (removed, kept): (Vec<_>, Vec<_>) =
				std::mem::take(&mut *listeners).into_iter().partition(|(l, _)| *l == id);
			*listeners = kept;
			removed
		};
		drop(removed);
	}

	fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Result<TimerId> {
		let id = TimerId(self.next_id());
		self.timers.borrow_mut().push(Timer {
			id,
			due: self.now.get() + delay,
			callback,
		});
		Ok(id)
	}

	fn clear_timeout(&self, id: TimerId) {
		let removed = {
			let mut timers = self.timers.borrow_mut();
			timers.iter().position(|t| t.id == id).map(|idx| timers.remove(idx))
		};
		drop(removed);
	}

	fn spawn_local(&self, task: LocalTask) {
		if let Err(err) = self.spawner.spawn_local(task) {
			tracing::warn!(target: crate::logger::LOG_TARGET, "failed to spawn local task: {err}");
		}
	}
}
