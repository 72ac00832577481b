//! Per-kind subscriber registry for inbound experience events.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use cohort_embed_protocol::{InboundMessage, MessageKind};

/// Callback invoked with every accepted inbound message of its kind.
pub type Handler = Rc<dyn Fn(&InboundMessage)>;

/// Ordered handler lists keyed by message kind.
///
/// Kinds without handlers have no entry. Dispatch iterates a snapshot, so a
/// handler may subscribe or unsubscribe without disturbing the running
/// delivery.
#[derive(Default)]
pub struct HandlerRegistry {
	handlers: RefCell<BTreeMap<MessageKind, Vec<Handler>>>,
}

impl HandlerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `handler` to the list for `kind`.
	pub fn add(&self, kind: MessageKind, handler: Handler) {
		self.handlers.borrow_mut().entry(kind).or_default().push(handler);
	}

	/// Removes the first registration of `handler` for `kind`.
	///
	/// Returns `false` if it was not registered.
	pub fn remove(&self, kind: MessageKind, handler: &Handler) -> bool {
		let mut handlers = self.handlers.borrow_mut();
		let Some(list) = handlers.get_mut(&kind) else {
			return false;
		};
		let Some(pos) = list.iter().position(|h| Rc::ptr_eq(h, handler)) else {
			return false;
		};
		list.remove(pos);
		if list.is_empty() {
			handlers.remove(&kind);
		}
		true
	}

	pub fn has_handlers(&self, kind: MessageKind) -> bool {
		self.handlers.borrow().contains_key(&kind)
	}

	pub fn handler_count(&self, kind: MessageKind) -> usize {
		self.handlers.borrow().get(&kind).map_or(0, Vec::len)
	}

	/// Invokes every handler registered for the message's kind, in
	/// registration order. Returns the number of handlers called.
	pub fn emit(&self, message: &InboundMessage) -> usize {
		let snapshot: Vec<Handler> = match self.handlers.borrow().get(&message.kind()) {
			Some(list) => list.clone(),
			None => return 0,
		};
		for handler in &snapshot {
			handler(message);
		}
		snapshot.len()
	}
}

/// Handle returned by [`Session::on`](crate::Session::on).
///
/// Dropping it keeps the handler registered; call [`unsubscribe`](Self::unsubscribe)
/// to remove it.
#[must_use = "dropping a Subscription keeps the handler registered; keep it to unsubscribe"]
pub struct Subscription {
	registry: Weak<HandlerRegistry>,
	kind: MessageKind,
	handler: Handler,
}

impl Subscription {
	pub(crate) fn new(registry: &Rc<HandlerRegistry>, kind: MessageKind, handler: Handler) -> Self {
		registry.add(kind, Rc::clone(&handler));
		Self {
			registry: Rc::downgrade(registry),
			kind,
			handler,
		}
	}

	pub fn kind(&self) -> MessageKind {
		self.kind
	}

	/// Removes the handler. Safe to call more than once, and after the
	/// session is gone.
	pub fn unsubscribe(&self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.remove(self.kind, &self.handler);
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription").field("kind", &self.kind).finish_non_exhaustive()
	}
}
