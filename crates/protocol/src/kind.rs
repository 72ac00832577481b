//! Closed vocabulary of inbound event kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Event kinds the embedded experience may send to the host page.
///
/// Host code subscribes to these through the session's `on` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageKind {
	#[serde(rename = "order.created")]
	OrderCreated,
	#[serde(rename = "order.error")]
	OrderError,
	#[serde(rename = "payment.failed")]
	PaymentFailed,
	#[serde(rename = "location.updated")]
	LocationUpdated,
	#[serde(rename = "auth.updated")]
	AuthUpdated,
	#[serde(rename = "auth.redirect")]
	AuthRedirect,
	#[serde(rename = "app.loaded")]
	AppLoaded,
}

impl MessageKind {
	/// Every recognized kind, in protocol declaration order.
	pub const ALL: [MessageKind; 7] = [
		MessageKind::OrderCreated,
		MessageKind::OrderError,
		MessageKind::PaymentFailed,
		MessageKind::LocationUpdated,
		MessageKind::AuthUpdated,
		MessageKind::AuthRedirect,
		MessageKind::AppLoaded,
	];

	/// Wire name of the kind, as carried in the `event` field.
	pub fn as_str(self) -> &'static str {
		match self {
			MessageKind::OrderCreated => "order.created",
			MessageKind::OrderError => "order.error",
			MessageKind::PaymentFailed => "payment.failed",
			MessageKind::LocationUpdated => "location.updated",
			MessageKind::AuthUpdated => "auth.updated",
			MessageKind::AuthRedirect => "auth.redirect",
			MessageKind::AppLoaded => "app.loaded",
		}
	}

	/// Looks up a kind by wire name. Returns `None` outside the vocabulary.
	pub fn from_wire(event: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|kind| kind.as_str() == event)
	}
}

impl fmt::Display for MessageKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when parsing a kind outside the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message kind: {0}")]
pub struct UnknownMessageKind(pub String);

impl FromStr for MessageKind {
	type Err = UnknownMessageKind;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_wire(s).ok_or_else(|| UnknownMessageKind(s.to_string()))
	}
}
