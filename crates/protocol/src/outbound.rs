//! Outbound messages: posted by the host page into the embedded experience.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of `login.authToken`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAuthToken {
	pub auth_token: String,
}

/// Payload of `location.update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationUpdate {
	pub pathname: String,
}

/// A message the host posts to the iframe's content window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum OutboundMessage {
	/// Delivers a host-issued auth token to the embedded experience.
	#[serde(rename = "login.authToken")]
	LoginAuthToken(LoginAuthToken),
	/// Asks the embedded experience to navigate internally.
	#[serde(rename = "location.update")]
	LocationUpdate(LocationUpdate),
}

impl OutboundMessage {
	pub fn login(auth_token: impl Into<String>) -> Self {
		OutboundMessage::LoginAuthToken(LoginAuthToken {
			auth_token: auth_token.into(),
		})
	}

	pub fn navigate(pathname: impl Into<String>) -> Self {
		OutboundMessage::LocationUpdate(LocationUpdate {
			pathname: pathname.into(),
		})
	}

	/// Wire name carried in the `event` field.
	pub fn event(&self) -> &'static str {
		match self {
			OutboundMessage::LoginAuthToken(_) => "login.authToken",
			OutboundMessage::LocationUpdate(_) => "location.update",
		}
	}

	/// JSON form ready for `postMessage`.
	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).unwrap_or(Value::Null)
	}
}
