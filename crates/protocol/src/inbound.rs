//! Inbound messages: sent by the embedded experience, received by the host page.
//!
//! Validation is purely structural. A message is accepted only when it is an
//! object with an `event` string from the closed vocabulary and a `payload`
//! object whose required fields are present with the right primitive types.
//! Anything else yields `None`; validation never fails loudly because the host
//! window is shared with unrelated `postMessage` traffic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kind::MessageKind;

/// Payload of `order.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
	pub order_id: String,
}

/// Payload of `order.error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderError {
	pub error: String,
}

/// Payload of `payment.failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailed {
	pub payment_session_id: String,
}

/// Payload of `location.updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationUpdated {
	pub location: String,
}

/// Payload of `auth.updated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUpdated {
	pub is_logged_in: bool,
}

/// Payload of `auth.redirect`: the URL the host page should navigate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRedirect {
	pub url: String,
}

/// Payload of `app.loaded`. Always the empty object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppLoaded {}

/// A validated message from the embedded experience.
///
/// Serializes back to the wire shape:
/// ```json
/// { "event": "auth.updated", "payload": { "isLoggedIn": false } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum InboundMessage {
	#[serde(rename = "order.created")]
	OrderCreated(OrderCreated),
	#[serde(rename = "order.error")]
	OrderError(OrderError),
	#[serde(rename = "payment.failed")]
	PaymentFailed(PaymentFailed),
	#[serde(rename = "location.updated")]
	LocationUpdated(LocationUpdated),
	#[serde(rename = "auth.updated")]
	AuthUpdated(AuthUpdated),
	#[serde(rename = "auth.redirect")]
	AuthRedirect(AuthRedirect),
	#[serde(rename = "app.loaded")]
	AppLoaded(AppLoaded),
}

impl InboundMessage {
	/// Kind of this message.
	pub fn kind(&self) -> MessageKind {
		match self {
			InboundMessage::OrderCreated(_) => MessageKind::OrderCreated,
			InboundMessage::OrderError(_) => MessageKind::OrderError,
			InboundMessage::PaymentFailed(_) => MessageKind::PaymentFailed,
			InboundMessage::LocationUpdated(_) => MessageKind::LocationUpdated,
			InboundMessage::AuthUpdated(_) => MessageKind::AuthUpdated,
			InboundMessage::AuthRedirect(_) => MessageKind::AuthRedirect,
			InboundMessage::AppLoaded(_) => MessageKind::AppLoaded,
		}
	}

	/// Payload as a JSON value, in wire field names.
	pub fn payload(&self) -> Value {
		let payload = match self {
			InboundMessage::OrderCreated(p) => serde_json::to_value(p),
			InboundMessage::OrderError(p) => serde_json::to_value(p),
			InboundMessage::PaymentFailed(p) => serde_json::to_value(p),
			InboundMessage::LocationUpdated(p) => serde_json::to_value(p),
			InboundMessage::AuthUpdated(p) => serde_json::to_value(p),
			InboundMessage::AuthRedirect(p) => serde_json::to_value(p),
			InboundMessage::AppLoaded(p) => serde_json::to_value(p),
		};
		payload.unwrap_or(Value::Null)
	}

	fn from_payload(kind: MessageKind, payload: &Value) -> Option<Self> {
		fn decode<T: serde::de::DeserializeOwned>(payload: &Value) -> Option<T> {
			serde_json::from_value(payload.clone()).ok()
		}

		match kind {
			MessageKind::OrderCreated => decode(payload).map(InboundMessage::OrderCreated),
			MessageKind::OrderError => decode(payload).map(InboundMessage::OrderError),
			MessageKind::PaymentFailed => decode(payload).map(InboundMessage::PaymentFailed),
			MessageKind::LocationUpdated => decode(payload).map(InboundMessage::LocationUpdated),
			MessageKind::AuthUpdated => decode(payload).map(InboundMessage::AuthUpdated),
			MessageKind::AuthRedirect => decode(payload).map(InboundMessage::AuthRedirect),
			MessageKind::AppLoaded => payload
				.as_object()
				.filter(|fields| fields.is_empty())
				.map(|_| InboundMessage::AppLoaded(AppLoaded {})),
		}
	}
}

/// Validates a raw message and returns its typed form.
///
/// Returns `None` for non-objects, missing `event`/`payload` keys, a
/// non-string `event`, a non-object `payload`, an `event` outside the
/// vocabulary, or a payload with missing or mistyped required fields.
pub fn validate_message(message: &Value) -> Option<InboundMessage> {
	let object = message.as_object()?;
	let event = object.get("event")?.as_str()?;
	let payload = object.get("payload").filter(|p| p.is_object())?;
	let kind = MessageKind::from_wire(event)?;
	InboundMessage::from_payload(kind, payload)
}

/// Type-guard form of [`validate_message`].
pub fn is_valid_message(message: &Value) -> bool {
	validate_message(message).is_some()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn accepts_every_kind_with_a_well_formed_payload() {
		let cases = [
			json!({"event": "order.created", "payload": {"orderId": "ord_1"}}),
			json!({"event": "order.error", "payload": {"error": "declined"}}),
			json!({"event": "payment.failed", "payload": {"paymentSessionId": "ps_1"}}),
			json!({"event": "location.updated", "payload": {"location": "/space/home"}}),
			json!({"event": "auth.updated", "payload": {"isLoggedIn": true}}),
			json!({"event": "auth.redirect", "payload": {"url": "https://merchant.test/login"}}),
			json!({"event": "app.loaded", "payload": {}}),
		];

		for (case, kind) in cases.iter().zip(MessageKind::ALL) {
			let message = validate_message(case).unwrap_or_else(|| panic!("rejected {case}"));
			assert_eq!(message.kind(), kind);
		}
	}

	#[test]
	fn typed_payload_carries_wire_fields() {
		let message = validate_message(&json!({
			"event": "order.created",
			"payload": {"orderId": "ord_42", "extra": 1}
		}));
		assert_eq!(
			message,
			Some(InboundMessage::OrderCreated(OrderCreated {
				order_id: "ord_42".to_string()
			}))
		);
	}

	#[test]
	fn rejects_structurally_invalid_messages() {
		let invalid = [
			json!("auth.updated"),
			json!(null),
			json!([1, 2]),
			json!({"payload": {"isLoggedIn": true}}),
			json!({"event": "auth.updated"}),
			json!({"event": 7, "payload": {}}),
			json!({"event": "auth.updated", "payload": null}),
			json!({"event": "auth.updated", "payload": "yes"}),
			json!({"event": "not.supported", "payload": {}}),
			json!({"event": "login.authToken", "payload": {"authToken": "tok"}}),
		];

		for case in invalid {
			assert!(!is_valid_message(&case), "accepted {case}");
		}
	}

	#[test]
	fn rejects_missing_or_mistyped_payload_fields() {
		let invalid = [
			json!({"event": "order.created", "payload": {}}),
			json!({"event": "order.created", "payload": {"orderId": 12}}),
			json!({"event": "order.error", "payload": {"error": null}}),
			json!({"event": "payment.failed", "payload": {"paymentSessionID": "ps"}}),
			json!({"event": "location.updated", "payload": {"location": ["/a"]}}),
			json!({"event": "auth.updated", "payload": {"isLoggedIn": "true"}}),
			json!({"event": "auth.redirect", "payload": {"href": "https://x.test"}}),
			json!({"event": "app.loaded", "payload": {"ready": true}}),
		];

		for case in invalid {
			assert!(validate_message(&case).is_none(), "accepted {case}");
		}
	}

	#[test]
	fn serializes_back_to_wire_shape() {
		let message = InboundMessage::AuthUpdated(AuthUpdated { is_logged_in: false });
		assert_eq!(
			serde_json::to_value(&message).unwrap(),
			json!({"event": "auth.updated", "payload": {"isLoggedIn": false}})
		);
		assert_eq!(message.payload(), json!({"isLoggedIn": false}));
		assert_eq!(InboundMessage::AppLoaded(AppLoaded {}).payload(), json!({}));
	}
}
