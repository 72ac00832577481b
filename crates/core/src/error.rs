//! Error types for the embed session controller.
//!
//! Every variant is a fatal, synchronous failure raised before the session
//! mutates the host document. Soft failures (handshake timeout, rejected
//! inbound messages) never surface here.

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by [`Session`](crate::Session) operations.
#[derive(Debug, Error)]
pub enum Error {
	/// The configured experience origin is not an absolute URL with a tuple origin.
	#[error("Invalid XPS origin URL")]
	InvalidOrigin,

	/// Custom auth mode was given a user email that is not email-shaped.
	#[error("Invalid email")]
	InvalidEmail,

	/// Custom auth mode without a token provider.
	#[error("Missing auth.getAuthToken function parameter")]
	MissingAuthTokenProvider,

	/// Custom auth mode without a custom login URL.
	#[error("Missing auth.customLoginUrl parameter")]
	MissingCustomLoginUrl,

	/// Both `container` and `container_id` were supplied.
	#[error("Cannot specify both container and containerId")]
	ConflictingContainer,

	/// Neither `container` nor `container_id` was supplied.
	#[error("Missing container or containerId parameter")]
	NoContainer,

	/// `container_id` does not resolve to an element in the document.
	#[error("Container with id {0} not found")]
	ContainerNotFound(String),

	/// `navigate_to` was called while no view is live.
	#[error("Cannot navigate without an iframe")]
	NoView,

	/// The session was already destroyed.
	#[error("SDK instance has been destroyed")]
	Destroyed,

	/// URL parsing failed while building the embed address.
	#[error("Invalid URL: {0}")]
	Url(#[from] url::ParseError),

	/// The host environment rejected a DOM or window operation.
	#[error("Host error: {0}")]
	Host(String),
}

/// Failure reported by a host-supplied auth token provider.
///
/// The handshake does not recover from it; the timeout remains the only bound.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("auth token provider failed: {0}")]
pub struct AuthTokenError(pub String);

impl AuthTokenError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_match_public_contract() {
		assert_eq!(Error::InvalidOrigin.to_string(), "Invalid XPS origin URL");
		assert_eq!(
			Error::ContainerNotFound("invalid-id".into()).to_string(),
			"Container with id invalid-id not found"
		);
		assert_eq!(Error::NoView.to_string(), "Cannot navigate without an iframe");
		assert_eq!(Error::NoContainer.to_string(), "Missing container or containerId parameter");
	}

	#[test]
	fn url_errors_convert() {
		let err: Error = url::Url::parse("not a url").unwrap_err().into();
		assert!(matches!(err, Error::Url(_)));
	}
}
