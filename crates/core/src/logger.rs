//! On/off diagnostic logger shared by the session and its view.
//!
//! Output goes through `tracing` under the `cohort_embed` target. Disabling the
//! logger changes nothing but observability.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

/// Tracing target used for all SDK diagnostics.
pub const LOG_TARGET: &str = "cohort_embed";

const PREFIX: &str = "[SDK] - ";

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Publishes the process-wide verbose flag. Set by session construction and
/// read by [`Logger::global`].
pub fn set_verbose(enabled: bool) {
	VERBOSE.store(enabled, Ordering::Relaxed);
}

/// Returns the process-wide verbose flag.
pub fn verbose() -> bool {
	VERBOSE.load(Ordering::Relaxed)
}

/// Structured logger gated by a verbose flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Logger {
	enabled: bool,
}

impl Logger {
	pub fn new(enabled: bool) -> Self {
		Self { enabled }
	}

	/// Logger for code running outside a session, such as host bindings.
	/// Follows the most recently published verbose flag.
	pub fn global() -> Self {
		Self::new(verbose())
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Prefixes a message the way every SDK diagnostic is rendered.
	pub fn format_message(message: &str) -> String {
		format!("{PREFIX}{message}")
	}

	pub fn log(&self, message: &str) {
		self.log_with(message, Value::Object(Default::default()));
	}

	pub fn log_with(&self, message: &str, metadata: Value) {
		if !self.enabled {
			return;
		}
		tracing::info!(target: LOG_TARGET, %metadata, "{}", Self::format_message(message));
	}

	pub fn warn(&self, message: &str) {
		if !self.enabled {
			return;
		}
		tracing::warn!(target: LOG_TARGET, "{}", Self::format_message(message));
	}

	pub fn error(&self, message: &str) {
		self.error_with(message, Value::Object(Default::default()));
	}

	pub fn error_with(&self, message: &str, metadata: Value) {
		if !self.enabled {
			return;
		}
		tracing::error!(target: LOG_TARGET, %metadata, "{}", Self::format_message(message));
	}
}
