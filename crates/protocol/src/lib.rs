//! Wire types for the Cohort embed message protocol.
//!
//! This crate contains the serde-serializable types exchanged between the host
//! page and the embedded experience over the cross-document `postMessage`
//! channel. Every message has the shape `{ "event": <kind>, "payload": {..} }`.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization and structural validation
//! * Closed: The inbound vocabulary is fixed; anything else is rejected
//! * Stable: Changes only when the embedded experience's protocol changes
//!
//! The session controller that consumes these types lives in `cohort-embed`.

pub mod inbound;
pub mod kind;
pub mod outbound;

pub use inbound::*;
pub use kind::*;
pub use outbound::*;
