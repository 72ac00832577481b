//! Embed session controller for Cohort experience spaces.
//!
//! A [`Session`] renders the experience inside one iframe on the host page,
//! builds its address from the configuration and the page's own deep-link
//! state, drives the login handshake over `postMessage`, and dispatches
//! validated inbound events to subscribers.
//!
//! The page itself is reached through the [`Host`] trait. `cohort-embed-web`
//! implements it over the browser DOM; [`host::fake::FakeHost`] implements it
//! in memory for tests.

pub mod config;
pub mod embed_url;
pub mod error;
pub mod events;
pub mod handshake;
pub mod host;
pub mod iframe;
pub mod logger;
pub mod sdk;

pub use cohort_embed_protocol as protocol;
pub use cohort_embed_protocol::{InboundMessage, MessageKind, OutboundMessage};
pub use config::{
	AuthConfig, CustomAuth, EmbedConfig, EmbedOptions, IframeOptions, IframeStyle, NavigationType, SpinnerStyle,
	TokenProvider, token_provider,
};
pub use embed_url::{EmbedUrl, EmbedUrlRequest, build_embed_url};
pub use error::{AuthTokenError, Error, Result};
pub use events::Subscription;
pub use handshake::{HANDSHAKE_TIMEOUT, HandshakeState, Outcome};
pub use host::Host;
pub use iframe::{EmbeddedView, ViewState};
pub use logger::Logger;
pub use sdk::Session;
