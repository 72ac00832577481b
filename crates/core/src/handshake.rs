//! Login handshake between the host identity and the experience.
//!
//! Each render starts a fresh [`Handshake`] tagged with the generation of the
//! view it belongs to. The session drives it from inbound messages; this
//! module owns the state, the listeners and the timer it has armed, so that
//! abandoning it releases everything in one call.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::time::Duration;

use crate::config::{AuthConfig, CustomAuth, TokenProvider, is_email};
use crate::embed_url::IdentityParams;
use crate::error::{Error, Result};
use crate::events::Subscription;
use crate::host::{Host, TimerId};

/// How long a logged-out experience may take to accept a delivered token.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Validated identity mode of one render.
#[derive(Clone)]
pub enum AuthPlan {
	/// The experience runs its own login flow.
	Native,
	/// Host-managed identity with no signed-in user: the experience may ask
	/// the host page to open the custom login URL.
	AnonymousCustom {
		custom_login_url: String,
		redirect_parameter_name: Option<String>,
	},
	/// Host-managed identity for a signed-in user.
	HostIdentity {
		user_email: String,
		get_auth_token: TokenProvider,
		custom_login_url: String,
		redirect_parameter_name: Option<String>,
	},
}

impl AuthPlan {
	/// Checks an [`AuthConfig`] and resolves the handshake it calls for.
	///
	/// Fails with the first violated requirement: email shape, then token
	/// provider, then custom login URL.
	pub fn from_config(auth: &AuthConfig) -> Result<Self> {
		let custom = match auth {
			AuthConfig::Cohort => return Ok(Self::Native),
			AuthConfig::Custom(custom) => custom,
		};
		let CustomAuth {
			user_email,
			get_auth_token,
			custom_login_url,
			custom_login_redirect_parameter_name,
		} = custom;

		if user_email.as_deref().is_some_and(|email| !is_email(email)) {
			return Err(Error::InvalidEmail);
		}
		let get_auth_token = get_auth_token.clone().ok_or(Error::MissingAuthTokenProvider)?;
		let custom_login_url = custom_login_url
			.clone()
			.filter(|url| !url.is_empty())
			.ok_or(Error::MissingCustomLoginUrl)?;
		let redirect_parameter_name = custom_login_redirect_parameter_name.clone();

		Ok(match user_email {
			Some(email) => Self::HostIdentity {
				user_email: email.clone(),
				get_auth_token,
				custom_login_url,
				redirect_parameter_name,
			},
			None => Self::AnonymousCustom {
				custom_login_url,
				redirect_parameter_name,
			},
		})
	}

	/// Identity query parameters for the embed URL; `None` in native mode.
	pub fn identity_params(&self) -> Option<IdentityParams<'_>> {
		match self {
			Self::Native => None,
			Self::AnonymousCustom {
				custom_login_url,
				redirect_parameter_name,
			} => Some(IdentityParams {
				user_email: None,
				custom_login_url,
				redirect_parameter_name: redirect_parameter_name.as_deref(),
			}),
			Self::HostIdentity {
				user_email,
				custom_login_url,
				redirect_parameter_name,
				..
			} => Some(IdentityParams {
				user_email: Some(user_email),
				custom_login_url,
				redirect_parameter_name: redirect_parameter_name.as_deref(),
			}),
		}
	}

	pub fn user_email(&self) -> Option<&str> {
		match self {
			Self::HostIdentity { user_email, .. } => Some(user_email),
			_ => None,
		}
	}
}

impl fmt::Debug for AuthPlan {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Native => f.write_str("Native"),
			Self::AnonymousCustom { custom_login_url, .. } => f
				.debug_struct("AnonymousCustom")
				.field("custom_login_url", custom_login_url)
				.finish_non_exhaustive(),
			Self::HostIdentity { user_email, .. } => f
				.debug_struct("HostIdentity")
				.field("user_email", user_email)
				.finish_non_exhaustive(),
		}
	}
}

/// Terminal result of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// Identity is not host-managed; the experience reported `app.loaded`.
	AppLoaded,
	/// The experience confirmed the host user is logged in.
	LoggedIn,
	/// No confirmation arrived in time. The session stays usable.
	TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
	/// No view has been rendered.
	Idle,
	/// The iframe has not finished loading.
	AwaitingLoad,
	/// Waiting for the one-shot `app.loaded` signal.
	AwaitingAppLoaded,
	/// Listening to `auth.updated`; `token_requested` guards the provider
	/// against being called twice.
	AwaitingAuth { token_requested: bool },
	Settled(Outcome),
}

impl HandshakeState {
	pub fn is_settled(self) -> bool {
		matches!(self, Self::Settled(_))
	}
}

/// Live state of the handshake for one view.
pub struct Handshake {
	generation: u64,
	plan: AuthPlan,
	state: Cell<HandshakeState>,
	subscriptions: RefCell<Vec<Subscription>>,
	timer: Cell<Option<TimerId>>,
}

impl Handshake {
	pub fn new(generation: u64, plan: AuthPlan) -> Self {
		Self {
			generation,
			plan,
			state: Cell::new(HandshakeState::AwaitingLoad),
			subscriptions: RefCell::new(Vec::new()),
			timer: Cell::new(None),
		}
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn plan(&self) -> &AuthPlan {
		&self.plan
	}

	pub fn state(&self) -> HandshakeState {
		self.state.get()
	}

	pub fn set_state(&self, state: HandshakeState) {
		self.state.set(state);
	}

	/// Claims the single token request of this handshake.
	///
	/// Returns `true` only for the first call while awaiting auth.
	pub fn request_token(&self) -> bool {
		match self.state.get() {
			HandshakeState::AwaitingAuth { token_requested: false } => {
				self.state.set(HandshakeState::AwaitingAuth { token_requested: true });
				true
			}
			_ => false,
		}
	}

	/// Keeps `subscription` alive until it is released by the handshake.
	pub fn hold(&self, subscription: Subscription) {
		self.subscriptions.borrow_mut().push(subscription);
	}

	/// Unsubscribes every held listener of `kind`.
	pub fn release(&self, kind: cohort_embed_protocol::MessageKind) {
		self.subscriptions.borrow_mut().retain(|subscription| {
			if subscription.kind() == kind {
				subscription.unsubscribe();
				false
			} else {
				true
			}
		});
	}

	pub fn set_timer(&self, timer: TimerId) {
		self.timer.set(Some(timer));
	}

	pub fn has_timer(&self) -> bool {
		self.timer.get().is_some()
	}

	/// Clears the pending timeout, if any.
	pub fn disarm<H: Host + ?Sized>(&self, host: &H) {
		if let Some(timer) = self.timer.take() {
			host.clear_timeout(timer);
		}
	}

	/// Forgets the timer after it fired.
	pub fn timer_fired(&self) {
		self.timer.set(None);
	}

	/// Releases every listener and the timer. The handshake is inert afterwards.
	pub fn abandon<H: Host + ?Sized>(&self, host: &H) {
		self.disarm(host);
		let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
		for subscription in subscriptions {
			subscription.unsubscribe();
		}
	}
}

impl fmt::Debug for Handshake {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Handshake")
			.field("generation", &self.generation)
			.field("plan", &self.plan)
			.field("state", &self.state.get())
			.field("listeners", &self.subscriptions.borrow().len())
			.field("timer", &self.timer.get())
			.finish()
	}
}
