//! Render-time configuration for an embedded experience view.
//!
//! [`EmbedConfig`] is the typed form consumed by
//! [`Session::render_experience_space`](crate::Session::render_experience_space).
//! [`EmbedOptions`] is its serde-deserializable declarative subset, used when
//! configuration arrives as a plain JSON/JS object and callbacks or element
//! references are attached separately.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::LazyLock;

use futures::future::LocalBoxFuture;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthTokenError;

/// Host-supplied function that exchanges the user email for an auth token.
pub type TokenProvider = Rc<dyn Fn(String) -> LocalBoxFuture<'static, Result<String, AuthTokenError>>>;

/// Wraps an async closure as a [`TokenProvider`].
pub fn token_provider<F, Fut>(f: F) -> TokenProvider
where
	F: Fn(String) -> Fut + 'static,
	Fut: Future<Output = Result<String, AuthTokenError>> + 'static,
{
	Rc::new(move |email: String| -> LocalBoxFuture<'static, Result<String, AuthTokenError>> { Box::pin(f(email)) })
}

static EMAIL_PATTERN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Basic email shape check: `local@domain.tld`, no whitespace.
pub fn is_email(value: &str) -> bool {
	EMAIL_PATTERN.is_match(value)
}

/// Navigation menu style inside the experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationType {
	Burger,
	Tabbar,
}

impl NavigationType {
	pub fn as_str(self) -> &'static str {
		match self {
			NavigationType::Burger => "burger",
			NavigationType::Tabbar => "tabbar",
		}
	}
}

/// Size and border overrides for the view wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IframeStyle {
	pub width: Option<String>,
	pub height: Option<String>,
	pub border: Option<String>,
}

/// Color overrides for the loading spinner overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpinnerStyle {
	pub background_color: Option<String>,
	pub color: Option<String>,
}

/// Where and how the view is attached.
///
/// `container` and `container_id` are mutually exclusive, and one of them is
/// required.
#[derive(Debug, Clone)]
pub struct IframeOptions<E> {
	pub container: Option<E>,
	pub container_id: Option<String>,
	pub iframe_style: IframeStyle,
	pub spinner_style: SpinnerStyle,
}

impl<E> Default for IframeOptions<E> {
	fn default() -> Self {
		Self {
			container: None,
			container_id: None,
			iframe_style: IframeStyle::default(),
			spinner_style: SpinnerStyle::default(),
		}
	}
}

/// Host-managed identity settings.
#[derive(Clone, Default)]
pub struct CustomAuth {
	/// Email of the signed-in host user; `None` while the host user is anonymous.
	pub user_email: Option<String>,
	pub get_auth_token: Option<TokenProvider>,
	/// Page the experience sends anonymous users to for signing in.
	pub custom_login_url: Option<String>,
	/// Query parameter carrying the post-login destination. Defaults to `destination`.
	pub custom_login_redirect_parameter_name: Option<String>,
}

impl CustomAuth {
	pub fn new(user_email: Option<String>, get_auth_token: TokenProvider, custom_login_url: impl Into<String>) -> Self {
		Self {
			user_email,
			get_auth_token: Some(get_auth_token),
			custom_login_url: Some(custom_login_url.into()),
			custom_login_redirect_parameter_name: None,
		}
	}

	pub fn with_redirect_parameter_name(mut self, name: impl Into<String>) -> Self {
		self.custom_login_redirect_parameter_name = Some(name.into());
		self
	}
}

impl fmt::Debug for CustomAuth {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CustomAuth")
			.field("user_email", &self.user_email)
			.field("get_auth_token", &self.get_auth_token.as_ref().map(|_| "<fn>"))
			.field("custom_login_url", &self.custom_login_url)
			.field(
				"custom_login_redirect_parameter_name",
				&self.custom_login_redirect_parameter_name,
			)
			.finish()
	}
}

/// Identity mode of a render.
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
	/// The experience runs its own login flow.
	#[default]
	Cohort,
	/// The host asserts the viewer's identity and supplies tokens on demand.
	Custom(CustomAuth),
}

/// Full configuration of one render.
#[derive(Debug, Clone)]
pub struct EmbedConfig<E> {
	pub auth: AuthConfig,
	pub iframe_options: IframeOptions<E>,
	/// Path inside the experience. Defaults to the experience's home route.
	pub pathname: Option<String>,
	pub show_navbar: Option<bool>,
	pub navigation_type: Option<NavigationType>,
	/// Locale forwarded as the `lng` parameter.
	pub locale: Option<String>,
	/// Additional query parameters; only allow-listed keys survive.
	pub url_params: BTreeMap<String, String>,
}

impl<E> Default for EmbedConfig<E> {
	fn default() -> Self {
		Self {
			auth: AuthConfig::default(),
			iframe_options: IframeOptions::default(),
			pathname: None,
			show_navbar: None,
			navigation_type: None,
			locale: None,
			url_params: BTreeMap::new(),
		}
	}
}

impl<E> EmbedConfig<E> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_auth(mut self, auth: AuthConfig) -> Self {
		self.auth = auth;
		self
	}

	pub fn with_custom_auth(self, auth: CustomAuth) -> Self {
		self.with_auth(AuthConfig::Custom(auth))
	}

	pub fn with_container(mut self, container: E) -> Self {
		self.iframe_options.container = Some(container);
		self
	}

	pub fn with_container_id(mut self, id: impl Into<String>) -> Self {
		self.iframe_options.container_id = Some(id.into());
		self
	}

	pub fn with_iframe_style(mut self, style: IframeStyle) -> Self {
		self.iframe_options.iframe_style = style;
		self
	}

	pub fn with_spinner_style(mut self, style: SpinnerStyle) -> Self {
		self.iframe_options.spinner_style = style;
		self
	}

	pub fn with_pathname(mut self, pathname: impl Into<String>) -> Self {
		self.pathname = Some(pathname.into());
		self
	}

	pub fn with_show_navbar(mut self, show: bool) -> Self {
		self.show_navbar = Some(show);
		self
	}

	pub fn with_navigation_type(mut self, navigation_type: NavigationType) -> Self {
		self.navigation_type = Some(navigation_type);
		self
	}

	pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
		self.locale = Some(locale.into());
		self
	}

	pub fn with_url_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.url_params.insert(key.into(), value.into());
		self
	}
}

/// Identity mode selector of a declarative config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
	#[default]
	Cohort,
	Custom,
}

/// Declarative auth settings as they appear in a JSON/JS config object.
///
/// Fields that are not plain data (the `getAuthToken` function) are skipped
/// without being inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthOptions {
	pub auth_mode: AuthMode,
	pub user_email: Option<String>,
	pub custom_login_url: Option<String>,
	pub custom_login_redirect_parameter_name: Option<String>,
}

/// Declarative iframe settings. A `container` element, if present, is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IframeOptionsSpec {
	pub container_id: Option<String>,
	pub iframe_style: IframeStyle,
	pub spinner_style: SpinnerStyle,
}

/// Serde-deserializable subset of [`EmbedConfig`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedOptions {
	pub auth: AuthOptions,
	pub iframe_options: IframeOptionsSpec,
	pub pathname: Option<String>,
	pub show_navbar: Option<bool>,
	pub navigation_type: Option<NavigationType>,
	#[serde(alias = "locale")]
	pub language: Option<String>,
	pub url_params: BTreeMap<String, Value>,
}

impl EmbedOptions {
	/// Attaches runtime-only pieces and produces a typed config.
	///
	/// `url_params` values are stringified; `null` entries are dropped.
	pub fn into_config<E>(self, container: Option<E>, get_auth_token: Option<TokenProvider>) -> EmbedConfig<E> {
		let auth = match self.auth.auth_mode {
			AuthMode::Cohort => AuthConfig::Cohort,
			AuthMode::Custom => AuthConfig::Custom(CustomAuth {
				user_email: self.auth.user_email,
				get_auth_token,
				custom_login_url: self.auth.custom_login_url,
				custom_login_redirect_parameter_name: self.auth.custom_login_redirect_parameter_name,
			}),
		};

		let url_params = self
			.url_params
			.into_iter()
			.filter_map(|(key, value)| match value {
				Value::Null => None,
				Value::String(s) => Some((key, s)),
				other => Some((key, other.to_string())),
			})
			.collect();

		EmbedConfig {
			auth,
			iframe_options: IframeOptions {
				container,
				container_id: self.iframe_options.container_id,
				iframe_style: self.iframe_options.iframe_style,
				spinner_style: self.iframe_options.spinner_style,
			},
			pathname: self.pathname,
			show_navbar: self.show_navbar,
			navigation_type: self.navigation_type,
			locale: self.language,
			url_params,
		}
	}
}
