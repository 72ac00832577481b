//! Embed URL construction.
//!
//! Computes the fully-qualified address of the embedded experience from the
//! configured origin, the host page's own address, the identity settings and
//! caller-supplied parameters. A one-shot `cohortRedirect` deep link on the
//! host page overrides the path and merges its query over everything else.
//!
//! Caller-sourced parameters pass through an allow-list; redirect-sourced
//! parameters do not. The asymmetry is deliberate and must be kept.

use url::Url;

use crate::error::Result;

/// Host page parameter carrying a one-shot deep link into the experience.
pub const REDIRECT_PARAM: &str = "cohortRedirect";

/// Default name of the post-login destination parameter.
pub const DEFAULT_REDIRECT_PARAMETER_NAME: &str = "destination";

/// Caller-sourced parameter keys that survive filtering.
pub const ALLOWED_PARAMS: [&str; 7] = [
	"disableLogout",
	"embedEmail",
	"navbar",
	"navigationType",
	"lng",
	"customLoginUrl",
	"customLoginRedirectParameterName",
];

/// Returns `true` if `key` may be supplied by the caller.
pub fn is_allowed_param(key: &str) -> bool {
	ALLOWED_PARAMS.contains(&key)
}

/// Insertion-ordered query parameters with replace-in-place `set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
	entries: Vec<(String, String)>,
}

impl QueryParams {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `key`, replacing an existing value without moving it.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		let key = key.into();
		let value = value.into();
		match self.entries.iter_mut().find(|(k, _)| *k == key) {
			Some(entry) => entry.1 = value,
			None => self.entries.push((key, value)),
		}
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	pub fn contains(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	pub fn remove(&mut self, key: &str) -> Option<String> {
		let pos = self.entries.iter().position(|(k, _)| k == key)?;
		Some(self.entries.remove(pos).1)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Keeps only allow-listed keys.
	pub fn retain_allowed(&mut self) {
		self.entries.retain(|(k, _)| is_allowed_param(k));
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut params = QueryParams::new();
		for (k, v) in iter {
			params.set(k, v);
		}
		params
	}
}

/// Identity parameters, present only in host-managed identity mode.
#[derive(Debug, Clone, Copy)]
pub struct IdentityParams<'a> {
	pub user_email: Option<&'a str>,
	pub custom_login_url: &'a str,
	pub redirect_parameter_name: Option<&'a str>,
}

/// Inputs to [`build_embed_url`] beyond the two addresses.
#[derive(Debug, Clone, Default)]
pub struct EmbedUrlRequest<'a> {
	pub pathname: Option<&'a str>,
	pub identity: Option<IdentityParams<'a>>,
	/// Caller-sourced optional parameters; filtered by [`ALLOWED_PARAMS`].
	pub params: QueryParams,
}

/// Result of URL construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedUrl {
	/// Address to load in the iframe.
	pub url: Url,
	/// Host page address with the deep-link parameter stripped, when one was consumed.
	/// The caller must apply it in place (no history entry).
	pub stripped_page_url: Option<Url>,
}

impl EmbedUrl {
	/// Serialized origin of the embed address; the only valid `postMessage` target.
	pub fn target_origin(&self) -> String {
		self.url.origin().ascii_serialization()
	}
}

/// Builds the embed address.
///
/// Parameter precedence, lowest first: fixed parameters (`embedded`,
/// `embedUrl`), allow-listed caller parameters, identity parameters, then
/// the deep-link query which is merged unfiltered.
pub fn build_embed_url(origin: &Url, page_url: &Url, request: &EmbedUrlRequest<'_>) -> Result<EmbedUrl> {
	let mut url = origin.clone();
	let mut params = QueryParams::new();

	params.set("embedded", "true");
	params.set("embedUrl", format!("{}{}", page_url.origin().ascii_serialization(), page_url.path()));

	let mut caller = request.params.clone();
	caller.retain_allowed();
	for (key, value) in caller.iter() {
		params.set(key, value);
	}

	if let Some(identity) = request.identity {
		params.set("disableLogout", "true");
		if let Some(email) = identity.user_email {
			params.set("embedEmail", email);
		}
		params.set("customLoginUrl", identity.custom_login_url);
		params.set(
			"customLoginRedirectParameterName",
			identity.redirect_parameter_name.unwrap_or(DEFAULT_REDIRECT_PARAMETER_NAME),
		);
	}

	let redirect = page_url
		.query_pairs()
		.find(|(key, value)| key == REDIRECT_PARAM && !value.is_empty())
		.map(|(_, value)| value.into_owned());

	let stripped_page_url = match redirect {
		Some(redirect) => {
			let target = origin.join(&redirect)?;
			url.set_path(target.path());
			for (key, value) in target.query_pairs() {
				params.set(key, value);
			}
			Some(strip_query_param(page_url, REDIRECT_PARAM))
		}
		None => {
			if let Some(pathname) = request.pathname {
				url.set_path(pathname);
			}
			None
		}
	};

	url.set_query(None);
	if !params.is_empty() {
		url.query_pairs_mut().extend_pairs(params.iter());
	}

	Ok(EmbedUrl { url, stripped_page_url })
}

fn strip_query_param(url: &Url, key: &str) -> Url {
	let kept: Vec<(String, String)> = url
		.query_pairs()
		.filter(|(k, _)| k != key)
		.map(|(k, v)| (k.into_owned(), v.into_owned()))
		.collect();

	let mut stripped = url.clone();
	if kept.is_empty() {
		stripped.set_query(None);
	} else {
		stripped.query_pairs_mut().clear().extend_pairs(kept);
	}
	stripped
}

#[cfg(test)]
mod tests {
	use super::*;

	fn origin() -> Url {
		Url::parse("https://testouze.com").unwrap()
	}

	fn page() -> Url {
		Url::parse("http://localhost:3000/").unwrap()
	}

	fn param(url: &Url, key: &str) -> Option<String> {
		url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
	}

	#[test]
	fn fixed_params_are_always_present() {
		let built = build_embed_url(&origin(), &page(), &EmbedUrlRequest::default()).unwrap();

		assert_eq!(built.url.origin().ascii_serialization(), "https://testouze.com");
		assert_eq!(built.url.path(), "/");
		assert_eq!(param(&built.url, "embedded").as_deref(), Some("true"));
		assert_eq!(param(&built.url, "embedUrl").as_deref(), Some("http://localhost:3000/"));
		assert_eq!(param(&built.url, "disableLogout"), None);
		assert_eq!(param(&built.url, "customLoginUrl"), None);
		assert!(built.stripped_page_url.is_none());
	}

	#[test]
	fn embed_url_drops_page_query_and_fragment() {
		let page = Url::parse("https://shop.test/rewards?tab=2#top").unwrap();
		let built = build_embed_url(&origin(), &page, &EmbedUrlRequest::default()).unwrap();
		assert_eq!(param(&built.url, "embedUrl").as_deref(), Some("https://shop.test/rewards"));
	}

	#[test]
	fn caller_params_are_allow_listed() {
		let request = EmbedUrlRequest {
			pathname: Some("/space/home"),
			params: [("navbar", "false"), ("navigationType", "burger"), ("notAuthorizedParam", "x")]
				.into_iter()
				.collect(),
			..Default::default()
		};

		let built = build_embed_url(&origin(), &page(), &request).unwrap();

		assert_eq!(built.url.path(), "/space/home");
		assert_eq!(param(&built.url, "navbar").as_deref(), Some("false"));
		assert_eq!(param(&built.url, "navigationType").as_deref(), Some("burger"));
		assert_eq!(param(&built.url, "notAuthorizedParam"), None);
	}

	#[test]
	fn caller_cannot_override_fixed_params() {
		let request = EmbedUrlRequest {
			params: [("embedded", "false"), ("embedUrl", "https://evil.test/")].into_iter().collect(),
			..Default::default()
		};

		let built = build_embed_url(&origin(), &page(), &request).unwrap();
		assert_eq!(param(&built.url, "embedded").as_deref(), Some("true"));
		assert_eq!(param(&built.url, "embedUrl").as_deref(), Some("http://localhost:3000/"));
	}

	#[test]
	fn identity_params_in_custom_mode() {
		let request = EmbedUrlRequest {
			identity: Some(IdentityParams {
				user_email: Some("test-sdk@getcohort.com"),
				custom_login_url: "https://testouze.com/login",
				redirect_parameter_name: None,
			}),
			params: [("disableLogout", "false")].into_iter().collect(),
			..Default::default()
		};

		let built = build_embed_url(&origin(), &page(), &request).unwrap();

		assert_eq!(param(&built.url, "disableLogout").as_deref(), Some("true"));
		assert_eq!(param(&built.url, "embedEmail").as_deref(), Some("test-sdk@getcohort.com"));
		assert_eq!(param(&built.url, "customLoginUrl").as_deref(), Some("https://testouze.com/login"));
		assert_eq!(
			param(&built.url, "customLoginRedirectParameterName").as_deref(),
			Some("destination")
		);
	}

	#[test]
	fn anonymous_custom_mode_omits_email() {
		let request = EmbedUrlRequest {
			identity: Some(IdentityParams {
				user_email: None,
				custom_login_url: "https://merchant.test/login",
				redirect_parameter_name: Some("redirectUri"),
			}),
			..Default::default()
		};

		let built = build_embed_url(&origin(), &page(), &request).unwrap();
		assert_eq!(param(&built.url, "embedEmail"), None);
		assert_eq!(
			param(&built.url, "customLoginRedirectParameterName").as_deref(),
			Some("redirectUri")
		);
	}

	#[test]
	fn deep_link_overrides_path_and_params() {
		let page = Url::parse("http://localhost:3000/?cohortRedirect=%2Fspace%2Frewards%3Ffoo%3Dbar%26navbar%3Dtrue&keep=1")
			.unwrap();
		let request = EmbedUrlRequest {
			pathname: Some("/space/home"),
			params: [("navbar", "false"), ("foo", "ignored")].into_iter().collect(),
			..Default::default()
		};

		let built = build_embed_url(&origin(), &page, &request).unwrap();

		assert_eq!(built.url.path(), "/space/rewards");
		assert_eq!(param(&built.url, "foo").as_deref(), Some("bar"));
		assert_eq!(param(&built.url, "navbar").as_deref(), Some("true"));

		let stripped = built.stripped_page_url.unwrap();
		assert_eq!(stripped.as_str(), "http://localhost:3000/?keep=1");
		assert_eq!(param(&built.url, "embedUrl").as_deref(), Some("http://localhost:3000/"));
	}

	#[test]
	fn deep_link_params_bypass_allow_list() {
		let page = Url::parse("http://localhost:3000/page?cohortRedirect=%2Fstore%3FcustomKey%3D1").unwrap();
		let built = build_embed_url(&origin(), &page, &EmbedUrlRequest::default()).unwrap();

		assert_eq!(built.url.path(), "/store");
		assert_eq!(param(&built.url, "customKey").as_deref(), Some("1"));
		assert_eq!(built.stripped_page_url.unwrap().as_str(), "http://localhost:3000/page");
	}

	#[test]
	fn absolute_deep_link_keeps_configured_origin() {
		let page = Url::parse("http://localhost:3000/?cohortRedirect=https%3A%2F%2Fevil.test%2Fsteal").unwrap();
		let built = build_embed_url(&origin(), &page, &EmbedUrlRequest::default()).unwrap();

		assert_eq!(built.target_origin(), "https://testouze.com");
		assert_eq!(built.url.path(), "/steal");
	}

	#[test]
	fn empty_deep_link_is_ignored() {
		let page = Url::parse("http://localhost:3000/?cohortRedirect=").unwrap();
		let request = EmbedUrlRequest {
			pathname: Some("/space/home"),
			..Default::default()
		};

		let built = build_embed_url(&origin(), &page, &request).unwrap();
		assert_eq!(built.url.path(), "/space/home");
		assert!(built.stripped_page_url.is_none());
	}

	#[test]
	fn query_params_set_replaces_in_place() {
		let mut params = QueryParams::new();
		params.set("a", "1");
		params.set("b", "2");
		params.set("a", "3");

		assert_eq!(params.iter().collect::<Vec<_>>(), vec![("a", "3"), ("b", "2")]);
		assert_eq!(params.remove("a").as_deref(), Some("3"));
		assert!(!params.contains("a"));
		assert_eq!(params.len(), 1);
	}
}
