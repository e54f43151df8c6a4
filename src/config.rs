//! Broker configuration: client registration, redirect target, scopes, and cookie policy.
//!
//! Core logic never touches the environment. [`BrokerConfig::from_env`] is a convenience for
//! binaries; everything else goes through [`BrokerConfig::builder`].

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	codec::CookieKey,
	error::ConfigError,
};

/// Issuer base URL.
pub const ENV_ISSUER: &str = "AUTH_ISSUER";
/// OAuth client identifier.
pub const ENV_CLIENT_ID: &str = "AUTH_CLIENT_ID";
/// OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "AUTH_CLIENT_SECRET";
/// Registered redirect URI.
pub const ENV_REDIRECT_URI: &str = "AUTH_REDIRECT_URI";
/// Space-separated scopes.
pub const ENV_SCOPES: &str = "AUTH_SCOPES";
/// Base64url cookie key.
pub const ENV_COOKIE_KEY: &str = "COOKIE_ENCRYPTION_KEY";

/// Default path of the refresh cookie; the refresh route must live underneath it.
pub const DEFAULT_REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Attributes applied to every cookie the broker writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookiePolicy {
	/// Adds the `Secure` attribute.
	pub secure: bool,
	/// Path scoping the refresh cookie.
	pub refresh_path: String,
}
impl CookiePolicy {
	/// Derives the policy from the redirect URI: `Secure` whenever it is served over https.
	pub fn for_redirect_uri(redirect_uri: &Url) -> Self {
		Self {
			secure: redirect_uri.scheme() == "https",
			refresh_path: DEFAULT_REFRESH_COOKIE_PATH.into(),
		}
	}
}

/// Immutable broker configuration, built once at startup.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
	/// Provider issuer; discovery is fetched relative to it.
	pub issuer: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, sent in token request bodies.
	pub client_secret: TokenSecret,
	/// Callback URL registered with the provider.
	pub redirect_uri: Url,
	/// Scopes requested at login.
	pub scopes: ScopeSet,
	/// Key sealing every cookie.
	pub cookie_key: CookieKey,
	/// Cookie attributes.
	pub cookie_policy: CookiePolicy,
}
impl BrokerConfig {
	/// Starts a builder from the required settings.
	pub fn builder(
		issuer: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: Url,
		cookie_key: CookieKey,
	) -> BrokerConfigBuilder {
		BrokerConfigBuilder {
			issuer,
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			redirect_uri,
			cookie_key,
			scopes: None,
			secure_cookies: None,
			refresh_cookie_path: None,
		}
	}

	/// Reads the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads settings through `lookup`; empty values count as missing.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |name: &'static str| lookup(name).filter(|value| !value.is_empty());
		let require = |name: &'static str| read(name).ok_or(ConfigError::MissingSetting { name });
		let issuer = require(ENV_ISSUER)?;
		let client_id = require(ENV_CLIENT_ID)?;
		let client_secret = require(ENV_CLIENT_SECRET)?;
		let redirect_uri = require(ENV_REDIRECT_URI)?;
		let cookie_key = require(ENV_COOKIE_KEY)?;
		let mut builder = Self::builder(
			parse_url(ENV_ISSUER, &issuer)?,
			client_id,
			client_secret,
			parse_url(ENV_REDIRECT_URI, &redirect_uri)?,
			CookieKey::from_base64url(&cookie_key)?,
		);

		if let Some(scopes) = read(ENV_SCOPES) {
			builder = builder.scopes(scopes.parse::<ScopeSet>()?);
		}

		builder.build()
	}

	/// `Secure`-attribute flag for outgoing cookies.
	pub fn secure_cookies(&self) -> bool {
		self.cookie_policy.secure
	}
}

/// Builder for [`BrokerConfig`].
#[derive(Debug)]
pub struct BrokerConfigBuilder {
	issuer: Url,
	client_id: String,
	client_secret: String,
	redirect_uri: Url,
	cookie_key: CookieKey,
	scopes: Option<ScopeSet>,
	secure_cookies: Option<bool>,
	refresh_cookie_path: Option<String>,
}
impl BrokerConfigBuilder {
	/// Overrides the requested scopes (default `openid profile email`).
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = Some(scopes);

		self
	}

	/// Forces the `Secure` cookie attribute on or off.
	pub fn secure_cookies(mut self, secure: bool) -> Self {
		self.secure_cookies = Some(secure);

		self
	}

	/// Overrides the refresh cookie path (default `/api/auth`).
	pub fn refresh_cookie_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_cookie_path = Some(path.into());

		self
	}

	/// Validates and freezes the configuration.
	pub fn build(self) -> Result<BrokerConfig, ConfigError> {
		if self.client_id.is_empty() {
			return Err(ConfigError::MissingSetting { name: ENV_CLIENT_ID });
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::MissingSetting { name: ENV_CLIENT_SECRET });
		}

		let mut cookie_policy = CookiePolicy::for_redirect_uri(&self.redirect_uri);

		if let Some(secure) = self.secure_cookies {
			cookie_policy.secure = secure;
		}
		if let Some(path) = self.refresh_cookie_path {
			if !path.starts_with('/') {
				return Err(ConfigError::InvalidCookiePath { path });
			}

			cookie_policy.refresh_path = path;
		}

		let scopes = match self.scopes {
			Some(scopes) if !scopes.is_empty() => scopes,
			_ => ScopeSet::openid_default(),
		};

		Ok(BrokerConfig {
			issuer: self.issuer,
			client_id: self.client_id,
			client_secret: TokenSecret::new(self.client_secret),
			redirect_uri: self.redirect_uri,
			scopes,
			cookie_key: self.cookie_key,
			cookie_policy,
		})
	}
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	const KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map = pairs
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<_, _>>();

		move |name| map.get(name).cloned()
	}

	fn complete() -> Vec<(&'static str, &'static str)> {
		vec![
			(ENV_ISSUER, "http://localhost:9000"),
			(ENV_CLIENT_ID, "test-client"),
			(ENV_CLIENT_SECRET, "test-secret"),
			(ENV_REDIRECT_URI, "http://localhost:3000/api/auth/callback"),
			(ENV_COOKIE_KEY, KEY),
		]
	}

	#[test]
	fn loads_complete_settings_with_default_scopes() {
		let config =
			BrokerConfig::from_lookup(lookup_from(&complete())).expect("Config should load.");

		assert_eq!(config.issuer.as_str(), "http://localhost:9000/");
		assert_eq!(config.client_id, "test-client");
		assert_eq!(config.client_secret.expose(), "test-secret");
		assert_eq!(config.scopes.joined(), "openid profile email");
		assert!(!config.secure_cookies());
		assert_eq!(config.cookie_policy.refresh_path, DEFAULT_REFRESH_COOKIE_PATH);
	}

	#[test]
	fn custom_scopes_keep_their_order() {
		let mut pairs = complete();

		pairs.push((ENV_SCOPES, "openid offline_access email"));

		let config = BrokerConfig::from_lookup(lookup_from(&pairs)).expect("Config should load.");

		assert_eq!(config.scopes.joined(), "openid offline_access email");
	}

	#[test]
	fn missing_or_empty_settings_name_the_variable() {
		for name in [ENV_ISSUER, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_REDIRECT_URI, ENV_COOKIE_KEY] {
			let without = complete().into_iter().filter(|(k, _)| *k != name).collect::<Vec<_>>();
			let err = BrokerConfig::from_lookup(lookup_from(&without))
				.expect_err("Missing settings should fail.");

			assert_eq!(err.to_string(), format!("{name} is required."));

			let mut emptied = without.clone();

			emptied.push((name, ""));

			assert!(matches!(
				BrokerConfig::from_lookup(lookup_from(&emptied)),
				Err(ConfigError::MissingSetting { name: missing }) if missing == name
			));
		}
	}

	#[test]
	fn rejects_bad_urls_and_keys() {
		let mut pairs = complete();

		pairs[0] = (ENV_ISSUER, "not a url");

		assert!(matches!(
			BrokerConfig::from_lookup(lookup_from(&pairs)),
			Err(ConfigError::InvalidUrl { name: ENV_ISSUER, .. })
		));

		let mut pairs = complete();

		pairs[4] = (ENV_COOKIE_KEY, "c2hvcnQ");

		assert!(matches!(
			BrokerConfig::from_lookup(lookup_from(&pairs)),
			Err(ConfigError::InvalidCookieKey { .. })
		));
	}

	#[test]
	fn https_redirects_enable_secure_cookies_unless_overridden() {
		let key = CookieKey::from_base64url(KEY).expect("Key fixture should decode.");
		let issuer = Url::parse("https://id.example.com").expect("Issuer should parse.");
		let redirect =
			Url::parse("https://app.example.com/api/auth/callback").expect("Redirect should parse.");
		let config =
			BrokerConfig::builder(issuer.clone(), "c", "s", redirect.clone(), key.clone())
				.build()
				.expect("Config should build.");

		assert!(config.secure_cookies());

		let config = BrokerConfig::builder(issuer, "c", "s", redirect, key)
			.secure_cookies(false)
			.refresh_cookie_path("/auth")
			.build()
			.expect("Config should build.");

		assert!(!config.secure_cookies());
		assert_eq!(config.cookie_policy.refresh_path, "/auth");
	}

	#[test]
	fn relative_refresh_paths_are_rejected() {
		let key = CookieKey::from_base64url(KEY).expect("Key fixture should decode.");
		let url = Url::parse("http://localhost:3000/cb").expect("URL should parse.");
		let err = BrokerConfig::builder(url.clone(), "c", "s", url, key)
			.refresh_cookie_path("api/auth")
			.build()
			.expect_err("Relative paths should fail.");

		assert!(matches!(err, ConfigError::InvalidCookiePath { .. }));
	}
}
