//! Token endpoint client plus the authorization and end-session URL builders.
//!
//! Requests are assembled by hand (form-encoded bodies, `client_secret_post` authentication) and
//! sent through a [`ProviderHttpClient`]. Replies are parsed leniently: any JSON body carrying an
//! `error` field is a provider rejection regardless of status, and a missing `expires_in` means
//! one hour.

pub use oauth2;

// crates.io
use oauth2::{
	HttpClientError, HttpRequest,
	http::{
		Method,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	auth::{AuthState, TokenSecret, TokenSet},
	config::BrokerConfig,
	discovery::DiscoveryDocument,
	error::{ConfigError, TokenExchangeError, TransientError, TransportError},
	http::{self, Endpoint, ProviderHttpClient, ResponseMetadata},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Grants the token client performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// `authorization_code` with PKCE.
	AuthorizationCode,
	/// `refresh_token`.
	RefreshToken,
}
impl GrantType {
	/// The `grant_type` form value.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}

	/// Noun used in provider error messages ("Token exchange failed", "Token refresh failed").
	pub const fn action(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "exchange",
			GrantType::RefreshToken => "refresh",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(endpoint, meta, message),
			_ => map_unknown_transport_error(endpoint, meta),
		}
	}
}

/// Performs code and refresh grants against a discovered token endpoint.
pub struct TokenClient<'a, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: &'a BrokerConfig,
	document: &'a DiscoveryDocument,
	http_client: &'a C,
	mapper: &'a M,
}
impl<'a, C, M> TokenClient<'a, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Binds a client to one configuration and provider document.
	pub fn new(
		config: &'a BrokerConfig,
		document: &'a DiscoveryDocument,
		http_client: &'a C,
		mapper: &'a M,
	) -> Self {
		Self { config, document, http_client, mapper }
	}

	/// Redeems an authorization code with its PKCE verifier.
	pub async fn exchange_code(&self, code: &str, code_verifier: &TokenSecret) -> Result<TokenSet> {
		let body = FormSerializer::new(String::new())
			.append_pair("grant_type", GrantType::AuthorizationCode.as_str())
			.append_pair("code", code)
			.append_pair("redirect_uri", self.config.redirect_uri.as_str())
			.append_pair("code_verifier", code_verifier.expose())
			.append_pair("client_id", &self.config.client_id)
			.append_pair("client_secret", self.config.client_secret.expose())
			.finish();

		self.request_tokens(GrantType::AuthorizationCode, body, None).await
	}

	/// Rotates tokens with a refresh token; the caller's token is kept when none is returned.
	pub async fn refresh(&self, refresh_token: &TokenSecret) -> Result<TokenSet> {
		let body = FormSerializer::new(String::new())
			.append_pair("grant_type", GrantType::RefreshToken.as_str())
			.append_pair("refresh_token", refresh_token.expose())
			.append_pair("client_id", &self.config.client_id)
			.append_pair("client_secret", self.config.client_secret.expose())
			.finish();

		self.request_tokens(GrantType::RefreshToken, body, Some(refresh_token)).await
	}

	async fn request_tokens(
		&self,
		grant: GrantType,
		body: String,
		previous_refresh: Option<&TokenSecret>,
	) -> Result<TokenSet> {
		let request: HttpRequest = oauth2::http::Request::builder()
			.method(Method::POST)
			.uri(self.document.token_endpoint.as_str())
			.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
			.header(ACCEPT, "application/json")
			.body(body.into_bytes())
			.map_err(ConfigError::from)?;
		let response =
			http::execute(self.http_client, self.mapper, Endpoint::Token, request).await?;
		let tokens = parse_token_response(
			grant,
			response.status().as_u16(),
			response.body(),
			OffsetDateTime::now_utc(),
			previous_refresh,
		)?;

		Ok(tokens)
	}
}

/// Interprets a token endpoint reply received at `now`.
///
/// `previous_refresh` is carried forward when the reply omits `refresh_token`.
pub fn parse_token_response(
	grant: GrantType,
	status: u16,
	body: &[u8],
	now: OffsetDateTime,
	previous_refresh: Option<&TokenSecret>,
) -> Result<TokenSet, TokenExchangeError> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let raw: RawTokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TokenExchangeError::MalformedResponse {
			grant,
			source,
			status: Some(status),
		})?;

	if let Some(error) = raw.error.filter(|error| !error.is_empty()) {
		return Err(TokenExchangeError::Provider {
			grant,
			error,
			description: raw.error_description,
			status: Some(status),
		});
	}

	let access_token = raw
		.access_token
		.filter(|token| !token.is_empty())
		.ok_or(TokenExchangeError::MissingAccessToken { grant, status: Some(status) })?;
	let refresh_token = non_empty(raw.refresh_token)
		.map(TokenSecret::from)
		.or_else(|| previous_refresh.cloned());

	Ok(TokenSet::issued_at(now, TokenSecret::from(access_token), raw.expires_in)
		.with_refresh_token(refresh_token)
		.with_id_token(non_empty(raw.id_token).map(TokenSecret::from)))
}

/// Authorization request URL: `client_id`, `redirect_uri`, `response_type=code`, `scope`,
/// `state`, and the S256 PKCE challenge.
pub fn build_authorization_url(
	config: &BrokerConfig,
	document: &DiscoveryDocument,
	auth_state: &AuthState,
) -> Url {
	let mut url = document.authorization_endpoint.clone();

	url.query_pairs_mut()
		.append_pair("client_id", &config.client_id)
		.append_pair("redirect_uri", config.redirect_uri.as_str())
		.append_pair("response_type", "code")
		.append_pair("scope", &config.scopes.joined())
		.append_pair("state", &auth_state.state)
		.append_pair("code_challenge", &auth_state.code_challenge())
		.append_pair("code_challenge_method", auth_state.code_challenge_method().as_str());

	url
}

/// End-session URL, or `None` when the provider advertises no `end_session_endpoint`.
///
/// After logout the provider sends the browser back to the origin of the redirect URI.
pub fn build_logout_url(
	config: &BrokerConfig,
	document: &DiscoveryDocument,
	id_token: Option<&str>,
) -> Option<Url> {
	let mut url = document.end_session_endpoint.clone()?;

	{
		let mut query = url.query_pairs_mut();

		query.append_pair("client_id", &config.client_id);

		if let Some(id_token) = id_token.filter(|token| !token.is_empty()) {
			query.append_pair("id_token_hint", id_token);
		}

		query.append_pair(
			"post_logout_redirect_uri",
			&config.redirect_uri.origin().ascii_serialization(),
		);
	}

	Some(url)
}

#[derive(Deserialize)]
struct RawTokenResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	id_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|value| !value.is_empty())
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	endpoint: Endpoint,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Upstream {
			endpoint,
			message: format!("request timed out while calling the {endpoint} endpoint"),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
		}
		.into();
	}

	TransportError::from(err).into()
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(
	endpoint: Endpoint,
	meta: Option<&ResponseMetadata>,
	message: impl Display,
) -> Error {
	TransientError::Upstream {
		endpoint,
		message: format!("HTTP client error: {message}"),
		status: meta_status(meta),
	}
	.into()
}

#[cfg(feature = "reqwest")]
fn map_unknown_transport_error(endpoint: Endpoint, meta: Option<&ResponseMetadata>) -> Error {
	TransientError::Upstream {
		endpoint,
		message: "unknown HTTP client error".into(),
		status: meta_status(meta),
	}
	.into()
}

#[cfg(feature = "reqwest")]
fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::codec::CookieKey;

	fn now() -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Fixed timestamp should be valid.")
	}

	fn config() -> BrokerConfig {
		BrokerConfig::builder(
			Url::parse("http://localhost:9000").expect("Issuer should parse."),
			"test-client",
			"test-secret",
			Url::parse("http://localhost:3000/api/auth/callback").expect("Redirect should parse."),
			CookieKey::generate(),
		)
		.build()
		.expect("Config should build.")
	}

	fn document(end_session: bool) -> DiscoveryDocument {
		let mut value = json!({
			"issuer": "http://localhost:9000",
			"authorization_endpoint": "http://localhost:9000/authorize",
			"token_endpoint": "http://localhost:9000/token",
		});

		if end_session {
			value["end_session_endpoint"] = json!("http://localhost:9000/logout");
		}

		serde_json::from_value(value).expect("Document fixture should parse.")
	}

	fn query(url: &Url) -> HashMap<String, String> {
		url.query_pairs().into_owned().collect()
	}

	#[test]
	fn successful_replies_default_expiry_and_keep_optional_tokens() {
		let body = json!({ "access_token": "at", "id_token": "h.p.s", "token_type": "Bearer" });
		let tokens = parse_token_response(
			GrantType::AuthorizationCode,
			200,
			body.to_string().as_bytes(),
			now(),
			None,
		)
		.expect("Reply should parse.");

		assert_eq!(tokens.access_token.expose(), "at");
		assert_eq!(tokens.id_token.as_ref().map(TokenSecret::expose), Some("h.p.s"));
		assert!(tokens.refresh_token.is_none());
		assert_eq!(tokens.expires_at, 1_700_003_600);
	}

	#[test]
	fn refresh_retains_previous_refresh_token_unless_rotated() {
		let previous = TokenSecret::new("old-rt");
		let kept = parse_token_response(
			GrantType::RefreshToken,
			200,
			json!({ "access_token": "at", "expires_in": 60 }).to_string().as_bytes(),
			now(),
			Some(&previous),
		)
		.expect("Reply should parse.");

		assert_eq!(kept.refresh_token, Some(previous.clone()));
		assert_eq!(kept.expires_at, 1_700_000_060);

		let rotated = parse_token_response(
			GrantType::RefreshToken,
			200,
			json!({ "access_token": "at", "refresh_token": "new-rt" }).to_string().as_bytes(),
			now(),
			Some(&previous),
		)
		.expect("Reply should parse.");

		assert_eq!(rotated.refresh_token.as_ref().map(TokenSecret::expose), Some("new-rt"));
	}

	#[test]
	fn error_fields_win_over_status() {
		let err = parse_token_response(
			GrantType::RefreshToken,
			200,
			json!({ "error": "invalid_grant", "error_description": "expired" })
				.to_string()
				.as_bytes(),
			now(),
			None,
		)
		.expect_err("Error replies should fail.");

		assert_eq!(err.oauth_error(), Some("invalid_grant"));
		assert_eq!(err.to_string(), "Token refresh failed: invalid_grant - expired");
		assert_eq!(err.status(), 500);
	}

	#[test]
	fn garbage_and_tokenless_replies_are_rejected() {
		let malformed = parse_token_response(
			GrantType::AuthorizationCode,
			502,
			b"<html>Bad gateway</html>",
			now(),
			None,
		)
		.expect_err("HTML should fail.");

		assert!(matches!(
			malformed,
			TokenExchangeError::MalformedResponse { status: Some(502), .. }
		));

		let missing = parse_token_response(
			GrantType::AuthorizationCode,
			200,
			json!({ "token_type": "Bearer" }).to_string().as_bytes(),
			now(),
			None,
		)
		.expect_err("Missing access token should fail.");

		assert!(matches!(missing, TokenExchangeError::MissingAccessToken { .. }));
	}

	#[test]
	fn authorization_url_carries_every_parameter() {
		let config = config();
		let auth_state = AuthState::generate();
		let url = build_authorization_url(&config, &document(true), &auth_state);
		let params = query(&url);

		assert_eq!(url.path(), "/authorize");
		assert_eq!(params["client_id"], "test-client");
		assert_eq!(params["redirect_uri"], "http://localhost:3000/api/auth/callback");
		assert_eq!(params["response_type"], "code");
		assert_eq!(params["scope"], "openid profile email");
		assert_eq!(params["state"], auth_state.state);
		assert_eq!(params["code_challenge"], auth_state.code_challenge());
		assert_eq!(params["code_challenge_method"], "S256");
	}

	#[test]
	fn logout_url_points_back_to_the_app_origin() {
		let config = config();
		let url = build_logout_url(&config, &document(true), Some("h.p.s"))
			.expect("Logout URL should build.");
		let params = query(&url);

		assert_eq!(params["client_id"], "test-client");
		assert_eq!(params["id_token_hint"], "h.p.s");
		assert_eq!(params["post_logout_redirect_uri"], "http://localhost:3000");

		let without_hint =
			build_logout_url(&config, &document(true), None).expect("Logout URL should build.");

		assert!(!query(&without_hint).contains_key("id_token_hint"));
		assert!(build_logout_url(&config, &document(false), Some("h.p.s")).is_none());
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn reqwest_mapper_classifies_non_network_failures() {
		let mapper = ReqwestTransportErrorMapper;
		let meta = ResponseMetadata { status: Some(503) };
		let other = mapper.map_transport_error(
			Endpoint::Token,
			Some(&meta),
			HttpClientError::Other("connection pool closed".into()),
		);

		assert!(matches!(
			other,
			Error::Transient(TransientError::Upstream { endpoint: Endpoint::Token, status: Some(503), .. })
		));

		let io = mapper.map_transport_error(
			Endpoint::Discovery,
			None,
			HttpClientError::Io(std::io::Error::other("reset")),
		);

		assert!(matches!(io, Error::Transport(TransportError::Io(_))));
		assert_eq!(io.status(), 500);
	}
}
