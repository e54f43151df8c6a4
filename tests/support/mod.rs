//! Shared fixtures for the broker integration tests.

#![allow(dead_code)]

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::prelude::*;
use serde_json::{Value, json};
use time::OffsetDateTime;
use url::Url;
// self
use oauth2_bff::{
	auth::{TokenSecret, TokenSet},
	codec::CookieKey,
	config::BrokerConfig,
	flows::{Broker, ReqwestBroker},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest::{Client as ReqwestClient, redirect::Policy},
	store::{CookieJar, SetCookie},
};

pub const CLIENT_ID: &str = "bff-client";
pub const CLIENT_SECRET: &str = "bff-secret";
pub const REDIRECT_URI: &str = "http://localhost:3000/api/auth/callback";
pub const COOKIE_KEY: [u8; 32] = [7; 32];

/// Issuer URL served by `server`.
pub fn issuer(server: &MockServer) -> Url {
	Url::parse(&server.base_url()).expect("Mock issuer URL should parse.")
}

/// Configuration pointing at `server` with a fixed cookie key.
pub fn config(server: &MockServer) -> BrokerConfig {
	BrokerConfig::builder(
		issuer(server),
		CLIENT_ID,
		CLIENT_SECRET,
		Url::parse(REDIRECT_URI).expect("Redirect URI should parse."),
		CookieKey::from_bytes(COOKIE_KEY),
	)
	.build()
	.expect("Test configuration should build.")
}

/// Reqwest client that trusts the self-signed certificate `httpmock` serves and never follows
/// redirects.
pub fn http_client() -> ReqwestHttpClient {
	let client = ReqwestClient::builder()
		.redirect(Policy::none())
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Insecure Reqwest client for tests should build.");

	ReqwestHttpClient::with_client(client)
}

/// Reqwest-backed broker talking to `server`.
pub fn broker(server: &MockServer) -> ReqwestBroker {
	Broker::with_http_client(config(server), http_client(), ReqwestTransportErrorMapper)
}

/// Provider metadata for `server`, optionally advertising an end-session endpoint.
pub fn discovery_document(server: &MockServer, end_session: bool) -> Value {
	let base = server.base_url();
	let mut document = json!({
		"issuer": base,
		"authorization_endpoint": format!("{base}/authorize"),
		"token_endpoint": format!("{base}/token"),
		"jwks_uri": format!("{base}/jwks"),
		"response_types_supported": ["code"],
		"code_challenge_methods_supported": ["S256"],
	});

	if end_session {
		document["end_session_endpoint"] = json!(format!("{base}/logout"));
	}

	document
}

/// Mounts the discovery endpoint.
pub async fn mock_discovery<'a>(server: &'a MockServer, end_session: bool) -> httpmock::Mock<'a> {
	let body = discovery_document(server, end_session).to_string();

	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

/// Unsigned compact JWT carrying `claims`.
pub fn id_token(claims: Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

	format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Token endpoint reply with every token populated.
pub fn token_response(access: &str, refresh: Option<&str>, id_token: Option<&str>) -> Value {
	let mut body = json!({
		"access_token": access,
		"token_type": "Bearer",
		"expires_in": 3600,
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = json!(refresh);
	}
	if let Some(id_token) = id_token {
		body["id_token"] = json!(id_token);
	}

	body
}

/// Next request's jar: the browser after applying every directive in `jar`.
pub fn follow_up(jar: &CookieJar) -> CookieJar {
	CookieJar::from_cookie_header(&jar.cookie_header().unwrap_or_default())
}

/// Latest directive queued for `name`.
pub fn directive(jar: &CookieJar, name: &str) -> Option<SetCookie> {
	jar.set_cookies().into_iter().rev().find(|cookie| cookie.name == name)
}

/// Browser jar holding a live session: access cookie, refresh cookie, and optional ID token.
pub fn signed_in(broker: &ReqwestBroker, refresh: &str, id_token: Option<&str>) -> CookieJar {
	let tokens = TokenSet::issued_at(OffsetDateTime::now_utc(), TokenSecret::new("access-0"), None)
		.with_refresh_token(Some(TokenSecret::new(refresh)))
		.with_id_token(id_token.map(TokenSecret::new));
	let jar = CookieJar::new();

	broker.session_store(&jar).set_token_cookies(&tokens).expect("Session cookies should seal.");

	follow_up(&jar)
}
