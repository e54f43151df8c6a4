#![cfg(feature = "reqwest")]

mod support;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use oauth2_bff::{
	error::{Error, TokenExchangeError, ValidationError},
	flows::Reply,
	obs::FlowKind,
	store::CookieJar,
};

#[tokio::test]
async fn refresh_without_a_refresh_cookie_is_unauthorized() {
	let server = MockServer::start_async().await;
	let discovery = support::mock_discovery(&server, true).await;
	let broker = support::broker(&server);
	let jar = CookieJar::new();
	let result = broker.refresh(&jar).await;

	assert!(matches!(result, Err(Error::Validation(ValidationError::MissingRefreshToken))));
	assert_eq!(
		Reply::from_result(FlowKind::Refresh, &result),
		Reply::error(401, "No refresh token found")
	);
	assert!(jar.set_cookies().is_empty());

	discovery.assert_calls_async(0).await;
}

#[tokio::test]
async fn refresh_keeps_the_refresh_token_and_id_token_when_the_provider_does_not_rotate() {
	let server = MockServer::start_async().await;
	let _discovery = support::mock_discovery(&server, true).await;
	let body = support::token_response("access-2", None, None).to_string();
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-1")
				.form_urlencoded_tuple("client_id", support::CLIENT_ID)
				.form_urlencoded_tuple("client_secret", support::CLIENT_SECRET);
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;
	let broker = support::broker(&server);
	let id_token = support::id_token(json!({ "sub": "u1", "email": "u1@example.com" }));
	let jar = support::signed_in(&broker, "refresh-1", Some(&id_token));
	let outcome = broker.refresh(&jar).await.expect("Refresh should succeed.");

	token.assert_async().await;

	assert!(outcome.success);

	let access = support::directive(&jar, "at").expect("Access cookie should be rewritten.");

	assert!(access.max_age > 3_500 && access.max_age <= 3_600);

	let browser = support::follow_up(&jar);
	let store = broker.session_store(&browser);
	let data = store.access_token().expect("Access cookie should open.");

	assert_eq!(data.access_token.expose(), "access-2");
	assert_eq!(data.id_token.as_ref().map(|token| token.expose()), Some(id_token.as_str()));
	assert_eq!(
		store.refresh_token().map(|token| token.expose().to_owned()),
		Some("refresh-1".into())
	);

	let session = broker.session(&browser);

	assert!(session.is_logged_in);
	assert_eq!(session.claims.as_ref().map(|claims| claims.sub.as_str()), Some("u1"));
}

#[tokio::test]
async fn refresh_adopts_rotated_tokens() {
	let server = MockServer::start_async().await;
	let _discovery = support::mock_discovery(&server, true).await;
	let rotated_id_token = support::id_token(json!({ "sub": "u1", "name": "Rotated" }));
	let body =
		support::token_response("access-2", Some("refresh-2"), Some(&rotated_id_token)).to_string();
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").form_urlencoded_tuple("grant_type", "refresh_token");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;
	let broker = support::broker(&server);
	let original_id_token = support::id_token(json!({ "sub": "u1", "name": "Original" }));
	let jar = support::signed_in(&broker, "refresh-1", Some(&original_id_token));

	broker.refresh(&jar).await.expect("Refresh should succeed.");

	token.assert_async().await;

	let browser = support::follow_up(&jar);
	let store = broker.session_store(&browser);

	assert_eq!(
		store.refresh_token().map(|token| token.expose().to_owned()),
		Some("refresh-2".into())
	);
	assert_eq!(
		broker.session(&browser).claims.and_then(|claims| claims.name),
		Some("Rotated".into())
	);
}

#[tokio::test]
async fn rejected_refreshes_leave_the_session_cookies_untouched() {
	let server = MockServer::start_async().await;
	let _discovery = support::mock_discovery(&server, true).await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400).header("content-type", "application/json").body(
				json!({ "error": "invalid_grant", "error_description": "Refresh token revoked" })
					.to_string(),
			);
		})
		.await;
	let broker = support::broker(&server);
	let jar = support::signed_in(&broker, "refresh-1", None);
	let result = broker.refresh(&jar).await;

	token.assert_async().await;

	match &result {
		Err(Error::TokenExchange(err @ TokenExchangeError::Provider { .. })) => {
			assert_eq!(err.oauth_error(), Some("invalid_grant"));
			assert_eq!(err.status(), 400);
		},
		other => panic!("Unexpected result: {other:?}."),
	}

	assert_eq!(Reply::from_result(FlowKind::Refresh, &result).status, 400);
	assert!(jar.set_cookies().is_empty());
	assert_eq!(
		broker.session_store(&jar).refresh_token().map(|token| token.expose().to_owned()),
		Some("refresh-1".into())
	);
}

#[tokio::test]
async fn unreadable_upstream_replies_become_a_generic_failure() {
	let server = MockServer::start_async().await;
	let _discovery = support::mock_discovery(&server, true).await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(502).header("content-type", "text/html").body("<html>Bad Gateway</html>");
		})
		.await;
	let broker = support::broker(&server);
	let jar = support::signed_in(&broker, "refresh-1", None);
	let result = broker.refresh(&jar).await;

	assert!(matches!(
		result,
		Err(Error::TokenExchange(TokenExchangeError::MalformedResponse { .. }))
	));
	assert_eq!(
		Reply::from_result(FlowKind::Refresh, &result),
		Reply::error(500, "Failed to refresh tokens")
	);
	assert!(jar.set_cookies().is_empty());
}
