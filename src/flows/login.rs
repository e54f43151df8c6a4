//! Authorization Code + PKCE login: redirect construction and callback handling.

// self
use crate::{
	_prelude::*,
	auth::{AuthState, IdTokenClaims, parse_id_token_claims},
	error::ValidationError,
	flows::Broker,
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	obs::{Flow, FlowKind},
	store::CookieTransport,
};

/// Login start reply: where to send the browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStart {
	/// Provider authorization URL carrying state and the PKCE challenge.
	pub authorization_url: Url,
}

/// Callback parameters relayed by the browser after the provider redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct LoginEndRequest {
	/// Authorization code.
	#[serde(default)]
	pub code: Option<String>,
	/// Returned anti-CSRF state.
	#[serde(default)]
	pub state: Option<String>,
	/// RFC 9207 issuer identifier; accepted but not required.
	#[serde(default)]
	pub iss: Option<String>,
}
impl LoginEndRequest {
	/// Builds a request from a code and state pair.
	pub fn new(code: impl Into<String>, state: impl Into<String>) -> Self {
		Self { code: Some(code.into()), state: Some(state.into()), iss: None }
	}

	fn code_and_state(&self) -> Result<(&str, &str), ValidationError> {
		match (self.code.as_deref(), self.state.as_deref()) {
			(Some(code), Some(state)) if !code.is_empty() && !state.is_empty() =>
				Ok((code, state)),
			_ => Err(ValidationError::MissingCodeOrState),
		}
	}
}

/// Login end reply.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginEnd {
	/// Always `true`; failures are errors.
	pub success: bool,
	/// Claims from the issued ID token, `null` without one.
	pub claims: Option<IdTokenClaims>,
	/// Destination recorded at login start.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub return_to: Option<String>,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Generates a PKCE handshake, seals it into the auth-state cookie, and returns the
	/// authorization URL.
	///
	/// `return_to` must be a same-origin absolute path. The cookie is only written once the
	/// URL could be built.
	pub async fn start_login<T>(&self, cookies: &T, return_to: Option<&str>) -> Result<LoginStart>
	where
		T: ?Sized + CookieTransport,
	{
		let flow = Flow::start(FlowKind::LoginStart, "start_login");
		let result = flow
			.instrument(async move {
				let mut auth_state = AuthState::generate();

				if let Some(return_to) = return_to {
					auth_state = auth_state.with_return_to(return_to)?;
				}

				let authorization_url = self.authorization_url(&auth_state).await?;

				self.session_store(cookies).set_auth_state(&auth_state)?;

				Ok(LoginStart { authorization_url })
			})
			.await;

		flow.finish(result)
	}

	/// Validates the callback against the auth-state cookie, redeems the code, and swaps the
	/// auth-state cookie for token cookies.
	///
	/// The auth state is consumed only on success, so replaying a completed callback fails
	/// with [`ValidationError::MissingAuthState`].
	pub async fn end_login<T>(&self, cookies: &T, request: &LoginEndRequest) -> Result<LoginEnd>
	where
		T: ?Sized + CookieTransport,
	{
		let flow = Flow::start(FlowKind::LoginEnd, "end_login");
		let result = flow
			.instrument(async move {
				let (code, state) = request.code_and_state()?;
				let store = self.session_store(cookies);
				let auth_state = store.auth_state().ok_or(ValidationError::MissingAuthState)?;

				auth_state.validate_state(state)?;

				let tokens = self.exchange_code_for_tokens(code, &auth_state.code_verifier).await?;

				store.set_token_cookies(&tokens)?;
				store.clear_auth_state();

				let claims = tokens
					.id_token
					.as_ref()
					.and_then(|id_token| parse_id_token_claims(id_token.expose()));

				Ok(LoginEnd { success: true, claims, return_to: auth_state.return_to })
			})
			.await;

		flow.finish(result)
	}
}
