//! Session presence checks and logout.

// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, parse_id_token_claims},
	flows::Broker,
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	obs::{Flow, FlowKind},
	store::CookieTransport,
};

/// Session query reply.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
	/// `true` while an unexpired access cookie is present.
	pub is_logged_in: bool,
	/// ID-token claims, `null` when logged out or when no parseable ID token is stored.
	pub claims: Option<IdTokenClaims>,
}
impl SessionInfo {
	/// The logged-out answer.
	pub fn logged_out() -> Self {
		Self { is_logged_in: false, claims: None }
	}
}

/// Logout reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutOutcome {
	/// Provider end-session URL to visit next, `null` when none can be built.
	pub logout_url: Option<Url>,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Reports whether the access cookie holds an unexpired session. Never fails.
	pub fn session<T>(&self, cookies: &T) -> SessionInfo
	where
		T: ?Sized + CookieTransport,
	{
		self.session_at(cookies, OffsetDateTime::now_utc())
	}

	/// [`session`](Self::session) with an explicit clock.
	pub fn session_at<T>(&self, cookies: &T, now: OffsetDateTime) -> SessionInfo
	where
		T: ?Sized + CookieTransport,
	{
		let flow = Flow::start(FlowKind::Session, "session");
		let info = flow.in_scope(|| match self.session_store(cookies).access_token() {
			Some(data) if !data.is_expired_at(now) => {
				let claims =
					data.id_token.as_ref().and_then(|token| parse_id_token_claims(token.expose()));

				SessionInfo { is_logged_in: true, claims }
			},
			_ => SessionInfo::logged_out(),
		});

		flow.succeed();

		info
	}

	/// Clears every session cookie and returns the provider's end-session URL when one can be
	/// built. Never fails.
	///
	/// The URL is only built when the access cookie carries a parseable ID token; provider
	/// lookups that fail are logged and reported as `null`. Cookies are cleared regardless.
	pub async fn logout<T>(&self, cookies: &T) -> LogoutOutcome
	where
		T: ?Sized + CookieTransport,
	{
		let flow = Flow::start(FlowKind::Logout, "logout");
		let outcome = flow
			.instrument(async {
				let store = self.session_store(cookies);
				let id_token = store
					.access_token()
					.and_then(|data| data.id_token)
					.filter(|token| parse_id_token_claims(token.expose()).is_some());
				let logout_url = match id_token {
					Some(id_token) => match self.logout_url(Some(id_token.expose())).await {
						Ok(url) => url,
						Err(err) => {
							flow.absorb(&err);

							None
						},
					},
					None => None,
				};

				store.clear_token_cookies();

				LogoutOutcome { logout_url }
			})
			.await;

		flow.succeed();

		outcome
	}
}
