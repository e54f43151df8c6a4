//! Refresh-token rotation driven by the refresh cookie.

// self
use crate::{
	_prelude::*,
	error::ValidationError,
	flows::Broker,
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	obs::{Flow, FlowKind},
	store::CookieTransport,
};

/// Refresh reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
	/// Always `true`; failures are errors.
	pub success: bool,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges the refresh cookie for new tokens and rewrites the token cookies.
	///
	/// The previous ID token is carried over when the provider does not issue a new one, so the
	/// session keeps its claims. Nothing is written when the grant fails.
	pub async fn refresh<T>(&self, cookies: &T) -> Result<RefreshOutcome>
	where
		T: ?Sized + CookieTransport,
	{
		let flow = Flow::start(FlowKind::Refresh, "refresh");
		let result = flow
			.instrument(async move {
				let store = self.session_store(cookies);
				let refresh_token =
					store.refresh_token().ok_or(ValidationError::MissingRefreshToken)?;
				let previous_id_token = store.access_token().and_then(|data| data.id_token);
				let mut tokens = self.refresh_tokens(&refresh_token).await?;

				if tokens.id_token.is_none() {
					tokens = tokens.with_id_token(previous_id_token);
				}

				store.set_token_cookies(&tokens)?;

				Ok(RefreshOutcome { success: true })
			})
			.await;

		flow.finish(result)
	}
}
