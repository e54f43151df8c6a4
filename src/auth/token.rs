//! Token sets returned by the token endpoint and the slice of them kept in the access cookie.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: i64 = 3_600;

/// Tokens issued by a successful grant.
///
/// `expires_at` is unix seconds computed on receipt; it is never taken from client input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSet {
	/// Access token secret.
	pub access_token: TokenSecret,
	/// Refresh token, when the provider issued (or the caller retained) one.
	pub refresh_token: Option<TokenSecret>,
	/// OIDC ID token, when present.
	pub id_token: Option<TokenSecret>,
	/// Absolute expiry in unix seconds.
	pub expires_at: i64,
}
impl TokenSet {
	/// Builds a token set whose expiry is `now + expires_in` (defaulting to one hour).
	pub fn issued_at(
		now: OffsetDateTime,
		access_token: TokenSecret,
		expires_in: Option<i64>,
	) -> Self {
		let expires_in = expires_in.unwrap_or(DEFAULT_EXPIRES_IN);

		Self {
			access_token,
			refresh_token: None,
			id_token: None,
			expires_at: now.unix_timestamp().saturating_add(expires_in),
		}
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, refresh_token: Option<TokenSecret>) -> Self {
		self.refresh_token = refresh_token;

		self
	}

	/// Sets the ID token.
	pub fn with_id_token(mut self, id_token: Option<TokenSecret>) -> Self {
		self.id_token = id_token;

		self
	}

	/// The portion stored in the access cookie.
	pub fn access_data(&self) -> AccessTokenData {
		AccessTokenData {
			access_token: self.access_token.clone(),
			id_token: self.id_token.clone(),
			expires_at: self.expires_at,
		}
	}
}

/// Access-cookie payload: `{accessToken, idToken, expiresAt}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenData {
	/// Access token secret.
	pub access_token: TokenSecret,
	/// OIDC ID token (serialized as `null` when absent).
	pub id_token: Option<TokenSecret>,
	/// Absolute expiry in unix seconds.
	pub expires_at: i64,
}
impl AccessTokenData {
	/// `true` once `expires_at` lies strictly before `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at < now.unix_timestamp()
	}

	/// Remaining lifetime at `now`, clamped to zero.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		let remaining = self.expires_at.saturating_sub(now.unix_timestamp());

		Duration::seconds(remaining.max(0))
	}
}
