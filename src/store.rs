//! Cookie-backed session persistence.
//!
//! The browser's cookie jar is the only session database. [`CookieTransport`] abstracts where
//! cookies are read from and written to, [`SessionStore`] seals payloads with a
//! [`CookieCodec`] and maps each [`SessionEntity`] onto its cookie name, path, and lifetime.

pub mod jar;

pub use jar::CookieJar;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{AccessTokenData, AuthState, TokenSecret, TokenSet},
	codec::{CodecError, CookieCodec},
	config::CookiePolicy,
};

/// Lifetime of the refresh cookie.
pub const REFRESH_COOKIE_MAX_AGE: Duration = Duration::days(7);
/// Lifetime of the auth-state cookie.
pub const AUTH_STATE_COOKIE_MAX_AGE: Duration = Duration::minutes(10);

const ROOT_PATH: &str = "/";
const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Request-scoped access to the browser's cookies.
///
/// Reads must observe writes made earlier in the same request.
pub trait CookieTransport
where
	Self: Send + Sync,
{
	/// Current value of cookie `name`.
	fn get(&self, name: &str) -> Option<String>;

	/// Queues a `Set-Cookie` directive.
	fn set(&self, cookie: SetCookie);

	/// Queues a deletion of cookie `name` on `path`.
	fn remove(&self, name: &str, path: &str, secure: bool) {
		self.set(SetCookie::removal(name, path, secure));
	}
}

/// One outgoing `Set-Cookie` directive.
///
/// Every cookie the broker writes is `HttpOnly` and `SameSite=Strict`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCookie {
	/// Cookie name.
	pub name: String,
	/// Cookie value; empty for deletions.
	pub value: String,
	/// `Path` attribute.
	pub path: String,
	/// `Max-Age` in seconds; zero deletes the cookie.
	pub max_age: i64,
	/// Adds the `Secure` attribute.
	pub secure: bool,
}
impl SetCookie {
	/// Directive storing `value` for `max_age` (negative lifetimes clamp to zero).
	pub fn new(
		name: impl Into<String>,
		value: impl Into<String>,
		path: impl Into<String>,
		max_age: Duration,
		secure: bool,
	) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			path: path.into(),
			max_age: max_age.whole_seconds().max(0),
			secure,
		}
	}

	/// Directive deleting `name` on `path`.
	pub fn removal(name: impl Into<String>, path: impl Into<String>, secure: bool) -> Self {
		Self::new(name, String::new(), path, Duration::ZERO, secure)
	}

	/// `true` when the directive expires the cookie immediately.
	pub fn is_removal(&self) -> bool {
		self.max_age == 0
	}

	/// Renders the `Set-Cookie` header value.
	pub fn to_header_value(&self) -> String {
		let mut rendered =
			format!("{}={}; Path={}; Max-Age={}", self.name, self.value, self.path, self.max_age);

		if self.value.is_empty() && self.is_removal() {
			rendered.push_str("; Expires=");
			rendered.push_str(EPOCH_EXPIRES);
		}

		rendered.push_str("; HttpOnly");

		if self.secure {
			rendered.push_str("; Secure");
		}

		rendered.push_str("; SameSite=Strict");

		rendered
	}
}
impl Display for SetCookie {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.to_header_value())
	}
}

/// Session records persisted as cookies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionEntity {
	/// `{accessToken, idToken, expiresAt}`.
	Access,
	/// `{refreshToken}`.
	Refresh,
	/// Pending PKCE handshake.
	AuthState,
}
impl SessionEntity {
	/// Every entity, in deletion order.
	pub const ALL: [SessionEntity; 3] =
		[SessionEntity::Access, SessionEntity::Refresh, SessionEntity::AuthState];

	/// Cookie name.
	pub const fn cookie_name(self) -> &'static str {
		match self {
			SessionEntity::Access => "at",
			SessionEntity::Refresh => "rt",
			SessionEntity::AuthState => "auth_state",
		}
	}

	/// Cookie path under `policy`.
	pub fn cookie_path(self, policy: &CookiePolicy) -> &str {
		match self {
			SessionEntity::Refresh => &policy.refresh_path,
			SessionEntity::Access | SessionEntity::AuthState => ROOT_PATH,
		}
	}

	/// Fixed lifetime, if the entity has one; the access cookie follows its token instead.
	pub const fn fixed_max_age(self) -> Option<Duration> {
		match self {
			SessionEntity::Access => None,
			SessionEntity::Refresh => Some(REFRESH_COOKIE_MAX_AGE),
			SessionEntity::AuthState => Some(AUTH_STATE_COOKIE_MAX_AGE),
		}
	}
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenData {
	refresh_token: TokenSecret,
}

/// Typed session persistence over a [`CookieTransport`].
pub struct SessionStore<'a, T>
where
	T: ?Sized + CookieTransport,
{
	codec: &'a CookieCodec,
	policy: &'a CookiePolicy,
	transport: &'a T,
}
impl<'a, T> SessionStore<'a, T>
where
	T: ?Sized + CookieTransport,
{
	/// Binds the store to one request's cookies.
	pub fn new(codec: &'a CookieCodec, policy: &'a CookiePolicy, transport: &'a T) -> Self {
		Self { codec, policy, transport }
	}

	/// Opens the entity's cookie; absent, tampered, expired, or foreign cookies read as `None`.
	pub fn load_entity<P>(&self, entity: SessionEntity) -> Option<P>
	where
		P: DeserializeOwned,
	{
		let value = self.transport.get(entity.cookie_name())?;

		if value.is_empty() {
			return None;
		}

		self.codec.decrypt(&value)
	}

	/// Seals `payload` into the entity's cookie.
	pub fn save_entity<P>(
		&self,
		entity: SessionEntity,
		payload: &P,
		max_age: Duration,
	) -> Result<(), CodecError>
	where
		P: Serialize,
	{
		let sealed = self.codec.encrypt(payload)?;

		self.transport.set(SetCookie::new(
			entity.cookie_name(),
			sealed,
			entity.cookie_path(self.policy),
			max_age,
			self.policy.secure,
		));

		Ok(())
	}

	/// Expires the entity's cookie.
	pub fn delete_entity(&self, entity: SessionEntity) {
		self.transport.remove(
			entity.cookie_name(),
			entity.cookie_path(self.policy),
			self.policy.secure,
		);
	}

	/// Writes the access cookie and, when present, the refresh cookie.
	pub fn set_token_cookies(&self, tokens: &TokenSet) -> Result<(), CodecError> {
		self.set_token_cookies_at(tokens, OffsetDateTime::now_utc())
	}

	/// [`set_token_cookies`](Self::set_token_cookies) with an explicit clock.
	pub fn set_token_cookies_at(
		&self,
		tokens: &TokenSet,
		now: OffsetDateTime,
	) -> Result<(), CodecError> {
		let access = tokens.access_data();

		self.save_entity(SessionEntity::Access, &access, access.remaining_at(now))?;

		if let Some(refresh_token) = &tokens.refresh_token {
			self.save_entity(
				SessionEntity::Refresh,
				&RefreshTokenData { refresh_token: refresh_token.clone() },
				REFRESH_COOKIE_MAX_AGE,
			)?;
		}

		Ok(())
	}

	/// Access cookie payload.
	pub fn access_token(&self) -> Option<AccessTokenData> {
		self.load_entity(SessionEntity::Access)
	}

	/// Refresh token from the refresh cookie.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.load_entity::<RefreshTokenData>(SessionEntity::Refresh).map(|data| data.refresh_token)
	}

	/// Pending PKCE handshake.
	pub fn auth_state(&self) -> Option<AuthState> {
		self.load_entity(SessionEntity::AuthState)
	}

	/// Persists the handshake for ten minutes.
	pub fn set_auth_state(&self, auth_state: &AuthState) -> Result<(), CodecError> {
		self.save_entity(SessionEntity::AuthState, auth_state, AUTH_STATE_COOKIE_MAX_AGE)
	}

	/// Expires every session cookie. Safe to call repeatedly.
	pub fn clear_token_cookies(&self) {
		for entity in SessionEntity::ALL {
			self.delete_entity(entity);
		}
	}

	/// Expires only the auth-state cookie.
	pub fn clear_auth_state(&self) {
		self.delete_entity(SessionEntity::AuthState);
	}
}
impl<T> Debug for SessionStore<'_, T>
where
	T: ?Sized + CookieTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionStore").field("policy", self.policy).finish()
	}
}
