//! Session orchestration: the operations a BFF exposes to its browser client.
//!
//! Every operation takes the request's [`CookieTransport`] and returns a serializable outcome;
//! [`Reply`] turns outcomes and errors into a status code plus JSON body for whatever route
//! framework hosts the broker.

pub mod login;
pub mod refresh;
pub mod reply;
pub mod session;

pub use login::*;
pub use refresh::*;
pub use reply::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::{AuthState, TokenSecret, TokenSet},
	codec::CookieCodec,
	config::BrokerConfig,
	discovery::{DiscoveryCache, DiscoveryDocument},
	http::ProviderHttpClient,
	oauth::{self, TokenClient, TransportErrorMapper},
	store::{CookieTransport, SessionStore},
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Runs the BFF session lifecycle against one identity provider.
///
/// The broker is cheap to clone; clones share the configuration, the transport, and the
/// discovery cache. It holds no per-user state: everything about a session lives in the
/// cookies passed to each operation.
pub struct Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	config: Arc<BrokerConfig>,
	discovery: Arc<DiscoveryCache>,
	codec: CookieCodec,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: BrokerConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let codec = CookieCodec::new(&config.cookie_key);

		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			config: Arc::new(config),
			discovery: Default::default(),
			codec,
		}
	}

	/// Active configuration.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Discovery cache shared by this broker and its clones.
	pub fn discovery_cache(&self) -> &DiscoveryCache {
		&self.discovery
	}

	/// Session store bound to one request's cookies.
	pub fn session_store<'a, T>(&'a self, cookies: &'a T) -> SessionStore<'a, T>
	where
		T: ?Sized + CookieTransport,
	{
		SessionStore::new(&self.codec, &self.config.cookie_policy, cookies)
	}

	/// Provider metadata, fetched on first use and memoized afterwards.
	pub async fn authorization_server(&self) -> Result<Arc<DiscoveryDocument>> {
		self.discovery
			.get_or_fetch(
				&self.config.issuer,
				self.http_client.as_ref(),
				self.transport_mapper.as_ref(),
			)
			.await
	}

	/// Redeems an authorization code at the discovered token endpoint.
	pub async fn exchange_code_for_tokens(
		&self,
		code: &str,
		code_verifier: &TokenSecret,
	) -> Result<TokenSet> {
		let document = self.authorization_server().await?;

		self.token_client(&document).exchange_code(code, code_verifier).await
	}

	/// Runs the refresh grant, keeping `refresh_token` when the provider does not rotate it.
	pub async fn refresh_tokens(&self, refresh_token: &TokenSecret) -> Result<TokenSet> {
		let document = self.authorization_server().await?;

		self.token_client(&document).refresh(refresh_token).await
	}

	/// Authorization redirect for `auth_state`.
	pub async fn authorization_url(&self, auth_state: &AuthState) -> Result<Url> {
		let document = self.authorization_server().await?;

		Ok(oauth::build_authorization_url(&self.config, &document, auth_state))
	}

	/// End-session redirect, or `None` when the provider has no end-session endpoint.
	pub async fn logout_url(&self, id_token: Option<&str>) -> Result<Option<Url>> {
		let document = self.authorization_server().await?;

		Ok(oauth::build_logout_url(&self.config, &document, id_token))
	}

	fn token_client<'a>(&'a self, document: &'a DiscoveryDocument) -> TokenClient<'a, C, M> {
		TokenClient::new(
			&self.config,
			document,
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
		)
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest transport that never follows redirects.
	pub fn new(config: BrokerConfig) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(
			config,
			ReqwestHttpClient::without_redirects()?,
			ReqwestTransportErrorMapper,
		))
	}
}
impl<C, M> Clone for Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: Arc::clone(&self.http_client),
			transport_mapper: Arc::clone(&self.transport_mapper),
			config: Arc::clone(&self.config),
			discovery: Arc::clone(&self.discovery),
			codec: self.codec.clone(),
		}
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("issuer", &self.config.issuer.as_str())
			.field("client_id", &self.config.client_id)
			.field("discovery_cached", &self.discovery.cached().is_some())
			.finish()
	}
}
