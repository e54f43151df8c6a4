//! OpenID Provider metadata discovery with a process-lifetime cache.
//!
//! A [`DiscoveryCache`] memoizes the first successfully fetched [`DiscoveryDocument`]. Failures
//! are never cached, so the next caller simply retries. Concurrent misses may each fetch the
//! document; the last writer wins and readers always observe a whole `Arc`.

// crates.io
use oauth2::{
	HttpRequest,
	http::{Method, header::ACCEPT},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, DiscoveryError},
	http::{self, Endpoint, ProviderHttpClient},
	oauth::TransportErrorMapper,
};

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

/// Subset of OpenID Provider metadata the broker relies on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
	/// Issuer identifier; must match the configured issuer.
	pub issuer: Url,
	/// Browser-facing authorization endpoint.
	pub authorization_endpoint: Url,
	/// Back-channel token endpoint.
	pub token_endpoint: Url,
	/// RP-initiated logout endpoint, when the provider supports it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_session_endpoint: Option<Url>,
	/// UserInfo endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub userinfo_endpoint: Option<Url>,
	/// JWK Set location.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jwks_uri: Option<Url>,
	/// PKCE methods advertised by the provider.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub code_challenge_methods_supported: Vec<String>,
}
impl DiscoveryDocument {
	/// Parses a metadata body, reporting the failing JSON path on error.
	pub fn from_slice(body: &[u8]) -> Result<Self, DiscoveryError> {
		let mut deserializer = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| DiscoveryError::MalformedDocument { source })
	}

	/// Checks that the advertised issuer is the configured one (trailing slashes ignored).
	pub fn validate_issuer(&self, expected: &Url) -> Result<(), DiscoveryError> {
		if issuers_match(expected, &self.issuer) {
			Ok(())
		} else {
			Err(DiscoveryError::IssuerMismatch {
				expected: expected.to_string(),
				found: self.issuer.to_string(),
			})
		}
	}
}

/// Memoized [`DiscoveryDocument`] shared by every clone of a broker.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
	document: RwLock<Option<Arc<DiscoveryDocument>>>,
}
impl DiscoveryCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the memoized document without fetching.
	pub fn cached(&self) -> Option<Arc<DiscoveryDocument>> {
		self.document.read().clone()
	}

	/// Installs `document`, replacing whatever was cached.
	pub fn store(&self, document: DiscoveryDocument) -> Arc<DiscoveryDocument> {
		let document = Arc::new(document);

		*self.document.write() = Some(Arc::clone(&document));

		document
	}

	/// Forgets the memoized document so the next lookup fetches again.
	pub fn clear(&self) {
		*self.document.write() = None;
	}

	/// Returns the cached document or fetches, validates, and memoizes it.
	pub async fn get_or_fetch<C, M>(
		&self,
		issuer: &Url,
		http_client: &C,
		mapper: &M,
	) -> Result<Arc<DiscoveryDocument>>
	where
		C: ?Sized + ProviderHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		if let Some(document) = self.cached() {
			return Ok(document);
		}

		let document = fetch_discovery_document(issuer, http_client, mapper).await?;

		Ok(self.store(document))
	}
}

/// `{issuer}/.well-known/openid-configuration`, keeping any issuer path prefix.
pub fn discovery_url(issuer: &Url) -> Result<Url, ConfigError> {
	let base = issuer.as_str().trim_end_matches('/');

	Url::parse(&format!("{base}/{WELL_KNOWN_PATH}"))
		.map_err(|source| ConfigError::InvalidUrl { name: crate::config::ENV_ISSUER, source })
}

/// Fetches and validates provider metadata without touching any cache.
pub async fn fetch_discovery_document<C, M>(
	issuer: &Url,
	http_client: &C,
	mapper: &M,
) -> Result<DiscoveryDocument>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let url = discovery_url(issuer)?;
	let request: HttpRequest = oauth2::http::Request::builder()
		.method(Method::GET)
		.uri(url.as_str())
		.header(ACCEPT, "application/json")
		.body(Vec::new())
		.map_err(ConfigError::from)?;
	let response = http::execute(http_client, mapper, Endpoint::Discovery, request).await?;
	let status = response.status();

	if !status.is_success() {
		return Err(DiscoveryError::Status { url: url.to_string(), status: status.as_u16() }.into());
	}

	let document = DiscoveryDocument::from_slice(response.body())?;

	document.validate_issuer(issuer)?;

	Ok(document)
}

fn issuers_match(expected: &Url, found: &Url) -> bool {
	expected.as_str().trim_end_matches('/') == found.as_str().trim_end_matches('/')
}
