//! Broker-level error types shared across flows, the token client, and the cookie layer.
//!
//! Every variant maps onto an HTTP-style status through [`Error::status`]. Cookie decryption
//! failures never appear here; the codec folds them into "no session".

// self
use crate::{_prelude::*, oauth::GrantType};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Inbound request failed validation (missing parameters, state mismatch, etc.).
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Provider metadata could not be fetched or understood.
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),
	/// Token endpoint rejected or garbled a grant.
	#[error(transparent)]
	TokenExchange(#[from] TokenExchangeError),
	/// Cookie payload could not be sealed.
	#[error(transparent)]
	Codec(#[from] crate::codec::CodecError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl Error {
	/// HTTP-style status code a route layer should answer with.
	pub fn status(&self) -> u16 {
		match self {
			Self::Validation(err) => err.status(),
			Self::TokenExchange(err) => err.status(),
			Self::Config(_)
			| Self::Discovery(_)
			| Self::Codec(_)
			| Self::Transient(_)
			| Self::Transport(_) => 500,
		}
	}

	/// Returns `true` when the error message is safe to echo back to the browser verbatim.
	pub fn is_client_facing(&self) -> bool {
		matches!(
			self,
			Self::Validation(_) | Self::TokenExchange(TokenExchangeError::Provider { .. })
		)
	}
}

/// Configuration and validation failures raised while assembling the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required setting is absent or empty.
	#[error("{name} is required.")]
	MissingSetting {
		/// Setting (environment variable) name.
		name: &'static str,
	},
	/// A URL-valued setting cannot be parsed.
	#[error("{name} is not a valid URL.")]
	InvalidUrl {
		/// Setting name.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configured scopes cannot be normalized.
	#[error("Configured scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Cookie encryption key is not 32 bytes of base64url.
	#[error("Cookie encryption key must be 32 bytes encoded as base64url: {reason}.")]
	InvalidCookieKey {
		/// What was wrong with the supplied key.
		reason: String,
	},
	/// Cookie paths must be absolute.
	#[error("Cookie path `{path}` must start with `/`.")]
	InvalidCookiePath {
		/// Rejected path.
		path: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Inbound request validation failures.
///
/// Messages distinguish each failure for diagnosability but never include provider internals.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// Callback arrived without `code` or `state`.
	#[error("Missing code or state parameter")]
	MissingCodeOrState,
	/// No decryptable auth-state cookie accompanied the callback.
	#[error("No auth state found - session may have expired")]
	MissingAuthState,
	/// Returned `state` differs from the persisted one.
	#[error("State mismatch - possible CSRF attack")]
	StateMismatch,
	/// Refresh requested without a decryptable refresh cookie.
	#[error("No refresh token found")]
	MissingRefreshToken,
	/// Post-login destination is not a same-origin relative path.
	#[error("Invalid returnTo parameter")]
	InvalidReturnTo,
}
impl ValidationError {
	/// HTTP-style status code for the failure.
	pub fn status(&self) -> u16 {
		match self {
			Self::MissingRefreshToken => 401,
			_ => 400,
		}
	}
}

/// Discovery document failures. None of these outcomes are cached.
#[derive(Debug, ThisError)]
pub enum DiscoveryError {
	/// Discovery endpoint answered with a non-success status.
	#[error("Discovery endpoint {url} returned HTTP {status}.")]
	Status {
		/// Requested discovery URL.
		url: String,
		/// HTTP status code.
		status: u16,
	},
	/// Discovery body is not a valid provider metadata document.
	#[error("Discovery document is malformed.")]
	MalformedDocument {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Document names a different issuer than the one configured.
	#[error("Discovery document issuer `{found}` does not match the configured issuer `{expected}`.")]
	IssuerMismatch {
		/// Configured issuer.
		expected: String,
		/// Issuer advertised by the document.
		found: String,
	},
}

/// Token endpoint failures for the authorization-code and refresh grants.
#[derive(Debug, ThisError)]
pub enum TokenExchangeError {
	/// Provider answered with an OAuth `error` field.
	#[error(
		"Token {} failed: {error} - {}",
		.grant.action(),
		.description.as_deref().unwrap_or("no description")
	)]
	Provider {
		/// Grant that failed.
		grant: GrantType,
		/// OAuth error code (for example `invalid_grant`).
		error: String,
		/// Optional `error_description`.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint body could not be parsed as a token response.
	#[error("Token endpoint returned malformed JSON during {grant}.")]
	MalformedResponse {
		/// Grant that failed.
		grant: GrantType,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Response parsed but carried neither an error nor an access token.
	#[error("Token endpoint response for {grant} is missing access_token.")]
	MissingAccessToken {
		/// Grant that failed.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TokenExchangeError {
	/// Forwards the provider's 4xx status; everything else is a 500.
	pub fn status(&self) -> u16 {
		match self {
			Self::Provider { status: Some(code), .. } if (400..500).contains(code) => *code,
			_ => 500,
		}
	}

	/// OAuth error code supplied by the provider, if any.
	pub fn oauth_error(&self) -> Option<&str> {
		match self {
			Self::Provider { error, .. } => Some(error),
			_ => None,
		}
	}
}

/// Temporary failure variants.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider endpoint failed in a way that may succeed later.
	#[error("{endpoint} endpoint returned an unexpected response: {message}.")]
	Upstream {
		/// Endpoint that failed.
		endpoint: crate::http::Endpoint,
		/// Broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
