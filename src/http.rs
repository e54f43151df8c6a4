//! Transport primitives for identity-provider calls (discovery fetches and token grants).
//!
//! The module exposes [`ProviderHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can plug in custom HTTP clients
//! without losing the broker's error classification. Implementations call
//! [`ResponseMetadataSlot::take`] before dispatching a request and
//! [`ResponseMetadataSlot::store`] once an HTTP status is known, letting the
//! [`TransportErrorMapper`] classify failures with consistent metadata.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
// self
use crate::{_prelude::*, oauth::TransportErrorMapper};

/// Identity-provider endpoints the broker talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// `/.well-known/openid-configuration`.
	Discovery,
	/// Token endpoint for code and refresh grants.
	Token,
}
impl Endpoint {
	/// Returns a stable label suitable for messages and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Endpoint::Discovery => "discovery",
			Endpoint::Token => "token",
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Abstraction over HTTP transports capable of reaching the identity provider.
///
/// The trait is the broker's only dependency on an HTTP stack. Callers provide an
/// implementation (held behind `Arc<T>`) and the broker requests short-lived
/// [`AsyncHttpClient`] handles that each carry a clone of a [`ResponseMetadataSlot`].
/// Implementations must be `Send + Sync + 'static` so one transport can serve every
/// concurrent request, and the handles they return must own whatever state their
/// request futures need so those futures remain `Send`.
pub trait ProviderHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across calls.
	/// - Once an HTTP response provides a status, save it with [`ResponseMetadataSlot::store`].
	/// - Never retain the slot clone beyond the lifetime of the returned handle.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the provider, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Sends `request` through a fresh handle, mapping transport failures into broker errors.
pub(crate) async fn execute<C, M>(
	http_client: &C,
	mapper: &M,
	endpoint: Endpoint,
	request: HttpRequest,
) -> Result<HttpResponse>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let slot = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(slot.clone());

	match handle.call(request).await {
		Ok(response) => Ok(response),
		Err(err) => Err(mapper.map_transport_error(endpoint, slot.take().as_ref(), err)),
	}
}

/// Default transport: a shared [`ReqwestClient`].
///
/// Provider endpoints answer directly, so a caller-supplied client should have redirect
/// following disabled, as [`without_redirects`](Self::without_redirects) does.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that never follows redirects.
	pub fn without_redirects() -> Result<Self, crate::error::ConfigError> {
		let client =
			ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ProviderHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle { client: self.0.clone(), slot }
	}
}

/// Per-request [`AsyncHttpClient`] handed out by [`ReqwestHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response =
				self.client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();

			self.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let headers = response.headers().clone();
			let body = response.bytes().await.map_err(Box::new)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}
