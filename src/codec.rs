//! Sealed cookie codec.
//!
//! Payloads are JSON objects encrypted into a compact JWE: `dir` key management (the configured
//! 256-bit key is the content-encryption key) and `A256GCM` content encryption, serialized as
//! `header.encrypted_key.iv.ciphertext.tag` with an empty encrypted key. The base64url protected
//! header is bound as AEAD associated data. Every sealed payload carries `iat` and a 7-day `exp`
//! claim, checked on open in addition to the cookie's own `Max-Age`.
//!
//! Opening never fails loudly. Malformed structure, foreign headers, a wrong key, a bad tag,
//! expiry, or a payload of the wrong shape all come back as `None`, which callers treat as "no
//! session".

// crates.io
use aes_gcm::{
	Aes256Gcm, Key, KeyInit, Nonce,
	aead::{Aead, Payload},
};
use base64::{
	Engine as _, alphabet,
	engine::{
		DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::URL_SAFE_NO_PAD,
	},
};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::ConfigError};

/// Absolute lifetime embedded in every sealed payload.
pub const SEALED_TTL: Duration = Duration::days(7);

/// Base64url decoder that tolerates both padded and unpadded input.
pub(crate) const BASE64URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const PROTECTED_HEADER: &str = r#"{"alg":"dir","enc":"A256GCM"}"#;
const RESERVED_CLAIMS: [&str; 2] = ["iat", "exp"];

/// Failures while sealing a payload. Opening reports every failure as `None`.
#[derive(Debug, ThisError)]
pub enum CodecError {
	/// Payload serialized to something other than a JSON object.
	#[error("Cookie payload must serialize to a JSON object.")]
	PayloadNotObject,
	/// Payload collides with a claim the codec manages itself.
	#[error("Cookie payload uses the reserved `{claim}` claim.")]
	ReservedClaim {
		/// Offending claim name.
		claim: &'static str,
	},
	/// Payload could not be serialized.
	#[error("Cookie payload could not be serialized.")]
	Serialize(#[from] serde_json::Error),
	/// AES-GCM refused to encrypt (plaintext too large).
	#[error("Cookie payload could not be encrypted.")]
	Encrypt,
}

/// 256-bit cookie encryption key.
///
/// Generate once per deployment ([`CookieKey::generate`]) and supply it out of band; a new key
/// invalidates every outstanding session cookie.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieKey([u8; KEY_LEN]);
impl CookieKey {
	/// Draws a fresh key from the thread-local CSPRNG.
	pub fn generate() -> Self {
		Self(rand::rng().random())
	}

	/// Wraps raw key bytes.
	pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
		Self(bytes)
	}

	/// Decodes a base64url key (padding optional) that must hold exactly 32 bytes.
	pub fn from_base64url(encoded: &str) -> Result<Self, ConfigError> {
		let bytes = BASE64URL_LENIENT
			.decode(encoded.trim())
			.map_err(|e| ConfigError::InvalidCookieKey { reason: e.to_string() })?;
		let key = <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
			ConfigError::InvalidCookieKey {
				reason: format!("expected {KEY_LEN} bytes, got {}", bytes.len()),
			}
		})?;

		Ok(Self(key))
	}

	/// Unpadded base64url encoding of the key.
	pub fn to_base64url(&self) -> String {
		URL_SAFE_NO_PAD.encode(self.0)
	}
}
impl FromStr for CookieKey {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_base64url(s)
	}
}
impl Debug for CookieKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("CookieKey").field(&"<redacted>").finish()
	}
}

/// Generates a new base64url-encoded cookie key, suitable for `COOKIE_ENCRYPTION_KEY`.
pub fn generate_key() -> String {
	CookieKey::generate().to_base64url()
}

/// Seals and opens cookie payloads with a single [`CookieKey`].
#[derive(Clone)]
pub struct CookieCodec {
	cipher: Aes256Gcm,
}
impl CookieCodec {
	/// Creates a codec for `key`.
	pub fn new(key: &CookieKey) -> Self {
		Self { cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0)) }
	}

	/// Seals `payload` with `iat = now` and `exp = now + 7 days`.
	///
	/// `iat` and `exp` belong to the codec: a payload carrying either top-level key is refused
	/// with [`CodecError::ReservedClaim`] rather than overwritten, so every payload that seals
	/// opens back to the same value.
	pub fn encrypt<T>(&self, payload: &T) -> Result<String, CodecError>
	where
		T: ?Sized + Serialize,
	{
		self.encrypt_at(payload, OffsetDateTime::now_utc())
	}

	/// Seals `payload` using `now` as the issued-at instant.
	pub fn encrypt_at<T>(&self, payload: &T, now: OffsetDateTime) -> Result<String, CodecError>
	where
		T: ?Sized + Serialize,
	{
		let mut claims = match serde_json::to_value(payload)? {
			Value::Object(claims) => claims,
			_ => return Err(CodecError::PayloadNotObject),
		};

		if let Some(claim) = RESERVED_CLAIMS.into_iter().find(|claim| claims.contains_key(*claim)) {
			return Err(CodecError::ReservedClaim { claim });
		}

		claims.insert("iat".into(), now.unix_timestamp().into());
		claims.insert("exp".into(), (now + SEALED_TTL).unix_timestamp().into());

		let plaintext = serde_json::to_vec(&claims)?;
		let header = URL_SAFE_NO_PAD.encode(PROTECTED_HEADER);
		let iv: [u8; IV_LEN] = rand::rng().random();
		let mut ciphertext = self
			.cipher
			.encrypt(Nonce::from_slice(&iv), Payload { msg: &plaintext, aad: header.as_bytes() })
			.map_err(|_| CodecError::Encrypt)?;
		let tag = ciphertext.split_off(ciphertext.len() - TAG_LEN);

		Ok(format!(
			"{header}..{}.{}.{}",
			URL_SAFE_NO_PAD.encode(iv),
			URL_SAFE_NO_PAD.encode(&ciphertext),
			URL_SAFE_NO_PAD.encode(&tag)
		))
	}

	/// Opens a sealed payload, returning `None` on any failure.
	pub fn decrypt<T>(&self, token: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		self.decrypt_at(token, OffsetDateTime::now_utc())
	}

	/// Opens a sealed payload, evaluating `exp` against `now`.
	pub fn decrypt_at<T>(&self, token: &str, now: OffsetDateTime) -> Option<T>
	where
		T: DeserializeOwned,
	{
		let mut claims = self.open(token)?;
		let exp = claims.get("exp").and_then(Value::as_i64)?;

		if exp <= now.unix_timestamp() {
			return None;
		}

		for claim in RESERVED_CLAIMS {
			claims.remove(claim);
		}

		serde_json::from_value(Value::Object(claims)).ok()
	}

	fn open(&self, token: &str) -> Option<Map<String, Value>> {
		let mut parts = token.split('.');
		let (Some(header), Some(encrypted_key), Some(iv), Some(ciphertext), Some(tag), None) = (
			parts.next(),
			parts.next(),
			parts.next(),
			parts.next(),
			parts.next(),
			parts.next(),
		) else {
			return None;
		};

		if !encrypted_key.is_empty() || !header_is_supported(header) {
			return None;
		}

		let iv = URL_SAFE_NO_PAD.decode(iv).ok().filter(|iv| iv.len() == IV_LEN)?;
		let tag = URL_SAFE_NO_PAD.decode(tag).ok().filter(|tag| tag.len() == TAG_LEN)?;
		let mut sealed = URL_SAFE_NO_PAD.decode(ciphertext).ok()?;

		sealed.extend_from_slice(&tag);

		let plaintext = self
			.cipher
			.decrypt(Nonce::from_slice(&iv), Payload { msg: &sealed, aad: header.as_bytes() })
			.ok()?;

		serde_json::from_slice(&plaintext).ok()
	}
}
impl Debug for CookieCodec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CookieCodec(..)")
	}
}

fn header_is_supported(encoded: &str) -> bool {
	let Some(header) = URL_SAFE_NO_PAD
		.decode(encoded)
		.ok()
		.and_then(|bytes| serde_json::from_slice::<Map<String, Value>>(&bytes).ok())
	else {
		return false;
	};

	header.get("alg").and_then(Value::as_str) == Some("dir")
		&& header.get("enc").and_then(Value::as_str) == Some("A256GCM")
		&& !header.contains_key("zip")
		&& !header.contains_key("crit")
}
