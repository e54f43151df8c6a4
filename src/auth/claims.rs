//! ID-token claim extraction.
//!
//! The payload segment is decoded without verifying the JWS signature. Claims are only ever read
//! from ID tokens the broker received itself, straight from the provider's token endpoint over the
//! back channel, and are used for display and session presence. Anything that makes
//! authorization decisions from these claims must verify the signature first.

// crates.io
use base64::Engine as _;
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, codec::BASE64URL_LENIENT};

/// Claims decoded from an ID token payload.
///
/// `sub` is required; `name` and `email` are lifted out when they are strings, and every other
/// claim is carried through untouched in [`extra`](Self::extra).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Subject identifier.
	pub sub: String,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Email address.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Remaining claims (`iss`, `aud`, `exp`, custom claims, ...).
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl IdTokenClaims {
	/// Looks up a passthrough claim by name.
	pub fn get(&self, claim: &str) -> Option<&Value> {
		self.extra.get(claim)
	}
}

/// Decodes the payload of a three-segment compact JWT.
///
/// Returns `None` for anything that is not `header.payload.signature` with a base64url JSON object
/// payload carrying a string `sub`.
pub fn parse_id_token_claims(id_token: &str) -> Option<IdTokenClaims> {
	let mut segments = id_token.split('.');
	let (Some(_), Some(payload), Some(_), None) =
		(segments.next(), segments.next(), segments.next(), segments.next())
	else {
		return None;
	};
	let bytes = BASE64URL_LENIENT.decode(payload).ok()?;
	let mut claims = serde_json::from_slice::<Map<String, Value>>(&bytes).ok()?;
	let sub = match claims.remove("sub")? {
		Value::String(sub) => sub,
		_ => return None,
	};
	let name = take_string(&mut claims, "name");
	let email = take_string(&mut claims, "email");

	Some(IdTokenClaims { sub, name, email, extra: claims })
}

fn take_string(claims: &mut Map<String, Value>, key: &str) -> Option<String> {
	if !matches!(claims.get(key), Some(Value::String(_))) {
		return None;
	}

	match claims.remove(key) {
		Some(Value::String(value)) => Some(value),
		_ => None,
	}
}
