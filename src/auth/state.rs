//! PKCE verifier/state generation and the single-use auth state persisted between login start
//! and the provider callback.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ValidationError};

// 32 bytes encode to 43 base64url characters, the RFC 7636 minimum verifier length.
const PKCE_VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 32;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Authorization Code + PKCE handshake state sealed into the auth-state cookie.
///
/// The verifier is wrapped in [`TokenSecret`] so it never shows up in logs; it only travels
/// inside the encrypted cookie and the back-channel token request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
	/// PKCE code verifier.
	pub code_verifier: TokenSecret,
	/// Anti-CSRF state that must round-trip via the redirect.
	pub state: String,
	/// Same-origin path to land on after the callback completes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub return_to: Option<String>,
}
impl AuthState {
	/// Generates a fresh verifier and an independent state value.
	pub fn generate() -> Self {
		Self {
			code_verifier: TokenSecret::new(random_token::<PKCE_VERIFIER_BYTES>()),
			state: random_token::<STATE_BYTES>(),
			return_to: None,
		}
	}

	/// Attaches a post-login destination after checking it stays on this origin.
	pub fn with_return_to(mut self, return_to: impl Into<String>) -> Result<Self, ValidationError> {
		let return_to = return_to.into();

		if !is_local_path(&return_to) {
			return Err(ValidationError::InvalidReturnTo);
		}

		self.return_to = Some(return_to);

		Ok(self)
	}

	/// S256 challenge derived from the verifier.
	pub fn code_challenge(&self) -> String {
		calculate_code_challenge(self.code_verifier.expose())
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		PkceCodeChallengeMethod::S256
	}

	/// Validates the `state` returned by the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<(), ValidationError> {
		if constant_time_eq(self.state.as_bytes(), returned_state.as_bytes()) {
			Ok(())
		} else {
			Err(ValidationError::StateMismatch)
		}
	}
}
impl Debug for AuthState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthState")
			.field("code_verifier", &self.code_verifier)
			.field("state", &self.state)
			.field("return_to", &self.return_to)
			.finish()
	}
}

/// Base64url (no padding) SHA-256 digest of `code_verifier`.
pub fn calculate_code_challenge(code_verifier: &str) -> String {
	let digest = Sha256::digest(code_verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}

/// Returns `true` for absolute paths on the current origin (`/dashboard`), rejecting
/// scheme-relative (`//evil.example`) and backslash tricks.
pub fn is_local_path(path: &str) -> bool {
	path.starts_with('/')
		&& !path.starts_with("//")
		&& !path.starts_with("/\\")
		&& !path.chars().any(char::is_control)
}

fn random_token<const N: usize>() -> String {
	let bytes: [u8; N] = rand::rng().random();

	URL_SAFE_NO_PAD.encode(bytes)
}

fn constant_time_eq(lhs: &[u8], rhs: &[u8]) -> bool {
	if lhs.len() != rhs.len() {
		return false;
	}

	lhs.iter().zip(rhs).fold(0_u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashSet;
	// self
	use super::*;

	#[test]
	fn generated_values_are_url_safe_and_long_enough() {
		let auth_state = AuthState::generate();
		let verifier = auth_state.code_verifier.expose();

		assert!(verifier.len() >= 43);
		assert!(verifier.len() <= 128);
		assert!(
			verifier.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
			"Verifier must only use the unreserved alphabet."
		);
		assert_eq!(auth_state.state.len(), 43);
		assert_ne!(auth_state.state, verifier);
	}

	#[test]
	fn generated_values_never_repeat() {
		let mut states = HashSet::new();
		let mut verifiers = HashSet::new();

		for _ in 0..1_000 {
			let auth_state = AuthState::generate();

			assert!(states.insert(auth_state.state.clone()));
			assert!(verifiers.insert(auth_state.code_verifier.expose().to_owned()));
		}
	}

	#[test]
	fn challenge_matches_rfc_7636_vector() {
		assert_eq!(
			calculate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);

		let auth_state = AuthState::generate();

		assert_eq!(auth_state.code_challenge(), auth_state.code_challenge());
		assert_eq!(auth_state.code_challenge_method().as_str(), "S256");
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let auth_state = AuthState::generate();

		assert!(auth_state.validate_state(&auth_state.state.clone()).is_ok());
		assert_eq!(auth_state.validate_state("other"), Err(ValidationError::StateMismatch));
		assert_eq!(auth_state.validate_state(""), Err(ValidationError::StateMismatch));
	}

	#[test]
	fn return_to_must_stay_on_origin() {
		assert!(AuthState::generate().with_return_to("/dashboard?tab=1").is_ok());

		for target in ["https://evil.example", "//evil.example", "/\\evil.example", "dash", ""] {
			assert_eq!(
				AuthState::generate().with_return_to(target).err(),
				Some(ValidationError::InvalidReturnTo),
				"{target} should be rejected."
			);
		}
	}

	#[test]
	fn debug_output_redacts_verifier() {
		let auth_state = AuthState::generate();
		let rendered = format!("{auth_state:?}");

		assert!(!rendered.contains(auth_state.code_verifier.expose()));
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn serializes_with_camel_case_and_omits_missing_return_to() {
		let auth_state = AuthState {
			code_verifier: TokenSecret::new("verifier"),
			state: "state".into(),
			return_to: None,
		};
		let json = serde_json::to_value(&auth_state).expect("Auth state should serialize.");

		assert_eq!(json, serde_json::json!({ "codeVerifier": "verifier", "state": "state" }));
	}
}
