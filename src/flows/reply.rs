//! Framework-neutral HTTP replies for broker operations.

// crates.io
use serde_json::{Value, json};
// self
use crate::{_prelude::*, obs::FlowKind};

/// Status code and JSON body a route handler should send.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
	/// HTTP status code.
	pub status: u16,
	/// JSON body.
	pub body: Value,
}
impl Reply {
	/// `200` with `body`.
	pub fn ok<T>(body: &T) -> Self
	where
		T: Serialize,
	{
		match serde_json::to_value(body) {
			Ok(body) => Self { status: 200, body },
			Err(err) => Self::error(500, err.to_string()),
		}
	}

	/// `{"error": message}` with `status`.
	pub fn error(status: u16, message: impl Into<String>) -> Self {
		Self { status, body: json!({ "error": message.into() }) }
	}

	/// Maps an operation result onto the route contract.
	///
	/// Validation failures and provider rejections keep their status and message. Everything
	/// else becomes a `500` with a generic per-operation message.
	pub fn from_result<T>(kind: FlowKind, result: &Result<T>) -> Self
	where
		T: Serialize,
	{
		match result {
			Ok(body) => Self::ok(body),
			Err(err) if err.is_client_facing() => Self::error(err.status(), err.to_string()),
			Err(_) => Self::error(500, failure_message(kind)),
		}
	}

	/// `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Generic message for unexpected failures of `kind`.
pub fn failure_message(kind: FlowKind) -> &'static str {
	match kind {
		FlowKind::LoginStart => "Failed to start login",
		FlowKind::LoginEnd => "Failed to complete login",
		FlowKind::Refresh => "Failed to refresh tokens",
		FlowKind::Session => "Failed to load session",
		FlowKind::Logout => "Failed to log out",
	}
}
