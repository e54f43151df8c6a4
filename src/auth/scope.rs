//! Scopes requested at the authorization endpoint.

// self
use crate::_prelude::*;

/// Scopes requested when the configuration does not name any.
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Rejected scope entries.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Ordered, deduplicated scope list.
///
/// Order is kept as configured so the `scope` parameter reads `openid profile email`; a repeated
/// scope keeps its first position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet(Vec<String>);
impl ScopeSet {
	/// Validates and deduplicates `scopes`.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = Self::default();

		for scope in scopes {
			let scope = scope.into();

			if scope.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if scope.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope });
			}
			if !set.contains(&scope) {
				set.0.push(scope);
			}
		}

		Ok(set)
	}

	/// `openid profile email`.
	pub fn openid_default() -> Self {
		Self(DEFAULT_SCOPES.map(String::from).to_vec())
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// `true` when no scope is configured.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// `true` when `scope` is part of the list.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.iter().any(|candidate| candidate == scope)
	}

	/// Scopes in configured order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-delimited wire form.
	pub fn joined(&self) -> String {
		self.0.join(" ")
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.joined())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	/// Splits on any run of whitespace; blank input yields an empty list.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s.split_whitespace())
	}
}
