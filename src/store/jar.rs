//! Request-scoped, in-process [`CookieTransport`] for route adapters and tests.

// self
use crate::{
	_prelude::*,
	store::{CookieTransport, SetCookie},
};

#[derive(Debug, Default)]
struct JarState {
	cookies: BTreeMap<String, String>,
	pending: Vec<SetCookie>,
}

/// Cookie jar seeded from an inbound `Cookie` header.
///
/// Writes are queued as [`SetCookie`] directives and applied to the jar immediately, so later
/// reads in the same request see them. Paths are recorded on the directives but not used to
/// filter reads.
#[derive(Debug, Default)]
pub struct CookieJar(Mutex<JarState>);
impl CookieJar {
	/// Creates an empty jar.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a `Cookie` request header (`a=1; b=2`). Malformed pairs are skipped and the first
	/// occurrence of a name wins.
	pub fn from_cookie_header(header: &str) -> Self {
		let mut cookies = BTreeMap::new();

		for pair in header.split(';') {
			let Some((name, value)) = pair.split_once('=') else {
				continue;
			};
			let name = name.trim();

			if name.is_empty() {
				continue;
			}

			cookies.entry(name.to_owned()).or_insert_with(|| value.trim().to_owned());
		}

		Self(Mutex::new(JarState { cookies, pending: Vec::new() }))
	}

	/// Directives queued so far, one per cookie name and path, in first-write order.
	pub fn set_cookies(&self) -> Vec<SetCookie> {
		self.0.lock().pending.clone()
	}

	/// Rendered `Set-Cookie` header values.
	pub fn set_cookie_headers(&self) -> Vec<String> {
		self.0.lock().pending.iter().map(SetCookie::to_header_value).collect()
	}

	/// `Cookie` header a browser would send after applying every directive, or `None` when the
	/// jar is empty.
	pub fn cookie_header(&self) -> Option<String> {
		let state = self.0.lock();

		if state.cookies.is_empty() {
			return None;
		}

		let rendered = state
			.cookies
			.iter()
			.map(|(name, value)| format!("{name}={value}"))
			.collect::<Vec<_>>()
			.join("; ");

		Some(rendered)
	}
}
impl CookieTransport for CookieJar {
	fn get(&self, name: &str) -> Option<String> {
		self.0.lock().cookies.get(name).cloned()
	}

	fn set(&self, cookie: SetCookie) {
		let mut guard = self.0.lock();
		let state = &mut *guard;

		if cookie.is_removal() {
			state.cookies.remove(&cookie.name);
		} else {
			state.cookies.insert(cookie.name.clone(), cookie.value.clone());
		}

		match state
			.pending
			.iter_mut()
			.find(|queued| queued.name == cookie.name && queued.path == cookie.path)
		{
			Some(queued) => *queued = cookie,
			None => state.pending.push(cookie),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_cookie_headers_leniently() {
		let jar = CookieJar::from_cookie_header(" at=one ; broken; =nameless; at=two;rt=x=y");

		assert_eq!(jar.get("at").as_deref(), Some("one"));
		assert_eq!(jar.get("rt").as_deref(), Some("x=y"));
		assert!(jar.get("broken").is_none());
		assert_eq!(jar.cookie_header().as_deref(), Some("at=one; rt=x=y"));
	}

	#[test]
	fn reads_observe_writes_and_rewrites_replace_directives() {
		let jar = CookieJar::from_cookie_header("auth_state=old");

		jar.set(SetCookie::new("auth_state", "new", "/", Duration::minutes(10), false));

		assert_eq!(jar.get("auth_state").as_deref(), Some("new"));

		jar.remove("auth_state", "/", false);

		assert!(jar.get("auth_state").is_none());
		assert!(jar.cookie_header().is_none());

		let headers = jar.set_cookie_headers();

		assert_eq!(headers.len(), 1);
		assert!(headers[0].starts_with("auth_state=; Path=/; Max-Age=0"));
	}

	#[test]
	fn same_name_on_different_paths_keeps_both_directives() {
		let jar = CookieJar::new();

		jar.remove("rt", "/api/auth", true);
		jar.remove("rt", "/", true);

		assert_eq!(jar.set_cookies().len(), 2);
	}
}
