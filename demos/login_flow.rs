//! Drives a complete login against a real provider from the terminal.
//!
//! Reads the broker settings from the environment, prints the authorization URL, then waits for
//! the full callback URL the provider redirected to (copy it from the browser's address bar).

// std
use std::io::{self, BufRead, Write};
// crates.io
use color_eyre::{Result, eyre::eyre};
use url::Url;
// self
use oauth2_bff::{
	config::BrokerConfig,
	flows::{Broker, LoginEndRequest, Reply},
	obs::FlowKind,
	store::CookieJar,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let broker = Broker::new(BrokerConfig::from_env()?)?;
	let start_jar = CookieJar::new();
	let start = broker.start_login(&start_jar, Some("/")).await?;

	for header in start_jar.set_cookie_headers() {
		println!("Set-Cookie: {header}");
	}

	println!("Open {} and sign in.", start.authorization_url);
	print!("Paste the callback URL: ");
	io::stdout().flush()?;

	let mut line = String::new();

	io::stdin().lock().read_line(&mut line)?;

	let callback = Url::parse(line.trim())?;
	let mut request = LoginEndRequest::default();

	for (key, value) in callback.query_pairs() {
		match key.as_ref() {
			"code" => request.code = Some(value.into_owned()),
			"state" => request.state = Some(value.into_owned()),
			"iss" => request.iss = Some(value.into_owned()),
			_ => (),
		}
	}

	let callback_jar = CookieJar::from_cookie_header(
		&start_jar.cookie_header().ok_or_else(|| eyre!("Login start wrote no cookies."))?,
	);
	let result = broker.end_login(&callback_jar, &request).await;
	let reply = Reply::from_result(FlowKind::LoginEnd, &result);

	println!("{} {}", reply.status, reply.body);

	for header in callback_jar.set_cookie_headers() {
		println!("Set-Cookie: {header}");
	}

	let browser = CookieJar::from_cookie_header(&callback_jar.cookie_header().unwrap_or_default());

	println!("Session: {}", Reply::ok(&broker.session(&browser)).body);

	let logout = broker.logout(&browser).await;

	match logout.logout_url {
		Some(url) => println!("Sign out at {url}."),
		None => println!("Provider has no end-session endpoint."),
	}

	Ok(())
}
