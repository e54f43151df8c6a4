//! Prints a fresh cookie encryption key for `COOKIE_ENCRYPTION_KEY`.

// self
use oauth2_bff::codec;

fn main() {
	println!("{}", codec::generate_key());
}
