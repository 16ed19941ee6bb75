//! Prints the authorize URL, then exchanges the callback URL passed as the first argument and
//! prints the credential record the host should persist.
//!
//! ```text
//! cargo run --example authorize -- 'app://auth?code=...'
//! ```

// std
use std::env;
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use reading_sdk::{config::ApiConfiguration, flows::ReqwestAuthenticator, url::Url};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let redirect = Url::parse("app://auth")?;
	let config = ApiConfiguration::production("demo-client")?
		.client_secret("demo-secret")
		.default_redirect(redirect.clone())
		.build()?;
	let authenticator = ReqwestAuthenticator::new(config);

	println!("Send your user to {}.", authenticator.authorization_url(None)?);

	let Some(callback) = env::args().nth(1) else {
		println!("Re-run with the callback URL to finish signing in.");

		return Ok(());
	};
	let user = authenticator
		.authenticate_callback(&Url::parse(&callback)?, &redirect)
		.await
		.map_err(|e| eyre!("sign-in failed: {e}"))?;

	println!("Signed in as {} ({}).", user.profile().username, user.id());
	println!("Persist this record: {}", serde_json::to_string_pretty(&user.credential_record())?);

	Ok(())
}
