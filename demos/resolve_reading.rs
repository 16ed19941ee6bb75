//! Restores a persisted credential record, writes the rotated record back, and resolves the
//! user's reading of a book.
//!
//! ```text
//! cargo run --example resolve_reading -- credential.json
//! ```

// std
use std::{env, fs};
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use reading_sdk::{
	config::ApiConfiguration,
	flows::{BookQuery, ReqwestAuthenticator, Resolution},
	model::{AvatarSize, ReadingState},
	store::{self, CredentialRecord},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let path = env::args().nth(1).ok_or_else(|| eyre!("usage: resolve_reading <record.json>"))?;
	let record: CredentialRecord = serde_json::from_str(&fs::read_to_string(&path)?)?;
	let authenticator =
		ReqwestAuthenticator::new(ApiConfiguration::production("demo-client")?.build()?);
	let user = match authenticator.authenticate_from_persisted_credential(&record).await {
		Ok(user) => user,
		Err(e) => {
			// Rotated but unverified: keep the new pair so the next run can retry.
			if let Some(issued) = e.issued_credential() {
				fs::write(&path, serde_json::to_string_pretty(&store::serialize(issued))?)?;
			}

			return Err(e.into());
		},
	};

	// The stored refresh token is spent now; only the rotated record can sign in again.
	fs::write(&path, serde_json::to_string_pretty(&user.credential_record())?)?;

	if let Some(avatar) = user.avatar_url(AvatarSize::Small) {
		println!("Avatar: {avatar}");
	}

	let query = BookQuery::by_title("Dune", "Frank Herbert").identifier("9780441013593");
	let book = user
		.find_or_create_book(&query)
		.await?
		.into_inner()
		.ok_or_else(|| eyre!("find-or-create always resolves a book"))?;
	let reading = user.find_or_create_reading(&book, ReadingState::Reading, false, None).await?;

	match reading {
		Resolution::Created(reading) =>
			println!("Started reading {} ({}).", book.title, reading.state),
		Resolution::Found(reading) =>
			println!("Already {} {}; state left unchanged.", reading.state, book.title),
		Resolution::NotFound => println!("No reading for {}.", book.title),
	}

	Ok(())
}
