//! The authenticated user and their profile.

// self
use crate::{
	_prelude::*,
	api::Api,
	auth::{Credential, Session, TokenSecret, UserId, token::credential::whole_seconds},
	http::ApiHttpClient,
	oauth::TransportErrorMapper,
	store::{self, CredentialRecord},
};

/// Avatar renditions served by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarSize {
	/// Thumbnail rendition.
	Small,
	/// Default rendition.
	Medium,
	/// Between medium and large.
	MediumLarge,
	/// Largest rendition.
	Large,
}
impl AvatarSize {
	// Longest label first so `_medium_large` is not mistaken for `_large`.
	const ALL: [AvatarSize; 4] =
		[AvatarSize::MediumLarge, AvatarSize::Medium, AvatarSize::Small, AvatarSize::Large];

	/// Label used in avatar file names.
	pub const fn as_str(self) -> &'static str {
		match self {
			AvatarSize::Small => "small",
			AvatarSize::Medium => "medium",
			AvatarSize::MediumLarge => "medium_large",
			AvatarSize::Large => "large",
		}
	}
}

/// Flat profile fields returned by `GET /me`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Service identifier.
	pub id: UserId,
	/// Unique handle.
	#[serde(default)]
	pub username: String,
	/// Given name.
	#[serde(default, rename = "firstname")]
	pub first_name: Option<String>,
	/// Family name.
	#[serde(default, rename = "lastname")]
	pub last_name: Option<String>,
	/// Display name.
	#[serde(default, rename = "fullname")]
	pub full_name: Option<String>,
	/// Free-form biography.
	#[serde(default)]
	pub description: Option<String>,
	/// Home city.
	#[serde(default)]
	pub city: Option<String>,
	/// Home country.
	#[serde(default)]
	pub country: Option<String>,
	/// Personal website, as entered by the user.
	#[serde(default)]
	pub website: Option<String>,
	/// Public profile page.
	#[serde(default, rename = "permalink_url")]
	pub permalink: Option<Url>,
	/// Avatar image in the service's default size.
	#[serde(default)]
	pub avatar_url: Option<Url>,
	/// Token that signs the user in on the service's website.
	#[serde(default)]
	pub authentication_token: Option<String>,
	/// Number of followers.
	#[serde(default)]
	pub followers: u32,
	/// Number of users followed.
	#[serde(default)]
	pub followings: u32,
	/// Books marked interesting.
	#[serde(default, rename = "interesting")]
	pub books_interesting: u32,
	/// Books being read.
	#[serde(default, rename = "reading")]
	pub books_reading: u32,
	/// Books finished.
	#[serde(default, rename = "finished")]
	pub books_finished: u32,
	/// Books abandoned.
	#[serde(default, rename = "abandoned")]
	pub books_abandoned: u32,
}

/// `GET /me` body: the profile plus any token pair the service rotated while serving it.
#[derive(Debug, Deserialize)]
pub struct ProfileResponse {
	/// Profile fields.
	#[serde(flatten)]
	pub profile: UserProfile,
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}
impl ProfileResponse {
	/// Folds rotated tokens into `credential` and returns the profile.
	///
	/// Blank or absent tokens leave the current ones in place.
	pub(crate) fn rotate_into(self, credential: &mut Credential) -> UserProfile {
		if let Some(access) = self.access_token.map(TokenSecret::new).filter(|t| !t.is_blank()) {
			credential.access_token = access;
			credential.expires_at = self
				.expires_in
				.map(|secs| whole_seconds(OffsetDateTime::now_utc() + Duration::seconds(secs)));
		}
		if let Some(refresh) = self.refresh_token.map(TokenSecret::new).filter(|t| !t.is_blank()) {
			credential.refresh_token = Some(refresh);
		}

		self.profile
	}
}

/// A verified user: profile, live credential, and the service handle used for their requests.
///
/// Only verification produces a `User`, so every instance carries a credential the service
/// accepted. The credential rotates on every verification; persist
/// [`User::credential_record`] afterwards or the session is lost.
pub struct User<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	profile: UserProfile,
	credential: Credential,
	pub(crate) api: Arc<Api<C, M>>,
	pub(crate) session: Session,
	/// Avatar bytes, set by the host after downloading [`User::avatar_url`].
	pub avatar_image_data: Option<Vec<u8>>,
}
impl<C, M> User<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		api: Arc<Api<C, M>>,
		session: Session,
		profile: UserProfile,
		mut credential: Credential,
	) -> Self {
		credential.bind_user(profile.id);

		Self { profile, credential, api, session, avatar_image_data: None }
	}

	/// Service identifier.
	pub fn id(&self) -> UserId {
		self.profile.id
	}

	/// Current profile snapshot.
	pub fn profile(&self) -> &UserProfile {
		&self.profile
	}

	/// Live credential.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Persistable form of the live credential.
	pub fn credential_record(&self) -> CredentialRecord {
		store::serialize(&self.credential)
	}

	/// Consumes the user and returns the live credential.
	pub fn into_credential(self) -> Credential {
		self.credential
	}

	/// Session this user was authenticated in.
	pub fn session(&self) -> &Session {
		&self.session
	}

	/// Replaces the profile fields with a freshly fetched record.
	pub fn update_from_record(&mut self, profile: UserProfile) {
		self.credential.bind_user(profile.id);

		self.profile = profile;
	}

	/// Avatar URL rewritten to the requested rendition.
	///
	/// The service names avatar files `<stem>_<size>.<ext>`; any existing size suffix is
	/// replaced. Returns `None` when the profile has no avatar.
	pub fn avatar_url(&self, size: AvatarSize) -> Option<Url> {
		let avatar = self.profile.avatar_url.as_ref()?;

		resize_avatar(avatar, size)
	}

	pub(crate) fn credential_mut(&mut self) -> &mut Credential {
		&mut self.credential
	}
}
impl<C, M> Debug for User<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("User")
			.field("profile", &self.profile)
			.field("credential", &self.credential)
			.field("avatar_image_bytes", &self.avatar_image_data.as_ref().map(Vec::len))
			.finish()
	}
}

fn resize_avatar(avatar: &Url, size: AvatarSize) -> Option<Url> {
	let file = avatar.path_segments()?.next_back().filter(|name| !name.is_empty())?;
	let (stem, extension) = match file.rsplit_once('.') {
		Some((stem, extension)) => (stem, Some(extension)),
		None => (file, None),
	};
	let base = AvatarSize::ALL
		.iter()
		.find_map(|known| stem.strip_suffix(known.as_str())?.strip_suffix('_'))
		.unwrap_or(stem);
	let renamed = match extension {
		Some(extension) => format!("{base}_{}.{extension}", size.as_str()),
		None => format!("{base}_{}", size.as_str()),
	};
	let mut resized = avatar.clone();

	resized.path_segments_mut().ok()?.pop().push(&renamed);

	Some(resized)
}
