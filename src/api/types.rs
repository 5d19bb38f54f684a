//! Response shapes returned by the social API

use crate::storage::{PostRecord, ProfileRecord};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

/// Base URL used to build public profile links
const PROFILE_URL_BASE: &str = "https://www.instagram.com";

/// Accepts an identifier encoded either as a JSON string or a JSON number
pub(crate) fn id_from_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or numeric id, got {}",
            other
        ))),
    }
}

/// Account profile as returned by the profile lookup endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "id_from_value")]
    pub pk: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub biography: Option<String>,

    #[serde(default)]
    pub follower_count: Option<i64>,

    #[serde(default)]
    pub following_count: Option<i64>,

    #[serde(default)]
    pub profile_pic_url: Option<String>,

    #[serde(default)]
    pub profile_pic_url_hd: Option<String>,
}

impl Profile {
    /// Best available avatar URL
    pub fn avatar_url(&self) -> Option<&str> {
        self.profile_pic_url_hd
            .as_deref()
            .or(self.profile_pic_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Converts the profile to a store row for the given handle
    ///
    /// The stored handle is the one the account was ingested under, not the
    /// username echoed by the API, so lookups by handle stay stable.
    pub fn to_record(&self, handle: &str) -> ProfileRecord {
        ProfileRecord {
            handle: handle.to_string(),
            account_id: self.pk.clone(),
            full_name: self.full_name.clone(),
            biography: self.biography.clone(),
            follower_count: self.follower_count.unwrap_or(0),
            following_count: self.following_count.unwrap_or(0),
            profile_pic_url: self.avatar_url().map(str::to_string),
            profile_url: format!("{}/{}/", PROFILE_URL_BASE, handle),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Caption {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaVersion {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ImageVersions {
    #[serde(default)]
    pub candidates: Vec<MediaVersion>,
}

/// One short-video post from a clips page
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClipMedia {
    #[serde(deserialize_with = "id_from_value")]
    pub pk: String,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub caption: Option<Caption>,

    #[serde(default)]
    pub taken_at: Option<i64>,

    #[serde(default)]
    pub play_count: Option<i64>,

    #[serde(default)]
    pub like_count: Option<i64>,

    #[serde(default)]
    pub comment_count: Option<i64>,

    #[serde(default)]
    pub video_url: Option<String>,

    #[serde(default)]
    pub thumbnail_url: Option<String>,

    #[serde(default)]
    pub video_versions: Vec<MediaVersion>,

    #[serde(default)]
    pub image_versions2: Option<ImageVersions>,
}

impl ClipMedia {
    /// Direct video URL, falling back to the first listed version
    pub fn media_url(&self) -> Option<String> {
        self.video_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| self.video_versions.first().map(|v| v.url.clone()))
    }

    /// Thumbnail URL, falling back to the first image candidate
    pub fn thumbnail(&self) -> Option<String> {
        self.thumbnail_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| {
                self.image_versions2
                    .as_ref()
                    .and_then(|versions| versions.candidates.first())
                    .map(|c| c.url.clone())
            })
    }

    /// Converts the clip to a pending post row owned by `owner_id`
    pub fn to_record(&self, owner_id: &str) -> PostRecord {
        PostRecord {
            id: self.pk.clone(),
            owner_id: owner_id.to_string(),
            code: self.code.clone(),
            caption: self.caption.as_ref().and_then(|c| c.text.clone()),
            taken_at: self.taken_at,
            play_count: self.play_count.unwrap_or(0),
            like_count: self.like_count.unwrap_or(0),
            comment_count: self.comment_count.unwrap_or(0),
            video_url: self.media_url(),
            thumbnail_url: self.thumbnail(),
            downloaded: false,
            unavailable: false,
        }
    }
}

/// One entry of a following page
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FollowedUser {
    #[serde(deserialize_with = "id_from_value")]
    pub pk: String,

    #[serde(default)]
    pub username: Option<String>,
}
