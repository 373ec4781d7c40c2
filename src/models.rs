use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Opaque record identifier (UUID v4 text).
pub type Id = String;

/// Milliseconds since the Unix epoch, as persisted by the admin panel.
pub type Millis = i64;

pub fn now_millis() -> Millis {
    Utc::now().timestamp_millis()
}

pub fn new_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NewsStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: Id,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub image: Option<String>, // data URI
    pub status: NewsStatus,
    pub created_at: Millis,
    pub updated_at: Millis,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewNewsArticle {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub status: Option<NewsStatus>,
}

/// Partial update; absent fields are left untouched. `image: ""` clears the image.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateNewsArticle {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub status: Option<NewsStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewsStats {
    pub total: usize,
    pub published: usize,
    pub draft: usize,
}

/// Export wrapper persisted next to the news list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsExport {
    pub news: Vec<NewsArticle>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Draft,
    Published,
}

impl StatusFilter {
    pub fn matches(self, status: NewsStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Draft => status == NewsStatus::Draft,
            StatusFilter::Published => status == NewsStatus::Published,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NewsQuery {
    /// Case-insensitive match against title and excerpt
    pub search: Option<String>,
    pub status: Option<StatusFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: Id,
    pub name: String,
    pub size: u64, // original upload size, not the size of `data`
    #[serde(rename = "type")]
    pub mime: String,
    pub data: String, // data URI of the resized JPEG
    pub uploaded_at: Millis,
}

/// One file handed to the media repository.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Persisted admin session. Holds the shared secret, so it is never sent
/// back over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub login_time: Millis,
    pub expires_in: Millis,
}

impl AuthSession {
    pub fn expires_at(&self) -> Millis {
        self.login_time.saturating_add(self.expires_in)
    }

    /// Sessions stamped in the future or with a negative lifetime count as
    /// expired, so a tampered record never authenticates.
    pub fn is_expired(&self, now: Millis) -> bool {
        self.expires_in < 0 || self.login_time > now || now.saturating_sub(self.login_time) > self.expires_in
    }
}
