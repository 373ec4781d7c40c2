use async_trait::async_trait;

use crate::imaging::MediaError;
use crate::models::*;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("{0}")] Validation(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait NewsRepo: Send + Sync {
    /// Newest first.
    async fn list_news(&self) -> Vec<NewsArticle>;
    async fn create_news(&self, new: NewNewsArticle) -> RepoResult<NewsArticle>;
    async fn update_news(&self, id: &str, upd: UpdateNewsArticle) -> RepoResult<NewsArticle>;
    async fn delete_news(&self, id: &str) -> RepoResult<()>;
    async fn get_news(&self, id: &str) -> RepoResult<NewsArticle>;
    async fn filter_news(&self, search: &str, status: StatusFilter) -> Vec<NewsArticle>;
    async fn news_stats(&self) -> NewsStats;
    async fn news_export(&self) -> Option<NewsExport>;
}

#[async_trait]
pub trait MediaRepo: Send + Sync {
    /// Newest first.
    async fn list_media(&self) -> Vec<MediaAsset>;
    async fn add_media(&self, upload: MediaUpload) -> Result<MediaAsset, MediaError>;
}

pub trait Repo: NewsRepo + MediaRepo {}

impl<T> Repo for T where T: NewsRepo + MediaRepo {}

/// Non-persistent view over `articles`: case-insensitive substring match on
/// title or excerpt, AND the status filter. An empty search matches all.
pub fn filter_articles<'a>(
    articles: &'a [NewsArticle],
    search: &str,
    status: StatusFilter,
) -> impl Iterator<Item = &'a NewsArticle> + 'a {
    let needle = search.trim().to_lowercase();
    articles.iter().filter(move |a| {
        let text_ok = needle.is_empty()
            || a.title.to_lowercase().contains(&needle)
            || a.excerpt.to_lowercase().contains(&needle);
        text_ok && status.matches(a.status)
    })
}

pub fn count_by_status(articles: &[NewsArticle]) -> NewsStats {
    articles.iter().fold(NewsStats { total: articles.len(), ..Default::default() }, |mut s, a| {
        match a.status {
            NewsStatus::Published => s.published += 1,
            NewsStatus::Draft => s.draft += 1,
        }
        s
    })
}

/// Repository over the key-value persistence layer. Lists are loaded once and
/// every mutation rewrites the full list.
pub mod local {
    use super::*;
    use crate::config::MediaConfig;
    use crate::imaging::{is_image_data_uri, resize_to_data_uri, validate_image};
    use crate::sanitize::clean_text;
    use crate::storage::{StorageKeys, StorageManager};
    use log::{info, warn};
    use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

    #[derive(Clone)]
    pub struct LocalRepo {
        news: Arc<RwLock<Vec<NewsArticle>>>,
        media: Arc<RwLock<Vec<MediaAsset>>>,
        storage: StorageManager,
        media_cfg: Arc<MediaConfig>,
    }

    // a panic while holding the lock cannot leave a half-written Vec behind
    fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
        lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
        lock.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn required_text(field: &str, value: &str) -> RepoResult<String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RepoError::Validation(format!("{field} is required")));
        }
        Ok(clean_text(value))
    }

    /// `None` and blank strings mean "no image".
    fn checked_image(image: Option<String>) -> RepoResult<Option<String>> {
        match image {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) if is_image_data_uri(&s) => Ok(Some(s)),
            Some(_) => Err(RepoError::Validation("image must be a base64 image data URI".into())),
        }
    }

    impl LocalRepo {
        pub fn new(storage: StorageManager, media_cfg: MediaConfig) -> Self {
            let news: Vec<NewsArticle> = storage.load(StorageKeys::NEWS).unwrap_or_default();
            let media: Vec<MediaAsset> = storage.load(StorageKeys::MEDIA).unwrap_or_default();
            info!("loaded {} news articles and {} media assets", news.len(), media.len());
            Self {
                news: Arc::new(RwLock::new(news)),
                media: Arc::new(RwLock::new(media)),
                storage,
                media_cfg: Arc::new(media_cfg),
            }
        }

        /// Writes the list and its export wrapper. Callers hold the write lock
        /// so saves land in mutation order. Memory is never rolled back on
        /// failure; the next successful save catches storage up.
        fn persist_news(&self, snapshot: &[NewsArticle]) -> bool {
            let listed = self.storage.save(StorageKeys::NEWS, snapshot);
            let export = NewsExport { news: snapshot.to_vec(), last_updated: chrono::Utc::now() };
            let exported = self.storage.save(StorageKeys::NEWS_EXPORT, &export);
            if !(listed && exported) {
                warn!("news list not fully persisted; in-memory state kept ({} articles)", snapshot.len());
            }
            listed && exported
        }

        fn persist_media(&self, snapshot: &[MediaAsset]) -> bool {
            let ok = self.storage.save(StorageKeys::MEDIA, snapshot);
            if !ok {
                warn!("media list not persisted; in-memory state kept ({} assets)", snapshot.len());
            }
            ok
        }
    }

    #[async_trait]
    impl NewsRepo for LocalRepo {
        async fn list_news(&self) -> Vec<NewsArticle> {
            read(&self.news).clone()
        }

        async fn create_news(&self, new: NewNewsArticle) -> RepoResult<NewsArticle> {
            let title = required_text("title", &new.title)?;
            let excerpt = required_text("excerpt", &new.excerpt)?;
            let content = required_text("content", &new.content)?;
            let image = checked_image(new.image)?;
            let now = now_millis();
            let article = NewsArticle {
                id: new_id(),
                title,
                excerpt,
                content,
                image,
                status: new.status.unwrap_or_default(),
                created_at: now,
                updated_at: now,
            };
            let mut news = write(&self.news);
            news.insert(0, article.clone());
            self.persist_news(&news);
            Ok(article)
        }

        async fn update_news(&self, id: &str, upd: UpdateNewsArticle) -> RepoResult<NewsArticle> {
            let mut news = write(&self.news);
            let idx = news.iter().position(|a| a.id == id).ok_or(RepoError::NotFound)?;
            // validate everything before touching the record
            let title = upd.title.as_deref().map(|t| required_text("title", t)).transpose()?;
            let excerpt = upd.excerpt.as_deref().map(|t| required_text("excerpt", t)).transpose()?;
            let content = upd.content.as_deref().map(|t| required_text("content", t)).transpose()?;
            let image = match upd.image {
                Some(img) => Some(checked_image(Some(img))?),
                None => None,
            };

            let article = &mut news[idx];
            if let Some(t) = title { article.title = t; }
            if let Some(e) = excerpt { article.excerpt = e; }
            if let Some(c) = content { article.content = c; }
            if let Some(i) = image { article.image = i; }
            if let Some(s) = upd.status { article.status = s; }
            // strictly increasing even when two edits land in the same millisecond
            article.updated_at = now_millis().max(article.updated_at + 1);
            let updated = article.clone();
            self.persist_news(&news);
            Ok(updated)
        }

        async fn delete_news(&self, id: &str) -> RepoResult<()> {
            let mut news = write(&self.news);
            let idx = news.iter().position(|a| a.id == id).ok_or(RepoError::NotFound)?;
            news.remove(idx);
            self.persist_news(&news);
            Ok(())
        }

        async fn get_news(&self, id: &str) -> RepoResult<NewsArticle> {
            read(&self.news).iter().find(|a| a.id == id).cloned().ok_or(RepoError::NotFound)
        }

        async fn filter_news(&self, search: &str, status: StatusFilter) -> Vec<NewsArticle> {
            let news = read(&self.news);
            filter_articles(&news, search, status).cloned().collect()
        }

        async fn news_stats(&self) -> NewsStats {
            count_by_status(&read(&self.news))
        }

        async fn news_export(&self) -> Option<NewsExport> {
            self.storage.load(StorageKeys::NEWS_EXPORT)
        }
    }

    #[async_trait]
    impl MediaRepo for LocalRepo {
        async fn list_media(&self) -> Vec<MediaAsset> {
            read(&self.media).clone()
        }

        async fn add_media(&self, upload: MediaUpload) -> Result<MediaAsset, MediaError> {
            validate_image(&upload.mime, upload.bytes.len(), &self.media_cfg)?;
            let MediaUpload { name, mime, bytes } = upload;
            let size = bytes.len() as u64;
            let cfg = self.media_cfg.clone();
            let (data, width, height) = tokio::task::spawn_blocking(move || resize_to_data_uri(&bytes, &cfg))
                .await
                .map_err(|e| MediaError::Worker(e.to_string()))??;
            info!("processed media '{name}' ({size} bytes) -> {width}x{height} jpeg");

            let asset = MediaAsset { id: new_id(), name, size, mime, data, uploaded_at: now_millis() };
            let mut media = write(&self.media);
            media.insert(0, asset.clone());
            self.persist_media(&media);
            Ok(asset)
        }
    }

}
