use std::sync::Arc;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;
use tracing::{info, warn};

use crate::auth::{Admin, AuthGate};
use crate::config::MediaConfig;
use crate::error::ApiError;
use crate::imaging::{validate_image, MediaError};
use crate::models::*;
use crate::repo::Repo;

/// Article bodies may carry an inline base64 image of up to the media size limit.
pub const JSON_BODY_LIMIT: usize = 8 * 1024 * 1024;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(web::JsonConfig::default().limit(JSON_BODY_LIMIT))
            .service(web::resource("/auth/login").route(web::post().to(login)))
            .service(web::resource("/auth/logout").route(web::post().to(logout)))
            .service(web::resource("/auth/status").route(web::get().to(auth_status)))
            .service(
                web::resource("/news")
                    .route(web::get().to(list_news))
                    .route(web::post().to(create_news)),
            )
            // fixed paths must be registered before /news/{id}
            .service(web::resource("/news/stats").route(web::get().to(news_stats)))
            .service(web::resource("/news/export").route(web::get().to(news_export)))
            .service(
                web::resource("/news/{id}")
                    .route(web::get().to(get_news))
                    .route(web::patch().to(update_news))
                    .route(web::delete().to(delete_news)),
            )
            .service(
                web::resource("/media")
                    .route(web::get().to(list_media))
                    .route(web::post().to(upload_media)),
            ),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub auth: AuthGate,
    pub media: Arc<MediaConfig>,
}

// ---------------- auth ----------------

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub token: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    pub login_time: Option<Millis>,
    pub expires_at: Option<Millis>,
}

impl From<Option<AuthSession>> for AuthStatus {
    fn from(session: Option<AuthSession>) -> Self {
        Self {
            authenticated: session.is_some(),
            login_time: session.as_ref().map(|s| s.login_time),
            expires_at: session.as_ref().map(AuthSession::expires_at),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session started", body = AuthStatus),
        (status = 401, description = "Wrong token")
    )
)]
pub async fn login(data: web::Data<AppState>, payload: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    let session = data.auth.login(&payload.token)?;
    Ok(HttpResponse::Ok().json(AuthStatus::from(Some(session))))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses((status = 204, description = "Session cleared"), (status = 401, description = "Not logged in"))
)]
pub async fn logout(_admin: Admin, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    if !data.auth.logout() {
        return Err(ApiError::Internal);
    }
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/status",
    responses((status = 200, description = "Current session state", body = AuthStatus))
)]
pub async fn auth_status(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(AuthStatus::from(data.auth.check_auth()))
}

// ---------------- news ----------------

#[utoipa::path(
    get,
    path = "/api/v1/news",
    params(NewsQuery),
    responses(
        (status = 200, description = "Articles, newest first", body = [NewsArticle]),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_news(_admin: Admin, data: web::Data<AppState>, query: web::Query<NewsQuery>) -> HttpResponse {
    let NewsQuery { search, status } = query.into_inner();
    let news = if search.is_none() && status.is_none() {
        data.repo.list_news().await
    } else {
        data.repo.filter_news(search.as_deref().unwrap_or(""), status.unwrap_or_default()).await
    };
    HttpResponse::Ok().json(news)
}

#[utoipa::path(
    post,
    path = "/api/v1/news",
    request_body = NewNewsArticle,
    responses(
        (status = 201, description = "Article created", body = NewsArticle),
        (status = 400, description = "Missing required field"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn create_news(
    _admin: Admin,
    data: web::Data<AppState>,
    payload: web::Json<NewNewsArticle>,
) -> Result<HttpResponse, ApiError> {
    let article = data.repo.create_news(payload.into_inner()).await?;
    info!(id = %article.id, "news article created");
    Ok(HttpResponse::Created().json(article))
}

#[utoipa::path(
    get,
    path = "/api/v1/news/stats",
    responses((status = 200, description = "Article counts", body = NewsStats))
)]
pub async fn news_stats(_admin: Admin, data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.repo.news_stats().await)
}

#[utoipa::path(
    get,
    path = "/api/v1/news/export",
    responses(
        (status = 200, description = "Last saved export document", body = NewsExport),
        (status = 404, description = "Nothing saved yet")
    )
)]
pub async fn news_export(_admin: Admin, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let export = data.repo.news_export().await.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(export))
}

#[utoipa::path(
    get,
    path = "/api/v1/news/{id}",
    params(("id" = String, Path, description = "Article id")),
    responses(
        (status = 200, description = "Article", body = NewsArticle),
        (status = 404, description = "Article not found")
    )
)]
pub async fn get_news(_admin: Admin, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let article = data.repo.get_news(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(article))
}

#[utoipa::path(
    patch,
    path = "/api/v1/news/{id}",
    request_body = UpdateNewsArticle,
    params(("id" = String, Path, description = "Article id")),
    responses(
        (status = 200, description = "Article updated", body = NewsArticle),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Article not found")
    )
)]
pub async fn update_news(
    _admin: Admin,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateNewsArticle>,
) -> Result<HttpResponse, ApiError> {
    let article = data.repo.update_news(&path.into_inner(), payload.into_inner()).await?;
    info!(id = %article.id, "news article updated");
    Ok(HttpResponse::Ok().json(article))
}

#[utoipa::path(
    delete,
    path = "/api/v1/news/{id}",
    params(("id" = String, Path, description = "Article id")),
    responses(
        (status = 204, description = "Article deleted"),
        (status = 404, description = "Article not found")
    )
)]
pub async fn delete_news(_admin: Admin, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    data.repo.delete_news(&id).await?;
    info!(id = %id, "news article deleted");
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- media ----------------

#[utoipa::path(
    get,
    path = "/api/v1/media",
    responses((status = 200, description = "Media assets, newest first", body = [MediaAsset]))
)]
pub async fn list_media(_admin: Admin, data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.repo.list_media().await)
}

#[derive(Debug, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct UploadFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct UploadReport {
    pub uploaded: Vec<MediaAsset>,
    pub errors: Vec<UploadFailure>,
}

/// Declared part type, sniffed from the bytes when missing or generic.
fn effective_mime(declared: Option<String>, bytes: &[u8]) -> String {
    match declared {
        Some(m) if m != "application/octet-stream" => m,
        _ => infer::get(bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".into()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/media",
    responses(
        (status = 201, description = "At least one file stored", body = UploadReport),
        (status = 400, description = "No `file` part in the request"),
        (status = 413, description = "The only file is over the size limit"),
        (status = 415, description = "The only file is not a supported image type"),
        (status = 422, description = "Every file was rejected", body = UploadReport)
    )
)]
pub async fn upload_media(_admin: Admin, data: web::Data<AppState>, mut payload: Multipart) -> Result<HttpResponse, ApiError> {
    let max = data.media.max_bytes;
    let mut report = UploadReport::default();
    let mut failures: Vec<(String, MediaError)> = Vec::new();

    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        warn!("multipart error: {e}");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }
        let name = field.content_disposition().get_filename().unwrap_or("upload").to_string();
        let declared = field.content_type().map(|m| m.essence_str().to_string());

        // stop buffering past the limit but keep draining so the next part can be read
        let mut bytes: Vec<u8> = Vec::new();
        let mut total = 0usize;
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            warn!("multipart stream error: {e}");
            ApiError::BadRequest("malformed multipart body".into())
        })? {
            total += chunk.len();
            if total <= max {
                bytes.extend_from_slice(&chunk);
            }
        }

        let mime = effective_mime(declared, &bytes);
        let outcome = match validate_image(&mime, total, &data.media) {
            Ok(()) => data.repo.add_media(MediaUpload { name: name.clone(), mime, bytes }).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(asset) => {
                info!(id = %asset.id, name = %asset.name, "media stored");
                report.uploaded.push(asset);
            }
            Err(e) => {
                warn!(name = %name, "media rejected: {e}");
                failures.push((name, e));
            }
        }
    }

    if report.uploaded.is_empty() {
        if failures.is_empty() {
            return Err(ApiError::BadRequest("expected a multipart `file` part".into()));
        }
        // a lone file gets the status of its own failure
        if failures.len() == 1 {
            let (_, e) = failures.remove(0);
            return Err(e.into());
        }
    }
    report.errors = failures
        .into_iter()
        .map(|(name, e)| UploadFailure { name, error: e.to_string() })
        .collect();
    if report.uploaded.is_empty() {
        return Ok(HttpResponse::UnprocessableEntity().json(report));
    }
    Ok(HttpResponse::Created().json(report))
}
