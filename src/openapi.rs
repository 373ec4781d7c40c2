use crate::models::{MediaAsset, NewNewsArticle, NewsArticle, NewsExport, NewsStats, NewsStatus, StatusFilter, UpdateNewsArticle};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::login,
        crate::routes::logout,
        crate::routes::auth_status,
        crate::routes::list_news,
        crate::routes::create_news,
        crate::routes::news_stats,
        crate::routes::news_export,
        crate::routes::get_news,
        crate::routes::update_news,
        crate::routes::delete_news,
        crate::routes::list_media,
        crate::routes::upload_media,
    ),
    components(schemas(
        NewsArticle, NewNewsArticle, UpdateNewsArticle, NewsStatus, StatusFilter,
        NewsStats, NewsExport, MediaAsset,
        crate::routes::LoginRequest, crate::routes::AuthStatus,
        crate::routes::UploadReport, crate::routes::UploadFailure
    )),
    tags(
        (name = "auth", description = "Admin session"),
        (name = "news", description = "News articles"),
        (name = "media", description = "Image library"),
    )
)]
pub struct ApiDoc;
