use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use log::{info, warn};
use std::future::{ready, Ready};
use std::sync::Arc;

use crate::models::{now_millis, AuthSession, Millis};
use crate::routes::AppState;
use crate::storage::{StorageKeys, StorageManager};

/// Lifetime of an admin session.
pub const SESSION_TTL_MS: Millis = 24 * 60 * 60 * 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
    #[error("session could not be stored")]
    SessionNotStored,
}

/// Single shared-secret gate with a persisted 24h session.
///
/// The secret is a static value handed to every admin. It keeps casual
/// visitors out of the panel and nothing more; it is not per-user
/// identity and offers no protection to anyone who can read the config.
#[derive(Clone)]
pub struct AuthGate {
    secret: Arc<str>,
    storage: StorageManager,
}

impl AuthGate {
    pub fn new(secret: impl Into<Arc<str>>, storage: StorageManager) -> Self {
        Self { secret: secret.into(), storage }
    }

    /// No lockout or backoff on failure.
    pub fn login(&self, candidate: &str) -> Result<AuthSession, AuthError> {
        if candidate != &*self.secret {
            warn!("admin login rejected");
            return Err(AuthError::InvalidToken);
        }
        let session = AuthSession {
            token: candidate.to_string(),
            login_time: now_millis(),
            expires_in: SESSION_TTL_MS,
        };
        if !self.storage.save(StorageKeys::AUTH, &session) {
            return Err(AuthError::SessionNotStored);
        }
        info!("admin session started");
        Ok(session)
    }

    pub fn check_auth(&self) -> Option<AuthSession> {
        self.check_auth_at(now_millis())
    }

    /// Returns the live session, clearing it first if it has expired at `now`.
    pub fn check_auth_at(&self, now: Millis) -> Option<AuthSession> {
        let session: AuthSession = self.storage.load(StorageKeys::AUTH)?;
        if session.is_expired(now) {
            info!("admin session expired");
            self.logout();
            return None;
        }
        Some(session)
    }

    pub fn logout(&self) -> bool {
        self.storage.remove(StorageKeys::AUTH)
    }

    /// Bearer value must be the secret and a live session must exist.
    pub fn authorize(&self, bearer: &str) -> Option<AuthSession> {
        self.check_auth().filter(|s| s.token == bearer && bearer == &*self.secret)
    }
}

/// Extractor guarding admin routes.
pub struct Admin(pub AuthSession);

impl FromRequest for Admin {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            return ready(Err(actix_web::error::ErrorInternalServerError("app state missing")));
        };
        let bearer = match BearerAuth::from_request(req, pl).into_inner() {
            Ok(b) => b,
            Err(_) => return ready(Err(actix_web::error::ErrorUnauthorized("Authorization required"))),
        };
        match state.auth.authorize(bearer.token()) {
            Some(session) => ready(Ok(Admin(session))),
            None => ready(Err(actix_web::error::ErrorUnauthorized("Not logged in or session expired"))),
        }
    }
}
