use std::path::PathBuf;

/// Upload limits and resize bounds for the media repository.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaConfig {
    pub max_bytes: usize,
    pub max_width: u32,
    pub max_height: u32,
    pub jpeg_quality: u8,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            max_width: 800,
            max_height: 600,
            jpeg_quality: 80,
        }
    }
}

/// Process configuration derived from env.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub admin_token: String,
    pub data_dir: PathBuf,
    pub storage_quota: Option<usize>,
    pub bind_addr: String,
    pub frontend_url: String,
    pub enable_hsts: bool,
    pub media: MediaConfig,
}

pub const MIN_ADMIN_TOKEN_LEN: usize = 12;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ADMIN_TOKEN must be set")]
    MissingAdminToken,
    #[error("ADMIN_TOKEN must be at least {MIN_ADMIN_TOKEN_LEN} characters long")]
    AdminTokenTooShort,
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn flag_env(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_bytes: parse_env("MEDIA_MAX_BYTES").unwrap_or(d.max_bytes),
            max_width: parse_env("MEDIA_MAX_WIDTH").filter(|w| *w > 0).unwrap_or(d.max_width),
            max_height: parse_env("MEDIA_MAX_HEIGHT").filter(|h| *h > 0).unwrap_or(d.max_height),
            jpeg_quality: parse_env("MEDIA_JPEG_QUALITY").filter(|q| (1..=100).contains(q)).unwrap_or(d.jpeg_quality),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let admin_token = std::env::var("ADMIN_TOKEN").map_err(|_| ConfigError::MissingAdminToken)?;
        if admin_token.len() < MIN_ADMIN_TOKEN_LEN {
            return Err(ConfigError::AdminTokenTooShort);
        }
        Ok(Self {
            admin_token,
            data_dir: std::env::var("ASFALTO_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data")),
            storage_quota: parse_env("ASFALTO_STORAGE_QUOTA"),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            frontend_url: std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".into()),
            enable_hsts: flag_env("ENABLE_HSTS"),
            media: MediaConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn admin_token_is_required_and_checked() {
        std::env::remove_var("ADMIN_TOKEN");
        assert_eq!(AppConfig::from_env().unwrap_err(), ConfigError::MissingAdminToken);
        std::env::set_var("ADMIN_TOKEN", "short");
        assert_eq!(AppConfig::from_env().unwrap_err(), ConfigError::AdminTokenTooShort);
        std::env::set_var("ADMIN_TOKEN", "bodesdoasfalto2025parasempre");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.admin_token, "bodesdoasfalto2025parasempre");
        std::env::remove_var("ADMIN_TOKEN");
    }

    #[test]
    #[serial_test::serial]
    fn bad_media_values_fall_back_to_defaults() {
        std::env::set_var("MEDIA_MAX_WIDTH", "wide");
        std::env::set_var("MEDIA_JPEG_QUALITY", "250");
        std::env::set_var("MEDIA_MAX_HEIGHT", "480");
        let media = MediaConfig::from_env();
        assert_eq!(media.max_width, 800);
        assert_eq!(media.jpeg_quality, 80);
        assert_eq!(media.max_height, 480);
        for k in ["MEDIA_MAX_WIDTH", "MEDIA_JPEG_QUALITY", "MEDIA_MAX_HEIGHT"] {
            std::env::remove_var(k);
        }
    }
}
