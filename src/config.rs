use anyhow::{Context, bail};

use crate::auth::AuthMode;

pub const DEFAULT_IMAGE_UPLOAD_URL: &str = "https://upload.imagekit.io/api/v1/files/upload";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub auth_mode: AuthMode,
    pub auth_cookie: String,
    pub frontend_url: Option<String>,
    pub image_upload_url: String,
    pub image_upload_key: Option<String>,
    pub bridge_capacity: usize,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Reads the process environment, `.env` included.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Config::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;
        let jwt_secret = var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < 8 {
            bail!("JWT_SECRET must be at least 8 characters long");
        }

        let auth_mode = match var("AUTH_MODE") {
            Some(mode) => mode.parse::<AuthMode>().map_err(anyhow::Error::msg).context("AUTH_MODE")?,
            None => AuthMode::default(),
        };

        let bridge_capacity: usize = match var("BRIDGE_CAPACITY") {
            Some(capacity) => capacity
                .parse()
                .context("BRIDGE_CAPACITY must be a positive number")?,
            None => 256,
        };
        if bridge_capacity == 0 {
            bail!("BRIDGE_CAPACITY must be a positive number");
        }

        let max_upload_bytes: usize = match var("MAX_UPLOAD_BYTES") {
            Some(limit) => limit
                .parse()
                .context("MAX_UPLOAD_BYTES must be a positive number")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };
        if max_upload_bytes == 0 {
            bail!("MAX_UPLOAD_BYTES must be a positive number");
        }

        Ok(Config {
            database_url,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            jwt_secret,
            auth_mode,
            auth_cookie: var("AUTH_COOKIE").unwrap_or_else(|| "token".to_owned()),
            frontend_url: var("FRONTEND_URL"),
            image_upload_url: var("IMAGE_UPLOAD_URL").unwrap_or_else(|| DEFAULT_IMAGE_UPLOAD_URL.to_owned()),
            image_upload_key: var("IMAGE_UPLOAD_KEY"),
            bridge_capacity,
            max_upload_bytes,
        })
    }
}
