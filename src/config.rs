//! Environment-driven configuration, read once at startup.

use std::env;

use tracing::warn;

pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: Vec<u8>,
    pub upload_dir: String,
}

impl Config {
    pub fn load() -> Self {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://warbler.db?mode=rwc".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(s) => s.into_bytes(),
            Err(_) => {
                warn!("JWT_SECRET not set, using an insecure development secret");
                b"warbler-dev-secret".to_vec()
            }
        };

        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        Self {
            database_url,
            port,
            jwt_secret,
            upload_dir,
        }
    }
}
