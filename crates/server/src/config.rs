use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub upload_path: String,
    pub static_path: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/creatorlink.db?mode=rwc".to_string()),
            upload_path: env::var("UPLOAD_PATH").unwrap_or_else(|_| "./data/uploads".to_string()),
            static_path: env::var("STATIC_PATH").unwrap_or_else(|_| "./public".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-change-in-production".to_string()),
            token_ttl_days: env::var("TOKEN_TTL_DAYS")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(7),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(5 * 1024 * 1024),
        }
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests(upload_path: String) -> Self {
        Self {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            upload_path,
            static_path: "./public".to_string(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_days: 1,
            max_upload_bytes: 1024 * 1024,
        }
    }
}
