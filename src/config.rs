use std::env;

use tracing::warn;

use crate::services::AdminSettings;

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` runs the demo on the in-memory backend.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub cors_origins: String,
    pub host: String,
    pub port: String,
    pub environment: String,
    pub admin_prefix: String,
    pub per_page: u64,
    pub require_auth: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        if database_url.is_none() {
            warn!("DATABASE_URL not set, using the in-memory backend with demo data");
        }

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using default (not secure for production)");
            "default-secret-change-in-production".to_string()
        });
        let jwt_expiration_hours = env::var("JWT_EXPIRATION_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<i64>()
            .unwrap_or(24);
        let cors_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let admin_prefix = normalize_prefix(
            &env::var("ADMIN_PREFIX").unwrap_or_else(|_| "/admin".to_string()),
        );
        let per_page = env::var("ADMIN_PER_PAGE")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(20);
        let require_auth = env::var("ADMIN_REQUIRE_AUTH")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        if !require_auth && environment != "development" {
            warn!("ADMIN_REQUIRE_AUTH is off outside development; anonymous callers reach the admin");
        }

        Self {
            database_url,
            jwt_secret,
            jwt_expiration_hours,
            cors_origins,
            host,
            port,
            environment,
            admin_prefix,
            per_page,
            require_auth,
        }
    }

    pub fn admin_settings(&self) -> AdminSettings {
        AdminSettings {
            per_page: self.per_page,
            require_auth: self.require_auth,
            ..AdminSettings::default()
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Leading slash, no trailing slash: `admin/` becomes `/admin`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    format!("/{}", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_normalized() {
        assert_eq!(normalize_prefix("admin/"), "/admin");
        assert_eq!(normalize_prefix("/backoffice"), "/backoffice");
        assert_eq!(normalize_prefix(" / "), "/");
    }
}
