use anyhow::{Context, Result};

/// Google OAuth client credentials. Present only when all three variables are set.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    /// Base URL for public file links. Falls back to `{s3_endpoint}/{s3_bucket}`.
    pub s3_public_url: Option<String>,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    /// Frontend origin, used for OAuth redirects.
    pub app_url: String,
    pub google: Option<GoogleOAuthConfig>,
    pub ai_api_key: Option<String>,
    pub ai_api_url: String,
    pub ai_model: String,
    pub enable_llm_ats_scoring: bool,
    pub max_upload_bytes: usize,
    pub draft_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

pub const DEFAULT_AI_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_AI_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let jwt_secret = require_env("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters");
        }

        let google = match (
            optional_env("GOOGLE_CLIENT_ID"),
            optional_env("GOOGLE_CLIENT_SECRET"),
            optional_env("GOOGLE_REDIRECT_URI"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                redirect_uri,
            }),
            _ => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            s3_public_url: optional_env("S3_PUBLIC_URL"),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            jwt_secret,
            session_ttl_hours: parse_env("SESSION_TTL_HOURS", 720)?,
            cookie_secure: parse_env("COOKIE_SECURE", false)?,
            app_url: optional_env("APP_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            google,
            ai_api_key: optional_env("AI_API_KEY"),
            ai_api_url: optional_env("AI_API_URL")
                .unwrap_or_else(|| DEFAULT_AI_API_URL.to_string()),
            ai_model: optional_env("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
            enable_llm_ats_scoring: parse_env("ENABLE_LLM_ATS_SCORING", false)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            draft_ttl_secs: parse_env("DRAFT_TTL_SECS", 7 * 24 * 60 * 60)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Public URL of an object stored under `key`.
    pub fn public_url(&self, key: &str) -> String {
        match &self.s3_public_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!(
                "{}/{}/{}",
                self.s3_endpoint.trim_end_matches('/'),
                self.s3_bucket,
                key
            ),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        None => Ok(default),
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/resume_test".to_string(),
        redis_url: "redis://127.0.0.1/".to_string(),
        s3_bucket: "resumes".to_string(),
        s3_endpoint: "http://localhost:9000".to_string(),
        s3_region: "us-east-1".to_string(),
        s3_public_url: None,
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        jwt_secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
        session_ttl_hours: 1,
        cookie_secure: false,
        app_url: "http://localhost:3000".to_string(),
        google: None,
        ai_api_key: None,
        ai_api_url: DEFAULT_AI_API_URL.to_string(),
        ai_model: DEFAULT_AI_MODEL.to_string(),
        enable_llm_ats_scoring: false,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        draft_ttl_secs: 60,
        port: 0,
        rust_log: "debug".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_without_cdn() {
        let config = test_config();
        assert_eq!(
            config.public_url("uploads/a.png"),
            "http://localhost:9000/resumes/uploads/a.png"
        );
    }

    #[test]
    fn test_public_url_with_cdn_trailing_slash() {
        let mut config = test_config();
        config.s3_public_url = Some("https://cdn.example.com/".to_string());
        assert_eq!(
            config.public_url("uploads/a.png"),
            "https://cdn.example.com/uploads/a.png"
        );
    }
}
