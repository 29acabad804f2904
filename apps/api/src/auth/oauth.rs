//! Google OAuth 2.0 authorization-code provider.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::GoogleOAuthConfig;
use crate::errors::AppError;

const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URI: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPES: &str = "openid email profile";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl GoogleUser {
    /// Display name, falling back to the email's local part.
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or_default().to_string())
    }
}

#[derive(Clone)]
pub struct GoogleOAuth {
    config: GoogleOAuthConfig,
    http: Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleOAuthConfig, http: Client) -> Self {
        Self { config, http }
    }

    pub fn authorization_url(&self, state: &str) -> String {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", SCOPES),
            ("state", state),
            ("access_type", "online"),
            ("prompt", "select_account"),
        ];
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{AUTH_URI}?{query}")
    }

    /// Exchanges the authorization code and fetches the user's profile.
    pub async fn authenticate(&self, code: &str) -> Result<GoogleUser, AppError> {
        let token = self.exchange_code(code).await?;
        self.fetch_user(&token.access_token).await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(TOKEN_URI)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Google token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!("Google token exchange returned {status}: {body}");
            return Err(AppError::Unauthorized(
                "Google sign-in could not be completed".to_string(),
            ));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Google token response malformed: {e}")))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GoogleUser, AppError> {
        let response = self
            .http
            .get(USERINFO_URI)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Google userinfo request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Unauthorized(
                "Google sign-in could not be completed".to_string(),
            ));
        }

        response
            .json::<GoogleUser>()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Google userinfo malformed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleOAuth {
        GoogleOAuth::new(
            GoogleOAuthConfig {
                client_id: "client-123.apps.googleusercontent.com".to_string(),
                client_secret: "shh".to_string(),
                redirect_uri: "http://localhost:8080/api/auth/google/callback".to_string(),
            },
            Client::new(),
        )
    }

    #[test]
    fn test_authorization_url_encodes_params() {
        let url = provider().authorization_url("state-token");
        assert!(url.starts_with(AUTH_URI));
        assert!(url.contains("client_id=client-123.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fapi%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("state=state-token"));
        assert!(!url.contains("shh"));
    }

    #[test]
    fn test_display_name_fallback() {
        let user = GoogleUser {
            id: "1".to_string(),
            email: "grace.hopper@example.com".to_string(),
            verified_email: true,
            name: Some("   ".to_string()),
            picture: None,
        };
        assert_eq!(user.display_name(), "grace.hopper");
    }

    #[test]
    fn test_userinfo_deserializes_without_verified_flag() {
        let user: GoogleUser =
            serde_json::from_str(r#"{"id":"42","email":"a@b.co","name":"A"}"#).unwrap();
        assert!(!user.verified_email);
        assert_eq!(user.display_name(), "A");
    }
}
