pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::ai::handlers as ai;
use crate::auth::handlers as auth;
use crate::rate_limit::rate_limit;
use crate::resumes::handlers as resumes;
use crate::state::AppState;
use crate::uploads::handlers as uploads;
use crate::users::handlers as users;

/// Multipart framing on top of the raw file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let limits = state.rate_limits.clone();

    let auth_routes = Router::new()
        .route("/register", post(auth::handle_register))
        .route("/login", post(auth::handle_login))
        .route("/google", get(auth::handle_google_login))
        .route("/google/callback", get(auth::handle_google_callback))
        .route_layer(middleware::from_fn_with_state(limits.auth, rate_limit))
        .route("/logout", post(auth::handle_logout))
        .route("/session", get(auth::handle_session));

    let user_routes = Router::new()
        .route(
            "/me",
            get(users::handle_get_me)
                .patch(users::handle_update_me)
                .delete(users::handle_delete_me),
        )
        .route("/me/password", put(users::handle_change_password))
        .route(
            "/me/settings",
            get(users::handle_get_settings).put(users::handle_update_settings),
        )
        .route("/me/activity", get(users::handle_list_activity));

    let resume_routes = Router::new()
        .route(
            "/",
            get(resumes::handle_list_resumes).post(resumes::handle_create_resume),
        )
        .route(
            "/:id",
            get(resumes::handle_get_resume)
                .put(resumes::handle_update_resume)
                .delete(resumes::handle_delete_resume),
        )
        .route("/:id/duplicate", post(resumes::handle_duplicate_resume))
        .route("/:id/versions", get(resumes::handle_list_versions))
        .route("/:id/versions/:v", get(resumes::handle_get_version))
        .route(
            "/:id/versions/:v/restore",
            post(resumes::handle_restore_version),
        )
        .route("/:id/completeness", get(resumes::handle_completeness))
        .route(
            "/:id/draft",
            get(resumes::handle_get_draft)
                .put(resumes::handle_save_draft)
                .delete(resumes::handle_discard_draft),
        )
        .route("/:id/preview", get(resumes::handle_preview))
        .route("/:id/export", get(resumes::handle_export));

    let ai_routes = Router::new()
        .route("/suggestions", post(ai::handle_suggestions))
        .route("/ats-score", post(ai::handle_ats_score))
        .route_layer(middleware::from_fn_with_state(limits.ai, rate_limit));

    let upload_routes = Router::new()
        .route(
            "/",
            get(uploads::handle_list_uploads).post(uploads::handle_upload),
        )
        .route("/:id", axum::routing::delete(uploads::handle_delete_upload))
        .route_layer(middleware::from_fn_with_state(limits.uploads, rate_limit))
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/templates", get(resumes::handle_list_templates))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/resumes", resume_routes)
        .nest("/api/ai", ai_routes)
        .nest("/api/uploads", upload_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aws_sdk_s3::config::{BehaviorVersion, Region};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use chrono::Duration;
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::ai::ats::KeywordAtsScorer;
    use crate::auth::jwt::JwtManager;
    use crate::auth::oauth::GoogleOAuth;
    use crate::config::{test_config, GoogleOAuthConfig};
    use crate::rate_limit::RateLimits;

    fn test_state() -> AppState {
        let config = test_config();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let redis = redis::Client::open(config.redis_url.clone()).unwrap();
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        AppState {
            db,
            redis,
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            llm: None,
            jwt: Arc::new(JwtManager::new(
                &config.jwt_secret,
                Duration::hours(config.session_ttl_hours),
            )),
            google: None,
            ats_scorer: Arc::new(KeywordAtsScorer),
            rate_limits: RateLimits::default(),
            config,
        }
    }

    fn test_state_with_google() -> AppState {
        let mut state = test_state();
        state.google = Some(GoogleOAuth::new(
            GoogleOAuthConfig {
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                redirect_uri: "http://localhost:8080/api/auth/google/callback".to_string(),
            },
            reqwest::Client::new(),
        ));
        state
    }

    fn callback_request(oauth_state: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(format!(
            "/api/auth/google/callback?code=attacker-code&state={}",
            urlencoding::encode(oauth_state)
        ));
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn register_request(ip: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "resume-api");
    }

    #[tokio::test]
    async fn test_templates_listed() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/templates")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["modern", "classic", "minimal", "creative", "professional"]);
    }

    #[tokio::test]
    async fn test_protected_route_requires_session() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/resumes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_invalid_bearer_rejected() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/users/me")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_validates_before_io() {
        let app = build_router(test_state());
        let response = app
            .oneshot(register_request(
                "10.0.0.1",
                json!({ "name": "Ada", "email": "not-an-email", "password": "abcdefgh1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_auth_routes_rate_limited() {
        let app = build_router(test_state());
        let body = json!({ "name": "Ada", "email": "bad", "password": "short" });

        for _ in 0..10 {
            let response = app
                .clone()
                .oneshot(register_request("10.0.0.2", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = app
            .clone()
            .oneshot(register_request("10.0.0.2", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        let other_client = app
            .oneshot(register_request("10.0.0.3", body))
            .await
            .unwrap();
        assert_eq!(other_client.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_google_login_unconfigured() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/auth/google")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_google_login_pins_state_to_browser() {
        let app = build_router(test_state_with_google());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/auth/google")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("oauth_state="));
        assert!(cookie.contains("HttpOnly"));
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.contains("state="));
    }

    #[tokio::test]
    async fn test_google_callback_requires_state_cookie() {
        let state = test_state_with_google();
        let (oauth_state, nonce) = state.jwt.issue_oauth_state().unwrap();
        let app = build_router(state);

        let without_cookie = app
            .clone()
            .oneshot(callback_request(&oauth_state, None))
            .await
            .unwrap();
        assert_eq!(without_cookie.status(), StatusCode::UNAUTHORIZED);

        let other_browser = app
            .clone()
            .oneshot(callback_request(
                &oauth_state,
                Some(&format!("oauth_state={}", uuid::Uuid::new_v4())),
            ))
            .await
            .unwrap();
        assert_eq!(other_browser.status(), StatusCode::UNAUTHORIZED);

        // Matching cookie passes the state check and fails later on the missing code.
        let matching = app
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/api/auth/google/callback?state={}",
                        urlencoding::encode(&oauth_state)
                    ))
                    .header(header::COOKIE, format!("oauth_state={nonce}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(matching.status(), StatusCode::BAD_REQUEST);
    }
}
