mod activity;
mod ai;
mod auth;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod rate_limit;
mod render;
mod resumes;
mod routes;
mod state;
mod uploads;
mod users;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use chrono::Duration;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai::ats::{AtsScorer, KeywordAtsScorer, LlmAtsScorer};
use crate::auth::jwt::JwtManager;
use crate::auth::oauth::GoogleOAuth;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::rate_limit::RateLimits;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration comes first; missing required env vars abort startup
    let config = Config::from_env()?;

    // Structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL (migrations run inside create_pool)
    let db = create_pool(&config.database_url).await?;

    // Redis, for resume drafts
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // S3 / MinIO, for uploaded images
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Session and OAuth state signing
    let jwt = Arc::new(JwtManager::new(
        &config.jwt_secret,
        Duration::hours(config.session_ttl_hours),
    ));

    // Google sign-in, only when all three GOOGLE_* vars are set
    let google = config
        .google
        .clone()
        .map(|google| GoogleOAuth::new(google, reqwest::Client::new()));
    if google.is_none() {
        info!("Google sign-in disabled (GOOGLE_CLIENT_ID/SECRET/REDIRECT_URI not set)");
    }

    // LLM client; absent without AI_API_KEY
    let llm = match &config.ai_api_key {
        Some(key) => {
            let client = LlmClient::new(
                key.clone(),
                config.ai_api_url.clone(),
                config.ai_model.clone(),
            )?;
            info!("LLM client initialized (model: {})", client.model());
            Some(client)
        }
        None => {
            info!("AI_API_KEY not set; suggestions disabled, ATS uses keyword scoring");
            None
        }
    };

    // ATS scorer (keyword only unless ENABLE_LLM_ATS_SCORING and a key are both present)
    let ats_scorer: Arc<dyn AtsScorer> = match (&llm, config.enable_llm_ats_scoring) {
        (Some(client), true) => {
            info!("ATS scoring: keyword analysis with LLM review");
            Arc::new(LlmAtsScorer(client.clone()))
        }
        (None, true) => {
            warn!("ENABLE_LLM_ATS_SCORING is set but AI_API_KEY is missing; using keyword scoring");
            Arc::new(KeywordAtsScorer)
        }
        _ => Arc::new(KeywordAtsScorer),
    };

    // Build app state
    let state = AppState {
        db,
        redis,
        s3,
        llm,
        config: config.clone(),
        jwt,
        google,
        ats_scorer,
        rate_limits: RateLimits::default(),
    };

    // Router with request tracing and CORS
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to APP_URL once the frontend sends credentials cross-origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resume-api-static",
    );

    let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not subdomain
    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
