use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::ai::ats::AtsScorer;
use crate::auth::jwt::JwtManager;
use crate::auth::oauth::GoogleOAuth;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::rate_limit::RateLimits;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Draft storage.
    pub redis: RedisClient,
    pub s3: S3Client,
    /// `None` when `AI_API_KEY` is unset; suggestion endpoints then answer 503.
    pub llm: Option<LlmClient>,
    pub config: Config,
    pub jwt: Arc<JwtManager>,
    /// `None` unless all Google OAuth variables are set.
    pub google: Option<GoogleOAuth>,
    /// Pluggable ATS scorer. Default: KeywordAtsScorer. Swap via ENABLE_LLM_ATS_SCORING.
    pub ats_scorer: Arc<dyn AtsScorer>,
    pub rate_limits: RateLimits,
}
