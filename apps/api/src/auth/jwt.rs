use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::Error as JwtError, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const OAUTH_STATE_PURPOSE: &str = "oauth_state";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Session token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of the signed OAuth `state` parameter.
#[derive(Debug, Serialize, Deserialize, Clone)]
struct StateClaims {
    nonce: Uuid,
    purpose: String,
    exp: i64,
}

/// Issues and verifies HS256 tokens for sessions and OAuth state.
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, session_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn issue_session(&self, user_id: Uuid, email: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.session_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn verify_session(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default()).map(|d| d.claims)
    }

    /// Returns the signed `state` and the nonce it carries. The caller pins the
    /// nonce to the browser so the callback can prove it started the flow.
    pub fn issue_oauth_state(&self) -> Result<(String, Uuid), JwtError> {
        let nonce = Uuid::new_v4();
        let claims = StateClaims {
            nonce,
            purpose: OAUTH_STATE_PURPOSE.to_string(),
            exp: (Utc::now() + Duration::minutes(OAUTH_STATE_TTL_MINUTES)).timestamp(),
        };
        Ok((encode(&Header::default(), &claims, &self.encoding_key)?, nonce))
    }

    /// True only for an unexpired state issued by this server whose nonce
    /// matches the one held by the caller's browser.
    pub fn verify_oauth_state(&self, state: &str, browser_nonce: &str) -> bool {
        decode::<StateClaims>(state, &self.decoding_key, &Validation::default())
            .map(|d| {
                d.claims.purpose == OAUTH_STATE_PURPOSE
                    && d.claims.nonce.to_string() == browser_nonce
            })
            .unwrap_or(false)
    }

    pub fn oauth_state_ttl(&self) -> Duration {
        Duration::minutes(OAUTH_STATE_TTL_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-unit-test-secret";

    #[test]
    fn test_session_roundtrip() {
        let jwt = JwtManager::new(SECRET, Duration::hours(1));
        let user_id = Uuid::new_v4();
        let token = jwt.issue_session(user_id, "ada@example.com").unwrap();
        let claims = jwt.verify_session(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "ada@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_session_rejected() {
        let jwt = JwtManager::new(SECRET, Duration::hours(-2));
        let token = jwt.issue_session(Uuid::new_v4(), "ada@example.com").unwrap();
        assert!(jwt.verify_session(&token).is_err());
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let ours = JwtManager::new(SECRET, Duration::hours(1));
        let theirs = JwtManager::new("another-secret-another-secret-xx", Duration::hours(1));
        let token = theirs.issue_session(Uuid::new_v4(), "eve@example.com").unwrap();
        assert!(ours.verify_session(&token).is_err());
    }

    #[test]
    fn test_oauth_state_roundtrip() {
        let jwt = JwtManager::new(SECRET, Duration::hours(1));
        let (state, nonce) = jwt.issue_oauth_state().unwrap();
        assert!(jwt.verify_oauth_state(&state, &nonce.to_string()));
        assert!(!jwt.verify_oauth_state("tampered", &nonce.to_string()));
    }

    #[test]
    fn test_oauth_state_bound_to_nonce() {
        let jwt = JwtManager::new(SECRET, Duration::hours(1));
        let (attacker_state, _) = jwt.issue_oauth_state().unwrap();
        let (_, victim_nonce) = jwt.issue_oauth_state().unwrap();
        assert!(!jwt.verify_oauth_state(&attacker_state, &victim_nonce.to_string()));
        assert!(!jwt.verify_oauth_state(&attacker_state, ""));
    }

    #[test]
    fn test_session_token_is_not_a_valid_state() {
        let jwt = JwtManager::new(SECRET, Duration::hours(1));
        let session = jwt.issue_session(Uuid::new_v4(), "ada@example.com").unwrap();
        assert!(!jwt.verify_oauth_state(&session, ""));
    }
}
