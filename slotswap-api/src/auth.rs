//! Authentication Module
//!
//! Callers identify themselves with an HS256 JWT, sent either as
//! `Authorization: Bearer <token>` or as a `token` cookie. The claims carry
//! the user id (`sub`) plus the display name and email shown to other users.

use crate::error::{ApiError, ApiResult};
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use slotswap_core::UserId;
use std::collections::HashSet;
use std::sync::Arc;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

/// Name of the cookie that may carry the session token.
pub const TOKEN_COOKIE: &str = "token";

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock used for token time checks.
///
/// Expiry is validated here rather than inside `jsonwebtoken` so tests can
/// pin the current time.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}


// ============================================================================
// JWT SECRET
// ============================================================================

/// Signing secret that never appears in logs.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// Wrap a secret. Empty secrets are rejected.
    pub fn new(secret: String) -> ApiResult<Self> {
        if secret.is_empty() {
            return Err(ApiError::missing_field("jwt_secret"));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

fn build_jwt_secret(secret_str: String) -> JwtSecret {
    let normalized = if secret_str.trim().is_empty() {
        INSECURE_DEFAULT_SECRET.to_string()
    } else {
        secret_str
    };
    JwtSecret(SecretString::new(normalized.into()))
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared HS256 secret
    pub jwt_secret: JwtSecret,

    pub jwt_algorithm: Algorithm,

    /// Lifetime of tokens minted by [`generate_jwt_token`] (default: 7 days)
    pub jwt_expiration_secs: i64,

    /// Tolerated clock drift when checking `exp` (default: 60)
    pub jwt_clock_skew_secs: i64,

    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: build_jwt_secret(INSECURE_DEFAULT_SECRET.to_string()),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 7 * 24 * 3600,
            jwt_clock_skew_secs: 60,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Create authentication configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `SLOTSWAP_JWT_SECRET`: HS256 signing secret
    /// - `SLOTSWAP_JWT_EXPIRATION_SECS`: lifetime of minted tokens (default: 604800)
    /// - `SLOTSWAP_JWT_CLOCK_SKEW_SECS`: clock skew tolerance (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secret_str = std::env::var("SLOTSWAP_JWT_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            jwt_secret: build_jwt_secret(secret_str),
            jwt_expiration_secs: std::env::var("SLOTSWAP_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jwt_expiration_secs),
            jwt_clock_skew_secs: std::env::var("SLOTSWAP_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jwt_clock_skew_secs),
            ..defaults
        }
    }

    /// Refuse to run production with a default or short secret.
    ///
    /// Outside production the same problems are only logged.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let environment = std::env::var("SLOTSWAP_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase();
        let is_production = environment == "production" || environment == "prod";

        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(
                    "Cannot start in production with the default JWT secret; set SLOTSWAP_JWT_SECRET",
                ));
            }
            tracing::warn!("Using the default JWT secret. Set SLOTSWAP_JWT_SECRET before deploying.");
        } else if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars, need 32)",
                    self.jwt_secret.len()
                )));
            }
            tracing::warn!(len = self.jwt_secret.len(), "JWT secret is shorter than 32 characters");
        }

        Ok(())
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// Token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id, UUID)
    pub sub: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: UserId, name: &str, email: &str, expiration_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: user_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + expiration_secs,
        }
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }

    /// The subject as a user id.
    pub fn user_id(&self) -> ApiResult<UserId> {
        self.sub
            .parse()
            .map_err(|_| ApiError::invalid_token("Token subject is not a valid user id"))
    }
}

// ============================================================================
// TOKEN HANDLING
// ============================================================================

fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Verify a token's signature and expiry and return its claims.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    // Signature only; time checks use the injected clock below.
    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();
    if now < 0 {
        tracing::error!(timestamp = now, "System clock returned pre-epoch time");
        return Err(ApiError::internal_error("Server time configuration error"));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;
    Ok(claims)
}

/// Mint a token for a user.
pub fn generate_jwt_token(config: &AuthConfig, user_id: UserId, name: &str, email: &str) -> ApiResult<String> {
    let claims = Claims::new(user_id, name, email, config.jwt_expiration_secs, &*config.clock);
    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Find the caller's token: the bearer header wins over the cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use axum::http::HeaderValue;
    use slotswap_core::EntityIdType;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: JwtSecret::new("test_secret".to_string()).expect("test secret is non-empty"),
            clock: Arc::new(test_clocks::valid()),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_jwt_generation_and_validation() -> ApiResult<()> {
        let config = test_config();
        let user = UserId::now_v7();

        let token = generate_jwt_token(&config, user, "Alice", "alice@example.com")?;
        let claims = validate_jwt_token(&config, &token)?;

        assert_eq!(claims.user_id()?, user);
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.email, "alice@example.com");
        assert!(!claims.is_expired(&test_clocks::valid()));
        Ok(())
    }

    #[test]
    fn test_expired_token() -> ApiResult<()> {
        let mut config = test_config();
        config.jwt_expiration_secs = -1;
        let token = generate_jwt_token(&config, UserId::now_v7(), "Alice", "alice@example.com")?;

        config.clock = Arc::new(test_clocks::future());
        let result = validate_jwt_token(&config, &token);
        assert_eq!(result.map_err(|e| e.code), Err(ErrorCode::TokenExpired));
        Ok(())
    }

    #[test]
    fn test_wrong_secret_is_invalid_token() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, UserId::now_v7(), "Alice", "alice@example.com")?;

        let other = AuthConfig {
            jwt_secret: JwtSecret::new("another_secret".to_string())?,
            ..test_config()
        };
        let result = validate_jwt_token(&other, &token);
        assert_eq!(result.map_err(|e| e.code), Err(ErrorCode::InvalidToken));
        Ok(())
    }

    #[test]
    fn test_non_uuid_subject_is_rejected() {
        let claims = Claims {
            sub: "64f0c2a1e4b0a1b2c3d4e5f6".to_string(),
            name: String::new(),
            email: String::new(),
            iat: 0,
            exp: 0,
        };
        assert_eq!(claims.user_id().map_err(|e| e.code), Err(ErrorCode::InvalidToken));
    }

    #[test]
    fn test_token_without_sub_is_rejected() -> ApiResult<()> {
        let config = test_config();
        let claims = serde_json::json!({
            "id": "64f0c2a1e4b0a1b2c3d4e5f6",
            "name": "Alice",
            "email": "alice@example.com",
            "exp": 1_900_000_000i64,
        });
        let key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
        let token = encode(&Header::new(config.jwt_algorithm), &claims, &key)
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

        let result = validate_jwt_token(&config, &token);
        assert_eq!(result.map_err(|e| e.code), Err(ErrorCode::InvalidToken));
        Ok(())
    }

    #[test]
    fn test_extract_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_extract_token_ignores_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn test_secret_debug_is_redacted() -> ApiResult<()> {
        let secret = JwtSecret::new("super-secret-value".to_string())?;
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("REDACTED"));
        Ok(())
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(JwtSecret::new(String::new()).is_err());
    }
}
