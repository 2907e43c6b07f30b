//! API Configuration Module
//!
//! CORS, request limits and storage backend selection, loaded from
//! environment variables with defaults suited to local development.

use std::str::FromStr;

// ============================================================================
// STORAGE BACKEND
// ============================================================================

/// Which [`slotswap_storage::SlotStore`] implementation serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Process-local store; data is lost on restart
    #[default]
    Memory,
    /// PostgreSQL via deadpool
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" | "pg" => Ok(StorageBackend::Postgres),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    /// The `token` cookie only crosses origins when this is set.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Request Limits
    // ========================================================================
    /// Requests processed at once; further requests wait.
    pub max_concurrent_requests: usize,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,

    // ========================================================================
    // Storage
    // ========================================================================
    pub storage: StorageBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            max_concurrent_requests: 512,
            max_body_bytes: 64 * 1024,
            storage: StorageBackend::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SLOTSWAP_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `SLOTSWAP_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `SLOTSWAP_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `SLOTSWAP_MAX_CONCURRENT_REQUESTS`: (default: 512)
    /// - `SLOTSWAP_MAX_BODY_BYTES`: (default: 65536)
    /// - `SLOTSWAP_STORAGE`: "memory" or "postgres" (default: memory)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("SLOTSWAP_CORS_ORIGINS")
            .ok()
            .map(|s| parse_origins(&s))
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("SLOTSWAP_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(defaults.cors_allow_credentials);

        let cors_max_age_secs = std::env::var("SLOTSWAP_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let max_concurrent_requests = std::env::var("SLOTSWAP_MAX_CONCURRENT_REQUESTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.max_concurrent_requests);

        let max_body_bytes = std::env::var("SLOTSWAP_MAX_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_body_bytes);

        let storage = match std::env::var("SLOTSWAP_STORAGE") {
            Ok(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Falling back to in-memory storage");
                StorageBackend::Memory
            }),
            Err(_) => defaults.storage,
        };

        Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            max_concurrent_requests,
            max_body_bytes,
            storage,
        }
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert_eq!(config.cors_max_age_secs, 86400);
        assert_eq!(config.storage, StorageBackend::Memory);
    }

    #[test]
    fn test_origin_allowed_dev_mode() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("https://anything.com"));
        assert!(config.is_origin_allowed("http://localhost:5173"));
    }

    #[test]
    fn test_origin_allowed_production() {
        let config = ApiConfig {
            cors_origins: parse_origins("https://slotswap.app, https://www.slotswap.app,"),
            ..ApiConfig::default()
        };
        assert_eq!(config.cors_origins.len(), 2);
        assert!(config.is_origin_allowed("https://slotswap.app"));
        assert!(config.is_origin_allowed("https://www.slotswap.app"));
        assert!(!config.is_origin_allowed("https://evil.com"));
        assert!(!config.is_origin_allowed("https://notslotswap.app"));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let config = ApiConfig {
            cors_origins: vec!["*.slotswap.app".to_string()],
            ..ApiConfig::default()
        };
        assert!(config.is_origin_allowed("https://team.slotswap.app"));
        assert!(!config.is_origin_allowed("https://evilslotswap.app"));
        assert!(!config.is_origin_allowed("http://team.slotswap.app"));
    }

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("memory".parse(), Ok(StorageBackend::Memory));
        assert_eq!("Postgres".parse(), Ok(StorageBackend::Postgres));
        assert_eq!(" pg ".parse(), Ok(StorageBackend::Postgres));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }
}
