//! Deployment descriptor
//!
//! Describes what the hosted site needs: the environment it must be given,
//! the CDN cache policy in front of the server, and log retention. The
//! descriptor is emitted as JSON by the `deploy-manifest` binary and consumed
//! by the infrastructure tooling.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::AppError;

/// Variables the site cannot start without
pub const REQUIRED_ENV: [&str; 5] = [
    "DATABASE_URL",
    "NEXTAUTH_URL",
    "NEXTAUTH_SECRET",
    "GOOGLE_ID",
    "GOOGLE_SECRET",
];

/// Variables whose values must not be printed
const SECRET_ENV: [&str; 3] = ["DATABASE_URL", "NEXTAUTH_SECRET", "GOOGLE_SECRET"];

const APP_NAME: &str = "pantry-tracker";
const APP_REGION: &str = "us-east-1";
const LOG_RETENTION_DAYS: u32 = 30;
const DAY_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentDescriptor {
    pub name: String,
    pub region: String,
    pub site: SiteSpec,
    /// Stack outputs reported after deploy
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteSpec {
    pub environment: BTreeMap<String, String>,
    pub server_cache_policy: CachePolicy,
    pub log_retention_days: u32,
}

/// CDN cache policy for server-rendered responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachePolicy {
    pub query_string_behavior: CacheBehavior,
    pub header_behavior: CacheBehavior,
    pub cookie_behavior: CacheBehavior,
    pub default_ttl_secs: u64,
    pub max_ttl_secs: u64,
    pub min_ttl_secs: u64,
    pub enable_accept_encoding_brotli: bool,
    pub enable_accept_encoding_gzip: bool,
}

/// Which parts of a request take part in the cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBehavior {
    All,
    None,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            query_string_behavior: CacheBehavior::All,
            header_behavior: CacheBehavior::None,
            cookie_behavior: CacheBehavior::None,
            default_ttl_secs: 0,
            max_ttl_secs: 365 * DAY_SECS,
            min_ttl_secs: 0,
            enable_accept_encoding_brotli: true,
            enable_accept_encoding_gzip: true,
        }
    }
}

impl DeploymentDescriptor {
    /// Build the descriptor from the process environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the descriptor from any variable source
    ///
    /// # Errors
    /// `Config` naming the first required variable that is missing or empty
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut environment = BTreeMap::new();
        for key in REQUIRED_ENV {
            let value = lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    AppError::Config(format!("Missing required environment variable: {key}"))
                })?;
            environment.insert(key.to_string(), value);
        }
        environment.insert("AUTH_TRUST_HOST".to_string(), "true".to_string());

        Ok(Self {
            name: APP_NAME.to_string(),
            region: APP_REGION.to_string(),
            site: SiteSpec {
                environment,
                server_cache_policy: CachePolicy::default(),
                log_retention_days: LOG_RETENTION_DAYS,
            },
            outputs: vec!["SiteUrl".to_string()],
        })
    }

    /// Copy with secret values masked, safe to print
    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        for key in SECRET_ENV {
            if let Some(value) = redacted.site.environment.get_mut(key) {
                *value = "<redacted>".to_string();
            }
        }
        redacted
    }
}
