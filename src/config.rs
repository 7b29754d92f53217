use std::time::Duration;

use crate::workflow::validation::{ImageRules, Surface, DEFAULT_MAX_IMAGE_BYTES};

pub const DEFAULT_ANALYSIS_BASE_URL: &str = "https://burn-1.onrender.com/api/v1/ask_llama";
pub const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

/// Image rules per client surface. Both default to the same cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadConfig {
    pub web: ImageRules,
    pub mobile: ImageRules,
}

impl UploadConfig {
    pub fn rules_for(&self, surface: Surface) -> ImageRules {
        match surface {
            Surface::Web => self.web,
            Surface::Mobile => self.mobile,
        }
    }

    /// Request body limit for uploads: the largest cap plus room for multipart framing.
    pub fn body_limit(&self) -> usize {
        const HEADROOM: u64 = 64 * 1024;
        const UNBOUNDED_LIMIT: u64 = 20 * 1024 * 1024;
        let largest = match (self.web.max_bytes, self.mobile.max_bytes) {
            (Some(a), Some(b)) => a.max(b) + HEADROOM,
            _ => UNBOUNDED_LIMIT.max(
                self.web
                    .max_bytes
                    .or(self.mobile.max_bytes)
                    .unwrap_or_default()
                    + HEADROOM,
            ),
        };
        usize::try_from(largest).unwrap_or(usize::MAX)
    }
}

/// Lifetime limits for in-memory sessions.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_TTL_SECS),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl SessionConfig {
    /// How often idle sessions are swept.
    pub fn sweep_every(&self) -> Duration {
        (self.idle_ttl / 4).max(Duration::from_secs(1))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub analysis: AnalysisConfig,
    pub uploads: UploadConfig,
    pub sessions: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let analysis = AnalysisConfig {
            base_url: std::env::var("ANALYSIS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_ANALYSIS_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            api_token: std::env::var("ANALYSIS_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            timeout: Duration::from_secs(
                std::env::var("ANALYSIS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(30),
            ),
        };
        let uploads = UploadConfig {
            web: rules_from_env("MAX_IMAGE_BYTES_WEB"),
            mobile: rules_from_env("MAX_IMAGE_BYTES_MOBILE"),
        };
        let sessions = SessionConfig {
            idle_ttl: Duration::from_secs(
                std::env::var("SESSION_IDLE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|&v| v > 0)
                    .unwrap_or(DEFAULT_SESSION_IDLE_TTL_SECS),
            ),
            max_sessions: std::env::var("MAX_SESSIONS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&v| v > 0)
                .unwrap_or(DEFAULT_MAX_SESSIONS),
        };
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);
        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            analysis,
            uploads,
            sessions,
        })
    }
}

fn rules_from_env(key: &str) -> ImageRules {
    let max = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_IMAGE_BYTES);
    parse_rules(max)
}

fn parse_rules(max: u64) -> ImageRules {
    // 0 disables the cap
    if max == 0 {
        ImageRules::unbounded()
    } else {
        ImageRules::with_max_bytes(max)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn zero_means_unbounded() {
        assert_eq!(parse_rules(0), ImageRules::unbounded());
        assert_eq!(parse_rules(5), ImageRules::with_max_bytes(5));
    }

    #[test]
    fn surfaces_share_default_cap() {
        let uploads = UploadConfig::default();
        assert_eq!(uploads.rules_for(Surface::Web), uploads.rules_for(Surface::Mobile));
        assert_eq!(
            uploads.rules_for(Surface::Web).max_bytes,
            Some(DEFAULT_MAX_IMAGE_BYTES)
        );
    }

    #[test]
    fn body_limit_covers_largest_cap() {
        let uploads = UploadConfig {
            web: ImageRules::with_max_bytes(1024),
            mobile: ImageRules::with_max_bytes(4096),
        };
        assert!(uploads.body_limit() > 4096);

        let open = UploadConfig {
            web: ImageRules::unbounded(),
            mobile: ImageRules::with_max_bytes(1024),
        };
        assert!(open.body_limit() >= 20 * 1024 * 1024);
    }

    #[test]
    fn sweeps_several_times_per_ttl() {
        let sessions = SessionConfig::default();
        assert_eq!(sessions.idle_ttl, Duration::from_secs(1800));
        assert_eq!(sessions.sweep_every(), Duration::from_secs(450));

        let short = SessionConfig {
            idle_ttl: Duration::from_secs(2),
            max_sessions: 1,
        };
        assert_eq!(short.sweep_every(), Duration::from_secs(1));
    }
}
