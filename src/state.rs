use std::sync::Arc;

use crate::analysis::{AnalysisClient, HttpAnalysisClient};
use crate::config::AppConfig;
#[cfg(test)]
use crate::config::UploadConfig;
use crate::sessions::repo::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub analysis: Arc<dyn AnalysisClient>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let analysis = Arc::new(HttpAnalysisClient::new(&config.analysis)?) as Arc<dyn AnalysisClient>;
        tracing::info!(base_url = %config.analysis.base_url, "analysis client ready");
        Ok(Self::from_parts(Arc::new(config), analysis))
    }

    pub fn from_parts(config: Arc<AppConfig>, analysis: Arc<dyn AnalysisClient>) -> Self {
        Self {
            analysis,
            sessions: Arc::new(SessionRegistry::new(&config.sessions)),
            config,
        }
    }

    /// Web capped at 1024 bytes, mobile unbounded.
    #[cfg(test)]
    pub fn fake(analysis: Arc<dyn AnalysisClient>) -> Self {
        use crate::workflow::validation::ImageRules;

        Self::fake_with(
            analysis,
            UploadConfig {
                web: ImageRules::with_max_bytes(1024),
                mobile: ImageRules::unbounded(),
            },
        )
    }

    #[cfg(test)]
    pub fn fake_with(analysis: Arc<dyn AnalysisClient>, uploads: UploadConfig) -> Self {
        use crate::config::{AnalysisConfig, SessionConfig};

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            analysis: AnalysisConfig {
                base_url: "http://fake.local".into(),
                api_token: None,
                timeout: std::time::Duration::from_secs(5),
            },
            uploads,
            sessions: SessionConfig::default(),
        });
        Self::from_parts(config, analysis)
    }
}
