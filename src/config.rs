//! Application configuration loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working setup: the ACS ASAP feed as crawler, the external summary service
//! as enricher, and a cache directory under the current working directory.
//!
//! ```yaml
//! storage_dir: /var/lib/jctc_scout
//! crawler:
//!   kind: feed
//!   max_articles: 20
//! enricher:
//!   kind: llm
//!   template: jctc_translator
//! concurrency: 4
//! enrich_timeout_secs: 90
//! ```

use crate::crawlers::feed::JCTC_ASAP_FEED;
use crate::enrichers::http::DEFAULT_ENDPOINT;
use crate::error::BoxError;
use crate::pipeline::PipelineOptions;
use crate::store::DEFAULT_STORAGE_KEY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

fn default_max_articles() -> usize {
    10
}

fn default_crawler_template() -> String {
    "jctc_crawler".to_string()
}

fn default_enricher_template() -> String {
    "jctc_translator".to_string()
}

/// Which crawler discovers articles.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrawlerConfig {
    Feed {
        #[serde(default = "default_feed_url")]
        feed_url: String,
        #[serde(default = "default_max_articles")]
        max_articles: usize,
    },
    Llm {
        #[serde(default = "default_crawler_template")]
        template: String,
        #[serde(default = "default_max_articles")]
        max_articles: usize,
    },
}

fn default_feed_url() -> String {
    JCTC_ASAP_FEED.to_string()
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        CrawlerConfig::Feed {
            feed_url: default_feed_url(),
            max_articles: default_max_articles(),
        }
    }
}

/// Which enricher translates and summarizes new articles.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnricherConfig {
    Http {
        #[serde(default = "default_endpoint")]
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    Llm {
        #[serde(default = "default_enricher_template")]
        template: String,
    },
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for EnricherConfig {
    fn default() -> Self {
        EnricherConfig::Http {
            endpoint: default_endpoint(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the cache file.
    pub storage_dir: PathBuf,
    pub storage_key: String,
    pub crawler: CrawlerConfig,
    pub enricher: EnricherConfig,
    /// Maximum enrichment calls in flight.
    pub concurrency: usize,
    /// `0` disables the timeout.
    pub crawl_timeout_secs: u64,
    /// Per-article limit; `0` disables the timeout.
    pub enrich_timeout_secs: u64,
    /// Retries for LLM calls after the first attempt.
    pub max_retries: usize,
    /// `awful_aj` config file; defaults to the one in its config directory.
    pub llm_config_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(".jctc_scout"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            crawler: CrawlerConfig::default(),
            enricher: EnricherConfig::default(),
            concurrency: 12,
            crawl_timeout_secs: 120,
            enrich_timeout_secs: 60,
            max_retries: 5,
            llm_config_path: None,
        }
    }
}

impl AppConfig {
    /// Load from a YAML file, or fall back to defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, BoxError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        let config = Self::from_yaml(&raw)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, BoxError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        PipelineOptions {
            concurrency: self.concurrency.max(1),
            crawl_timeout: secs(self.crawl_timeout_secs),
            enrich_timeout: secs(self.enrich_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("").unwrap(), AppConfig::default());
        assert_eq!(AppConfig::from_yaml("{}").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
storage_dir: /tmp/scout
crawler:
  kind: llm
  max_articles: 5
enricher:
  kind: llm
concurrency: 3
enrich_timeout_secs: 0
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/scout"));
        assert_eq!(
            config.crawler,
            CrawlerConfig::Llm {
                template: "jctc_crawler".into(),
                max_articles: 5
            }
        );
        assert_eq!(
            config.enricher,
            EnricherConfig::Llm {
                template: "jctc_translator".into()
            }
        );
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.max_retries, 5);

        let options = config.pipeline_options();
        assert_eq!(options.concurrency, 3);
        assert_eq!(options.crawl_timeout, Some(Duration::from_secs(120)));
        assert_eq!(options.enrich_timeout, None);
    }

    #[test]
    fn test_http_enricher_with_key() {
        let yaml = "enricher:\n  kind: http\n  api_key: secret\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.enricher,
            EnricherConfig::Http {
                endpoint: DEFAULT_ENDPOINT.into(),
                api_key: Some("secret".into())
            }
        );
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(AppConfig::from_yaml("crawler:\n  kind: carrier_pigeon\n").is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(&path, "concurrency: 2\n").await.unwrap();
        let config = AppConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.concurrency, 2);

        assert!(AppConfig::load(Some(&dir.path().join("missing.yaml"))).await.is_err());
        assert_eq!(AppConfig::load(None).await.unwrap(), AppConfig::default());
    }
}
