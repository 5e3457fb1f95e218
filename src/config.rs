use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "verdiq.json";
pub const DEFAULT_TRACKING_ID: &str = "factbench-r-20";
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Hosts accepted for affiliate links. Subdomains (`www.`, `smile.`) match too.
pub const DEFAULT_AFFILIATE_DOMAINS: &[&str] = &[
    "amazon.com",
    "amazon.co.uk",
    "amazon.ca",
    "amazon.de",
    "amazon.fr",
    "amazon.it",
    "amazon.es",
    "amazon.co.jp",
    "amazon.in",
    "amazon.com.au",
    "amazon.com.br",
    "amazon.com.mx",
    "amzn.to",
];

pub const DEFAULT_TRACKING_PARAMS: &[&str] = &["tag", "AssociateTag"];

/// Settings for one pipeline run.
///
/// Built-in defaults, overridden by a JSON file, overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub store_path: PathBuf,
    pub manifest_path: PathBuf,
    pub page_path: PathBuf,
    pub report_dir: PathBuf,
    pub image_dir: PathBuf,
    /// Prefix written into `imageRef` once an image is stored locally.
    pub image_public_prefix: String,
    pub tracking_id: String,
    pub affiliate_domains: Vec<String>,
    pub tracking_params: Vec<String>,
    pub chunk_size: usize,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/products.json"),
            manifest_path: PathBuf::from("golden-data/manifest.json"),
            page_path: PathBuf::from("pages/best-robotic-pool-cleaners.html"),
            report_dir: PathBuf::from("reports"),
            image_dir: PathBuf::from("assets/images/products"),
            image_public_prefix: "/assets/images/products".to_string(),
            tracking_id: DEFAULT_TRACKING_ID.to_string(),
            affiliate_domains: DEFAULT_AFFILIATE_DOMAINS.iter().map(|d| d.to_string()).collect(),
            tracking_params: DEFAULT_TRACKING_PARAMS.iter().map(|p| p.to_string()).collect(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            fetch_timeout_secs: 10,
            user_agent: "Mozilla/5.0 (compatible; VerdiqCatalog/1.0)".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Loads `path` when given, else `verdiq.json` if present, else defaults.
    /// An explicitly named file that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !path.exists() {
            if explicit {
                return Err(PipelineError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.check()?;
        tracing::debug!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunkSize must be at least 1".into()));
        }
        if self.tracking_id.trim().is_empty() {
            return Err(PipelineError::Config("trackingId must not be empty".into()));
        }
        if self.affiliate_domains.is_empty() {
            return Err(PipelineError::Config(
                "affiliateDomains must list at least one domain".into(),
            ));
        }
        if self.tracking_params.is_empty() {
            return Err(PipelineError::Config(
                "trackingParams must list at least one parameter name".into(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn affiliate_policy(&self) -> crate::affiliate::AffiliatePolicy {
        crate::affiliate::AffiliatePolicy {
            tracking_id: self.tracking_id.clone(),
            domains: self.affiliate_domains.clone(),
            tracking_params: self.tracking_params.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verdiq.json");
        fs::write(&path, r#"{ "trackingId": "mystore-20", "chunkSize": 3 }"#).unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.tracking_id, "mystore-20");
        assert_eq!(config.chunk_size, 3);
        assert_eq!(config.store_path, PathBuf::from("data/products.json"));
        assert_eq!(config.tracking_params, vec!["tag", "AssociateTag"]);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = PipelineConfig {
            chunk_size: 0,
            ..PipelineConfig::default()
        };
        assert!(config.check().is_err());
    }
}
