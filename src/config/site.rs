//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Environment variable overriding `prismic.endpoint`
pub const ENV_API_ENDPOINT: &str = "PRISMIC_API_ENDPOINT";

/// Environment variable overriding `prismic.access_token`
pub const ENV_ACCESS_TOKEN: &str = "PRISMIC_ACCESS_TOKEN";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub language: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub source_dir: String,
    pub public_dir: String,

    // Date format
    pub date_format: String,

    // Reading time
    pub words_per_minute: usize,

    // Seconds between background rebuilds while serving
    pub revalidate: u64,

    // Content source
    #[serde(default)]
    pub prismic: PrismicConfig,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            description: String::new(),
            language: "pt_BR".to_string(),

            url: "http://localhost:3000".to_string(),
            root: "/".to_string(),

            source_dir: "source".to_string(),
            public_dir: "public".to_string(),

            date_format: "DD MMM YYYY".to_string(),

            words_per_minute: 150,

            revalidate: 60 * 60 * 24,

            prismic: PrismicConfig::default(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `PRISMIC_API_ENDPOINT` / `PRISMIC_ACCESS_TOKEN` from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_API_ENDPOINT).ok(),
            std::env::var(ENV_ACCESS_TOKEN).ok(),
        );
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, access_token: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            tracing::debug!("Using CMS endpoint from {}", ENV_API_ENDPOINT);
            self.prismic.endpoint = endpoint;
        }
        if let Some(token) = access_token.filter(|t| !t.trim().is_empty()) {
            self.prismic.access_token = Some(token);
        }
    }
}

/// Prismic repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrismicConfig {
    /// API v2 entry point, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    pub document_type: String,
    pub page_size: usize,
}

impl Default for PrismicConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "post".to_string(),
            page_size: 1,
        }
    }
}
