//! spacetraveling: a static blog generator fed by the Prismic headless CMS
//!
//! Posts are fetched from the CMS, normalized into plain display fields and
//! rendered with embedded Tera templates into a listing page and one page per
//! post. The listing grows on demand through the pagination client.

pub mod cms;
pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod pagination;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::Path;

/// The blog application
#[derive(Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: std::path::PathBuf,
    /// Source directory (static assets copied verbatim)
    pub source_dir: std::path::PathBuf,
    /// Public (output) directory
    pub public_dir: std::path::PathBuf,
}

impl Blog {
    /// Create a new Blog instance from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };
        config.apply_env();

        Ok(Self::with_config(base_dir, config))
    }

    /// Create a Blog instance from an already loaded configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let source_dir = base_dir.join(&config.source_dir);
        let public_dir = base_dir.join(&config.public_dir);

        Self {
            config,
            base_dir,
            source_dir,
            public_dir,
        }
    }

    /// Generate the static site
    pub async fn generate(&self) -> Result<()> {
        commands::generate::run(self).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
