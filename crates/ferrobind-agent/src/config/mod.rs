//! Configuration loading for Ferrobind.
//! Reads ferrobind.toml from the current directory or the path in the
//! FERROBIND_CONFIG env var. Every field has a default, so a missing file or
//! section is not an error.

use std::path::Path;
use std::sync::Arc;

use ferrobind_common::SourceKind;
use ferrobind_ingestion::sources::{BioRxivAdapter, PubMedAdapter, ScopusAdapter, WosAdapter};
use ferrobind_ingestion::{AdapterOptions, AggregatorConfig, SourceAdapter};
use ferrobind_ner::ExtractorConfig;
use ferrobind_qa::QaConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "FERROBIND_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "ferrobind.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub aggregation: AggregatorConfig,
    #[serde(default)]
    pub extraction: ExtractorConfig,
    #[serde(default)]
    pub qa: QaConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_enabled")]
    pub enabled: Vec<SourceKind>,
    #[serde(default)]
    pub pubmed: SourceConfig,
    #[serde(default)]
    pub biorxiv: SourceConfig,
    #[serde(default)]
    pub scopus: SourceConfig,
    #[serde(default)]
    pub wos: SourceConfig,
}

fn default_enabled() -> Vec<SourceKind> {
    SourceKind::ALL.to_vec()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            pubmed: SourceConfig::default(),
            biorxiv: SourceConfig::default(),
            scopus: SourceConfig::default(),
            wos: SourceConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceConfig {
    pub api_key: Option<SecretString>,
    #[serde(flatten)]
    pub options: AdapterOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot location; unset keeps the store in memory only.
    #[serde(default = "default_store_path")]
    pub path: Option<String>,
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: i64,
}

fn default_store_path() -> Option<String> { Some("./data/ferrobind-store.json".to_string()) }
fn default_cache_ttl_hours() -> i64 { 24 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path(), cache_ttl_hours: default_cache_ttl_hours() }
    }
}


impl Config {
    /// Load configuration from ferrobind.toml.
    /// Checks FERROBIND_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    /// API keys missing from the file are taken from the environment.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml_str(&content)?;
            info!(path = %path.display(), "Configuration loaded");
            config
        } else {
            info!(path = %path.display(), "No config file found, using defaults");
            Self::default()
        };
        config.resolve_keys(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.qa.weights.validate()?;
        Ok(config)
    }

    /// Fill absent API keys from `lookup` (PUBMED_API_KEY, SCOPUS_API_KEY,
    /// WOS_API_KEY). Keys set in the file win.
    pub fn resolve_keys(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (source, var) in [
            (&mut self.sources.pubmed, "PUBMED_API_KEY"),
            (&mut self.sources.scopus, "SCOPUS_API_KEY"),
            (&mut self.sources.wos, "WOS_API_KEY"),
        ] {
            let missing = source.api_key.as_ref().map_or(true, |k| k.expose_secret().trim().is_empty());
            if missing {
                source.api_key = lookup(var).filter(|v| !v.trim().is_empty()).map(SecretString::from);
            }
        }
    }

    pub fn source(&self, kind: SourceKind) -> &SourceConfig {
        match kind {
            SourceKind::PubMed => &self.sources.pubmed,
            SourceKind::BioRxiv => &self.sources.biorxiv,
            SourceKind::Scopus => &self.sources.scopus,
            SourceKind::WebOfScience => &self.sources.wos,
        }
    }

    /// One adapter per enabled source, in enable order, duplicates dropped.
    pub fn build_adapters(&self) -> ferrobind_common::Result<Vec<Arc<dyn SourceAdapter>>> {
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        let mut seen = Vec::new();
        for &kind in &self.sources.enabled {
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);

            let source = self.source(kind);
            let key = source.api_key.as_ref().map(|k| k.expose_secret().to_string());
            if kind.requires_credentials() && key.is_none() {
                warn!(source = %kind, "Source enabled but no API key found; it will report unavailable");
            }
            let options = source.options.clone();
            let adapter: Arc<dyn SourceAdapter> = match kind {
                SourceKind::PubMed => Arc::new(PubMedAdapter::new(key, options)?),
                SourceKind::BioRxiv => Arc::new(BioRxivAdapter::new(options)?),
                SourceKind::Scopus => Arc::new(ScopusAdapter::new(key, options)?),
                SourceKind::WebOfScience => Arc::new(WosAdapter::new(key, options)?),
            };
            adapters.push(adapter);
        }
        Ok(adapters)
    }
}
