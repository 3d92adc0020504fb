//! Service configuration loaded from `deckgate.toml`.
//!
//! Every field has a default, so a missing file is not an error unless a
//! path was given explicitly. Deployment-specific values (bind address,
//! webhook URLs, test account, store path) can be overridden through
//! `DECKGATE_*` environment variables, which take precedence over the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::gate::GateConfig;
use crate::poller::PollerConfig;

pub const DEFAULT_CONFIG_FILE: &str = "deckgate.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct DeckgateConfig {
    /// Address the HTTP surface listens on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// JSON file backing the record store. Records are created by the
    /// upload pipeline writing this file; the gate only updates them.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub poller: PollerConfig,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("deckgate-projects.json")
}

fn default_webhook_timeout_secs() -> u64 {
    30
}

impl Default for DeckgateConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            store_path: default_store_path(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
            gate: GateConfig::default(),
            poller: PollerConfig::default(),
        }
    }
}

impl DeckgateConfig {
    /// Load from `path`, or from `deckgate.toml` in the working directory
    /// when no path is given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                Self::from_file(path)?
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Apply `DECKGATE_*` overrides. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bind) = var("DECKGATE_BIND") {
            self.bind = bind;
        }
        if let Some(path) = var("DECKGATE_STORE_PATH") {
            self.store_path = PathBuf::from(path);
        }
        if let Some(url) = var("DECKGATE_WEBHOOK_URL") {
            self.gate.webhook.url = Some(url);
        }
        if let Some(url) = var("DECKGATE_WEBHOOK_URL_TEST") {
            self.gate.webhook.test_url = Some(url);
        }
        if let Some(id) = var("DECKGATE_TEST_ACCOUNT_ID") {
            self.gate.webhook.test_account_id = Some(id);
        }
    }
}
