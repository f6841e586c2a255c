use crate::liveness::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAIL_PORTS};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of messages scored concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
    pub reference_data: ReferenceDataPaths,
    /// Authenticity overrides keyed `"<protocol>-<result>"`.
    #[serde(default)]
    pub overrides: HashMap<String, String>,
    /// Subject tag the gateway adds to mail from outside the organisation.
    #[serde(default = "default_external_marker")]
    pub external_marker: String,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub nlp: NlpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDataPaths {
    pub denylist: String,
    pub allowlist: String,
    pub buzzwords_spam: String,
    pub buzzwords_evil: String,
    pub blocked_subject: String,
    pub mail_providers: String,
    pub abused_tlds: String,
    pub typosquat_table: String,
    /// Code points as hex, one per line. Built-in ranges are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emojis: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub ports: Vec<u16>,
    pub connect_timeout_secs: u64,
    pub dns_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlpConfig {
    /// LanguageTool server; the text quality check is skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languagetool_url: Option<String>,
    /// Sentiment service; the intent check is skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_workers() -> usize {
    4
}

fn default_external_marker() -> String {
    "[EXT]".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: default_workers(),
            reference_data: ReferenceDataPaths::default(),
            overrides: HashMap::new(),
            external_marker: default_external_marker(),
            probe: ProbeConfig::default(),
            nlp: NlpConfig::default(),
        }
    }
}

impl Default for ReferenceDataPaths {
    fn default() -> Self {
        ReferenceDataPaths {
            denylist: "data/denylist.txt".to_string(),
            allowlist: "data/allowlist.txt".to_string(),
            buzzwords_spam: "data/buzzwords_spam.txt".to_string(),
            buzzwords_evil: "data/buzzwords_evil.txt".to_string(),
            blocked_subject: "data/blocked_subject.txt".to_string(),
            mail_providers: "data/mail_providers.txt".to_string(),
            abused_tlds: "data/most_abused_tlds.txt".to_string(),
            typosquat_table: "data/typosquatted.json".to_string(),
            emojis: None,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            ports: DEFAULT_MAIL_PORTS.to_vec(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            dns_timeout_secs: 5,
        }
    }
}

impl Default for NlpConfig {
    fn default() -> Self {
        NlpConfig {
            languagetool_url: None,
            sentiment_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }
}

impl NlpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Loads `path`, or the defaults when the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }
}
