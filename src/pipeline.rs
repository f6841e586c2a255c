//! Per-message scoring and the corpus worker pool.

use crate::authenticity::{AuthenticityResolver, OverrideTable};
use crate::config::Config;
use crate::error::MessageError;
use crate::heuristics::{Collaborators, HeuristicRegistry, MessageEntities};
use crate::language::{
    LanguageToolClient, QualityChecker, RegexTokenizer, SentimentAnalyzer, SentimentClient,
    StopwordDetector, Tokenizer,
};
use crate::liveness::{LivenessProbe, SystemResolver};
use crate::normalization::{parse_message, Address, HtmlToText, TagStripper};
use crate::reference_data::ReferenceData;
use anyhow::Context;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Scores of one message, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageResult {
    pub id: String,
    #[serde(serialize_with = "ordered_scores")]
    scores: Vec<(&'static str, f64)>,
}

fn ordered_scores<S: Serializer>(
    scores: &[(&'static str, f64)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(scores.len()))?;
    for (name, score) in scores {
        map.serialize_entry(name, score)?;
    }
    map.end()
}

impl MessageResult {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            scores: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, name: &'static str, score: f64) {
        self.scores.push((name, score));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, score)| *score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.scores.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageFailure {
    pub id: String,
    pub source: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusReport {
    pub results: Vec<MessageResult>,
    pub failures: Vec<MessageFailure>,
}

impl CorpusReport {
    /// Results arrive in completion order; reporting wants them by id.
    pub fn sort(&mut self) {
        self.results.sort_by(|a, b| a.id.cmp(&b.id));
        self.failures
            .sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.source.cmp(&b.source)));
    }
}

#[derive(Debug, Clone)]
pub enum MessageSource {
    File(PathBuf),
    Bytes { id: String, data: Vec<u8> },
}

impl MessageSource {
    pub fn id(&self) -> String {
        match self {
            MessageSource::File(path) => message_id(path),
            MessageSource::Bytes { id, .. } => id.clone(),
        }
    }

    fn describe(&self) -> String {
        match self {
            MessageSource::File(path) => path.display().to_string(),
            MessageSource::Bytes { id, .. } => format!("<bytes:{id}>"),
        }
    }

    async fn read(&self) -> Result<Vec<u8>, MessageError> {
        match self {
            MessageSource::File(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| MessageError::Io {
                        path: path.clone(),
                        source,
                    })
            }
            MessageSource::Bytes { data, .. } => Ok(data.clone()),
        }
    }
}

/// Incident id encoded in the file name: everything before the first `_`
/// of the file stem, e.g. `4711_invoice.eml` -> `4711`.
pub fn message_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once('_') {
        Some((id, _)) => id.to_string(),
        None => stem,
    }
}

/// A single `.eml` file, or every `*.eml` directly inside a directory.
pub fn collect_sources<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<MessageSource>> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(vec![MessageSource::File(path.to_path_buf())]);
    }

    let entries = std::fs::read_dir(path)
        .with_context(|| format!("Failed to read corpus directory: {}", path.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry_path = entry?.path();
        let is_eml = entry_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));
        if is_eml && entry_path.is_file() {
            files.push(entry_path);
        }
    }
    files.sort();

    log::info!("Found {} messages in {}", files.len(), path.display());
    Ok(files.into_iter().map(MessageSource::File).collect())
}

pub struct Pipeline {
    registry: HeuristicRegistry,
    data: Arc<ReferenceData>,
    authenticity: AuthenticityResolver,
    html: Arc<dyn HtmlToText>,
}

impl Pipeline {
    pub fn new(
        registry: HeuristicRegistry,
        data: Arc<ReferenceData>,
        authenticity: AuthenticityResolver,
        html: Arc<dyn HtmlToText>,
    ) -> Self {
        Self {
            registry,
            data,
            authenticity,
            html,
        }
    }

    /// Loads reference data and wires the default collaborators.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let data = ReferenceData::load(&config.reference_data, &config.external_marker)?;

        let resolver = SystemResolver::from_system_conf(config.probe.dns_timeout())
            .context("Failed to initialise DNS resolver")?;
        let probe = LivenessProbe::new(config.probe.ports.clone(), config.probe.connect_timeout());
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(RegexTokenizer);

        let quality: Option<Arc<dyn QualityChecker>> = match &config.nlp.languagetool_url {
            Some(url) => Some(Arc::new(LanguageToolClient::new(
                url,
                config.nlp.request_timeout(),
                tokenizer.clone(),
            )?)),
            None => None,
        };
        let sentiment: Option<Arc<dyn SentimentAnalyzer>> = match &config.nlp.sentiment_url {
            Some(url) => Some(Arc::new(SentimentClient::new(
                url,
                config.nlp.request_timeout(),
            )?)),
            None => None,
        };

        let collaborators = Collaborators {
            resolver: Arc::new(resolver),
            probe,
            detector: Arc::new(StopwordDetector),
            tokenizer,
            quality,
            sentiment,
        };

        let registry = HeuristicRegistry::standard(&collaborators);
        log::info!("Registered checks: {}", registry.names().join(", "));

        let overrides = OverrideTable::new(config.overrides.clone());
        if !overrides.is_empty() {
            log::info!("Loaded {} authenticity overrides", overrides.len());
        }

        Ok(Self::new(
            registry,
            Arc::new(data),
            AuthenticityResolver::new(overrides),
            Arc::new(TagStripper),
        ))
    }

    /// Normalizes the message, resolves authenticity once, then runs every
    /// check.
    pub async fn process(&self, source: &MessageSource) -> Result<MessageResult, MessageError> {
        let raw = source.read().await?;
        let parsed = parse_message(&raw, self.html.as_ref())?;

        let sender = Address::parse(parsed.headers.get_or("From", ""));
        let recipient = Address::parse(parsed.headers.get_or("To", ""));
        let authenticity = self.authenticity.analyze(&parsed.headers);

        let entities = MessageEntities {
            id: source.id(),
            headers: parsed.headers,
            sender,
            recipient,
            content: parsed.content,
            authenticity,
        };

        self.registry.run(&entities, &self.data).await
    }

    /// Scores a corpus with `workers` tasks pulling from a shared queue.
    /// Failed messages are recorded and do not stop the run.
    pub async fn process_corpus(
        self: Arc<Self>,
        sources: Vec<MessageSource>,
        workers: usize,
    ) -> CorpusReport {
        let total = sources.len();
        let workers = workers.clamp(1, total.max(1));
        let queue = Arc::new(Mutex::new(VecDeque::from(sources)));
        let report = Arc::new(Mutex::new(CorpusReport::default()));

        log::info!("Scoring {total} messages with {workers} workers");

        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|worker| {
                let pipeline = Arc::clone(&self);
                let queue = Arc::clone(&queue);
                let report = Arc::clone(&report);
                tokio::spawn(async move {
                    loop {
                        let next = queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .pop_front();
                        let Some(source) = next else {
                            break;
                        };

                        log::info!("Worker #{worker} :: {}", source.describe());
                        let outcome = pipeline.process(&source).await;

                        let mut collected = report.lock().unwrap_or_else(PoisonError::into_inner);
                        match outcome {
                            Ok(result) => collected.results.push(result),
                            Err(e) => {
                                log::warn!("Skipping {}: {e}", source.describe());
                                collected.failures.push(MessageFailure {
                                    id: source.id(),
                                    source: source.describe(),
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Worker task failed: {e}");
            }
        }

        let mut report = std::mem::take(&mut *report.lock().unwrap_or_else(PoisonError::into_inner));
        report.sort();
        log::info!(
            "Scored {} messages, {} failed",
            report.results.len(),
            report.failures.len()
        );
        report
    }
}
