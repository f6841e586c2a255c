//! Natural-language collaborators.
//!
//! Grammar checking and sentiment analysis are external services; this module
//! only defines the contracts they satisfy plus thin HTTP clients. Language
//! detection and tokenization have small built-in defaults.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

lazy_static! {
    static ref WORD_TOKEN: Regex = Regex::new(r"\w+(?:['’\-]\w+)*|[^\w\s]").unwrap();
    static ref SENTENCE: Regex = Regex::new(r"[^.!?]+[.!?]*").unwrap();
}

const GERMAN_STOPWORDS: &[&str] = &[
    "der", "die", "das", "und", "ist", "nicht", "sie", "ich", "mit", "sich", "auf", "für", "ein",
    "eine", "dem", "den", "wir", "ihr", "ihre", "bitte", "vielen", "dank", "grüße", "sehr",
    "geehrte", "geehrter", "zu", "von", "auch", "wird", "werden", "haben",
];

const ENGLISH_STOPWORDS: &[&str] = &[
    "the", "and", "is", "not", "you", "your", "with", "for", "this", "that", "are", "we", "our",
    "please", "thanks", "thank", "regards", "dear", "to", "of", "in", "it", "be", "have", "will",
    "from", "on", "at", "by",
];

pub trait LanguageDetector: Send + Sync {
    /// ISO 639-1 code of the dominant language.
    fn detect(&self, text: &str) -> String;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tokens {
    pub words: Vec<String>,
    pub sentences: Vec<String>,
}

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str, language: &str) -> Tokens;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityReport {
    pub issue_count: usize,
    pub sentence_count: usize,
}

#[async_trait]
pub trait QualityChecker: Send + Sync {
    async fn check(&self, text: &str, language: &str) -> anyhow::Result<QualityReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub polarity: f64,
    pub subjectivity: f64,
}

#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    /// One entry per sentence.
    async fn analyze(&self, text: &str, language: &str) -> anyhow::Result<Vec<Sentiment>>;
}

/// Maps a detected language code to the locale tag grammar services expect.
pub fn locale_tag(language: &str) -> &'static str {
    match language {
        "de" => "de-DE",
        _ => "en-GB",
    }
}

/// Picks German or English by counting common function words.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopwordDetector;

impl LanguageDetector for StopwordDetector {
    fn detect(&self, text: &str) -> String {
        let lower = text.to_lowercase();
        let mut german = 0usize;
        let mut english = 0usize;

        for word in WORD_TOKEN.find_iter(&lower).map(|m| m.as_str()) {
            if GERMAN_STOPWORDS.contains(&word) {
                german += 1;
            }
            if ENGLISH_STOPWORDS.contains(&word) {
                english += 1;
            }
        }

        let code = if german > english { "de" } else { "en" };
        log::debug!("Language detection: de={german} en={english} -> {code}");
        code.to_string()
    }
}

/// Splits words from punctuation and sentences on terminal punctuation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexTokenizer;

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str, _language: &str) -> Tokens {
        let words = WORD_TOKEN
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        let sentences = SENTENCE
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .filter(|s| s.chars().any(char::is_alphanumeric))
            .map(str::to_string)
            .collect();
        Tokens { words, sentences }
    }
}

#[derive(Debug, Deserialize)]
struct LanguageToolResponse {
    matches: Vec<serde_json::Value>,
}

/// Client for a LanguageTool server (`POST {base}/v2/check`).
pub struct LanguageToolClient {
    client: reqwest::Client,
    base_url: String,
    tokenizer: Arc<dyn Tokenizer>,
}

impl LanguageToolClient {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokenizer,
        })
    }
}

#[async_trait]
impl QualityChecker for LanguageToolClient {
    async fn check(&self, text: &str, language: &str) -> anyhow::Result<QualityReport> {
        let url = format!("{}/v2/check", self.base_url);
        let response: LanguageToolResponse = self
            .client
            .post(&url)
            .form(&[("text", text), ("language", locale_tag(language))])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let sentence_count = self.tokenizer.tokenize(text, language).sentences.len();
        log::debug!(
            "LanguageTool reported {} issues over {sentence_count} sentences",
            response.matches.len()
        );

        Ok(QualityReport {
            issue_count: response.matches.len(),
            sentence_count,
        })
    }
}

#[derive(Debug, Serialize)]
struct SentimentRequest<'a> {
    text: &'a str,
    language: &'a str,
}

/// Client for a sentiment service that answers
/// `POST {url}` `{"text", "language"}` with `[{"polarity", "subjectivity"}, ...]`.
pub struct SentimentClient {
    client: reqwest::Client,
    url: String,
}

impl SentimentClient {
    pub fn new(url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SentimentAnalyzer for SentimentClient {
    async fn analyze(&self, text: &str, language: &str) -> anyhow::Result<Vec<Sentiment>> {
        let sentences = self
            .client
            .post(&self.url)
            .json(&SentimentRequest { text, language })
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Sentiment>>()
            .await?;
        Ok(sentences)
    }
}
