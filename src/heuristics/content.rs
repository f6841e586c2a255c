use super::{Heuristic, MessageEntities};
use crate::error::MessageError;
use crate::language::{LanguageDetector, Tokenizer};
use crate::normalization::Address;
use crate::reference_data::ReferenceData;
use crate::similarity::{fuzzy_ratio, sequence_ratio, word_windows};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

lazy_static! {
    static ref BITCOIN_ADDRESS: Regex = Regex::new(r"^(bc1|[13])[a-zA-HJ-NP-Z0-9]{25,39}$").unwrap();
    // Body text is lower-cased, so the base58 alphabet is matched without case.
    static ref MONERO_ADDRESS: Regex =
        Regex::new(r"(?i)^4[0-9ab][1-9a-z]{93}$").unwrap();
}

/// Fuzzy matches of the buzzword lists against the body, plus literal
/// occurrences of denylisted entries.
pub struct BuzzwordScore;

impl BuzzwordScore {
    /// Best fuzzy similarity (0-100) of `buzzword` against any window of the
    /// same word count. Windows are cached per width.
    fn best_similarity(
        text: &str,
        buzzword: &str,
        windows: &mut HashMap<usize, Vec<String>>,
    ) -> u32 {
        let buzzword = buzzword.to_lowercase();
        let width = buzzword.split(' ').count();
        windows
            .entry(width)
            .or_insert_with(|| word_windows(text, width))
            .iter()
            .map(|window| fuzzy_ratio(&buzzword, window))
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Heuristic for BuzzwordScore {
    fn name(&self) -> &'static str {
        "buzzword_score"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let text = message.content.as_str();
        let mut windows = HashMap::new();
        let mut score = 0.0;

        for buzzword in &data.buzzwords_evil {
            let similarity = Self::best_similarity(text, buzzword, &mut windows);
            if similarity >= 90 {
                score += 2.0;
            } else if similarity >= 70 {
                score += 1.0;
            }
        }

        for buzzword in &data.buzzwords_spam {
            let similarity = Self::best_similarity(text, buzzword, &mut windows);
            if similarity >= 90 {
                log::debug!("{}: spam buzzword {buzzword:?} matched", message.id);
                score += 1.0;
            } else if similarity >= 70 {
                log::debug!("{}: spam buzzword {buzzword:?} partially matched", message.id);
                score += 0.5;
            }
        }

        let denylisted = data
            .denylist
            .iter()
            .filter(|entry| text.contains(entry.as_str()))
            .count();
        score += 0.5 * denylisted as f64;

        Ok(score)
    }
}

/// +1 per token shaped like a Bitcoin or Monero address.
pub struct CoinAddressScore;

#[async_trait]
impl Heuristic for CoinAddressScore {
    fn name(&self) -> &'static str {
        "coin_address_score"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        _data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let mut score = 0.0;
        for token in word_windows(message.content.as_str(), 1) {
            if BITCOIN_ADDRESS.is_match(&token) {
                score += 1.0;
            }
            if MONERO_ADDRESS.is_match(&token) {
                score += 1.0;
            }
        }
        Ok(score)
    }
}

/// Whether the opening mentions the sender and the closing mentions the
/// recipient by name.
pub struct GreetingScore {
    detector: Arc<dyn LanguageDetector>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl GreetingScore {
    pub fn new(detector: Arc<dyn LanguageDetector>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            detector,
            tokenizer,
        }
    }

    /// Highest similarity between any token and either name part.
    fn best_name_match(tokens: &[String], person: &Address) -> f64 {
        let first = person.first_name().unwrap_or_default().to_lowercase();
        let last = person.last_name().unwrap_or_default().to_lowercase();

        tokens
            .iter()
            .map(|token| token.to_lowercase())
            .flat_map(|token| [sequence_ratio(&last, &token), sequence_ratio(&first, &token)])
            .fold(0.0, f64::max)
    }
}

#[async_trait]
impl Heuristic for GreetingScore {
    fn name(&self) -> &'static str {
        "greeting_score"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        _data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let text = message.content.as_str();
        let language = self.detector.detect(text);
        let words = self.tokenizer.tokenize(text, &language).words;

        let window = (words.len() as f64 / 10.0).round_ties_even() as usize;
        let opening = &words[..window];
        let closing = &words[words.len() - window..];

        Ok(Self::best_name_match(opening, &message.sender)
            + Self::best_name_match(closing, &message.recipient))
    }
}

/// Share of questions among sentence terminators, scaled by 3.
pub struct QuestionRatio;

#[async_trait]
impl Heuristic for QuestionRatio {
    fn name(&self) -> &'static str {
        "question_ratio"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        _data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let sentences = message.content.count('.');
        let questions = message.content.count('?');
        if sentences + questions == 0 {
            return Ok(0.0);
        }
        Ok(questions as f64 / (sentences + questions) as f64 * 3.0)
    }
}
