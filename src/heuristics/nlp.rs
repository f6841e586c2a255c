//! Checks backed by external language services. A service failure never
//! fails the message; the check logs it and scores 0.

use super::{Heuristic, MessageEntities};
use crate::error::MessageError;
use crate::language::{LanguageDetector, QualityChecker, SentimentAnalyzer};
use crate::reference_data::ReferenceData;
use async_trait::async_trait;
use std::sync::Arc;

/// Grammar and spelling issues per hundred sentences.
pub struct TextQuality {
    detector: Arc<dyn LanguageDetector>,
    checker: Arc<dyn QualityChecker>,
}

impl TextQuality {
    pub fn new(detector: Arc<dyn LanguageDetector>, checker: Arc<dyn QualityChecker>) -> Self {
        Self { detector, checker }
    }
}

#[async_trait]
impl Heuristic for TextQuality {
    fn name(&self) -> &'static str {
        "text_quality"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        _data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let text = message.content.as_str();
        let language = self.detector.detect(text);

        match self.checker.check(text, &language).await {
            Ok(report) if report.sentence_count == 0 => Ok(0.0),
            Ok(report) => {
                Ok(100.0 / report.sentence_count as f64 * report.issue_count as f64)
            }
            Err(e) => {
                log::warn!("{}: quality check unavailable: {e:#}", message.id);
                Ok(0.0)
            }
        }
    }
}

/// Combined magnitude of polarity and subjectivity, averaged per sentence.
pub struct IntentScore {
    detector: Arc<dyn LanguageDetector>,
    analyzer: Arc<dyn SentimentAnalyzer>,
}

impl IntentScore {
    pub fn new(detector: Arc<dyn LanguageDetector>, analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        Self { detector, analyzer }
    }
}

#[async_trait]
impl Heuristic for IntentScore {
    fn name(&self) -> &'static str {
        "intent_score"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        _data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let text = message.content.as_str();
        let language = self.detector.detect(text);

        let sentences = match self.analyzer.analyze(text, &language).await {
            Ok(sentences) => sentences,
            Err(e) => {
                log::warn!("{}: sentiment analysis unavailable: {e:#}", message.id);
                return Ok(0.0);
            }
        };

        if sentences.is_empty() {
            return Ok(0.0);
        }

        let polarity: f64 = sentences.iter().map(|s| s.polarity).sum();
        let subjectivity: f64 = sentences.iter().map(|s| s.subjectivity).sum();
        Ok((polarity.abs() + subjectivity.abs()) / sentences.len() as f64)
    }
}
