//! Independent scoring checks and the ordered registry that runs them.
//!
//! Every check sees the same immutable [`MessageEntities`] and
//! [`ReferenceData`] and never reads another check's output.

pub mod authenticity;
pub mod content;
pub mod date;
pub mod network;
pub mod nlp;
pub mod sender;
pub mod subject;

use crate::authenticity::AuthenticityReport;
use crate::error::MessageError;
use crate::language::{LanguageDetector, QualityChecker, SentimentAnalyzer, Tokenizer};
use crate::liveness::{HostResolver, LivenessProbe};
use crate::normalization::{Address, Content, HeaderSet};
use crate::pipeline::MessageResult;
use crate::reference_data::ReferenceData;
use async_trait::async_trait;
use std::sync::Arc;

/// Everything the checks may look at for one message.
#[derive(Debug, Clone)]
pub struct MessageEntities {
    pub id: String,
    pub headers: HeaderSet,
    pub sender: Address,
    pub recipient: Address,
    pub content: Content,
    pub authenticity: AuthenticityReport,
}

impl MessageEntities {
    pub fn subject(&self) -> &str {
        self.headers.get_or("Subject", "")
    }
}

#[async_trait]
pub trait Heuristic: Send + Sync {
    fn name(&self) -> &'static str;

    /// Only malformed input that makes the check meaningless is an error;
    /// network and collaborator trouble degrades to a score instead.
    async fn score(
        &self,
        message: &MessageEntities,
        data: &ReferenceData,
    ) -> Result<f64, MessageError>;
}

/// External services the standard checks depend on.
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn HostResolver>,
    pub probe: LivenessProbe,
    pub detector: Arc<dyn LanguageDetector>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub quality: Option<Arc<dyn QualityChecker>>,
    pub sentiment: Option<Arc<dyn SentimentAnalyzer>>,
}

#[derive(Default)]
pub struct HeuristicRegistry {
    checks: Vec<Box<dyn Heuristic>>,
}

impl HeuristicRegistry {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn register(&mut self, check: Box<dyn Heuristic>) -> &mut Self {
        self.checks.push(check);
        self
    }

    /// The full check set in reporting order. NLP checks are included only
    /// when their collaborator is configured.
    pub fn standard(collaborators: &Collaborators) -> Self {
        let mut registry = Self::new();
        registry
            .register(Box::new(authenticity::AuthenticityReputation))
            .register(Box::new(sender::ExternalSenderFlag))
            .register(Box::new(sender::DenylistFlag))
            .register(Box::new(content::BuzzwordScore))
            .register(Box::new(content::CoinAddressScore))
            .register(Box::new(sender::FakedSenderScore))
            .register(Box::new(content::GreetingScore::new(
                collaborators.detector.clone(),
                collaborators.tokenizer.clone(),
            )))
            .register(Box::new(content::QuestionRatio))
            .register(Box::new(subject::UnusualSubjectScore))
            .register(Box::new(date::SuspiciousDateScore))
            .register(Box::new(network::DomainLivenessScore::new(
                collaborators.resolver.clone(),
                collaborators.probe.clone(),
            )));

        if let Some(quality) = &collaborators.quality {
            registry.register(Box::new(nlp::TextQuality::new(
                collaborators.detector.clone(),
                quality.clone(),
            )));
        }
        if let Some(sentiment) = &collaborators.sentiment {
            registry.register(Box::new(nlp::IntentScore::new(
                collaborators.detector.clone(),
                sentiment.clone(),
            )));
        }

        registry.register(Box::new(sender::TyposquatCount));
        registry
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Runs every check in registration order. The first fatal error aborts
    /// the message.
    pub async fn run(
        &self,
        message: &MessageEntities,
        data: &ReferenceData,
    ) -> Result<MessageResult, MessageError> {
        let mut result = MessageResult::new(&message.id);
        for check in &self.checks {
            let score = check.score(message, data).await?;
            log::debug!("{}: {} = {}", message.id, check.name(), score);
            result.record(check.name(), score);
        }
        Ok(result)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{entities, NoResolver};
    use super::*;
    use crate::language::{RegexTokenizer, StopwordDetector};

    fn offline() -> Collaborators {
        Collaborators {
            resolver: Arc::new(NoResolver),
            probe: LivenessProbe::default(),
            detector: Arc::new(StopwordDetector),
            tokenizer: Arc::new(RegexTokenizer),
            quality: None,
            sentiment: None,
        }
    }

    #[test]
    fn test_standard_order_without_nlp() {
        let registry = HeuristicRegistry::standard(&offline());
        assert_eq!(
            registry.names(),
            vec![
                "authenticity",
                "external_sender_flag",
                "denylist_flag",
                "buzzword_score",
                "coin_address_score",
                "faked_sender_score",
                "greeting_score",
                "question_ratio",
                "unusual_subject_score",
                "suspicious_date_score",
                "domain_liveness_score",
                "typosquat_count",
            ]
        );
    }

    struct Fixed(&'static str, f64);

    #[async_trait]
    impl Heuristic for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn score(
            &self,
            _message: &MessageEntities,
            _data: &ReferenceData,
        ) -> Result<f64, MessageError> {
            Ok(self.1)
        }
    }

    #[tokio::test]
    async fn test_run_records_in_order() {
        let mut registry = HeuristicRegistry::new();
        registry
            .register(Box::new(Fixed("zeta", 1.0)))
            .register(Box::new(Fixed("alpha", 2.5)));

        let message = entities("a@b.example", "c@d.example", "hi", "body");
        let result = registry.run(&message, &ReferenceData::default()).await.unwrap();

        let names: Vec<&str> = result.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(result.get("alpha"), Some(2.5));
    }
}
