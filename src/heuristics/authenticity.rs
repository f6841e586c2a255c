use super::{Heuristic, MessageEntities};
use crate::error::MessageError;
use crate::reference_data::ReferenceData;
use async_trait::async_trait;

/// Reputation of the resolved SPF/DKIM/DMARC verdict.
pub struct AuthenticityReputation;

#[async_trait]
impl Heuristic for AuthenticityReputation {
    fn name(&self) -> &'static str {
        "authenticity"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        _data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        Ok(f64::from(message.authenticity.reputation()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticity::{AuthenticityResolver, OverrideTable};
    use crate::heuristics::test_support::entities;
    use crate::normalization::HeaderSet;
    use std::collections::HashMap;

    async fn score_with(auth: &str, resolver: &AuthenticityResolver) -> f64 {
        let mut message = entities("a@shop.example", "b@corp.example", "hi", "body");
        message.headers = HeaderSet::from_pairs([("Authentication-Results", auth)]);
        message.authenticity = resolver.analyze(&message.headers);
        AuthenticityReputation
            .score(&message, &ReferenceData::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_headers_score_one() {
        let message = entities("a@shop.example", "b@corp.example", "hi", "body");
        let score = AuthenticityReputation
            .score(&message, &ReferenceData::default())
            .await
            .unwrap();
        assert_eq!(score, 1.0);
    }

    #[tokio::test]
    async fn test_verdict_mapping() {
        let resolver = AuthenticityResolver::default();
        assert_eq!(
            score_with("mx; spf=pass; dkim=pass; dmarc=pass", &resolver).await,
            0.0
        );
        assert_eq!(
            score_with("mx; spf=softfail; dkim=pass; dmarc=pass", &resolver).await,
            1.0
        );
        assert_eq!(
            score_with("mx; spf=pass; dkim=fail; dmarc=pass", &resolver).await,
            2.0
        );
    }

    #[tokio::test]
    async fn test_override_value_is_mapped_by_name() {
        let overrides = HashMap::from([("dkim-fail".to_string(), "pass".to_string())]);
        let resolver = AuthenticityResolver::new(OverrideTable::new(overrides));
        assert_eq!(
            score_with("mx; spf=pass; dkim=fail; dmarc=pass", &resolver).await,
            0.0
        );
    }
}
