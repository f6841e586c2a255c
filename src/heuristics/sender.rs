use super::{Heuristic, MessageEntities};
use crate::error::MessageError;
use crate::reference_data::ReferenceData;
use crate::similarity::sequence_ratio;
use crate::typosquat::tld_of;
use async_trait::async_trait;

/// Characters that may appear in a local part but not in a person's name.
const LOCAL_PART_PUNCTUATION: &[char] = &[
    '!', '#', '$', '%', '&', '\'', '*', '+', '-', '/', '=', '?', '^', '_', '`', '{', '|', '}', '.',
    '~',
];

/// 1 when the gateway tagged the subject as external and the sender domain
/// is not allowlisted.
pub struct ExternalSenderFlag;

#[async_trait]
impl Heuristic for ExternalSenderFlag {
    fn name(&self) -> &'static str {
        "external_sender_flag"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let tagged = message.subject().contains(data.external_marker.as_str());
        let allowlisted = message
            .sender
            .domain()
            .is_some_and(|domain| data.allowlist.contains(domain));
        Ok(if tagged && !allowlisted { 1.0 } else { 0.0 })
    }
}

pub struct DenylistFlag;

#[async_trait]
impl Heuristic for DenylistFlag {
    fn name(&self) -> &'static str {
        "denylist_flag"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let Some(domain) = message.sender.domain() else {
            return Ok(0.0);
        };
        if data.denylist.contains(domain) {
            return Ok(1.0);
        }
        // allowlisted and unknown domains score the same
        if data.allowlist.contains(domain) {
            log::debug!("{}: sender domain {domain} is allowlisted", message.id);
        }
        Ok(0.0)
    }
}

/// How far the display name drifts from the address it claims to belong to,
/// scaled to `0..=10`.
pub struct FakedSenderScore;

impl FakedSenderScore {
    fn local_part_variants(local_part: &str) -> Vec<String> {
        let stripped: String = local_part
            .chars()
            .filter(|c| !LOCAL_PART_PUNCTUATION.contains(c))
            .collect();
        let spaced: String = local_part
            .chars()
            .map(|c| if LOCAL_PART_PUNCTUATION.contains(&c) { ' ' } else { c })
            .collect();

        let mut variants = vec![local_part.to_string()];
        for candidate in [stripped, spaced] {
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
        variants
    }
}

#[async_trait]
impl Heuristic for FakedSenderScore {
    fn name(&self) -> &'static str {
        "faked_sender_score"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        _data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let Some(local_part) = message.sender.local_part() else {
            return Ok(0.0);
        };

        let local_parts = Self::local_part_variants(&local_part.to_lowercase());
        let best = message
            .sender
            .display_name_variants()
            .iter()
            .filter(|name| !name.is_empty())
            .flat_map(|name| {
                let name = name.to_lowercase();
                local_parts
                    .iter()
                    .map(move |local| sequence_ratio(&name, local))
            })
            .fold(None, |best: Option<f64>, ratio| {
                Some(best.map_or(ratio, |b| b.max(ratio)))
            })
            // no comparable pair counts as a perfect match
            .unwrap_or(1.0);

        Ok((1.0 - best).abs() * 10.0)
    }
}

/// Number of heavily abused TLDs that list the sender's TLD as a near miss.
pub struct TyposquatCount;

#[async_trait]
impl Heuristic for TyposquatCount {
    fn name(&self) -> &'static str {
        "typosquat_count"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let Some(tld) = message.sender.domain().and_then(tld_of) else {
            return Ok(0.0);
        };
        let count = data.typosquat.count_abused_neighbors(&tld, &data.abused_tlds);
        Ok(count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::test_support::entities;
    use crate::typosquat::TyposquatIndex;

    fn data() -> ReferenceData {
        let mut data = ReferenceData::default();
        data.denylist.insert("evil.example".to_string());
        data.allowlist.insert("partner.example".to_string());
        data.abused_tlds = vec!["support".to_string(), "country".to_string()];
        data.typosquat = TyposquatIndex::from_json_str(
            r#"{ "support": { "2": ["suport", "supply"] }, "country": { "2": ["county"] } }"#,
        )
        .unwrap();
        data
    }

    async fn run(check: &dyn Heuristic, from: &str, subject: &str) -> f64 {
        let message = entities(from, "me@corp.example", subject, "body");
        check.score(&message, &data()).await.unwrap()
    }

    #[tokio::test]
    async fn test_external_sender_flag() {
        assert_eq!(run(&ExternalSenderFlag, "x@evil.example", "[EXT] Invoice").await, 1.0);
        assert_eq!(run(&ExternalSenderFlag, "x@partner.example", "[EXT] Invoice").await, 0.0);
        assert_eq!(run(&ExternalSenderFlag, "x@evil.example", "Invoice").await, 0.0);
    }

    #[tokio::test]
    async fn test_denylist_flag() {
        assert_eq!(run(&DenylistFlag, "x@evil.example", "").await, 1.0);
        assert_eq!(run(&DenylistFlag, "x@partner.example", "").await, 0.0);
        assert_eq!(run(&DenylistFlag, "x@other.example", "").await, 0.0);
        assert_eq!(run(&DenylistFlag, "undisclosed-recipients:;", "").await, 0.0);
    }

    #[tokio::test]
    async fn test_faked_sender_identical_names() {
        assert_eq!(
            run(&FakedSenderScore, "John.Doe <john.doe@corp.example>", "").await,
            0.0
        );
        // "doe, john" reordered and the local part with '.' replaced by ' '
        assert_eq!(
            run(&FakedSenderScore, "Doe, John <john.doe@corp.example>", "").await,
            0.0
        );
    }

    #[tokio::test]
    async fn test_faked_sender_empty_display_name() {
        assert_eq!(run(&FakedSenderScore, "alerts@bank.example", "").await, 0.0);
        assert_eq!(run(&FakedSenderScore, "no address", "").await, 0.0);
    }

    #[tokio::test]
    async fn test_faked_sender_mismatch() {
        let score = run(&FakedSenderScore, "PayPal Security <xk2q9@mailer.example>", "").await;
        assert!(score > 5.0, "score was {score}");
    }

    #[test]
    fn test_local_part_variants() {
        assert_eq!(
            FakedSenderScore::local_part_variants("john.doe"),
            vec!["john.doe", "johndoe", "john doe"]
        );
        assert_eq!(FakedSenderScore::local_part_variants("info"), vec!["info"]);
    }

    #[tokio::test]
    async fn test_typosquat_count() {
        assert_eq!(run(&TyposquatCount, "x@help.suport", "").await, 1.0);
        assert_eq!(run(&TyposquatCount, "x@shop.com", "").await, 0.0);
        assert_eq!(run(&TyposquatCount, "x@localhost", "").await, 0.0);
    }
}
