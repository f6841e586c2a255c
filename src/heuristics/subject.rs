use super::{Heuristic, MessageEntities};
use crate::error::MessageError;
use crate::reference_data::ReferenceData;
use crate::similarity::levenshtein;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MONEY: Regex = Regex::new(r"^.*[\$€\d][\d\.,]*[\$€]?.*").unwrap();
}

/// Money amounts, shouting, emojis and blocked words in the subject line.
pub struct UnusualSubjectScore;

impl UnusualSubjectScore {
    /// At most a quarter of the characters change when upper-cased.
    fn is_shouting(subject: &str) -> bool {
        let distance = levenshtein(subject, &subject.to_uppercase());
        distance as f64 <= subject.chars().count() as f64 * 0.25
    }
}

#[async_trait]
impl Heuristic for UnusualSubjectScore {
    fn name(&self) -> &'static str {
        "unusual_subject_score"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let subject = message.subject();
        let mut score = 0.0;

        if MONEY.is_match(subject) {
            score += 2.0;
        }

        if Self::is_shouting(subject) {
            score += 2.0;
        }

        let emojis = subject
            .chars()
            .filter(|c| data.emojis.contains(&u32::from(*c)))
            .count();
        score += 0.5 * emojis as f64;

        let blocked = subject
            .split(' ')
            .filter(|word| data.blocked_subject.contains(&word.to_lowercase()))
            .count();
        score += blocked as f64;

        Ok(score)
    }
}
