use super::{Heuristic, MessageEntities};
use crate::error::MessageError;
use crate::reference_data::ReferenceData;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};

const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Parses a `Date` header such as `Tue, 07 Mar 2023 23:10:00 +0100 (CET)`.
///
/// The strict `DATE_FORMAT` is tried first, with any trailing ` (comment)`
/// removed. Anything it rejects falls back to chrono's RFC 2822 parser, which
/// also accepts obsolete zone names and a missing weekday.
pub fn parse_date(raw: &str) -> Result<DateTime<FixedOffset>, MessageError> {
    let trimmed = raw.trim();
    let without_comment = if trimmed.ends_with(')') {
        trimmed.split(" (").next().unwrap_or(trimmed)
    } else {
        trimmed
    };

    DateTime::parse_from_str(without_comment, DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc2822(trimmed))
        .map_err(|_| MessageError::MalformedDate(raw.to_string()))
}

/// Weekend and out-of-hours sending, judged in the sender's own offset.
pub struct SuspiciousDateScore;

#[async_trait]
impl Heuristic for SuspiciousDateScore {
    fn name(&self) -> &'static str {
        "suspicious_date_score"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        _data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let raw = message
            .headers
            .get("Date")
            .ok_or_else(|| MessageError::MalformedDate(String::new()))?;
        let date = parse_date(raw)?;

        let mut score = 0.0;
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            score += 1.0;
        }
        if date.hour() < 6 || date.hour() >= 18 {
            score += 1.0;
        }
        Ok(score)
    }
}
