//! SPF/DKIM/DMARC outcome parsing and verdict resolution.
//!
//! The receiving gateway already evaluated the protocols; this module only
//! reads the outcomes it recorded in `Authentication-Results` and
//! `Received-SPF` and folds them into a single verdict.

use crate::normalization::HeaderSet;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const UNSPECIFIED: &str = "Unspecified";

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref IPV4: Regex = Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap();
    static ref SPF_RESULT: Regex = Regex::new(r"spf=(\w+)").unwrap();
    static ref SPF_REASON_AUTH: Regex = Regex::new(r"spf=\w+ \((.+?)\)").unwrap();
    static ref PARENTHESIZED: Regex = Regex::new(r"\((.+)\)").unwrap();
    static ref DKIM_RESULT: Regex = Regex::new(r"dkim=(\w+)").unwrap();
    static ref DKIM_REASON: Regex = Regex::new(r"dkim=\w+ \((.+?)\)").unwrap();
    static ref DKIM_DOMAIN: Regex =
        Regex::new(r"(?:header\.d|header\.i|\bd)=@?([\w-]+(?:\.[\w-]+)+)").unwrap();
    static ref DMARC_RESULT: Regex = Regex::new(r"dmarc=(\w+)").unwrap();
    static ref DMARC_TAGS: Regex = Regex::new(r"dmarc=\w+ \((.+?)\)").unwrap();
    static ref DMARC_FROM: Regex = Regex::new(r"dmarc=.+header\.from=([\w-]+\.[^; ]+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpfResult {
    pub validation_result: String,
    pub sender_ip: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DkimResult {
    pub validation_result: String,
    pub signing_domain: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DmarcResult {
    pub validation_result: String,
    pub tags: BTreeMap<String, String>,
    pub from_domain: String,
}

impl Default for SpfResult {
    fn default() -> Self {
        Self {
            validation_result: UNSPECIFIED.to_string(),
            sender_ip: UNSPECIFIED.to_string(),
            reason: UNSPECIFIED.to_string(),
        }
    }
}

impl Default for DkimResult {
    fn default() -> Self {
        Self {
            validation_result: UNSPECIFIED.to_string(),
            signing_domain: UNSPECIFIED.to_string(),
            reason: UNSPECIFIED.to_string(),
        }
    }
}

impl Default for DmarcResult {
    fn default() -> Self {
        Self {
            validation_result: UNSPECIFIED.to_string(),
            tags: BTreeMap::from([(UNSPECIFIED.to_string(), UNSPECIFIED.to_string())]),
            from_domain: UNSPECIFIED.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthenticityVerdict {
    Pass,
    Fail,
    Suspicious,
    Undetermined,
}

impl AuthenticityVerdict {
    /// Reputation severity: Pass=0, Suspicious=1, Fail=2. Undetermined is
    /// treated like Suspicious.
    pub fn reputation(self) -> u8 {
        match self {
            AuthenticityVerdict::Pass => 0,
            AuthenticityVerdict::Suspicious | AuthenticityVerdict::Undetermined => 1,
            AuthenticityVerdict::Fail => 2,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "pass" => Some(AuthenticityVerdict::Pass),
            "fail" => Some(AuthenticityVerdict::Fail),
            "suspicious" => Some(AuthenticityVerdict::Suspicious),
            "undetermined" => Some(AuthenticityVerdict::Undetermined),
            _ => None,
        }
    }
}

/// Outcome of resolution: either a rule-derived verdict or an operator
/// override value returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Verdict(AuthenticityVerdict),
    Override(String),
}

impl Resolution {
    pub fn reputation(&self) -> u8 {
        match self {
            Resolution::Verdict(verdict) => verdict.reputation(),
            Resolution::Override(value) => match AuthenticityVerdict::from_name(value) {
                Some(verdict) => verdict.reputation(),
                None => {
                    log::warn!("Override value {value:?} is not a known verdict, using 1");
                    1
                }
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticityReport {
    pub spf: SpfResult,
    pub dkim: DkimResult,
    pub dmarc: DmarcResult,
    pub resolution: Resolution,
    /// Whether either authentication header was present at all.
    pub headers_present: bool,
}

impl AuthenticityReport {
    pub fn reputation(&self) -> u8 {
        if !self.headers_present {
            return AuthenticityVerdict::Undetermined.reputation();
        }
        self.resolution.reputation()
    }
}

pub fn parse_spf(auth: Option<&str>, received_spf: Option<&str>) -> SpfResult {
    let mut result = SpfResult::default();

    let source = match (auth, received_spf) {
        (Some(auth), _) => {
            if let Some(caps) = SPF_RESULT.captures(auth) {
                result.validation_result = caps[1].to_lowercase();
            }
            Some(auth)
        }
        (None, Some(spf)) => {
            if let Some(token) = spf.split_whitespace().next() {
                result.validation_result = token.to_lowercase();
            }
            Some(spf)
        }
        (None, None) => None,
    };

    if let Some(m) = source.and_then(|s| IPV4.find(s)) {
        result.sender_ip = m.as_str().to_string();
    }

    let reason = match received_spf {
        Some(spf) => PARENTHESIZED.captures(spf),
        None => auth.and_then(|a| SPF_REASON_AUTH.captures(a)),
    };
    if let Some(caps) = reason {
        result.reason = caps[1].to_string();
    }

    result
}

pub fn parse_dkim(auth: Option<&str>) -> DkimResult {
    let mut result = DkimResult::default();
    let Some(auth) = auth else {
        return result;
    };

    let Some(caps) = DKIM_RESULT.captures(auth) else {
        return result;
    };
    result.validation_result = caps[1].to_lowercase();

    if let Some(reason) = DKIM_REASON.captures(auth) {
        result.reason = reason[1].to_string();
    }

    // The signing domain tag belongs to the dkim clause, so search from there.
    let start = caps.get(0).map_or(0, |m| m.start());
    if let Some(domain) = DKIM_DOMAIN.captures(&auth[start..]) {
        result.signing_domain = domain[1].to_lowercase();
    }

    result
}

pub fn parse_dmarc(auth: Option<&str>) -> DmarcResult {
    let mut result = DmarcResult::default();
    let Some(auth) = auth else {
        return result;
    };

    if let Some(caps) = DMARC_RESULT.captures(auth) {
        result.validation_result = caps[1].to_lowercase();
    }

    if let Some(caps) = DMARC_TAGS.captures(auth) {
        let tags: BTreeMap<String, String> = caps[1]
            .split_whitespace()
            .filter_map(|tag| tag.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if !tags.is_empty() {
            result.tags = tags;
        }
    }

    if let Some(caps) = DMARC_FROM.captures(auth) {
        result.from_domain = caps[1].to_lowercase();
    }

    result
}

/// Operator overrides keyed `"<protocol>-<result>"`, e.g. `"spf-fail"`.
/// Lookups are exact string matches.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<String, String>,
}

impl OverrideTable {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, protocol: &str, result: &str) -> Option<&str> {
        self.entries
            .get(&format!("{protocol}-{result}"))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthenticityResolver {
    overrides: OverrideTable,
}

impl AuthenticityResolver {
    pub fn new(overrides: OverrideTable) -> Self {
        Self { overrides }
    }

    pub fn analyze(&self, headers: &HeaderSet) -> AuthenticityReport {
        let auth = headers
            .get("Authentication-Results")
            .map(|v| WHITESPACE.replace_all(v, " ").into_owned());
        let received_spf = headers
            .get("Received-SPF")
            .map(|v| WHITESPACE.replace_all(v, " ").into_owned());

        let spf = parse_spf(auth.as_deref(), received_spf.as_deref());
        let dkim = parse_dkim(auth.as_deref());
        let dmarc = parse_dmarc(auth.as_deref());
        let resolution = self.resolve(&spf, &dkim, &dmarc);

        log::debug!(
            "Authenticity spf={} dkim={} dmarc={} -> {:?}",
            spf.validation_result,
            dkim.validation_result,
            dmarc.validation_result,
            resolution
        );

        AuthenticityReport {
            spf,
            dkim,
            dmarc,
            resolution,
            headers_present: auth.is_some() || received_spf.is_some(),
        }
    }

    /// First matching rule wins: overrides, any fail, softfail/policy,
    /// missing or erroneous results, otherwise pass.
    pub fn resolve(&self, spf: &SpfResult, dkim: &DkimResult, dmarc: &DmarcResult) -> Resolution {
        let spf = spf.validation_result.as_str();
        let dkim = dkim.validation_result.as_str();
        let dmarc = dmarc.validation_result.as_str();

        for (protocol, result) in [("spf", spf), ("dkim", dkim), ("dmarc", dmarc)] {
            if let Some(value) = self.overrides.lookup(protocol, result) {
                return Resolution::Override(value.to_string());
            }
        }

        if [spf, dkim, dmarc].contains(&"fail") {
            return Resolution::Verdict(AuthenticityVerdict::Fail);
        }

        if spf == "softfail" || dkim == "policy" {
            return Resolution::Verdict(AuthenticityVerdict::Suspicious);
        }

        let undetermined = |r: &str| matches!(r, UNSPECIFIED | "none" | "temperror" | "permerror");
        if undetermined(spf) || undetermined(dkim) || undetermined(dmarc) || dkim == "neutral" {
            return Resolution::Verdict(AuthenticityVerdict::Undetermined);
        }

        Resolution::Verdict(AuthenticityVerdict::Pass)
    }
}
