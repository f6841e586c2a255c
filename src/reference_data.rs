//! Reference lists and tables, loaded once per run and read-only afterwards.

use crate::config::ReferenceDataPaths;
use crate::typosquat::TyposquatIndex;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Code point ranges scored when no emoji file is configured.
const DEFAULT_EMOJI_RANGES: &[(u32, u32)] = &[(0x1F300, 0x1FAFF), (0x2600, 0x27BF)];

#[derive(Debug, Clone)]
pub struct ReferenceData {
    /// Sender domains and literal phrases known to be malicious.
    pub denylist: HashSet<String>,
    pub allowlist: HashSet<String>,
    pub buzzwords_spam: Vec<String>,
    /// High severity buzzwords.
    pub buzzwords_evil: Vec<String>,
    pub blocked_subject: HashSet<String>,
    pub mail_providers: HashSet<String>,
    pub abused_tlds: Vec<String>,
    pub typosquat: TyposquatIndex,
    pub emojis: HashSet<u32>,
    pub external_marker: String,
}

impl Default for ReferenceData {
    fn default() -> Self {
        ReferenceData {
            denylist: HashSet::new(),
            allowlist: HashSet::new(),
            buzzwords_spam: Vec::new(),
            buzzwords_evil: Vec::new(),
            blocked_subject: HashSet::new(),
            mail_providers: HashSet::new(),
            abused_tlds: Vec::new(),
            typosquat: TyposquatIndex::default(),
            emojis: default_emojis(),
            external_marker: "[EXT]".to_string(),
        }
    }
}

impl ReferenceData {
    pub fn load(paths: &ReferenceDataPaths, external_marker: &str) -> Result<Self> {
        let emojis = match &paths.emojis {
            Some(path) => read_emojis(path)?,
            None => default_emojis(),
        };

        let data = ReferenceData {
            denylist: read_list(&paths.denylist)?.into_iter().collect(),
            allowlist: read_list(&paths.allowlist)?.into_iter().collect(),
            buzzwords_spam: read_list(&paths.buzzwords_spam)?,
            buzzwords_evil: read_list(&paths.buzzwords_evil)?,
            blocked_subject: read_list(&paths.blocked_subject)?.into_iter().collect(),
            mail_providers: read_list(&paths.mail_providers)?.into_iter().collect(),
            abused_tlds: read_list(&paths.abused_tlds)?,
            typosquat: TyposquatIndex::load(&paths.typosquat_table)?,
            emojis,
            external_marker: external_marker.to_string(),
        };

        log::info!(
            "Reference data loaded: {} denylisted, {} allowlisted, {}+{} buzzwords, {} providers, {} abused TLDs, {} typosquat entries",
            data.denylist.len(),
            data.allowlist.len(),
            data.buzzwords_spam.len(),
            data.buzzwords_evil.len(),
            data.mail_providers.len(),
            data.abused_tlds.len(),
            data.typosquat.len()
        );

        Ok(data)
    }
}

/// One entry per line, lower-cased. Blank lines and `#` comments are skipped.
pub fn read_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference list: {}", path.display()))?;
    Ok(parse_list(&content))
}

fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect()
}

fn read_emojis(path: &str) -> Result<HashSet<u32>> {
    let mut emojis = HashSet::new();
    for entry in read_list(path)? {
        let code = parse_code_point(&entry)
            .with_context(|| format!("Invalid code point {entry:?} in {path}"))?;
        emojis.insert(code);
    }
    Ok(emojis)
}

fn parse_code_point(entry: &str) -> Result<u32> {
    let hex = entry
        .trim_start_matches("u+")
        .trim_start_matches("0x");
    Ok(u32::from_str_radix(hex, 16)?)
}

fn default_emojis() -> HashSet<u32> {
    DEFAULT_EMOJI_RANGES
        .iter()
        .flat_map(|&(start, end)| start..=end)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_list_skips_blank_and_comments() {
        let list = parse_list("# header\nEvil.Example\n\n  spam.example  \n");
        assert_eq!(list, vec!["evil.example", "spam.example"]);
    }

    #[test]
    fn test_code_points() {
        assert_eq!(parse_code_point("u+1f600").unwrap(), 0x1F600);
        assert_eq!(parse_code_point("0x2705").unwrap(), 0x2705);
        assert_eq!(parse_code_point("1F4B0").unwrap(), 0x1F4B0);
        assert!(parse_code_point("smile").is_err());
        assert!(default_emojis().contains(&('😀' as u32)));
        assert!(!default_emojis().contains(&('a' as u32)));
    }

    #[test]
    fn test_load_from_files() {
        let dir = TempDir::new().unwrap();
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path.to_string_lossy().into_owned()
        };

        let paths = ReferenceDataPaths {
            denylist: write("deny.txt", "evil.example\n"),
            allowlist: write("allow.txt", "partner.example\n"),
            buzzwords_spam: write("spam.txt", "free money\n"),
            buzzwords_evil: write("evil.txt", "verify your account\n"),
            blocked_subject: write("subject.txt", "urgent\n"),
            mail_providers: write("providers.txt", "gmail.com\n"),
            abused_tlds: write("tlds.txt", "top\nsupport\n"),
            typosquat_table: write("typo.json", r#"{"support": {"2": ["suport"]}}"#),
            emojis: Some(write("emojis.txt", "U+1F4B0\n")),
        };

        let data = ReferenceData::load(&paths, "[EXTERNAL]").unwrap();
        assert!(data.denylist.contains("evil.example"));
        assert_eq!(data.buzzwords_evil, vec!["verify your account"]);
        assert_eq!(data.abused_tlds, vec!["top", "support"]);
        assert_eq!(data.typosquat.len(), 1);
        assert_eq!(data.emojis.len(), 1);
        assert_eq!(data.external_marker, "[EXTERNAL]");
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = read_list("/nonexistent/deny.txt").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/deny.txt"));
    }
}
