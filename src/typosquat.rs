use crate::similarity::levenshtein;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// For every TLD, the other TLDs within its edit-distance threshold, grouped
/// by that threshold: `{ "com": { "0": [], ... }, "shop": { "1": ["shoe", ...] } }`.
///
/// Labels are stored lower-cased without the leading dot.
#[derive(Debug, Clone, Default)]
pub struct TyposquatIndex {
    table: HashMap<String, BTreeMap<usize, Vec<String>>>,
}

fn normalize_label(label: &str) -> String {
    label.trim().trim_start_matches('.').to_lowercase()
}

/// Last label of a domain, if the domain has more than one label.
pub fn tld_of(domain: &str) -> Option<String> {
    let domain = domain.trim().trim_end_matches('.');
    let (_, tld) = domain.rsplit_once('.')?;
    if tld.is_empty() {
        return None;
    }
    Some(tld.to_lowercase())
}

impl TyposquatIndex {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read typosquat table: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Invalid typosquat table: {}", path.display()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: HashMap<String, BTreeMap<usize, Vec<String>>> = serde_json::from_str(json)?;
        let table = raw
            .into_iter()
            .map(|(tld, groups)| {
                let groups = groups
                    .into_iter()
                    .map(|(threshold, candidates)| {
                        let candidates = candidates.iter().map(|c| normalize_label(c)).collect();
                        (threshold, candidates)
                    })
                    .collect();
                (normalize_label(&tld), groups)
            })
            .collect();
        Ok(Self { table })
    }

    pub fn to_json_string(&self) -> Result<String> {
        let ordered: BTreeMap<&String, &BTreeMap<usize, Vec<String>>> = self.table.iter().collect();
        Ok(serde_json::to_string_pretty(&ordered)?)
    }

    /// Builds the table from a TLD list. The threshold of each TLD is 30% of
    /// its length, rounded down. Entries containing `&` are ignored.
    pub fn build<S: AsRef<str>>(tlds: &[S]) -> Self {
        let tlds: Vec<String> = tlds
            .iter()
            .map(|t| normalize_label(t.as_ref()))
            .filter(|t| !t.is_empty() && !t.contains('&'))
            .collect();

        let mut table = HashMap::with_capacity(tlds.len());
        for (i, tld) in tlds.iter().enumerate() {
            if i % 100 == 0 {
                log::debug!("Typosquat build progress: {i}/{}", tlds.len());
            }

            let threshold = (0.3 * tld.chars().count() as f64) as usize;
            let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
            for candidate in &tlds {
                if candidate == tld {
                    continue;
                }
                if levenshtein(tld, candidate) <= threshold {
                    groups.entry(threshold).or_default().push(candidate.clone());
                }
            }
            table.insert(tld.clone(), groups);
        }

        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Near-distance candidates recorded for `tld`.
    pub fn neighbors(&self, tld: &str) -> impl Iterator<Item = &str> {
        self.table
            .get(&normalize_label(tld))
            .into_iter()
            .flat_map(|groups| groups.values().flatten().map(String::as_str))
    }

    /// How many of the `abused` TLDs list `tld` among their candidates.
    /// Abused TLDs missing from the table are skipped.
    pub fn count_abused_neighbors<S: AsRef<str>>(&self, tld: &str, abused: &[S]) -> usize {
        let tld = normalize_label(tld);
        abused
            .iter()
            .filter(|candidate| {
                let name: &str = candidate.as_ref();
                self.neighbors(name).any(|n| n == tld)
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tld_of() {
        assert_eq!(tld_of("mail.example.com"), Some("com".to_string()));
        assert_eq!(tld_of("example.CO"), Some("co".to_string()));
        assert_eq!(tld_of("localhost"), None);
        assert_eq!(tld_of("example."), None);
    }

    #[test]
    fn test_build_thresholds() {
        let index = TyposquatIndex::build(&["com", "co", "shop", "shopping", "shoping", "a&b"]);

        // threshold for "com" is 0, so nothing qualifies
        assert_eq!(index.neighbors("com").count(), 0);

        // "shopping" has threshold 2: "shoping" (1) qualifies, "shop" (4) does not
        let near: Vec<&str> = index.neighbors("shopping").collect();
        assert_eq!(near, vec!["shoping"]);
        assert!(index.neighbors("a&b").next().is_none());
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_json_roundtrip_accepts_dotted_labels() {
        let json = r#"{ ".top": { "0": [] }, ".support": { "2": [".suport", ".supply"] } }"#;
        let index = TyposquatIndex::from_json_str(json).unwrap();
        let near: Vec<&str> = index.neighbors("support").collect();
        assert_eq!(near, vec!["suport", "supply"]);

        let reparsed = TyposquatIndex::from_json_str(&index.to_json_string().unwrap()).unwrap();
        assert_eq!(reparsed.neighbors(".support").count(), 2);
    }

    #[test]
    fn test_count_abused_neighbors() {
        let json = r#"{
            "support": { "2": ["suport", "supply"] },
            "country": { "2": ["county"] },
            "top": { "0": [] }
        }"#;
        let index = TyposquatIndex::from_json_str(json).unwrap();
        let abused = ["support", "country", "top", "missing"];

        assert_eq!(index.count_abused_neighbors("suport", &abused), 1);
        assert_eq!(index.count_abused_neighbors("com", &abused), 0);
    }
}
