//! String distance and similarity primitives shared by the heuristics.

use crate::normalization::strip_external_notice;

/// Characters replaced before a text is split into word windows.
const WINDOW_PUNCTUATION: &[char] = &[
    '!', '#', '$', '%', '&', '*', '+', '/', '=', '?', '^', '_', '`', '{', '|', '}', '.', '~', ',',
    '\n', '\r',
];

/// Classic Levenshtein distance with unit costs, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + substitution);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Ratcliff/Obershelp similarity in `0.0..=1.0`.
///
/// Two empty inputs are considered identical and yield `1.0`.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_characters(&a, &b);
    2.0 * matched as f64 / total as f64
}

/// Fuzzy similarity on a `0..=100` scale. Either side empty scores 0.
pub fn fuzzy_ratio(a: &str, b: &str) -> u32 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    (sequence_ratio(a, b) * 100.0).round() as u32
}

/// Sum of the sizes of all matching blocks.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    total
}

/// Longest common block inside the given ranges. Ties resolve to the
/// earliest position in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in alo..ahi {
        for slot in curr.iter_mut() {
            *slot = 0;
        }
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let run = (if j > blo { prev[j] } else { 0 }) + 1;
            curr[j + 1] = run;
            if run > best.2 {
                best = (i + 1 - run, j + 1 - run, run);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

/// Lower-cases `text`, drops the external-sender notice and punctuation, and
/// returns every run of `width` consecutive words joined by a single space.
pub fn word_windows(text: &str, width: usize) -> Vec<String> {
    let cleaned = strip_external_notice(&text.to_lowercase()).replace(WINDOW_PUNCTUATION, " ");

    let words: Vec<&str> = cleaned
        .split(' ')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .collect();

    if width == 0 || words.len() < width {
        return Vec::new();
    }

    words.windows(width).map(|w| w.join(" ")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("com", "co"), 1);
    }

    #[test]
    fn test_levenshtein_is_symmetric_and_triangular() {
        let words = ["phishing", "fishing", "fish", "", "shop", "shopping", "über"];
        for a in &words {
            for b in &words {
                assert_eq!(levenshtein(a, b), levenshtein(b, a));
                for c in &words {
                    assert!(levenshtein(a, c) <= levenshtein(a, b) + levenshtein(b, c));
                }
            }
        }
    }

    #[test]
    fn test_sequence_ratio() {
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", ""), 0.0);
        assert_eq!(sequence_ratio("john doe", "john doe"), 1.0);
        // shared block "bcd"
        assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_ratio() {
        assert_eq!(fuzzy_ratio("free money", "free money"), 100);
        assert_eq!(fuzzy_ratio("", "anything"), 0);
        assert!(fuzzy_ratio("free money", "fre money") >= 90);
    }

    #[test]
    fn test_word_windows() {
        let windows = word_windows("Click HERE, now!  please", 2);
        assert_eq!(windows, vec!["click here", "here now", "now please"]);
        assert!(word_windows("one", 2).is_empty());
    }
}
