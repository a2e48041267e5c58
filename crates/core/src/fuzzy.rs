//! Fuzzy name scoring used to resolve free-text college and branch terms.
//!
//! Scores are in `[0, 1]`. Callers treat anything above `0.5` as a match.

use std::collections::HashMap;

const STOPWORDS: &[&str] = &["of", "and", "the", "for", "in", "at"];

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn initials(normalized: &str) -> String {
    normalized
        .split(' ')
        .filter(|w| !STOPWORDS.contains(w))
        .filter_map(|w| w.chars().next())
        .collect()
}

fn bigrams(s: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
    let mut grams = HashMap::new();
    for pair in chars.windows(2) {
        *grams.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    grams
}

/// Sørensen–Dice coefficient over character bigrams.
fn dice(a: &str, b: &str) -> f64 {
    let ga = bigrams(a);
    let gb = bigrams(b);
    let total: usize = ga.values().sum::<usize>() + gb.values().sum::<usize>();
    if total == 0 {
        return 0.0;
    }
    let shared: usize = ga
        .iter()
        .map(|(gram, n)| (*n).min(gb.get(gram).copied().unwrap_or(0)))
        .sum();
    2.0 * shared as f64 / total as f64
}

/// Every query word is a prefix of some candidate word ("comp sci" vs "computer science").
fn word_prefixes(query: &str, candidate: &str) -> bool {
    let words: Vec<&str> = candidate.split(' ').collect();
    query
        .split(' ')
        .all(|q| words.iter().any(|w| w.starts_with(q)))
}

/// Similarity of a free-text query against a canonical name.
pub fn similarity(query: &str, candidate: &str) -> f64 {
    let q = normalize(query);
    let c = normalize(candidate);
    if q.is_empty() || c.is_empty() {
        return 0.0;
    }
    if q == c {
        return 1.0;
    }

    let mut score = dice(&q, &c);

    if c.contains(&q) {
        let coverage = q.len() as f64 / c.len() as f64;
        score = score.max(0.8 + 0.2 * coverage);
    }

    let compact: String = q.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.len() >= 2 && initials(&c).starts_with(&compact) {
        score = score.max(0.75);
    }

    if q.len() >= 3 && word_prefixes(&q, &c) {
        score = score.max(0.7);
    }

    score.min(1.0)
}

/// Score `candidates` against `query`, best first, ties broken by name.
pub fn rank_candidates<'a, I>(query: &str, candidates: I, limit: usize) -> Vec<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(&str, f64)> = candidates
        .into_iter()
        .map(|name| (name, similarity(query, name)))
        .filter(|(_, score)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    scored.truncate(limit);
    scored
}
