//! Text normalization shared by the analyzers.

use std::collections::BTreeSet;

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have",
    "in", "into", "is", "it", "its", "of", "on", "or", "our", "that", "the", "their", "this",
    "to", "we", "will", "with", "you", "your", "who", "was", "were", "work", "working",
];

/// Lowercases, keeps `+`, `#` and `.` inside words (c++, c#, node.js), and
/// collapses everything else to single spaces.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '+' || c == '#' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .map(|w| w.trim_matches('.'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Content words of `text`: normalized, stop words and single characters removed.
pub fn content_terms(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Distinct normalized words, for token-set comparisons.
pub fn word_set(text: &str) -> BTreeSet<String> {
    normalize(text).split(' ').filter(|w| !w.is_empty()).map(str::to_string).collect()
}

/// Sørensen–Dice coefficient over character bigrams of the normalized strings.
pub fn bigram_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a).replace(' ', "");
    let b = normalize(b).replace(' ', "");
    if a == b {
        return 1.0;
    }
    let a_bigrams = bigrams(&a);
    let b_bigrams = bigrams(&b);
    if a_bigrams.is_empty() || b_bigrams.is_empty() {
        return 0.0;
    }

    let mut remaining = b_bigrams.clone();
    let mut overlap = 0usize;
    for bigram in &a_bigrams {
        if let Some(pos) = remaining.iter().position(|b| b == bigram) {
            remaining.swap_remove(pos);
            overlap += 1;
        }
    }
    (2 * overlap) as f64 / (a_bigrams.len() + b_bigrams.len()) as f64
}

fn bigrams(s: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
