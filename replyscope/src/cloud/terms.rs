//! Term extraction and weighting
//!
//! Turns a corpus into ranked [`TermWeight`]s:
//! - word runs of two or more characters (`\w[\w']+`)
//! - trailing `'s` stripped, numbers and English stopwords dropped
//! - case variants counted together, shown in their most frequent spelling
//! - `terms` folded into `term` when both occur
//!
//! Ranking is count descending, ties by first occurrence. Only the top
//! `max_words` terms receive a positive weight.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w[\w']+").expect("token pattern is valid"));

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
        "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor",
        "not", "of", "off", "on", "once", "only", "or", "other", "ought", "our", "ours",
        "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
        "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
        "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
        "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
        "i'm", "it's", "don't", "can't", "won't", "isn't", "didn't", "doesn't", "that's",
        "there's", "you're", "i've", "i'll", "let's", "http", "https", "www", "com",
    ]
    .into_iter()
    .collect()
});

/// Weighted term
#[derive(Debug, Clone, PartialEq)]
pub struct TermWeight {
    /// Display spelling
    pub term: String,
    /// Occurrences in the corpus (case and plural variants included)
    pub count: usize,
    /// `count / max_count` for ranked terms, 0.0 otherwise
    pub weight: f32,
}

/// Tokens that survive filtering, in corpus order
pub fn tokenize(corpus: &str) -> Vec<String> {
    TOKEN
        .find_iter(corpus)
        .filter_map(|m| {
            let raw = m.as_str();
            let word = raw.strip_suffix("'s").unwrap_or(raw);
            if word.is_empty() || word.chars().all(char::is_numeric) {
                return None;
            }
            if STOPWORDS.contains(word.to_lowercase().as_str()) {
                return None;
            }
            Some(word.to_string())
        })
        .collect()
}

/// Case-insensitive term group
#[derive(Debug)]
struct TermGroup {
    first_seen: usize,
    count: usize,
    /// Spelling → (count, first seen)
    variants: HashMap<String, (usize, usize)>,
}

impl TermGroup {
    fn display(&self) -> String {
        self.variants
            .iter()
            .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
            .map(|(spelling, _)| spelling.clone())
            .unwrap_or_default()
    }

    fn absorb(&mut self, other: TermGroup) {
        self.first_seen = self.first_seen.min(other.first_seen);
        self.count += other.count;
        for (spelling, (count, first)) in other.variants {
            let entry = self.variants.entry(spelling).or_insert((0, first));
            entry.0 += count;
            entry.1 = entry.1.min(first);
        }
    }
}

/// Count, fold and rank the corpus terms
///
/// Returns every distinct term, highest weight first.
pub fn weigh_terms(corpus: &str, max_words: usize) -> Vec<TermWeight> {
    let mut groups: HashMap<String, TermGroup> = HashMap::new();

    for (position, token) in tokenize(corpus).into_iter().enumerate() {
        let group = groups.entry(token.to_lowercase()).or_insert_with(|| TermGroup {
            first_seen: position,
            count: 0,
            variants: HashMap::new(),
        });
        group.count += 1;
        group.variants.entry(token).or_insert((0, position)).0 += 1;
    }

    // Plural folding, in first-seen order so the result is deterministic
    let mut plural_keys: Vec<(usize, String)> = groups
        .iter()
        .filter(|(key, _)| key.ends_with('s') && !key.ends_with("ss") && key.chars().count() > 3)
        .map(|(key, group)| (group.first_seen, key.clone()))
        .collect();
    plural_keys.sort();
    for (_, plural) in plural_keys {
        let singular = &plural[..plural.len() - 1];
        if !groups.contains_key(singular) {
            continue;
        }
        if let Some(group) = groups.remove(&plural) {
            if let Some(target) = groups.get_mut(singular) {
                target.absorb(group);
            }
        }
    }

    let mut ranked: Vec<TermGroup> = groups.into_values().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.first_seen.cmp(&b.first_seen)));

    let max_count = ranked.first().map(|g| g.count).unwrap_or(0);
    ranked
        .into_iter()
        .enumerate()
        .map(|(rank, group)| {
            let weight = if rank < max_words && max_count > 0 {
                group.count as f32 / max_count as f32
            } else {
                0.0
            };
            TermWeight {
                term: group.display(),
                count: group.count,
                weight,
            }
        })
        .collect()
}

/// Font size for a weight in (0, 1]
///
/// Non-decreasing in `weight`, `min` at weight 0.
pub fn font_size_for(weight: f32, min: u32, max: u32, relative_scaling: f32) -> u32 {
    if weight <= 0.0 {
        return min;
    }
    let weight = weight.min(1.0);
    let span = max.saturating_sub(min) as f32;
    let share = relative_scaling * weight + (1.0 - relative_scaling);
    min + (span * share).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_filters() {
        let tokens = tokenize("The cat's toy, 2024 and 42 cats! a b 好看 x1");
        assert_eq!(tokens, vec!["cat", "toy", "cats", "好看", "x1"]);
    }

    #[test]
    fn test_counts_and_ranking() {
        let terms = weigh_terms("apple banana apple cherry banana apple", 10);
        let summary: Vec<_> = terms.iter().map(|t| (t.term.as_str(), t.count)).collect();
        assert_eq!(summary, vec![("apple", 3), ("banana", 2), ("cherry", 1)]);
        assert_eq!(terms[0].weight, 1.0);
        assert!((terms[2].weight - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_first_occurrence_order() {
        let terms = weigh_terms("zeta alpha zeta alpha", 10);
        assert_eq!(terms[0].term, "zeta");
        assert_eq!(terms[1].term, "alpha");
    }

    #[test]
    fn test_case_variants_merge() {
        let terms = weigh_terms("Rust rust Rust RUST", 10);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].term, "Rust");
        assert_eq!(terms[0].count, 4);
    }

    #[test]
    fn test_plural_folds_into_singular() {
        let terms = weigh_terms("video videos videos glass glasses", 10);
        let video = terms.iter().find(|t| t.term == "video").unwrap();
        assert_eq!(video.count, 3);
        assert!(terms.iter().all(|t| t.term != "videos"));
        // "glass" does not end in a foldable plural
        assert!(terms.iter().any(|t| t.term == "glass"));
    }

    #[test]
    fn test_plural_without_singular_is_kept() {
        let terms = weigh_terms("thanks thanks", 10);
        assert_eq!(terms[0].term, "thanks");
    }

    #[test]
    fn test_terms_beyond_limit_get_zero_weight() {
        let terms = weigh_terms("aa aa aa bb bb cc", 2);
        assert_eq!(terms.len(), 3);
        assert!(terms[0].weight > 0.0);
        assert!(terms[1].weight > 0.0);
        assert_eq!(terms[2].weight, 0.0);
    }

    #[test]
    fn test_blank_corpus_has_no_terms() {
        assert!(weigh_terms("   ", 200).is_empty());
        assert!(weigh_terms("the and of 123", 200).is_empty());
    }

    #[test]
    fn test_weight_monotonic_in_count() {
        let corpus = "one two two three three three four four four four";
        let terms = weigh_terms(corpus, 200);
        for pair in terms.windows(2) {
            assert!(pair[0].count >= pair[1].count);
            assert!(pair[0].weight >= pair[1].weight);
        }
    }

    #[test]
    fn test_font_size_monotonic() {
        let mut previous = 0;
        for step in 0..=20 {
            let size = font_size_for(step as f32 / 20.0, 10, 100, 0.5);
            assert!(size >= previous);
            previous = size;
        }
        assert_eq!(font_size_for(1.0, 10, 100, 0.5), 100);
        assert_eq!(font_size_for(0.0, 10, 100, 0.5), 10);
        assert_eq!(font_size_for(0.5, 10, 100, 1.0), 55);
    }
}
