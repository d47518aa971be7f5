//! Message cleanup and corpus assembly
//!
//! Reply text carries two kinds of structural noise that would dominate a
//! frequency count: bracketed emoji shortcodes (`[doge]`) and the reply
//! boilerplate the service prepends to nested replies (`回复 @name :`).

use crate::models::Record;
use once_cell::sync::Lazy;
use regex::Regex;

/// Bracketed annotation, shortest match (`[]` included)
static BRACKET_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[.*?\]").expect("bracket pattern is valid"));

/// Reply boilerplate at the very start: marker, `@name`, colon, spaces
static REPLY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:回复|reply) @.+?:\s*").expect("reply prefix pattern is valid"));

/// Strip annotations, then a leading reply prefix
pub fn clean_message(text: &str) -> String {
    let without_brackets = BRACKET_SPAN.replace_all(text, "");
    REPLY_PREFIX.replace(&without_brackets, "").into_owned()
}

/// Clean every message and join them with single spaces, in order
///
/// Blank messages still occupy a (zero-length) segment.
pub fn normalize_messages<I, S>(messages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    messages
        .into_iter()
        .map(|m| clean_message(m.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Corpus of a record batch
pub fn normalize(records: &[Record]) -> String {
    normalize_messages(records.iter().map(Record::message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brackets_removed_spacing_kept() {
        assert_eq!(clean_message("great [smile] job [doge]"), "great  job ");
    }

    #[test]
    fn test_brackets_are_non_greedy() {
        assert_eq!(clean_message("[a]keep[b]"), "keep");
        assert_eq!(clean_message("[]empty"), "empty");
        // Unclosed bracket is plain text
        assert_eq!(clean_message("open [ended"), "open [ended");
    }

    #[test]
    fn test_reply_prefix_removed() {
        assert_eq!(clean_message("reply @alice: thanks"), "thanks");
        assert_eq!(clean_message("回复 @某人 :说得好"), "说得好");
    }

    #[test]
    fn test_reply_prefix_only_at_start() {
        assert_eq!(
            clean_message("thanks reply @alice: again"),
            "thanks reply @alice: again"
        );
    }

    #[test]
    fn test_reply_prefix_only_once() {
        assert_eq!(
            clean_message("reply @a: reply @b: hi"),
            "reply @b: hi"
        );
    }

    #[test]
    fn test_prefix_exposed_by_bracket_removal() {
        assert_eq!(clean_message("[tv_doge]reply @bob: ok"), "ok");
    }

    #[test]
    fn test_clean_text_unchanged() {
        let clean = "nothing to strip here, @someone mentioned mid text";
        assert_eq!(clean_message(clean), clean);
        assert_eq!(clean_message(&clean_message(clean)), clean);
    }

    #[test]
    fn test_blank_messages_keep_segments() {
        let records = vec![
            Record::with_message("a"),
            Record::with_message(""),
            Record::with_message("[doge]"),
            Record::with_message("b"),
        ];
        let corpus = normalize(&records);
        assert_eq!(corpus, "a   b");
        assert_eq!(corpus.split(' ').count(), records.len());
    }

    #[test]
    fn test_empty_batch_is_empty_corpus() {
        assert_eq!(normalize(&[]), "");
    }
}
