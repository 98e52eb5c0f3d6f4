//! Readability metrics and advisory text simplification.
//!
//! Scoring uses the Flesch Reading Ease formula over sentence length and
//! syllable counts. Simplification is deterministic and advisory: it
//! produces a candidate for the report, and the document is only changed
//! when the caller opted in.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Sentence boundaries for the readability formula.
static SENTENCE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());

/// Whitespace runs collapsed after phrase removal.
static WHITESPACE_COLLAPSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Filler phrases that add length without meaning.
static REDUNDANT_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(it is important to note that|it should be noted that|it is worth mentioning that|as you can see|as shown above|in order to)\s*",
    )
    .unwrap()
});

/// Common-word substitutions applied during simplification.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("utilize", "use"),
    ("utilizes", "uses"),
    ("approximately", "about"),
    ("demonstrate", "show"),
    ("demonstrates", "shows"),
    ("facilitate", "help"),
    ("subsequently", "later"),
    ("additionally", "also"),
    ("consequently", "so"),
    ("numerous", "many"),
    ("commence", "start"),
    ("terminate", "end"),
];

static SUBSTITUTION_REGEXES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SUBSTITUTIONS
        .iter()
        .map(|(from, to)| (Regex::new(&format!(r"(?i)\b{from}\b")).unwrap(), *to))
        .collect()
});

/// Flesch Reading Ease score: higher is easier, roughly 0-100 for
/// ordinary prose. Deterministic pure function of the text.
pub fn readability_score(text: &str) -> f64 {
    let normalized: String = text.nfc().collect();
    let words: Vec<&str> = normalized
        .split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .collect();

    if words.is_empty() {
        return 100.0;
    }

    let sentences = SENTENCE_BOUNDARY
        .split(&normalized)
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1);

    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let words_per_sentence = words.len() as f64 / sentences as f64;
    let syllables_per_word = syllables as f64 / words.len() as f64;

    206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word
}

/// Whether text falls below the readability threshold.
pub fn flag_complex(text: &str, threshold: f64) -> bool {
    readability_score(text) < threshold
}

/// Produce a simpler candidate: filler phrases removed, common long
/// words substituted, and overlong sentences split at clause joins.
pub fn simplify(text: &str) -> String {
    let mut result = REDUNDANT_PHRASES.replace_all(text, "").into_owned();

    for (regex, replacement) in SUBSTITUTION_REGEXES.iter() {
        result = regex
            .replace_all(&result, |caps: &regex::Captures<'_>| {
                preserve_case(&caps[0], replacement)
            })
            .into_owned();
    }

    result = split_long_sentences(&result);
    WHITESPACE_COLLAPSE
        .replace_all(&result, " ")
        .trim()
        .to_string()
}

/// Split sentences longer than ~20 words at semicolons and leading
/// coordinating clauses.
fn split_long_sentences(text: &str) -> String {
    let mut output = String::with_capacity(text.len());

    for (i, sentence) in text.split_inclusive(&['.', '!', '?'][..]).enumerate() {
        if i > 0 {
            output.push(' ');
        }
        let word_count = sentence.split_whitespace().count();
        if word_count > 20 {
            let mut split = sentence.replace("; ", ". ");
            if let Some(pos) = split.find(", and ") {
                split.replace_range(pos..pos + 6, ". And ");
            } else if let Some(pos) = split.find(", but ") {
                split.replace_range(pos..pos + 6, ". But ");
            }
            output.push_str(split.trim());
        } else {
            output.push_str(sentence.trim());
        }
    }

    output
}

/// Carry the original word's leading capitalization onto a replacement.
fn preserve_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(|c| c.is_uppercase()) {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}

/// Count syllables with a vowel-group heuristic and a silent-e rule.
fn count_syllables(word: &str) -> usize {
    let cleaned: String = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    if cleaned.is_empty() {
        return 1;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut previous_was_vowel = false;
    for c in cleaned.chars() {
        let vowel = is_vowel(c);
        if vowel && !previous_was_vowel {
            count += 1;
        }
        previous_was_vowel = vowel;
    }

    // Trailing silent e, except in words like "table" where -le is voiced.
    if count > 1 && cleaned.ends_with('e') && !cleaned.ends_with("le") {
        count -= 1;
    }

    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syllable_counts() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("water"), 2);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("home"), 1);
        assert_eq!(count_syllables("accessibility"), 6);
        assert_eq!(count_syllables("a"), 1);
        assert_eq!(count_syllables("123"), 1);
    }

    #[test]
    fn test_simple_text_scores_higher_than_dense_text() {
        let simple = "The cat sat on the mat. The dog ran home.";
        let dense = "Organizational stakeholders subsequently operationalized \
                     multidimensional accessibility remediation methodologies \
                     notwithstanding considerable infrastructural impediments.";
        assert!(readability_score(simple) > readability_score(dense));
        assert!(readability_score(simple) > 80.0);
        assert!(readability_score(dense) < 0.0);
    }

    #[test]
    fn test_readability_is_deterministic() {
        let text = "Measurements should be repeatable across invocations.";
        assert_eq!(readability_score(text), readability_score(text));
    }

    #[test]
    fn test_empty_text_is_maximally_readable() {
        assert_eq!(readability_score(""), 100.0);
        assert_eq!(readability_score("   \n "), 100.0);
    }

    #[test]
    fn test_flag_complex() {
        assert!(!flag_complex("The cat sat on the mat.", 50.0));
        assert!(flag_complex(
            "Interdepartmental organizational methodologies necessitate \
             comprehensive multidimensional considerations.",
            50.0
        ));
    }

    #[test]
    fn test_simplify_substitutes_common_words() {
        let out = simplify("We utilize numerous tools.");
        assert_eq!(out, "We use many tools.");
    }

    #[test]
    fn test_simplify_preserves_capitalization() {
        let out = simplify("Utilize the ramp. Additionally, mind the step.");
        assert_eq!(out, "Use the ramp. Also, mind the step.");
    }

    #[test]
    fn test_simplify_removes_filler_phrases() {
        let out = simplify("It is important to note that the door is locked.");
        assert_eq!(out, "the door is locked.");
    }

    #[test]
    fn test_simplify_splits_long_sentences() {
        let long = "The committee reviewed the proposal in detail over several \
                    sessions during the spring quarter, and the final decision \
                    was communicated to all departments by email.";
        let out = simplify(long);
        assert!(out.contains(". And "), "expected a sentence split: {out}");
    }

    #[test]
    fn test_simplify_is_deterministic_and_advisory() {
        let text = "It should be noted that we utilize approximately fifty tools.";
        let once = simplify(text);
        let twice = simplify(&once);
        assert_eq!(simplify(text), once);
        // Re-simplifying an already simple text is a no-op.
        assert_eq!(twice, once);
    }
}
