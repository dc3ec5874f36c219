//! Content-quality checks for programmatic pages.
//!
//! Thin or near-duplicate programmatic pages attract search-engine penalties
//! that hit the whole site, so every item is checked before publishing:
//!
//! - **Depth**: at least 300 words of body (tags stripped) and at least 3
//!   FAQs. Findings are advisory — they are reported, never build-blocking.
//! - **Similarity**: Jaccard similarity over 3-word shingles. Scores above
//!   0.8 flag a probable duplicate. This is a heuristic; the contract is
//!   reproducibility and symmetry, not precision.
//! - **Content hash**: a stable 32-bit rolling hash of the trimmed body,
//!   used only for change detection.

use std::collections::HashSet;
use std::fmt;

/// Minimum body word count after tag stripping.
pub const MIN_WORD_COUNT: usize = 300;
/// Minimum FAQ count per item.
pub const MIN_FAQ_COUNT: usize = 3;
/// Jaccard score above which two bodies are flagged as probable duplicates.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// One advisory content-quality finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    ThinContent { words: usize },
    InsufficientFaqs { count: usize },
    EmptyBody,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::ThinContent { words } => {
                write!(f, "thin content: {words} words (minimum {MIN_WORD_COUNT})")
            }
            Violation::InsufficientFaqs { count } => {
                write!(f, "insufficient FAQs: {count} found (minimum {MIN_FAQ_COUNT})")
            }
            Violation::EmptyBody => write!(f, "content is empty"),
        }
    }
}

/// Result of a depth check.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub violations: Vec<Violation>,
}

impl Report {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check minimum depth requirements for one item's body and FAQ list.
pub fn validate_depth(body: &str, faq_count: usize) -> Report {
    let mut violations = Vec::new();

    if body.trim().is_empty() {
        violations.push(Violation::EmptyBody);
        return Report { violations };
    }

    let words = word_count(body);
    if words < MIN_WORD_COUNT {
        violations.push(Violation::ThinContent { words });
    }

    if faq_count < MIN_FAQ_COUNT {
        violations.push(Violation::InsufficientFaqs { count: faq_count });
    }

    Report { violations }
}

/// Count words in a body after stripping HTML tags and markdown punctuation.
pub fn word_count(body: &str) -> usize {
    let clean = strip_markup(body);
    clean.split_whitespace().filter(|w| !w.is_empty()).count()
}

/// Replace HTML tags and markdown syntax characters with spaces so they never
/// glue adjacent words together.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if in_tag => {}
            '#' | '*' | '`' | '_' | '~' | '[' | ']' | '(' | ')' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

/// Jaccard similarity of two texts over 3-word shingle sets, in `[0, 1]`.
///
/// Symmetric and reproducible: the same pair always yields the same score.
/// Texts too short to form a single shingle score 0 against everything.
pub fn similarity(a: &str, b: &str) -> f64 {
    let shingles_a = shingles(a);
    let shingles_b = shingles(b);

    if shingles_a.is_empty() || shingles_b.is_empty() {
        return 0.0;
    }

    let intersection = shingles_a.intersection(&shingles_b).count();
    let union = shingles_a.len() + shingles_b.len() - intersection;
    intersection as f64 / union as f64
}

/// Whether a similarity score flags a probable duplicate.
pub fn is_probable_duplicate(score: f64) -> bool {
    score > SIMILARITY_THRESHOLD
}

/// Build the 3-consecutive-token shingle set of a text: lowercased,
/// punctuation stripped, whitespace-tokenized.
fn shingles(text: &str) -> HashSet<String> {
    let tokens: Vec<String> = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .map(|t| t.to_string())
        .collect();

    let mut set = HashSet::new();
    for window in tokens.windows(3) {
        set.insert(window.join(" "));
    }
    set
}

/// Stable 32-bit rolling hash of the trimmed content, for change detection
/// only (not cryptographic). Matches the data files produced by the previous
/// tooling: `h = (h << 5) - h + c` over the text, wrapping at 32 bits.
pub fn content_hash(content: &str) -> u32 {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let mut hash: i32 = 0;
    for c in trimmed.chars() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(c as i32);
    }
    hash as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    // =========================================================================
    // Depth thresholds
    // =========================================================================

    #[test]
    fn body_of_299_words_is_thin() {
        let report = validate_depth(&words(299), 3);
        assert_eq!(
            report.violations,
            vec![Violation::ThinContent { words: 299 }]
        );
    }

    #[test]
    fn body_of_300_words_is_not_thin() {
        let report = validate_depth(&words(300), 3);
        assert!(report.is_valid());
    }

    #[test]
    fn two_faqs_is_insufficient() {
        let report = validate_depth(&words(300), 2);
        assert_eq!(
            report.violations,
            vec![Violation::InsufficientFaqs { count: 2 }]
        );
    }

    #[test]
    fn three_faqs_is_sufficient() {
        assert!(validate_depth(&words(300), 3).is_valid());
    }

    #[test]
    fn empty_body_short_circuits() {
        let report = validate_depth("   ", 0);
        assert_eq!(report.violations, vec![Violation::EmptyBody]);
    }

    #[test]
    fn tags_do_not_count_as_words() {
        // 299 words wrapped in markup must still be thin.
        let body = format!("<h2 class=\"intro\">{}</h2>", words(299));
        let report = validate_depth(&body, 3);
        assert_eq!(
            report.violations,
            vec![Violation::ThinContent { words: 299 }]
        );
    }

    #[test]
    fn markdown_punctuation_is_stripped() {
        assert_eq!(word_count("## **bold** `code` [link](url)"), 4);
    }

    // =========================================================================
    // Similarity
    // =========================================================================

    #[test]
    fn identical_texts_score_one() {
        let text = "a data lake stores raw data in open formats";
        assert_eq!(similarity(text, text), 1.0);
    }

    #[test]
    fn disjoint_texts_score_zero() {
        let a = "alpha beta gamma delta epsilon";
        let b = "one two three four five";
        assert_eq!(similarity(a, b), 0.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = "the quick brown fox jumps over the lazy dog";
        let b = "the quick brown fox sleeps under the lazy dog";
        assert_eq!(similarity(a, b), similarity(b, a));
    }

    #[test]
    fn similarity_is_reproducible() {
        let a = "streaming pipelines process events in near real time";
        let b = "batch pipelines process files on a fixed schedule";
        assert_eq!(similarity(a, b), similarity(a, b));
    }

    #[test]
    fn similarity_ignores_case_and_punctuation() {
        let a = "Data Warehouse, stores curated data!";
        let b = "data warehouse stores curated data";
        assert_eq!(similarity(a, b), 1.0);
    }

    #[test]
    fn too_short_for_shingles_scores_zero() {
        assert_eq!(similarity("two words", "two words"), 0.0);
    }

    #[test]
    fn near_duplicates_cross_threshold() {
        let base = words(200);
        let tweaked = format!("{base} extra");
        let score = similarity(&base, &tweaked);
        assert!(is_probable_duplicate(score), "score was {score}");
        assert!(!is_probable_duplicate(0.8)); // boundary is exclusive
    }

    // =========================================================================
    // Content hash
    // =========================================================================

    #[test]
    fn hash_is_stable() {
        let text = "A data lake stores raw data.";
        assert_eq!(content_hash(text), content_hash(text));
    }

    #[test]
    fn hash_changes_with_content() {
        assert_ne!(content_hash("version one"), content_hash("version two"));
    }

    #[test]
    fn hash_ignores_surrounding_whitespace() {
        assert_eq!(content_hash("  body  "), content_hash("body"));
    }

    #[test]
    fn empty_hash_is_zero() {
        assert_eq!(content_hash(""), 0);
        assert_eq!(content_hash("   "), 0);
    }
}
