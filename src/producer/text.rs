//! Word-level text helpers shared by the pipeline stages
//!
//! Stopword stripping here has one hard rule: negation tokens are never
//! removed. Dropping "not" from a relation would invert the polarity of the
//! claim being checked.

/// Standard English stopwords stripped from surface forms and relation
/// phrases. Negation words are intentionally absent from this list.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "now", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so", "some",
    "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until", "up", "very",
    "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

/// Negation tokens that must survive stopword stripping
const NEGATIONS: &[&str] = &["not", "no", "never", "n't", "nor", "neither"];

/// Whether a token is a negation marker
pub fn is_negation(token: &str) -> bool {
    let lower = token.to_lowercase();
    NEGATIONS.contains(&lower.as_str()) || lower.ends_with("n't")
}

/// Whether a token would be stripped as a stopword
pub fn is_stopword(token: &str) -> bool {
    if is_negation(token) {
        return false;
    }
    STOPWORDS.contains(&token.to_lowercase().as_str())
}

/// Split a phrase into word tokens (punctuation discarded, contraction
/// negations split off like a word tokenizer would)
pub fn tokenize(phrase: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in phrase.split_whitespace() {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'' || *c == '-')
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if let Some(stem) = cleaned.to_lowercase().strip_suffix("n't") {
            if !stem.is_empty() {
                tokens.push(cleaned[..stem.len()].to_string());
                tokens.push("n't".to_string());
                continue;
            }
        }
        tokens.push(cleaned);
    }
    tokens
}

/// Remove stopwords from a phrase, keeping the original word order
pub fn strip_stopwords(phrase: &str) -> String {
    tokenize(phrase)
        .into_iter()
        .filter(|token| !is_stopword(token))
        .collect::<Vec<_>>()
        .join(" ")
}
