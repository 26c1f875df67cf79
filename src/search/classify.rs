//! Pure-heuristic query classifier: routes a query toward BM25, semantic,
//! or a hybrid of both, with a confidence score that is never 1.0.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Exact,
    Semantic,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Bm25,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub query_type: QueryType,
    pub recommended_strategy: Strategy,
    pub confidence: f64,
    pub reasoning: String,
    pub detected_patterns: Vec<String>,
}

const SEMANTIC_PHRASES: &[&str] = &["about", "related to", "similar to", "what", "why", "how"];
const MAX_CONFIDENCE: f64 = 0.95;
const DEFAULT_CONFIDENCE: f64 = 0.5;

fn id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]+-\d+$").unwrap())
}

fn iso_date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap())
}

pub fn classify(query: &str) -> Classification {
    let trimmed = query.trim();
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    let mut patterns = Vec::new();
    let mut exact_score = 0u32;
    let mut semantic_score = 0u32;

    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() > 1 {
        patterns.push("quoted_string".to_string());
        exact_score += 2;
    }
    if words.iter().any(|w| id_pattern().is_match(w)) {
        patterns.push("id_pattern".to_string());
        exact_score += 2;
    }
    if iso_date_pattern().is_match(trimmed) {
        patterns.push("iso_date".to_string());
        exact_score += 2;
    }
    if words.iter().any(|w| w.starts_with('@') || w.starts_with('#')) {
        patterns.push("prefixed_token".to_string());
        exact_score += 1;
    }
    if words.iter().any(|w| w.len() >= 6 && w.chars().all(|c| c.is_ascii_digit())) {
        patterns.push("long_number".to_string());
        exact_score += 1;
    }
    if words.iter().filter(|w| w.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)).count() >= 2 {
        patterns.push("proper_noun_sequence".to_string());
        exact_score += 1;
    }
    if words.len() <= 2 {
        patterns.push("very_short_query".to_string());
        exact_score += 1;
    }

    let lowered = trimmed.to_lowercase();
    for phrase in SEMANTIC_PHRASES {
        if lowered.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *phrase)
            || lowered.contains(phrase)
        {
            patterns.push(format!("semantic_phrase:{phrase}"));
            semantic_score += 1;
        }
    }
    if words.len() >= 10 {
        patterns.push("long_query".to_string());
        semantic_score += 2;
    }

    let (query_type, recommended_strategy) = match (exact_score > 0, semantic_score > 0) {
        (true, false) => (QueryType::Exact, Strategy::Bm25),
        (false, true) => (QueryType::Semantic, Strategy::Semantic),
        (true, true) => (QueryType::Mixed, Strategy::Hybrid),
        (false, false) => (QueryType::Mixed, Strategy::Hybrid),
    };

    let confidence = if exact_score == 0 && semantic_score == 0 {
        DEFAULT_CONFIDENCE
    } else {
        let total = (exact_score + semantic_score) as f64;
        let dominant = exact_score.max(semantic_score) as f64;
        (dominant / total.max(1.0) * MAX_CONFIDENCE).min(MAX_CONFIDENCE)
    };

    let reasoning = format!(
        "exact_score={exact_score}, semantic_score={semantic_score}, patterns={patterns:?}"
    );

    Classification { query_type, recommended_strategy, confidence, reasoning, detected_patterns: patterns }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_pattern_is_exact() {
        let c = classify("INV-2024");
        assert_eq!(c.query_type, QueryType::Exact);
        assert_eq!(c.recommended_strategy, Strategy::Bm25);
    }

    #[test]
    fn test_question_word_is_semantic() {
        let c = classify("what is the relationship between these two long documents anyway");
        assert_eq!(c.query_type, QueryType::Semantic);
    }

    #[test]
    fn test_no_signals_defaults_to_half_confidence_never_one() {
        let c = classify("xk9 zzq foo");
        assert_eq!(c.confidence, DEFAULT_CONFIDENCE);
        assert!(c.confidence < 1.0);
    }

    #[test]
    fn test_confidence_never_reaches_one() {
        let c = classify("INV-2024 2024-01-01 @mention #tag AAA BBB 12345678");
        assert!(c.confidence <= MAX_CONFIDENCE);
        assert!(c.confidence < 1.0);
    }
}
