//! Escapes FTS5 reserved tokens in a user query before it reaches
//! `MATCH`, so a query string is always evaluated as ordinary terms rather
//! than accidentally triggering FTS5 operator syntax.
//!
//! `AND`/`OR`/`NOT` pass through unescaped so callers can still combine
//! terms with boolean operators. `NEAR` is deliberately NOT on that list —
//! it is quoted like any other term, so `"house NEAR river"` searches for
//! the literal word "NEAR" rather than invoking FTS5's proximity operator.

const PASSTHROUGH_OPERATORS: &[&str] = &["AND", "OR", "NOT"];

/// Sanitize a raw query string into FTS5 `MATCH` syntax.
pub fn sanitize(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| {
            if PASSTHROUGH_OPERATORS.contains(&token) {
                token.to_string()
            } else {
                quote_term(token)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_term(token: &str) -> String {
    let escaped = token.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_is_quoted_not_treated_as_operator() {
        let sanitized = sanitize("house NEAR river");
        assert_eq!(sanitized, "\"house\" \"NEAR\" \"river\"");
    }

    #[test]
    fn test_and_or_not_pass_through() {
        let sanitized = sanitize("cats AND dogs OR NOT fish");
        assert_eq!(sanitized, "\"cats\" AND \"dogs\" OR NOT \"fish\"");
    }

    #[test]
    fn test_embedded_quotes_are_escaped() {
        let sanitized = sanitize("say \"hi\"");
        assert_eq!(sanitized, "\"say\" \"\"\"hi\"\"\"");
    }
}
