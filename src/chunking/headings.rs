//! Heading detection: ATX (`#{1..6}`) and bold-only lines with a heuristic
//! level.

/// Returns `(level, text)` if `line` is a heading, `None` otherwise.
pub fn detect(line: &str) -> Option<(u8, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(heading) = detect_atx(trimmed) {
        return Some(heading);
    }
    detect_bold(trimmed)
}

fn detect_atx(line: &str) -> Option<(u8, String)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        return None;
    }
    Some((hashes as u8, rest.trim().to_string()))
}

fn detect_bold(line: &str) -> Option<(u8, String)> {
    let text = line.strip_prefix("**")?.strip_suffix("**")?;
    let text = text.trim();

    if text.contains('|') || text.len() > 200 || text.len() < 3 {
        return None;
    }
    if text.chars().all(|c| c.is_ascii_digit() || c.is_whitespace() || "-.".contains(c)) {
        return None;
    }

    let level = classify_bold_level(text);
    Some((level, text.to_string()))
}

fn classify_bold_level(text: &str) -> u8 {
    if text.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase()) {
        return 1;
    }
    if starts_with_roman_numeral(text) {
        return 2;
    }
    if starts_with_letter_or_number_prefix(text) {
        return 3;
    }
    2
}

fn starts_with_roman_numeral(text: &str) -> bool {
    let first_token = text.split(|c: char| c == '.' || c.is_whitespace()).next().unwrap_or("");
    !first_token.is_empty()
        && first_token.chars().all(|c| "IVXLCDM".contains(c))
        && first_token.len() <= 8
}

fn starts_with_letter_or_number_prefix(text: &str) -> bool {
    let first_token = text.split(|c: char| c == '.' || c == ')' || c.is_whitespace()).next().unwrap_or("");
    !first_token.is_empty()
        && first_token.len() <= 2
        && first_token.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atx_heading_levels() {
        assert_eq!(detect("# Title"), Some((1, "Title".to_string())));
        assert_eq!(detect("### Sub"), Some((3, "Sub".to_string())));
        assert_eq!(detect("####### too deep"), None);
    }

    #[test]
    fn test_bold_all_caps_is_level_one() {
        assert_eq!(detect("**INTRODUCTION**"), Some((1, "INTRODUCTION".to_string())));
    }

    #[test]
    fn test_bold_roman_numeral_is_level_two() {
        assert_eq!(detect("**II. Background**"), Some((2, "II. Background".to_string())));
    }

    #[test]
    fn test_bold_rejects_table_like_and_numeric_lines() {
        assert_eq!(detect("**a | b**"), None);
        assert_eq!(detect("**42**"), None);
        assert_eq!(detect("**ab**"), None);
    }
}
