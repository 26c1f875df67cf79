//! Size-aware splitting with sentence-boundary fallback, symmetric overlap,
//! and a tiny-chunk merge pass.

pub const BOUNDARY_SEARCH_WINDOW: usize = 500;

/// Find the best split point for `text` no later than `max_len`, searching
/// backward within a window for, in priority order: sentence-final
/// punctuation followed by whitespace, a paragraph break, a line break, any
/// space, else a hard cut at `max_len`.
pub fn split_at_boundary(text: &str, max_len: usize) -> usize {
    if text.len() <= max_len {
        return text.len();
    }

    let window_start = max_len.saturating_sub(BOUNDARY_SEARCH_WINDOW);
    let window = &text[window_start..max_len];

    if let Some(pos) = find_sentence_end(window) {
        return window_start + pos;
    }
    if let Some(pos) = window.rfind("\n\n") {
        return window_start + pos + 2;
    }
    if let Some(pos) = window.rfind('\n') {
        return window_start + pos + 1;
    }
    if let Some(pos) = window.rfind(' ') {
        return window_start + pos + 1;
    }
    max_len
}

/// Last occurrence of sentence-final punctuation followed by whitespace
/// (or end of window), returning the offset just past the punctuation.
fn find_sentence_end(window: &str) -> Option<usize> {
    let bytes = window.as_bytes();
    for i in (0..bytes.len()).rev() {
        let c = bytes[i];
        if matches!(c, b'.' | b'!' | b'?') {
            let followed_by_space = bytes.get(i + 1).map(|b| b.is_ascii_whitespace()).unwrap_or(true);
            if followed_by_space {
                return Some(i + 1);
            }
        }
    }
    None
}

/// Characters of symmetric overlap for a given chunk size and percent.
pub fn overlap_size(chunk_size: usize, overlap_percent: f64) -> usize {
    ((chunk_size as f64) * overlap_percent).round() as usize
}

/// A chunk too small to stand alone (heading-only or shorter than
/// `min_chunk_size`) is merged into its next non-atomic neighbor; failing
/// that, the previous one, preserving the earlier neighbor's section
/// attribution so provenance stays continuous.
pub fn should_merge(text: &str, is_atomic: bool, min_chunk_size: usize) -> bool {
    !is_atomic && text.trim().len() < min_chunk_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_prefers_sentence_boundary() {
        let text = "First sentence. Second sentence. Third sentence that runs long enough to matter here.";
        let cut = split_at_boundary(text, 40);
        assert!(text[..cut].ends_with(". ") || text[..cut].ends_with('.'));
    }

    #[test]
    fn test_split_falls_back_to_space_when_no_sentence_boundary() {
        let text = "a".repeat(30) + " " + &"b".repeat(30);
        let cut = split_at_boundary(&text, 35);
        assert!(cut <= 35);
    }

    #[test]
    fn test_split_returns_full_length_when_under_max() {
        assert_eq!(split_at_boundary("short", 100), 5);
    }

    #[test]
    fn test_overlap_size_rounds() {
        assert_eq!(overlap_size(1000, 0.2), 200);
    }

    #[test]
    fn test_should_merge_respects_minimum() {
        assert!(should_merge("tiny", false, 100));
        assert!(!should_merge(&"x".repeat(200), false, 100));
        assert!(!should_merge("tiny", true, 100));
    }
}
