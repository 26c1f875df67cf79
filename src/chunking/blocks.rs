//! Splits markdown on blank-line boundaries into classified blocks. A code
//! fence spanning blank lines is merged back into one block so it is never
//! split mid-fence.

use super::headings;
use super::types::{Block, BlockKind};

pub fn split(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut offset = 0usize;
    let mut segment_start = 0usize;
    let mut lines_in_segment: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.split_inclusive('\n') {
        let stripped = line.trim_end_matches('\n');
        let line_starts_fence = stripped.trim_start().starts_with("```");

        if stripped.trim().is_empty() && !in_fence {
            if !lines_in_segment.is_empty() {
                push_segment(&mut blocks, &lines_in_segment, segment_start, offset);
                lines_in_segment.clear();
            }
            segment_start = offset + line.len();
        } else {
            if lines_in_segment.is_empty() {
                segment_start = offset;
            }
            lines_in_segment.push(stripped);
            if line_starts_fence {
                in_fence = !in_fence;
            }
        }
        offset += line.len();
    }

    if !lines_in_segment.is_empty() {
        push_segment(&mut blocks, &lines_in_segment, segment_start, offset);
    }

    blocks
}

fn push_segment(blocks: &mut Vec<Block>, lines: &[&str], start: usize, end: usize) {
    let text = lines.join("\n");
    let kind = classify(lines, &text);
    blocks.push(Block { kind, text, start, end });
}

fn classify(lines: &[&str], text: &str) -> BlockKind {
    if lines.iter().all(|l| l.trim().is_empty()) {
        return BlockKind::Empty;
    }
    if lines.len() == 1 && lines[0].trim_start().starts_with("[[page:") {
        return BlockKind::PageMarker;
    }
    if lines[0].trim_start().starts_with("```") {
        return BlockKind::Code;
    }
    if headings::detect(lines[0]).is_some() && lines.len() == 1 {
        let level = headings::detect(lines[0]).unwrap().0;
        return BlockKind::Heading(level);
    }
    if is_table(lines) {
        return BlockKind::Table;
    }
    if lines.iter().all(|l| {
        let t = l.trim_start();
        t.is_empty() || t.starts_with("- ") || t.starts_with("* ") || starts_with_ordinal(t)
    }) {
        return BlockKind::List;
    }
    let _ = text;
    BlockKind::Paragraph
}

fn starts_with_ordinal(line: &str) -> bool {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && line[digits.len()..].starts_with(". ")
}

fn is_table(lines: &[&str]) -> bool {
    if lines.len() < 2 {
        return false;
    }
    let has_pipe_row = lines[0].contains('|');
    let separator_row = lines[1].trim();
    let is_separator = !separator_row.is_empty()
        && separator_row.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '));
    has_pipe_row && is_separator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_separates_paragraphs_on_blank_lines() {
        let blocks = split("First paragraph.\n\nSecond paragraph.\n");
        let non_empty: Vec<_> = blocks.iter().filter(|b| b.kind != BlockKind::Empty).collect();
        assert_eq!(non_empty.len(), 2);
        assert_eq!(non_empty[0].text, "First paragraph.");
        assert_eq!(non_empty[1].text, "Second paragraph.");
    }

    #[test]
    fn test_code_fence_spanning_blank_line_stays_one_block() {
        let text = "```rust\nfn main() {\n\nlet x = 1;\n}\n```\n";
        let blocks = split(text);
        let code_blocks: Vec<_> = blocks.iter().filter(|b| b.kind == BlockKind::Code).collect();
        assert_eq!(code_blocks.len(), 1);
        assert!(code_blocks[0].text.contains("let x = 1;"));
    }

    #[test]
    fn test_table_requires_pipe_row_and_separator() {
        let blocks = split("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(blocks.iter().any(|b| b.kind == BlockKind::Table));
    }

    #[test]
    fn test_heading_block_classified() {
        let blocks = split("# Title\n\nBody text.\n");
        assert_eq!(blocks[0].kind, BlockKind::Heading(1));
    }
}
