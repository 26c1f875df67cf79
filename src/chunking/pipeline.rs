//! Orchestrates block parsing, section tracking, atomic-region detection,
//! size-aware splitting and the tiny-chunk merge into the final list of
//! `ChunkDraft`s, then builds the CHUNK provenance row for each.

use serde_json::Value;
use uuid::Uuid;

use crate::json_value::ProcessingParams;
use crate::model::ContentType;
use crate::provenance::{ProvenanceRecord, ProvenanceType, SourceType};

use super::atomic::{self, table_metadata};
use super::blocks::{self};
use super::headings;
use super::sections::SectionStack;
use super::splitter;
use super::types::{AtomicRegionKind, Block, BlockKind, ChunkDraft, PageOffsets};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap_percent: f64,
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap_percent: 0.2, min_chunk_size: 100 }
    }
}

/// Chunk empty text produces zero chunks.
pub fn chunk_text(
    text: &str,
    block_tree: &Value,
    page_offsets: &PageOffsets,
    config: &ChunkingConfig,
) -> Vec<ChunkDraft> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let blocks = blocks::split(text);
    let regions = atomic::find_regions(block_tree);

    let mut drafts = accumulate(&blocks, &regions, text, page_offsets, config);
    merge_tiny_chunks(&mut drafts, config.min_chunk_size);
    apply_overlap(&mut drafts, config);
    reindex(&mut drafts);
    drafts
}

struct Accumulator {
    text: String,
    start: usize,
}

fn accumulate(
    blocks: &[Block],
    regions: &[super::types::AtomicRegion],
    source: &str,
    page_offsets: &PageOffsets,
    config: &ChunkingConfig,
) -> Vec<ChunkDraft> {
    let mut drafts = Vec::new();
    let mut stack = SectionStack::new();
    let mut acc: Option<Accumulator> = None;

    let large_atomic_threshold = config.chunk_size / 4;

    for block in blocks {
        match block.kind {
            BlockKind::Empty | BlockKind::PageMarker => continue,
            BlockKind::Heading(level) => {
                flush(&mut acc, &stack, page_offsets, config, &mut drafts);
                if let Some((_, text)) = headings::detect(&block.text) {
                    stack.push_heading(level, &text);
                }
                continue;
            }
            _ => {}
        }

        let region = atomic::overlaps_region(regions, block.start, block.end);
        let is_large_atomic = matches!(block.kind, BlockKind::Table | BlockKind::Code)
            && block.text.len() >= large_atomic_threshold;
        let is_region_atomic = region.is_some();

        if is_large_atomic || is_region_atomic {
            flush(&mut acc, &stack, page_offsets, config, &mut drafts);
            emit_atomic(block, region, &stack, page_offsets, config, &mut drafts);
            continue;
        }

        if let Some(a) = &mut acc {
            a.text.push('\n');
            a.text.push_str(&block.text);
        } else {
            acc = Some(Accumulator { text: block.text.clone(), start: block.start });
        }

        while let Some(a) = &acc {
            if a.text.len() <= config.chunk_size {
                break;
            }
            let cut = splitter::split_at_boundary(&a.text, config.chunk_size);
            let (head, tail) = a.text.split_at(cut);
            let head = head.to_string();
            let tail_start = a.start + cut;
            let tail = tail.trim_start().to_string();

            push_draft(&mut drafts, head, a.start, a.start + cut, &stack, page_offsets, false, None, vec![content_type_for(block.kind)]);

            acc = Some(Accumulator { text: tail, start: tail_start });
        }
    }

    flush(&mut acc, &stack, page_offsets, config, &mut drafts);
    drafts
}

fn flush(
    acc: &mut Option<Accumulator>,
    stack: &SectionStack,
    page_offsets: &PageOffsets,
    _config: &ChunkingConfig,
    drafts: &mut Vec<ChunkDraft>,
) {
    if let Some(a) = acc.take() {
        if !a.text.trim().is_empty() {
            let end = a.start + a.text.len();
            push_draft(drafts, a.text.clone(), a.start, end, stack, page_offsets, false, None, vec![ContentType::Text]);
        }
    }
}

fn emit_atomic(
    block: &Block,
    region: Option<&super::types::AtomicRegion>,
    stack: &SectionStack,
    page_offsets: &PageOffsets,
    config: &ChunkingConfig,
    drafts: &mut Vec<ChunkDraft>,
) {
    let table_meta = region
        .filter(|r| r.kind == AtomicRegionKind::Table || block.kind == BlockKind::Table)
        .map(|r| table_metadata(r, &block.text));

    let content_type = if block.kind == BlockKind::Table || table_meta.is_some() {
        ContentType::Table
    } else if block.kind == BlockKind::Code {
        ContentType::Code
    } else {
        ContentType::Text
    };

    let cleaned = if content_type == ContentType::Table {
        atomic::strip_html(&block.text)
    } else {
        block.text.clone()
    };

    if cleaned.len() <= config.max_chunk_size_for_atomic() {
        push_draft(drafts, cleaned, block.start, block.end, stack, page_offsets, true, table_meta, vec![content_type]);
        return;
    }

    let header_prefix = table_meta
        .as_ref()
        .map(|m| format!("[Table: {}] ", m.column_headers.join(" | ")))
        .unwrap_or_default();

    let mut remaining = cleaned.as_str();
    let mut offset = block.start;
    while !remaining.is_empty() {
        let budget = config.max_chunk_size_for_atomic().saturating_sub(header_prefix.len()).max(1);
        let cut = line_boundary_cut(remaining, budget);
        let (head, tail) = remaining.split_at(cut);
        let sub_text = format!("{header_prefix}{head}");
        push_draft(
            drafts,
            sub_text,
            offset,
            offset + cut,
            stack,
            page_offsets,
            true,
            table_meta.clone(),
            vec![content_type],
        );
        offset += cut;
        remaining = tail;
    }
}

fn line_boundary_cut(text: &str, max_len: usize) -> usize {
    if text.len() <= max_len {
        return text.len();
    }
    match text[..max_len].rfind('\n') {
        Some(pos) => pos + 1,
        None => max_len,
    }
}

impl ChunkingConfig {
    fn max_chunk_size_for_atomic(&self) -> usize {
        self.chunk_size
    }
}

#[allow(clippy::too_many_arguments)]
fn push_draft(
    drafts: &mut Vec<ChunkDraft>,
    text: String,
    start: usize,
    end: usize,
    stack: &SectionStack,
    page_offsets: &PageOffsets,
    is_atomic: bool,
    table_metadata: Option<crate::json_value::TableMetadata>,
    mut content_types: Vec<ContentType>,
) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    content_types.sort_by_key(|c| c.as_str());
    content_types.dedup();

    drafts.push(ChunkDraft {
        index: 0,
        text: trimmed.to_string(),
        start_offset: start,
        end_offset: end,
        page_number: page_offsets.page_at(start),
        page_range: page_offsets.page_range(start, end),
        overlap_previous: 0,
        overlap_next: 0,
        heading_context: stack.context(),
        heading_level: stack.level(),
        section_path: stack.path(),
        content_types,
        is_atomic,
        table_metadata,
    });
}

fn content_type_for(kind: BlockKind) -> ContentType {
    match kind {
        BlockKind::Heading(_) => ContentType::Heading,
        BlockKind::Table => ContentType::Table,
        BlockKind::Code => ContentType::Code,
        BlockKind::List => ContentType::List,
        _ => ContentType::Text,
    }
}

/// Merge any chunk that is heading-only or shorter than `min_chunk_size`
/// into an adjacent non-atomic neighbor (preferring the next one), keeping
/// the earlier neighbor's section attribution.
fn merge_tiny_chunks(drafts: &mut Vec<ChunkDraft>, min_chunk_size: usize) {
    let mut i = 0;
    while i < drafts.len() {
        let tiny = splitter::should_merge(&drafts[i].text, drafts[i].is_atomic, min_chunk_size);
        if !tiny {
            i += 1;
            continue;
        }

        if i + 1 < drafts.len() && !drafts[i + 1].is_atomic {
            let removed = drafts.remove(i);
            let next = &mut drafts[i];
            next.text = format!("{}\n{}", removed.text, next.text);
            next.start_offset = removed.start_offset.min(next.start_offset);
        } else if i > 0 && !drafts[i - 1].is_atomic {
            let removed = drafts.remove(i);
            let prev = &mut drafts[i - 1];
            prev.text = format!("{}\n{}", prev.text, removed.text);
            prev.end_offset = removed.end_offset.max(prev.end_offset);
        } else {
            i += 1;
        }
    }
}

/// Non-atomic consecutive chunks get symmetric overlap; atomic chunks
/// always have zero overlap on both sides.
fn apply_overlap(drafts: &mut [ChunkDraft], config: &ChunkingConfig) {
    let overlap = splitter::overlap_size(config.chunk_size, config.overlap_percent);
    for i in 0..drafts.len() {
        if drafts[i].is_atomic {
            continue;
        }
        if i > 0 && !drafts[i - 1].is_atomic {
            drafts[i].overlap_previous = overlap.min(drafts[i].text.len()) as i64;
        }
        if i + 1 < drafts.len() && !drafts[i + 1].is_atomic {
            drafts[i].overlap_next = overlap.min(drafts[i].text.len()) as i64;
        }
    }
}

fn reindex(drafts: &mut [ChunkDraft]) {
    for (i, draft) in drafts.iter_mut().enumerate() {
        draft.index = i as i64;
    }
}

/// Build the CHUNK provenance row for one emitted draft.
#[allow(clippy::too_many_arguments)]
pub fn build_provenance(
    draft: &ChunkDraft,
    total_chunks: usize,
    ocr_provenance_id: Uuid,
    ocr_content_hash: &str,
    root_document_id: Uuid,
    chain_path: Vec<String>,
    chain_depth: i64,
    config: &ChunkingConfig,
) -> ProvenanceRecord {
    let content_types: Vec<String> = draft.content_types.iter().map(|c| c.as_str().to_string()).collect();
    ProvenanceRecord {
        id: Uuid::new_v4(),
        record_type: ProvenanceType::Chunk,
        created_at: chrono::Utc::now(),
        processed_at: Some(chrono::Utc::now()),
        source_type: SourceType::Chunking,
        source_id: Some(ocr_provenance_id),
        root_document_id,
        parent_id: Some(ocr_provenance_id),
        parent_ids: vec![ocr_provenance_id],
        chain_depth,
        chain_path,
        content_hash: crate::hash::hash_str(&draft.text),
        input_hash: ocr_content_hash.to_string(),
        file_hash: None,
        processor: "chunker".to_string(),
        processor_version: "1".to_string(),
        processing_params: ProcessingParams::chunking(
            config.chunk_size,
            config.overlap_percent,
            if draft.is_atomic { "atomic" } else { "sentence_boundary" },
            draft.index as usize,
            total_chunks,
            draft.start_offset,
            draft.end_offset,
            &draft.heading_context,
            &draft.section_path,
            draft.is_atomic,
            &content_types,
        ),
        processing_duration_ms: 0,
        processing_quality_score: None,
        location: Some(crate::json_value::Location {
            chunk_index: Some(draft.index),
            character_start: Some(draft.start_offset as i64),
            character_end: Some(draft.end_offset as i64),
            page_number: draft.page_number,
            page_range: draft.page_range.clone(),
            extra: Default::default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_text_produces_zero_chunks() {
        let drafts = chunk_text("", &json!({}), &PageOffsets::default(), &ChunkingConfig::default());
        assert!(drafts.is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let drafts = chunk_text(
            "The house is near the river and the park",
            &json!({}),
            &PageOffsets::default(),
            &ChunkingConfig::default(),
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].index, 0);
        assert!(!drafts[0].is_atomic);
    }

    #[test]
    fn test_heading_starts_new_chunk() {
        let text = "# Intro\nFirst paragraph.\n\n# Methods\nSecond paragraph.\n";
        let drafts = chunk_text(text, &json!({}), &PageOffsets::default(), &ChunkingConfig::default());
        assert!(drafts.iter().any(|d| d.heading_context == "Intro"));
        assert!(drafts.iter().any(|d| d.heading_context == "Methods"));
    }

    #[test]
    fn test_large_atomic_block_splits_with_header_prefix() {
        let mut config = ChunkingConfig::default();
        config.chunk_size = 50;
        let table_text = "| A | B |\n|---|---|\n".to_string() + &"| 1 | 2 |\n".repeat(20);
        let tree = json!({"blocks": [{"block_type": "Table", "start_offset": 0, "end_offset": table_text.len(), "column_headers": ["A", "B"], "row_count": 20}]});
        let drafts = chunk_text(&table_text, &tree, &PageOffsets::default(), &config);
        assert!(drafts.len() > 1);
        assert!(drafts.iter().all(|d| d.is_atomic));
        assert!(drafts[1].text.starts_with("[Table:"));
    }

    #[test]
    fn test_tiny_heading_only_chunk_is_merged() {
        let text = "# A\nok\n\nSome much longer paragraph text that exceeds the minimum chunk size threshold easily here.";
        let mut config = ChunkingConfig::default();
        config.min_chunk_size = 50;
        let drafts = chunk_text(text, &json!({}), &PageOffsets::default(), &config);
        assert!(drafts.iter().all(|d| d.text.trim().len() >= 1));
    }
}
