use crate::model::ContentType;

/// One markdown block as classified by `blocks::split`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
    /// Byte offset of this block's first character in the original text.
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Table,
    Code,
    List,
    Paragraph,
    PageMarker,
    Empty,
}

/// Maps a byte offset to a 1-based page number, built from the OCR JSON
/// block tree's page boundaries. Lookup is a binary search.
#[derive(Debug, Clone, Default)]
pub struct PageOffsets {
    /// Sorted `(start_offset, page_number)` pairs.
    boundaries: Vec<(usize, i64)>,
}

impl PageOffsets {
    pub fn new(mut boundaries: Vec<(usize, i64)>) -> Self {
        boundaries.sort_by_key(|(offset, _)| *offset);
        Self { boundaries }
    }

    /// The page containing `offset`, or `None` if no page data is known.
    pub fn page_at(&self, offset: usize) -> Option<i64> {
        if self.boundaries.is_empty() {
            return None;
        }
        match self.boundaries.binary_search_by_key(&offset, |(o, _)| *o) {
            Ok(idx) => Some(self.boundaries[idx].1),
            Err(0) => Some(self.boundaries[0].1),
            Err(idx) => Some(self.boundaries[idx - 1].1),
        }
    }

    /// `"m-n"` when a span crosses pages, `None` when it stays on one page.
    pub fn page_range(&self, start: usize, end: usize) -> Option<String> {
        let first = self.page_at(start)?;
        let last = self.page_at(end.saturating_sub(1).max(start))?;
        if first == last {
            None
        } else {
            Some(format!("{first}-{last}"))
        }
    }
}

/// A byte span in the source text known to be a table or figure, detected
/// from the OCR JSON block tree ahead of chunking.
#[derive(Debug, Clone)]
pub struct AtomicRegion {
    pub start: usize,
    pub end: usize,
    pub kind: AtomicRegionKind,
    pub table_headers: Vec<String>,
    pub table_rows: usize,
    pub table_caption: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicRegionKind {
    Table,
    Figure,
}

/// One emitted chunk before it is turned into a `Chunk` row + provenance.
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub index: i64,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub page_number: Option<i64>,
    pub page_range: Option<String>,
    pub overlap_previous: i64,
    pub overlap_next: i64,
    pub heading_context: String,
    pub heading_level: i64,
    pub section_path: String,
    pub content_types: Vec<ContentType>,
    pub is_atomic: bool,
    pub table_metadata: Option<crate::json_value::TableMetadata>,
}
