//! Atomic region detection from the OCR JSON block tree, table metadata
//! synthesis, and HTML stripping ahead of FTS indexing.

use serde_json::Value;

use super::types::{AtomicRegion, AtomicRegionKind};
use crate::json_value::TableMetadata;

/// Walk the OCR JSON block tree and collect table/figure regions by
/// character offset. Unrecognized block shapes are skipped rather than
/// treated as an error — a block tree from a future OCR version should
/// degrade to "no atomic regions found", not fail chunking outright.
pub fn find_regions(block_tree: &Value) -> Vec<AtomicRegion> {
    let mut regions = Vec::new();
    if let Some(blocks) = block_tree.get("blocks").and_then(Value::as_array) {
        for block in blocks {
            if let Some(region) = region_from_block(block) {
                regions.push(region);
            }
        }
    }
    regions
}

fn region_from_block(block: &Value) -> Option<AtomicRegion> {
    let block_type = block.get("block_type").and_then(Value::as_str)?;
    let start = block.get("start_offset").and_then(Value::as_u64)? as usize;
    let end = block.get("end_offset").and_then(Value::as_u64)? as usize;

    let kind = match block_type {
        "Table" | "TableOfContents" => AtomicRegionKind::Table,
        "Figure" | "Picture" => AtomicRegionKind::Figure,
        _ => return None,
    };

    let (table_headers, table_rows) = if kind == AtomicRegionKind::Table {
        let headers = block
            .get("column_headers")
            .and_then(Value::as_array)
            .map(|v| v.iter().filter_map(|h| h.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let rows = block.get("row_count").and_then(Value::as_u64).unwrap_or(0) as usize;
        (headers, rows)
    } else {
        (Vec::new(), 0)
    };

    let table_caption = block.get("caption").and_then(Value::as_str).map(String::from);

    Some(AtomicRegion { start, end, kind, table_headers, table_rows, table_caption })
}

/// Does `[start, end)` overlap any atomic region?
pub fn overlaps_region(regions: &[AtomicRegion], start: usize, end: usize) -> Option<&AtomicRegion> {
    regions.iter().find(|r| start < r.end && end > r.start)
}

/// Build `TableMetadata` for a table region: column headers, row/column
/// counts, optional caption, and a one-line summary synthesized from the
/// headers and the first data row.
pub fn table_metadata(region: &AtomicRegion, text: &str) -> TableMetadata {
    let column_count = region.table_headers.len();
    let summary = synthesize_summary(&region.table_headers, text);
    TableMetadata {
        column_headers: region.table_headers.clone(),
        row_count: region.table_rows,
        column_count,
        caption: region.table_caption.clone(),
        summary,
        extra: Default::default(),
    }
}

fn synthesize_summary(headers: &[String], text: &str) -> String {
    if headers.is_empty() {
        return "Table with no detected headers.".to_string();
    }
    let first_data_row = text
        .lines()
        .skip(2)
        .find(|l| l.contains('|'))
        .map(|l| l.trim().trim_matches('|').to_string());

    match first_data_row {
        Some(row) => format!("Table with columns {} — e.g. {}", headers.join(", "), row),
        None => format!("Table with columns {}", headers.join(", ")),
    }
}

/// Strip HTML tags from table text before it is fed to FTS indexing. Only
/// tags are removed; entities are left as-is since the OCR output rarely
/// emits them.
pub fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_regions_skips_unknown_block_types() {
        let tree = json!({
            "blocks": [
                {"block_type": "Table", "start_offset": 10, "end_offset": 50, "column_headers": ["A", "B"], "row_count": 3},
                {"block_type": "Paragraph", "start_offset": 60, "end_offset": 80},
            ]
        });
        let regions = find_regions(&tree);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, AtomicRegionKind::Table);
    }

    #[test]
    fn test_overlaps_region_detects_intersection() {
        let regions = vec![AtomicRegion {
            start: 10,
            end: 50,
            kind: AtomicRegionKind::Table,
            table_headers: vec![],
            table_rows: 0,
            table_caption: None,
        }];
        assert!(overlaps_region(&regions, 40, 60).is_some());
        assert!(overlaps_region(&regions, 51, 60).is_none());
    }

    #[test]
    fn test_strip_html_removes_tags_only() {
        assert_eq!(strip_html("<b>bold</b> text"), "bold text");
    }

    #[test]
    fn test_table_metadata_synthesizes_summary() {
        let region = AtomicRegion {
            start: 0,
            end: 30,
            kind: AtomicRegionKind::Table,
            table_headers: vec!["Name".into(), "Age".into()],
            table_rows: 2,
            table_caption: None,
        };
        let text = "| Name | Age |\n|---|---|\n| Alice | 30 |\n";
        let meta = table_metadata(&region, text);
        assert_eq!(meta.column_count, 2);
        assert!(meta.summary.contains("Name"));
    }
}
