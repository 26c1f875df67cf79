//! Document-pair comparison: a line-level text diff, a structural diff over
//! page/chunk/quality signals, and a one-line summary. Any signal that could
//! not be computed (e.g. one side has no OCR result yet) is named in
//! `components_failed` instead of failing the whole comparison.

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::json_value::ProcessingParams;
use crate::model::{Comparison, Document};
use crate::provenance::tracker::ProvenanceTracker;
use crate::provenance::{ProvenanceRecord, ProvenanceType, SourceType};
use crate::storage::{chunks, comparisons, ocr_results};
use sqlx::sqlite::SqlitePool;

/// Compare two documents and persist the result, with one COMPARISON
/// provenance record per pair.
pub async fn compare(pool: &SqlitePool, document_a: &Document, document_b: &Document) -> Result<Comparison> {
    let mut components_failed = Vec::new();

    let ocr_a = ocr_results::by_document(pool, document_a.id).await?;
    let ocr_b = ocr_results::by_document(pool, document_b.id).await?;

    let text_diff = match (&ocr_a, &ocr_b) {
        (Some(a), Some(b)) => Some(diff_lines(&a.extracted_text, &b.extracted_text)),
        _ => {
            components_failed.push("text_diff".to_string());
            None
        }
    };

    let chunks_a = chunks::by_document(pool, document_a.id).await?;
    let chunks_b = chunks::by_document(pool, document_b.id).await?;

    let structural = serde_json::json!({
        "page_count_a": document_a.page_count,
        "page_count_b": document_b.page_count,
        "page_count_delta": delta_opt(document_a.page_count, document_b.page_count),
        "chunk_count_a": chunks_a.len(),
        "chunk_count_b": chunks_b.len(),
        "chunk_count_delta": chunks_b.len() as i64 - chunks_a.len() as i64,
        "text_length_a": ocr_a.as_ref().map(|r| r.text_length),
        "text_length_b": ocr_b.as_ref().map(|r| r.text_length),
        "quality_score_a": ocr_a.as_ref().and_then(|r| r.parse_quality_score),
        "quality_score_b": ocr_b.as_ref().and_then(|r| r.parse_quality_score),
        "ocr_mode_a": ocr_a.as_ref().map(|r| r.datalab_mode.clone()),
        "ocr_mode_b": ocr_b.as_ref().map(|r| r.datalab_mode.clone()),
    });
    let structural_diff = Some(crate::hash::canonical_json_string(&structural));

    let summary = summarize(&text_diff, document_a.page_count, document_b.page_count, chunks_a.len(), chunks_b.len());

    let provenance_id = Uuid::new_v4();
    let tracker = ProvenanceTracker::new(pool);
    let provenance = ProvenanceRecord {
        id: provenance_id,
        record_type: ProvenanceType::Comparison,
        created_at: Utc::now(),
        processed_at: Some(Utc::now()),
        source_type: SourceType::Comparison,
        source_id: Some(document_a.provenance_id),
        root_document_id: document_a.id,
        parent_id: None,
        parent_ids: vec![],
        chain_depth: 0,
        chain_path: vec!["COMPARISON".to_string()],
        content_hash: crate::hash::hash_str(&format!("{}:{}", document_a.id, document_b.id)),
        input_hash: crate::hash::hash_str(&format!("{}:{}", document_a.file_hash, document_b.file_hash)),
        file_hash: None,
        processor: "comparison".to_string(),
        processor_version: "1".to_string(),
        processing_params: ProcessingParams(serde_json::json!({
            "document_a_id": document_a.id,
            "document_b_id": document_b.id,
            "document_b_provenance_id": document_b.provenance_id,
        })),
        processing_duration_ms: 0,
        processing_quality_score: None,
        location: None,
    };
    tracker.create(&provenance).await?;

    let comparison = Comparison {
        id: Uuid::new_v4(),
        document_a_id: document_a.id,
        document_b_id: document_b.id,
        text_diff,
        structural_diff,
        summary,
        components_failed,
        provenance_id,
        created_at: Utc::now(),
    };
    comparisons::insert(pool, &comparison).await?;
    Ok(comparison)
}

fn delta_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(b - a),
        _ => None,
    }
}

fn summarize(
    text_diff: &Option<String>,
    page_a: Option<i64>,
    page_b: Option<i64>,
    chunks_a: usize,
    chunks_b: usize,
) -> String {
    let changed_lines = text_diff
        .as_ref()
        .map(|d| d.lines().filter(|l| l.starts_with('+') || l.starts_with('-')).count())
        .unwrap_or(0);
    let page_delta = delta_opt(page_a, page_b).unwrap_or(0);
    let chunk_delta = chunks_b as i64 - chunks_a as i64;
    format!("{changed_lines} line(s) changed, {page_delta:+} page(s), {chunk_delta:+} chunk(s)")
}

/// A unified line diff between two texts, using the longest common
/// subsequence of lines as the alignment. Output lines are prefixed ` `
/// (unchanged), `-` (only in `a`), or `+` (only in `b`), matching a minimal
/// unified-diff body without hunk headers.
fn diff_lines(a: &str, b: &str) -> String {
    let lines_a: Vec<&str> = a.lines().collect();
    let lines_b: Vec<&str> = b.lines().collect();
    let n = lines_a.len();
    let m = lines_b.len();

    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if lines_a[i] == lines_b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < n && j < m {
        if lines_a[i] == lines_b[j] {
            out.push(format!(" {}", lines_a[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(format!("-{}", lines_a[i]));
            i += 1;
        } else {
            out.push(format!("+{}", lines_b[j]));
            j += 1;
        }
    }
    while i < n {
        out.push(format!("-{}", lines_a[i]));
        i += 1;
    }
    while j < m {
        out.push(format!("+{}", lines_b[j]));
        j += 1;
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::model::DocumentStatus;
    use crate::provenance::ProvenanceRecord as PR;
    use crate::storage::documents;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_diff_lines_identical_text_has_no_markers() {
        let diff = diff_lines("a\nb\nc", "a\nb\nc");
        assert!(diff.lines().all(|l| l.starts_with(' ')));
    }

    #[test]
    fn test_diff_lines_detects_insertion() {
        let diff = diff_lines("a\nc", "a\nb\nc");
        assert!(diff.lines().any(|l| l == "+b"));
    }

    #[test]
    fn test_diff_lines_detects_deletion() {
        let diff = diff_lines("a\nb\nc", "a\nc");
        assert!(diff.lines().any(|l| l == "-b"));
    }

    async fn seed_document(pool: &SqlitePool, hash: &str, page_count: i64) -> Document {
        let prov_id = Uuid::new_v4();
        let tracker = ProvenanceTracker::new(pool);
        tracker
            .create(&PR {
                id: prov_id,
                record_type: ProvenanceType::Document,
                created_at: Utc::now(),
                processed_at: None,
                source_type: SourceType::File,
                source_id: None,
                root_document_id: prov_id,
                parent_id: None,
                parent_ids: vec![],
                chain_depth: 0,
                chain_path: vec!["DOCUMENT".into()],
                content_hash: format!("sha256:{hash}"),
                input_hash: format!("sha256:{hash}"),
                file_hash: Some(format!("sha256:{hash}")),
                processor: "ingest".into(),
                processor_version: "1".into(),
                processing_params: ProcessingParams(serde_json::json!({})),
                processing_duration_ms: 0,
                processing_quality_score: None,
                location: None,
            })
            .await
            .unwrap();

        let mut doc = Document::new(
            format!("/tmp/{hash}.pdf"),
            format!("{hash}.pdf"),
            format!("sha256:{hash}"),
            10,
            "pdf".into(),
            prov_id,
        );
        doc.id = prov_id;
        doc.status = DocumentStatus::Complete;
        doc.page_count = Some(page_count);
        documents::insert(pool, &doc).await.unwrap();
        doc
    }

    #[tokio::test]
    async fn test_compare_without_ocr_results_flags_text_diff_as_failed() {
        let pool = test_pool().await;
        let a = seed_document(&pool, "a", 3).await;
        let b = seed_document(&pool, "b", 4).await;

        let comparison = compare(&pool, &a, &b).await.unwrap();
        assert!(comparison.components_failed.contains(&"text_diff".to_string()));
        assert!(comparison.text_diff.is_none());
        assert!(comparison.structural_diff.is_some());
    }
}
