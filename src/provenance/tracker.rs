//! Provenance tracker: insert, lookup, and paged query over the provenance
//! spine.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{EngineError, IntegrityError, Result};
use crate::json_value::{self, Location, ProcessingParams};

use super::{ProvenanceRecord, ProvenanceType, SourceType};

/// Filters for `query()`, a paged lookup over the provenance spine.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceFilters {
    pub record_type: Option<ProvenanceType>,
    pub processor: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

impl ProvenanceFilters {
    /// Clamp limit/offset: every user-paginated endpoint must accept and
    /// clamp limit/offset rather than trust caller input directly.
    fn clamped_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    fn clamped_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

pub struct ProvenanceTracker<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProvenanceTracker<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new provenance row after validating shape and parent
    /// existence.
    pub async fn create(&self, record: &ProvenanceRecord) -> Result<()> {
        if !record.self_consistent() {
            return Err(EngineError::Integrity(IntegrityError::MalformedChain {
                id: record.id.to_string(),
                reason: "chain_depth/parent_ids/chain_path/root invariants violated".to_string(),
            }));
        }

        if let Some(parent_id) = record.parent_id {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM provenance WHERE id = ?1")
                .bind(parent_id.to_string())
                .fetch_optional(self.pool)
                .await?;
            if exists.is_none() {
                return Err(EngineError::Integrity(IntegrityError::ReferentialIntegrityViolation(
                    format!("parent provenance {parent_id} does not exist"),
                )));
            }
        }

        let parent_ids_json: Vec<String> = record.parent_ids.iter().map(|id| id.to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO provenance (
                id, type, created_at, processed_at, source_type, source_id,
                root_document_id, parent_id, parent_ids, chain_depth, chain_path,
                content_hash, input_hash, file_hash, processor, processor_version,
                processing_params, processing_duration_ms, processing_quality_score, location
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.record_type.as_str())
        .bind(record.created_at.to_rfc3339())
        .bind(record.processed_at.map(|t| t.to_rfc3339()))
        .bind(record.source_type.as_str())
        .bind(record.source_id.map(|id| id.to_string()))
        .bind(record.root_document_id.to_string())
        .bind(record.parent_id.map(|id| id.to_string()))
        .bind(serde_json::to_string(&parent_ids_json)?)
        .bind(record.chain_depth)
        .bind(serde_json::to_string(&record.chain_path)?)
        .bind(&record.content_hash)
        .bind(&record.input_hash)
        .bind(&record.file_hash)
        .bind(&record.processor)
        .bind(&record.processor_version)
        .bind(json_value::encode_canonical(&record.processing_params))
        .bind(record.processing_duration_ms)
        .bind(record.processing_quality_score)
        .bind(record.location.as_ref().map(json_value::encode_canonical))
        .execute(self.pool)
        .await?;

        debug!(id = %record.id, kind = record.record_type.as_str(), "provenance row created");
        Ok(())
    }

    /// Ancestors from root to `id`, inclusive, in topological order.
    pub async fn chain(&self, id: Uuid) -> Result<Vec<ProvenanceRecord>> {
        let target = self.fetch_one(id).await?.ok_or_else(|| {
            EngineError::NotFound(format!("provenance record {id} not found"))
        })?;

        let mut chain = Vec::with_capacity(target.parent_ids.len() + 1);
        for ancestor_id in &target.parent_ids {
            let ancestor = self.fetch_one(*ancestor_id).await?.ok_or_else(|| {
                EngineError::Integrity(IntegrityError::ReferentialIntegrityViolation(format!(
                    "ancestor {ancestor_id} missing from chain of {id}"
                )))
            })?;
            chain.push(ancestor);
        }
        chain.push(target);
        Ok(chain)
    }

    /// All records that list `id` among their `parent_ids`.
    pub async fn descendants(&self, id: Uuid) -> Result<Vec<ProvenanceRecord>> {
        let rows = sqlx::query("SELECT * FROM provenance")
            .fetch_all(self.pool)
            .await?;

        let mut out = Vec::new();
        for row in rows {
            match row_to_record(&row) {
                Ok(record) => {
                    if record.parent_ids.contains(&id) {
                        out.push(record);
                    }
                }
                Err(e) => warn!("skipping malformed provenance row while scanning descendants: {e}"),
            }
        }
        Ok(out)
    }

    /// All provenance for one ingested document.
    pub async fn by_root_document(&self, root_id: Uuid) -> Result<Vec<ProvenanceRecord>> {
        let rows = sqlx::query("SELECT * FROM provenance WHERE root_document_id = ?1 ORDER BY chain_depth")
            .bind(root_id.to_string())
            .fetch_all(self.pool)
            .await?;

        let mut out = Vec::new();
        for row in rows {
            match row_to_record(&row) {
                Ok(record) => out.push(record),
                Err(e) => warn!("skipping malformed provenance row for root {root_id}: {e}"),
            }
        }
        Ok(out)
    }

    /// Paged query by type/processor/date range, limit/offset clamped.
    pub async fn query(&self, filters: &ProvenanceFilters) -> Result<Vec<ProvenanceRecord>> {
        let mut sql = String::from("SELECT * FROM provenance WHERE 1=1");
        if filters.record_type.is_some() {
            sql.push_str(" AND type = ?");
        }
        if filters.processor.is_some() {
            sql.push_str(" AND processor = ?");
        }
        if filters.created_after.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if filters.created_before.is_some() {
            sql.push_str(" AND created_at <= ?");
        }
        sql.push_str(" ORDER BY created_at LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(t) = filters.record_type {
            query = query.bind(t.as_str());
        }
        if let Some(p) = &filters.processor {
            query = query.bind(p.clone());
        }
        if let Some(d) = filters.created_after {
            query = query.bind(d.to_rfc3339());
        }
        if let Some(d) = filters.created_before {
            query = query.bind(d.to_rfc3339());
        }
        query = query.bind(filters.clamped_limit()).bind(filters.clamped_offset());

        let rows = query.fetch_all(self.pool).await?;
        let mut out = Vec::new();
        for row in rows {
            match row_to_record(&row) {
                Ok(record) => out.push(record),
                Err(e) => warn!("skipping malformed provenance row in query: {e}"),
            }
        }
        Ok(out)
    }

    async fn fetch_one(&self, id: Uuid) -> Result<Option<ProvenanceRecord>> {
        let row = sqlx::query("SELECT * FROM provenance WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row_to_record(&row).map_err(|e| {
                EngineError::Integrity(IntegrityError::MalformedChain {
                    id: id.to_string(),
                    reason: e,
                })
            })?)),
            None => Ok(None),
        }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<ProvenanceRecord, String> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str).map_err(|e| e.to_string())?;

    let record_type: String = row.get("type");
    let record_type: ProvenanceType = record_type.parse()?;

    let source_type: String = row.get("source_type");
    let source_type: SourceType = source_type.parse()?;

    let source_id: Option<String> = row.get("source_id");
    let source_id = source_id
        .map(|s| Uuid::parse_str(&s).map_err(|e| e.to_string()))
        .transpose()?;

    let root_document_id: String = row.get("root_document_id");
    let root_document_id = Uuid::parse_str(&root_document_id).map_err(|e| e.to_string())?;

    let parent_id: Option<String> = row.get("parent_id");
    let parent_id = parent_id
        .map(|s| Uuid::parse_str(&s).map_err(|e| e.to_string()))
        .transpose()?;

    let parent_ids_raw: String = row.get("parent_ids");
    let parent_ids: Vec<String> =
        json_value::decode_lenient(&parent_ids_raw, &id_str, "parent_ids").map_err(|e| e.to_string())?;
    let parent_ids: Vec<Uuid> = parent_ids
        .into_iter()
        .map(|s| Uuid::parse_str(&s).map_err(|e| e.to_string()))
        .collect::<std::result::Result<_, _>>()?;

    let chain_path_raw: String = row.get("chain_path");
    let chain_path: Vec<String> =
        json_value::decode_lenient(&chain_path_raw, &id_str, "chain_path").map_err(|e| e.to_string())?;

    let processing_params_raw: String = row.get("processing_params");
    let processing_params: ProcessingParams =
        json_value::decode_lenient(&processing_params_raw, &id_str, "processing_params")
            .map_err(|e| e.to_string())?;

    let location_raw: Option<String> = row.get("location");
    let location = location_raw
        .map(|raw| json_value::decode_lenient::<Location>(&raw, &id_str, "location").map_err(|e| e.to_string()))
        .transpose()?;

    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| e.to_string())?
        .with_timezone(&Utc);

    let processed_at: Option<String> = row.get("processed_at");
    let processed_at = processed_at
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| e.to_string())
        })
        .transpose()?;

    Ok(ProvenanceRecord {
        id,
        record_type,
        created_at,
        processed_at,
        source_type,
        source_id,
        root_document_id,
        parent_id,
        parent_ids,
        chain_depth: row.get("chain_depth"),
        chain_path,
        content_hash: row.get("content_hash"),
        input_hash: row.get("input_hash"),
        file_hash: row.get("file_hash"),
        processor: row.get("processor"),
        processor_version: row.get("processor_version"),
        processing_params,
        processing_duration_ms: row.get("processing_duration_ms"),
        processing_quality_score: row.get("processing_quality_score"),
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::schema::create_all(&pool).await.unwrap();
        pool
    }

    fn root_record() -> ProvenanceRecord {
        let id = Uuid::new_v4();
        ProvenanceRecord {
            id,
            record_type: ProvenanceType::Document,
            created_at: Utc::now(),
            processed_at: None,
            source_type: SourceType::File,
            source_id: None,
            root_document_id: id,
            parent_id: None,
            parent_ids: vec![],
            chain_depth: 0,
            chain_path: vec!["DOCUMENT".to_string()],
            content_hash: "sha256:0".into(),
            input_hash: "sha256:0".into(),
            file_hash: Some("sha256:0".into()),
            processor: "ingest".into(),
            processor_version: "1".into(),
            processing_params: ProcessingParams(json!({})),
            processing_duration_ms: 0,
            processing_quality_score: None,
            location: None,
        }
    }

    fn child_record(parent: &ProvenanceRecord) -> ProvenanceRecord {
        ProvenanceRecord {
            id: Uuid::new_v4(),
            record_type: ProvenanceType::OcrResult,
            created_at: Utc::now(),
            processed_at: Some(Utc::now()),
            source_type: SourceType::Ocr,
            source_id: Some(parent.id),
            root_document_id: parent.root_document_id,
            parent_id: Some(parent.id),
            parent_ids: vec![parent.id],
            chain_depth: 1,
            chain_path: vec!["DOCUMENT".to_string(), "OCR_RESULT".to_string()],
            content_hash: "sha256:1".into(),
            input_hash: parent.content_hash.clone(),
            file_hash: parent.file_hash.clone(),
            processor: "ocr".into(),
            processor_version: "1".into(),
            processing_params: ProcessingParams(json!({})),
            processing_duration_ms: 100,
            processing_quality_score: Some(0.9),
            location: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_missing_parent() {
        let pool = test_pool().await;
        let tracker = ProvenanceTracker::new(&pool);
        let orphan = child_record(&root_record());
        let err = tracker.create(&orphan).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Integrity(IntegrityError::ReferentialIntegrityViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_chain_returns_root_to_leaf() {
        let pool = test_pool().await;
        let tracker = ProvenanceTracker::new(&pool);
        let root = root_record();
        tracker.create(&root).await.unwrap();
        let child = child_record(&root);
        tracker.create(&child).await.unwrap();

        let chain = tracker.chain(child.id).await.unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].id, root.id);
        assert_eq!(chain[1].id, child.id);
    }

    #[tokio::test]
    async fn test_descendants_finds_children() {
        let pool = test_pool().await;
        let tracker = ProvenanceTracker::new(&pool);
        let root = root_record();
        tracker.create(&root).await.unwrap();
        let child = child_record(&root);
        tracker.create(&child).await.unwrap();

        let descendants = tracker.descendants(root.id).await.unwrap();
        assert_eq!(descendants.len(), 1);
        assert_eq!(descendants[0].id, child.id);
    }

    #[tokio::test]
    async fn test_query_clamps_limit() {
        let pool = test_pool().await;
        let tracker = ProvenanceTracker::new(&pool);
        tracker.create(&root_record()).await.unwrap();

        let filters = ProvenanceFilters {
            limit: Some(10_000),
            ..Default::default()
        };
        let results = tracker.query(&filters).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
