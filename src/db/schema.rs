//! Declarative schema: tables, indexes, FTS virtual tables and their sync
//! triggers, and the vector index table.

use sqlx::sqlite::SqlitePool;

/// Schema version this binary targets. Bump alongside a new entry in
/// `migrations::MIGRATIONS`.
pub const TARGET_SCHEMA_VERSION: i64 = 1;

/// Tables the engine requires to be present on open. Used by
/// `status::get_status` drift checks.
pub const REQUIRED_TABLES: &[&str] = &[
    "schema_version",
    "database_metadata",
    "provenance",
    "documents",
    "ocr_results",
    "chunks",
    "embeddings",
    "vec_embeddings",
    "images",
    "clusters",
    "document_clusters",
    "workflow_states",
    "entity_tags",
    "extractions",
    "comparisons",
];

/// FTS sync triggers that must all exist; their absence is `index_stale`.
pub const REQUIRED_FTS_TRIGGERS: &[&str] = &[
    "chunks_fts_insert",
    "chunks_fts_update",
    "chunks_fts_delete",
    "images_fts_insert",
    "images_fts_update",
    "images_fts_delete",
];

/// Create every required object. Idempotent: every statement is
/// `IF NOT EXISTS`, so this is safe to call on every open in addition to
/// being the body of migration 1.
pub async fn create_all(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in DDL_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

pub(crate) const DDL_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS schema_version (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        version INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS database_metadata (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        name TEXT,
        description TEXT,
        document_count INTEGER NOT NULL DEFAULT 0,
        chunk_count INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS provenance (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        created_at TEXT NOT NULL,
        processed_at TEXT,
        source_type TEXT NOT NULL,
        source_id TEXT,
        root_document_id TEXT NOT NULL,
        parent_id TEXT,
        parent_ids TEXT NOT NULL,
        chain_depth INTEGER NOT NULL,
        chain_path TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        input_hash TEXT NOT NULL,
        file_hash TEXT,
        processor TEXT NOT NULL,
        processor_version TEXT NOT NULL,
        processing_params TEXT NOT NULL,
        processing_duration_ms INTEGER NOT NULL,
        processing_quality_score REAL,
        location TEXT,
        FOREIGN KEY (parent_id) REFERENCES provenance(id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_provenance_root ON provenance(root_document_id)",
    "CREATE INDEX IF NOT EXISTS idx_provenance_parent ON provenance(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_provenance_type ON provenance(type)",
    "CREATE INDEX IF NOT EXISTS idx_provenance_created_at ON provenance(created_at)",
    r#"CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        file_path TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_hash TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        file_type TEXT NOT NULL,
        status TEXT NOT NULL,
        page_count INTEGER,
        provenance_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        modified_at TEXT NOT NULL,
        ocr_completed_at TEXT,
        error_message TEXT,
        doc_title TEXT,
        doc_author TEXT,
        doc_subject TEXT,
        datalab_file_id TEXT,
        reviewer TEXT,
        FOREIGN KEY (provenance_id) REFERENCES provenance(id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_documents_file_hash ON documents(file_hash)",
    "CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)",
    r#"CREATE TABLE IF NOT EXISTS ocr_results (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        extracted_text TEXT NOT NULL,
        text_length INTEGER NOT NULL,
        datalab_request_id TEXT,
        datalab_mode TEXT NOT NULL,
        parse_quality_score REAL,
        page_count INTEGER NOT NULL,
        cost_cents INTEGER,
        content_hash TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT,
        json_blocks TEXT,
        provenance_id TEXT NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id),
        FOREIGN KEY (provenance_id) REFERENCES provenance(id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_ocr_results_document ON ocr_results(document_id)",
    r#"CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        ocr_result_id TEXT NOT NULL,
        text TEXT NOT NULL,
        text_hash TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        character_start INTEGER NOT NULL,
        character_end INTEGER NOT NULL,
        page_number INTEGER,
        page_range TEXT,
        overlap_previous INTEGER NOT NULL,
        overlap_next INTEGER NOT NULL,
        provenance_id TEXT NOT NULL,
        embedding_status TEXT NOT NULL,
        embedded_at TEXT,
        heading_context TEXT NOT NULL DEFAULT '',
        heading_level INTEGER NOT NULL DEFAULT 0,
        section_path TEXT NOT NULL DEFAULT '',
        content_types TEXT NOT NULL DEFAULT '[]',
        is_atomic INTEGER NOT NULL DEFAULT 0,
        chunking_strategy TEXT NOT NULL,
        ocr_quality_score REAL,
        table_metadata TEXT,
        FOREIGN KEY (document_id) REFERENCES documents(id),
        FOREIGN KEY (ocr_result_id) REFERENCES ocr_results(id),
        FOREIGN KEY (provenance_id) REFERENCES provenance(id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_chunks_document_index ON chunks(document_id, chunk_index)",
    r#"CREATE TABLE IF NOT EXISTS embeddings (
        id TEXT PRIMARY KEY,
        chunk_id TEXT,
        image_id TEXT,
        extraction_id TEXT,
        document_id TEXT NOT NULL,
        original_text TEXT NOT NULL,
        model_name TEXT NOT NULL,
        model_version TEXT NOT NULL,
        task_type TEXT NOT NULL,
        inference_mode TEXT NOT NULL,
        gpu_device TEXT,
        provenance_id TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (chunk_id) REFERENCES chunks(id),
        FOREIGN KEY (document_id) REFERENCES documents(id),
        FOREIGN KEY (provenance_id) REFERENCES provenance(id),
        CHECK (
            (chunk_id IS NOT NULL) + (image_id IS NOT NULL) + (extraction_id IS NOT NULL) = 1
        )
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_embeddings_chunk ON embeddings(chunk_id)",
    "CREATE INDEX IF NOT EXISTS idx_embeddings_image ON embeddings(image_id)",
    "CREATE INDEX IF NOT EXISTS idx_embeddings_document ON embeddings(document_id)",
    r#"CREATE TABLE IF NOT EXISTS vec_embeddings (
        embedding_id TEXT PRIMARY KEY,
        vector BLOB NOT NULL,
        FOREIGN KEY (embedding_id) REFERENCES embeddings(id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS images (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        ocr_result_id TEXT NOT NULL,
        page_number INTEGER NOT NULL,
        bbox_x REAL NOT NULL,
        bbox_y REAL NOT NULL,
        bbox_width REAL NOT NULL,
        bbox_height REAL NOT NULL,
        image_index INTEGER NOT NULL,
        format TEXT NOT NULL,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        extracted_path TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        vlm_status TEXT NOT NULL,
        vlm_description TEXT,
        vlm_structured_data TEXT,
        vlm_embedding_id TEXT,
        vlm_model TEXT,
        vlm_confidence REAL,
        vlm_processed_at TEXT,
        vlm_tokens_used INTEGER,
        context_text TEXT,
        provenance_id TEXT NOT NULL,
        block_type TEXT NOT NULL,
        is_header_footer INTEGER NOT NULL DEFAULT 0,
        content_hash TEXT NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id),
        FOREIGN KEY (ocr_result_id) REFERENCES ocr_results(id),
        FOREIGN KEY (provenance_id) REFERENCES provenance(id),
        FOREIGN KEY (vlm_embedding_id) REFERENCES embeddings(id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_images_provenance ON images(provenance_id)",
    "CREATE INDEX IF NOT EXISTS idx_images_document ON images(document_id)",
    r#"CREATE TABLE IF NOT EXISTS clusters (
        id TEXT PRIMARY KEY,
        run_id TEXT NOT NULL,
        cluster_index INTEGER NOT NULL,
        centroid_json TEXT NOT NULL,
        coherence_score REAL NOT NULL,
        algorithm TEXT NOT NULL,
        algorithm_params_json TEXT NOT NULL,
        silhouette_score REAL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_clusters_run ON clusters(run_id)",
    r#"CREATE TABLE IF NOT EXISTS document_clusters (
        document_id TEXT NOT NULL,
        cluster_id TEXT,
        similarity_to_centroid REAL NOT NULL,
        membership_probability REAL NOT NULL,
        is_noise INTEGER NOT NULL,
        PRIMARY KEY (document_id, cluster_id),
        FOREIGN KEY (document_id) REFERENCES documents(id),
        FOREIGN KEY (cluster_id) REFERENCES clusters(id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS workflow_states (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        state TEXT NOT NULL,
        created_at TEXT NOT NULL,
        actor TEXT,
        note TEXT,
        FOREIGN KEY (document_id) REFERENCES documents(id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_workflow_states_document ON workflow_states(document_id)",
    r#"CREATE TABLE IF NOT EXISTS entity_tags (
        entity_id TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        tag TEXT NOT NULL,
        PRIMARY KEY (entity_id, entity_type, tag)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS extractions (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        extraction_type TEXT NOT NULL,
        content TEXT NOT NULL,
        provenance_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id),
        FOREIGN KEY (provenance_id) REFERENCES provenance(id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS comparisons (
        id TEXT PRIMARY KEY,
        document_a_id TEXT NOT NULL,
        document_b_id TEXT NOT NULL,
        text_diff TEXT,
        structural_diff TEXT,
        summary TEXT NOT NULL,
        components_failed TEXT NOT NULL DEFAULT '[]',
        provenance_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (document_a_id) REFERENCES documents(id),
        FOREIGN KEY (document_b_id) REFERENCES documents(id),
        FOREIGN KEY (provenance_id) REFERENCES provenance(id)
    )"#,
    r#"CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
        id UNINDEXED, text, content='chunks', content_rowid='rowid'
    )"#,
    r#"CREATE TRIGGER IF NOT EXISTS chunks_fts_insert AFTER INSERT ON chunks BEGIN
        INSERT INTO chunks_fts(rowid, id, text) VALUES (new.rowid, new.id, new.text);
    END"#,
    r#"CREATE TRIGGER IF NOT EXISTS chunks_fts_update AFTER UPDATE ON chunks BEGIN
        INSERT INTO chunks_fts(chunks_fts, rowid, id, text) VALUES('delete', old.rowid, old.id, old.text);
        INSERT INTO chunks_fts(rowid, id, text) VALUES (new.rowid, new.id, new.text);
    END"#,
    r#"CREATE TRIGGER IF NOT EXISTS chunks_fts_delete AFTER DELETE ON chunks BEGIN
        INSERT INTO chunks_fts(chunks_fts, rowid, id, text) VALUES('delete', old.rowid, old.id, old.text);
    END"#,
    r#"CREATE VIRTUAL TABLE IF NOT EXISTS images_fts USING fts5(
        id UNINDEXED, vlm_description, content='images', content_rowid='rowid'
    )"#,
    r#"CREATE TRIGGER IF NOT EXISTS images_fts_insert AFTER INSERT ON images BEGIN
        INSERT INTO images_fts(rowid, id, vlm_description) VALUES (new.rowid, new.id, new.vlm_description);
    END"#,
    r#"CREATE TRIGGER IF NOT EXISTS images_fts_update AFTER UPDATE ON images BEGIN
        INSERT INTO images_fts(images_fts, rowid, id, vlm_description) VALUES('delete', old.rowid, old.id, old.vlm_description);
        INSERT INTO images_fts(rowid, id, vlm_description) VALUES (new.rowid, new.id, new.vlm_description);
    END"#,
    r#"CREATE TRIGGER IF NOT EXISTS images_fts_delete AFTER DELETE ON images BEGIN
        INSERT INTO images_fts(images_fts, rowid, id, vlm_description) VALUES('delete', old.rowid, old.id, old.vlm_description);
    END"#,
];
