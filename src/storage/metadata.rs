//! Metadata store: the row of record for documents, chunks, section
//! summaries, version diffs, and document groups, backed by `sqlx` against
//! SQLite (async, `runtime-tokio-rustls`).

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::core::document::{Document, ProcessingStatus, VersionStatus, Visibility};
use crate::core::{Chunk, ChunkType, VersionDiff};
use crate::error::{Error, Result, StoreError};

/// Embedded schema, applied idempotently on [`SqliteMetadataStore::connect`].
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS document_groups (
    group_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    doc_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    original_filename TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    page_count INTEGER NOT NULL DEFAULT 0,
    doc_type TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    group_id TEXT,
    owner_id TEXT,
    department TEXT,
    visibility TEXT NOT NULL DEFAULT 'public',
    processing_status TEXT NOT NULL DEFAULT 'pending',
    doc_summary TEXT,
    key_entities TEXT NOT NULL DEFAULT '{}',
    version_number TEXT NOT NULL DEFAULT 'v1.0',
    version_status TEXT NOT NULL DEFAULT 'active',
    parent_version_id TEXT,
    is_latest INTEGER NOT NULL DEFAULT 1,
    effective_date TEXT,
    superseded_at TEXT,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_hash_nonerror
    ON documents(content_hash) WHERE processing_status != 'error';
CREATE INDEX IF NOT EXISTS idx_documents_parent ON documents(parent_version_id);
CREATE INDEX IF NOT EXISTS idx_documents_latest ON documents(is_latest);

CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    doc_id TEXT NOT NULL,
    doc_title TEXT NOT NULL,
    section_path TEXT NOT NULL,
    page_numbers TEXT NOT NULL DEFAULT '[]',
    chunk_index INTEGER NOT NULL,
    chunk_type TEXT NOT NULL,
    content TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    group_id TEXT,
    department TEXT,
    is_latest INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    FOREIGN KEY (doc_id) REFERENCES documents(doc_id)
);

CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);

CREATE TABLE IF NOT EXISTS section_summaries (
    doc_id TEXT NOT NULL,
    section_path TEXT NOT NULL,
    summary_text TEXT NOT NULL,
    key_points TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    PRIMARY KEY (doc_id, section_path)
);

CREATE TABLE IF NOT EXISTS version_diffs (
    old_version_id TEXT NOT NULL,
    new_version_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (old_version_id, new_version_id)
);
";

/// One section's LLM-generated summary, produced by the summarizer stage
/// and consumed by the diff engine and the agent's document-structure tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    /// Owning document.
    pub doc_id: Uuid,
    /// Section path this summary covers.
    pub section_path: String,
    /// One-paragraph summary.
    pub summary_text: String,
    /// Short bullet-style key points.
    pub key_points: Vec<String>,
}

/// Metadata store surface every other component depends on.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Looks up a non-errored document by content hash (dedup check).
    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Document>>;

    /// Inserts a new document row.
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    /// Fetches a document by id.
    async fn get_document(&self, doc_id: Uuid) -> Result<Option<Document>>;

    /// Replaces a document row in full (status transitions, version
    /// linking, summary/entity writes all go through this).
    async fn update_document(&self, doc: &Document) -> Result<()>;

    /// Title-trigram-similarity candidate search for version detection
    /// (spec §4.5 step 1): ready, latest documents above `threshold`,
    /// ordered by similarity descending.
    async fn find_title_similar(&self, title: &str, threshold: f32, limit: usize) -> Result<Vec<Document>>;

    /// Lists documents matching optional filters (agent's `list_documents` tool).
    async fn list_documents(
        &self,
        doc_type: Option<&str>,
        group_id: Option<Uuid>,
        tag: Option<&str>,
        status: Option<ProcessingStatus>,
        limit: usize,
    ) -> Result<Vec<Document>>;

    /// Inserts or replaces a section summary.
    async fn upsert_section_summary(&self, summary: &SectionSummary) -> Result<()>;

    /// Fetches one section's summary.
    async fn get_section_summary(&self, doc_id: Uuid, section_path: &str) -> Result<Option<SectionSummary>>;

    /// Bulk-inserts chunk rows for a document.
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Fetches every chunk of a document ordered by sequence index.
    async fn get_chunks(&self, doc_id: Uuid) -> Result<Vec<Chunk>>;

    /// Returns just the chunk identifiers for a document (delete fast path).
    async fn get_chunk_ids(&self, doc_id: Uuid) -> Result<Vec<Uuid>>;

    /// Flips `is_latest` on every chunk row belonging to `doc_id`.
    async fn set_chunks_latest(&self, doc_id: Uuid, is_latest: bool) -> Result<()>;

    /// Deletes a document row, its chunk rows, and its section summaries.
    async fn delete_document(&self, doc_id: Uuid) -> Result<()>;

    /// Fetches a cached version diff, if present.
    async fn get_version_diff(&self, old_version_id: Uuid, new_version_id: Uuid) -> Result<Option<VersionDiff>>;

    /// Caches a computed version diff (idempotent — overwrites).
    async fn put_version_diff(&self, diff: &VersionDiff) -> Result<()>;
}

/// `sqlx`-backed production implementation.
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Connects to `database_url`, creating the database file if absent,
    /// and applies [`SCHEMA_SQL`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Metadata`] if the connection or schema
    /// application fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        use std::str::FromStr;

        use sqlx::sqlite::SqliteConnectOptions;

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        Ok(Self { pool })
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
        let tags: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("tags").map_err(sqlx_err)?).unwrap_or_default();
        let key_entities = serde_json::from_str(&row.try_get::<String, _>("key_entities").map_err(sqlx_err)?).unwrap_or_default();

        Ok(Document {
            doc_id: parse_uuid(row.try_get("doc_id").map_err(sqlx_err)?)?,
            title: row.try_get("title").map_err(sqlx_err)?,
            original_filename: row.try_get("original_filename").map_err(sqlx_err)?,
            content_hash: row.try_get("content_hash").map_err(sqlx_err)?,
            size_bytes: u64::try_from(row.try_get::<i64, _>("size_bytes").map_err(sqlx_err)?).unwrap_or(0),
            page_count: u32::try_from(row.try_get::<i64, _>("page_count").map_err(sqlx_err)?).unwrap_or(0),
            doc_type: row.try_get("doc_type").map_err(sqlx_err)?,
            tags,
            group_id: parse_opt_uuid(row.try_get("group_id").map_err(sqlx_err)?),
            owner_id: row.try_get("owner_id").map_err(sqlx_err)?,
            department: row.try_get("department").map_err(sqlx_err)?,
            visibility: parse_visibility(&row.try_get::<String, _>("visibility").map_err(sqlx_err)?),
            processing_status: parse_status(&row.try_get::<String, _>("processing_status").map_err(sqlx_err)?),
            doc_summary: row.try_get("doc_summary").map_err(sqlx_err)?,
            key_entities,
            version_number: row.try_get("version_number").map_err(sqlx_err)?,
            version_status: parse_version_status(&row.try_get::<String, _>("version_status").map_err(sqlx_err)?),
            parent_version_id: parse_opt_uuid(row.try_get("parent_version_id").map_err(sqlx_err)?),
            is_latest: row.try_get::<i64, _>("is_latest").map_err(sqlx_err)? != 0,
            effective_date: parse_opt_datetime(row.try_get("effective_date").map_err(sqlx_err)?),
            created_at: parse_datetime(row.try_get("created_at").map_err(sqlx_err)?),
            superseded_at: parse_opt_datetime(row.try_get("superseded_at").map_err(sqlx_err)?),
        })
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk> {
        let page_numbers: Vec<u32> = serde_json::from_str(&row.try_get::<String, _>("page_numbers").map_err(sqlx_err)?).unwrap_or_default();
        Ok(Chunk {
            chunk_id: parse_uuid(row.try_get("chunk_id").map_err(sqlx_err)?)?,
            doc_id: parse_uuid(row.try_get("doc_id").map_err(sqlx_err)?)?,
            doc_title: row.try_get("doc_title").map_err(sqlx_err)?,
            section_path: row.try_get("section_path").map_err(sqlx_err)?,
            page_numbers,
            chunk_index: usize::try_from(row.try_get::<i64, _>("chunk_index").map_err(sqlx_err)?).unwrap_or(0),
            chunk_type: parse_chunk_type(&row.try_get::<String, _>("chunk_type").map_err(sqlx_err)?),
            content: row.try_get("content").map_err(sqlx_err)?,
            token_count: usize::try_from(row.try_get::<i64, _>("token_count").map_err(sqlx_err)?).unwrap_or(0),
            group_id: parse_opt_uuid(row.try_get("group_id").map_err(sqlx_err)?),
            department: row.try_get("department").map_err(sqlx_err)?,
            is_latest: row.try_get::<i64, _>("is_latest").map_err(sqlx_err)? != 0,
            created_at: parse_datetime(row.try_get("created_at").map_err(sqlx_err)?),
        })
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE content_hash = ? AND processing_status != 'error'")
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (doc_id, title, original_filename, content_hash, size_bytes, page_count, doc_type, tags, group_id, owner_id, department, visibility, processing_status, doc_summary, key_entities, version_number, version_status, parent_version_id, is_latest, effective_date, superseded_at, created_at) \
             VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(doc.doc_id.to_string())
        .bind(&doc.title)
        .bind(&doc.original_filename)
        .bind(&doc.content_hash)
        .bind(i64::try_from(doc.size_bytes).unwrap_or(i64::MAX))
        .bind(i64::from(doc.page_count))
        .bind(&doc.doc_type)
        .bind(serde_json::to_string(&doc.tags).unwrap_or_default())
        .bind(doc.group_id.map(|g| g.to_string()))
        .bind(&doc.owner_id)
        .bind(&doc.department)
        .bind(visibility_to_str(doc.visibility))
        .bind(doc.processing_status.to_string())
        .bind(&doc.doc_summary)
        .bind(serde_json::to_string(&doc.key_entities).unwrap_or_default())
        .bind(&doc.version_number)
        .bind(doc.version_status.to_string())
        .bind(doc.parent_version_id.map(|p| p.to_string()))
        .bind(i64::from(doc.is_latest))
        .bind(doc.effective_date.map(|d| d.to_rfc3339()))
        .bind(doc.superseded_at.map(|d| d.to_rfc3339()))
        .bind(doc.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }

    async fn get_document(&self, doc_id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE doc_id = ?")
            .bind(doc_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn update_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET title=?, original_filename=?, content_hash=?, size_bytes=?, page_count=?, doc_type=?, tags=?, group_id=?, owner_id=?, department=?, visibility=?, processing_status=?, doc_summary=?, key_entities=?, version_number=?, version_status=?, parent_version_id=?, is_latest=?, effective_date=?, superseded_at=? WHERE doc_id=?",
        )
        .bind(&doc.title)
        .bind(&doc.original_filename)
        .bind(&doc.content_hash)
        .bind(i64::try_from(doc.size_bytes).unwrap_or(i64::MAX))
        .bind(i64::from(doc.page_count))
        .bind(&doc.doc_type)
        .bind(serde_json::to_string(&doc.tags).unwrap_or_default())
        .bind(doc.group_id.map(|g| g.to_string()))
        .bind(&doc.owner_id)
        .bind(&doc.department)
        .bind(visibility_to_str(doc.visibility))
        .bind(doc.processing_status.to_string())
        .bind(&doc.doc_summary)
        .bind(serde_json::to_string(&doc.key_entities).unwrap_or_default())
        .bind(&doc.version_number)
        .bind(doc.version_status.to_string())
        .bind(doc.parent_version_id.map(|p| p.to_string()))
        .bind(i64::from(doc.is_latest))
        .bind(doc.effective_date.map(|d| d.to_rfc3339()))
        .bind(doc.superseded_at.map(|d| d.to_rfc3339()))
        .bind(doc.doc_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }

    async fn find_title_similar(&self, title: &str, threshold: f32, limit: usize) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents WHERE processing_status = 'ready' AND is_latest = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;

        let mut scored: Vec<(f32, Document)> = Vec::new();
        for row in &rows {
            let doc = Self::row_to_document(row)?;
            let sim = strsim::jaro_winkler(title, &doc.title) as f32;
            if sim > threshold {
                scored.push((sim, doc));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, d)| d).collect())
    }

    async fn list_documents(
        &self,
        doc_type: Option<&str>,
        group_id: Option<Uuid>,
        tag: Option<&str>,
        status: Option<ProcessingStatus>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;
        let mut out = Vec::new();
        for row in &rows {
            let doc = Self::row_to_document(row)?;
            if let Some(t) = doc_type {
                if doc.doc_type.as_deref() != Some(t) {
                    continue;
                }
            }
            if let Some(g) = group_id {
                if doc.group_id != Some(g) {
                    continue;
                }
            }
            if let Some(tag) = tag {
                if !doc.tags.iter().any(|existing| existing == tag) {
                    continue;
                }
            }
            if let Some(s) = status {
                if doc.processing_status != s {
                    continue;
                }
            }
            out.push(doc);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn upsert_section_summary(&self, summary: &SectionSummary) -> Result<()> {
        sqlx::query(
            "INSERT INTO section_summaries (doc_id, section_path, summary_text, key_points, created_at) VALUES (?,?,?,?,?) \
             ON CONFLICT(doc_id, section_path) DO UPDATE SET summary_text=excluded.summary_text, key_points=excluded.key_points",
        )
        .bind(summary.doc_id.to_string())
        .bind(&summary.section_path)
        .bind(&summary.summary_text)
        .bind(serde_json::to_string(&summary.key_points).unwrap_or_default())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }

    async fn get_section_summary(&self, doc_id: Uuid, section_path: &str) -> Result<Option<SectionSummary>> {
        let row = sqlx::query("SELECT * FROM section_summaries WHERE doc_id = ? AND section_path = ?")
            .bind(doc_id.to_string())
            .bind(section_path)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        row.map(|r| {
            Ok(SectionSummary {
                doc_id,
                section_path: r.try_get("section_path").map_err(sqlx_err)?,
                summary_text: r.try_get("summary_text").map_err(sqlx_err)?,
                key_points: serde_json::from_str(&r.try_get::<String, _>("key_points").map_err(sqlx_err)?).unwrap_or_default(),
            })
        })
        .transpose()
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (chunk_id, doc_id, doc_title, section_path, page_numbers, chunk_index, chunk_type, content, token_count, group_id, department, is_latest, created_at) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?)",
            )
            .bind(chunk.chunk_id.to_string())
            .bind(chunk.doc_id.to_string())
            .bind(&chunk.doc_title)
            .bind(&chunk.section_path)
            .bind(serde_json::to_string(&chunk.page_numbers).unwrap_or_default())
            .bind(i64::try_from(chunk.chunk_index).unwrap_or(0))
            .bind(chunk.chunk_type.as_str())
            .bind(&chunk.content)
            .bind(i64::try_from(chunk.token_count).unwrap_or(0))
            .bind(chunk.group_id.map(|g| g.to_string()))
            .bind(&chunk.department)
            .bind(i64::from(chunk.is_latest))
            .bind(chunk.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        }
        Ok(())
    }

    async fn get_chunks(&self, doc_id: Uuid) -> Result<Vec<Chunk>> {
        let rows = sqlx::query("SELECT * FROM chunks WHERE doc_id = ? ORDER BY chunk_index ASC")
            .bind(doc_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;
        rows.iter().map(Self::row_to_chunk).collect()
    }

    async fn get_chunk_ids(&self, doc_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT chunk_id FROM chunks WHERE doc_id = ?")
            .bind(doc_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;
        rows.iter()
            .map(|r| parse_uuid(r.try_get("chunk_id").map_err(sqlx_err)?))
            .collect()
    }

    async fn set_chunks_latest(&self, doc_id: Uuid, is_latest: bool) -> Result<()> {
        sqlx::query("UPDATE chunks SET is_latest = ? WHERE doc_id = ?")
            .bind(i64::from(is_latest))
            .bind(doc_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn delete_document(&self, doc_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM chunks WHERE doc_id = ?").bind(doc_id.to_string()).execute(&self.pool).await.map_err(sqlx_err)?;
        sqlx::query("DELETE FROM section_summaries WHERE doc_id = ?").bind(doc_id.to_string()).execute(&self.pool).await.map_err(sqlx_err)?;
        sqlx::query("DELETE FROM documents WHERE doc_id = ?").bind(doc_id.to_string()).execute(&self.pool).await.map_err(sqlx_err)?;
        Ok(())
    }

    async fn get_version_diff(&self, old_version_id: Uuid, new_version_id: Uuid) -> Result<Option<VersionDiff>> {
        let row = sqlx::query("SELECT payload FROM version_diffs WHERE old_version_id = ? AND new_version_id = ?")
            .bind(old_version_id.to_string())
            .bind(new_version_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        row.map(|r| {
            let payload: String = r.try_get("payload").map_err(sqlx_err)?;
            serde_json::from_str(&payload).map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))
        })
        .transpose()
    }

    async fn put_version_diff(&self, diff: &VersionDiff) -> Result<()> {
        let payload = serde_json::to_string(diff).map_err(|e| Error::Store(StoreError::Metadata(e.to_string())))?;
        sqlx::query(
            "INSERT INTO version_diffs (old_version_id, new_version_id, payload, created_at) VALUES (?,?,?,?) \
             ON CONFLICT(old_version_id, new_version_id) DO UPDATE SET payload=excluded.payload",
        )
        .bind(diff.old_version_id.to_string())
        .bind(diff.new_version_id.to_string())
        .bind(payload)
        .bind(diff.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }
}

fn sqlx_err(e: sqlx::Error) -> Error {
    Error::Store(StoreError::Metadata(e.to_string()))
}

fn parse_uuid(s: String) -> Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| Error::Store(StoreError::Metadata(format!("invalid uuid {s}: {e}"))))
}

fn parse_opt_uuid(s: Option<String>) -> Option<Uuid> {
    s.and_then(|s| Uuid::parse_str(&s).ok())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn parse_opt_datetime(s: Option<String>) -> Option<chrono::DateTime<Utc>> {
    s.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc))
}

fn parse_status(s: &str) -> ProcessingStatus {
    match s {
        "parsing" => ProcessingStatus::Parsing,
        "chunking" => ProcessingStatus::Chunking,
        "summarizing" => ProcessingStatus::Summarizing,
        "embedding" => ProcessingStatus::Embedding,
        "ready" => ProcessingStatus::Ready,
        "error" => ProcessingStatus::Error,
        _ => ProcessingStatus::Pending,
    }
}

fn parse_version_status(s: &str) -> VersionStatus {
    match s {
        "draft" => VersionStatus::Draft,
        "superseded" => VersionStatus::Superseded,
        "archived" => VersionStatus::Archived,
        _ => VersionStatus::Active,
    }
}

fn parse_visibility(s: &str) -> Visibility {
    match s {
        "department" => Visibility::Department,
        "private" => Visibility::Private,
        _ => Visibility::Public,
    }
}

const fn visibility_to_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Public => "public",
        Visibility::Department => "department",
        Visibility::Private => "private",
    }
}

fn parse_chunk_type(s: &str) -> ChunkType {
    match s {
        "table" => ChunkType::Table,
        "image_description" => ChunkType::ImageDescription,
        "section_summary" => ChunkType::SectionSummary,
        "doc_summary" => ChunkType::DocSummary,
        _ => ChunkType::Text,
    }
}
