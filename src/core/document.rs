//! Document, section, and lifecycle types — the data model spine everything
//! else in the crate hangs off of.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing status, monotonic except for the terminal `Error` state which
/// is reachable from any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Registered, nothing processed yet.
    Pending,
    /// Parser collaborator invoked.
    Parsing,
    /// Chunker invoked.
    Chunking,
    /// Summarizer invoked.
    Summarizing,
    /// Embedder and index writer invoked.
    Embedding,
    /// Indexed across all three stores; queryable.
    Ready,
    /// Terminal failure state; carries no payload here, the reason is logged.
    Error,
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Parsing => "parsing",
            Self::Chunking => "chunking",
            Self::Summarizing => "summarizing",
            Self::Embedding => "embedding",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Version lifecycle status for a document within its version chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// Not yet active (unused by the core today, reserved for staged rollout).
    Draft,
    /// The current, queryable-by-default version in its chain.
    Active,
    /// A predecessor that has been superseded by a newer version.
    Superseded,
    /// Retained for audit but excluded from default retrieval.
    Archived,
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Superseded => "superseded",
            Self::Archived => "archived",
        };
        f.write_str(s)
    }
}

/// Visibility scope, consumed by the (out-of-scope) authorization layer; the
/// core only ever reads it as an opaque passthrough field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Readable by any authenticated caller.
    #[default]
    Public,
    /// Readable within the owning department.
    Department,
    /// Readable only by the owner.
    Private,
}

/// A document registered with the platform. See the crate-level data model
/// for the invariants this type must uphold (unique hash, single `is_latest`
/// per version chain, acyclic parent links, monotonic status transitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Opaque identifier.
    pub doc_id: Uuid,
    /// Human-readable title, derived from parsed content or filename.
    pub title: String,
    /// Name of the originally uploaded file.
    pub original_filename: String,
    /// SHA-256 of the original file bytes, hex-encoded.
    pub content_hash: String,
    /// Size of the original file in bytes.
    pub size_bytes: u64,
    /// Page count as reported by the parser (0 for formats without pages).
    pub page_count: u32,
    /// Closed-set document type tag, detected or caller-supplied.
    pub doc_type: Option<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Optional group this document belongs to.
    pub group_id: Option<Uuid>,
    /// Owning principal, opaque to the core.
    pub owner_id: Option<String>,
    /// Owning department, mirrored onto every chunk.
    pub department: Option<String>,
    /// Visibility scope, opaque to the core beyond passthrough.
    pub visibility: Visibility,
    /// Current lifecycle status.
    pub processing_status: ProcessingStatus,
    /// Document-level summary, empty until the summarizer stage completes.
    pub doc_summary: Option<String>,
    /// Key entities extracted by the summarizer, category -> values.
    pub key_entities: std::collections::HashMap<String, Vec<String>>,
    /// Version string of the form `v<major>.<minor>`.
    pub version_number: String,
    /// Version lifecycle status.
    pub version_status: VersionStatus,
    /// Predecessor in the version chain, if any.
    pub parent_version_id: Option<Uuid>,
    /// Whether this is the queryable-by-default version in its chain.
    pub is_latest: bool,
    /// Caller-supplied or detected effective date.
    pub effective_date: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp this document was superseded, if applicable.
    pub superseded_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Construct a freshly registered document in `Pending` status with
    /// version `v1.0`, `is_latest = true`.
    #[must_use]
    pub fn new(title: impl Into<String>, original_filename: impl Into<String>, content_hash: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            doc_id: Uuid::new_v4(),
            title: title.into(),
            original_filename: original_filename.into(),
            content_hash: content_hash.into(),
            size_bytes,
            page_count: 0,
            doc_type: None,
            tags: Vec::new(),
            group_id: None,
            owner_id: None,
            department: None,
            visibility: Visibility::Public,
            processing_status: ProcessingStatus::Pending,
            doc_summary: None,
            key_entities: std::collections::HashMap::new(),
            version_number: "v1.0".to_string(),
            version_status: VersionStatus::Active,
            parent_version_id: None,
            is_latest: true,
            effective_date: None,
            created_at: Utc::now(),
            superseded_at: None,
        }
    }
}

/// A markdown-rendered table extracted from a parsed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableData {
    /// Markdown-formatted table body.
    pub content: String,
    /// Page this table was extracted from, if the format has pages.
    pub page_number: Option<u32>,
    /// Section this table belongs to, if known.
    pub section_path: String,
    /// Table caption, if any.
    pub caption: String,
}

/// One hierarchical section of a parsed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    /// Section heading text; empty for an untitled leading section.
    pub title: String,
    /// Heading level (1 = H1, 2 = H2, ... 0 = untitled).
    pub level: u8,
    /// Section body text, excluding the title itself.
    pub content: String,
    /// Pages this section spans, if the format has pages.
    pub page_numbers: Vec<u32>,
}

impl Section {
    /// Title followed by content, newline-joined; this is what the chunker
    /// measures and packs.
    #[must_use]
    pub fn full_content(&self) -> String {
        match (self.title.is_empty(), self.content.is_empty()) {
            (true, true) => String::new(),
            (true, false) => self.content.clone(),
            (false, true) => self.title.clone(),
            (false, false) => format!("{}\n{}", self.title, self.content),
        }
    }

    /// Build a human-readable path like `"Ch. 3 > 3.2 Payment"` given the
    /// parent path already accumulated by the caller.
    #[must_use]
    pub fn section_path(&self, parent_path: &str) -> String {
        match (parent_path.is_empty(), self.title.is_empty()) {
            (false, false) => format!("{parent_path} > {}", self.title),
            (_, false) => self.title.clone(),
            _ => parent_path.to_string(),
        }
    }
}

/// Structured output of the parser collaborator: everything the chunker
/// needs to segment a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Title recovered from content, or the filename stem as a fallback.
    pub title: String,
    /// Original filename, set by the dispatcher after parsing.
    pub filename: String,
    /// Page count (0 for page-less formats).
    pub page_count: u32,
    /// Flattened, already-ordered sections (hierarchy collapsed into path
    /// strings — see `Section::section_path`).
    pub sections: Vec<Section>,
    /// Extracted tables, independent of the section list.
    pub tables: Vec<TableData>,
    /// Full raw text, used as a chunking fallback when no sections/tables
    /// were recovered.
    pub raw_text: String,
    /// Free-form parser metadata (e.g. detected language).
    pub metadata: std::collections::HashMap<String, String>,
}
