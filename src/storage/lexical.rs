//! Lexical store: multi-field BM25 search over chunk text, via `tantivy`.
//!
//! Schema mirrors the vector payload (spec §4.3) plus a `created_at` fast
//! field. `content` and `doc_title` use a language-appropriate analyzer;
//! `section_path` is both analyzed (`section_path`) and keyword-indexed
//! (`section_path_kw`) for exact filtering. `page_numbers` and `chunk_index`
//! are integer fast fields for range/terms queries. Chinese segmentation is
//! registered as a second tokenizer (`cmn`, CJK bigram) selected per
//! document via a language hint; English content uses `en_stem`.

use std::path::Path;

use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, QueryParser, TermQuery};
use tantivy::schema::{
    FAST, IndexRecordOption, INDEXED, STORED, Schema, TEXT, TextFieldIndexing, TextOptions, Value,
};
use tantivy::tokenizer::{NgramTokenizer, TextAnalyzer};
use tantivy::{DateTime, Index, IndexReader, IndexWriter, TantivyDocument, Term};
use uuid::Uuid;

use crate::core::ChunkType;
use crate::error::{Error, Result, StoreError};

const CJK_TOKENIZER: &str = "cmn";

/// A chunk as indexed into the lexical store; field-for-field the same
/// information as [`crate::storage::vector::VectorPoint`] plus a creation
/// timestamp (spec §4.3).
#[derive(Debug, Clone)]
pub struct LexicalDoc {
    /// Shared primary key.
    pub chunk_id: Uuid,
    /// Owning document.
    pub doc_id: Uuid,
    /// Document type tag.
    pub doc_type: String,
    /// Denormalized document title.
    pub doc_title: String,
    /// Hierarchical section path.
    pub section_path: String,
    /// Pages spanned.
    pub page_numbers: Vec<i64>,
    /// Sequence index within the document.
    pub chunk_index: i64,
    /// Chunk type.
    pub chunk_type: ChunkType,
    /// Chunk content.
    pub content: String,
    /// Owning document's group.
    pub group_id: Option<Uuid>,
    /// Owning document's department.
    pub department: Option<String>,
    /// Mirrors the owning document's `is_latest`.
    pub is_latest: bool,
    /// Unix timestamp (seconds) of indexing.
    pub created_at: i64,
}

/// Filter mirroring [`crate::storage::vector::VectorFilter`], kept as a
/// distinct type since the lexical store's term-query construction differs
/// from the vector store's payload-condition construction.
#[derive(Debug, Clone, Default)]
pub struct LexicalFilter {
    /// Restrict to one document.
    pub doc_id: Option<Uuid>,
    /// Restrict to one document type.
    pub doc_type: Option<String>,
    /// Restrict to latest-only or not.
    pub is_latest: Option<bool>,
    /// Restrict to one document group.
    pub group_id: Option<Uuid>,
    /// Accessible-document-set membership constraint.
    pub doc_id_in: Option<Vec<Uuid>>,
}

/// A BM25 hit.
#[derive(Debug, Clone)]
pub struct LexicalSearchHit {
    /// The matched chunk.
    pub chunk_id: Uuid,
    /// Owning document.
    pub doc_id: Uuid,
    /// BM25 score.
    pub score: f32,
}

/// Lexical store surface the index writer and hybrid retriever depend on.
#[async_trait]
pub trait LexicalStore: Send + Sync {
    /// Indexes (or replaces) a document, then refreshes so it is
    /// immediately searchable, per spec §4.3 ("after each document's write
    /// the index is refreshed").
    async fn index_and_refresh(&self, docs: &[LexicalDoc]) -> Result<()>;

    /// Multi-field BM25 search over `content^3`, `section_path`, `doc_title`.
    async fn search(&self, query: &str, filter: &LexicalFilter, top_k: usize) -> Result<Vec<LexicalSearchHit>>;

    /// Fetches every chunk of a document ordered by sequence index, used by
    /// the `read_document_detail` agent tool.
    async fn fetch_document_chunks(&self, doc_id: Uuid, page_range: Option<(i64, i64)>) -> Result<Vec<LexicalDoc>>;

    /// Bulk-flips `is_latest` for all of a document's indexed chunks.
    async fn set_is_latest(&self, doc_id: Uuid, is_latest: bool) -> Result<()>;

    /// Deletes by `doc_id` term query, per spec §4.4 delete contract.
    async fn delete_by_doc_id(&self, doc_id: Uuid) -> Result<()>;
}

/// `tantivy`-backed production implementation: one index per deployment
/// (not per document), opened/created at `index_dir`.
pub struct TantivyLexicalStore {
    index: Index,
    reader: IndexReader,
    writer: std::sync::Mutex<IndexWriter>,
    fields: LexicalFields,
}

#[derive(Clone, Copy)]
struct LexicalFields {
    chunk_id: tantivy::schema::Field,
    doc_id: tantivy::schema::Field,
    doc_type: tantivy::schema::Field,
    doc_title: tantivy::schema::Field,
    section_path: tantivy::schema::Field,
    section_path_kw: tantivy::schema::Field,
    page_numbers: tantivy::schema::Field,
    chunk_index: tantivy::schema::Field,
    chunk_type: tantivy::schema::Field,
    content: tantivy::schema::Field,
    group_id: tantivy::schema::Field,
    department: tantivy::schema::Field,
    is_latest: tantivy::schema::Field,
    created_at: tantivy::schema::Field,
}

fn build_schema() -> (Schema, LexicalFields) {
    let mut builder = Schema::builder();
    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer("en_stem")
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let analyzed = TextOptions::default().set_indexing_options(text_indexing).set_stored();

    let chunk_id = builder.add_text_field("chunk_id", STORED | TEXT);
    let doc_id = builder.add_text_field("doc_id", STORED | TEXT);
    let doc_type = builder.add_text_field("doc_type", STORED | TEXT);
    let doc_title = builder.add_text_field("doc_title", analyzed.clone());
    let section_path = builder.add_text_field("section_path", analyzed.clone());
    let section_path_kw = builder.add_text_field("section_path_kw", STORED | TEXT);
    let page_numbers = builder.add_i64_field("page_numbers", INDEXED | STORED | FAST);
    let chunk_index = builder.add_i64_field("chunk_index", INDEXED | STORED | FAST);
    let chunk_type = builder.add_text_field("chunk_type", STORED | TEXT);
    let content = builder.add_text_field("content", analyzed);
    let group_id = builder.add_text_field("group_id", STORED | TEXT);
    let department = builder.add_text_field("department", STORED | TEXT);
    let is_latest = builder.add_u64_field("is_latest", INDEXED | STORED | FAST);
    let created_at = builder.add_date_field("created_at", INDEXED | STORED | FAST);

    let schema = builder.build();
    (
        schema,
        LexicalFields {
            chunk_id,
            doc_id,
            doc_type,
            doc_title,
            section_path,
            section_path_kw,
            page_numbers,
            chunk_index,
            chunk_type,
            content,
            group_id,
            department,
            is_latest,
            created_at,
        },
    )
}

impl TantivyLexicalStore {
    /// Opens (creating if absent) the index at `index_dir`, registering the
    /// CJK n-gram tokenizer alongside the default stemmer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Lexical`] if the directory cannot be opened or
    /// the index cannot be created.
    pub fn open(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir).map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        let (schema, fields) = build_schema();
        let directory = MmapDirectory::open(index_dir).map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        let index = Index::open_or_create(directory, schema).map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;

        index
            .tokenizers()
            .register(CJK_TOKENIZER, TextAnalyzer::from(NgramTokenizer::new(1, 2, false).map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?));

        let reader = index
            .reader_builder()
            .reload_policy(tantivy::ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| Error::Store(StoreError::Lexical(e.to_string())))?;
        let writer = index
            .writer(50_000_000)
            .map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;

        Ok(Self { index, reader, writer: std::sync::Mutex::new(writer), fields })
    }

    fn doc_to_tantivy(&self, doc: &LexicalDoc) -> TantivyDocument {
        let f = &self.fields;
        let mut td = TantivyDocument::default();
        td.add_text(f.chunk_id, doc.chunk_id.to_string());
        td.add_text(f.doc_id, doc.doc_id.to_string());
        td.add_text(f.doc_type, doc.doc_type.clone());
        td.add_text(f.doc_title, doc.doc_title.clone());
        td.add_text(f.section_path, doc.section_path.clone());
        td.add_text(f.section_path_kw, doc.section_path.clone());
        for page in &doc.page_numbers {
            td.add_i64(f.page_numbers, *page);
        }
        td.add_i64(f.chunk_index, doc.chunk_index);
        td.add_text(f.chunk_type, doc.chunk_type.as_str());
        td.add_text(f.content, doc.content.clone());
        td.add_text(f.group_id, doc.group_id.map(|g| g.to_string()).unwrap_or_default());
        td.add_text(f.department, doc.department.clone().unwrap_or_default());
        td.add_u64(f.is_latest, u64::from(doc.is_latest));
        td.add_date(f.created_at, DateTime::from_timestamp_secs(doc.created_at));
        td
    }

    fn term_query(&self, field: tantivy::schema::Field, value: &str) -> Box<dyn tantivy::query::Query> {
        Box::new(TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic))
    }
}

#[async_trait]
impl LexicalStore for TantivyLexicalStore {
    async fn index_and_refresh(&self, docs: &[LexicalDoc]) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        for doc in docs {
            let term = Term::from_field_text(self.fields.chunk_id, &doc.chunk_id.to_string());
            writer.delete_term(term);
            writer.add_document(self.doc_to_tantivy(doc)).map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        }
        writer.commit().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        self.reader.reload().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        Ok(())
    }

    async fn search(&self, query: &str, filter: &LexicalFilter, top_k: usize) -> Result<Vec<LexicalSearchHit>> {
        if let Some(ids) = &filter.doc_id_in {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }
        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(
            &self.index,
            vec![self.fields.content, self.fields.section_path, self.fields.doc_title],
        );
        let mut parser = parser;
        parser.set_field_boost(self.fields.content, 3.0);

        let text_query = parser
            .parse_query(&tantivy::query::QueryParser::escape(query))
            .unwrap_or_else(|_| Box::new(tantivy::query::AllQuery));

        let mut clauses: Vec<(Occur, Box<dyn tantivy::query::Query>)> = vec![(Occur::Must, text_query)];
        if let Some(doc_id) = filter.doc_id {
            clauses.push((Occur::Must, self.term_query(self.fields.doc_id, &doc_id.to_string())));
        }
        if let Some(doc_type) = &filter.doc_type {
            clauses.push((Occur::Must, self.term_query(self.fields.doc_type, doc_type)));
        }
        if let Some(is_latest) = filter.is_latest {
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_u64(self.fields.is_latest, u64::from(is_latest)),
                    IndexRecordOption::Basic,
                )),
            ));
        }
        if let Some(group_id) = filter.group_id {
            clauses.push((Occur::Must, self.term_query(self.fields.group_id, &group_id.to_string())));
        }
        if let Some(ids) = &filter.doc_id_in {
            let mut should: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();
            for id in ids {
                should.push((Occur::Should, self.term_query(self.fields.doc_id, &id.to_string())));
            }
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(should))));
        }

        let query = BooleanQuery::new(clauses);
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(top_k))
            .map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let retrieved: TantivyDocument = searcher.doc(address).map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
            let chunk_id = field_str(&retrieved, self.fields.chunk_id).and_then(|s| Uuid::parse_str(&s).ok());
            let doc_id = field_str(&retrieved, self.fields.doc_id).and_then(|s| Uuid::parse_str(&s).ok());
            if let (Some(chunk_id), Some(doc_id)) = (chunk_id, doc_id) {
                hits.push(LexicalSearchHit { chunk_id, doc_id, score });
            }
        }
        Ok(hits)
    }

    async fn fetch_document_chunks(&self, doc_id: Uuid, page_range: Option<(i64, i64)>) -> Result<Vec<LexicalDoc>> {
        let searcher = self.reader.searcher();
        let query = self.term_query(self.fields.doc_id, &doc_id.to_string());
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(10_000))
            .map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;

        let mut docs = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let retrieved: TantivyDocument = searcher.doc(address).map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
            if let Some(doc) = tantivy_to_doc(&retrieved, &self.fields) {
                if let Some((lo, hi)) = page_range {
                    if !doc.page_numbers.iter().any(|p| *p >= lo && *p <= hi) {
                        continue;
                    }
                }
                docs.push(doc);
            }
        }
        docs.sort_by_key(|d| d.chunk_index);
        Ok(docs)
    }

    async fn set_is_latest(&self, doc_id: Uuid, is_latest: bool) -> Result<()> {
        let docs = self.fetch_document_chunks(doc_id, None).await?;
        let updated: Vec<LexicalDoc> = docs
            .into_iter()
            .map(|mut d| {
                d.is_latest = is_latest;
                d
            })
            .collect();
        self.index_and_refresh(&updated).await
    }

    async fn delete_by_doc_id(&self, doc_id: Uuid) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        writer.delete_term(Term::from_field_text(self.fields.doc_id, &doc_id.to_string()));
        writer.commit().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        self.reader.reload().map_err(|e| Error::Store(StoreError::Lexical(e.to_string())))?;
        Ok(())
    }
}

fn field_str(doc: &TantivyDocument, field: tantivy::schema::Field) -> Option<String> {
    doc.get_first(field).and_then(|v| v.as_str()).map(ToString::to_string)
}

fn tantivy_to_doc(doc: &TantivyDocument, fields: &LexicalFields) -> Option<LexicalDoc> {
    let chunk_id = field_str(doc, fields.chunk_id).and_then(|s| Uuid::parse_str(&s).ok())?;
    let doc_id = field_str(doc, fields.doc_id).and_then(|s| Uuid::parse_str(&s).ok())?;
    let chunk_type_str = field_str(doc, fields.chunk_type).unwrap_or_else(|| "text".to_string());
    let chunk_type = match chunk_type_str.as_str() {
        "table" => ChunkType::Table,
        "image_description" => ChunkType::ImageDescription,
        "section_summary" => ChunkType::SectionSummary,
        "doc_summary" => ChunkType::DocSummary,
        _ => ChunkType::Text,
    };
    let page_numbers = doc.get_all(fields.page_numbers).filter_map(|v| v.as_i64()).collect();
    let group_id_str = field_str(doc, fields.group_id).unwrap_or_default();
    Some(LexicalDoc {
        chunk_id,
        doc_id,
        doc_type: field_str(doc, fields.doc_type).unwrap_or_default(),
        doc_title: field_str(doc, fields.doc_title).unwrap_or_default(),
        section_path: field_str(doc, fields.section_path).unwrap_or_default(),
        page_numbers,
        chunk_index: doc.get_first(fields.chunk_index).and_then(|v| v.as_i64()).unwrap_or(0),
        chunk_type,
        content: field_str(doc, fields.content).unwrap_or_default(),
        group_id: if group_id_str.is_empty() { None } else { Uuid::parse_str(&group_id_str).ok() },
        department: {
            let d = field_str(doc, fields.department).unwrap_or_default();
            if d.is_empty() { None } else { Some(d) }
        },
        is_latest: doc.get_first(fields.is_latest).and_then(|v| v.as_u64()).unwrap_or(0) != 0,
        created_at: doc
            .get_first(fields.created_at)
            .and_then(|v| v.as_datetime())
            .map(|d| d.into_timestamp_secs())
            .unwrap_or(0),
    })
}
