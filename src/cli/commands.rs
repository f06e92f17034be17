//! CLI command implementations.
//!
//! Wires the library's collaborators (stores, embedder, LLM client) into
//! the higher-level engines and dispatches each subcommand against them.
//! This binary is an administrative/debugging surface; the primary
//! integration point for the core remains the library API itself.

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::agent::AgentExecutor;
use crate::chunking::ChunkingConfig;
use crate::cli::output::{
    format_agent_response, format_document, format_document_list, format_generated_answer, format_query_plan, format_retrieved_chunks,
    format_version_diff, format_version_history, OutputFormat,
};
use crate::cli::parser::{Cli, Commands};
use crate::config::Settings;
use crate::core::agent::Route;
use crate::diffing::DiffEngine;
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Error, QueryError, Result};
use crate::generation::AnswerGenerator;
use crate::ingestion::{IngestOptions, IngestionPipeline};
use crate::llm::{LlmClient, OpenAiClient};
use crate::rerank::FallbackReranker;
use crate::retriever::{HybridRetriever, RetrievalFilters, RetrievalRequest, VersionMode};
use crate::routing::QueryRouter;
use crate::storage::metadata::MetadataStore;
use crate::storage::object::FsObjectStore;
use crate::storage::vector::QdrantVectorStore;
use crate::storage::{LexicalStore, ObjectStore, TantivyLexicalStore, VectorStore};
use crate::summarization::Summarizer;
use crate::version_detect::VersionDetector;

/// The wired-up set of engines every CLI command dispatches against.
///
/// Built once per invocation from [`Settings`]; nothing here is cached
/// across commands because the binary exits after one subcommand runs.
struct Engine {
    metadata_store: Arc<dyn MetadataStore>,
    ingestion: IngestionPipeline,
    retriever: Arc<HybridRetriever>,
    router: QueryRouter,
    generator: Arc<AnswerGenerator>,
    agent: AgentExecutor,
    diff_engine: Arc<DiffEngine>,
    settings: Settings,
}

impl Engine {
    async fn build(settings: Settings) -> Result<Self> {
        let metadata_store: Arc<dyn MetadataStore> = Arc::new(crate::storage::metadata::SqliteMetadataStore::connect(&settings.metadata_database_url).await?);
        let lexical_store: Arc<dyn LexicalStore> = Arc::new(TantivyLexicalStore::open(Path::new(&settings.lexical_index_dir))?);
        let vector_store: Arc<dyn VectorStore> = Arc::new(QdrantVectorStore::new(&settings.vector_store_url, settings.vector_collection_name.clone())?);
        let object_store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::open(&settings.object_store_root)?);
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder()?);
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(&settings));

        let summarizer = Arc::new(Summarizer::new(llm.clone(), settings.summarizer_concurrency));
        let version_detector = Arc::new(VersionDetector::new(
            metadata_store.clone(),
            vector_store.clone(),
            lexical_store.clone(),
            embedder.clone(),
            llm.clone(),
            settings.version_title_similarity_threshold,
            settings.version_content_similarity_threshold,
            settings.version_auto_link_threshold,
        ));
        let diff_engine = Arc::new(DiffEngine::new(metadata_store.clone(), llm.clone()));

        let chunking_config = ChunkingConfig {
            target_size: settings.chunk_target_size,
            max_size: settings.chunk_max_size,
            overlap: settings.chunk_overlap,
        };
        let ingestion = IngestionPipeline::new(
            vector_store.clone(),
            lexical_store.clone(),
            metadata_store.clone(),
            object_store,
            embedder.clone(),
            summarizer,
            version_detector,
            diff_engine.clone(),
            chunking_config,
            settings.max_file_size_mb,
            settings.version_auto_link_threshold,
        );

        let reranker = Some(Arc::new(FallbackReranker::new()) as Arc<dyn crate::rerank::Reranker>);
        let retriever = Arc::new(HybridRetriever::new(
            vector_store,
            lexical_store.clone(),
            metadata_store.clone(),
            embedder,
            reranker,
            settings.retrieval_rrf_k,
            settings.retrieval_top_k_vector,
            settings.retrieval_top_k_bm25,
            settings.context_window_chunks,
        ));

        let router = QueryRouter::new(llm.clone());
        let generator = Arc::new(AnswerGenerator::new(llm.clone(), settings.generation_max_context_tokens));
        let agent = AgentExecutor::new(retriever.clone(), metadata_store.clone(), lexical_store, diff_engine.clone(), generator.clone(), llm, settings.agent_max_steps);

        Ok(Self { metadata_store, ingestion, retriever, router, generator, agent, diff_engine, settings })
    }
}

/// Executes the parsed CLI command, returning the string to print.
///
/// # Errors
///
/// Returns an error if settings fail to load, a store cannot be reached,
/// or the underlying operation fails.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let settings = load_settings(cli)?;
    let engine = Engine::build(settings).await?;

    match &cli.command {
        Commands::Ingest { file, doc_type, tags, group_id, department } => cmd_ingest(&engine, file, doc_type.clone(), tags.clone(), group_id.as_deref(), department.clone(), format).await,
        Commands::Delete { doc_id } => cmd_delete(&engine, doc_id, format).await,
        Commands::Get { doc_id } => cmd_get(&engine, doc_id, format).await,
        Commands::ListDocuments { doc_type, group_id, tag, limit } => cmd_list(&engine, doc_type.as_deref(), group_id.as_deref(), tag.as_deref(), *limit, format).await,
        Commands::Search { query, top_k, all_versions, doc_id } => cmd_search(&engine, query, *top_k, *all_versions, doc_id.as_deref(), format).await,
        Commands::Query { question, route } => cmd_query(&engine, question, route.as_deref(), format).await,
        Commands::Agent { question } => cmd_agent(&engine, question, format).await,
        Commands::Compare { doc_id, other_doc_id } => cmd_compare(&engine, doc_id, other_doc_id, format).await,
        Commands::History { doc_id } => cmd_history(&engine, doc_id, format).await,
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let Some(path) = &cli.config else {
        return Settings::from_env();
    };
    let figure = config::Config::builder()
        .add_source(config::Config::try_from(&Settings::default()).map_err(config_err)?)
        .add_source(config::File::from(path.clone()))
        .add_source(config::Environment::with_prefix("RAGCORE").separator("__"))
        .build()
        .map_err(config_err)?;
    figure.try_deserialize().map_err(config_err)
}

fn config_err(err: config::ConfigError) -> Error {
    Error::Config { message: err.to_string() }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Query(QueryError::InvalidQuery(format!("invalid document id {s:?}: {e}"))))
}

async fn cmd_ingest(
    engine: &Engine,
    file: &std::path::Path,
    doc_type: Option<String>,
    tags: Vec<String>,
    group_id: Option<&str>,
    department: Option<String>,
    format: OutputFormat,
) -> Result<String> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| Error::Io(crate::error::IoError::ReadFailed { path: file.display().to_string(), reason: e.to_string() }))?;
    let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or("upload").to_string();
    let options = IngestOptions {
        doc_type,
        tags,
        group_id: group_id.map(parse_uuid).transpose()?,
        owner_id: None,
        department,
        visibility: crate::core::document::Visibility::Public,
    };
    let doc_id = engine.ingestion.ingest(bytes, &filename, options).await?;
    let doc = engine.metadata_store.get_document(doc_id).await?.ok_or_else(|| Error::Ingestion(crate::error::IngestionError::DocumentNotFound { doc_id: doc_id.to_string() }))?;
    Ok(format_document(&doc, format))
}

async fn cmd_delete(engine: &Engine, doc_id: &str, _format: OutputFormat) -> Result<String> {
    let id = parse_uuid(doc_id)?;
    engine.ingestion.delete(id).await?;
    Ok(format!("deleted {id}\n"))
}

async fn cmd_get(engine: &Engine, doc_id: &str, format: OutputFormat) -> Result<String> {
    let id = parse_uuid(doc_id)?;
    let doc = engine.metadata_store.get_document(id).await?.ok_or_else(|| Error::Ingestion(crate::error::IngestionError::DocumentNotFound { doc_id: id.to_string() }))?;
    Ok(format_document(&doc, format))
}

async fn cmd_list(engine: &Engine, doc_type: Option<&str>, group_id: Option<&str>, tag: Option<&str>, limit: usize, format: OutputFormat) -> Result<String> {
    let group = group_id.map(parse_uuid).transpose()?;
    let docs = engine.metadata_store.list_documents(doc_type, group, tag, Some(crate::core::document::ProcessingStatus::Ready), limit).await?;
    Ok(format_document_list(&docs, format))
}

async fn cmd_search(engine: &Engine, query: &str, top_k: usize, all_versions: bool, doc_id: Option<&str>, format: OutputFormat) -> Result<String> {
    let filters = RetrievalFilters {
        doc_id: doc_id.map(parse_uuid).transpose()?,
        doc_type: None,
        group_id: None,
        accessible_doc_ids: None,
    };
    let version_mode = if all_versions { VersionMode::AllVersions } else { VersionMode::LatestOnly };
    let request = RetrievalRequest { query, version_mode, filters, top_k };
    let chunks = engine.retriever.retrieve(&request).await?;
    Ok(format_retrieved_chunks(&chunks, format))
}

async fn cmd_query(engine: &Engine, question: &str, route_override: Option<&str>, format: OutputFormat) -> Result<String> {
    if question.trim().is_empty() {
        return Err(Error::Query(QueryError::InvalidQuery("question must not be empty".to_string())));
    }

    let mut plan = engine.router.route(question, &std::collections::HashMap::new()).await;
    if let Some(route_name) = route_override {
        plan.route = Route::parse(route_name).ok_or_else(|| Error::Query(QueryError::InvalidQuery(format!("unknown route {route_name:?}"))))?;
    }

    match plan.route {
        Route::Agent => {
            let response = engine.agent.run(question, None).await?;
            Ok(format_agent_response(&response, format))
        }
        Route::SimpleRag | Route::EnhancedRag => {
            let search_query = plan.search_queries.first().map_or(question, String::as_str);
            let filters = RetrievalFilters { doc_id: None, doc_type: None, group_id: None, accessible_doc_ids: None };
            let request = RetrievalRequest { query: search_query, version_mode: VersionMode::LatestOnly, filters, top_k: engine.settings.retrieval_final_top_k };
            let chunks = engine.retriever.retrieve(&request).await?;

            if format == OutputFormat::Text {
                eprintln!("{}", format_query_plan(&plan, OutputFormat::Text));
            }

            let answer = if matches!(plan.route, Route::EnhancedRag) {
                engine.generator.generate_cross_document(question, &chunks).await?
            } else {
                engine.generator.generate(question, &chunks).await?
            };
            Ok(format_generated_answer(&answer, format))
        }
    }
}

async fn cmd_agent(engine: &Engine, question: &str, format: OutputFormat) -> Result<String> {
    if question.trim().is_empty() {
        return Err(Error::Query(QueryError::InvalidQuery("question must not be empty".to_string())));
    }
    let response = engine.agent.run(question, None).await?;
    Ok(format_agent_response(&response, format))
}

async fn cmd_compare(engine: &Engine, doc_id: &str, other_doc_id: &str, format: OutputFormat) -> Result<String> {
    let a_id = parse_uuid(doc_id)?;
    let b_id = parse_uuid(other_doc_id)?;
    let a = engine.metadata_store.get_document(a_id).await?.ok_or_else(|| Error::Ingestion(crate::error::IngestionError::DocumentNotFound { doc_id: a_id.to_string() }))?;
    let b = engine.metadata_store.get_document(b_id).await?.ok_or_else(|| Error::Ingestion(crate::error::IngestionError::DocumentNotFound { doc_id: b_id.to_string() }))?;
    let (old, new) = if a.created_at <= b.created_at { (&a, &b) } else { (&b, &a) };
    let diff = engine.diff_engine.compute(old, new).await?;
    Ok(format_version_diff(&diff, format))
}

async fn cmd_history(engine: &Engine, doc_id: &str, format: OutputFormat) -> Result<String> {
    let id = parse_uuid(doc_id)?;
    let mut chain = Vec::new();
    let mut current = engine.metadata_store.get_document(id).await?;
    while let Some(doc) = current {
        let parent = doc.parent_version_id;
        chain.push(doc);
        current = match parent {
            Some(parent_id) => engine.metadata_store.get_document(parent_id).await?,
            None => None,
        };
    }
    chain.reverse();
    Ok(format_version_history(&chain, format))
}
