//! Query router: classifies a question into a [`QueryPlan`] via an LLM
//! call, deriving the dispatch [`Route`] when the model doesn't supply one
//! outright.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::core::agent::{QueryPlan, Route};
use crate::error::Result;
use crate::llm::{generate_json, LlmClient, Message, ModelTier};

const ROUTING_MAX_TOKENS: u32 = 300;
const MAX_REFORMULATED_QUERIES: usize = 2;

#[derive(Debug, Deserialize)]
struct RoutingResponse {
    #[serde(default = "default_query_type")]
    query_type: String,
    #[serde(default)]
    search_queries: Vec<String>,
    #[serde(default)]
    metadata_filters: HashMap<String, String>,
    #[serde(default)]
    needs_multi_doc: bool,
    #[serde(default = "default_scope")]
    estimated_scope: String,
    #[serde(default)]
    route: Option<String>,
}

fn default_query_type() -> String {
    "factual".to_string()
}

fn default_scope() -> String {
    "narrow".to_string()
}

/// Classifies natural-language questions into a [`QueryPlan`].
pub struct QueryRouter {
    llm: Arc<dyn LlmClient>,
}

impl QueryRouter {
    /// Builds a router over the given LLM client.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Classifies `question`, merging `caller_filters` into the inferred
    /// metadata filters (caller's values win on key clash; keys whose
    /// caller value is `None` are dropped entirely). Falls back to a
    /// `simple_rag` plan with the original question as the sole search
    /// query if the LLM call fails.
    pub async fn route(&self, question: &str, caller_filters: &HashMap<String, Option<String>>) -> QueryPlan {
        let system = "You classify a user's question for a retrieval-augmented generation system. \
            Decide its type, whether it needs synthesis across multiple documents, its scope, and \
            which execution route should handle it: \"simple_rag\" for a single focused lookup, \
            \"enhanced_rag\" for synthesis across several documents, or \"agent\" for anything needing \
            iterative tool use (comparisons, version history, open-ended multi-step analysis).";
        let messages = [Message::user(format!(
            "Respond as JSON: {{\"query_type\": \"factual\"|\"summary\"|\"comparison\"|\"version_diff\"|\"complex_analysis\", \
             \"search_queries\": string[] (at most 2 reformulations), \"metadata_filters\": object, \
             \"needs_multi_doc\": bool, \"estimated_scope\": \"narrow\"|\"medium\"|\"broad\", \
             \"route\": \"simple_rag\"|\"enhanced_rag\"|\"agent\"|null}}.\n\nQuestion: {question}"
        ))];

        let resp = match generate_json::<RoutingResponse>(self.llm.as_ref(), ModelTier::Light, system, &messages, ROUTING_MAX_TOKENS).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "query routing call failed, falling back to simple_rag");
                return QueryPlan {
                    query_type: "factual".to_string(),
                    search_queries: vec![question.to_string()],
                    metadata_filters: merge_filters(HashMap::new(), caller_filters),
                    needs_multi_doc: false,
                    estimated_scope: "narrow".to_string(),
                    route: Route::SimpleRag,
                };
            }
        };

        let mut search_queries = resp.search_queries;
        search_queries.truncate(MAX_REFORMULATED_QUERIES);
        if search_queries.is_empty() {
            search_queries.push(question.to_string());
        }

        let route = resp
            .route
            .as_deref()
            .and_then(Route::parse)
            .unwrap_or_else(|| derive_route(&resp.query_type, resp.needs_multi_doc, &resp.estimated_scope));

        QueryPlan {
            query_type: resp.query_type,
            search_queries,
            metadata_filters: merge_filters(resp.metadata_filters, caller_filters),
            needs_multi_doc: resp.needs_multi_doc,
            estimated_scope: resp.estimated_scope,
            route,
        }
    }
}

/// Route derivation when the model omits `route`:
/// `complex_analysis`/`version_diff`/`comparison` always escalate to the
/// agent; a multi-document summary gets the enhanced (map-reduce) route;
/// everything else stays `simple_rag`.
fn derive_route(query_type: &str, needs_multi_doc: bool, _estimated_scope: &str) -> Route {
    match query_type {
        "complex_analysis" | "version_diff" | "comparison" => Route::Agent,
        "summary" if needs_multi_doc => Route::EnhancedRag,
        _ => Route::SimpleRag,
    }
}

/// Merges inferred filters with the caller's: the caller's value wins on a
/// key clash, and a caller key mapped to `None` removes that key entirely
/// (an explicit "don't filter on this" signal).
fn merge_filters(inferred: HashMap<String, String>, caller: &HashMap<String, Option<String>>) -> HashMap<String, String> {
    let mut merged = inferred;
    for (key, value) in caller {
        match value {
            Some(v) => {
                merged.insert(key.clone(), v.clone());
            }
            None => {
                merged.remove(key);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_route_escalates_comparison_to_agent() {
        assert_eq!(derive_route("comparison", false, "narrow"), Route::Agent);
        assert_eq!(derive_route("version_diff", false, "narrow"), Route::Agent);
        assert_eq!(derive_route("complex_analysis", false, "narrow"), Route::Agent);
    }

    #[test]
    fn derive_route_uses_enhanced_rag_for_multi_doc_summaries() {
        assert_eq!(derive_route("summary", true, "broad"), Route::EnhancedRag);
        assert_eq!(derive_route("summary", false, "broad"), Route::SimpleRag);
    }

    #[test]
    fn derive_route_defaults_to_simple_rag() {
        assert_eq!(derive_route("factual", false, "narrow"), Route::SimpleRag);
    }

    #[test]
    fn merge_filters_caller_overrides_and_drops() {
        let mut inferred = HashMap::new();
        inferred.insert("doc_type".to_string(), "policy".to_string());
        inferred.insert("department".to_string(), "legal".to_string());

        let mut caller = HashMap::new();
        caller.insert("doc_type".to_string(), Some("contract".to_string()));
        caller.insert("department".to_string(), None);

        let merged = merge_filters(inferred, &caller);
        assert_eq!(merged.get("doc_type"), Some(&"contract".to_string()));
        assert_eq!(merged.get("department"), None);
    }
}
