//! Query routing and agent-loop types.

use serde::{Deserialize, Serialize};

use super::retrieval::Citation;

/// The route a query is dispatched down, chosen by the router and possibly
/// overridden by derivation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Single-pass retrieval + generation over one focused query.
    SimpleRag,
    /// Map-reduce generation over a broader, possibly multi-document scope.
    EnhancedRag,
    /// Bounded reason/act/observe tool-use loop.
    Agent,
}

impl Route {
    /// Parses a route tag, returning `None` for anything outside the three
    /// valid values — callers fall back to derivation rules in that case.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "simple_rag" => Some(Self::SimpleRag),
            "enhanced_rag" => Some(Self::EnhancedRag),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

/// A routing decision produced by the query router, before generation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Coarse classification of the question, e.g. `"factual"`, `"summary"`,
    /// `"comparison"`, `"version_diff"`, `"complex_analysis"`.
    pub query_type: String,
    /// One or more search queries derived from the question.
    pub search_queries: Vec<String>,
    /// Metadata filters to apply to retrieval, caller filters win on clash.
    pub metadata_filters: std::collections::HashMap<String, String>,
    /// Whether answering requires synthesizing across multiple documents.
    pub needs_multi_doc: bool,
    /// `"narrow"` or `"broad"`, informs context-window sizing.
    pub estimated_scope: String,
    /// The chosen dispatch route.
    pub route: Route,
}

impl Default for QueryPlan {
    fn default() -> Self {
        Self {
            query_type: "factual".to_string(),
            search_queries: Vec::new(),
            metadata_filters: std::collections::HashMap::new(),
            needs_multi_doc: false,
            estimated_scope: "narrow".to_string(),
            route: Route::SimpleRag,
        }
    }
}

/// One reason/act/observe step in an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    /// 1-based step number.
    pub step_number: u32,
    /// The model's stated reasoning for this step.
    pub thought: String,
    /// Name of the tool invoked, if any.
    pub action: Option<String>,
    /// Raw tool input, as the model produced it.
    pub action_input: Option<serde_json::Value>,
    /// Tool output fed back into the next step's context.
    pub observation: Option<String>,
    /// Wall-clock time this step took to execute.
    pub duration_ms: u64,
}

/// The full response produced by the query orchestrator, regardless of
/// which route produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Generated answer text.
    pub answer: String,
    /// Citations supporting the answer.
    pub citations: Vec<Citation>,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f32,
    /// End-to-end wall-clock latency.
    pub latency_ms: u64,
    /// Step trace, non-empty only for [`Route::Agent`] runs.
    pub steps: Vec<AgentStep>,
    /// Number of steps taken.
    pub total_steps: u32,
    /// Route that produced this response.
    pub route: Route,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parse_valid_values() {
        assert_eq!(Route::parse("simple_rag"), Some(Route::SimpleRag));
        assert_eq!(Route::parse("enhanced_rag"), Some(Route::EnhancedRag));
        assert_eq!(Route::parse("agent"), Some(Route::Agent));
    }

    #[test]
    fn test_route_parse_rejects_unknown_value() {
        assert_eq!(Route::parse("complex_analysis"), None);
        assert_eq!(Route::parse(""), None);
    }

    #[test]
    fn test_query_plan_default_routes_simple_rag() {
        let plan = QueryPlan::default();
        assert_eq!(plan.route, Route::SimpleRag);
        assert_eq!(plan.query_type, "factual");
        assert!(!plan.needs_multi_doc);
    }
}
