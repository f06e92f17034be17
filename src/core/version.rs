//! Version lifecycle types: candidate match verdicts and the three-layer
//! diff between two versions in a chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of LLM verification over a version-match candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMatchResult {
    /// Whether the candidate is judged to be a new version of an existing
    /// document.
    pub is_new_version: bool,
    /// The matched document's identifier, if any.
    pub matched_doc_id: Option<Uuid>,
    /// The matched document's title, for display.
    pub matched_title: Option<String>,
    /// LLM-reported confidence in `[0, 1]`.
    pub confidence: f32,
    /// Short natural-language justification.
    pub reason: String,
    /// Whether the new document is judged newer than the match.
    pub new_is_newer: bool,
    /// Version string detected in the new document's content, if any.
    pub detected_version: Option<String>,
}

impl VersionMatchResult {
    /// A match is auto-linked only when both the match and newer-than
    /// judgments hold and confidence clears `threshold`.
    #[must_use]
    pub fn should_auto_link(&self, threshold: f32) -> bool {
        self.is_new_version && self.new_is_newer && self.confidence >= threshold
    }
}

/// One line-level change within a modified section's text diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChange {
    /// `"insert"`, `"delete"`, or `"replace"`.
    pub op: String,
    /// Old-version snippet, truncated to 500 characters.
    pub old_snippet: String,
    /// New-version snippet, truncated to 500 characters.
    pub new_snippet: String,
}

/// Per-section textual diff, one entry per section path present in either
/// version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionTextDiff {
    /// Section path this entry covers.
    pub section_path: String,
    /// `"added"`, `"deleted"`, `"modified"`, or `"unchanged"`.
    pub status: String,
    /// Opcode-level changes, truncated to 30 entries.
    pub changes: Vec<TextChange>,
    /// Unified-diff preview, truncated to 50 lines.
    pub unified_diff_preview: String,
}

/// Layer 1 of the diff: text-level changes grouped by section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextDiff {
    /// One entry per section path present in either version.
    pub sections: Vec<SectionTextDiff>,
    /// Counts of added/deleted/modified/unchanged sections.
    pub stats: DiffStats,
}

/// Aggregate counts over a [`TextDiff`]'s sections.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiffStats {
    /// Number of sections present only in the new version.
    pub added: usize,
    /// Number of sections present only in the old version.
    pub deleted: usize,
    /// Number of sections present in both with changed content.
    pub modified: usize,
    /// Number of sections present in both with identical content.
    pub unchanged: usize,
}

/// A section detected as renamed between versions (same content, new path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRename {
    /// Section path in the old version.
    pub old_path: String,
    /// Section path in the new version.
    pub new_path: String,
    /// Similarity ratio that triggered the rename match.
    pub similarity: f32,
}

/// Layer 2 of the diff: structural comparison of the section-path sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralDiff {
    /// Section paths present only in the new version (after rename removal).
    pub added_sections: Vec<String>,
    /// Section paths present only in the old version (after rename removal).
    pub deleted_sections: Vec<String>,
    /// Section paths present in both versions.
    pub common_sections: Vec<String>,
    /// Sections matched as renamed rather than added+deleted.
    pub renamed_sections: Vec<SectionRename>,
}

/// One business-impact item in the semantic diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeDetail {
    /// Category tag, e.g. `"pricing"`, `"procedure"`, `"terminology"`.
    pub category: String,
    /// One-paragraph description of the change.
    pub description: String,
    /// Section path or page range the change occurs at.
    pub location: String,
    /// Business impact assessment.
    pub business_impact: String,
}

/// Layer 3 of the diff: an LLM-generated business-readable summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticDiff {
    /// One-paragraph overview of what changed.
    pub change_summary: String,
    /// Itemized business-impact changes.
    pub change_details: Vec<ChangeDetail>,
    /// Overall impact assessment.
    pub impact_analysis: String,
}

/// The full three-layer diff between two versions in a chain, persisted
/// once computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDiff {
    /// Identifier of this diff record.
    pub diff_id: Uuid,
    /// Older document in the comparison.
    pub old_version_id: Uuid,
    /// Newer document in the comparison.
    pub new_version_id: Uuid,
    /// Title of the older document.
    pub old_title: String,
    /// Title of the newer document.
    pub new_title: String,
    /// Layer 1: textual diff.
    pub text_diff: TextDiff,
    /// Layer 2: structural diff.
    pub structural_diff: StructuralDiff,
    /// Layer 3: semantic diff (empty if the LLM call failed; the first two
    /// layers are still useful on their own).
    pub semantic_diff: SemanticDiff,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_auto_link_requires_all_three_conditions() {
        let result = VersionMatchResult {
            is_new_version: true,
            matched_doc_id: Some(Uuid::new_v4()),
            matched_title: Some("Policy v1".to_string()),
            confidence: 0.85,
            reason: "title and content match".to_string(),
            new_is_newer: true,
            detected_version: Some("v2.0".to_string()),
        };
        assert!(result.should_auto_link(0.8));
    }

    #[test]
    fn test_should_auto_link_rejects_below_threshold() {
        let mut result = VersionMatchResult {
            is_new_version: true,
            matched_doc_id: Some(Uuid::new_v4()),
            matched_title: None,
            confidence: 0.5,
            reason: String::new(),
            new_is_newer: true,
            detected_version: None,
        };
        assert!(!result.should_auto_link(0.8));

        result.confidence = 0.9;
        result.new_is_newer = false;
        assert!(!result.should_auto_link(0.8));
    }

    #[test]
    fn test_diff_stats_default_is_zero() {
        let stats = DiffStats::default();
        assert_eq!(stats.added + stats.deleted + stats.modified + stats.unchanged, 0);
    }
}
