//! Core data models for the ADL diff miner
//!
//! These models define the wire schema of an emitted record. Serde field
//! declaration order is the serialized key order, which downstream
//! consumers rely on being stable across runs.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Schema version stamped into every record's metadata block.
pub const DATASET_VERSION: &str = "adl-diff-miner-schema-v2.0";

/// Serialize timestamps as fixed-width RFC 3339 UTC with integer-second
/// precision and a trailing `Z` (e.g. `2024-01-01T08:00:00Z`).
pub mod rfc3339_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let naive =
            NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)?;
        Ok(naive.and_utc())
    }
}

/// The current UTC instant truncated to whole seconds.
pub fn utc_now_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

/// A name/email pair from a commit signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub email: String,
}

/// Identity of one commit.
///
/// `parent_hash` is the first parent, or empty for a root commit. The
/// message is preserved verbatim as stored, including trailing newlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRef {
    pub hash: String,
    pub parent_hash: String,
    #[serde(with = "rfc3339_seconds")]
    pub authored_at: DateTime<Utc>,
    #[serde(with = "rfc3339_seconds")]
    pub committed_at: DateTime<Utc>,
    pub author: Actor,
    pub committer: Actor,
    pub is_merge: bool,
    pub message: String,
}

/// Per-file change status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeStatus::Added => write!(f, "added"),
            ChangeStatus::Modified => write!(f, "modified"),
            ChangeStatus::Deleted => write!(f, "deleted"),
            ChangeStatus::Renamed => write!(f, "renamed"),
        }
    }
}

/// Added/removed line counts across all hunks of a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
}

impl DiffStats {
    /// True when the file contributed no added and no removed lines.
    pub fn is_empty(&self) -> bool {
        self.additions == 0 && self.deletions == 0
    }
}

/// One contiguous region of a unified patch.
///
/// Body lines retain their leading sign character exactly as stored in
/// the patch text; ordering within each list is patch order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hunk {
    pub header: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub context: Vec<String>,
}

/// One file in a patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Post-image path.
    pub path: String,
    /// Pre-image path, populated only on rename.
    pub previous_path: Option<String>,
    pub status: ChangeStatus,
    /// Lowercase suffix including the leading dot, or empty.
    pub extension: String,
    /// Derived language name, or `null` when not derived.
    pub language: Option<String>,
    pub hunks: Vec<Hunk>,
    pub stats: DiffStats,
}

/// The human-authored statement of why a change was made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub message: String,
    pub source: IntentSource,
}

/// Where an intent was sourced from.
///
/// `PrBody` and `IssueThread` are reserved for future forge-backed
/// mining and are never produced by the v1 miner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentSource {
    CommitMessage,
    PrBody,
    IssueThread,
}

/// Churn, authorship, and recency statistics for one code file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerFileStat {
    pub path: String,
    pub churn_count: usize,
    pub unique_authors: usize,
    /// Fractional days since the last in-window change, 0 when none.
    pub last_modified_days_ago: f64,
    /// Author emails, most frequent first, ties broken by email
    /// ascending, truncated to the top-author cap.
    pub top_authors: Vec<String>,
}

/// Dataset-level rollup across all analyzed files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_commits: usize,
    pub total_unique_authors: usize,
    pub most_recent_change_days_ago: f64,
}

/// History-derived signals anchored at the commit's first parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSignals {
    /// The ancestor used as the time anchor; equals the record's
    /// `commit.parent_hash`.
    pub analysis_parent_hash: String,
    pub analysis_timespan_days: u32,
    pub files_analyzed: Vec<String>,
    pub per_file_stats: Vec<PerFileStat>,
    pub aggregate_stats: AggregateStats,
}

impl ContextSignals {
    /// Signals for a record with no code diffs: empty lists and zeroed
    /// aggregates, never omitted.
    pub fn empty(analysis_parent_hash: String, analysis_timespan_days: u32) -> Self {
        Self {
            analysis_parent_hash,
            analysis_timespan_days,
            files_analyzed: Vec::new(),
            per_file_stats: Vec::new(),
            aggregate_stats: AggregateStats::default(),
        }
    }
}

/// Record provenance block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub dataset_version: String,
    #[serde(with = "rfc3339_seconds")]
    pub generated_at: DateTime<Utc>,
}

/// One self-contained training sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub commit: CommitRef,
    pub intent: Intent,
    pub adl_diff: FileChange,
    pub code_diffs: Vec<FileChange>,
    pub context_signals: ContextSignals,
    pub metadata: Metadata,
}
