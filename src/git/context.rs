//! Context-signal mining
//!
//! For each code path co-changed with the ADL file, walks the
//! path-scoped history anchored at the commit's first parent over a
//! bounded look-back window and derives churn, authorship, and recency
//! statistics. Signals are anchored at the parent so the label (the ADL
//! change itself) never leaks into its features.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use git2::Oid;
use tracing::warn;

use super::Gateway;
use crate::models::{Actor, AggregateStats, CommitRef, ContextSignals, PerFileStat};

/// Cap on the `top_authors` list per file.
pub const TOP_AUTHORS_CAP: usize = 5;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Compute [`ContextSignals`] for `files` anchored at `parent`.
///
/// The window is `[parent.committed_at - context_days, parent.committed_at]`,
/// inclusive on both ends. A failure while analyzing a single path
/// zero-fills that path's entry with a warning; the remaining paths and
/// the record proceed.
pub fn collect_context_signals(
    gateway: &Gateway,
    parent: &CommitRef,
    files: &[String],
    context_days: u32,
) -> ContextSignals {
    if files.is_empty() {
        return ContextSignals::empty(parent.hash.clone(), context_days);
    }

    let until = parent.committed_at;
    let since = until - Duration::days(i64::from(context_days));

    let mut per_file_stats = Vec::with_capacity(files.len());
    let mut union_authors: HashSet<String> = HashSet::new();
    let mut freshest: Vec<f64> = Vec::new();
    let mut total_commits = 0usize;

    for path in files {
        let (entry, authors) = match analyze_path(gateway, &parent.hash, path, since, until) {
            Ok(result) => result,
            Err(error) => {
                warn!(path = %path, %error, "context analysis failed; zero-filling entry");
                (zeroed_entry(path), HashSet::new())
            }
        };
        if entry.churn_count > 0 {
            freshest.push(entry.last_modified_days_ago);
            union_authors.extend(authors);
        }
        total_commits += entry.churn_count;
        per_file_stats.push(entry);
    }

    let most_recent_change_days_ago = freshest
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);

    ContextSignals {
        analysis_parent_hash: parent.hash.clone(),
        analysis_timespan_days: context_days,
        files_analyzed: files.to_vec(),
        per_file_stats,
        aggregate_stats: AggregateStats {
            total_commits,
            total_unique_authors: union_authors.len(),
            most_recent_change_days_ago: if most_recent_change_days_ago.is_finite() {
                most_recent_change_days_ago
            } else {
                0.0
            },
        },
    }
}

fn analyze_path(
    gateway: &Gateway,
    anchor_hash: &str,
    path: &str,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<(PerFileStat, HashSet<String>)> {
    let anchor = Oid::from_str(anchor_hash)?;
    let history = gateway.history_for_path(anchor, path, since, until)?;

    let mut frequency: HashMap<String, usize> = HashMap::new();
    let mut latest: Option<DateTime<Utc>> = None;
    for commit in &history {
        *frequency.entry(author_identity(&commit.author)).or_default() += 1;
        if latest.is_none_or(|seen| commit.committed_at > seen) {
            latest = Some(commit.committed_at);
        }
    }

    let last_modified_days_ago = latest.map(|seen| days_between(until, seen)).unwrap_or(0.0);

    let authors: HashSet<String> = frequency.keys().cloned().collect();
    let mut ranked: Vec<(String, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let top_authors = ranked
        .into_iter()
        .take(TOP_AUTHORS_CAP)
        .map(|(email, _)| email)
        .collect();

    Ok((
        PerFileStat {
            path: path.to_string(),
            churn_count: history.len(),
            unique_authors: authors.len(),
            last_modified_days_ago,
            top_authors,
        },
        authors,
    ))
}

fn zeroed_entry(path: &str) -> PerFileStat {
    PerFileStat {
        path: path.to_string(),
        churn_count: 0,
        unique_authors: 0,
        last_modified_days_ago: 0.0,
        top_authors: Vec::new(),
    }
}

/// Stable author identity: email, falling back to name, lowercased.
fn author_identity(author: &Actor) -> String {
    let identity = if author.email.trim().is_empty() {
        author.name.trim()
    } else {
        author.email.trim()
    };
    if identity.is_empty() {
        "unknown".to_string()
    } else {
        identity.to_lowercase()
    }
}

fn days_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    let seconds = (later - earlier).num_seconds().max(0);
    seconds as f64 / SECONDS_PER_DAY
}
