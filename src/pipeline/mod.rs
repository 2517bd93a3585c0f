//! Mining pipeline
//!
//! Orchestrates the full extraction per run:
//! 1. Enumerate commits reachable from HEAD and order them
//! 2. Per commit, diff against the first parent and route file patches
//! 3. Normalize the ADL diff and the co-changed code diffs
//! 4. Mine context signals anchored at the parent
//! 5. Compose the record and hand it to the emitter
//!
//! Record construction is a pure function of (commit, parent, repo
//! snapshot); no state flows between records except the tracked ADL
//! path, which follows renames backwards through history.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context, Result};
use git2::Oid;
use tracing::{debug, info, warn};

use crate::diff::{extension_of, normalize_file_patch};
use crate::git::{collect_context_signals, normalize_rel_path, FilePatch, Gateway};
use crate::models::{
    utc_now_seconds, FileChange, Intent, IntentSource, Metadata, Record, DATASET_VERSION,
};
use crate::reporters::JsonlEmitter;

/// Runtime settings for a single mining invocation.
#[derive(Debug, Clone)]
pub struct MineConfig {
    pub repo_path: PathBuf,
    /// ADL path relative to the repository root, normalized.
    pub adl_file: String,
    /// Accepted code extensions, lowercase with a leading dot.
    pub code_extensions: Vec<String>,
    /// Look-back window for context signals, in days (>= 1).
    pub context_days: u32,
}

/// Predicate deciding whether a repository path is the ADL artifact.
///
/// v1 ships exact full-path matching only; a glob matcher would slot in
/// here.
pub trait AdlMatcher {
    fn matches(&self, path: &str) -> bool;
}

/// Case-insensitive full-path equality on normalized paths.
pub struct ExactPathMatcher {
    target: String,
}

impl ExactPathMatcher {
    pub fn new(path: &str) -> Self {
        Self {
            target: normalize_rel_path(path).to_lowercase(),
        }
    }
}

impl AdlMatcher for ExactPathMatcher {
    fn matches(&self, path: &str) -> bool {
        !path.is_empty() && normalize_rel_path(path).to_lowercase() == self.target
    }
}

/// Counters for one mining run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MineStats {
    /// Commits pulled from the head walk.
    pub commits_scanned: usize,
    /// Commits whose patch touched the ADL path.
    pub adl_commits: usize,
    /// Records written to the sink.
    pub records_emitted: usize,
}

/// Per-commit record assembly.
pub struct Assembler<'a> {
    gateway: &'a Gateway,
    config: &'a MineConfig,
    /// Current ADL path, lowercase; updated when a rename is crossed so
    /// older commits keep matching the pre-rename name.
    tracked_adl_path: String,
    adl_commits_seen: usize,
}

impl<'a> Assembler<'a> {
    pub fn new(gateway: &'a Gateway, config: &'a MineConfig) -> Self {
        Self {
            gateway,
            config,
            tracked_adl_path: normalize_rel_path(&config.adl_file).to_lowercase(),
            adl_commits_seen: 0,
        }
    }

    /// Commits seen so far whose patch touched the ADL path.
    pub fn adl_commits_seen(&self) -> usize {
        self.adl_commits_seen
    }

    /// Build the record for one commit, or decide to skip it.
    pub fn assemble(&mut self, oid: Oid) -> Result<Option<Record>> {
        let commit = self
            .gateway
            .commit_ref(oid)
            .with_context(|| format!("failed to load commit {oid}"))?;

        if commit.parent_hash.is_empty() {
            info!(commit = %commit.hash, "skipping root commit (no parent)");
            return Ok(None);
        }

        debug!(commit = %commit.hash, parent = %commit.parent_hash, "processing commit");

        let parent_oid = Oid::from_str(&commit.parent_hash)
            .with_context(|| format!("invalid parent id for {}", commit.hash))?;
        let patches = self
            .gateway
            .patch(parent_oid, oid)
            .with_context(|| format!("failed to diff {} against its parent", commit.hash))?;

        let (adl_patches, code_patches) = self.route_patches(&patches);
        if adl_patches.is_empty() {
            return Ok(None);
        }
        self.adl_commits_seen += 1;

        let adl_patch = self.pick_adl_patch(&commit.hash, adl_patches);
        let Some(adl_diff) = normalize_file_patch(adl_patch) else {
            warn!(commit = %commit.hash, "ADL patch is not decodable; skipping record");
            return Ok(None);
        };

        // Older commits in the stream keep matching the pre-rename name.
        if let Some(previous) = &adl_diff.previous_path {
            self.tracked_adl_path = normalize_rel_path(previous).to_lowercase();
        }

        if adl_diff.hunks.is_empty() {
            warn!(
                commit = %commit.hash,
                status = %adl_diff.status,
                "ADL diff has no textual hunks; skipping record"
            );
            return Ok(None);
        }

        let code_diffs = normalize_code_patches(&code_patches);

        if adl_diff.stats.is_empty() && code_diffs.is_empty() {
            debug!(commit = %commit.hash, "no meaningful diffs; skipping record");
            return Ok(None);
        }

        let files_analyzed = dedup_paths(&code_diffs);
        let parent = self
            .gateway
            .commit_ref(parent_oid)
            .with_context(|| format!("failed to load parent of {}", commit.hash))?;
        let context_signals = collect_context_signals(
            self.gateway,
            &parent,
            &files_analyzed,
            self.config.context_days,
        );

        debug!(
            commit = %commit.hash,
            code_diffs = code_diffs.len(),
            "assembled record"
        );

        Ok(Some(Record {
            intent: Intent {
                message: commit.message.clone(),
                source: IntentSource::CommitMessage,
            },
            commit,
            adl_diff,
            code_diffs,
            context_signals,
            metadata: Metadata {
                dataset_version: DATASET_VERSION.to_string(),
                generated_at: utc_now_seconds(),
            },
        }))
    }

    fn route_patches<'p>(
        &self,
        patches: &'p [FilePatch],
    ) -> (Vec<&'p FilePatch>, Vec<&'p FilePatch>) {
        let matcher = ExactPathMatcher::new(&self.tracked_adl_path);
        route_patches(patches, &matcher, &self.config.code_extensions)
    }

    /// Keep one ADL patch: first by path ascending when case-variant
    /// oddities produce several matches.
    fn pick_adl_patch<'p>(
        &self,
        commit_hash: &str,
        mut candidates: Vec<&'p FilePatch>,
    ) -> &'p FilePatch {
        if candidates.len() > 1 {
            warn!(
                commit = %commit_hash,
                matches = candidates.len(),
                "multiple patches matched the ADL path; keeping the first by path"
            );
            candidates.sort_by(|a, b| {
                let key_a = a.new_path.as_deref().or(a.old_path.as_deref()).unwrap_or("");
                let key_b = b.new_path.as_deref().or(b.old_path.as_deref()).unwrap_or("");
                key_a.cmp(key_b)
            });
        }
        candidates[0]
    }
}

/// Split raw patches into the ADL channel and the code channel.
///
/// A patch whose pre- or post-image path matches the ADL predicate is
/// routed to the ADL channel; otherwise its post-image extension
/// decides code-channel membership; everything else is dropped.
pub fn route_patches<'p>(
    patches: &'p [FilePatch],
    matcher: &dyn AdlMatcher,
    code_extensions: &[String],
) -> (Vec<&'p FilePatch>, Vec<&'p FilePatch>) {
    let mut adl = Vec::new();
    let mut code = Vec::new();
    for patch in patches {
        let new_path = patch.new_path.as_deref().unwrap_or("");
        let old_path = patch.old_path.as_deref().unwrap_or("");
        if matcher.matches(new_path) || matcher.matches(old_path) {
            adl.push(patch);
            continue;
        }
        let candidate = if new_path.is_empty() { old_path } else { new_path };
        if candidate.is_empty() {
            continue;
        }
        let extension = extension_of(candidate);
        if !extension.is_empty() && code_extensions.contains(&extension) {
            code.push(patch);
        }
    }
    (adl, code)
}

/// Normalize the code channel, dropping undecodable files (already
/// warned about) and files that carry no textual hunks.
fn normalize_code_patches(patches: &[&FilePatch]) -> Vec<FileChange> {
    let mut changes = Vec::new();
    for patch in patches {
        match normalize_file_patch(patch) {
            Some(change) if !change.hunks.is_empty() => changes.push(change),
            Some(_) | None => {}
        }
    }
    changes
}

/// Post-image paths in order, deduplicated on first occurrence.
fn dedup_paths(code_diffs: &[FileChange]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut paths = Vec::new();
    for change in code_diffs {
        if seen.insert(change.path.clone()) {
            paths.push(change.path.clone());
        }
    }
    paths
}

/// Drive one mining run: enumerate, order, assemble, emit.
///
/// Emission order is (committed_at desc, hash asc). The interrupt flag
/// is polled between commits; on interrupt the emitter is flushed and
/// the run fails, so no partial record is ever written.
pub fn run<W: Write>(
    gateway: &Gateway,
    config: &MineConfig,
    emitter: &mut JsonlEmitter<W>,
    interrupt: &AtomicBool,
) -> Result<MineStats> {
    info!(adl_file = %config.adl_file, "scanning for commits that changed the ADL file");
    info!(days = config.context_days, "context window");

    let mut commits = gateway
        .head_commits()
        .context("failed to enumerate commits from HEAD")?;
    commits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut assembler = Assembler::new(gateway, config);
    let mut stats = MineStats::default();

    for (oid, _committed_at) in commits {
        if interrupt.load(Ordering::SeqCst) {
            emitter.flush()?;
            bail!("interrupted; {} records flushed", stats.records_emitted);
        }
        stats.commits_scanned += 1;
        if let Some(record) = assembler.assemble(oid)? {
            emitter
                .emit(&record)
                .context("failed to write record to sink")?;
            stats.records_emitted += 1;
        }
    }
    stats.adl_commits = assembler.adl_commits_seen();

    if stats.adl_commits == 0 {
        warn!(adl_file = %config.adl_file, "no commits found that modified the ADL file");
    }
    info!(
        records = stats.records_emitted,
        commits = stats.commits_scanned,
        "mining complete"
    );
    Ok(stats)
}
