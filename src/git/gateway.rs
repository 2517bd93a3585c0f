//! Repository gateway over libgit2
//!
//! Opens a repository, enumerates commits reachable from HEAD, extracts
//! commit metadata, and produces per-file textual patches with rename
//! detection. Also offers the path-scoped historical walk the context
//! miner runs per emitted record.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use git2::{Commit, Delta, DiffFindOptions, DiffOptions, Oid, Patch, Repository, Sort};
use thiserror::Error;
use tracing::{debug, warn};

use super::normalize_rel_path;
use crate::models::{Actor, ChangeStatus, CommitRef};

/// Rename similarity threshold in percent (the Git default).
pub const RENAME_SIMILARITY: u16 = 50;

/// Errors surfaced by the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("path {path:?} is not inside a Git repository: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
}

/// One file of a raw patch between two trees.
///
/// `text` holds the unified patch bytes for the file (empty when the
/// file is binary); decoding and hunk structuring happen downstream.
#[derive(Debug, Clone)]
pub struct FilePatch {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub status: ChangeStatus,
    pub is_binary: bool,
    pub text: Vec<u8>,
}

/// Gateway over one open repository.
pub struct Gateway {
    repo: Repository,
}

impl Gateway {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self, GatewayError> {
        let repo = Repository::discover(path).map_err(|source| GatewayError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(git_dir = %repo.path().display(), "opened git repository");
        Ok(Self { repo })
    }

    /// All commits reachable from HEAD, as (id, committer time) pairs.
    ///
    /// The walk is topological; callers impose their own total order on
    /// the returned list.
    pub fn head_commits(&self) -> Result<Vec<(Oid, DateTime<Utc>)>, GatewayError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL)?;
        if let Err(error) = revwalk.push_head() {
            if matches!(
                error.code(),
                git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
            ) {
                warn!("repository has no HEAD; nothing to mine");
                return Ok(Vec::new());
            }
            return Err(error.into());
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            commits.push((oid, instant(commit.time().seconds())));
        }
        Ok(commits)
    }

    /// Resolve a commit id into a full [`CommitRef`].
    pub fn commit_ref(&self, oid: Oid) -> Result<CommitRef, GatewayError> {
        let commit = self.repo.find_commit(oid)?;
        Ok(self.commit_ref_of(&commit))
    }

    fn commit_ref_of(&self, commit: &Commit<'_>) -> CommitRef {
        let author_sig = commit.author();
        let committer_sig = commit.committer();

        let author = Actor {
            name: author_sig.name().unwrap_or("").to_string(),
            email: author_sig.email().unwrap_or("").to_string(),
        };
        // A committer with blank identity falls back to the author.
        let committer = Actor {
            name: match committer_sig.name() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => author.name.clone(),
            },
            email: match committer_sig.email() {
                Some(email) if !email.is_empty() => email.to_string(),
                _ => author.email.clone(),
            },
        };

        CommitRef {
            hash: commit.id().to_string(),
            parent_hash: commit
                .parent_id(0)
                .map(|id| id.to_string())
                .unwrap_or_default(),
            authored_at: instant(author_sig.when().seconds()),
            committed_at: instant(commit.time().seconds()),
            author,
            committer,
            is_merge: commit.parent_count() > 1,
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
        }
    }

    /// Per-file textual patches between `parent` and `child`.
    ///
    /// Three context lines, one interhunk line, typechanges included,
    /// rename detection at [`RENAME_SIMILARITY`]. Binary files come back
    /// flagged with empty patch text.
    pub fn patch(&self, parent: Oid, child: Oid) -> Result<Vec<FilePatch>, GatewayError> {
        let parent_tree = self.repo.find_commit(parent)?.tree()?;
        let child_tree = self.repo.find_commit(child)?.tree()?;

        let mut opts = DiffOptions::new();
        opts.context_lines(3)
            .interhunk_lines(1)
            .include_typechange(true);

        let mut diff = self.repo.diff_tree_to_tree(
            Some(&parent_tree),
            Some(&child_tree),
            Some(&mut opts),
        )?;
        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true).rename_threshold(RENAME_SIMILARITY);
        diff.find_similar(Some(&mut find_opts))?;

        let mut patches = Vec::new();
        for idx in 0..diff.deltas().len() {
            match Patch::from_diff(&diff, idx)? {
                Some(mut patch) => {
                    let (old_path, new_path, status, is_binary) = {
                        let delta = patch.delta();
                        (
                            delta
                                .old_file()
                                .path()
                                .map(|p| p.to_string_lossy().into_owned()),
                            delta
                                .new_file()
                                .path()
                                .map(|p| p.to_string_lossy().into_owned()),
                            change_status(delta.status()),
                            delta.flags().is_binary(),
                        )
                    };
                    let text = if is_binary {
                        Vec::new()
                    } else {
                        patch.to_buf()?.to_vec()
                    };
                    patches.push(FilePatch {
                        old_path,
                        new_path,
                        status,
                        is_binary,
                        text,
                    });
                }
                None => {
                    // No textual content could be produced for this delta.
                    let delta = diff
                        .get_delta(idx)
                        .ok_or_else(|| git2::Error::from_str("diff delta disappeared"))?;
                    patches.push(FilePatch {
                        old_path: delta
                            .old_file()
                            .path()
                            .map(|p| p.to_string_lossy().into_owned()),
                        new_path: delta
                            .new_file()
                            .path()
                            .map(|p| p.to_string_lossy().into_owned()),
                        status: change_status(delta.status()),
                        is_binary: true,
                        text: Vec::new(),
                    });
                }
            }
        }
        Ok(patches)
    }

    /// Commits reachable from `anchor` (inclusive, first-parent walk)
    /// whose first-parent diff touches `path`, with committer time in
    /// `[since, until]`.
    ///
    /// When a rename delta's post-image is the tracked path, the walk
    /// continues on the pre-image path so history is not truncated at
    /// the rename boundary. Matching is case-insensitive on normalized
    /// paths. Root commits diff against the empty tree.
    pub fn history_for_path(
        &self,
        anchor: Oid,
        path: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CommitRef>, GatewayError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;
        revwalk.simplify_first_parent()?;
        revwalk.push(anchor)?;

        let mut tracked = normalize_rel_path(path).to_lowercase();
        let mut hits = Vec::new();

        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            let committed_at = instant(commit.time().seconds());
            if committed_at > until {
                continue;
            }
            if committed_at < since {
                // The walk is time-sorted; everything older is out of window.
                break;
            }

            let commit_tree = commit.tree()?;
            let parent_tree = match commit.parent(0) {
                Ok(parent) => Some(parent.tree()?),
                Err(_) => None,
            };
            let mut diff = self.repo.diff_tree_to_tree(
                parent_tree.as_ref(),
                Some(&commit_tree),
                None,
            )?;
            let mut find_opts = DiffFindOptions::new();
            find_opts.renames(true).rename_threshold(RENAME_SIMILARITY);
            diff.find_similar(Some(&mut find_opts))?;

            let mut touched = false;
            let mut rename_source: Option<String> = None;
            for delta in diff.deltas() {
                let new_path = delta
                    .new_file()
                    .path()
                    .map(|p| normalize_rel_path(&p.to_string_lossy()).to_lowercase());
                let old_path = delta
                    .old_file()
                    .path()
                    .map(|p| normalize_rel_path(&p.to_string_lossy()).to_lowercase());
                let new_match = new_path.as_deref() == Some(tracked.as_str());
                let old_match = old_path.as_deref() == Some(tracked.as_str());
                if !new_match && !old_match {
                    continue;
                }
                touched = true;
                if delta.status() == Delta::Renamed && new_match && !old_match {
                    rename_source = old_path;
                }
                break;
            }

            if touched {
                hits.push(self.commit_ref_of(&commit));
                if let Some(source) = rename_source {
                    tracked = source;
                }
            }
        }
        Ok(hits)
    }
}

/// Map a libgit2 delta status onto the record's status vocabulary.
fn change_status(delta: Delta) -> ChangeStatus {
    match delta {
        Delta::Added | Delta::Copied => ChangeStatus::Added,
        Delta::Deleted => ChangeStatus::Deleted,
        Delta::Renamed => ChangeStatus::Renamed,
        _ => ChangeStatus::Modified,
    }
}

fn instant(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Signature, Time};
    use std::fs;
    use tempfile::tempdir;

    const DAY: i64 = 86_400;
    const BASE: i64 = 1_704_096_000; // 2024-01-01T08:00:00Z

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        (dir, repo)
    }

    fn commit_changes(
        repo: &Repository,
        writes: &[(&str, &[u8])],
        removes: &[&str],
        message: &str,
        author: (&str, &str),
        when: i64,
    ) -> Oid {
        let sig = Signature::new(author.0, author.1, &Time::new(when, 0)).unwrap();
        let mut index = repo.index().unwrap();
        for (rel_path, content) in writes {
            let full = repo.workdir().unwrap().join(rel_path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, content).unwrap();
            index.add_path(Path::new(rel_path)).unwrap();
        }
        for rel_path in removes {
            index.remove_path(Path::new(rel_path)).unwrap();
        }
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_open_discovers_repository() {
        let (dir, _repo) = init_repo();
        assert!(Gateway::open(dir.path()).is_ok());
    }

    #[test]
    fn test_open_fails_outside_repository() {
        let dir = tempdir().unwrap();
        match Gateway::open(dir.path()) {
            Err(GatewayError::Open { path, .. }) => assert_eq!(path, dir.path()),
            other => panic!("expected Open error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_commit_ref_root_has_empty_parent() {
        let (dir, repo) = init_repo();
        let root = commit_changes(
            &repo,
            &[("adl.yaml", b"name: svc\n")],
            &[],
            "seed adl\n",
            ("Ada Lovelace", "ada@example.com"),
            BASE,
        );
        let gateway = Gateway::open(dir.path()).unwrap();
        let commit = gateway.commit_ref(root).unwrap();
        assert_eq!(commit.parent_hash, "");
        assert!(!commit.is_merge);
        assert_eq!(commit.author.email, "ada@example.com");
        assert_eq!(commit.committer.email, "ada@example.com");
        assert_eq!(commit.message, "seed adl\n");
        assert_eq!(
            commit.committed_at,
            Utc.timestamp_opt(BASE, 0).single().unwrap()
        );
    }

    #[test]
    fn test_head_commits_on_unborn_head_is_empty() {
        let (dir, _repo) = init_repo();
        let gateway = Gateway::open(dir.path()).unwrap();
        assert!(gateway.head_commits().unwrap().is_empty());
    }

    #[test]
    fn test_head_commits_covers_reachable_history() {
        let (dir, repo) = init_repo();
        commit_changes(
            &repo,
            &[("adl.yaml", b"v1\n")],
            &[],
            "one",
            ("A", "a@example.com"),
            BASE,
        );
        commit_changes(
            &repo,
            &[("adl.yaml", b"v2\n")],
            &[],
            "two",
            ("A", "a@example.com"),
            BASE + DAY,
        );
        let gateway = Gateway::open(dir.path()).unwrap();
        let commits = gateway.head_commits().unwrap();
        assert_eq!(commits.len(), 2);
    }

    #[test]
    fn test_patch_reports_modified_file() {
        let (dir, repo) = init_repo();
        let parent = commit_changes(
            &repo,
            &[("svc/config.py", b"VALUE = 1\nNAME = 'svc'\n")],
            &[],
            "seed",
            ("A", "a@example.com"),
            BASE,
        );
        let child = commit_changes(
            &repo,
            &[("svc/config.py", b"VALUE = 2\nNAME = 'svc'\n")],
            &[],
            "bump value",
            ("A", "a@example.com"),
            BASE + DAY,
        );
        let gateway = Gateway::open(dir.path()).unwrap();
        let patches = gateway.patch(parent, child).unwrap();
        assert_eq!(patches.len(), 1);
        let patch = &patches[0];
        assert_eq!(patch.status, ChangeStatus::Modified);
        assert_eq!(patch.new_path.as_deref(), Some("svc/config.py"));
        assert!(!patch.is_binary);
        let text = std::str::from_utf8(&patch.text).unwrap();
        assert!(text.contains("-VALUE = 1"));
        assert!(text.contains("+VALUE = 2"));
    }

    #[test]
    fn test_patch_detects_rename() {
        let (dir, repo) = init_repo();
        let body = "components:\n  - api\n  - worker\n  - scheduler\nversion: 1\n";
        let parent = commit_changes(
            &repo,
            &[("adl.yaml", body.as_bytes())],
            &[],
            "seed",
            ("A", "a@example.com"),
            BASE,
        );
        let renamed = body.replace("version: 1", "version: 2");
        let child = commit_changes(
            &repo,
            &[("architectures/decisions.yaml", renamed.as_bytes())],
            &["adl.yaml"],
            "move adl",
            ("A", "a@example.com"),
            BASE + DAY,
        );
        let gateway = Gateway::open(dir.path()).unwrap();
        let patches = gateway.patch(parent, child).unwrap();
        assert_eq!(patches.len(), 1);
        let patch = &patches[0];
        assert_eq!(patch.status, ChangeStatus::Renamed);
        assert_eq!(patch.old_path.as_deref(), Some("adl.yaml"));
        assert_eq!(
            patch.new_path.as_deref(),
            Some("architectures/decisions.yaml")
        );
    }

    #[test]
    fn test_patch_flags_binary_file() {
        let (dir, repo) = init_repo();
        let parent = commit_changes(
            &repo,
            &[("blob.bin", &[0u8, 159, 146, 150][..])],
            &[],
            "seed blob",
            ("A", "a@example.com"),
            BASE,
        );
        let child = commit_changes(
            &repo,
            &[("blob.bin", &[0u8, 1, 2, 3, 4][..])],
            &[],
            "update blob",
            ("A", "a@example.com"),
            BASE + DAY,
        );
        let gateway = Gateway::open(dir.path()).unwrap();
        let patches = gateway.patch(parent, child).unwrap();
        assert_eq!(patches.len(), 1);
        assert!(patches[0].is_binary);
        assert!(patches[0].text.is_empty());
    }

    #[test]
    fn test_history_for_path_filters_by_window() {
        let (dir, repo) = init_repo();
        commit_changes(
            &repo,
            &[("svc/api.py", b"v1\n")],
            &[],
            "old change",
            ("A", "a@example.com"),
            BASE,
        );
        commit_changes(
            &repo,
            &[("svc/api.py", b"v2\n")],
            &[],
            "recent change",
            ("B", "b@example.com"),
            BASE + 10 * DAY,
        );
        let anchor = commit_changes(
            &repo,
            &[("README.md", b"docs\n")],
            &[],
            "docs",
            ("C", "c@example.com"),
            BASE + 12 * DAY,
        );

        let gateway = Gateway::open(dir.path()).unwrap();
        let until = Utc.timestamp_opt(BASE + 12 * DAY, 0).single().unwrap();
        let since = until - chrono::Duration::days(5);
        let hits = gateway
            .history_for_path(anchor, "svc/api.py", since, until)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].author.email, "b@example.com");

        let wide_since = until - chrono::Duration::days(30);
        let hits = gateway
            .history_for_path(anchor, "svc/api.py", wide_since, until)
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_history_for_path_follows_renames() {
        let (dir, repo) = init_repo();
        let body = "def handler():\n    return 1\n\n\ndef helper():\n    return 2\n";
        commit_changes(
            &repo,
            &[("svc/old_name.py", body.as_bytes())],
            &[],
            "seed module",
            ("A", "a@example.com"),
            BASE,
        );
        commit_changes(
            &repo,
            &[("svc/new_name.py", body.as_bytes())],
            &["svc/old_name.py"],
            "rename module",
            ("B", "b@example.com"),
            BASE + 2 * DAY,
        );
        let anchor = commit_changes(
            &repo,
            &[("svc/new_name.py", body.replace("return 2", "return 3").as_bytes())],
            &[],
            "tweak helper",
            ("C", "c@example.com"),
            BASE + 4 * DAY,
        );

        let gateway = Gateway::open(dir.path()).unwrap();
        let until = Utc.timestamp_opt(BASE + 4 * DAY, 0).single().unwrap();
        let since = until - chrono::Duration::days(30);
        let hits = gateway
            .history_for_path(anchor, "svc/new_name.py", since, until)
            .unwrap();
        // Seed, rename, and tweak all count; the walk crossed the rename.
        assert_eq!(hits.len(), 3);
        let emails: Vec<&str> = hits.iter().map(|c| c.author.email.as_str()).collect();
        assert_eq!(emails, vec!["c@example.com", "b@example.com", "a@example.com"]);
    }

    #[test]
    fn test_history_for_path_matches_case_insensitively() {
        let (dir, repo) = init_repo();
        let anchor = commit_changes(
            &repo,
            &[("Docs/Guide.md", b"hello\n")],
            &[],
            "seed docs",
            ("A", "a@example.com"),
            BASE,
        );
        let gateway = Gateway::open(dir.path()).unwrap();
        let until = Utc.timestamp_opt(BASE, 0).single().unwrap();
        let since = until - chrono::Duration::days(1);
        let hits = gateway
            .history_for_path(anchor, "docs/guide.md", since, until)
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
