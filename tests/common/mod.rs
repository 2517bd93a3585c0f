//! Deterministic on-disk fixture repositories for the scenario tests.
//!
//! Commits carry explicit author/committer timestamps so churn and
//! recency assertions are exact across runs and machines.

use std::fs;
use std::path::Path;

use git2::{Commit, Oid, Repository, Signature, Time};
use tempfile::TempDir;

pub const DAY: i64 = 86_400;
/// 2024-01-01T08:00:00Z
pub const BASE: i64 = 1_704_096_000;

pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn init() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Fixture Bot").unwrap();
            config.set_str("user.email", "fixture@example.com").unwrap();
        }
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stage writes/removes on the index and commit on HEAD.
    pub fn commit(
        &self,
        writes: &[(&str, &[u8])],
        removes: &[&str],
        message: &str,
        author: (&str, &str),
        when: i64,
    ) -> Oid {
        let head = self.repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<Oid> = head.iter().map(|c| c.id()).collect();
        self.commit_with_parents(writes, removes, message, author, when, &parents, true)
    }

    /// Stage writes/removes and commit with explicit parents.
    pub fn commit_with_parents(
        &self,
        writes: &[(&str, &[u8])],
        removes: &[&str],
        message: &str,
        author: (&str, &str),
        when: i64,
        parents: &[Oid],
        update_head: bool,
    ) -> Oid {
        let sig = Signature::new(author.0, author.1, &Time::new(when, 0)).unwrap();
        let mut index = self.repo.index().unwrap();
        for (rel_path, content) in writes {
            let full = self.repo.workdir().unwrap().join(rel_path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, content).unwrap();
            index.add_path(Path::new(rel_path)).unwrap();
        }
        for rel_path in removes {
            index.remove_path(Path::new(rel_path)).unwrap();
        }
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let parent_commits: Vec<Commit> = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid).unwrap())
            .collect();
        let parent_refs: Vec<&Commit> = parent_commits.iter().collect();
        let target = if update_head { Some("HEAD") } else { None };
        self.repo
            .commit(target, &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    /// Commit a root-level file edit on top of `base`'s tree without
    /// touching the index or HEAD; used to seed side branches.
    pub fn commit_tree_edit(
        &self,
        base: Oid,
        edits: &[(&str, &[u8])],
        message: &str,
        author: (&str, &str),
        when: i64,
    ) -> Oid {
        let sig = Signature::new(author.0, author.1, &Time::new(when, 0)).unwrap();
        let base_commit = self.repo.find_commit(base).unwrap();
        let base_tree = base_commit.tree().unwrap();
        let mut builder = self.repo.treebuilder(Some(&base_tree)).unwrap();
        for (name, content) in edits {
            let blob = self.repo.blob(content).unwrap();
            builder.insert(*name, blob, 0o100_644).unwrap();
        }
        let tree_id = builder.write().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        self.repo
            .commit(None, &sig, &sig, message, &tree, &[&base_commit])
            .unwrap()
    }
}
