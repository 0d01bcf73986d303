// Path: crates/test_utils/src/repo.rs

//! On-disk bare repository fixtures.

use git2::{Repository, Signature};
use tempfile::TempDir;

/// A temporary repository root holding bare clones, one per repo name,
/// mirroring the server's on-disk layout.
pub struct RepoRoot {
    dir: TempDir,
}

impl RepoRoot {
    /// Creates an empty root.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap_or_else(|e| panic!("tempdir: {}", e)),
        }
    }

    /// The root path, suitable for `RemoteConfig::repo_root`.
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Initializes a bare repository under the root.
    pub fn init_bare(&self, name: &str) -> Repository {
        Repository::init_bare(self.dir.path().join(name))
            .unwrap_or_else(|e| panic!("init bare: {}", e))
    }
}

impl Default for RepoRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Commits a single file into a bare repository, updating `refname`, and
/// returns the new commit id. Parents are taken from the current target of
/// `refname` when it exists.
pub fn commit_file(
    repo: &Repository,
    refname: &str,
    path: &str,
    content: &[u8],
    message: &str,
) -> git2::Oid {
    let blob = repo.blob(content).unwrap_or_else(|e| panic!("blob: {}", e));

    let parent = repo
        .find_reference(refname)
        .ok()
        .and_then(|r| r.target())
        .and_then(|oid| repo.find_commit(oid).ok());

    let mut builder = match &parent {
        Some(commit) => repo
            .treebuilder(Some(&commit.tree().unwrap_or_else(|e| panic!("tree: {}", e))))
            .unwrap_or_else(|e| panic!("treebuilder: {}", e)),
        None => repo
            .treebuilder(None)
            .unwrap_or_else(|e| panic!("treebuilder: {}", e)),
    };
    builder
        .insert(path, blob, 0o100_644)
        .unwrap_or_else(|e| panic!("tree insert: {}", e));
    let tree_oid = builder.write().unwrap_or_else(|e| panic!("tree write: {}", e));
    let tree = repo
        .find_tree(tree_oid)
        .unwrap_or_else(|e| panic!("find tree: {}", e));

    let sig = Signature::now("gitmesh-test", "test@gitmesh.invalid")
        .unwrap_or_else(|e| panic!("signature: {}", e));
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some(refname), &sig, &sig, message, &tree, &parents)
        .unwrap_or_else(|e| panic!("commit: {}", e))
}
