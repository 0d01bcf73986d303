// Path: crates/remote/src/repo.rs

//! Bare-repository helpers.
//!
//! Repositories live as standard bare clones under `<root>/<name>`; no
//! private on-disk format is introduced. Everything here maps `git2`
//! failures into [`PushError::Repo`] so the pipeline stays free of git2
//! error types.

use git2::{ObjectType, Oid, Repository};
use gitmesh_types::error::PushError;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// The all-zero hash naming an absent reference.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000";

fn repo_err(e: git2::Error) -> PushError {
    PushError::Repo(e.message().to_string())
}

/// The on-disk path of a named repository.
pub fn repo_path(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

/// Opens the bare clone of a named repository.
pub fn open_bare(root: &Path, name: &str) -> Result<Repository, PushError> {
    Repository::open_bare(repo_path(root, name)).map_err(repo_err)
}

/// The locally observed hash of a reference; [`ZERO_HASH`] when absent.
pub fn ref_hash(repo: &Repository, name: &str) -> Result<String, PushError> {
    match repo.find_reference(name) {
        Ok(reference) => Ok(reference
            .target()
            .map(|oid| oid.to_string())
            .unwrap_or_else(|| ZERO_HASH.to_string())),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(ZERO_HASH.to_string()),
        Err(e) => Err(repo_err(e)),
    }
}

/// Returns true when the object is present in the repository's database.
pub fn object_exists(repo: &Repository, hash: &str) -> bool {
    Oid::from_str(hash)
        .ok()
        .and_then(|oid| repo.odb().ok().map(|odb| odb.exists(oid)))
        .unwrap_or(false)
}

/// The subset of `objects` not present locally.
pub fn missing_objects(repo: &Repository, objects: &[String]) -> Vec<String> {
    objects
        .iter()
        .filter(|h| !object_exists(repo, h))
        .cloned()
        .collect()
}

/// The kind of an object, if present.
pub fn object_kind(repo: &Repository, hash: &str) -> Option<ObjectType> {
    let oid = Oid::from_str(hash).ok()?;
    let odb = repo.odb().ok()?;
    let obj = odb.read(oid).ok()?;
    Some(obj.kind())
}

/// Sums the uncompressed sizes of the named objects. Fails when any object
/// is missing: the caller must have fetched first.
pub fn objects_size(repo: &Repository, objects: &[String]) -> Result<u64, PushError> {
    let odb = repo.odb().map_err(repo_err)?;
    let mut total: u64 = 0;
    for hash in objects {
        let oid = Oid::from_str(hash)
            .map_err(|e| PushError::Validation(format!("bad object hash {}: {}", hash, e)))?;
        let obj = odb
            .read(oid)
            .map_err(|_| PushError::Repo(format!("object {} not found locally", hash)))?;
        total += obj.len() as u64;
    }
    Ok(total)
}

/// Collects the objects required to bring a reference from `old` to `new`:
/// the commits reachable from `new` but not `old`, with their trees and
/// blobs.
pub fn objects_between(
    repo: &Repository,
    old_hash: &str,
    new_hash: &str,
) -> Result<Vec<String>, PushError> {
    let mut out = Vec::new();
    let mut walk = repo.revwalk().map_err(repo_err)?;
    walk.push(Oid::from_str(new_hash).map_err(|e| PushError::Validation(e.to_string()))?)
        .map_err(repo_err)?;
    if old_hash != ZERO_HASH {
        let old = Oid::from_str(old_hash).map_err(|e| PushError::Validation(e.to_string()))?;
        if repo.find_commit(old).is_ok() {
            walk.hide(old).map_err(repo_err)?;
        }
    }

    for oid in walk {
        let oid = oid.map_err(repo_err)?;
        out.push(oid.to_string());
        let commit = repo.find_commit(oid).map_err(repo_err)?;
        let tree = commit.tree().map_err(repo_err)?;
        out.push(tree.id().to_string());
        tree.walk(git2::TreeWalkMode::PreOrder, |_, entry| {
            out.push(entry.id().to_string());
            git2::TreeWalkResult::Ok
        })
        .map_err(repo_err)?;
    }

    out.sort();
    out.dedup();
    Ok(out)
}

/// Captures the current targets of the named references.
pub fn capture_refs(
    repo: &Repository,
    names: impl IntoIterator<Item = String>,
) -> Result<HashMap<String, String>, PushError> {
    let mut saved = HashMap::new();
    for name in names {
        let hash = ref_hash(repo, &name)?;
        saved.insert(name, hash);
    }
    Ok(saved)
}

/// Restores references to previously captured targets. A captured
/// [`ZERO_HASH`] deletes the reference.
pub fn restore_refs(repo: &Repository, saved: &HashMap<String, String>) -> Result<(), PushError> {
    for (name, hash) in saved {
        if hash == ZERO_HASH {
            match repo.find_reference(name) {
                Ok(mut reference) => reference.delete().map_err(repo_err)?,
                Err(e) if e.code() == git2::ErrorCode::NotFound => {}
                Err(e) => return Err(repo_err(e)),
            }
        } else {
            let oid =
                Oid::from_str(hash).map_err(|e| PushError::Validation(e.to_string()))?;
            repo.reference(name, oid, true, "dry run rollback")
                .map_err(repo_err)?;
        }
    }
    Ok(())
}

/// Builds a packfile containing exactly the named objects.
pub fn build_pack(repo: &Repository, objects: &[String]) -> Result<Vec<u8>, PushError> {
    let mut builder = repo.packbuilder().map_err(repo_err)?;
    for hash in objects {
        let oid = Oid::from_str(hash)
            .map_err(|e| PushError::Validation(format!("bad object hash {}: {}", hash, e)))?;
        builder.insert_object(oid, None).map_err(repo_err)?;
    }
    let mut buf = git2::Buf::new();
    builder.write_buf(&mut buf).map_err(repo_err)?;
    Ok(buf.to_vec())
}

/// Indexes a received packfile into the repository's object database.
pub fn index_pack(repo: &Repository, pack: &[u8]) -> Result<(), PushError> {
    let odb = repo.odb().map_err(repo_err)?;
    let mut writer = odb.packwriter().map_err(repo_err)?;
    writer
        .write_all(pack)
        .map_err(|e| PushError::Repo(format!("pack write failed: {}", e)))?;
    writer.commit().map_err(repo_err)?;
    Ok(())
}

/// Runs `git <service> --stateless-rpc --advertise-refs`, producing the
/// bit-exact smart-HTTP reference advertisement for the repository.
pub async fn run_advertise_refs(
    repo_path: &Path,
    service: &str,
    timeout: Duration,
) -> Result<Vec<u8>, PushError> {
    let subcommand = service
        .strip_prefix("git-")
        .ok_or_else(|| PushError::Validation(format!("unknown service {}", service)))?;
    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new("git")
            .arg(subcommand)
            .arg("--stateless-rpc")
            .arg("--advertise-refs")
            .arg(repo_path)
            .output(),
    )
    .await
    .map_err(|_| PushError::Timeout(format!("{} --advertise-refs", service)))?
    .map_err(|e| PushError::Repo(format!("failed to spawn git: {}", e)))?;

    if !output.status.success() {
        return Err(PushError::Repo(format!(
            "{} advertisement failed: {}",
            service,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output.stdout)
}

/// Runs `git receive-pack --stateless-rpc` against the repository, feeding
/// `input` on stdin and returning its stdout.
///
/// The child is bounded by `timeout`; on expiry it is killed and the push
/// rejected.
pub async fn run_receive_pack(
    repo_path: &Path,
    input: Vec<u8>,
    timeout: Duration,
) -> Result<Vec<u8>, PushError> {
    let mut child = tokio::process::Command::new("git")
        .arg("receive-pack")
        .arg("--stateless-rpc")
        .arg(repo_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| PushError::DryRun(format!("failed to spawn git-receive-pack: {}", e)))?;

    let run = async {
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .map_err(|e| PushError::DryRun(format!("pipe to git-receive-pack: {}", e)))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| PushError::DryRun(format!("pipe to git-receive-pack: {}", e)))?;
        }

        let mut stdout = Vec::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_end(&mut stdout)
                .await
                .map_err(|e| PushError::DryRun(format!("read git-receive-pack: {}", e)))?;
        }
        let mut stderr = Vec::new();
        if let Some(mut err) = child.stderr.take() {
            let _ = err.read_to_end(&mut stderr).await;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| PushError::DryRun(e.to_string()))?;
        if !status.success() {
            return Err(PushError::DryRun(format!(
                "git-receive-pack exited with {}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(stdout)
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => {
            warn!(target: "push", "git-receive-pack timed out; killing process");
            Err(PushError::Timeout("git-receive-pack".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitmesh_test_utils::repo::{commit_file, RepoRoot};

    #[test]
    fn ref_hash_is_zero_for_missing_refs() {
        let root = RepoRoot::new();
        let repo = root.init_bare("repo1");
        assert_eq!(ref_hash(&repo, "refs/heads/master").unwrap(), ZERO_HASH);

        let oid = commit_file(&repo, "refs/heads/master", "a.txt", b"hello", "c1");
        assert_eq!(ref_hash(&repo, "refs/heads/master").unwrap(), oid.to_string());
    }

    #[test]
    fn objects_between_covers_commit_tree_and_blob() {
        let root = RepoRoot::new();
        let repo = root.init_bare("repo1");
        let c1 = commit_file(&repo, "refs/heads/master", "a.txt", b"one", "c1");
        let c2 = commit_file(&repo, "refs/heads/master", "b.txt", b"two", "c2");

        let objects = objects_between(&repo, &c1.to_string(), &c2.to_string()).unwrap();
        assert!(objects.contains(&c2.to_string()));
        assert!(!objects.contains(&c1.to_string()));
        // Commit, tree, and at least the new blob.
        assert!(objects.len() >= 3);

        let size = objects_size(&repo, &objects).unwrap();
        assert!(size > 0);
    }

    #[test]
    fn capture_and_restore_round_trips() {
        let root = RepoRoot::new();
        let repo = root.init_bare("repo1");
        let c1 = commit_file(&repo, "refs/heads/master", "a.txt", b"one", "c1");

        let saved =
            capture_refs(&repo, vec!["refs/heads/master".to_string()]).unwrap();
        commit_file(&repo, "refs/heads/master", "b.txt", b"two", "c2");
        assert_ne!(ref_hash(&repo, "refs/heads/master").unwrap(), c1.to_string());

        restore_refs(&repo, &saved).unwrap();
        assert_eq!(ref_hash(&repo, "refs/heads/master").unwrap(), c1.to_string());
    }

    #[test]
    fn restore_deletes_refs_created_during_dry_run() {
        let root = RepoRoot::new();
        let repo = root.init_bare("repo1");
        let saved =
            capture_refs(&repo, vec!["refs/heads/feature".to_string()]).unwrap();
        commit_file(&repo, "refs/heads/feature", "a.txt", b"one", "c1");

        restore_refs(&repo, &saved).unwrap();
        assert_eq!(ref_hash(&repo, "refs/heads/feature").unwrap(), ZERO_HASH);
    }

    #[test]
    fn pack_build_and_index_roundtrip() {
        let root = RepoRoot::new();
        let source = root.init_bare("source");
        let c1 = commit_file(&source, "refs/heads/master", "a.txt", b"data", "c1");
        let objects = objects_between(&source, ZERO_HASH, &c1.to_string()).unwrap();
        let pack = build_pack(&source, &objects).unwrap();

        let dest = root.init_bare("dest");
        assert!(missing_objects(&dest, &objects).len() == objects.len());
        index_pack(&dest, &pack).unwrap();
        assert!(missing_objects(&dest, &objects).is_empty());
    }
}
