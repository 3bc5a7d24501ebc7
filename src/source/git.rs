//! Git source-control collaborator
//!
//! Implements checkout reconciliation for the lifecycle engine: clone when
//! absent, fetch and move to the pinned revision or branch when present,
//! detect (never discard) local modifications, and migrate clones that
//! still point at a historical remote URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::build::RepoBuilder;
use git2::{Repository, StatusOptions};
use tokio::task;
use tracing::{debug, info, warn};

use crate::source::error::{Result, SourceError};
use crate::target::RepoSpec;

/// Outcome of reconciling an existing working copy.
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub changed: bool,
    pub remote_migrated: bool,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        branch: Option<&str>,
        revision: Option<&str>,
    ) -> Result<()>;

    async fn update(&self, dest: &Path, spec: &RepoSpec) -> Result<UpdateOutcome>;

    async fn has_local_changes(&self, dest: &Path, subpath: &str) -> Result<bool>;
}

pub struct GitSource;

#[async_trait]
impl SourceControl for GitSource {
    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        branch: Option<&str>,
        revision: Option<&str>,
    ) -> Result<()> {
        let url = url.to_string();
        let dest = dest.to_path_buf();
        let branch = branch.map(str::to_string);
        let revision = revision.map(str::to_string);
        run_blocking(move || clone_sync(&url, &dest, branch.as_deref(), revision.as_deref())).await
    }

    async fn update(&self, dest: &Path, spec: &RepoSpec) -> Result<UpdateOutcome> {
        let dest = dest.to_path_buf();
        let spec = spec.clone();
        run_blocking(move || update_sync(&dest, &spec)).await
    }

    async fn has_local_changes(&self, dest: &Path, subpath: &str) -> Result<bool> {
        let dest = dest.to_path_buf();
        let subpath = subpath.to_string();
        run_blocking(move || has_local_changes_sync(&dest, &subpath)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| SourceError::Join(e.to_string()))?
}

fn clone_sync(url: &str, dest: &Path, branch: Option<&str>, revision: Option<&str>) -> Result<()> {
    info!("cloning {url} into {}", dest.display());
    let mut builder = RepoBuilder::new();
    if let Some(branch) = branch {
        builder.branch(branch);
    }
    let repo = builder
        .clone(url, dest)
        .map_err(|source| SourceError::CloneFailed {
            url: url.to_string(),
            dest: dest.to_path_buf(),
            source,
        })?;
    if let Some(revision) = revision {
        checkout_detached(&repo, dest, revision)?;
    }
    Ok(())
}

fn update_sync(dest: &Path, spec: &RepoSpec) -> Result<UpdateOutcome> {
    let repo = Repository::open(dest).map_err(|source| SourceError::Git {
        dest: dest.to_path_buf(),
        source,
    })?;
    let mut outcome = UpdateOutcome::default();

    reconcile_remote(&repo, dest, spec, &mut outcome)?;

    {
        let mut remote = repo
            .find_remote("origin")
            .map_err(|_| SourceError::MissingRemote {
                dest: dest.to_path_buf(),
            })?;
        let refspecs: &[&str] = &[];
        remote
            .fetch(refspecs, None, None)
            .map_err(|source| SourceError::Git {
                dest: dest.to_path_buf(),
                source,
            })?;
    }

    let dirty = {
        let paths = if spec.watch_paths.is_empty() {
            vec![".".to_string()]
        } else {
            spec.watch_paths.clone()
        };
        let mut dirty = false;
        for path in &paths {
            if has_local_changes_sync(dest, path)? {
                outcome.warnings.push(format!(
                    "local modifications under {path} of {}",
                    dest.display()
                ));
                dirty = true;
            }
        }
        dirty
    };

    if let Some(revision) = &spec.revision {
        if dirty {
            return Err(SourceError::LocalChangesConflict {
                dest: dest.to_path_buf(),
                subpath: outcome
                    .warnings
                    .first()
                    .cloned()
                    .unwrap_or_else(|| ".".to_string()),
                revision: revision.clone(),
            });
        }
        outcome.changed = checkout_detached(&repo, dest, revision)?;
    } else if let Some(branch) = &spec.default_branch {
        if dirty {
            warn!(
                "not updating {} to origin/{branch}: working copy has local modifications",
                dest.display()
            );
        } else {
            outcome.changed = checkout_detached(&repo, dest, &format!("origin/{branch}"))?;
        }
    } else {
        debug!(
            "no branch or revision pinned for {}; leaving working copy alone",
            dest.display()
        );
    }

    for warning in &outcome.warnings {
        warn!("{warning}");
    }
    Ok(outcome)
}

/// Compare the clone's origin against the expected URL. A historical URL is
/// migrated in place; anything else is an error the user must resolve.
fn reconcile_remote(
    repo: &Repository,
    dest: &Path,
    spec: &RepoSpec,
    outcome: &mut UpdateOutcome,
) -> Result<()> {
    let remote = repo
        .find_remote("origin")
        .map_err(|_| SourceError::MissingRemote {
            dest: dest.to_path_buf(),
        })?;
    let actual = remote.url().unwrap_or("").to_string();
    if urls_equivalent(&actual, &spec.url) {
        return Ok(());
    }
    let is_legacy = spec.old_urls.iter().any(|old| urls_equivalent(&actual, old));
    if is_legacy {
        info!(
            "migrating remote of {} from legacy URL {actual} to {}",
            dest.display(),
            spec.url
        );
        repo.remote_set_url("origin", &spec.url)
            .map_err(|source| SourceError::Git {
                dest: dest.to_path_buf(),
                source,
            })?;
        outcome.remote_migrated = true;
        return Ok(());
    }
    Err(SourceError::DivergedRemote {
        dest: dest.to_path_buf(),
        expected: spec.url.clone(),
        actual,
    })
}

/// Move the working copy to `revision` (detached). Returns whether HEAD
/// actually moved.
fn checkout_detached(repo: &Repository, dest: &Path, revision: &str) -> Result<bool> {
    let object = repo
        .revparse_single(revision)
        .map_err(|source| SourceError::BadRevision {
            dest: dest.to_path_buf(),
            revision: revision.to_string(),
            source,
        })?;
    let target = object.peel_to_commit().map_err(|source| SourceError::Git {
        dest: dest.to_path_buf(),
        source,
    })?;
    let already_there = repo
        .head()
        .ok()
        .and_then(|h| h.target())
        .map(|id| id == target.id())
        .unwrap_or(false);
    if already_there {
        return Ok(false);
    }
    repo.checkout_tree(&object, None)
        .and_then(|_| repo.set_head_detached(target.id()))
        .map_err(|source| SourceError::Git {
            dest: dest.to_path_buf(),
            source,
        })?;
    Ok(true)
}

fn has_local_changes_sync(dest: &Path, subpath: &str) -> Result<bool> {
    let repo = Repository::open(dest).map_err(|source| SourceError::Git {
        dest: dest.to_path_buf(),
        source,
    })?;
    let mut opts = StatusOptions::new();
    opts.include_untracked(false).include_ignored(false);
    if subpath != "." {
        opts.pathspec(subpath);
    }
    let statuses = repo
        .statuses(Some(&mut opts))
        .map_err(|source| SourceError::Git {
            dest: dest.to_path_buf(),
            source,
        })?;
    Ok(!statuses.is_empty())
}

/// Normalise a remote URL for equivalence checks: scheme, credentials,
/// trailing `.git` and case of the host are irrelevant; scp-style syntax
/// compares equal to its https equivalent.
pub fn normalize_remote_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    if let Ok(parsed) = url::Url::parse(trimmed) {
        if let Some(host) = parsed.host_str() {
            return format!("{}{}", host.to_ascii_lowercase(), parsed.path());
        }
    }
    // scp-like syntax: git@host:owner/repo
    if let Some((user_host, path)) = trimmed.split_once(':') {
        let host = user_host.rsplit('@').next().unwrap_or(user_host);
        return format!("{}/{}", host.to_ascii_lowercase(), path.trim_start_matches('/'));
    }
    trimmed.to_ascii_lowercase()
}

pub fn urls_equivalent(a: &str, b: &str) -> bool {
    normalize_remote_url(a) == normalize_remote_url(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scp_and_https_spellings_are_equivalent() {
        assert!(urls_equivalent(
            "git@github.com:qemu/qemu.git",
            "https://github.com/qemu/qemu.git"
        ));
        assert!(urls_equivalent(
            "ssh://git@github.com/qemu/qemu.git",
            "https://github.com/qemu/qemu"
        ));
    }

    #[test]
    fn different_repositories_are_not_equivalent() {
        assert!(!urls_equivalent(
            "https://github.com/qemu/qemu.git",
            "https://github.com/forks/qemu.git"
        ));
    }

    #[test]
    fn trailing_git_and_slash_are_ignored() {
        assert_eq!(
            normalize_remote_url("https://git.qemu.org/git/qemu.git/"),
            "git.qemu.org/git/qemu"
        );
    }

    #[tokio::test]
    async fn fresh_repository_has_no_local_changes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        // A commit so HEAD resolves.
        {
            let sig = git2::Signature::now("forge", "forge@example.com").unwrap();
            let tree_id = {
                let mut index = repo.index().unwrap();
                index.write_tree().unwrap()
            };
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        let changed = GitSource
            .has_local_changes(dir.path(), ".")
            .await
            .unwrap();
        assert!(!changed);
    }
}
