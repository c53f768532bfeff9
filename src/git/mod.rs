use crate::change::{normalize_path, reverse_changes, ChangeRecord, ChangeStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use git2::{Delta, DiffOptions, ErrorCode, Repository, Signature, Status, StatusOptions, Tree};
use std::fmt;
use std::path::{Path, PathBuf};

pub struct GitManager {
    repo: Option<Repository>,
    project_dir: PathBuf,
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEndpoint {
    Workspace,
    Head,
    Revision(String),
}

impl DiffEndpoint {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "workspace" | "" => DiffEndpoint::Workspace,
            "head" => DiffEndpoint::Head,
            _ => DiffEndpoint::Revision(trimmed.to_string()),
        }
    }

    fn revspec(&self) -> &str {
        match self {
            DiffEndpoint::Head => "HEAD",
            DiffEndpoint::Revision(spec) => spec,
            DiffEndpoint::Workspace => "",
        }
    }
}

impl fmt::Display for DiffEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffEndpoint::Workspace => f.write_str("workspace"),
            DiffEndpoint::Head => f.write_str("HEAD"),
            DiffEndpoint::Revision(spec) => f.write_str(spec),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub message: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BranchInfo {
    pub name: String,
    pub last_commit: Option<CommitInfo>,
}

impl GitManager {
    pub fn new(project_dir: &Path) -> Result<Self> {
        let repo = Repository::discover(project_dir).ok();

        if let Some(ref r) = repo {
            tracing::info!("Git repository found at {:?}", r.path());
        } else {
            tracing::info!("No git repository found at {:?}", project_dir);
        }

        Ok(Self {
            repo,
            project_dir: project_dir.to_path_buf(),
        })
    }

    pub fn is_git_repo(&self) -> bool {
        self.repo.is_some()
    }

    /// Working tree root, falling back to the directory we were opened on.
    pub fn workdir(&self) -> PathBuf {
        self.repo
            .as_ref()
            .and_then(|r| r.workdir())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.project_dir.clone())
    }

    /// Changes from HEAD to the working copy, untracked files included.
    pub async fn status(&self) -> Result<Vec<ChangeRecord>> {
        let Some(repo) = &self.repo else {
            return Ok(Vec::new());
        };

        let statuses = repo
            .statuses(Some(
                StatusOptions::new()
                    .include_untracked(true)
                    .recurse_untracked_dirs(true)
                    .include_ignored(false),
            ))
            .context("failed to read repository status")?;

        let mut changes = Vec::new();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                tracing::warn!("Skipping status entry with non-utf8 path");
                continue;
            };
            if let Some(status) = classify_status(entry.status()) {
                changes.push(ChangeRecord::new(normalize_path(path), status));
            }
        }

        tracing::debug!("Status listed {} changes", changes.len());
        Ok(changes)
    }

    pub async fn diff(&self, left: &DiffEndpoint, right: &DiffEndpoint) -> Result<Vec<ChangeRecord>> {
        let Some(repo) = &self.repo else {
            return Ok(Vec::new());
        };

        let changes = match (left, right) {
            (DiffEndpoint::Workspace, DiffEndpoint::Workspace) => Vec::new(),
            (DiffEndpoint::Head, DiffEndpoint::Workspace) => self.status().await?,
            (DiffEndpoint::Workspace, DiffEndpoint::Head) => reverse_changes(&self.status().await?),
            (DiffEndpoint::Workspace, other) => {
                let tree = resolve_tree(repo, other)?;
                reverse_changes(&diff_tree_to_workdir(repo, &tree)?)
            }
            (other, DiffEndpoint::Workspace) => {
                let tree = resolve_tree(repo, other)?;
                diff_tree_to_workdir(repo, &tree)?
            }
            (l, r) => {
                let old_tree = resolve_tree(repo, l)?;
                let new_tree = resolve_tree(repo, r)?;
                let diff = repo.diff_tree_to_tree(
                    Some(&old_tree),
                    Some(&new_tree),
                    Some(&mut DiffOptions::new()),
                )?;
                collect_deltas(&diff)
            }
        };

        tracing::debug!("Diff {} -> {} listed {} changes", left, right, changes.len());
        Ok(changes)
    }

    pub fn current_branch(&self) -> Result<Option<BranchInfo>> {
        let Some(repo) = &self.repo else {
            return Ok(None);
        };

        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                let name = repo
                    .find_reference("HEAD")
                    .ok()
                    .and_then(|r| r.symbolic_target().map(str::to_string))
                    .map(|target| target.trim_start_matches("refs/heads/").to_string())
                    .unwrap_or_else(|| "HEAD".to_string());
                return Ok(Some(BranchInfo {
                    name,
                    last_commit: None,
                }));
            }
            Err(e) => return Err(e.into()),
        };

        let name = head.shorthand().unwrap_or("HEAD").to_string();
        let last_commit = head.peel_to_commit().ok().map(|commit| {
            let date = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
                .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            CommitInfo {
                hash: commit.id().to_string(),
                author: commit.author().name().unwrap_or("unknown").to_string(),
                date,
                message: commit
                    .message()
                    .unwrap_or_default()
                    .lines()
                    .map(str::to_string)
                    .collect(),
            }
        });

        Ok(Some(BranchInfo { name, last_commit }))
    }

    /// Stages `paths` (removing the ones gone from disk) and commits on HEAD.
    pub async fn commit(&self, message: &str, paths: &[String]) -> Result<String> {
        let repo = self
            .repo
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Not a git repository"))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| anyhow::anyhow!("Cannot commit in a bare repository"))?;

        let mut index = repo.index()?;
        for path in paths {
            let relative = Path::new(path);
            if workdir.join(relative).exists() {
                index.add_path(relative)?;
            } else {
                index.remove_path(relative)?;
            }
        }
        index.write()?;

        let signature = repo
            .signature()
            .or_else(|_| Signature::now("changeview", "changeview@localhost"))?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let commit_id = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;

        tracing::info!("Committed {} paths as {}", paths.len(), commit_id);
        Ok(commit_id.to_string())
    }
}

fn classify_status(flags: Status) -> Option<ChangeStatus> {
    if flags.contains(Status::IGNORED) {
        return None;
    }
    // Added to the index then removed from disk: nothing relative to HEAD.
    if flags.contains(Status::INDEX_NEW) && flags.contains(Status::WT_DELETED) {
        return None;
    }
    if flags.intersects(Status::INDEX_NEW | Status::WT_NEW) {
        return Some(ChangeStatus::Untracked);
    }
    if flags.intersects(Status::INDEX_DELETED | Status::WT_DELETED) {
        return Some(ChangeStatus::Deleted);
    }
    if flags.is_empty() || flags == Status::CURRENT {
        return None;
    }
    Some(ChangeStatus::Modified)
}

fn resolve_tree<'r>(repo: &'r Repository, endpoint: &DiffEndpoint) -> Result<Tree<'r>> {
    let spec = endpoint.revspec();
    repo.revparse_single(spec)
        .and_then(|object| object.peel_to_tree())
        .with_context(|| format!("cannot resolve {spec} to a tree"))
}

fn diff_tree_to_workdir(repo: &Repository, tree: &Tree<'_>) -> Result<Vec<ChangeRecord>> {
    let mut options = DiffOptions::new();
    options.include_untracked(true).recurse_untracked_dirs(true);
    let diff = repo.diff_tree_to_workdir_with_index(Some(tree), Some(&mut options))?;
    Ok(collect_deltas(&diff))
}

fn collect_deltas(diff: &git2::Diff<'_>) -> Vec<ChangeRecord> {
    diff.deltas()
        .filter_map(|delta| {
            let status = match delta.status() {
                Delta::Added | Delta::Untracked => ChangeStatus::Untracked,
                Delta::Deleted => ChangeStatus::Deleted,
                Delta::Unmodified | Delta::Ignored => return None,
                _ => ChangeStatus::Modified,
            };
            let path = delta.new_file().path().or_else(|| delta.old_file().path())?;
            Some(ChangeRecord::new(normalize_path(&path.to_string_lossy()), status))
        })
        .collect()
}
