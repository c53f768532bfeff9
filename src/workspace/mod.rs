use crate::change::ChangeSet;
use crate::config::GitConfig;
use crate::git::{BranchInfo, DiffEndpoint, GitManager};
use crate::tree::{build_tree, leaf_paths, TreeNode};
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRange {
    pub left: DiffEndpoint,
    pub right: DiffEndpoint,
}

impl DiffRange {
    pub fn new(left: &str, right: &str) -> Self {
        Self {
            left: DiffEndpoint::parse(left),
            right: DiffEndpoint::parse(right),
        }
    }

    pub fn swapped(&self) -> Self {
        Self {
            left: self.right.clone(),
            right: self.left.clone(),
        }
    }

    /// Only HEAD -> workspace describes what a commit would record.
    pub fn is_committable(&self) -> bool {
        self.left == DiffEndpoint::Head && self.right == DiffEndpoint::Workspace
    }
}

impl fmt::Display for DiffRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.left, self.right)
    }
}

pub struct WorkspaceManager {
    project_dir: PathBuf,
    git_manager: GitManager,
    range: DiffRange,
    changes: ChangeSet,
    tree: Vec<TreeNode>,
    branch: Option<BranchInfo>,
}

impl WorkspaceManager {
    pub fn new(project_dir: PathBuf, git: &GitConfig) -> Result<Self> {
        let git_manager = GitManager::new(&project_dir)?;

        Ok(Self {
            project_dir,
            git_manager,
            range: DiffRange::new(&git.default_left, &git.default_right),
            changes: ChangeSet::default(),
            tree: Vec::new(),
            branch: None,
        })
    }

    /// Lists the current range and rebuilds the tree from scratch.
    pub async fn refresh(&mut self) -> Result<()> {
        let records = self
            .git_manager
            .diff(&self.range.left, &self.range.right)
            .await
            .with_context(|| format!("failed to list changes for {}", self.range))?;

        let (changes, problems) = ChangeSet::from_records(records);
        for problem in &problems {
            tracing::warn!("Dropping change from {}: {}", self.range, problem);
        }
        self.tree = build_tree(changes.records());
        debug_assert_eq!(leaf_paths(&self.tree).len(), changes.len());
        self.changes = changes;
        self.branch = self.git_manager.current_branch().unwrap_or_else(|e| {
            tracing::warn!("Cannot read current branch: {}", e);
            None
        });

        tracing::info!(
            "Refreshed {}: {} changes, {} top-level nodes",
            self.range,
            self.changes.len(),
            self.tree.len()
        );
        Ok(())
    }

    pub async fn set_range(&mut self, range: DiffRange) -> Result<()> {
        self.range = range;
        self.refresh().await
    }

    pub async fn swap_range(&mut self) -> Result<()> {
        self.set_range(self.range.swapped()).await
    }

    /// Commits every listed change and refreshes.
    pub async fn commit(&mut self, message: &str) -> Result<String> {
        if !self.range.is_committable() {
            anyhow::bail!("Commits are only possible for HEAD → workspace, not {}", self.range);
        }
        if message.trim().is_empty() {
            anyhow::bail!("Commit message is empty");
        }
        if self.changes.is_empty() {
            anyhow::bail!("Nothing to commit");
        }

        let id = self
            .git_manager
            .commit(message, &self.changes.paths())
            .await?;
        self.refresh().await?;
        Ok(id)
    }

    pub fn tree(&self) -> &[TreeNode] {
        &self.tree
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn range(&self) -> &DiffRange {
        &self.range
    }

    pub fn branch(&self) -> Option<&BranchInfo> {
        self.branch.as_ref()
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn is_git_repo(&self) -> bool {
        self.git_manager.is_git_repo()
    }

    pub fn workdir(&self) -> PathBuf {
        self.git_manager.workdir()
    }

    pub fn project_name(&self) -> String {
        self.workdir()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.project_dir.display().to_string())
    }
}
