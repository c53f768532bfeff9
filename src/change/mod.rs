use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Deleted,
    Modified,
    Untracked,
}

impl ChangeStatus {
    /// Status of the same change seen from the other side of the diff.
    pub fn reversed(self) -> Self {
        match self {
            ChangeStatus::Deleted => ChangeStatus::Untracked,
            ChangeStatus::Untracked => ChangeStatus::Deleted,
            ChangeStatus::Modified => ChangeStatus::Modified,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChangeStatus::Deleted => "Deleted",
            ChangeStatus::Modified => "Modified",
            ChangeStatus::Untracked => "Untracked",
        }
    }

    pub fn short(self) -> char {
        match self {
            ChangeStatus::Deleted => 'D',
            ChangeStatus::Modified => 'M',
            ChangeStatus::Untracked => 'U',
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: String,
    pub status: ChangeStatus,
}

impl ChangeRecord {
    pub fn new(path: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChangeError {
    #[error("change record has an empty path")]
    EmptyPath,

    #[error("path {path} listed as both {first} and {second}")]
    ConflictingStatus {
        path: String,
        first: ChangeStatus,
        second: ChangeStatus,
    },

    #[error("path {file} is a file but {nested} is listed beneath it")]
    FileDirectoryConflict { file: String, nested: String },
}

pub fn reverse_changes(changes: &[ChangeRecord]) -> Vec<ChangeRecord> {
    changes
        .iter()
        .map(|change| ChangeRecord::new(change.path.clone(), change.status.reversed()))
        .collect()
}

/// Forward slashes only, no leading `./`, no empty segments.
pub fn normalize_path(raw: &str) -> String {
    let slashed = raw.replace('\\', "/");
    let trimmed = slashed.strip_prefix("./").unwrap_or(&slashed);
    trimmed
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// A validated list of change records, safe to hand to the tree builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    records: Vec<ChangeRecord>,
}

impl ChangeSet {
    /// Normalizes paths and collapses identical duplicates. Records that
    /// would make the tree ambiguous are dropped and reported: an empty path,
    /// a second status for the same path (the first one wins), or a file
    /// listed above other changes (the file goes; that is how git reports a
    /// tracked file replaced by a directory).
    pub fn from_records(records: Vec<ChangeRecord>) -> (Self, Vec<ChangeError>) {
        let mut problems = Vec::new();
        let mut seen: HashMap<String, ChangeStatus> = HashMap::new();
        let mut normalized = Vec::with_capacity(records.len());

        for record in records {
            let path = normalize_path(&record.path);
            if path.is_empty() {
                problems.push(ChangeError::EmptyPath);
                continue;
            }

            match seen.get(&path) {
                Some(&first) if first != record.status => {
                    problems.push(ChangeError::ConflictingStatus {
                        path,
                        first,
                        second: record.status,
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(path.clone(), record.status);
                    normalized.push(ChangeRecord::new(path, record.status));
                }
            }
        }

        // file path -> first change found beneath it
        let mut shadowed: HashMap<String, String> = HashMap::new();
        for record in &normalized {
            let mut prefix_end = record.path.len();
            while let Some(idx) = record.path[..prefix_end].rfind('/') {
                let prefix = &record.path[..idx];
                if seen.contains_key(prefix) {
                    shadowed
                        .entry(prefix.to_string())
                        .or_insert_with(|| record.path.clone());
                }
                prefix_end = idx;
            }
        }

        normalized.retain(|record| match shadowed.remove(&record.path) {
            Some(nested) => {
                problems.push(ChangeError::FileDirectoryConflict {
                    file: record.path.clone(),
                    nested,
                });
                false
            }
            None => true,
        });

        (
            Self {
                records: normalized,
            },
            problems,
        )
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, status: ChangeStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn paths(&self) -> Vec<String> {
        self.records.iter().map(|r| r.path.clone()).collect()
    }
}
