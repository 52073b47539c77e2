use crate::classify::{WorkType, WorkTypeCounts};
use crate::range::DateRange;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;

/// A discovered repository. The engine only reads from it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub path: PathBuf,
}

impl Repository {
    pub fn new(path: PathBuf) -> Self {
        let name = display_name(&path);
        Self { name, path }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    /// Maps a `git diff --raw` status letter. Copies count as additions and
    /// type changes / unmerged entries as modifications.
    pub fn from_status(status: char) -> Option<Self> {
        match status {
            'A' | 'C' => Some(ChangeKind::Added),
            'M' | 'T' | 'U' | 'X' => Some(ChangeKind::Modified),
            'D' => Some(ChangeKind::Deleted),
            'R' => Some(ChangeKind::Renamed),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Modified => 'M',
            ChangeKind::Deleted => 'D',
            ChangeKind::Renamed => 'R',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    pub insertions: u32,
    pub deletions: u32,
    pub kind: ChangeKind,
    #[serde(default)]
    pub binary: bool,
}

/// A commit as read from history, before noise filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    pub id: String,
    pub full_id: String,
    pub author: String,
    pub author_email: String,
    pub timestamp: DateTime<Local>,
    pub subject: String,
    pub files: Vec<FileChange>,
}

/// A commit with its noise-filtered file changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub full_id: String,
    pub author: String,
    pub author_email: String,
    pub timestamp: DateTime<Local>,
    pub subject: String,
    pub work_type: WorkType,
    pub files: Vec<FileChange>,
}

impl Commit {
    pub fn insertions(&self) -> u64 {
        self.files.iter().map(|f| f.insertions as u64).sum()
    }

    pub fn deletions(&self) -> u64 {
        self.files.iter().map(|f| f.deletions as u64).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryActivity {
    pub path: PathBuf,
    /// Oldest first; equal timestamps ordered by hash.
    pub commits: Vec<Commit>,
    pub work_types: WorkTypeCounts,
}

impl RepositoryActivity {
    pub fn new(path: PathBuf, commits: Vec<Commit>) -> Self {
        let work_types = count_work_types(&commits);
        Self {
            path,
            commits,
            work_types,
        }
    }
}

fn count_work_types<'a>(commits: impl IntoIterator<Item = &'a Commit>) -> WorkTypeCounts {
    let mut counts = WorkTypeCounts::new();
    for commit in commits {
        *counts.entry(commit.work_type).or_default() += 1;
    }
    counts
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub repositories: usize,
    pub commits: usize,
    pub files_changed: usize,
    pub insertions: u64,
    pub deletions: u64,
    pub work_types: WorkTypeCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotARepository,
    Extraction,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFailure {
    pub repository: String,
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// Output of one engine run: commits per repository plus failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub version: u32,
    pub generated_at: DateTime<Local>,
    pub mode: String,
    pub range: DateRange,
    pub repositories: BTreeMap<String, RepositoryActivity>,
    pub totals: Totals,
    pub failures: Vec<RepoFailure>,
    pub cancelled: bool,
}

impl ActivityRecord {
    /// True when every scanned repository came back without commits.
    pub fn has_no_commits(&self) -> bool {
        self.totals.commits == 0
    }

    pub fn commits(&self) -> impl Iterator<Item = (&str, &Commit)> + '_ {
        self.repositories
            .iter()
            .flat_map(|(name, activity)| activity.commits.iter().map(move |c| (name.as_str(), c)))
    }
}

impl Totals {
    pub fn from_repositories(repositories: &BTreeMap<String, RepositoryActivity>) -> Self {
        let mut totals = Totals {
            repositories: repositories.len(),
            ..Totals::default()
        };
        for activity in repositories.values() {
            for commit in &activity.commits {
                totals.commits += 1;
                totals.files_changed += commit.files.len();
                totals.insertions += commit.insertions();
                totals.deletions += commit.deletions();
            }
        }
        totals.work_types = count_work_types(repositories.values().flat_map(|a| &a.commits));
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_name_is_directory_basename() {
        let repo = Repository::new(PathBuf::from("/home/dev/projects/api"));
        assert_eq!(repo.name, "api");
    }

    #[test]
    fn work_types_are_counted_per_repository_and_in_total() {
        let commit = |subject: &str| Commit {
            id: "abc1234".into(),
            full_id: "abc1234".repeat(6),
            author: "Alice".into(),
            author_email: "alice@example.com".into(),
            timestamp: Local::now(),
            subject: subject.into(),
            work_type: WorkType::classify(subject),
            files: Vec::new(),
        };
        let mut repositories = BTreeMap::new();
        repositories.insert(
            "api".to_string(),
            RepositoryActivity::new(
                PathBuf::from("/dev/api"),
                vec![commit("Fix login"), commit("Fix logout"), commit("Add search")],
            ),
        );
        repositories.insert(
            "web".to_string(),
            RepositoryActivity::new(PathBuf::from("/dev/web"), vec![commit("Add page")]),
        );

        assert_eq!(
            repositories["api"].work_types,
            WorkTypeCounts::from([(WorkType::Bugfix, 2), (WorkType::Feature, 1)])
        );
        let totals = Totals::from_repositories(&repositories);
        assert_eq!(
            totals.work_types,
            WorkTypeCounts::from([(WorkType::Bugfix, 2), (WorkType::Feature, 2)])
        );
        assert_eq!(totals.commits, 4);
    }

    #[test]
    fn status_letters_map_to_kinds() {
        assert_eq!(ChangeKind::from_status('A'), Some(ChangeKind::Added));
        assert_eq!(ChangeKind::from_status('C'), Some(ChangeKind::Added));
        assert_eq!(ChangeKind::from_status('T'), Some(ChangeKind::Modified));
        assert_eq!(ChangeKind::from_status('R'), Some(ChangeKind::Renamed));
        assert_eq!(ChangeKind::from_status('D'), Some(ChangeKind::Deleted));
        assert_eq!(ChangeKind::from_status('?'), None);
    }
}
