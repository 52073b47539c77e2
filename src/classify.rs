//! Keyword classification of commit subjects into kinds of work.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Feature,
    Bugfix,
    Refactor,
    Docs,
    Test,
    Chore,
    Perf,
    Build,
    Ci,
    Other,
}

/// Checked in order; the first group with a matching keyword wins.
const RULES: &[(WorkType, &[&str])] = &[
    (WorkType::Bugfix, &["fix", "bug", "hotfix", "patch"]),
    (WorkType::Feature, &["feat", "feature", "add", "implement"]),
    (WorkType::Refactor, &["refactor", "cleanup", "restructure"]),
    (WorkType::Docs, &["doc", "readme", "changelog"]),
    (WorkType::Test, &["test", "spec", "unit test", "unittest"]),
    (WorkType::Perf, &["perf", "optimiz"]),
    (WorkType::Build, &["build", "packag"]),
    (WorkType::Ci, &["ci", "pipeline", "workflow"]),
    (WorkType::Chore, &["chore", "deps", "dependency", "bump"]),
];

impl WorkType {
    /// Classifies a commit subject by case-insensitive keyword containment.
    pub fn classify(subject: &str) -> Self {
        let subject = subject.to_lowercase();
        RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| subject.contains(k)))
            .map(|(kind, _)| *kind)
            .unwrap_or(WorkType::Other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkType::Feature => "feature",
            WorkType::Bugfix => "bugfix",
            WorkType::Refactor => "refactor",
            WorkType::Docs => "docs",
            WorkType::Test => "test",
            WorkType::Chore => "chore",
            WorkType::Perf => "perf",
            WorkType::Build => "build",
            WorkType::Ci => "ci",
            WorkType::Other => "other",
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit count per work type; types with no commits are absent.
pub type WorkTypeCounts = BTreeMap<WorkType, usize>;

/// Most frequent first, ties in declaration order.
pub fn ranked(counts: &WorkTypeCounts) -> Vec<(WorkType, usize)> {
    let mut ranked: Vec<_> = counts.iter().map(|(kind, n)| (*kind, *n)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}
