//! Activity aggregation engine.
//!
//! Resolves a date range and a repository set, scans every repository on a
//! bounded worker pool and merges the per-repository results into one
//! [`ActivityRecord`]. Workers never share mutable state: each returns its own
//! outcome and the merge happens on the calling thread once the pool is done.

use crate::aggregate::aggregate;
use crate::cancel::CancellationToken;
use crate::error::{DiaryError, ExtractionError, Result};
use crate::filter::{FilterConfig, NoiseFilter};
use crate::git::{self, HistorySource, WalkOptions};
use crate::model::{
    ActivityRecord, Commit, FailureKind, RepoFailure, Repository, RepositoryActivity, Totals,
    SCHEMA_VERSION,
};
use crate::range::{DateMode, DateRange};
use chrono::{Local, NaiveDate};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Called after each repository finishes: `(repository, completed, total)`.
pub type ProgressCallback = Box<dyn Fn(&str, usize, usize) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSelection {
    Root { path: PathBuf, walk: WalkOptions },
    Explicit(Vec<PathBuf>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub filter: FilterConfig,
    /// Upper bound on concurrent repository scans.
    pub max_workers: Option<usize>,
    /// Only the first `max_repos` repositories (by name) are scanned.
    pub max_repos: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub mode: DateMode,
    pub until: Option<NaiveDate>,
    pub selection: RepoSelection,
}

pub struct Engine<S> {
    source: S,
    filter: NoiseFilter,
    config: EngineConfig,
    cancel: CancellationToken,
    progress_callback: Option<ProgressCallback>,
}

impl<S: HistorySource> Engine<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            source,
            filter: NoiseFilter::new(&config.filter),
            config,
            cancel: CancellationToken::new(),
            progress_callback: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Full pipeline: validate the request, locate repositories, scan them.
    pub fn run(&self, request: &ScanRequest) -> Result<ActivityRecord> {
        let range = DateRange::resolve(request.mode, request.until)?;
        let (repos, failures) = self.locate(&request.selection)?;
        if repos.is_empty() {
            return Err(DiaryError::NoActivityFound { failures });
        }
        self.scan(repos, failures, range, request.mode.to_string())
    }

    /// Resolves the repository set. Explicit paths that fail validation are
    /// returned as failures rather than aborting the run.
    pub fn locate(&self, selection: &RepoSelection) -> Result<(Vec<Repository>, Vec<RepoFailure>)> {
        let (mut repos, failures) = match selection {
            RepoSelection::Root { path, walk } => (git::discover(path, *walk)?, Vec::new()),
            RepoSelection::Explicit(paths) => {
                let mut repos = Vec::new();
                let mut failures = Vec::new();
                for path in paths {
                    match git::open_repository(path) {
                        Ok(repo) => repos.push(repo),
                        Err(err) => {
                            warn!("{}", err);
                            failures.push(RepoFailure {
                                repository: Repository::new(path.clone()).name,
                                path: path.clone(),
                                kind: FailureKind::NotARepository,
                                message: err.to_string(),
                            });
                        }
                    }
                }
                repos.sort();
                repos.dedup_by(|a, b| a.path == b.path);
                (repos, failures)
            }
        };

        if let Some(limit) = self.config.max_repos {
            if repos.len() > limit {
                info!("limiting scan to {} of {} repositories", limit, repos.len());
                repos.truncate(limit);
            }
        }
        Ok((repos, failures))
    }

    /// Scans an already-resolved repository set over `range`.
    pub fn scan(
        &self,
        repos: Vec<Repository>,
        mut failures: Vec<RepoFailure>,
        range: DateRange,
        mode: String,
    ) -> Result<ActivityRecord> {
        let total = repos.len();
        let workers = self.worker_count(total);
        info!("scanning {} repositories with {} workers", total, workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("devdiary-scan-{i}"))
            .build()?;

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<std::result::Result<Vec<Commit>, ExtractionError>> = pool.install(|| {
            repos
                .par_iter()
                .map(|repo| {
                    let outcome = self.scan_repository(repo, &range);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(&repo.name, done, total);
                    }
                    outcome
                })
                .collect()
        });

        let keys = display_keys(&repos);
        let mut repositories = BTreeMap::new();
        for ((repo, key), outcome) in repos.into_iter().zip(keys).zip(outcomes) {
            match outcome {
                Ok(commits) => {
                    info!("{}: {} commits", key, commits.len());
                    repositories.insert(key, RepositoryActivity::new(repo.path, commits));
                }
                Err(err) => {
                    let kind = if err.is_cancelled() {
                        FailureKind::Cancelled
                    } else {
                        warn!("failed to scan {}: {}", key, err);
                        FailureKind::Extraction
                    };
                    failures.push(RepoFailure {
                        repository: key,
                        path: repo.path,
                        kind,
                        message: err.to_string(),
                    });
                }
            }
        }

        let cancelled = self.cancel.is_cancelled();
        if repositories.is_empty() && !cancelled {
            return Err(DiaryError::NoActivityFound { failures });
        }

        let totals = Totals::from_repositories(&repositories);
        Ok(ActivityRecord {
            version: SCHEMA_VERSION,
            generated_at: Local::now(),
            mode,
            range,
            repositories,
            totals,
            failures,
            cancelled,
        })
    }

    fn scan_repository(
        &self,
        repo: &Repository,
        range: &DateRange,
    ) -> std::result::Result<Vec<Commit>, ExtractionError> {
        if self.cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }
        let raw = git::extract(&self.source, repo, range, &self.cancel)?;
        let mut commits: Vec<Commit> = raw.into_iter().map(|c| aggregate(c, &self.filter)).collect();
        commits.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.full_id.cmp(&b.full_id))
        });
        Ok(commits)
    }

    fn worker_count(&self, repos: usize) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let mut workers = cpus.min(repos);
        if let Some(max) = self.config.max_workers {
            workers = workers.min(max);
        }
        workers.max(1)
    }
}

/// Record keys per repository. Basename collisions get the parent directory
/// appended, and the full path as a last resort.
fn display_keys(repos: &[Repository]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for repo in repos {
        *seen.entry(repo.name.as_str()).or_default() += 1;
    }

    let mut used = HashSet::new();
    repos
        .iter()
        .map(|repo| {
            let mut key = repo.name.clone();
            if seen.get(repo.name.as_str()).copied().unwrap_or(0) > 1 {
                if let Some(parent) = repo.path.parent().and_then(|p| p.file_name()) {
                    key = format!("{} ({})", repo.name, parent.to_string_lossy());
                }
            }
            if !used.insert(key.clone()) {
                key = repo.path.display().to_string();
                used.insert(key.clone());
            }
            key
        })
        .collect()
}
