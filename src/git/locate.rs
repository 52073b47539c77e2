use crate::error::{DiaryError, Result};
use crate::model::Repository;
use ignore::WalkBuilder;
use std::path::Path;
use tracing::{debug, warn};

/// Validates an explicitly named repository.
pub fn open_repository(path: &Path) -> Result<Repository> {
    let not_a_repo = |reason: String| DiaryError::NotARepository {
        path: path.to_path_buf(),
        reason,
    };

    let canonical = path.canonicalize().map_err(|e| not_a_repo(e.to_string()))?;
    if !canonical.is_dir() {
        return Err(not_a_repo("not a directory".into()));
    }

    let repo = gix::open(&canonical).map_err(|e| not_a_repo(e.to_string()))?;
    let root = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
    Ok(Repository::new(root))
}

/// How far [`discover`] looks below the root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Search the whole tree instead of the root's direct children.
    pub recursive: bool,
    /// Also consider dot-directories.
    pub include_hidden: bool,
}

/// Finds repositories among the children of `root`, or anywhere below it when
/// `recursive`. The root itself is never reported and nested repositories
/// inside a found one are not descended into.
pub fn discover(root: &Path, options: WalkOptions) -> Result<Vec<Repository>> {
    if !root.is_dir() {
        return Err(DiaryError::RootNotFound(root.to_path_buf()));
    }

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(!options.include_hidden)
        .follow_links(false)
        .max_depth(if options.recursive { None } else { Some(1) })
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            // never walk the insides of a repository
            entry.depth() <= 1
                || entry
                    .path()
                    .parent()
                    .map(|parent| !parent.join(".git").exists())
                    .unwrap_or(true)
        })
        .build();

    let mut repos = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry under {}: {}", root.display(), err);
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        if entry.path_is_symlink() {
            warn!("skipping symlink {}", entry.path().display());
            continue;
        }
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        match entry.path().join(".git").try_exists() {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                warn!("skipping unreadable directory {}: {}", entry.path().display(), err);
                continue;
            }
        }

        match open_repository(entry.path()) {
            Ok(repo) => {
                debug!("found repository {} at {}", repo.name, repo.path.display());
                repos.push(repo);
            }
            Err(err) => warn!("skipping {}: {}", entry.path().display(), err),
        }
    }

    repos.sort();
    repos.dedup_by(|a, b| a.path == b.path);
    Ok(repos)
}
