//! Commit extraction.
//!
//! All knowledge of git's textual output lives here. History comes from
//! `git log` with a sentinel-delimited format; per-commit statistics come from
//! `git diff-tree --raw --numstat -z`. Any drift in either format surfaces as
//! a single [`ExtractionError::Parse`] for the repository being scanned.

use crate::cancel::CancellationToken;
use crate::error::ExtractionError;
use crate::git::process::run_git;
use crate::model::{ChangeKind, FileChange, RawCommit, Repository};
use crate::range::DateRange;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const RECORD_START: &str = "\u{1e}commit";
const RECORD_END: &str = "\u{1e}end";
const LOG_FORMAT: &str = "--format=%x1ecommit%n%H%n%h%n%an%n%ae%n%ct%n%B%n%x1eend";
const HEADER_FIELDS: usize = 5;
const MIN_ABBREV: usize = 7;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw history-query capability over a repository on disk.
pub trait HistorySource: Send + Sync {
    /// Sentinel-delimited log output, newest first, covering at least every
    /// commit in `range`. An empty string means the repository has no commits.
    fn history(
        &self,
        repo: &Path,
        range: &DateRange,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError>;

    /// NUL-delimited `--raw --numstat` output for a single commit.
    fn diff_stats(
        &self,
        repo: &Path,
        full_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ExtractionError>;
}

/// [`HistorySource`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn has_head(&self, repo: &Path, cancel: &CancellationToken) -> Result<bool, ExtractionError> {
        let output = run_git(
            &self.program,
            repo,
            ["rev-parse", "--verify", "--quiet", "HEAD"],
            self.timeout,
            cancel,
        )?;
        match output.status.code() {
            Some(0) => Ok(true),
            // --verify --quiet exits 1 without output on an unborn branch
            Some(1) if output.stdout.is_empty() => Ok(false),
            _ => output.into_success("rev-parse HEAD", cancel).map(|_| true),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git", DEFAULT_TIMEOUT)
    }
}

impl HistorySource for GitCli {
    fn history(
        &self,
        repo: &Path,
        range: &DateRange,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError> {
        if !self.has_head(repo, cancel)? {
            debug!("{} has no commits yet", repo.display());
            return Ok(String::new());
        }

        let args = vec![
            "-c".to_string(),
            "log.showSignature=false".to_string(),
            "-c".to_string(),
            "i18n.logOutputEncoding=UTF-8".to_string(),
            "log".to_string(),
            "--no-color".to_string(),
            format!("--abbrev={MIN_ABBREV}"),
            LOG_FORMAT.to_string(),
            // no --since: git stops walking at the first older commit, which
            // loses in-range ancestors behind a skewed committer date
            format!("--until={}", git_date(&range.end)),
        ];
        let stdout = run_git(&self.program, repo, &args, self.timeout, cancel)?
            .into_success("log", cancel)?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn diff_stats(
        &self,
        repo: &Path,
        full_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ExtractionError> {
        let args = [
            "diff-tree",
            "--no-commit-id",
            "--no-color",
            "-r",
            "-M",
            "--root",
            "--raw",
            "--numstat",
            "-z",
            full_id,
        ];
        run_git(&self.program, repo, args, self.timeout, cancel)?.into_success("diff-tree", cancel)
    }
}

fn git_date(ts: &DateTime<Local>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S %z").to_string()
}

/// Pulls every commit of `repo` whose timestamp falls in `range`, in the order
/// the history query emitted them, each with its unfiltered file changes.
pub fn extract<S: HistorySource + ?Sized>(
    source: &S,
    repo: &Repository,
    range: &DateRange,
    cancel: &CancellationToken,
) -> Result<Vec<RawCommit>, ExtractionError> {
    let log = source.history(&repo.path, range, cancel)?;
    let mut commits = parse_log(&log)?;

    let before = commits.len();
    // the log is unbounded below and git's --until is inclusive
    commits.retain(|c| range.contains(&c.timestamp));
    if commits.len() != before {
        debug!(
            "{}: dropped {} commits outside {} .. {}",
            repo.name,
            before - commits.len(),
            range.start,
            range.end
        );
    }

    for commit in &mut commits {
        let raw = source.diff_stats(&repo.path, &commit.full_id, cancel)?;
        commit.files = parse_diff_stats(&raw)?;
    }

    Ok(commits)
}

/// Parses sentinel-delimited `git log` output.
pub fn parse_log(output: &str) -> Result<Vec<RawCommit>, ExtractionError> {
    const WHAT: &str = "log";
    let mut commits = Vec::new();
    let mut lines = output.lines().enumerate().map(|(i, l)| (i + 1, l.trim_end_matches('\r')));

    while let Some((line_no, line)) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        if line != RECORD_START {
            return Err(ExtractionError::parse(
                WHAT,
                line_no,
                format!("expected commit marker, found {line:?}"),
            ));
        }

        let mut header = Vec::with_capacity(HEADER_FIELDS);
        for _ in 0..HEADER_FIELDS {
            match lines.next() {
                Some((_, field)) if field == RECORD_END || field == RECORD_START => {
                    return Err(ExtractionError::parse(WHAT, line_no, "truncated commit header"));
                }
                Some((_, field)) => header.push(field),
                None => {
                    return Err(ExtractionError::parse(WHAT, line_no, "truncated commit header"));
                }
            }
        }

        let mut message = Vec::new();
        let mut terminated = false;
        for (_, body_line) in lines.by_ref() {
            if body_line == RECORD_END {
                terminated = true;
                break;
            }
            if body_line == RECORD_START {
                break;
            }
            message.push(body_line);
        }
        if !terminated {
            return Err(ExtractionError::parse(WHAT, line_no, "commit record is not terminated"));
        }

        commits.push(commit_from_fields(&header, &message, line_no)?);
    }

    Ok(commits)
}

fn commit_from_fields(
    header: &[&str],
    message: &[&str],
    line_no: usize,
) -> Result<RawCommit, ExtractionError> {
    const WHAT: &str = "log";
    let (full_id, id, author, email, seconds) = (header[0], header[1], header[2], header[3], header[4]);

    if !is_hex(full_id) || full_id.len() < 40 {
        return Err(ExtractionError::parse(WHAT, line_no, format!("bad commit hash {full_id:?}")));
    }
    if !is_hex(id) || !full_id.starts_with(id) {
        return Err(ExtractionError::parse(WHAT, line_no, format!("bad abbreviated hash {id:?}")));
    }
    // core.abbrev may ask for fewer digits than we report
    let id = if id.len() < MIN_ABBREV { &full_id[..MIN_ABBREV] } else { id };
    let seconds: i64 = seconds
        .trim()
        .parse()
        .map_err(|_| ExtractionError::parse(WHAT, line_no, format!("bad timestamp {seconds:?}")))?;
    let timestamp = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| ExtractionError::parse(WHAT, line_no, format!("timestamp {seconds} out of range")))?
        .with_timezone(&Local);

    let subject = message
        .iter()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .unwrap_or_default();

    Ok(RawCommit {
        id: id.to_string(),
        full_id: full_id.to_string(),
        author: author.to_string(),
        author_email: email.to_string(),
        timestamp,
        subject,
        files: Vec::new(),
    })
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parses `git diff-tree -r -M --raw --numstat -z` output into file changes,
/// in raw-section order. Binary files (`-` counts) report `0/0`.
pub fn parse_diff_stats(output: &[u8]) -> Result<Vec<FileChange>, ExtractionError> {
    const WHAT: &str = "diff-tree";
    let text = String::from_utf8_lossy(output);
    let mut tokens = text.split('\0').enumerate().map(|(i, t)| (i + 1, t));

    let mut changes: Vec<FileChange> = Vec::new();
    let mut counts: HashMap<String, (u32, u32, bool)> = HashMap::new();

    while let Some((index, token)) = tokens.next() {
        let header = token.trim_matches('\n');
        if header.is_empty() {
            continue;
        }

        if let Some(raw) = header.strip_prefix(':') {
            let fields: Vec<&str> = raw.split(' ').collect();
            if fields.len() != 5 {
                return Err(ExtractionError::parse(WHAT, index, format!("bad raw entry {header:?}")));
            }
            let letter = fields[4].chars().next().unwrap_or('?');
            let kind = ChangeKind::from_status(letter).ok_or_else(|| {
                ExtractionError::parse(WHAT, index, format!("unknown status {:?}", fields[4]))
            })?;
            let first = next_path(&mut tokens, index)?;
            let (path, previous_path) = if matches!(letter, 'R' | 'C') {
                (next_path(&mut tokens, index)?, Some(first))
            } else {
                (first, None)
            };
            changes.push(FileChange {
                path,
                previous_path,
                insertions: 0,
                deletions: 0,
                kind,
                binary: false,
            });
        } else {
            let mut parts = header.splitn(3, '\t');
            let (added, deleted, inline_path) = match (parts.next(), parts.next(), parts.next()) {
                (Some(a), Some(d), Some(p)) => (a, d, p),
                _ => {
                    return Err(ExtractionError::parse(WHAT, index, format!("bad numstat entry {header:?}")));
                }
            };
            let path = if inline_path.is_empty() {
                // renames: counts, then old and new path as separate tokens
                next_path(&mut tokens, index)?;
                next_path(&mut tokens, index)?
            } else {
                inline_path.to_string()
            };
            let binary = added == "-" && deleted == "-";
            let (insertions, deletions) = if binary {
                (0, 0)
            } else {
                (parse_count(added, index)?, parse_count(deleted, index)?)
            };
            counts.insert(path, (insertions, deletions, binary));
        }
    }

    for change in &mut changes {
        if let Some(&(insertions, deletions, binary)) = counts.get(&change.path) {
            change.insertions = insertions;
            change.deletions = deletions;
            change.binary = binary;
        }
    }
    Ok(changes)
}

fn next_path<'a, I>(tokens: &mut I, index: usize) -> Result<String, ExtractionError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    match tokens.next() {
        Some((_, path)) if !path.is_empty() => Ok(path.to_string()),
        _ => Err(ExtractionError::parse("diff-tree", index, "missing path")),
    }
}

fn parse_count(value: &str, index: usize) -> Result<u32, ExtractionError> {
    value
        .parse()
        .map_err(|_| ExtractionError::parse("diff-tree", index, format!("bad line count {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const HASH_A: &str = "abc1234def5678901234567890abcdef12345678";
    const HASH_B: &str = "0123456789abcdef0123456789abcdef01234567";

    fn record(full: &str, short: &str, author: &str, ts: i64, message: &str) -> String {
        format!("\u{1e}commit\n{full}\n{short}\n{author}\n{author}@example.com\n{ts}\n{message}\n\n\u{1e}end\n")
    }

    #[test]
    fn parses_records_in_emitted_order() {
        let log = format!(
            "{}{}",
            record(HASH_B, "0123456", "Bob", 1_704_900_000, "second\n\nbody text"),
            record(HASH_A, "abc1234", "Alice", 1_704_800_000, "first")
        );
        let commits = parse_log(&log).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id, "0123456");
        assert_eq!(commits[0].subject, "second");
        assert_eq!(commits[1].full_id, HASH_A);
        assert_eq!(commits[1].author_email, "Alice@example.com");
        assert_eq!(
            commits[1].timestamp,
            Local.timestamp_opt(1_704_800_000, 0).unwrap()
        );
    }

    #[test]
    fn only_the_first_message_line_is_the_subject() {
        let log = record(HASH_A, "abc1234", "Alice", 1, "Fix parser\ncontinued subject\n\nDetails");
        assert_eq!(parse_log(&log).unwrap()[0].subject, "Fix parser");
    }

    #[test]
    fn empty_messages_and_non_ascii_are_fine() {
        let log = format!(
            "{}{}",
            record(HASH_A, "abc1234", "José Müller", 1, ""),
            record(HASH_B, "0123456", "山田太郎", 2, "修正: ログ出力")
        );
        let commits = parse_log(&log).unwrap();
        assert_eq!(commits[0].subject, "");
        assert_eq!(commits[0].author, "José Müller");
        assert_eq!(commits[1].subject, "修正: ログ出力");
    }

    #[test]
    fn empty_output_means_no_commits() {
        assert!(parse_log("").unwrap().is_empty());
        assert!(parse_log("\n\n").unwrap().is_empty());
    }

    #[test]
    fn format_drift_is_a_parse_error() {
        let cases = [
            "abc1234 plain oneline output\n".to_string(),
            "\u{1e}commit\nabc\n".to_string(),
            record(HASH_A, "abc1234", "Alice", 1, "x").replace("\u{1e}end\n", ""),
            record(HASH_A, "xyz", "Alice", 1, "x"),
            record(HASH_A, "abc1234", "Alice", 1, "x").replace("\n1\n", "\nyesterday\n"),
        ];
        for case in cases {
            let err = parse_log(&case).unwrap_err();
            assert!(matches!(err, ExtractionError::Parse { what: "log", .. }), "{case:?}");
        }
    }

    #[test]
    fn short_abbreviations_are_widened_from_the_full_hash() {
        let log = record(HASH_A, "abc12", "Alice", 1, "x");
        let commits = parse_log(&log).unwrap();
        assert_eq!(commits[0].id, "abc1234");

        let unique = record(HASH_A, "abc1234def", "Alice", 1, "x");
        assert_eq!(parse_log(&unique).unwrap()[0].id, "abc1234def");

        let mismatched = record(HASH_A, "abd12", "Alice", 1, "x");
        assert!(parse_log(&mismatched).is_err());
    }

    #[test]
    fn diff_stats_join_raw_and_numstat() {
        let raw = concat!(
            ":000000 100644 0000000 1111111 A\0src/a.py\0",
            ":100644 100644 2222222 3333333 M\0README.md\0",
            ":100644 000000 4444444 0000000 D\0old.txt\0",
            "10\t0\tsrc/a.py\0",
            "3\t1\tREADME.md\0",
            "0\t7\told.txt\0",
        );
        let changes = parse_diff_stats(raw.as_bytes()).unwrap();
        assert_eq!(
            changes,
            vec![
                FileChange {
                    path: "src/a.py".into(),
                    previous_path: None,
                    insertions: 10,
                    deletions: 0,
                    kind: ChangeKind::Added,
                    binary: false,
                },
                FileChange {
                    path: "README.md".into(),
                    previous_path: None,
                    insertions: 3,
                    deletions: 1,
                    kind: ChangeKind::Modified,
                    binary: false,
                },
                FileChange {
                    path: "old.txt".into(),
                    previous_path: None,
                    insertions: 0,
                    deletions: 7,
                    kind: ChangeKind::Deleted,
                    binary: false,
                },
            ]
        );
    }

    #[test]
    fn pure_rename_is_zero_zero() {
        let raw = concat!(
            ":100644 100644 5555555 5555555 R100\0src/old.rs\0src/new.rs\0",
            "0\t0\t\0src/old.rs\0src/new.rs\0",
        );
        let changes = parse_diff_stats(raw.as_bytes()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Renamed);
        assert_eq!(changes[0].path, "src/new.rs");
        assert_eq!(changes[0].previous_path.as_deref(), Some("src/old.rs"));
        assert_eq!((changes[0].insertions, changes[0].deletions), (0, 0));
    }

    #[test]
    fn binary_files_count_as_zero() {
        let raw = ":000000 100644 0000000 6666666 A\0logo.png\0-\t-\tlogo.png\0";
        let changes = parse_diff_stats(raw.as_bytes()).unwrap();
        assert!(changes[0].binary);
        assert_eq!((changes[0].insertions, changes[0].deletions), (0, 0));
    }

    #[test]
    fn empty_merge_has_no_changes() {
        assert!(parse_diff_stats(b"").unwrap().is_empty());
        assert!(parse_diff_stats(b"\n").unwrap().is_empty());
    }

    #[test]
    fn paths_that_look_like_headers_stay_paths() {
        let raw = ":000000 100644 0000000 1111111 A\0:odd\tname\0\
                   1\t0\t:odd\tname\0";
        let changes = parse_diff_stats(raw.as_bytes()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, ":odd\tname");
        assert_eq!(changes[0].insertions, 1);
    }

    #[test]
    fn malformed_diff_output_is_a_parse_error() {
        for raw in [
            &b":100644 100644 abc M\0x\0"[..],
            &b":100644 100644 0000000 1111111 Q\0x\0"[..],
            &b":100644 100644 0000000 1111111 M\0"[..],
            &b"ten\tzero\tfile\0"[..],
            &b"garbage\0"[..],
        ] {
            let err = parse_diff_stats(raw).unwrap_err();
            assert!(matches!(err, ExtractionError::Parse { what: "diff-tree", .. }));
        }
    }
}
