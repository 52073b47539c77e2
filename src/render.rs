use crate::classify::{ranked, WorkTypeCounts};
use crate::model::{ActivityRecord, Commit, FailureKind, RepoFailure, SCHEMA_VERSION};
use chrono::{Days, NaiveTime};
use console::style;
use serde::Serialize;
use std::fmt::Write;

const RULE_WIDTH: usize = 60;

/// Human phrase for the scanned window, e.g. `Since 2024-01-01`.
pub fn time_window(record: &ActivityRecord) -> String {
    let start = record.range.start.date_naive();
    let mode = record.mode.to_ascii_lowercase();
    let bounded = Some(record.range.end.time()) == NaiveTime::from_hms_opt(0, 0, 0)
        && record.range.end < record.generated_at;

    if bounded {
        let last = record
            .range
            .end
            .date_naive()
            .checked_sub_days(Days::new(1))
            .unwrap_or(start);
        return format!("From {start} to {last}");
    }
    match mode.as_str() {
        "today" => "Today".to_string(),
        "weekly" => "In the last 7 days".to_string(),
        "monthly" => "This month".to_string(),
        _ => format!("Since {start}"),
    }
}

/// Plain-text block handed to the summarizer. Carries every commit and file.
pub fn activity_text(record: &ActivityRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Time window: {}", time_window(record));
    for (name, activity) in &record.repositories {
        let _ = writeln!(out, "\nRepository: {name}");
        if activity.commits.is_empty() {
            let _ = writeln!(out, "(no commits)");
        }
        for commit in &activity.commits {
            let _ = writeln!(
                out,
                "- {} {} {} [{}]: {} (+{} -{})",
                commit.id,
                commit.timestamp.format("%Y-%m-%d %H:%M"),
                commit.author,
                commit.work_type,
                commit.subject,
                commit.insertions(),
                commit.deletions()
            );
            for file in &commit.files {
                let _ = writeln!(
                    out,
                    "    {} {} +{} -{}",
                    file.kind.letter(),
                    file.path,
                    file.insertions,
                    file.deletions
                );
            }
        }
    }
    out
}

/// Terminal report. Styling is dropped when `color` is false.
pub fn text(record: &ActivityRecord, summary: Option<&str>, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        style("Developer activity").bold(),
        style(format!("({}, {})", time_window(record), record.mode)).dim()
    );
    let _ = writeln!(out, "{}", "─".repeat(RULE_WIDTH));

    if record.has_no_commits() {
        let _ = writeln!(out, "No commits in range across {} repositories.", record.totals.repositories);
    }

    for (name, activity) in &record.repositories {
        if activity.commits.is_empty() {
            continue;
        }
        let (ins, del) = activity
            .commits
            .iter()
            .fold((0, 0), |(i, d), c| (i + c.insertions(), d + c.deletions()));
        let _ = writeln!(
            out,
            "\n{} {} {} {}",
            style(name).bold().cyan(),
            style(format!("{} commits", activity.commits.len())).dim(),
            style(format!("+{ins}")).green(),
            style(format!("-{del}")).red()
        );
        for commit in &activity.commits {
            write_commit(&mut out, commit);
        }
    }

    if !record.failures.is_empty() {
        let _ = writeln!(out, "\n{}", style("Not scanned").yellow().bold());
        for failure in &record.failures {
            let _ = writeln!(out, "  {}: {}", style(&failure.repository).yellow(), failure_line(failure));
        }
    }
    if record.cancelled {
        let _ = writeln!(out, "\n{}", style("Scan was cancelled; results are partial.").yellow());
    }

    let totals = &record.totals;
    let _ = writeln!(
        out,
        "\n{} {} repositories, {} commits, {} files, {} {}",
        style("Totals:").bold(),
        totals.repositories,
        totals.commits,
        totals.files_changed,
        style(format!("+{}", totals.insertions)).green(),
        style(format!("-{}", totals.deletions)).red()
    );
    if !totals.work_types.is_empty() {
        let _ = writeln!(out, "{} {}", style("Work types:").bold(), work_type_list(&totals.work_types));
    }

    if let Some(summary) = summary {
        let _ = writeln!(out, "\n{}\n{}", style("Summary").bold(), summary.trim());
    }

    if color {
        out
    } else {
        console::strip_ansi_codes(&out).into_owned()
    }
}

fn write_commit(out: &mut String, commit: &Commit) {
    let _ = writeln!(
        out,
        "  {} {} {} {} {}",
        style(commit.timestamp.format("%Y-%m-%d %H:%M")).dim(),
        style(&commit.id).yellow(),
        style(format!("[{}]", commit.work_type)).magenta(),
        commit.subject,
        style(format!("(+{} -{})", commit.insertions(), commit.deletions())).dim()
    );
    for file in &commit.files {
        let path = match &file.previous_path {
            Some(previous) => format!("{previous} -> {}", file.path),
            None => file.path.clone(),
        };
        let counts = if file.binary {
            "binary".to_string()
        } else {
            format!("+{} -{}", file.insertions, file.deletions)
        };
        let _ = writeln!(out, "      {} {} {}", file.kind.letter(), path, style(counts).dim());
    }
}

/// `bugfix 2, feature 1`
fn work_type_list(counts: &WorkTypeCounts) -> String {
    ranked(counts)
        .into_iter()
        .map(|(kind, n)| format!("{kind} {n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn failure_line(failure: &RepoFailure) -> String {
    let label = match failure.kind {
        FailureKind::NotARepository => "not a repository",
        FailureKind::Extraction => "extraction failed",
        FailureKind::Cancelled => "cancelled",
    };
    format!("{label} ({})", failure.message)
}

pub fn markdown(record: &ActivityRecord, summary: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Dev diary: {}\n", time_window(record));

    if !record.totals.work_types.is_empty() {
        let _ = writeln!(out, "### Work type distribution\n");
        for (kind, n) in ranked(&record.totals.work_types) {
            let label = kind.as_str();
            let mut chars = label.chars();
            let title: String = chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect())
                .unwrap_or_default();
            let _ = writeln!(out, "- **{title}:** {n}");
        }
        out.push('\n');
    }

    for (name, activity) in &record.repositories {
        let _ = writeln!(out, "### {name}\n");
        if activity.commits.is_empty() {
            let _ = writeln!(out, "_No commits._\n");
            continue;
        }
        for commit in &activity.commits {
            let _ = writeln!(
                out,
                "- [{}] `{}` {} ({}, +{}/-{})",
                commit.work_type,
                commit.id,
                commit.subject,
                commit.timestamp.format("%Y-%m-%d"),
                commit.insertions(),
                commit.deletions()
            );
        }
        out.push('\n');
    }

    if !record.failures.is_empty() {
        let _ = writeln!(out, "### Not scanned\n");
        for failure in &record.failures {
            let _ = writeln!(out, "- **{}**: {}", failure.repository, failure_line(failure));
        }
        out.push('\n');
    }

    let totals = &record.totals;
    let _ = writeln!(
        out,
        "**Totals:** {} commits, +{} / -{} lines across {} repositories\n",
        totals.commits, totals.insertions, totals.deletions, totals.repositories
    );

    if let Some(summary) = summary {
        let _ = writeln!(out, "### Scrum summary\n\n{}", summary.trim());
    }
    out
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    record: &'a ActivityRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
}

pub fn json(record: &ActivityRecord, summary: Option<&str>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Report { record, summary })
}

#[derive(Serialize)]
struct CommitLine<'a> {
    version: u32,
    repository: &'a str,
    #[serde(flatten)]
    commit: &'a Commit,
}

/// One JSON object per commit, oldest first within each repository.
pub fn ndjson(record: &ActivityRecord) -> serde_json::Result<String> {
    let mut out = String::new();
    for (repository, commit) in record.commits() {
        out.push_str(&serde_json::to_string(&CommitLine {
            version: SCHEMA_VERSION,
            repository,
            commit,
        })?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::WorkType;
    use crate::model::{ChangeKind, FileChange, RepositoryActivity, Totals};
    use crate::range::DateRange;
    use chrono::{DateTime, Local, TimeZone};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).earliest().unwrap()
    }

    fn sample(range_end: DateTime<Local>) -> ActivityRecord {
        let commit = Commit {
            id: "abc1234".into(),
            full_id: format!("abc1234{}", "0".repeat(33)),
            author: "Alice".into(),
            author_email: "alice@example.com".into(),
            timestamp: at(2024, 1, 10, 12),
            subject: "Add parser".into(),
            work_type: WorkType::Feature,
            files: vec![FileChange {
                path: "src/a.py".into(),
                previous_path: None,
                insertions: 10,
                deletions: 0,
                kind: ChangeKind::Added,
                binary: false,
            }],
        };
        let mut repositories = BTreeMap::new();
        repositories.insert(
            "app".to_string(),
            RepositoryActivity::new(PathBuf::from("/dev/app"), vec![commit]),
        );
        repositories.insert(
            "quiet".to_string(),
            RepositoryActivity::new(PathBuf::from("/dev/quiet"), Vec::new()),
        );
        let totals = Totals::from_repositories(&repositories);
        ActivityRecord {
            version: SCHEMA_VERSION,
            generated_at: at(2024, 3, 1, 9),
            mode: "custom:2024-01-01".into(),
            range: DateRange::new(at(2024, 1, 1, 0), range_end).unwrap(),
            repositories,
            totals,
            failures: vec![RepoFailure {
                repository: "broken".into(),
                path: PathBuf::from("/dev/broken"),
                kind: FailureKind::Extraction,
                message: "`git log` exited with status 128".into(),
            }],
            cancelled: false,
        }
    }

    #[test]
    fn time_window_phrases() {
        let open = sample(at(2024, 3, 1, 8));
        assert_eq!(time_window(&open), "Since 2024-01-01");

        let bounded = sample(at(2024, 2, 1, 0));
        assert_eq!(time_window(&bounded), "From 2024-01-01 to 2024-01-31");
    }

    #[test]
    fn activity_text_keeps_commit_detail() {
        let text = activity_text(&sample(at(2024, 3, 1, 8)));
        assert!(text.contains("Repository: app"));
        assert!(text.contains("abc1234"));
        assert!(text.contains("Alice [feature]: Add parser (+10 -0)"));
        assert!(text.contains("A src/a.py +10 -0"));
        assert!(text.contains("Repository: quiet\n(no commits)"));
    }

    #[test]
    fn plain_text_report_has_no_escape_codes() {
        let report = text(&sample(at(2024, 3, 1, 8)), Some("Shipped the parser."), false);
        assert!(!report.contains('\u{1b}'));
        assert!(report.contains("abc1234 [feature] Add parser"));
        assert!(report.contains("Work types: feature 1"));
        assert!(report.contains("broken: extraction failed"));
        assert!(report.contains("Totals: 2 repositories, 1 commits, 1 files, +10 -0"));
        assert!(report.contains("Shipped the parser."));
    }

    #[test]
    fn markdown_lists_commits_and_failures() {
        let md = markdown(&sample(at(2024, 3, 1, 8)), None);
        assert!(md.starts_with("# Dev diary: Since 2024-01-01"));
        assert!(md.contains("- [feature] `abc1234` Add parser (2024-01-10, +10/-0)"));
        assert!(md.contains("### Work type distribution\n\n- **Feature:** 1"));
        assert!(md.contains("### quiet\n\n_No commits._"));
        assert!(md.contains("- **broken**: extraction failed"));
        assert!(!md.contains("Scrum summary"));
    }

    #[test]
    fn json_carries_record_and_summary() {
        let out = json(&sample(at(2024, 3, 1, 8)), Some("done")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["version"], SCHEMA_VERSION);
        assert_eq!(value["totals"]["insertions"], 10);
        assert_eq!(value["repositories"]["app"]["commits"][0]["files"][0]["kind"], "added");
        assert_eq!(value["failures"][0]["kind"], "extraction");
        assert_eq!(value["totals"]["work_types"]["feature"], 1);
        assert_eq!(value["repositories"]["app"]["work_types"]["feature"], 1);
        assert_eq!(value["repositories"]["app"]["commits"][0]["work_type"], "feature");
        assert_eq!(value["summary"], "done");
    }

    #[test]
    fn ndjson_is_one_commit_per_line() {
        let out = ndjson(&sample(at(2024, 3, 1, 8))).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["repository"], "app");
        assert_eq!(value["id"], "abc1234");
        assert_eq!(value["work_type"], "feature");
    }
}
