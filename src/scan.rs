use crate::cancel::CancellationToken;
use crate::cli::{CommonArgs, ScanArgs};
use crate::config::{FileConfig, Overrides, Settings};
use crate::engine::{Engine, RepoSelection, ScanRequest};
use crate::error::DiaryError;
use crate::git::GitCli;
use crate::model::ActivityRecord;
use crate::render;
use crate::summarize::{OllamaSummarizer, Summarizer};
use anyhow::Context;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

pub fn exec(common: CommonArgs, args: ScanArgs) -> anyhow::Result<()> {
    let file = FileConfig::load(common.config.as_deref()).context("Failed to load configuration")?;
    let settings = Settings::resolve(
        file,
        Overrides {
            root: common.root.clone(),
            mode: args.mode.clone(),
            recursive: common.recursive,
            include_hidden: common.include_hidden,
            timeout: args.timeout,
            jobs: args.jobs,
            max_repos: args.max_repos,
            exclude: args.exclude.clone(),
            summarize: args.summarize,
            model: args.model.clone(),
            endpoint: args.ollama_endpoint.clone(),
        },
    )
    .context("Invalid options or configuration")?;

    let selection = if args.repos.is_empty() {
        RepoSelection::Root {
            path: settings.root.clone(),
            walk: settings.walk(),
        }
    } else {
        RepoSelection::Explicit(args.repos.clone())
    };
    let request = ScanRequest {
        mode: settings.mode,
        until: args.until,
        selection,
    };

    let cancel = CancellationToken::new();
    if let Err(err) = cancel.cancel_on_interrupt() {
        warn!("Ctrl-C will abort without partial results: {}", err);
    }
    let _deadline = args.max_duration.map(|budget| cancel.cancel_after(budget));

    let pb = progress_bar();
    let mut engine = Engine::new(GitCli::new(&settings.git, settings.timeout), settings.engine.clone())
        .with_cancellation(cancel);
    if let Some(pb) = pb.clone() {
        engine = engine.with_progress_callback(Box::new(move |name, done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
            pb.set_message(name.to_string());
        }));
    }

    let outcome = engine.run(&request);
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let record = match outcome {
        Ok(record) => record,
        Err(DiaryError::NoActivityFound { failures }) => {
            for failure in &failures {
                eprintln!(
                    "{} {}: {}",
                    style("skipped").yellow(),
                    failure.repository,
                    failure.message
                );
            }
            return Err(DiaryError::NoActivityFound { failures })
                .context("Every repository failed to scan");
        }
        Err(err) => return Err(err).context("Scan failed"),
    };

    if record.cancelled {
        eprintln!(
            "{}",
            style("Scan cancelled before all repositories finished; showing partial results").yellow()
        );
    }

    let summary = if settings.ollama.enabled {
        summarize(&record, &settings)
    } else {
        None
    };

    let report = if args.json {
        render::json(&record, summary.as_deref()).context("Failed to serialize report")?
    } else if args.ndjson {
        render::ndjson(&record).context("Failed to serialize report")?
    } else if args.markdown {
        render::markdown(&record, summary.as_deref())
    } else {
        let color = args.output.is_none() && Term::stdout().is_term();
        render::text(&record, summary.as_deref(), color)
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => print!("{report}"),
    }
    Ok(())
}

/// Summarization failures never cost the user the record.
fn summarize(record: &ActivityRecord, settings: &Settings) -> Option<String> {
    if record.has_no_commits() {
        info!("no commits to summarize");
        return None;
    }
    let ollama = &settings.ollama;
    let summarizer = OllamaSummarizer::new(&ollama.endpoint, &ollama.model, ollama.timeout);
    match summarizer.summarize(&render::activity_text(record)) {
        Ok(summary) => Some(summary),
        Err(err) => {
            eprintln!("{} {}", style("summary unavailable:").yellow(), err);
            None
        }
    }
}

fn progress_bar() -> Option<ProgressBar> {
    if !Term::stderr().is_term() {
        return None;
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message("Scanning repositories...");
    Some(pb)
}
