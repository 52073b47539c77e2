use crate::cli::CommonArgs;
use crate::config::{FileConfig, Overrides, Settings};
use crate::git;
use anyhow::Context;
use console::style;
use serde::Serialize;

#[derive(Serialize)]
struct RepoListing<'a> {
    root: &'a std::path::Path,
    repositories: Vec<crate::model::Repository>,
}

pub fn exec(common: CommonArgs, json: bool) -> anyhow::Result<()> {
    let file = FileConfig::load(common.config.as_deref()).context("Failed to load configuration")?;
    let settings = Settings::resolve(
        file,
        Overrides {
            root: common.root.clone(),
            recursive: common.recursive,
            include_hidden: common.include_hidden,
            ..Overrides::default()
        },
    )
    .context("Invalid configuration")?;

    let mut repos = git::discover(&settings.root, settings.walk())
        .with_context(|| format!("Failed to list repositories under {}", settings.root.display()))?;
    if let Some(limit) = settings.engine.max_repos {
        repos.truncate(limit);
    }

    if json {
        let listing = RepoListing {
            root: &settings.root,
            repositories: repos,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if repos.is_empty() {
        println!("No repositories found under {}", settings.root.display());
        return Ok(());
    }
    for repo in &repos {
        println!("{:<30} {}", style(&repo.name).bold(), style(repo.path.display()).dim());
    }
    Ok(())
}
