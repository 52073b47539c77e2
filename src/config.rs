//! Configuration for devdiary
//!
//! Values are layered, highest priority first:
//! 1. Command-line flags (and their `DEVDIARY_*` environment fallbacks)
//! 2. `--config <file>`, else `./devdiary.toml`, else `~/.config/devdiary/config.toml`
//! 3. Built-in defaults

use crate::engine::EngineConfig;
use crate::error::{DiaryError, Result};
use crate::filter::FilterConfig;
use crate::git::WalkOptions;
use crate::range::DateMode;
use crate::{git, summarize};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ROOT: &str = "~/dev";
pub const DEFAULT_MODE: &str = "weekly";
const LOCAL_FILE: &str = "devdiary.toml";

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub scanning: ScanningSection,
    #[serde(default)]
    pub filter: FilterSection,
    #[serde(default)]
    pub ollama: OllamaSection,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScanningSection {
    pub root: Option<String>,
    pub mode: Option<String>,
    pub recursive: Option<bool>,
    pub include_hidden: Option<bool>,
    pub max_repos: Option<usize>,
    pub max_workers: Option<usize>,
    /// Per git invocation, humantime syntax (`30s`, `2m`).
    pub timeout: Option<String>,
    pub git: Option<String>,
}

/// `segments` / `patterns` replace the built-in lists; `extra_*` extend them.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSection {
    pub segments: Option<Vec<String>>,
    pub patterns: Option<Vec<String>>,
    #[serde(default)]
    pub extra_segments: Vec<String>,
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaSection {
    pub enabled: Option<bool>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout: Option<String>,
}

impl FileConfig {
    /// Loads the first config file found. An explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::read(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("devdiary").join("config.toml"));
        }
        paths
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DiaryError::Config(e.to_string()))
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DiaryError::Config(format!("cannot read {}: {e}", path.display())))?;
        debug!("loading config from {}", path.display());
        Self::parse(&content).map_err(|e| match e {
            DiaryError::Config(msg) => DiaryError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }
}

/// Values taken from the command line. `None` / empty means "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub mode: Option<String>,
    pub recursive: bool,
    pub include_hidden: bool,
    pub timeout: Option<Duration>,
    pub jobs: Option<usize>,
    pub max_repos: Option<usize>,
    pub exclude: Vec<String>,
    pub summarize: bool,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OllamaSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root: PathBuf,
    pub mode: DateMode,
    pub recursive: bool,
    pub include_hidden: bool,
    pub git: String,
    pub timeout: Duration,
    pub engine: EngineConfig,
    pub ollama: OllamaSettings,
}

impl Settings {
    pub fn resolve(file: FileConfig, cli: Overrides) -> Result<Self> {
        let FileConfig {
            scanning,
            filter,
            ollama,
        } = file;

        let root = match cli.root {
            Some(root) => root,
            None => expand_tilde(scanning.root.as_deref().unwrap_or(DEFAULT_ROOT)),
        };
        let mode = cli
            .mode
            .as_deref()
            .or(scanning.mode.as_deref())
            .unwrap_or(DEFAULT_MODE)
            .parse::<DateMode>()?;

        let timeout = match cli.timeout {
            Some(timeout) => timeout,
            None => parse_duration("scanning.timeout", scanning.timeout.as_deref())?
                .unwrap_or(git::history::DEFAULT_TIMEOUT),
        };

        let defaults = FilterConfig::default();
        let filter = FilterConfig {
            segments: filter.segments.unwrap_or(defaults.segments),
            patterns: filter.patterns.unwrap_or(defaults.patterns),
        }
        .extend(
            filter.extra_segments.into_iter().chain(cli.exclude),
            filter.extra_patterns,
        );

        let ollama = OllamaSettings {
            enabled: cli.summarize || ollama.enabled.unwrap_or(false),
            endpoint: cli
                .endpoint
                .or(ollama.endpoint)
                .unwrap_or_else(|| summarize::DEFAULT_ENDPOINT.to_string()),
            model: cli
                .model
                .or(ollama.model)
                .unwrap_or_else(|| summarize::DEFAULT_MODEL.to_string()),
            timeout: parse_duration("ollama.timeout", ollama.timeout.as_deref())?
                .unwrap_or(summarize::DEFAULT_TIMEOUT),
        };

        let max_workers = cli.jobs.or(scanning.max_workers);
        if max_workers == Some(0) {
            return Err(DiaryError::Config("max_workers must be at least 1".into()));
        }

        Ok(Self {
            root,
            mode,
            recursive: cli.recursive || scanning.recursive.unwrap_or(false),
            include_hidden: cli.include_hidden || scanning.include_hidden.unwrap_or(false),
            git: scanning.git.unwrap_or_else(|| "git".to_string()),
            timeout,
            engine: EngineConfig {
                filter,
                max_workers,
                max_repos: cli.max_repos.or(scanning.max_repos),
            },
            ollama,
        })
    }
}

impl Settings {
    pub fn walk(&self) -> WalkOptions {
        WalkOptions {
            recursive: self.recursive,
            include_hidden: self.include_hidden,
        }
    }
}

fn parse_duration(key: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|v| {
            humantime::parse_duration(v)
                .map_err(|e| DiaryError::Config(format!("{key}: invalid duration '{v}': {e}")))
        })
        .transpose()
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
