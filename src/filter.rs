//! Noise-path detection for diff statistics.
//!
//! Matching is done per path segment, never by substring, so `myenvfile.txt`
//! survives an `env` entry in the segment denylist.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SEGMENTS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "venv",
    ".venv",
    "env",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    "site-packages",
    "node_modules",
    "bower_components",
    "target",
    "dist",
];

pub const DEFAULT_PATTERNS: &[&str] = &[
    "*.pyc",
    "*.pyo",
    "*.class",
    "*.o",
    "*.a",
    "*.so",
    "*.dylib",
    "*.dll",
    "*.exe",
    "*.dist-info",
    "*.egg-info",
    "*.lock",
    "package-lock.json",
    "pnpm-lock.yaml",
];

/// Denylists injected by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Exact segment names (directories or files).
    pub segments: Vec<String>,
    /// Segment globs: `*suffix`, `prefix*` or an exact name.
    pub patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            segments: DEFAULT_SEGMENTS.iter().map(|s| s.to_string()).collect(),
            patterns: DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FilterConfig {
    pub fn extend<S, P>(mut self, segments: S, patterns: P) -> Self
    where
        S: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
    {
        self.segments.extend(segments);
        self.patterns.extend(patterns);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    Suffix(String),
    Prefix(String),
}

impl Pattern {
    fn parse(raw: &str) -> Option<Self> {
        if let Some(suffix) = raw.strip_prefix('*') {
            (!suffix.is_empty()).then(|| Pattern::Suffix(suffix.to_string()))
        } else if let Some(prefix) = raw.strip_suffix('*') {
            (!prefix.is_empty()).then(|| Pattern::Prefix(prefix.to_string()))
        } else if raw.is_empty() {
            None
        } else {
            Some(Pattern::Exact(raw.to_string()))
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Pattern::Exact(name) => segment == name,
            Pattern::Suffix(suffix) => segment.len() > suffix.len() && segment.ends_with(suffix),
            Pattern::Prefix(prefix) => segment.len() > prefix.len() && segment.starts_with(prefix),
        }
    }
}

/// Compiled form of [`FilterConfig`]. Pure and total.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    segments: Vec<String>,
    patterns: Vec<Pattern>,
}

impl NoiseFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            segments: config
                .segments
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect(),
            patterns: config.patterns.iter().filter_map(|p| Pattern::parse(p)).collect(),
        }
    }

    pub fn is_noise(&self, path: &str) -> bool {
        path.split(|c: char| c == '/' || c == '\\')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .any(|segment| self.segment_is_noise(segment))
    }

    fn segment_is_noise(&self, segment: &str) -> bool {
        self.segments.iter().any(|s| s == segment) || self.patterns.iter().any(|p| p.matches(segment))
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}
