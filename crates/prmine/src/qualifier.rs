//! Heuristics that decide whether a merged PR is worth harvesting.

use std::sync::LazyLock;

use regex::Regex;

use crate::github::types::{FileChange, PullRequestRecord};

static TITLE_EXCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(doc|docs|documentation|readme|typo)\b")
        .unwrap_or_else(|e| unreachable!("title exclusion regex: {e}"))
});

/// Path prefixes that mark a file as documentation-adjacent. Example
/// directories are deliberately absent: example code is still code.
const DOC_LIKE_DIRS: [&str; 3] = ["docs/", "doc/", ".github/"];

/// Extensions that mark a file as documentation.
const DOC_LIKE_EXTS: [&str; 4] = [".md", ".rst", ".txt", ".adoc"];

/// Exact file names for tool and CI configuration, excluded wherever
/// they sit in the tree.
const CI_FILES: [&str; 7] = [
    ".pre-commit-config.yaml",
    "pyproject.toml",
    ".flake8",
    ".pylintrc",
    ".coveragerc",
    ".gitignore",
    ".editorconfig",
];

/// Inclusive bounds on a PR's change size.
#[derive(Debug, Clone, Copy)]
pub struct QualifierConfig {
    pub min_files: u64,
    pub max_files: u64,
    pub min_lines: u64,
    pub max_lines: u64,
}

impl Default for QualifierConfig {
    fn default() -> Self {
        Self {
            min_files: 5,
            max_files: 999_999,
            min_lines: 200,
            max_lines: 999_999,
        }
    }
}

/// Why a merged PR was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Title,
    ChangeSize,
    DocsOnly,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Title => write!(f, "documentation-flavored title"),
            Rejection::ChangeSize => write!(f, "change size out of bounds"),
            Rejection::DocsOnly => write!(f, "touches no code-like files"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PrQualifier {
    config: QualifierConfig,
}

impl PrQualifier {
    #[must_use]
    pub fn new(config: QualifierConfig) -> Self {
        Self { config }
    }

    /// True when the title signals a docs, readme, or typo change.
    #[must_use]
    pub fn title_excluded(&self, title: &str) -> bool {
        TITLE_EXCLUDE.is_match(title)
    }

    /// Check file-count and changed-line bounds, both inclusive.
    #[must_use]
    pub fn change_size_ok(&self, pr: &PullRequestRecord) -> bool {
        let c = &self.config;
        (c.min_files..=c.max_files).contains(&pr.changed_files)
            && (c.min_lines..=c.max_lines).contains(&pr.total_lines())
    }

    /// True when no changed file looks like code. A PR with an empty
    /// file list counts as documentation-only.
    #[must_use]
    pub fn docs_only(&self, files: &[FileChange]) -> bool {
        !files.iter().any(|f| is_code_like(&f.path))
    }
}

fn is_code_like(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();

    if DOC_LIKE_DIRS.iter().any(|dir| lower.starts_with(dir)) {
        return false;
    }
    if DOC_LIKE_EXTS.iter().any(|ext| lower.ends_with(ext)) {
        return false;
    }
    let file_name = lower.rsplit('/').next().unwrap_or(&lower);
    if CI_FILES.contains(&file_name) {
        return false;
    }
    true
}
