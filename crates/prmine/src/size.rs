//! Repository size screening.
//!
//! The cheap path trusts the size the search API reports. The accurate
//! path clones into a temp directory and measures the working tree;
//! any failure there reads as infinitely large so the repo is rejected
//! rather than silently admitted.

use std::path::Path;
use std::process::Stdio;

use tempfile::TempDir;

use crate::github::types::RepositoryDescriptor;

/// How repository size is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeStrategy {
    /// Use the KB figure from the search response.
    Reported,
    /// Clone the repository and measure the checkout on disk.
    CloneMeasure,
}

/// Convert the forge-reported KB figure to MB.
#[must_use]
pub fn reported_size_mb(size_kb: u64) -> f64 {
    size_kb as f64 / 1024.0
}

/// Clone `clone_url` into a temp directory and return the checkout size
/// in MB. Returns infinity when the clone or the measurement fails; the
/// temp directory is removed either way.
pub async fn measure_clone_size_mb(clone_url: &str) -> f64 {
    let Ok(dir) = TempDir::new() else {
        return f64::INFINITY;
    };
    let dest = dir.path().join("checkout");

    let status = tokio::process::Command::new("git")
        .arg("clone")
        .arg("--quiet")
        .arg(clone_url)
        .arg(&dest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => dir_size_bytes(&dest) as f64 / (1024.0 * 1024.0),
        _ => f64::INFINITY,
    }
}

fn dir_size_bytes(root: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    let mut total = 0;
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            total += dir_size_bytes(&entry.path());
        } else if file_type.is_file() {
            total += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    total
}

/// Size gate applied to every candidate repository.
#[derive(Debug, Clone, Copy)]
pub struct SizeFilter {
    pub strategy: SizeStrategy,
    pub max_repo_mb: f64,
}

impl SizeFilter {
    /// Measure `repo` according to the configured strategy.
    pub async fn measure(&self, repo: &RepositoryDescriptor) -> f64 {
        match self.strategy {
            SizeStrategy::Reported => reported_size_mb(repo.size_kb),
            SizeStrategy::CloneMeasure => measure_clone_size_mb(&repo.clone_url).await,
        }
    }

    /// Sizes at the limit pass; only strictly larger repos are cut.
    #[must_use]
    pub fn accepts(&self, size_mb: f64) -> bool {
        size_mb <= self.max_repo_mb
    }
}
