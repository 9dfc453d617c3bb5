//! Progress events emitted during a harvest so frontends can render
//! spinners or log lines without the engine knowing about either.

/// A progress event. Fields carry enough context to render a line
/// without further lookups.
#[derive(Debug, Clone)]
pub enum HarvestProgress {
    RepoQueued {
        repo: String,
        stars: u64,
    },
    RepoSkipped {
        repo: String,
        reason: String,
    },
    RepoDone {
        repo: String,
        rows: usize,
        prs_checked: usize,
    },
    RowCollected {
        repo: String,
        issue_number: u64,
        pr_number: u64,
        total_rows: usize,
    },
    /// Buffered rows were flushed to the output file.
    Checkpoint {
        rows_saved: usize,
        issues_checked: usize,
        prs_checked: usize,
    },
    Done {
        rows_saved: usize,
        repos_scanned: usize,
        interrupted: bool,
    },
}

/// Callback invoked for each progress event.
pub type ProgressCallback = Box<dyn Fn(HarvestProgress) + Send + Sync>;

/// Emit an event if a callback is installed.
pub fn emit(callback: Option<&ProgressCallback>, event: HarvestProgress) {
    if let Some(callback) = callback {
        callback(event);
    }
}
