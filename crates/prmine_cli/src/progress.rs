//! Progress reporting for harvest runs.
//!
//! Two modes, auto-detected from the terminal:
//! - Interactive (TTY): animated bars using indicatif
//! - Logging (non-TTY): structured logging using tracing

use std::sync::{Arc, Mutex};

use console::Term;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use prmine::{HarvestProgress, ProgressCallback};

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    Interactive(InteractiveReporter),
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a reporter, auto-detecting TTY mode. `max_rows` sizes
    /// the row-collection bar.
    pub fn new(max_rows: usize) -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new(max_rows))
        } else {
            Self::Logging(LoggingReporter)
        }
    }

    pub fn handle(&self, event: HarvestProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to the callback type the library expects.
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| reporter.handle(event))
    }

    /// Finish all progress bars (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

/// Animated progress bars for interactive terminals.
pub struct InteractiveReporter {
    multi: MultiProgress,
    repo_spinner: ProgressBar,
    row_bar: ProgressBar,
    state: Mutex<Counters>,
}

#[derive(Default)]
struct Counters {
    repos_scanned: usize,
    repos_skipped: usize,
}

impl InteractiveReporter {
    fn new(max_rows: usize) -> Self {
        let multi = MultiProgress::new();

        let repo_spinner = multi.add(ProgressBar::new_spinner());
        repo_spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        repo_spinner.enable_steady_tick(std::time::Duration::from_millis(100));

        let row_bar = multi.add(ProgressBar::new(max_rows as u64));
        row_bar.set_style(
            ProgressStyle::with_template(
                "{bar:30.cyan/blue} {pos}/{len} rows {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        Self {
            multi,
            repo_spinner,
            row_bar,
            state: Mutex::new(Counters::default()),
        }
    }

    fn handle(&self, event: HarvestProgress) {
        match event {
            HarvestProgress::RepoQueued { repo, stars } => {
                let mut state = self.lock_state();
                state.repos_scanned += 1;
                self.repo_spinner.set_message(format!(
                    "scanning {repo} ({stars} stars, {} scanned)",
                    state.repos_scanned
                ));
            }
            HarvestProgress::RepoSkipped { repo, reason } => {
                let mut state = self.lock_state();
                state.repos_skipped += 1;
                self.repo_spinner
                    .set_message(format!("skipped {repo}: {reason}"));
            }
            HarvestProgress::RepoDone { repo, rows, .. } => {
                if rows > 0 {
                    self.repo_spinner
                        .set_message(format!("{repo}: {rows} rows collected"));
                }
            }
            HarvestProgress::RowCollected { total_rows, .. } => {
                self.row_bar.set_position(total_rows as u64);
            }
            HarvestProgress::Checkpoint { rows_saved, .. } => {
                self.row_bar
                    .set_message(format!("({rows_saved} saved)"));
            }
            HarvestProgress::Done {
                rows_saved,
                repos_scanned,
                interrupted,
            } => {
                let verb = if interrupted { "interrupted" } else { "done" };
                self.row_bar.set_message(format!(
                    "{verb}: {rows_saved} rows from {repos_scanned} repos"
                ));
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn finish(&self) {
        self.repo_spinner.finish_and_clear();
        self.row_bar.finish();
        let _ = self.multi.clear();
    }
}

/// Structured logging for non-TTY environments (CI, pipes).
pub struct LoggingReporter;

impl LoggingReporter {
    fn handle(&self, event: HarvestProgress) {
        match event {
            HarvestProgress::RepoQueued { repo, stars } => {
                tracing::info!(%repo, stars, "scanning repository");
            }
            HarvestProgress::RepoSkipped { repo, reason } => {
                tracing::info!(%repo, %reason, "repository skipped");
            }
            HarvestProgress::RepoDone {
                repo,
                rows,
                prs_checked,
            } => {
                tracing::info!(%repo, rows, prs_checked, "repository done");
            }
            HarvestProgress::RowCollected {
                repo,
                issue_number,
                pr_number,
                total_rows,
            } => {
                tracing::info!(%repo, issue_number, pr_number, total_rows, "row collected");
            }
            HarvestProgress::Checkpoint {
                rows_saved,
                issues_checked,
                prs_checked,
            } => {
                tracing::info!(rows_saved, issues_checked, prs_checked, "checkpoint saved");
            }
            HarvestProgress::Done {
                rows_saved,
                repos_scanned,
                interrupted,
            } => {
                tracing::info!(rows_saved, repos_scanned, interrupted, "harvest finished");
            }
        }
    }
}
