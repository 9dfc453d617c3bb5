//! The harvest engine.
//!
//! Drives repository discovery, fans repositories out to a bounded set
//! of workers, and merges their rows into a deduplicated, periodically
//! flushed buffer. Workers never touch the sink; all persistence and
//! accounting happens in the orchestrator and the checkpoint callback.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::{CacheError, ResponseCache};
use crate::github::client::{CheckpointFn, GitHubClient};
use crate::github::error::GitHubError;
use crate::github::pulls::{get_pull, list_files};
use crate::github::search::{search_merged_prs, RepoSearch};
use crate::github::types::RepositoryDescriptor;
use crate::harvest::progress::{emit, HarvestProgress, ProgressCallback};
use crate::harvest::types::{HarvestOptions, HarvestRow, HarvestState, HarvestSummary};
use crate::http::HttpTransport;
use crate::linker::{IssueLinker, LinkerConfig};
use crate::qualifier::{PrQualifier, QualifierConfig};
use crate::sink::ResumableSink;
use crate::size::{SizeFilter, SizeStrategy};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("output error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

/// Run state plus its sink, shared between the orchestrator and the
/// checkpoint callback installed in the client.
#[derive(Clone)]
struct SharedBuffer {
    inner: Arc<Mutex<BufferInner>>,
}

struct BufferInner {
    state: HarvestState,
    sink: ResumableSink,
}

impl SharedBuffer {
    fn new(sink: ResumableSink) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BufferInner {
                state: HarvestState::default(),
                sink,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BufferInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Append all unsaved rows to the sink.
    fn flush(&self) -> io::Result<usize> {
        let mut inner = self.lock();
        let from = inner.state.last_saved_index;
        let saved = inner.sink.append_from(&inner.state.rows, from)?;
        inner.state.last_saved_index = saved;
        Ok(saved)
    }

    fn rows_collected(&self) -> usize {
        self.lock().state.rows.len()
    }
}

/// What one repository worker produced.
struct RepoOutcome {
    repo: String,
    result: RepoResult,
}

enum RepoResult {
    Skipped(String),
    Processed {
        rows: Vec<HarvestRow>,
        prs_checked: usize,
    },
}

struct RepoJob {
    client: GitHubClient,
    repo: RepositoryDescriptor,
    qualifier: PrQualifier,
    linker: IssueLinker,
    size_filter: SizeFilter,
    max_age_days: u32,
    page_cap: u32,
    shutdown: Arc<AtomicBool>,
}

/// Run a full harvest and return its accounting.
///
/// `shutdown` is polled between units of work; once set, no new
/// repositories are submitted, workers still in flight are abandoned
/// at their next await point, and whatever finished before the
/// interrupt is kept. Collected rows are flushed before returning,
/// on success, interrupt, and error paths alike, so every exit leaves
/// a resumable CSV.
pub async fn run_harvest(
    transport: Arc<dyn HttpTransport>,
    token: Option<String>,
    options: &HarvestOptions,
    shutdown: Arc<AtomicBool>,
    on_progress: Option<&ProgressCallback>,
) -> Result<HarvestSummary, HarvestError> {
    let sink = ResumableSink::new(&options.out_path);
    sink.ensure_header()?;
    let buffer = SharedBuffer::new(sink);

    let checkpoint: CheckpointFn = {
        let buffer = buffer.clone();
        Arc::new(move || buffer.flush().map(|_| ()))
    };

    let mut client = GitHubClient::new(transport, token)
        .with_checkpoint(checkpoint)
        .with_max_rate_limit_retries(options.max_rate_limit_retries);
    if !options.no_cache {
        let cache = ResponseCache::open(&options.cache_dir, options.cache_ttl)?;
        client = client.with_cache(cache);
    }

    let qualifier = PrQualifier::new(QualifierConfig {
        min_files: options.min_files,
        max_files: options.max_files,
        min_lines: options.min_lines,
        max_lines: options.max_lines,
    });
    let linker = IssueLinker::new(LinkerConfig {
        bare_ref_max_digits: options.bare_ref_max_digits,
    });
    let size_filter = SizeFilter {
        strategy: if options.verify_clone_size {
            SizeStrategy::CloneMeasure
        } else {
            SizeStrategy::Reported
        },
        max_repo_mb: options.max_repo_mb,
    };

    let mut search = RepoSearch::new(
        &client,
        options.min_stars,
        options.max_repos,
        options.repo_filter.clone(),
    );

    let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
    let mut repos_scanned = 0usize;
    let mut interrupted = false;

    let run_result: Result<(), HarvestError> = async {
        let mut workers: JoinSet<Result<RepoOutcome, GitHubError>> = JoinSet::new();
        let mut seen: HashSet<(String, u64)> = HashSet::new();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                interrupted = true;
                break;
            }

            // Drain finished workers first so the row cap sees their rows.
            while let Some(joined) = workers.try_join_next() {
                let outcome = joined.map_err(io::Error::other)??;
                apply_outcome(outcome, &buffer, &mut seen, on_progress, options)?;
            }

            if buffer.rows_collected() >= options.max_rows {
                break;
            }

            let Some(repo) = search.next().await? else {
                break;
            };
            repos_scanned += 1;
            emit(
                on_progress,
                HarvestProgress::RepoQueued {
                    repo: repo.full_name(),
                    stars: repo.stars,
                },
            );

            let job = RepoJob {
                client: client.clone(),
                repo,
                qualifier,
                linker,
                size_filter,
                max_age_days: options.max_age_days,
                page_cap: options.search_page_cap,
                shutdown: Arc::clone(&shutdown),
            };
            let semaphore = Arc::clone(&semaphore);
            workers.spawn(async move {
                // The semaphore is never closed, so acquisition only fails
                // if the runtime is tearing down anyway.
                let _permit = semaphore.acquire_owned().await.ok();
                process_repository(job).await
            });
        }

        if interrupted {
            // Keep only what already finished; abandon the rest.
            workers.abort_all();
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(result) => {
                        let outcome = result?;
                        apply_outcome(outcome, &buffer, &mut seen, on_progress, options)?;
                    }
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => return Err(io::Error::other(err).into()),
                }
            }
        } else {
            while let Some(joined) = workers.join_next().await {
                let outcome = joined.map_err(io::Error::other)??;
                apply_outcome(outcome, &buffer, &mut seen, on_progress, options)?;
            }
        }
        Ok(())
    }
    .await;

    // Flush whatever was collected before surfacing any failure, so an
    // aborted run still leaves a resumable CSV.
    let flushed = buffer.flush();
    run_result?;
    let rows_saved = flushed?;
    let summary = {
        let inner = buffer.lock();
        HarvestSummary {
            rows_saved,
            issues_checked: inner.state.issues_checked,
            prs_checked: inner.state.prs_checked,
            repos_scanned,
            interrupted,
        }
    };
    emit(
        on_progress,
        HarvestProgress::Done {
            rows_saved: summary.rows_saved,
            repos_scanned: summary.repos_scanned,
            interrupted: summary.interrupted,
        },
    );
    Ok(summary)
}

/// Merge one worker's outcome into the shared buffer, dropping rows
/// whose (repo, PR) pair was already collected, and flush when enough
/// new rows have accumulated.
fn apply_outcome(
    outcome: RepoOutcome,
    buffer: &SharedBuffer,
    seen: &mut HashSet<(String, u64)>,
    on_progress: Option<&ProgressCallback>,
    options: &HarvestOptions,
) -> Result<(), HarvestError> {
    match outcome.result {
        RepoResult::Skipped(reason) => {
            tracing::debug!(repo = %outcome.repo, %reason, "repository skipped");
            emit(
                on_progress,
                HarvestProgress::RepoSkipped {
                    repo: outcome.repo,
                    reason,
                },
            );
            Ok(())
        }
        RepoResult::Processed { rows, prs_checked } => {
            let mut kept = 0usize;
            let unsaved;
            {
                let mut inner = buffer.lock();
                inner.state.prs_checked += prs_checked;
                for row in rows {
                    if !seen.insert((row.repo.clone(), row.pr_number)) {
                        continue;
                    }
                    kept += 1;
                    inner.state.issues_checked += 1;
                    let total_rows = inner.state.rows.len() + 1;
                    emit(
                        on_progress,
                        HarvestProgress::RowCollected {
                            repo: row.repo.clone(),
                            issue_number: row.issue_number,
                            pr_number: row.pr_number,
                            total_rows,
                        },
                    );
                    inner.state.rows.push(row);
                }
                unsaved = inner.state.rows.len() - inner.state.last_saved_index;
            }

            emit(
                on_progress,
                HarvestProgress::RepoDone {
                    repo: outcome.repo,
                    rows: kept,
                    prs_checked,
                },
            );

            if unsaved >= options.checkpoint_every {
                let saved = buffer.flush()?;
                let inner = buffer.lock();
                emit(
                    on_progress,
                    HarvestProgress::Checkpoint {
                        rows_saved: saved,
                        issues_checked: inner.state.issues_checked,
                        prs_checked: inner.state.prs_checked,
                    },
                );
            }
            Ok(())
        }
    }
}

/// Process a single repository: size gate, PR discovery, per-PR
/// qualification, and issue linking. Per-PR failures, including a
/// fetch that exhausts its rate-limit retries, are logged and skipped
/// so one bad PR never discards the repository's other rows.
async fn process_repository(job: RepoJob) -> Result<RepoOutcome, GitHubError> {
    let repo = &job.repo;
    let full_name = repo.full_name();

    let size_mb = job.size_filter.measure(repo).await;
    if !job.size_filter.accepts(size_mb) {
        return Ok(RepoOutcome {
            repo: full_name,
            result: RepoResult::Skipped(format!("{size_mb:.1} MB exceeds the size limit")),
        });
    }

    let candidates = search_merged_prs(
        &job.client,
        &repo.owner,
        &repo.name,
        job.max_age_days,
        job.page_cap,
    )
    .await?;
    if candidates.is_empty() {
        return Ok(RepoOutcome {
            repo: full_name,
            result: RepoResult::Skipped("no linked merged PRs".to_string()),
        });
    }

    let mut rows = Vec::new();
    let mut prs_checked = 0usize;

    for candidate in candidates {
        if job.shutdown.load(Ordering::SeqCst) {
            break;
        }
        prs_checked += 1;

        let pr = match get_pull(&job.client, &repo.owner, &repo.name, candidate.number).await {
            Ok(Some(pr)) => pr,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(repo = %full_name, pr = candidate.number, error = %err,
                    "failed to fetch PR, skipping");
                continue;
            }
        };

        // The search already filters on is:merged, but trust the record.
        if pr.merged_at.is_none() {
            continue;
        }
        if job.qualifier.title_excluded(&pr.title) {
            continue;
        }
        if !job.qualifier.change_size_ok(&pr) {
            continue;
        }

        let files = match list_files(&job.client, &repo.owner, &repo.name, pr.number).await {
            Ok(files) => files,
            Err(err) => {
                tracing::warn!(repo = %full_name, pr = pr.number, error = %err,
                    "failed to list PR files, skipping");
                continue;
            }
        };
        if job.qualifier.docs_only(&files) {
            continue;
        }

        let issue = match job
            .linker
            .resolve(&job.client, &repo.owner, &repo.name, &pr, &candidate.title)
            .await
        {
            Ok(issue) => issue,
            Err(err) => {
                tracing::warn!(repo = %full_name, pr = pr.number, error = %err,
                    "failed to resolve linked issue, skipping");
                continue;
            }
        };

        rows.push(HarvestRow::new(repo, size_mb, &issue, &pr));
    }

    Ok(RepoOutcome {
        repo: full_name,
        result: RepoResult::Processed { rows, prs_checked },
    })
}
