//! Prmine - harvest closed issues paired with the merged PR that
//! resolved them.
//!
//! The library discovers popular repositories through the GitHub search
//! API, screens their merged pull requests with a set of quality
//! heuristics, resolves which issue each PR closed, and appends the
//! resulting pairs to a resumable CSV.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::{atomic::AtomicBool, Arc};
//! use prmine::{run_harvest, HarvestOptions, ReqwestTransport};
//!
//! let transport = Arc::new(ReqwestTransport::default());
//! let shutdown = Arc::new(AtomicBool::new(false));
//! let summary = run_harvest(
//!     transport,
//!     std::env::var("GITHUB_TOKEN").ok(),
//!     &HarvestOptions::default(),
//!     shutdown,
//!     None,
//! )
//! .await?;
//! println!("saved {} rows", summary.rows_saved);
//! ```

pub mod cache;
pub mod github;
pub mod harvest;
pub mod http;
pub mod linker;
pub mod qualifier;
pub mod sink;
pub mod size;

pub use cache::ResponseCache;
pub use github::{GitHubClient, GitHubError, RepositoryDescriptor};
pub use harvest::{
    run_harvest, HarvestError, HarvestOptions, HarvestProgress, HarvestRow, HarvestSummary,
    ProgressCallback,
};
pub use http::{HttpTransport, ReqwestTransport};
pub use sink::ResumableSink;
