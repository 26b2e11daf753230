//! Job scheduling and execution infrastructure.
//!
//! This module is the pipeline's core: it cuts growing video sources into
//! analysis windows, stores each window as a durable job, and runs the
//! workers that resolve those jobs.
//!
//! # Architecture
//!
//! ```text
//! SegmentScheduler ──► JobStore ◄── WorkerPool
//!      (scan)             │            (claim)
//!                         │               │
//! RetryManager ───────────┘          JobExecutor
//!  (backoff requeue,                      │
//!   stale reclaim)          (transport, analyzers, results)
//! ```
//!
//! The three loops never talk to each other directly - the job store in
//! Postgres is the only shared state, and the claim protocol's
//! conditional update is the only mutual-exclusion mechanism. Multiple
//! worker processes may poll the same store concurrently.

pub mod executor;
mod job;
pub mod retry;
pub mod scheduler;
mod store;
pub mod windows;
pub mod worker;

pub use executor::{ExecuteError, ExecutorConfig, JobExecutor};
pub use job::{AnalysisJob, JobStatus, SourceKind};
pub use retry::{backoff_for, RetryConfig, RetryManager};
pub use scheduler::{SchedulerConfig, SegmentScheduler};
pub use store::JobStore;
pub use windows::{complete_windows, windows_for_source, AnalysisWindow};
pub use worker::{WorkerPool, WorkerPoolConfig};
