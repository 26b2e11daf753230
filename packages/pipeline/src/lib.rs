// Sightline - Segment Analysis Pipeline
//
// This crate turns continuous video sources (live feeds and finished
// recordings) into a deduplicated stream of bounded analysis jobs, and
// runs the worker layer that claims, executes, retries, and terminally
// resolves those jobs against external AI services.
//
// All cross-loop coordination goes through the job store in Postgres;
// there is no in-process shared job state.

pub mod common;
pub mod config;
pub mod kernel;
pub mod models;
pub mod server;

pub use config::*;
