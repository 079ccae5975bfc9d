//! Keeps the Go module dependencies of a fleet of GitHub repositories fresh.
//!
//! For every configured repository the [`commands::update::Updater`] checks for
//! an already open pull request, synchronizes a local clone, runs the
//! dependency upgrade and, when the manifest changed, pushes a branch and opens
//! a pull request. [`commands::schedule`] runs that over all repositories once
//! or periodically.

pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
