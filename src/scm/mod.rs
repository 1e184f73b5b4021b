//! # Source-control handlers
//!
//! A handler knows how to bring one kind of repository onto the local
//! filesystem and keep it there. The [`Fetcher`](crate::fetcher::Fetcher)
//! picks one per component and drives it through the same sequence every
//! time: `matches` to decide between `update` and a fresh `fetch`, then
//! `switch` to the declared ref.
//!
//! Two handlers ship with the engine:
//!
//! - [`GitHandler`]: runs the system `git` binary, which picks up SSH keys,
//!   credential helpers and `~/.gitconfig` on its own; descriptor-declared
//!   basic, password and token authentication is layered on top.
//! - [`FileHandler`]: copies a local directory. It never matches an existing
//!   checkout, so every run takes a fresh copy.
//!
//! The trait is the seam used by tests to observe the fetch decisions
//! without touching the network.

use std::path::Path;

use crate::component::{Auth, Repository};
use crate::error::Result;

pub mod file;
pub mod git;

pub use file::FileHandler;
pub use git::GitHandler;

/// Operations a source-control backend provides against one repository.
pub trait ScmHandler: Send + Sync {
    /// True if `path` already holds a checkout of `repository`.
    fn matches(&self, repository: &Repository, path: &Path) -> bool;

    /// Clones or copies `repository` into `path`.
    fn fetch(&self, repository: &Repository, path: &Path, auth: Option<&Auth>) -> Result<()>;

    /// Refreshes the checkout at `path`. Being already up to date is not an error.
    fn update(&self, path: &Path, auth: Option<&Auth>) -> Result<()>;

    /// Checks out `reference` in `path`; an empty reference keeps the current HEAD.
    fn switch(&self, path: &Path, reference: &str) -> Result<()>;
}
