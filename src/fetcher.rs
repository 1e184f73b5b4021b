//! # Component fetching
//!
//! This module provides the [`Fetcher`], which materializes a component
//! under `<destination>/<component-id>/` through the handler matching its
//! repository kind.
//!
//! ## Design
//!
//! The fetcher owns one [`ScmHandler`] per repository kind. Each fetch goes
//! through the same decision:
//!
//! 1.  If the target directory exists and the handler recognizes it as a
//!     checkout of the same remote (`matches`), it is updated in place.
//! 2.  Otherwise any stale directory is deleted and the repository is
//!     fetched from scratch.
//! 3.  In both cases the handler then switches to the declared ref.
//!
//! Only the remote URL takes part in the `matches` decision; a changed ref on
//! an otherwise matching checkout is handled by the final `switch`.
//!
//! Handlers are injected as trait objects so tests can replace them with
//! mocks and observe the decisions without touching git or the network.

use std::path::Path;

use log::{debug, info};

use crate::component::{check_component_id, Component, FetchedComponent, ScmKind};
use crate::error::Result;
use crate::filesystem::remove_tree;
use crate::scm::{FileHandler, GitHandler, ScmHandler};

/// Materializes components on the local filesystem.
pub struct Fetcher {
    git: Box<dyn ScmHandler>,
    file: Box<dyn ScmHandler>,
}

impl Fetcher {
    /// Creates a fetcher using the system `git` and plain directory copies.
    pub fn new() -> Self {
        Self {
            git: Box::new(GitHandler::new()),
            file: Box::new(FileHandler::new()),
        }
    }

    /// Creates a fetcher with custom handlers.
    ///
    /// This is primarily used for testing to inject mock handlers.
    pub fn with_handlers(git: Box<dyn ScmHandler>, file: Box<dyn ScmHandler>) -> Self {
        Self { git, file }
    }

    fn handler(&self, kind: ScmKind) -> &dyn ScmHandler {
        match kind {
            ScmKind::Git => self.git.as_ref(),
            ScmKind::File => self.file.as_ref(),
        }
    }

    /// Fetches `component` into `destination_root/<id>` and checks out its ref.
    pub fn fetch(&self, destination_root: &Path, component: &Component) -> Result<FetchedComponent> {
        let repository = &component.repository;
        let url = repository.url.to_string();
        let wrap = |e: crate::error::Error| e.in_component(&component.id, &url);
        check_component_id(&component.id).map_err(wrap)?;

        let destination_root = std::path::absolute(destination_root).map_err(|e| wrap(e.into()))?;
        let path = destination_root.join(&component.id);
        let handler = self.handler(repository.scm);
        let auth = repository.auth.as_ref();

        if path.exists() && handler.matches(repository, &path) {
            info!("Updating component '{}' from {}", component.id, url);
            handler.update(&path, auth).map_err(wrap)?;
        } else {
            if path.exists() {
                debug!("Removing stale checkout {}", path.display());
                remove_tree(&path).map_err(wrap)?;
            }
            info!(
                "Fetching component '{}' from {} ({})",
                component.id, url, repository.scm
            );
            handler.fetch(repository, &path, auth).map_err(wrap)?;
        }

        handler.switch(&path, &repository.reference).map_err(wrap)?;
        FetchedComponent::at(component, &path).map_err(wrap)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
