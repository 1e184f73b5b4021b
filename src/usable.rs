//! Usable components: the handle callers read component files through.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Result;
use crate::filesystem::remove_tree;

/// A component ready to be read from disk.
///
/// Either the fetched directory itself or, when the component declares
/// template patterns, a templated duplicate owned by this handle. Call
/// [`UsableComponent::release`] when done; a duplicate still present when
/// the handle is dropped is removed with a warning.
#[derive(Debug)]
#[must_use = "a usable component must be released"]
pub struct UsableComponent {
    id: String,
    root: PathBuf,
    templated: bool,
    released: bool,
}

impl UsableComponent {
    /// Handle on the fetched directory of a component.
    pub fn plain(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::build(id.into(), root.into(), false)
    }

    /// Handle owning a templated duplicate.
    pub fn templated(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::build(id.into(), root.into(), true)
    }

    fn build(id: String, root: PathBuf, templated: bool) -> Self {
        Self {
            id,
            root,
            templated,
            released: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn is_templated(&self) -> bool {
        self.templated
    }

    /// Releases the handle, deleting the templated duplicate if any.
    pub fn release(mut self) -> Result<()> {
        self.cleanup()
    }

    fn cleanup(&mut self) -> Result<()> {
        if self.templated && !self.released {
            debug!("Releasing templated copy {}", self.root.display());
            remove_tree(&self.root)?;
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for UsableComponent {
    fn drop(&mut self) {
        if self.templated && !self.released {
            warn!(
                "Templated copy of component '{}' was not released: removing {}",
                self.id,
                self.root.display()
            );
            if let Err(e) = self.cleanup() {
                warn!("Failed to remove {}: {}", self.root.display(), e);
            }
        }
    }
}
