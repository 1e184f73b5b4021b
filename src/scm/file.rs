use std::path::Path;

use log::debug;

use super::ScmHandler;
use crate::component::{Auth, Repository};
use crate::error::{Error, Result};
use crate::filesystem::copy_tree;

/// Handler for repositories that are plain local directories.
#[derive(Debug, Default)]
pub struct FileHandler;

impl FileHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ScmHandler for FileHandler {
    /// Never matches: a local source cannot be compared cheaply, so it is
    /// copied afresh every time.
    fn matches(&self, _repository: &Repository, _path: &Path) -> bool {
        false
    }

    fn fetch(&self, repository: &Repository, path: &Path, _auth: Option<&Auth>) -> Result<()> {
        let source = repository.local_path()?;
        if !source.is_dir() {
            return Err(Error::Scm {
                operation: "fetch".to_string(),
                url: repository.url.to_string(),
                path: path.display().to_string(),
                message: format!("{} is not a directory", source.display()),
            });
        }
        debug!("Copying {} into {}", source.display(), path.display());
        copy_tree(&source, path, true).map_err(|e| Error::Scm {
            operation: "fetch".to_string(),
            url: repository.url.to_string(),
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    fn update(&self, path: &Path, _auth: Option<&Auth>) -> Result<()> {
        // Unreachable through the fetcher since `matches` is always false.
        Err(Error::Scm {
            operation: "update".to_string(),
            url: String::new(),
            path: path.display().to_string(),
            message: "local copies cannot be updated in place".to_string(),
        })
    }

    fn switch(&self, path: &Path, reference: &str) -> Result<()> {
        if !reference.is_empty() {
            debug!(
                "Ignoring ref '{}' for local copy {}",
                reference,
                path.display()
            );
        }
        Ok(())
    }
}
