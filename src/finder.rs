//! # Finding files across components
//!
//! Answers "which components contain `<relative path>`?". Each candidate
//! referencer is turned into a [`UsableComponent`] (templated if needed) and
//! checked for the path. Components without the path are released on the
//! spot; the others are returned as [`MatchingPaths`] that keep their usable
//! component alive until the caller releases them.

use std::path::{Path, PathBuf};

use log::debug;

use crate::component::ComponentReferencer;
use crate::error::Result;
use crate::filesystem::PathKind;
use crate::usable::UsableComponent;

/// A path found inside one component.
#[derive(Debug)]
pub struct MatchingPath {
    component: UsableComponent,
    relative_path: PathBuf,
}

impl MatchingPath {
    pub fn component(&self) -> &UsableComponent {
        &self.component
    }

    pub fn component_id(&self) -> &str {
        self.component.id()
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Location of the path inside the (possibly templated) component.
    pub fn absolute_path(&self) -> PathBuf {
        self.component.root_path().join(&self.relative_path)
    }

    pub fn release(self) -> Result<()> {
        self.component.release()
    }
}

/// All matches of one search, in candidate order.
#[derive(Debug, Default)]
#[must_use = "matching paths must be released"]
pub struct MatchingPaths {
    paths: Vec<MatchingPath>,
}

impl MatchingPaths {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchingPath> {
        self.paths.iter()
    }

    pub fn component_ids(&self) -> Vec<&str> {
        self.paths.iter().map(MatchingPath::component_id).collect()
    }

    /// Releases every match; the first failure is reported after all ran.
    pub fn release(self) -> Result<()> {
        let mut outcome = Ok(());
        for path in self.paths {
            let released = path.release();
            if outcome.is_ok() {
                outcome = released;
            }
        }
        outcome
    }
}

impl IntoIterator for MatchingPaths {
    type Item = MatchingPath;
    type IntoIter = std::vec::IntoIter<MatchingPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}

/// Searches `candidates` for `relative_path` of the given kind.
///
/// `use_component` materializes a candidate. If it fails, matches collected
/// so far are released before the error is returned.
pub fn find<F>(
    kind: PathKind,
    relative_path: &Path,
    candidates: &[&dyn ComponentReferencer],
    mut use_component: F,
) -> Result<MatchingPaths>
where
    F: FnMut(&dyn ComponentReferencer) -> Result<UsableComponent>,
{
    let mut found = MatchingPaths::default();

    for &candidate in candidates {
        let usable = match use_component(candidate) {
            Ok(usable) => usable,
            Err(e) => {
                let _ = found.release();
                return Err(e);
            }
        };

        if kind.matches(&usable.root_path().join(relative_path)) {
            debug!(
                "Found {} in {}",
                relative_path.display(),
                candidate.describe()
            );
            found.paths.push(MatchingPath {
                component: usable,
                relative_path: relative_path.to_path_buf(),
            });
        } else {
            usable.release()?;
        }
    }

    Ok(found)
}
