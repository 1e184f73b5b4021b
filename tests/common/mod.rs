//! Shared test utilities for integration and E2E tests.
//!
//! Platforms under test are built from local component directories, so no
//! test here needs git or the network.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = PlatformFixture::new();
//!     fixture.component("app", "name: demo\n");
//!     let manager = fixture.resolve("app", Params::new());
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

use stackforge::component::{Component, Repository};
use stackforge::defaults::DESCRIPTOR_FILE;
use stackforge::manager::ComponentManager;
use stackforge::params::Params;

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;
    pub use stackforge::params::Params;

    pub use super::PlatformFixture;
}

/// A temporary directory holding component sources and a work directory.
///
/// Sources live under `sources/<name>/`, fetched components under
/// `work/components/`.
pub struct PlatformFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl PlatformFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Creates source component `name` with the given descriptor.
    pub fn component(&self, name: &str, descriptor: &str) -> &Self {
        self.file(name, DESCRIPTOR_FILE, descriptor)
    }

    /// Creates source component `name` without a descriptor.
    pub fn bare_component(&self, name: &str) -> &Self {
        self.file(name, "origin.txt", name)
    }

    /// Adds a file to source component `name`.
    pub fn file(&self, name: &str, path: &str, content: &str) -> &Self {
        self.temp_dir
            .child("sources")
            .child(name)
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Absolute location of source component `name`, for descriptors.
    pub fn source(&self, name: &str) -> String {
        self.source_path(name).display().to_string()
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("sources").join(name)
    }

    pub fn workdir(&self) -> PathBuf {
        self.temp_dir.path().join("work")
    }

    pub fn components_dir(&self) -> PathBuf {
        self.workdir().join("components")
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Number of directories currently under the components directory.
    pub fn component_dir_count(&self) -> usize {
        std::fs::read_dir(self.components_dir())
            .map(|entries| entries.filter(|e| e.as_ref().is_ok_and(|e| e.path().is_dir())).count())
            .unwrap_or(0)
    }

    pub fn main_component(&self, name: &str) -> Component {
        let repository =
            Repository::local(&self.source_path(name)).expect("Failed to build repository");
        Component::new("main", repository)
    }

    /// Runs init and ensure with `name` as main component.
    pub fn resolve(&self, name: &str, vars: Params) -> ComponentManager {
        let mut manager = ComponentManager::new(&self.workdir(), vars);
        manager
            .init(&self.main_component(name))
            .expect("init failed");
        manager.ensure().expect("ensure failed");
        manager
    }
}

impl Default for PlatformFixture {
    fn default() -> Self {
        Self::new()
    }
}
