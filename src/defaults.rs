//! Default values for stackforge configuration.
//!
//! This module provides centralized default values and reserved identifiers
//! used across the engine and the CLI, ensuring consistency and avoiding
//! duplication.

use std::path::PathBuf;

/// Id given to the component holding the main descriptor.
pub const MAIN_COMPONENT_ID: &str = "main";

/// Base id of ancestors; the position on the spine is appended (`parent1`).
pub const PARENT_COMPONENT_ID: &str = "parent";

/// Marker used in a descriptor to reference the component holding it.
pub const SELF_REFERENCE: &str = "_";

/// Descriptor file name looked up in a component when none is declared.
pub const DESCRIPTOR_FILE: &str = "stackforge.yaml";

/// Sub-directory of the work directory receiving fetched components.
pub const COMPONENTS_DIR: &str = "components";

/// Base URL relative repository names are resolved against.
pub const DEFAULT_BASE_URL: &str = "https://github.com";

/// File name of the component-path manifest.
pub const MANIFEST_FILE: &str = "components.yaml";

/// Returns the default work directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/stackforge` (XDG Base Directory)
/// - macOS: `~/Library/Caches/stackforge`
/// - Windows: `{FOLDERID_LocalAppData}\stackforge`
///
/// Falls back to `.stackforge` in the current directory if the platform
/// cache directory cannot be determined.
///
/// This can be overridden by the `--workdir` CLI flag or the
/// `STACKFORGE_WORKDIR` environment variable.
pub fn default_workdir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("stackforge"))
        .unwrap_or_else(|| PathBuf::from(".stackforge"))
}

/// Directory receiving fetched components for a given work directory.
pub fn components_dir(workdir: &std::path::Path) -> PathBuf {
    workdir.join(COMPONENTS_DIR)
}

/// Id of the ancestor at `position` on the spine (1 is the nearest).
pub fn parent_id(position: usize) -> String {
    format!("{}{}", PARENT_COMPONENT_ID, position)
}

/// True for ids the engine assigns to the main component and its ancestors.
pub fn is_spine_id(id: &str) -> bool {
    if id == MAIN_COMPONENT_ID {
        return true;
    }
    id.strip_prefix(PARENT_COMPONENT_ID)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
