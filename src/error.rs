//! # Error Handling
//!
//! This module defines the centralized error type for `stackforge`. It uses
//! the `thiserror` library to build a single `Error` enum covering every
//! failure the resolution engine can hit, with enough context (component id,
//! repository URL, local path, operation) to diagnose the failure without a
//! debugger.
//!
//! The variants follow the engine's failure taxonomy:
//!
//! - Source-control failures (`Scm`, `Auth`), always carrying the repository
//!   URL and the local checkout path.
//! - Descriptor failures (`DescriptorParse`, `DescriptorMissing`).
//! - Resolution failures (`UnresolvedComponent`, `CycleDetected`).
//! - Filesystem and templating failures (`Filesystem`, `Template`).
//!
//! `Fetch` wraps any of the above with the component that was being fetched,
//! so an error surfacing from deep inside a parent walk still names the
//! component responsible for it.
//!
//! Nothing in the engine recovers from an error: every variant aborts the
//! enclosing `init`/`ensure`/`use` call and is returned to the caller as is.

use thiserror::Error;

/// Main error type for stackforge operations
#[derive(Error, Debug)]
pub enum Error {
    /// A source-control operation (fetch, update, switch, match) failed.
    #[error("SCM {operation} failed for {url} at {path}: {message}")]
    Scm {
        operation: String,
        url: String,
        path: String,
        message: String,
    },

    /// The authentication parameters of a repository are unusable.
    #[error("Unsupported authentication for method '{method}': {message}")]
    Auth { method: String, message: String },

    /// A component descriptor is malformed or misses required structure.
    #[error("Descriptor parsing error in component '{component}': {message}")]
    DescriptorParse { component: String, message: String },

    /// A component that must carry a descriptor (main or parent) has none.
    #[error("Component '{component}' has no descriptor at {path}")]
    DescriptorMissing { component: String, path: String },

    /// A component id cannot name a directory under the components directory.
    #[error("Invalid component id '{id}': {message}")]
    InvalidComponentId { id: String, message: String },

    /// A referencer points to a component that was never declared or fetched.
    #[error("Component '{id}' is not available in the platform")]
    UnresolvedComponent { id: String },

    /// The parent chain loops back on itself.
    #[error("Cycle detected in parent chain: {cycle}")]
    CycleDetected { cycle: String },

    /// A component file failed to render.
    ///
    /// Undefined variables are reported here rather than rendered blank.
    #[error("Template processing error{}: {message}", file.as_ref().map(|f| format!(" in {}", f)).unwrap_or_default())]
    Template {
        message: String,
        /// The file being rendered, if applicable
        file: Option<String>,
    },

    /// A filesystem operation on a component tree failed.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// Context wrapper naming the component whose fetch or merge failed.
    #[error("Failed to fetch component '{component}' from {url}: {source}")]
    Fetch {
        component: String,
        url: String,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A directory walk error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    /// Wraps `self` with the component being fetched when it failed.
    pub fn in_component(self, component: &str, url: &str) -> Self {
        match self {
            // Already attributed closer to the failure.
            Error::Fetch { .. } => self,
            other => Error::Fetch {
                component: component.to_string(),
                url: url.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
