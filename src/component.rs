//! # Components and repositories
//!
//! A [`Component`] is a versioned, fetchable unit: an id unique within the
//! resolution session plus the [`Repository`] it lives in. Components are
//! built once from descriptor data and never change afterwards, except for
//! ancestors which are renamed by position on the spine (`parent1`,
//! `parent2`, ...) through [`Component::with_id`].
//!
//! [`FetchedComponent`] is the local materialization of a component, and
//! [`ComponentReferencer`] is the capability shared by everything that can be
//! resolved to a component (providers, stacks, tasks, the orchestrator, or a
//! component itself).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::defaults::DESCRIPTOR_FILE;
use crate::error::{Error, Result};

/// Kind of source control backing a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmKind {
    Git,
    /// Plain directory on the local filesystem.
    File,
}

impl ScmKind {
    /// Picks the SCM kind for `url`, honoring an explicit `scm` declaration.
    ///
    /// A `file:` URL always selects the local handler.
    pub fn select(url: &Url, declared: Option<&str>) -> Result<Self> {
        if url.scheme() == "file" {
            return Ok(ScmKind::File);
        }
        match declared.map(|s| s.to_ascii_lowercase()) {
            None => Ok(ScmKind::Git),
            Some(kind) if kind == "git" => Ok(ScmKind::Git),
            Some(kind) => Err(Error::Scm {
                operation: "select".to_string(),
                url: url.to_string(),
                path: String::new(),
                message: format!("unsupported scm kind '{}'", kind),
            }),
        }
    }
}

impl fmt::Display for ScmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScmKind::Git => write!(f, "git"),
            ScmKind::File => write!(f, "file"),
        }
    }
}

/// Authentication scheme understood by network-backed handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Basic { user: String, password: String },
    /// Password-only authentication; the user name defaults to `git`.
    Password { user: String, password: String },
    Token { token: String },
}

/// Authentication parameters as declared in a descriptor.
///
/// The method is kept as written; it is only interpreted by the handler
/// performing the fetch, which rejects methods it does not know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub method: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

impl Auth {
    fn param(&self, key: &str) -> Result<String> {
        self.params.get(key).cloned().ok_or_else(|| Error::Auth {
            method: self.method.clone(),
            message: format!("missing '{}' parameter", key),
        })
    }

    /// Interprets the declared method and its parameters.
    pub fn resolve(&self) -> Result<AuthMethod> {
        match self.method.to_ascii_lowercase().as_str() {
            "basic" => Ok(AuthMethod::Basic {
                user: self.param("user")?,
                password: self.param("password")?,
            }),
            "password" => Ok(AuthMethod::Password {
                user: self
                    .params
                    .get("user")
                    .cloned()
                    .unwrap_or_else(|| "git".to_string()),
                password: self.param("password")?,
            }),
            "token" => Ok(AuthMethod::Token {
                token: self.param("token")?,
            }),
            _ => Err(Error::Auth {
                method: self.method.clone(),
                message: "unknown authentication method".to_string(),
            }),
        }
    }
}

/// Where and how a component is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub url: Url,
    pub scm: ScmKind,
    /// Tag, branch or raw ref to check out; empty keeps the fetched HEAD.
    pub reference: String,
    /// Descriptor file name inside the repository.
    pub descriptor: String,
    pub auth: Option<Auth>,
}

impl Repository {
    pub fn new(url: Url, scm: ScmKind) -> Self {
        Self {
            url,
            scm,
            reference: String::new(),
            descriptor: DESCRIPTOR_FILE.to_string(),
            auth: None,
        }
    }

    /// A repository backed by a local directory.
    pub fn local(path: &Path) -> Result<Self> {
        let url = Url::from_directory_path(path).map_err(|_| Error::Filesystem {
            message: format!("cannot build a file URL from {}", path.display()),
        })?;
        Ok(Self::new(url, ScmKind::File))
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = reference.to_string();
        self
    }

    pub fn with_descriptor(mut self, descriptor: &str) -> Self {
        self.descriptor = descriptor.to_string();
        self
    }

    pub fn with_auth(mut self, auth: Option<Auth>) -> Self {
        self.auth = auth;
        self
    }

    /// Resolves a repository location as written in a descriptor.
    ///
    /// Full URLs are taken as is, absolute paths become `file:` URLs and
    /// anything else is joined onto `base` (`org/repo` on GitHub by default).
    pub fn resolve_location(location: &str, base: &Url) -> Result<Url> {
        if location.contains("://") {
            return Ok(Url::parse(location)?);
        }
        let path = Path::new(location);
        if path.is_absolute() {
            return Url::from_directory_path(path).map_err(|_| Error::Filesystem {
                message: format!("cannot build a file URL from {}", location),
            });
        }
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(location.trim_start_matches('/'))?)
    }

    /// Local directory of a `file:` repository.
    pub fn local_path(&self) -> Result<PathBuf> {
        self.url.to_file_path().map_err(|_| Error::Filesystem {
            message: format!("{} is not a local path", self.url),
        })
    }

    /// Identity used for cycle detection: URL and ref.
    pub fn key(&self) -> String {
        if self.reference.is_empty() {
            self.url.to_string()
        } else {
            format!("{}@{}", self.url, self.reference)
        }
    }
}

/// A fetchable unit of the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: String,
    pub repository: Repository,
}

impl Component {
    pub fn new(id: impl Into<String>, repository: Repository) -> Self {
        Self {
            id: id.into(),
            repository,
        }
    }

    /// Copy of this component under another id, used to number ancestors.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repository: self.repository.clone(),
        }
    }
}

/// Checks that `id` is a single, plain path segment.
///
/// Ids name the checkout directory under the components directory, so
/// anything that could resolve outside of it is refused.
pub fn check_component_id(id: &str) -> Result<()> {
    let message = if id.trim().is_empty() {
        "ids cannot be empty"
    } else if id == "." || id == ".." {
        "ids cannot be relative path components"
    } else if id.contains(['/', '\\']) {
        "ids cannot contain path separators"
    } else if id.contains('\0') {
        "ids cannot contain NUL bytes"
    } else {
        return Ok(());
    };
    Err(Error::InvalidComponentId {
        id: id.to_string(),
        message: message.to_string(),
    })
}

/// Anything that can be resolved to a component of the platform.
pub trait ComponentReferencer {
    /// Id of the component behind this referencer.
    fn component_id(&self) -> &str;

    /// Short description used in diagnostics.
    fn describe(&self) -> String {
        format!("component '{}'", self.component_id())
    }
}

impl ComponentReferencer for Component {
    fn component_id(&self) -> &str {
        &self.id
    }
}

impl ComponentReferencer for String {
    fn component_id(&self) -> &str {
        self
    }
}

/// A component materialized on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedComponent {
    pub id: String,
    pub local_path: PathBuf,
    pub has_descriptor: bool,
    pub local_url: Url,
    pub descriptor_url: Url,
}

impl FetchedComponent {
    /// Describes the checkout of `component` found at `local_path`.
    pub fn at(component: &Component, local_path: &Path) -> Result<Self> {
        let local_url = Url::from_directory_path(local_path).map_err(|_| Error::Filesystem {
            message: format!("cannot build a file URL from {}", local_path.display()),
        })?;
        let descriptor_url = local_url.join(&component.repository.descriptor)?;
        let has_descriptor = local_path.join(&component.repository.descriptor).is_file();
        Ok(Self {
            id: component.id.clone(),
            local_path: local_path.to_path_buf(),
            has_descriptor,
            local_url,
            descriptor_url,
        })
    }

    pub fn descriptor_path(&self) -> Result<PathBuf> {
        self.descriptor_url.to_file_path().map_err(|_| Error::Filesystem {
            message: format!("{} is not a local path", self.descriptor_url),
        })
    }
}
