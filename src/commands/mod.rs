//! # CLI Command Implementations
//!
//! Each subcommand lives in its own file with an `Args` struct derived using
//! `clap` and an `execute` function. The options shared by every command
//! (where the platform is, where to fetch it, which variables to use) are in
//! [`SessionArgs`], which also opens the resolution session.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use url::Url;

use stackforge::component::{Component, Repository, ScmKind};
use stackforge::defaults::{default_workdir, DEFAULT_BASE_URL, MAIN_COMPONENT_ID};
use stackforge::manager::ComponentManager;
use stackforge::params::Params;

pub mod find;
pub mod resolve;

/// Options locating the platform and the session state.
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Main component: a local directory, a repository URL or `org/repo`.
    #[arg(value_name = "LOCATION")]
    pub location: String,

    /// Ref (tag, branch or refs/...) of the main component.
    #[arg(long = "ref", value_name = "REF", default_value = "")]
    pub reference: String,

    /// Descriptor file name of the main component.
    #[arg(long, value_name = "FILE")]
    pub descriptor: Option<String>,

    /// Directory receiving fetched components.
    ///
    /// Defaults to the system's cache directory (e.g. `~/.cache/stackforge`
    /// on Linux).
    #[arg(long, value_name = "DIR", env = "STACKFORGE_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// YAML file of variables; they override descriptor variables.
    #[arg(long, value_name = "FILE", env = "STACKFORGE_VARS")]
    pub vars: Option<PathBuf>,

    /// Single variable as KEY=VALUE; applied over --vars.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub var: Vec<String>,
}

impl SessionArgs {
    pub fn workdir(&self) -> PathBuf {
        self.workdir.clone().unwrap_or_else(default_workdir)
    }

    /// Variables from `--vars` and `--var`.
    pub fn variables(&self) -> Result<Params> {
        let mut params = match &self.vars {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read variables from {}", path.display()))?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("Invalid variables file {}", path.display()))?
            }
            None => Params::new(),
        };
        for pair in &self.var {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got '{}'", pair))?;
            params.insert(key.trim(), value);
        }
        Ok(params)
    }

    /// The main component designated by `location`.
    pub fn main_component(&self) -> Result<Component> {
        let local = Path::new(&self.location);
        let repository = if local.is_dir() {
            let path = std::path::absolute(local)?;
            Repository::local(&path)?
        } else {
            let base = Url::parse(DEFAULT_BASE_URL)?;
            let url = Repository::resolve_location(&self.location, &base)?;
            let scm = ScmKind::select(&url, None)?;
            Repository::new(url, scm)
        };
        let mut repository = repository.with_reference(&self.reference);
        if let Some(descriptor) = &self.descriptor {
            repository = repository.with_descriptor(descriptor);
        }
        Ok(Component::new(MAIN_COMPONENT_ID, repository))
    }

    /// Resolves the platform: init then ensure.
    pub fn open(&self) -> Result<ComponentManager> {
        let main = self.main_component()?;
        let mut manager = ComponentManager::new(&self.workdir(), self.variables()?);
        manager
            .init(&main)
            .with_context(|| format!("Failed to resolve {}", self.location))?;
        manager
            .ensure()
            .with_context(|| format!("Failed to fetch the components of {}", self.location))?;
        Ok(manager)
    }
}
