//! # Component manager
//!
//! The façade collaborators drive a resolution session through:
//!
//! ```no_run
//! use std::path::Path;
//! use stackforge::component::{Component, Repository};
//! use stackforge::manager::ComponentManager;
//! use stackforge::params::Params;
//!
//! # fn main() -> stackforge::error::Result<()> {
//! let mut manager = ComponentManager::new(Path::new("/tmp/work"), Params::new());
//! let main = Component::new("main", Repository::local(Path::new("/srv/platform"))?);
//! manager.init(&main)?;
//! manager.ensure()?;
//!
//! let playbooks = manager.contains_file("deploy.yml", None, &[])?;
//! for found in playbooks.iter() {
//!     println!("{}", found.absolute_path().display());
//! }
//! playbooks.release()?;
//! # Ok(())
//! # }
//! ```
//!
//! It owns the [`ReferenceManager`], the [`Environment`] under construction
//! and the [`TemplateContext`]; once `ensure` returns, the environment is
//! only handed out read-only.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::component::{Component, ComponentReferencer};
use crate::defaults::{components_dir, MANIFEST_FILE};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::filesystem::PathKind;
use crate::finder::{find, MatchingPaths};
use crate::params::Params;
use crate::references::ReferenceManager;
use crate::template::{run_template, TemplateContext};
use crate::usable::UsableComponent;

/// Drives one resolution session.
pub struct ComponentManager {
    references: ReferenceManager,
    environment: Environment,
    context: TemplateContext,
}

impl ComponentManager {
    /// Creates a manager fetching under `<workdir>/components`.
    ///
    /// `vars` are the caller's variables; they take precedence over any
    /// variable a descriptor defines.
    pub fn new(workdir: &Path, vars: Params) -> Self {
        Self::with_fetcher(workdir, vars, Fetcher::new())
    }

    pub fn with_fetcher(workdir: &Path, vars: Params, fetcher: Fetcher) -> Self {
        Self {
            references: ReferenceManager::new(components_dir(workdir), fetcher),
            environment: Environment::default(),
            context: TemplateContext::new(vars),
        }
    }

    /// Resolves the main component and its ancestors.
    pub fn init(&mut self, main: &Component) -> Result<()> {
        self.references.init(main, &self.context)
    }

    /// Fetches and merges every component of the platform.
    pub fn ensure(&mut self) -> Result<()> {
        self.references
            .ensure(&mut self.environment, &mut self.context)
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn context(&self) -> &TemplateContext {
        &self.context
    }

    pub fn references(&self) -> &ReferenceManager {
        &self.references
    }

    /// Ids in the order `ensure` fetched them.
    pub fn sorted_fetched_components(&self) -> &[String] {
        self.references.sorted_fetched_components()
    }

    /// Materializes the component behind `referencer` with the session context.
    pub fn use_component(&self, referencer: &dyn ComponentReferencer) -> Result<UsableComponent> {
        self.use_component_with(referencer, &self.context)
    }

    /// Materializes the component behind `referencer`, templated against `context`.
    pub fn use_component_with(
        &self,
        referencer: &dyn ComponentReferencer,
        context: &TemplateContext,
    ) -> Result<UsableComponent> {
        let component = self.environment.platform.resolve(referencer)?;
        let fetched =
            self.references
                .fetched(&component.id)
                .ok_or_else(|| Error::UnresolvedComponent {
                    id: component.id.clone(),
                })?;
        let patterns = self.environment.platform.templates(&component.id);

        Ok(
            match run_template(context, &fetched.local_path, patterns, referencer)? {
                Some(duplicate) => UsableComponent::templated(&component.id, duplicate),
                None => UsableComponent::plain(&component.id, &fetched.local_path),
            },
        )
    }

    /// Components containing file `name`.
    ///
    /// `vars` are layered over the session variables for templating. An
    /// empty `referencers` slice searches the whole platform.
    pub fn contains_file(
        &self,
        name: &str,
        vars: Option<&Params>,
        referencers: &[&dyn ComponentReferencer],
    ) -> Result<MatchingPaths> {
        self.contains(PathKind::File, name, vars, referencers)
    }

    /// Components containing directory `name`.
    pub fn contains_directory(
        &self,
        name: &str,
        vars: Option<&Params>,
        referencers: &[&dyn ComponentReferencer],
    ) -> Result<MatchingPaths> {
        self.contains(PathKind::Directory, name, vars, referencers)
    }

    fn contains(
        &self,
        kind: PathKind,
        name: &str,
        vars: Option<&Params>,
        referencers: &[&dyn ComponentReferencer],
    ) -> Result<MatchingPaths> {
        let context = match vars {
            Some(vars) => self.context.with_vars(vars),
            None => self.context.clone(),
        };
        let everything: Vec<&dyn ComponentReferencer>;
        let candidates = if referencers.is_empty() {
            everything = self
                .environment
                .platform
                .components()
                .map(|c| c as &dyn ComponentReferencer)
                .collect();
            &everything[..]
        } else {
            referencers
        };
        find(kind, Path::new(name), candidates, |referencer| {
            self.use_component_with(referencer, &context)
        })
    }

    /// Local path of every fetched component, by id.
    pub fn component_paths(&self) -> BTreeMap<String, PathBuf> {
        self.references
            .fetched_components()
            .map(|fetched| (fetched.id.clone(), fetched.local_path.clone()))
            .collect()
    }

    /// Writes the component-path manifest into `dest_dir` and returns its path.
    pub fn write_component_paths(&self, dest_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dest_dir)?;
        let paths: BTreeMap<String, String> = self
            .component_paths()
            .into_iter()
            .map(|(id, path)| (id, path.display().to_string()))
            .collect();
        let manifest = dest_dir.join(MANIFEST_FILE);
        fs::write(&manifest, serde_yaml::to_string(&paths)?)?;
        info!("Wrote component paths to {}", manifest.display());
        Ok(manifest)
    }
}
