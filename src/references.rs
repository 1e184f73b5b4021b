//! # Reference resolution
//!
//! The [`ReferenceManager`] decides which components make up the platform
//! and in which order they are fetched and merged.
//!
//! ## Init
//!
//! 1.  The main component is fetched and its descriptor parsed. Components
//!     it *uses* (as orchestrator, provider, stack or task) are recorded, as
//!     are the components it *declares*. Used ids without a declaration are
//!     orphans for now.
//! 2.  If the descriptor has a parent, the ancestor chain (the "spine") is
//!     walked. Each ancestor is renamed by its position (`parent1` is the
//!     nearest), fetched and parsed the same way. Its declarations only count
//!     for ids nobody nearer has claimed yet, so the main descriptor overrides
//!     its parent, which overrides its own parent, and so on. Orphans are
//!     carried up until an ancestor declares them.
//!
//! Only the main descriptor and the spine may declare components. What a
//! plain dependency declares is never looked at.
//!
//! ## Ensure
//!
//! The spine is walked backwards, farthest ancestor first. For each
//! ancestor, its own declarations that are also used are fetched in
//! alphabetical order, then the ancestor itself; the main descriptor's used
//! declarations and the main descriptor itself come last. Every fetched
//! component is registered into the environment and its descriptor merged,
//! so a component merged later sees the variables of those merged before.
//!
//! Declared-but-unused components are never fetched. Orphans that remain at
//! the end are not an error by themselves: they are reported, and resolving
//! one of them later fails with [`Error::UnresolvedComponent`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::component::{Component, FetchedComponent};
use crate::defaults::{parent_id, MAIN_COMPONENT_ID};
use crate::descriptor::{Descriptor, DescriptorReferences};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::template::TemplateContext;

/// An ancestor on the spine with the declarations it introduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub component: Component,
    /// Declarations of this ancestor not already claimed by a nearer one.
    pub components: BTreeMap<String, Component>,
}

/// Running totals of the references seen along the spine.
#[derive(Debug, Default)]
struct ReferenceTally {
    used: BTreeSet<String>,
    referenced: BTreeMap<String, Component>,
    orphans: BTreeSet<String>,
}

impl ReferenceTally {
    /// Folds the references of `owner`'s descriptor into the totals and
    /// returns the declarations it newly introduced.
    fn observe(&mut self, owner: &str, refs: &DescriptorReferences) -> BTreeMap<String, Component> {
        let mut added = BTreeMap::new();
        for (id, component) in &refs.declared {
            if self.referenced.contains_key(id) {
                debug!("'{}' declaration of '{}' overridden by a nearer one", owner, id);
                continue;
            }
            self.referenced.insert(id.clone(), component.clone());
            added.insert(id.clone(), component.clone());
        }

        self.used.extend(refs.used.iter().cloned());
        // A self-reference needs no declaration.
        self.orphans
            .extend(refs.used.iter().filter(|id| id.as_str() != owner).cloned());
        let referenced = &self.referenced;
        self.orphans.retain(|id| !referenced.contains_key(id));
        added
    }
}

/// Resolves the component graph of one session.
pub struct ReferenceManager {
    components_dir: PathBuf,
    fetcher: Fetcher,
    main: Option<Component>,
    tally: ReferenceTally,
    root_declarations: BTreeMap<String, Component>,
    parents: Vec<ParentRef>,
    fetched: BTreeMap<String, FetchedComponent>,
    sorted_fetched: Vec<String>,
}

impl ReferenceManager {
    /// Creates a manager fetching into `components_dir`.
    pub fn new(components_dir: impl Into<PathBuf>, fetcher: Fetcher) -> Self {
        Self {
            components_dir: components_dir.into(),
            fetcher,
            main: None,
            tally: ReferenceTally::default(),
            root_declarations: BTreeMap::new(),
            parents: Vec::new(),
            fetched: BTreeMap::new(),
            sorted_fetched: Vec::new(),
        }
    }

    pub fn components_dir(&self) -> &Path {
        &self.components_dir
    }

    /// Fetches `component` unless it was already fetched this session.
    fn fetch(&mut self, component: &Component) -> Result<FetchedComponent> {
        if let Some(fetched) = self.fetched.get(&component.id) {
            return Ok(fetched.clone());
        }
        let fetched = self.fetcher.fetch(&self.components_dir, component)?;
        self.fetched.insert(component.id.clone(), fetched.clone());
        Ok(fetched)
    }

    /// Fetches a spine component and extracts its references.
    fn inspect(
        &mut self,
        component: &Component,
        context: &TemplateContext,
    ) -> Result<DescriptorReferences> {
        let fetched = self.fetch(component)?;
        let url = component.repository.url.to_string();
        Descriptor::load(&fetched, context)
            .and_then(|descriptor| descriptor.references(&component.id))
            .map_err(|e| e.in_component(&component.id, &url))
    }

    /// Resolves the main component and its ancestors.
    pub fn init(&mut self, main: &Component, context: &TemplateContext) -> Result<()> {
        self.tally = ReferenceTally::default();
        self.root_declarations.clear();
        self.parents.clear();
        self.fetched.clear();
        self.sorted_fetched.clear();

        let main = main.with_id(MAIN_COMPONENT_ID);
        info!("Resolving platform from {}", main.repository.url);

        let refs = self.inspect(&main, context)?;
        self.root_declarations = self.tally.observe(&main.id, &refs);
        let mut spine = vec![(main.id.clone(), main.repository.key())];
        self.main = Some(main);

        let mut next = refs.parent;
        while let Some(parent) = next {
            next = self.parse_parent(&parent, &mut spine, context)?;
        }

        if !self.tally.orphans.is_empty() {
            warn!(
                "Used but never declared: {}",
                self.tally.orphans.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        debug!(
            "Resolved {} used reference(s), {} declared component(s), {} ancestor(s)",
            self.tally.used.len(),
            self.tally.referenced.len(),
            self.parents.len()
        );
        Ok(())
    }

    /// Inspects one ancestor and returns its own parent, if any.
    fn parse_parent(
        &mut self,
        parent: &Component,
        spine: &mut Vec<(String, String)>,
        context: &TemplateContext,
    ) -> Result<Option<Component>> {
        let component = parent.with_id(parent_id(self.parents.len() + 1));
        let key = component.repository.key();
        if spine.iter().any(|(_, k)| *k == key) {
            let mut chain: Vec<String> = spine
                .iter()
                .map(|(id, key)| format!("{} ({})", id, key))
                .collect();
            chain.push(format!("{} ({})", component.id, key));
            return Err(Error::CycleDetected {
                cycle: chain.join(" -> "),
            });
        }
        spine.push((component.id.clone(), key));

        debug!("Inspecting ancestor '{}'", component.id);
        let refs = self.inspect(&component, context)?;
        let components = self.tally.observe(&component.id, &refs);
        self.parents.push(ParentRef {
            component,
            components,
        });
        Ok(refs.parent)
    }

    fn used_among(&self, declared: &BTreeMap<String, Component>) -> Vec<Component> {
        declared
            .values()
            .filter(|c| self.tally.used.contains(&c.id))
            .cloned()
            .collect()
    }

    /// Components to fetch and merge, in order. Empty before `init`.
    pub fn fetch_plan(&self) -> Vec<Component> {
        let mut plan = Vec::new();
        for parent in self.parents.iter().rev() {
            plan.extend(self.used_among(&parent.components));
            plan.push(parent.component.clone());
        }
        plan.extend(self.used_among(&self.root_declarations));
        if let Some(main) = &self.main {
            plan.push(main.clone());
        }
        plan
    }

    /// Fetches every planned component and merges it into `environment`.
    pub fn ensure(
        &mut self,
        environment: &mut Environment,
        context: &mut TemplateContext,
    ) -> Result<()> {
        self.sorted_fetched.clear();
        for component in self.fetch_plan() {
            self.fetch_and_merge(&component, environment, context)?;
        }
        info!(
            "Platform ready: {} component(s) fetched",
            self.sorted_fetched.len()
        );
        Ok(())
    }

    fn fetch_and_merge(
        &mut self,
        component: &Component,
        environment: &mut Environment,
        context: &mut TemplateContext,
    ) -> Result<()> {
        let fetched = self.fetch(component)?;
        self.sorted_fetched.push(component.id.clone());
        environment.platform.register(component);

        if !fetched.has_descriptor {
            debug!("Component '{}' has no descriptor", component.id);
            return Ok(());
        }

        let url = component.repository.url.to_string();
        let partial = Descriptor::load(&fetched, context)
            .and_then(|descriptor| Environment::from_descriptor(component, &descriptor))
            .map_err(|e| e.in_component(&component.id, &url))?;
        environment.customize(component, partial);
        context.refresh(environment);
        Ok(())
    }

    pub fn main_component(&self) -> Option<&Component> {
        self.main.as_ref()
    }

    /// Ids used anywhere on the spine.
    pub fn used_references(&self) -> &BTreeSet<String> {
        &self.tally.used
    }

    /// Declarations retained after precedence, keyed by id.
    pub fn referenced_components(&self) -> &BTreeMap<String, Component> {
        &self.tally.referenced
    }

    /// Used ids no descriptor on the spine declares.
    pub fn orphans(&self) -> &BTreeSet<String> {
        &self.tally.orphans
    }

    /// Ancestors, nearest first.
    pub fn parents(&self) -> &[ParentRef] {
        &self.parents
    }

    pub fn fetched(&self, id: &str) -> Option<&FetchedComponent> {
        self.fetched.get(id)
    }

    /// Every component fetched this session, ordered by id.
    pub fn fetched_components(&self) -> impl Iterator<Item = &FetchedComponent> {
        self.fetched.values()
    }

    /// Ids in the order `ensure` fetched them.
    pub fn sorted_fetched_components(&self) -> &[String] {
        &self.sorted_fetched
    }
}
