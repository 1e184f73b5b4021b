//! # Component descriptors
//!
//! A descriptor is the YAML file at the root of a component (by default
//! `stackforge.yaml`). It declares the components the platform is built
//! from, an optional parent to inherit from, and the environment sections
//! (`vars`, `orchestrator`, `providers`, `nodes`, `stacks`, `tasks`,
//! `hooks`) merged into the aggregate [`Environment`](crate::environment::Environment).
//!
//! This module only knows the document shape. [`Descriptor::load`] reads and
//! renders the file, [`Descriptor::references`] extracts what the reference
//! manager needs to walk the platform, and the environment module projects
//! the rest into its typed structures.
//!
//! ```yaml
//! name: demo
//! parent:
//!   repository: org/base-platform
//!   ref: v1.2.0
//! components:
//!   aws-provider:
//!     repository: org/aws-provider
//!     ref: main
//! providers:
//!   aws:
//!     component: aws-provider
//! stacks:
//!   web:
//!     component: _
//! templates: ["*.yml"]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use log::debug;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use url::Url;

use crate::component::{
    check_component_id, Auth, Component, FetchedComponent, Repository, ScmKind,
};
use crate::defaults::{is_spine_id, DEFAULT_BASE_URL, PARENT_COMPONENT_ID, SELF_REFERENCE};
use crate::environment::{EnvironmentHooks, NodeHooks, Proxy, StackHooks, TaskHooks};
use crate::error::{Error, Result};
use crate::params::Params;
use crate::template::TemplateContext;

/// Declaration of a component, as found under `components` or `parent`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComponentDecl {
    pub repository: String,
    #[serde(rename = "ref", alias = "version")]
    pub reference: String,
    pub scm: Option<String>,
    pub descriptor: Option<String>,
    pub auth: Option<Auth>,
}

impl ComponentDecl {
    /// Builds the component `id` described by this declaration.
    pub fn to_component(&self, id: &str, base: &Url) -> Result<Component> {
        if self.repository.trim().is_empty() {
            return Err(Error::DescriptorParse {
                component: id.to_string(),
                message: "component declaration has no repository".to_string(),
            });
        }
        let url = Repository::resolve_location(self.repository.trim(), base)?;
        let scm = ScmKind::select(&url, self.scm.as_deref())?;
        let mut repository = Repository::new(url, scm)
            .with_reference(&self.reference)
            .with_auth(self.auth.clone());
        if let Some(descriptor) = &self.descriptor {
            repository = repository.with_descriptor(descriptor);
        }
        Ok(Component::new(id, repository))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrchestratorDecl {
    pub component: Option<String>,
    pub params: Params,
    pub env: Params,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderDecl {
    pub component: Option<String>,
    pub params: Params,
    pub env: Params,
    pub proxy: Proxy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeProviderDecl {
    pub name: String,
    pub params: Params,
    pub env: Params,
    pub proxy: Proxy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeOrchestratorDecl {
    pub params: Params,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeSetDecl {
    pub instances: u32,
    pub provider: NodeProviderDecl,
    pub orchestrator: NodeOrchestratorDecl,
    pub labels: Params,
    pub hooks: NodeHooks,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StackDecl {
    pub component: Option<String>,
    pub depends_on: Vec<String>,
    pub params: Params,
    pub env: Params,
    pub hooks: StackHooks,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskDecl {
    pub component: Option<String>,
    pub playbook: String,
    pub cron: String,
    pub params: Params,
    pub env: Params,
    pub hooks: TaskHooks,
}

/// A parsed descriptor document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Descriptor {
    pub name: String,
    pub qualifier: String,
    pub base: Option<String>,
    pub parent: Option<ComponentDecl>,
    pub components: BTreeMap<String, ComponentDecl>,
    pub vars: Params,
    pub orchestrator: Option<OrchestratorDecl>,
    pub providers: BTreeMap<String, ProviderDecl>,
    pub nodes: BTreeMap<String, NodeSetDecl>,
    pub stacks: BTreeMap<String, StackDecl>,
    pub tasks: BTreeMap<String, TaskDecl>,
    pub hooks: EnvironmentHooks,
    pub templates: Vec<String>,
}

/// What a descriptor says about other components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorReferences {
    /// Ids named by the orchestrator, providers, stacks and tasks.
    pub used: BTreeSet<String>,
    /// Components declared under `components`, keyed by id.
    pub declared: BTreeMap<String, Component>,
    /// The parent, still under the generic `parent` id.
    pub parent: Option<Component>,
}

/// Resolves the self-reference marker to the owner's id.
pub fn resolve_self_reference(id: &str, owner: &str) -> String {
    if id == SELF_REFERENCE {
        owner.to_string()
    } else {
        id.to_string()
    }
}

impl Descriptor {
    /// Parses descriptor text belonging to component `owner`.
    ///
    /// An empty document is a valid, empty descriptor.
    pub fn parse(owner: &str, text: &str) -> Result<Self> {
        let parse_error = |message: String| Error::DescriptorParse {
            component: owner.to_string(),
            message,
        };
        let value: YamlValue = serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string()))?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value).map_err(|e| parse_error(e.to_string()))
    }

    /// Reads, renders and parses the descriptor of a fetched component.
    pub fn load(fetched: &FetchedComponent, context: &TemplateContext) -> Result<Self> {
        let path = fetched.descriptor_path()?;
        if !fetched.has_descriptor {
            return Err(Error::DescriptorMissing {
                component: fetched.id.clone(),
                path: path.display().to_string(),
            });
        }
        debug!("Loading descriptor {}", path.display());
        let text = fs::read_to_string(&path)?;
        let rendered = context.render_descriptor(&text, &path.display().to_string())?;
        Self::parse(&fetched.id, &rendered)
    }

    /// Base URL for relative repository locations.
    pub fn base_url(&self, owner: &str) -> Result<Url> {
        let base = self
            .base
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        Url::parse(base.trim()).map_err(|e| Error::DescriptorParse {
            component: owner.to_string(),
            message: format!("invalid base URL '{}': {}", base, e),
        })
    }

    /// Component ids used by this descriptor, `_` resolved to `owner`.
    pub fn used_references(&self, owner: &str) -> BTreeSet<String> {
        let orchestrator = self
            .orchestrator
            .iter()
            .filter_map(|o| o.component.as_deref());
        let providers = self.providers.values().filter_map(|p| p.component.as_deref());
        let stacks = self.stacks.values().filter_map(|s| s.component.as_deref());
        let tasks = self.tasks.values().filter_map(|t| t.component.as_deref());

        orchestrator
            .chain(providers)
            .chain(stacks)
            .chain(tasks)
            .filter(|id| !id.trim().is_empty())
            .map(|id| resolve_self_reference(id.trim(), owner))
            .collect()
    }

    /// Components declared under `components`.
    ///
    /// Ids must be plain path segments and cannot take the name of the main
    /// component or of an ancestor (`main`, `parent1`, ...).
    pub fn declared_components(&self, owner: &str) -> Result<BTreeMap<String, Component>> {
        let base = self.base_url(owner)?;
        self.components
            .iter()
            .map(|(id, decl)| {
                check_component_id(id).map_err(|e| in_descriptor(owner, id, e))?;
                if is_spine_id(id) {
                    return Err(Error::DescriptorParse {
                        component: owner.to_string(),
                        message: format!(
                            "component '{}': id is reserved for the main component and its ancestors",
                            id
                        ),
                    });
                }
                let component = decl
                    .to_component(id, &base)
                    .map_err(|e| in_descriptor(owner, id, e))?;
                Ok((id.clone(), component))
            })
            .collect()
    }

    /// The declared parent, if any.
    pub fn parent_component(&self, owner: &str) -> Result<Option<Component>> {
        let base = self.base_url(owner)?;
        self.parent
            .as_ref()
            .map(|decl| {
                decl.to_component(PARENT_COMPONENT_ID, &base)
                    .map_err(|e| in_descriptor(owner, PARENT_COMPONENT_ID, e))
            })
            .transpose()
    }

    pub fn references(&self, owner: &str) -> Result<DescriptorReferences> {
        Ok(DescriptorReferences {
            used: self.used_references(owner),
            declared: self.declared_components(owner)?,
            parent: self.parent_component(owner)?,
        })
    }
}

/// Attributes a declaration failure to the descriptor holding it.
fn in_descriptor(owner: &str, id: &str, error: Error) -> Error {
    match error {
        Error::DescriptorParse { message, .. } => Error::DescriptorParse {
            component: owner.to_string(),
            message: format!("component '{}': {}", id, message),
        },
        other => Error::DescriptorParse {
            component: owner.to_string(),
            message: format!("component '{}': {}", id, other),
        },
    }
}
