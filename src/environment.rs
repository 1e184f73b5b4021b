//! # Environment merge model
//!
//! The [`Environment`] is the aggregate view of the platform: what every
//! component descriptor on the resolution path contributes, merged in fetch
//! order. Each descriptor is first projected into a partial environment with
//! [`Environment::from_descriptor`], then folded into the aggregate with
//! [`Environment::customize`]. The first partial merged seeds the aggregate;
//! every later one refines it, the later value winning wherever both define
//! the same thing.
//!
//! Since the reference manager merges the farthest ancestor first and the
//! main component last, "later wins" means "closer to the main component
//! wins".
//!
//! ## Merge rules
//!
//! - `vars`, `params`, `env`, `labels`: deep merge, later wins per key.
//! - Providers, node sets, stacks and tasks merge by name. A later
//!   `component` replaces the earlier one.
//! - Node `instances`: a later non-zero value wins.
//! - Hook lists and `depends_on`: appended, duplicates dropped.
//! - `name` and `qualifier`: a later non-empty value wins.
//! - Template patterns are never merged. They stay attached to the component
//!   that declared them, in the [`Platform`] registry.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentReferencer};
use crate::descriptor::{resolve_self_reference, Descriptor};
use crate::error::{Error, Result};
use crate::params::Params;

/// Appends the entries of `incoming` missing from `list`, keeping order.
fn append_unique(list: &mut Vec<String>, incoming: &[String]) {
    for item in incoming {
        if !list.contains(item) {
            list.push(item.clone());
        }
    }
}

fn replace_if_set(value: &mut String, incoming: &str) {
    if !incoming.is_empty() {
        *value = incoming.to_string();
    }
}

/// Task names run before and after a step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hook {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl Hook {
    pub fn merge(&mut self, other: &Hook) {
        append_unique(&mut self.before, &other.before);
        append_unique(&mut self.after, &other.after);
    }

    fn tasks(&self) -> impl Iterator<Item = &String> {
        self.before.iter().chain(self.after.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentHooks {
    pub init: Hook,
    pub create: Hook,
    pub install: Hook,
    pub deploy: Hook,
    pub destroy: Hook,
}

impl EnvironmentHooks {
    pub fn merge(&mut self, other: &EnvironmentHooks) {
        self.init.merge(&other.init);
        self.create.merge(&other.create);
        self.install.merge(&other.install);
        self.deploy.merge(&other.deploy);
        self.destroy.merge(&other.destroy);
    }

    fn all(&self) -> [(&'static str, &Hook); 5] {
        [
            ("init", &self.init),
            ("create", &self.create),
            ("install", &self.install),
            ("deploy", &self.deploy),
            ("destroy", &self.destroy),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeHooks {
    pub create: Hook,
    pub destroy: Hook,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackHooks {
    pub deploy: Hook,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskHooks {
    pub execute: Hook,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Proxy {
    pub http: String,
    pub https: String,
    pub no_proxy: String,
}

impl Proxy {
    pub fn merge(&mut self, other: &Proxy) {
        replace_if_set(&mut self.http, &other.http);
        replace_if_set(&mut self.https, &other.https);
        replace_if_set(&mut self.no_proxy, &other.no_proxy);
    }
}

/// Every component known to the session, with its template patterns.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    components: BTreeMap<String, Component>,
    templates: BTreeMap<String, Vec<String>>,
}

impl Platform {
    /// Registers `component`; registering the same id again replaces it.
    pub fn register(&mut self, component: &Component) {
        self.components
            .insert(component.id.clone(), component.clone());
    }

    pub fn get(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    /// Resolves a referencer to its registered component.
    pub fn resolve(&self, referencer: &dyn ComponentReferencer) -> Result<&Component> {
        self.get(referencer.component_id())
            .ok_or_else(|| Error::UnresolvedComponent {
                id: referencer.component_id().to_string(),
            })
    }

    /// Registered components, ordered by id.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn set_templates(&mut self, id: &str, patterns: Vec<String>) {
        self.templates.insert(id.to_string(), patterns);
    }

    /// Template patterns declared by component `id`.
    pub fn templates(&self, id: &str) -> &[String] {
        self.templates.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Orchestrator {
    pub component: Option<String>,
    pub params: Params,
    pub env: Params,
}

impl Orchestrator {
    fn merge(&mut self, other: &Orchestrator) {
        if other.component.is_some() {
            self.component = other.component.clone();
        }
        self.params.merge(&other.params);
        self.env.merge(&other.env);
    }
}

impl ComponentReferencer for Orchestrator {
    fn component_id(&self) -> &str {
        self.component.as_deref().unwrap_or_default()
    }

    fn describe(&self) -> String {
        format!("orchestrator (component '{}')", self.component_id())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provider {
    pub name: String,
    pub component: String,
    pub params: Params,
    pub env: Params,
    pub proxy: Proxy,
}

impl Provider {
    fn merge(&mut self, other: &Provider) {
        self.component = other.component.clone();
        self.params.merge(&other.params);
        self.env.merge(&other.env);
        self.proxy.merge(&other.proxy);
    }
}

impl ComponentReferencer for Provider {
    fn component_id(&self) -> &str {
        &self.component
    }

    fn describe(&self) -> String {
        format!("provider '{}' (component '{}')", self.name, self.component)
    }
}

/// Reference from a node set to a provider, with node-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeProvider {
    pub name: String,
    pub params: Params,
    pub env: Params,
    pub proxy: Proxy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    pub name: String,
    pub instances: u32,
    pub provider: NodeProvider,
    pub orchestrator_params: Params,
    pub labels: Params,
    pub hooks: NodeHooks,
}

impl NodeSet {
    fn merge(&mut self, other: &NodeSet) {
        if other.instances != 0 {
            self.instances = other.instances;
        }
        replace_if_set(&mut self.provider.name, &other.provider.name);
        self.provider.params.merge(&other.provider.params);
        self.provider.env.merge(&other.provider.env);
        self.provider.proxy.merge(&other.provider.proxy);
        self.orchestrator_params.merge(&other.orchestrator_params);
        self.labels.merge(&other.labels);
        self.hooks.create.merge(&other.hooks.create);
        self.hooks.destroy.merge(&other.hooks.destroy);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    pub name: String,
    pub component: String,
    pub depends_on: Vec<String>,
    pub params: Params,
    pub env: Params,
    pub hooks: StackHooks,
}

impl Stack {
    fn merge(&mut self, other: &Stack) {
        self.component = other.component.clone();
        append_unique(&mut self.depends_on, &other.depends_on);
        self.params.merge(&other.params);
        self.env.merge(&other.env);
        self.hooks.deploy.merge(&other.hooks.deploy);
    }
}

impl ComponentReferencer for Stack {
    fn component_id(&self) -> &str {
        &self.component
    }

    fn describe(&self) -> String {
        format!("stack '{}' (component '{}')", self.name, self.component)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub component: String,
    pub playbook: String,
    pub cron: String,
    pub params: Params,
    pub env: Params,
    pub hooks: TaskHooks,
}

impl Task {
    fn merge(&mut self, other: &Task) {
        self.component = other.component.clone();
        replace_if_set(&mut self.playbook, &other.playbook);
        replace_if_set(&mut self.cron, &other.cron);
        self.params.merge(&other.params);
        self.env.merge(&other.env);
        self.hooks.execute.merge(&other.hooks.execute);
    }
}

impl ComponentReferencer for Task {
    fn component_id(&self) -> &str {
        &self.component
    }

    fn describe(&self) -> String {
        format!("task '{}' (component '{}')", self.name, self.component)
    }
}

/// Merges `incoming` entries into `target` by name.
fn merge_named<T: Clone>(
    target: &mut BTreeMap<String, T>,
    incoming: &BTreeMap<String, T>,
    merge: impl Fn(&mut T, &T),
) {
    for (name, entry) in incoming {
        match target.get_mut(name) {
            Some(existing) => merge(existing, entry),
            None => {
                target.insert(name.clone(), entry.clone());
            }
        }
    }
}

/// Required component id of a provider, stack or task entry.
fn required_component(
    owner: &Component,
    kind: &str,
    name: &str,
    component: &Option<String>,
) -> Result<String> {
    match component.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(resolve_self_reference(id, &owner.id)),
        _ => Err(Error::DescriptorParse {
            component: owner.id.clone(),
            message: format!("{} '{}' has no component", kind, name),
        }),
    }
}

/// The aggregate (or partial) view of the platform.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub name: String,
    pub qualifier: String,
    pub vars: Params,
    pub platform: Platform,
    pub orchestrator: Orchestrator,
    pub providers: BTreeMap<String, Provider>,
    pub nodes: BTreeMap<String, NodeSet>,
    pub stacks: BTreeMap<String, Stack>,
    pub tasks: BTreeMap<String, Task>,
    pub hooks: EnvironmentHooks,
    /// Patterns of the descriptor a partial environment was built from.
    /// Moved to the platform registry by [`Environment::customize`].
    pub templates: Vec<String>,
    loaded: bool,
}

impl Environment {
    /// Projects the descriptor of `owner` into a partial environment.
    pub fn from_descriptor(owner: &Component, descriptor: &Descriptor) -> Result<Self> {
        let mut environment = Environment {
            name: descriptor.name.clone(),
            qualifier: descriptor.qualifier.clone(),
            vars: descriptor.vars.clone(),
            hooks: descriptor.hooks.clone(),
            templates: descriptor.templates.clone(),
            ..Environment::default()
        };

        if let Some(decl) = &descriptor.orchestrator {
            environment.orchestrator = Orchestrator {
                component: decl
                    .component
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(|id| resolve_self_reference(id, &owner.id)),
                params: decl.params.clone(),
                env: decl.env.clone(),
            };
        }

        for (name, decl) in &descriptor.providers {
            let provider = Provider {
                name: name.clone(),
                component: required_component(owner, "provider", name, &decl.component)?,
                params: decl.params.clone(),
                env: decl.env.clone(),
                proxy: decl.proxy.clone(),
            };
            environment.providers.insert(name.clone(), provider);
        }

        for (name, decl) in &descriptor.nodes {
            if decl.provider.name.trim().is_empty() {
                return Err(Error::DescriptorParse {
                    component: owner.id.clone(),
                    message: format!("node set '{}' has no provider", name),
                });
            }
            let nodes = NodeSet {
                name: name.clone(),
                instances: decl.instances,
                provider: NodeProvider {
                    name: decl.provider.name.trim().to_string(),
                    params: decl.provider.params.clone(),
                    env: decl.provider.env.clone(),
                    proxy: decl.provider.proxy.clone(),
                },
                orchestrator_params: decl.orchestrator.params.clone(),
                labels: decl.labels.clone(),
                hooks: decl.hooks.clone(),
            };
            environment.nodes.insert(name.clone(), nodes);
        }

        for (name, decl) in &descriptor.stacks {
            let stack = Stack {
                name: name.clone(),
                component: required_component(owner, "stack", name, &decl.component)?,
                depends_on: decl.depends_on.clone(),
                params: decl.params.clone(),
                env: decl.env.clone(),
                hooks: decl.hooks.clone(),
            };
            environment.stacks.insert(name.clone(), stack);
        }

        for (name, decl) in &descriptor.tasks {
            let task = Task {
                name: name.clone(),
                component: required_component(owner, "task", name, &decl.component)?,
                playbook: decl.playbook.clone(),
                cron: decl.cron.clone(),
                params: decl.params.clone(),
                env: decl.env.clone(),
                hooks: decl.hooks.clone(),
            };
            environment.tasks.insert(name.clone(), task);
        }

        Ok(environment)
    }

    /// True once at least one partial environment has been merged.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Folds the partial environment of `component` into `self`.
    pub fn customize(&mut self, component: &Component, mut partial: Environment) {
        let templates = std::mem::take(&mut partial.templates);
        self.platform.register(component);
        self.platform.set_templates(&component.id, templates);

        if !self.loaded {
            debug!("Environment seeded by component '{}'", component.id);
            let platform = std::mem::take(&mut self.platform);
            *self = partial;
            self.platform = platform;
            self.loaded = true;
            return;
        }

        debug!("Environment customized by component '{}'", component.id);
        replace_if_set(&mut self.name, &partial.name);
        replace_if_set(&mut self.qualifier, &partial.qualifier);
        self.vars.merge(&partial.vars);
        self.orchestrator.merge(&partial.orchestrator);
        merge_named(&mut self.providers, &partial.providers, Provider::merge);
        merge_named(&mut self.nodes, &partial.nodes, NodeSet::merge);
        merge_named(&mut self.stacks, &partial.stacks, Stack::merge);
        merge_named(&mut self.tasks, &partial.tasks, Task::merge);
        self.hooks.merge(&partial.hooks);
    }

    /// Every referencer of the environment, orchestrator first.
    pub fn referencers(&self) -> Vec<&dyn ComponentReferencer> {
        let mut referencers: Vec<&dyn ComponentReferencer> = Vec::new();
        if self.orchestrator.component.is_some() {
            referencers.push(&self.orchestrator);
        }
        referencers.extend(self.providers.values().map(|p| p as &dyn ComponentReferencer));
        referencers.extend(self.stacks.values().map(|s| s as &dyn ComponentReferencer));
        referencers.extend(self.tasks.values().map(|t| t as &dyn ComponentReferencer));
        referencers
    }

    /// Consistency findings of the resolved environment.
    ///
    /// Nothing here aborts resolution; callers decide what to do with the
    /// findings. Each one is also logged as a warning.
    pub fn validate(&self) -> Vec<String> {
        let mut findings = Vec::new();

        for referencer in self.referencers() {
            if !self.platform.contains(referencer.component_id()) {
                findings.push(format!(
                    "{} refers to an unavailable component",
                    referencer.describe()
                ));
            }
        }

        for nodes in self.nodes.values() {
            if !self.providers.contains_key(&nodes.provider.name) {
                findings.push(format!(
                    "node set '{}' refers to unknown provider '{}'",
                    nodes.name, nodes.provider.name
                ));
            }
            for (step, hook) in [("create", &nodes.hooks.create), ("destroy", &nodes.hooks.destroy)] {
                self.check_hook(&mut findings, &format!("node set '{}' {}", nodes.name, step), hook);
            }
        }

        for stack in self.stacks.values() {
            for dependency in &stack.depends_on {
                if !self.stacks.contains_key(dependency) {
                    findings.push(format!(
                        "stack '{}' depends on unknown stack '{}'",
                        stack.name, dependency
                    ));
                }
            }
            self.check_hook(&mut findings, &format!("stack '{}' deploy", stack.name), &stack.hooks.deploy);
        }

        for task in self.tasks.values() {
            self.check_hook(&mut findings, &format!("task '{}' execute", task.name), &task.hooks.execute);
        }

        for (step, hook) in self.hooks.all() {
            self.check_hook(&mut findings, &format!("environment {}", step), hook);
        }

        for finding in &findings {
            warn!("{}", finding);
        }
        findings
    }

    fn check_hook(&self, findings: &mut Vec<String>, owner: &str, hook: &Hook) {
        for task in hook.tasks() {
            if !self.tasks.contains_key(task) {
                findings.push(format!("{} hook refers to unknown task '{}'", owner, task));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Repository;
    use crate::params::Param;
    use std::path::Path;

    fn component(id: &str) -> Component {
        let path = Path::new("/srv/components").join(id);
        Component::new(id, Repository::local(&path).unwrap())
    }

    fn partial(owner: &str, yaml: &str) -> Environment {
        let descriptor = Descriptor::parse(owner, yaml).unwrap();
        Environment::from_descriptor(&component(owner), &descriptor).unwrap()
    }

    fn merge_all(layers: &[(&str, &str)]) -> Environment {
        let mut environment = Environment::default();
        for (owner, yaml) in layers {
            environment.customize(&component(owner), partial(owner, yaml));
        }
        environment
    }

    #[test]
    fn test_first_customize_seeds_environment() {
        let environment = merge_all(&[("parent1", "name: base\nvars:\n  a: '1'\n")]);
        assert!(environment.is_loaded());
        assert_eq!(environment.name, "base");
        assert_eq!(environment.vars.get("a"), Some(&Param::from("1")));
        assert!(environment.platform.contains("parent1"));
    }

    #[test]
    fn test_closer_component_wins() {
        let environment = merge_all(&[
            ("parent1", "name: base\nqualifier: q\nvars:\n  a: parent\n  b: parent\n"),
            ("main", "name: app\nvars:\n  a: main\n"),
        ]);
        assert_eq!(environment.name, "app");
        assert_eq!(environment.qualifier, "q");
        assert_eq!(environment.vars.get("a"), Some(&Param::from("main")));
        assert_eq!(environment.vars.get("b"), Some(&Param::from("parent")));
    }

    #[test]
    fn test_named_entries_merge() {
        let environment = merge_all(&[
            (
                "parent1",
                r#"
providers:
  aws:
    component: aws-v1
    params: { region: eu, size: small }
    proxy: { http: "http://p1" }
nodes:
  managers:
    instances: 3
    provider: { name: aws }
    labels: { role: manager }
stacks:
  web:
    component: _
    depends_on: [db]
    hooks: { deploy: { before: [check] } }
"#,
            ),
            (
                "main",
                r#"
providers:
  aws:
    component: aws-v2
    params: { size: large }
nodes:
  managers:
    instances: 0
    provider: { name: aws }
    labels: { zone: a }
stacks:
  web:
    component: web-app
    depends_on: [db, cache]
    hooks: { deploy: { before: [check, warmup] } }
"#,
            ),
        ]);

        let aws = &environment.providers["aws"];
        assert_eq!(aws.component, "aws-v2");
        assert_eq!(aws.params.get("region"), Some(&Param::from("eu")));
        assert_eq!(aws.params.get("size"), Some(&Param::from("large")));
        assert_eq!(aws.proxy.http, "http://p1");

        let managers = &environment.nodes["managers"];
        assert_eq!(managers.instances, 3);
        assert_eq!(managers.labels.len(), 2);

        let web = &environment.stacks["web"];
        assert_eq!(web.component, "web-app");
        assert_eq!(web.depends_on, vec!["db", "cache"]);
        assert_eq!(web.hooks.deploy.before, vec!["check", "warmup"]);
    }

    #[test]
    fn test_self_reference_resolves_to_owner() {
        let environment = merge_all(&[("parent1", "stacks:\n  web:\n    component: _\n")]);
        assert_eq!(environment.stacks["web"].component, "parent1");
    }

    #[test]
    fn test_templates_stay_with_their_component() {
        let environment = merge_all(&[
            ("parent1", "templates: ['*.yml']\n"),
            ("main", "templates: ['config/app.conf']\n"),
        ]);
        assert_eq!(environment.platform.templates("parent1"), ["*.yml"]);
        assert_eq!(environment.platform.templates("main"), ["config/app.conf"]);
        assert!(environment.platform.templates("other").is_empty());
        assert!(environment.templates.is_empty());
    }

    #[test]
    fn test_stack_without_component_is_error() {
        let descriptor = Descriptor::parse("main", "stacks:\n  web:\n    params: {}\n").unwrap();
        let error = Environment::from_descriptor(&component("main"), &descriptor).unwrap_err();
        assert!(matches!(error, Error::DescriptorParse { ref message, .. } if message.contains("stack 'web'")));
    }

    #[test]
    fn test_node_set_without_provider_is_error() {
        let descriptor = Descriptor::parse("main", "nodes:\n  workers:\n    instances: 2\n").unwrap();
        assert!(Environment::from_descriptor(&component("main"), &descriptor).is_err());
    }

    #[test]
    fn test_platform_resolve() {
        let mut platform = Platform::default();
        platform.register(&component("comp1"));

        let stack = Stack {
            name: "web".to_string(),
            component: "comp1".to_string(),
            ..Stack::default()
        };
        assert_eq!(platform.resolve(&stack).unwrap().id, "comp1");

        let missing = Stack {
            component: "nope".to_string(),
            ..stack
        };
        assert!(matches!(
            platform.resolve(&missing),
            Err(Error::UnresolvedComponent { id }) if id == "nope"
        ));
    }

    #[test]
    fn test_validate_reports_findings() {
        let mut environment = merge_all(&[(
            "main",
            r#"
providers:
  aws: { component: comp2 }
nodes:
  workers: { provider: { name: gcp }, hooks: { create: { after: [ghost] } } }
stacks:
  web: { component: _, depends_on: [db] }
tasks:
  backup: { component: _ }
hooks:
  deploy: { before: [backup] }
"#,
        )]);
        let findings = environment.validate();

        assert!(findings.iter().any(|f| f.contains("provider 'aws'")));
        assert!(findings.iter().any(|f| f.contains("unknown provider 'gcp'")));
        assert!(findings.iter().any(|f| f.contains("unknown stack 'db'")));
        assert!(findings.iter().any(|f| f.contains("unknown task 'ghost'")));
        assert_eq!(findings.len(), 4);

        environment.platform.register(&component("comp2"));
        assert_eq!(environment.validate().len(), 3);
    }
}
