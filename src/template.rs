//! # Templating
//!
//! Two kinds of text go through the template engine:
//!
//! - **Descriptors** are rendered against the current [`TemplateContext`]
//!   before being parsed, so a descriptor merged late can use variables
//!   contributed by components merged before it. Rendering is lenient:
//!   a variable nobody defined yet renders empty.
//! - **Component files** matching the component's declared `templates`
//!   patterns are rendered by [`run_template`] into a private duplicate of
//!   the component. Rendering is strict: an undefined variable is an error.
//!
//! Templates use Handlebars syntax (`{{vars.region}}`). The data exposed to
//! them is `{ "vars": ..., "name": ..., "qualifier": ... }`.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use handlebars::Handlebars;
use log::{debug, info};
use serde::Serialize;
use uuid::Uuid;

use crate::component::ComponentReferencer;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::filesystem::{copy_tree, list_files, remove_tree};
use crate::params::Params;

/// Variables visible to descriptor and component templates.
///
/// External variables (supplied by the caller, typically from the command
/// line) always win over variables contributed by descriptors.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    external: Params,
    vars: Params,
    name: String,
    qualifier: String,
}

#[derive(Serialize)]
struct TemplateData<'a> {
    vars: &'a Params,
    name: &'a str,
    qualifier: &'a str,
}

impl TemplateContext {
    pub fn new(external: Params) -> Self {
        Self {
            vars: external.clone(),
            external,
            name: String::new(),
            qualifier: String::new(),
        }
    }

    /// Rebuilds the snapshot from the environment resolved so far.
    pub fn refresh(&mut self, environment: &Environment) {
        self.vars = environment.vars.merged(&self.external);
        self.name = environment.name.clone();
        self.qualifier = environment.qualifier.clone();
    }

    /// Copy of this context with `extra` variables layered on top.
    pub fn with_vars(&self, extra: &Params) -> Self {
        let mut context = self.clone();
        context.external.merge(extra);
        context.vars.merge(extra);
        context
    }

    pub fn vars(&self) -> &Params {
        &self.vars
    }

    fn data(&self) -> TemplateData<'_> {
        TemplateData {
            vars: &self.vars,
            name: &self.name,
            qualifier: &self.qualifier,
        }
    }

    fn render(&self, text: &str, strict: bool, file: &str) -> Result<String> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(strict);
        // Rendered files are YAML, shell, config files... never HTML.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .render_template(text, &self.data())
            .map_err(|e| Error::Template {
                message: e.to_string(),
                file: Some(file.to_string()),
            })
    }

    /// Renders a descriptor; undefined variables render empty.
    pub fn render_descriptor(&self, text: &str, source: &str) -> Result<String> {
        self.render(text, false, source)
    }

    /// Renders a component file; undefined variables are errors.
    pub fn render_strict(&self, text: &str, file: &str) -> Result<String> {
        self.render(text, true, file)
    }
}

/// Compiles template patterns; each is matched against paths relative to
/// the component root, `*` not crossing directory boundaries.
fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p.trim_start_matches("./")).map_err(Error::from))
        .collect()
}

/// Files of `component_path` matching any of `patterns`.
pub fn matching_files(component_path: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let compiled = compile(patterns)?;
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::default()
    };
    Ok(list_files(component_path)?
        .into_iter()
        .filter(|relative| {
            compiled
                .iter()
                .any(|pattern| pattern.matches_path_with(relative, options))
        })
        .collect())
}

/// Sibling directory receiving a templated copy of `component_path`.
fn duplicate_path(component_path: &Path) -> Result<PathBuf> {
    let name = component_path
        .file_name()
        .ok_or_else(|| Error::Filesystem {
            message: format!("{} has no directory name", component_path.display()),
        })?
        .to_string_lossy();
    let suffix = Uuid::now_v7().simple().to_string();
    Ok(component_path.with_file_name(format!("{}_{}", name, suffix)))
}

/// Produces a templated copy of a component, if any of its files need it.
///
/// Returns `None` when the component declares no patterns or none of its
/// files match them; the original directory is then used as is. Otherwise
/// the whole component is duplicated into a uniquely suffixed sibling, every
/// matching file of the duplicate is rendered in place against `context`,
/// and the duplicate's path is returned. The caller owns the duplicate.
pub fn run_template(
    context: &TemplateContext,
    component_path: &Path,
    patterns: &[String],
    referencer: &dyn ComponentReferencer,
) -> Result<Option<PathBuf>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let matches = matching_files(component_path, patterns)?;
    if matches.is_empty() {
        debug!("No template file matched in {}", referencer.describe());
        return Ok(None);
    }

    let duplicate = duplicate_path(component_path)?;
    copy_tree(component_path, &duplicate, false)?;
    info!(
        "Templating {} file(s) of {} into {}",
        matches.len(),
        referencer.describe(),
        duplicate.display()
    );

    let rendered = render_all(context, &duplicate, &matches);
    if let Err(e) = rendered {
        // The caller never sees the duplicate, so it is ours to clean up.
        let _ = remove_tree(&duplicate);
        return Err(e);
    }
    Ok(Some(duplicate))
}

fn render_all(context: &TemplateContext, root: &Path, files: &[PathBuf]) -> Result<()> {
    for relative in files {
        let path = root.join(relative);
        let display = relative.to_string_lossy();
        let text = fs::read_to_string(&path).map_err(|e| Error::Template {
            message: e.to_string(),
            file: Some(display.to_string()),
        })?;
        let output = context.render_strict(&text, &display)?;
        fs::write(&path, output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars(yaml: &str) -> Params {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn component_dir(temp: &TempDir) -> PathBuf {
        let root = temp.path().join("components/comp1");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("app.yml"), "region: {{vars.region}}\n").unwrap();
        fs::write(root.join("sub/nested.yml"), "name: {{name}}\n").unwrap();
        fs::write(root.join("README.md"), "{{not.rendered}}\n").unwrap();
        root
    }

    #[test]
    fn test_render_descriptor_is_lenient() {
        let context = TemplateContext::new(Params::new());
        let out = context
            .render_descriptor("a: '{{vars.missing}}'\n", "stackforge.yaml")
            .unwrap();
        assert_eq!(out, "a: ''\n");
    }

    #[test]
    fn test_render_strict_fails_on_missing_variable() {
        let context = TemplateContext::new(Params::new());
        let result = context.render_strict("{{vars.missing}}", "app.yml");
        assert!(matches!(result, Err(Error::Template { file: Some(f), .. }) if f == "app.yml"));
    }

    #[test]
    fn test_render_does_not_escape() {
        let context = TemplateContext::new(vars("value: \"<a & b>\""));
        let out = context.render_strict("{{vars.value}}", "x").unwrap();
        assert_eq!(out, "<a & b>");
    }

    #[test]
    fn test_with_vars_layers_extra_values() {
        let context = TemplateContext::new(vars("a: '1'\nb: '2'"));
        let extended = context.with_vars(&vars("b: '3'"));
        assert_eq!(extended.render_strict("{{vars.a}}{{vars.b}}", "x").unwrap(), "13");
        assert_eq!(context.render_strict("{{vars.b}}", "x").unwrap(), "2");
    }

    #[test]
    fn test_matching_files_star_does_not_cross_directories() {
        let temp = TempDir::new().unwrap();
        let root = component_dir(&temp);

        let top = matching_files(&root, &["*.yml".to_string()]).unwrap();
        assert_eq!(top, vec![PathBuf::from("app.yml")]);

        let all = matching_files(&root, &["**/*.yml".to_string()]).unwrap();
        assert_eq!(all.len(), 2);

        let exact = matching_files(&root, &["sub/nested.yml".to_string()]).unwrap();
        assert_eq!(exact, vec![PathBuf::from("sub/nested.yml")]);
    }

    #[test]
    fn test_run_template_without_patterns_is_not_templated() {
        let temp = TempDir::new().unwrap();
        let root = component_dir(&temp);
        let context = TemplateContext::new(Params::new());

        let result = run_template(&context, &root, &[], &"comp1".to_string()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_run_template_without_match_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let root = component_dir(&temp);
        let context = TemplateContext::new(Params::new());

        let result =
            run_template(&context, &root, &["*.json".to_string()], &"comp1".to_string()).unwrap();
        assert!(result.is_none());
        assert_eq!(fs::read_dir(root.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_run_template_renders_duplicate_only() {
        let temp = TempDir::new().unwrap();
        let root = component_dir(&temp);
        let context = TemplateContext::new(vars("region: eu-west-1"));

        let duplicate = run_template(&context, &root, &["*.yml".to_string()], &"comp1".to_string())
            .unwrap()
            .unwrap();

        assert_ne!(duplicate, root);
        assert_eq!(duplicate.parent(), root.parent());
        assert!(duplicate
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("comp1_"));
        assert_eq!(
            fs::read_to_string(duplicate.join("app.yml")).unwrap(),
            "region: eu-west-1\n"
        );
        // Files outside the patterns are copied untouched.
        assert_eq!(
            fs::read_to_string(duplicate.join("README.md")).unwrap(),
            "{{not.rendered}}\n"
        );
        assert_eq!(
            fs::read_to_string(root.join("app.yml")).unwrap(),
            "region: {{vars.region}}\n"
        );
    }

    #[test]
    fn test_run_template_missing_variable_removes_duplicate() {
        let temp = TempDir::new().unwrap();
        let root = component_dir(&temp);
        let context = TemplateContext::new(Params::new());

        let result = run_template(&context, &root, &["*.yml".to_string()], &"comp1".to_string());
        assert!(matches!(result, Err(Error::Template { .. })));
        assert_eq!(fs::read_dir(root.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_run_template_twice_yields_independent_copies() {
        let temp = TempDir::new().unwrap();
        let root = component_dir(&temp);
        let context = TemplateContext::new(vars("region: eu"));
        let patterns = vec!["app.yml".to_string()];

        let first = run_template(&context, &root, &patterns, &"comp1".to_string())
            .unwrap()
            .unwrap();
        let second = run_template(&context, &root, &patterns, &"comp1".to_string())
            .unwrap()
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_refresh_takes_environment_vars_under_external() {
        let mut environment = Environment::default();
        environment.vars = vars("a: env\nb: env");
        environment.name = "demo".to_string();

        let mut context = TemplateContext::new(vars("b: cli"));
        context.refresh(&environment);

        assert_eq!(
            context.render_strict("{{name}} {{vars.a}} {{vars.b}}", "x").unwrap(),
            "demo env cli"
        );
    }
}
