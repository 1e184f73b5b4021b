//! # Resolve Command Implementation
//!
//! Resolves a platform, fetching every used component into the work
//! directory, then prints the fetch order and the consistency findings of the
//! merged environment. Optionally writes the component-path manifest.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use stackforge::manager::ComponentManager;

use super::SessionArgs;

/// Resolve a platform and fetch its components
#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Write the component-path manifest (components.yaml) into DIR.
    #[arg(long, value_name = "DIR")]
    pub manifest: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,

    /// Exit with an error when the environment has findings.
    #[arg(long)]
    pub strict: bool,
}

fn fetched_path(manager: &ComponentManager, id: &str) -> String {
    manager
        .references()
        .fetched(id)
        .map(|f| f.local_path.display().to_string())
        .unwrap_or_default()
}

/// Execute the `resolve` command.
pub fn execute(args: ResolveArgs) -> Result<()> {
    let manager = args.session.open()?;
    let environment = manager.environment();
    let findings = environment.validate();
    let orphans: Vec<&String> = manager.references().orphans().iter().collect();

    if args.json {
        let fetched: Vec<_> = manager
            .sorted_fetched_components()
            .iter()
            .map(|id| json!({ "id": id, "path": fetched_path(&manager, id) }))
            .collect();
        let report = json!({
            "name": environment.name,
            "qualifier": environment.qualifier,
            "fetched": fetched,
            "orphans": orphans,
            "findings": findings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if !environment.name.is_empty() {
            println!("Environment: {}", environment.name);
        }
        println!("Fetched components:");
        for (position, id) in manager.sorted_fetched_components().iter().enumerate() {
            println!("  {}. {} {}", position + 1, id, fetched_path(&manager, id));
        }
        for orphan in &orphans {
            println!("Unresolved component: {}", orphan);
        }
        for finding in &findings {
            println!("Warning: {}", finding);
        }
    }

    if let Some(dir) = &args.manifest {
        let manifest = manager.write_component_paths(dir)?;
        if !args.json {
            println!("Component paths written to {}", manifest.display());
        }
    }

    if args.strict && !findings.is_empty() {
        anyhow::bail!("{} finding(s) in the resolved environment", findings.len());
    }
    Ok(())
}
