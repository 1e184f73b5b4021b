//! # Find Command Implementation
//!
//! Resolves a platform and lists the components containing a file or a
//! directory, templated copies included. Matches are released before
//! returning, so templated copies never outlive the command.

use anyhow::Result;
use clap::Args;

use stackforge::component::ComponentReferencer;

use super::SessionArgs;

/// List the components containing a file or directory
#[derive(Args, Debug)]
pub struct FindArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Path to look for, relative to each component root.
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Look for a directory instead of a file.
    #[arg(long)]
    pub directory: bool,

    /// Restrict the search to these component ids (repeatable).
    #[arg(long = "component", value_name = "ID")]
    pub components: Vec<String>,
}

/// Execute the `find` command.
pub fn execute(args: FindArgs) -> Result<()> {
    let manager = args.session.open()?;
    let referencers: Vec<&dyn ComponentReferencer> = args
        .components
        .iter()
        .map(|id| id as &dyn ComponentReferencer)
        .collect();

    let found = if args.directory {
        manager.contains_directory(&args.name, None, &referencers)?
    } else {
        manager.contains_file(&args.name, None, &referencers)?
    };

    if found.is_empty() {
        println!("No component contains {}", args.name);
    }
    for matching in found.iter() {
        // Templated copies are released below; report the fetched location.
        let root = manager
            .references()
            .fetched(matching.component_id())
            .map(|f| f.local_path.clone())
            .unwrap_or_else(|| matching.component().root_path().to_path_buf());
        let templated = if matching.component().is_templated() {
            " (templated)"
        } else {
            ""
        };
        println!(
            "{} {}{}",
            matching.component_id(),
            root.join(matching.relative_path()).display(),
            templated
        );
    }
    found.release()?;
    Ok(())
}
