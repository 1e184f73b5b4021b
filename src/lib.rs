//! # Stackforge
//!
//! Resolution and fetch engine for component-based platforms. A platform is
//! described by a *main* component whose descriptor (`stackforge.yaml`)
//! declares the components it is built from, may inherit from a parent
//! component, and assigns components to roles: orchestrator, providers,
//! stacks and tasks.
//!
//! The library turns that description into materialized component
//! directories under `<workdir>/components/` plus one merged
//! [`Environment`](environment::Environment) that provisioning tooling
//! reads.
//!
//! ## Core Concepts
//!
//! - **Components (`component`)**: a fetchable unit (id plus repository), and
//!   the `ComponentReferencer` capability of anything pointing to one.
//! - **Source control (`scm`, `fetcher`)**: git and local-directory handlers,
//!   and the fetcher choosing between update and fresh fetch.
//! - **Descriptors (`descriptor`)**: the YAML document of a component.
//! - **References (`references`)**: which components are used, declared and
//!   inherited, and the order they are fetched in.
//! - **Environment (`environment`)**: the merged, "closer wins" view of every
//!   descriptor on the resolution path.
//! - **Templating (`template`, `usable`)**: per-component templated copies
//!   handed out as releasable handles.
//! - **Search (`finder`)**: which components contain a given file or
//!   directory.
//!
//! ## Execution Flow
//!
//! The entry point is [`ComponentManager`](manager::ComponentManager):
//!
//! 1.  **Init**: fetch the main component, walk its ancestor chain and
//!     collect used and declared references.
//! 2.  **Ensure**: fetch the used components and the ancestors farthest
//!     first, merging each descriptor into the environment.
//! 3.  **Use / Contains**: hand out (possibly templated) component trees
//!     and search them.
//!
//! Resolution is sequential: later merges depend on variables contributed
//! by earlier ones.

pub mod component;
pub mod defaults;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod fetcher;
pub mod filesystem;
pub mod finder;
pub mod manager;
pub mod params;
pub mod references;
pub mod scm;
pub mod template;
pub mod usable;

#[cfg(test)]
mod params_proptest;
