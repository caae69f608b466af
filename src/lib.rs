//! # Registry Build Pipeline
//!
//! Turns a tree of React/TypeScript component sources into installable
//! registry documents, then verifies those documents.
//!
//! ## Build Invariants
//!
//! 1. **Self-contained items**: no emitted file content contains a relative
//!    module specifier. Every `./` / `../` import is rewritten to the project
//!    alias (`@/`) pointing at the imported file's installed location.
//!
//! 2. **Round-trip resolution**: every rewritten specifier resolves, after
//!    extension/index resolution, to a target shipped by the same item.
//!
//! 3. **Namespacing**: directory blocks install under `components/<blockId>/`
//!    (and `lib/<blockId>/`, `hooks/<blockId>/`), so two blocks never write
//!    the same target.
//!
//! 4. **Dependency completeness**: every external package imported by a file
//!    appears in `dependencies`; every `@/components/ui/<name>` import appears
//!    in `registryDependencies`.
//!
//! 5. **Determinism**: identical sources produce byte-identical documents.
//!
//! ## Validation
//!
//! Validation reads the *emitted* documents and never stops at the first
//! problem: schema, import-resolution, dependency, structural and
//! installation checks all report into one [`diagnostics::Report`].

pub mod cache;
pub mod config;
pub mod deps;
pub mod diagnostics;
pub mod discovery;
pub mod emit;
pub mod error;
pub mod imports;
pub mod install;
pub mod manifest;
pub mod pipeline;
pub mod resolve;
pub mod schema;
pub mod structure;
pub mod suite;
pub mod transform;

#[cfg(test)]
mod discovery_tests;
#[cfg(test)]
mod manifest_tests;
#[cfg(test)]
mod schema_tests;
#[cfg(test)]
mod test_support;
#[cfg(test)]
mod transform_tests;

pub use config::{Block, FileRole, Layout, RegistryConfig};
pub use diagnostics::{Diagnostic, Report, Severity};
pub use error::{RegistryError, Result};
pub use manifest::{RegistryIndex, RegistryItem};
pub use pipeline::{run_build, BuildOutput};
pub use suite::{run_suite, LoadedRegistry, SuiteOptions};
