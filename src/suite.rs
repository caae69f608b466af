//! Validation Suite
//!
//! Runs every check against the *emitted* documents, not the sources, so the
//! shipped artifact is what gets verified. Checks never short-circuit: each
//! one contributes to a single batched [`Report`].

use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{RegistryConfig, INDEX_FILE};
use crate::diagnostics::{
    Check, Diagnostic, Report, REG_INFRA, REG_STRUCT_MISSING_DOCUMENT, REG_STRUCT_UNLISTED_DOCUMENT,
};
use crate::manifest::{RegistryIndex, RegistryItem};
use crate::{deps, install, resolve, schema, structure};

// ═══════════════════════════════════════════════════════════════════════════════
// LOADED REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct LoadedItem {
    pub document_path: PathBuf,
    /// The document exactly as emitted, for schema validation.
    pub raw: Value,
    pub item: RegistryItem,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedRegistry {
    pub output_dir: PathBuf,
    pub index_raw: Option<Value>,
    pub index: Option<RegistryIndex>,
    pub items: Vec<LoadedItem>,
    /// Unreadable or unparseable documents, and disagreements between the
    /// index and the documents on disk.
    pub failures: Vec<Diagnostic>,
}

fn load_failure(path: &Path, message: String) -> Diagnostic {
    Diagnostic::error(REG_INFRA, Check::Structure, &path.display().to_string())
        .with_message(message)
        .suggest("Re-run the registry build so every document is valid JSON")
}

fn read_json(path: &Path) -> Result<Value, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("failed to read: {}", e))?;
    serde_json::from_str(&data).map_err(|e| format!("invalid json: {}", e))
}

/// Item documents in `output_dir`, sorted, excluding the index.
fn list_documents(output_dir: &Path) -> Result<Vec<PathBuf>, String> {
    let entries = fs::read_dir(output_dir).map_err(|e| format!("failed to list: {}", e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().map(|ext| ext == "json").unwrap_or(false)
                && p.file_name().map(|n| n != INDEX_FILE).unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl LoadedRegistry {
    /// Load the index and the item documents it lists.
    ///
    /// Index entries without a document and documents the index does not list
    /// are both reported. Without a readable index every document is loaded.
    pub fn load(output_dir: &Path) -> Self {
        let mut registry = LoadedRegistry {
            output_dir: output_dir.to_path_buf(),
            ..Default::default()
        };

        let index_path = output_dir.join(INDEX_FILE);
        match read_json(&index_path) {
            Ok(raw) => {
                match serde_json::from_value::<RegistryIndex>(raw.clone()) {
                    Ok(index) => registry.index = Some(index),
                    Err(e) => registry.failures.push(load_failure(&index_path, e.to_string())),
                }
                registry.index_raw = Some(raw);
            }
            Err(message) => registry.failures.push(load_failure(&index_path, message)),
        }

        let documents = match list_documents(output_dir) {
            Ok(paths) => paths,
            Err(message) => {
                registry.failures.push(load_failure(output_dir, message));
                Vec::new()
            }
        };

        let listed: Option<Vec<String>> = registry
            .index
            .as_ref()
            .map(|index| index.items.iter().map(|e| e.name.clone()).collect());

        match listed {
            Some(names) => {
                for name in &names {
                    let path = output_dir.join(format!("{}.json", name));
                    if path.is_file() {
                        registry.load_item(path);
                    } else {
                        registry.failures.push(
                            Diagnostic::error(REG_STRUCT_MISSING_DOCUMENT, Check::Structure, name)
                                .with_file(&path.display().to_string(), None)
                                .with_message("listed in the index but no document was emitted")
                                .suggest("Re-run the registry build so every indexed item has a document"),
                        );
                    }
                }

                let listed: BTreeSet<&str> = names.iter().map(String::as_str).collect();
                for path in documents {
                    let stem = document_stem(&path);
                    if !listed.contains(stem.as_str()) {
                        registry.failures.push(
                            Diagnostic::error(REG_STRUCT_UNLISTED_DOCUMENT, Check::Structure, &stem)
                                .with_file(&path.display().to_string(), None)
                                .with_message("document is not listed in the index")
                                .suggest("Delete the stale document, or rebuild so the index lists it"),
                        );
                    }
                }
            }
            None => {
                for path in documents {
                    registry.load_item(path);
                }
            }
        }

        tracing::debug!(
            dir = %output_dir.display(),
            items = registry.items.len(),
            failures = registry.failures.len(),
            "loaded emitted registry"
        );
        registry
    }

    fn load_item(&mut self, path: PathBuf) {
        let raw = match read_json(&path) {
            Ok(raw) => raw,
            Err(message) => {
                self.failures.push(load_failure(&path, message));
                return;
            }
        };
        match serde_json::from_value::<RegistryItem>(raw.clone()) {
            Ok(mut item) => {
                if item.name.is_empty() {
                    item.name = document_stem(&path);
                }
                self.items.push(LoadedItem {
                    document_path: path,
                    raw,
                    item,
                });
            }
            Err(e) => self.failures.push(load_failure(&path, e.to_string())),
        }
    }

    /// Whether the index lists `name`.
    pub fn indexed(&self, name: &str) -> bool {
        self.index
            .as_ref()
            .map(|index| index.items.iter().any(|e| e.name == name))
            .unwrap_or(false)
    }

    pub fn item(&self, name: &str) -> Option<&RegistryItem> {
        self.items.iter().find(|i| i.item.name == name).map(|i| &i.item)
    }

    pub fn registry_items(&self) -> impl Iterator<Item = &RegistryItem> {
        self.items.iter().map(|i| &i.item)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUITE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteOptions {
    pub schema: bool,
    pub static_checks: bool,
    pub install: bool,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            schema: true,
            static_checks: true,
            install: false,
        }
    }
}

/// Import resolution, dependency audit and structural checks, in parallel.
pub fn run_static_checks(registry: &LoadedRegistry, config: &RegistryConfig) -> Vec<Diagnostic> {
    let ((imports, dependencies), structure) = rayon::join(
        || {
            rayon::join(
                || resolve::check(registry, config),
                || deps::check(registry, config),
            )
        },
        || structure::check(registry, config),
    );

    let mut diagnostics = imports;
    diagnostics.extend(dependencies);
    diagnostics.extend(structure);
    diagnostics
}

pub async fn run_suite(config: Arc<RegistryConfig>, options: SuiteOptions) -> Report {
    let registry = Arc::new(LoadedRegistry::load(&config.output_dir));
    let mut report = Report::new();
    report.extend(registry.failures.iter().cloned());

    let static_checks = options.static_checks.then(|| {
        let registry = Arc::clone(&registry);
        let config = Arc::clone(&config);
        tokio::task::spawn_blocking(move || run_static_checks(&registry, &config))
    });

    if options.schema {
        report.extend(schema::check(&config, &registry).await);
    }

    if let Some(handle) = static_checks {
        match handle.await {
            Ok(diagnostics) => report.extend(diagnostics),
            Err(e) => report.push(
                Diagnostic::error(REG_INFRA, Check::ImportResolution, &config.registry_name)
                    .with_message(format!("static checks aborted: {}", e))
                    .suggest("Inspect the panic above and re-run validation"),
            ),
        }
    }

    if options.install {
        report.extend(install::simulate(&config, &registry).await);
    }

    report.sort();
    for warning in report.warnings() {
        tracing::warn!("{}", warning);
    }
    tracing::info!(
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "validation finished"
    );
    report
}
