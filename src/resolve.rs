//! Import resolution check.
//!
//! Every import that survives into an emitted item must land somewhere once
//! the item is installed: relative imports on another file of the same item,
//! alias imports into the item's own namespace on one of its targets, and
//! shared imports on a declared registry dependency.

use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::config::RegistryConfig;
use crate::diagnostics::{
    json_string_list, Check, Diagnostic, REG_IMPORT_INTERNAL, REG_IMPORT_NO_TARGET,
    REG_IMPORT_RELATIVE, REG_IMPORT_SHARED,
};
use crate::imports::{collect_specifiers, is_relative, ui_primitive_name, ModuleSpecifier};
use crate::manifest::{RegistryFile, RegistryItem};
use crate::suite::LoadedRegistry;
use crate::transform::strip_source_extension;

// ═══════════════════════════════════════════════════════════════════════════════
// TARGET MATCH SET
// ═══════════════════════════════════════════════════════════════════════════════

/// Import paths an item's files answer to once installed.
///
/// Each target matches as written and without its extension; `…/index.tsx`
/// targets also match their directory.
#[derive(Debug, Clone, Default)]
pub struct TargetMatchSet {
    targets: Vec<String>,
    paths: HashSet<String>,
}

impl TargetMatchSet {
    pub fn from_item(item: &RegistryItem) -> Self {
        let mut set = TargetMatchSet::default();
        for target in item.targets() {
            set.paths.insert(target.clone());
            let stem = strip_source_extension(&target).to_string();
            if let Some(dir) = stem.strip_suffix("/index") {
                set.paths.insert(dir.to_string());
            }
            set.paths.insert(stem);
            set.targets.push(target);
        }
        set
    }

    pub fn contains(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.paths.contains(path) || self.paths.contains(strip_source_extension(path))
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

const OUTSIDE_PROJECT: &str = "<outside project>";

/// Lexically join `spec` onto the POSIX directory `base`.
///
/// `None` if a `..` climbs above the project root.
pub fn join_posix(base: &str, spec: &str) -> Option<String> {
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    for part in spec.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn dirname(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn file_label(file: &RegistryFile) -> &str {
    if file.path.is_empty() {
        file.target.as_deref().unwrap_or_default()
    } else {
        &file.path
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHECK
// ═══════════════════════════════════════════════════════════════════════════════

/// Alias prefixes owned by `item`: `@/components/<id>`, `@/lib/<id>`, `@/hooks/<id>`.
fn own_namespaces(item: &RegistryItem, config: &RegistryConfig) -> Vec<String> {
    let mut roots = vec!["components".to_string()];
    roots.extend(
        config
            .special_dirs
            .iter()
            .filter(|d| d.namespaced)
            .map(|d| d.target_root.clone()),
    );
    roots
        .into_iter()
        .map(|root| format!("{}{}/{}", config.alias, root, item.name))
        .collect()
}

/// Alias prefixes of shared, un-owned locations (`@/lib/`, `@/hooks/`).
fn shared_roots(config: &RegistryConfig) -> Vec<String> {
    config
        .special_dirs
        .iter()
        .filter(|d| d.namespaced)
        .map(|d| format!("{}{}/", config.alias, d.target_root))
        .collect()
}

fn within(specifier: &str, prefix: &str) -> bool {
    specifier == prefix
        || specifier
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

fn last_segment(specifier: &str) -> &str {
    specifier.rsplit('/').next().unwrap_or(specifier)
}

struct ItemResolver<'a> {
    item: &'a RegistryItem,
    config: &'a RegistryConfig,
    matches: TargetMatchSet,
    declared: BTreeSet<&'a str>,
    own: Vec<String>,
    shared: Vec<String>,
}

impl<'a> ItemResolver<'a> {
    fn new(item: &'a RegistryItem, config: &'a RegistryConfig) -> Self {
        Self {
            item,
            config,
            matches: TargetMatchSet::from_item(item),
            declared: item
                .registry_dependencies
                .iter()
                .map(|d| last_segment(d.trim_end_matches(".json")))
                .collect(),
            own: own_namespaces(item, config),
            shared: shared_roots(config),
        }
    }

    fn check_file(&self, file: &RegistryFile) -> Vec<Diagnostic> {
        let Some(content) = file.content.as_deref() else {
            return Vec::new();
        };
        let label = file_label(file);
        let specifiers = collect_specifiers(content, Path::new(label));
        let mut diagnostics = Vec::new();

        let relative: Vec<&ModuleSpecifier> =
            specifiers.iter().filter(|s| is_relative(&s.value)).collect();
        let target = file.target.as_deref().filter(|t| !t.is_empty());
        match target {
            None if !relative.is_empty() => {
                let values: Vec<String> = relative.iter().map(|s| s.value.clone()).collect();
                diagnostics.push(
                    Diagnostic::error(REG_IMPORT_NO_TARGET, Check::ImportResolution, &self.item.name)
                        .with_file(label, relative.first().map(|s| s.line))
                        .with_field("Relative Imports", json_string_list(&values))
                        .suggest("Add a target to this file, or rewrite the imports to the project alias"),
                );
            }
            Some(target) => {
                let base = dirname(&crate::manifest::normalize_target(target)).to_string();
                for spec in relative {
                    let Some(resolved) = join_posix(&base, &spec.value) else {
                        diagnostics.push(self.unresolved(
                            REG_IMPORT_RELATIVE,
                            label,
                            spec,
                            OUTSIDE_PROJECT,
                            "Keep relative imports inside the project; this one climbs above its root",
                        ));
                        continue;
                    };
                    if !self.matches.contains(&resolved) {
                        diagnostics.push(self.unresolved(
                            REG_IMPORT_RELATIVE,
                            label,
                            spec,
                            &resolved,
                            "Ship the imported file in this item, or rewrite the import to the project alias",
                        ));
                    }
                }
            }
            None => {}
        }

        for spec in specifiers
            .iter()
            .filter(|s| s.value.starts_with(self.config.alias.as_str()))
        {
            if let Some(diagnostic) = self.check_alias_import(label, spec) {
                diagnostics.push(diagnostic);
            }
        }
        diagnostics
    }

    fn check_alias_import(&self, label: &str, spec: &ModuleSpecifier) -> Option<Diagnostic> {
        let value = spec.value.as_str();
        let resolved = value.strip_prefix(self.config.alias.as_str()).unwrap_or(value);

        if self.own.iter().any(|prefix| within(value, prefix)) {
            return (!self.matches.contains(resolved)).then(|| {
                self.unresolved(
                    REG_IMPORT_INTERNAL,
                    label,
                    spec,
                    resolved,
                    "Ship the imported file in this item, or fix the import path",
                )
            });
        }

        if let Some(name) = ui_primitive_name(value, self.config) {
            return (!self.declared.contains(name.as_str())).then(|| {
                self.undeclared(label, spec)
                    .suggest(format!("Add \"{}\" to registryDependencies", name))
            });
        }

        if self.shared.iter().any(|root| value.starts_with(root.as_str())) {
            let allowed = self.config.shared_allowlist.iter().any(|a| a == value)
                || self.declared.contains(last_segment(value));
            return (!allowed).then(|| {
                self.undeclared(label, spec).suggest(format!(
                    "Add \"{}\" to registryDependencies, or to the shared allowlist if every consumer provides it",
                    last_segment(value)
                ))
            });
        }

        (!self.matches.contains(resolved)).then(|| {
            self.unresolved(
                REG_IMPORT_INTERNAL,
                label,
                spec,
                resolved,
                "Ship the imported file in this item, or declare the item that provides it",
            )
        })
    }

    fn unresolved(
        &self,
        code: &str,
        label: &str,
        spec: &ModuleSpecifier,
        resolved: &str,
        suggestion: &str,
    ) -> Diagnostic {
        Diagnostic::error(code, Check::ImportResolution, &self.item.name)
            .with_file(label, Some(spec.line))
            .with_field("Import", spec.value.clone())
            .with_field("Resolved Path", resolved.to_string())
            .with_field("Available Targets", json_string_list(self.matches.targets()))
            .suggest(suggestion)
    }

    fn undeclared(&self, label: &str, spec: &ModuleSpecifier) -> Diagnostic {
        let declared: Vec<String> = self.declared.iter().map(|d| d.to_string()).collect();
        Diagnostic::error(REG_IMPORT_SHARED, Check::ImportResolution, &self.item.name)
            .with_file(label, Some(spec.line))
            .with_field("Import", spec.value.clone())
            .with_field("Declared", json_string_list(&declared))
    }
}

pub fn check_item(item: &RegistryItem, config: &RegistryConfig) -> Vec<Diagnostic> {
    let resolver = ItemResolver::new(item, config);
    item.files
        .iter()
        .flat_map(|file| resolver.check_file(file))
        .collect()
}

pub fn check(registry: &LoadedRegistry, config: &RegistryConfig) -> Vec<Diagnostic> {
    let items: Vec<&RegistryItem> = registry.registry_items().collect();
    items
        .par_iter()
        .flat_map_iter(|item| check_item(item, config))
        .collect()
}
