//! Dependency audit.
//!
//! Compares what each emitted item actually imports against what it declares.
//! Missing declarations are errors; surplus registry dependencies only warn,
//! since they cost the consumer an extra install but break nothing.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::config::RegistryConfig;
use crate::diagnostics::{
    format_array_diff, json_string_list, quoted_list, Check, Diagnostic, REG_DEP_MISSING_PACKAGE,
    REG_DEP_MISSING_REGISTRY, REG_DEP_UNKNOWN_UI, REG_DEP_UNUSED_REGISTRY,
};
use crate::discovery::is_source_file;
use crate::imports::{classify, collect_specifiers, ImportKind};
use crate::manifest::RegistryItem;
use crate::suite::LoadedRegistry;

/// First file and line an import was seen at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSite {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUsage {
    pub packages: BTreeMap<String, UseSite>,
    pub ui_primitives: BTreeMap<String, UseSite>,
}

pub fn collect_usage(item: &RegistryItem, config: &RegistryConfig) -> ItemUsage {
    let mut usage = ItemUsage::default();
    for file in &item.files {
        let Some(content) = file.content.as_deref() else {
            continue;
        };
        let label = if file.path.is_empty() {
            file.target.clone().unwrap_or_default()
        } else {
            file.path.clone()
        };
        for spec in collect_specifiers(content, Path::new(&label)) {
            let site = || UseSite {
                file: label.clone(),
                line: spec.line,
            };
            match classify(&spec.value, config) {
                ImportKind::External(name) => {
                    usage.packages.entry(name).or_insert_with(site);
                }
                ImportKind::Internal {
                    ui_primitive: Some(name),
                } => {
                    usage.ui_primitives.entry(name).or_insert_with(site);
                }
                _ => {}
            }
        }
    }
    usage
}

/// `lucide-react@0.300.0` → `lucide-react`, `@radix-ui/react-slot@1` → `@radix-ui/react-slot`.
pub fn strip_version(dependency: &str) -> &str {
    let search_from = usize::from(dependency.starts_with('@'));
    match dependency[search_from..].find('@') {
        Some(at) => &dependency[..search_from + at],
        None => dependency,
    }
}

/// `https://host/r/button.json` → `button`.
pub fn registry_dependency_name(dependency: &str) -> &str {
    let trimmed = dependency.trim_end_matches(".json");
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Names of UI primitives available in the consumer project.
pub fn load_ui_components(dir: &Path) -> BTreeSet<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "ui components directory unreadable; skipping unknown-ui check");
        return BTreeSet::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            if !is_source_file(&name) {
                return None;
            }
            Path::new(&name)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
        })
        .collect()
}

fn to_vec<'a>(values: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    values.into_iter().cloned().collect()
}

pub fn check_item(
    item: &RegistryItem,
    config: &RegistryConfig,
    known_ui: Option<&BTreeSet<String>>,
) -> Vec<Diagnostic> {
    let usage = collect_usage(item, config);
    let mut diagnostics = Vec::new();

    let declared_registry: BTreeSet<String> = item
        .registry_dependencies
        .iter()
        .map(|d| registry_dependency_name(d).to_string())
        .collect();
    let used_registry: BTreeSet<String> = usage.ui_primitives.keys().cloned().collect();
    let expected_registry: Vec<String> = declared_registry.union(&used_registry).cloned().collect();

    for (name, site) in &usage.ui_primitives {
        if declared_registry.contains(name) {
            continue;
        }
        diagnostics.push(
            Diagnostic::error(REG_DEP_MISSING_REGISTRY, Check::Dependencies, &item.name)
                .with_file(&site.file, Some(site.line))
                .with_field("Uses", json_string_list(&to_vec(&used_registry)))
                .with_field("Declared", json_string_list(&to_vec(&declared_registry)))
                .with_field("Missing", name.clone())
                .with_diff(format_array_diff(
                    "registryDependencies",
                    &item.registry_dependencies,
                    &expected_registry,
                ))
                .suggest(format!("Add \"{}\" to registryDependencies", name)),
        );
    }

    let unused: Vec<String> = declared_registry.difference(&used_registry).cloned().collect();
    if !unused.is_empty() {
        diagnostics.push(
            Diagnostic::warning(REG_DEP_UNUSED_REGISTRY, Check::Dependencies, &item.name)
                .with_field("Declared", json_string_list(&to_vec(&declared_registry)))
                .with_field("Unused", json_string_list(&unused))
                .suggest(format!("Remove {} from registryDependencies", quoted_list(&unused))),
        );
    }

    let declared_packages: BTreeSet<&str> = item
        .dependencies
        .iter()
        .chain(item.dev_dependencies.iter())
        .map(|d| strip_version(d))
        .collect();
    let mut expected_packages: Vec<String> = item.dependencies.clone();
    expected_packages.extend(
        usage
            .packages
            .keys()
            .filter(|p| !declared_packages.contains(p.as_str()))
            .cloned(),
    );
    for (name, site) in &usage.packages {
        if declared_packages.contains(name.as_str()) {
            continue;
        }
        diagnostics.push(
            Diagnostic::error(REG_DEP_MISSING_PACKAGE, Check::Dependencies, &item.name)
                .with_file(&site.file, Some(site.line))
                .with_field("Missing", name.clone())
                .with_diff(format_array_diff(
                    "dependencies",
                    &item.dependencies,
                    &expected_packages,
                ))
                .suggest(format!("Add \"{}\" to dependencies", name)),
        );
    }

    if let Some(known) = known_ui {
        for (name, site) in &usage.ui_primitives {
            if known.contains(name) {
                continue;
            }
            diagnostics.push(
                Diagnostic::error(REG_DEP_UNKNOWN_UI, Check::Dependencies, &item.name)
                    .with_file(&site.file, Some(site.line))
                    .with_field("Import", format!("{}{}", config.ui_prefix(), name))
                    .suggest(format!(
                        "Add \"{}\" to the UI components directory, or import an existing primitive",
                        name
                    )),
            );
        }
    }

    diagnostics
}

pub fn check(registry: &LoadedRegistry, config: &RegistryConfig) -> Vec<Diagnostic> {
    let known_ui = config.ui_components_dir.as_deref().map(load_ui_components);
    let items: Vec<&RegistryItem> = registry.registry_items().collect();
    items
        .par_iter()
        .flat_map_iter(|item| check_item(item, config, known_ui.as_ref()))
        .collect()
}
