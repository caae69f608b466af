//! Directory structure check.
//!
//! Structural rules on emitted items: composite blocks expose exactly one
//! entry point, type files are shipped as plain files, every file carries
//! content, and no two files install onto the same target.

use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::config::{Layout, RegistryConfig};
use crate::diagnostics::{
    json_string_list, Check, Diagnostic, REG_STRUCT_DUPLICATE_TARGET, REG_STRUCT_EMPTY,
    REG_STRUCT_MISSING_ITEM, REG_STRUCT_NO_CONTENT, REG_STRUCT_NO_ENTRY, REG_STRUCT_TYPE_FILE,
};
use crate::discovery::is_type_file;
use crate::manifest::{normalize_target, ItemType, RegistryItem};
use crate::resolve::TargetMatchSet;
use crate::suite::LoadedRegistry;
use crate::transform::strip_source_extension;

/// Composite items: configured directory blocks and anything typed `registry:block`.
fn is_composite(item: &RegistryItem, config: &RegistryConfig) -> bool {
    item.item_type == ItemType::Block.as_str()
        || config
            .block(&item.name)
            .map(|b| b.layout == Layout::Directory)
            .unwrap_or(false)
}

fn check_entry_point(item: &RegistryItem) -> Option<Diagnostic> {
    let entry = format!("components/{}/index", item.name);
    let index_targets: Vec<String> = item
        .targets()
        .into_iter()
        .filter(|t| strip_source_extension(t) == entry)
        .collect();
    let has_page = item
        .files
        .iter()
        .any(|f| f.file_type == ItemType::Page.as_str());

    let targets = TargetMatchSet::from_item(item);
    match index_targets.len() {
        0 if has_page => None,
        0 => Some(
            Diagnostic::error(REG_STRUCT_NO_ENTRY, Check::Structure, &item.name)
                .with_message(format!("no {}.tsx and no registry:page file", entry))
                .with_field("Available Targets", json_string_list(targets.targets()))
                .suggest(format!("Add {}.tsx re-exporting the block", entry)),
        ),
        1 => None,
        _ => Some(
            Diagnostic::error(REG_STRUCT_NO_ENTRY, Check::Structure, &item.name)
                .with_message("ambiguous entry point")
                .with_field("Entry Candidates", json_string_list(&index_targets))
                .suggest("Keep a single index file at the block root"),
        ),
    }
}

pub fn check_item(item: &RegistryItem, config: &RegistryConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if item.files.is_empty() {
        diagnostics.push(
            Diagnostic::error(REG_STRUCT_EMPTY, Check::Structure, &item.name)
                .with_message("item ships no files")
                .suggest("Check that the block source exists under the components directory"),
        );
        return diagnostics;
    }

    if is_composite(item, config) {
        diagnostics.extend(check_entry_point(item));
    }

    let mut by_target: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for file in &item.files {
        let label = if file.path.is_empty() {
            file.target.as_deref().unwrap_or_default()
        } else {
            file.path.as_str()
        };

        if file.content.is_none() {
            diagnostics.push(
                Diagnostic::error(REG_STRUCT_NO_CONTENT, Check::Structure, &item.name)
                    .with_file(label, None)
                    .suggest("Make the source file readable and rebuild the registry"),
            );
        }

        let Some(target) = file.target.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        let target = normalize_target(target);

        if is_type_file(&target) && file.file_type != ItemType::File.as_str() {
            diagnostics.push(
                Diagnostic::error(REG_STRUCT_TYPE_FILE, Check::Structure, &item.name)
                    .with_file(label, None)
                    .with_expected(ItemType::File.as_str())
                    .with_received(file.file_type.clone())
                    .suggest("Ship type definitions as registry:file"),
            );
        }

        by_target.entry(target).or_default().push(label);
    }

    for (target, files) in by_target.into_iter().filter(|(_, f)| f.len() > 1) {
        let files: Vec<String> = files.into_iter().map(str::to_string).collect();
        diagnostics.push(
            Diagnostic::error(REG_STRUCT_DUPLICATE_TARGET, Check::Structure, &item.name)
                .with_field("Target", target)
                .with_field("Files", json_string_list(&files))
                .suggest("Rename one of the files so each target is unique"),
        );
    }

    diagnostics
}

pub fn check(registry: &LoadedRegistry, config: &RegistryConfig) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = config
        .blocks
        .iter()
        // Indexed but missing documents are already reported by the loader.
        .filter(|b| {
            b.layout == Layout::Directory && registry.item(&b.id).is_none() && !registry.indexed(&b.id)
        })
        .map(|b| {
            Diagnostic::error(REG_STRUCT_MISSING_ITEM, Check::Structure, &b.id)
                .with_file(
                    &registry.output_dir.join(format!("{}.json", b.id)).display().to_string(),
                    None,
                )
                .suggest("Run the registry build to emit this block")
        })
        .collect();

    let items: Vec<&RegistryItem> = registry.registry_items().collect();
    diagnostics.extend(
        items
            .par_iter()
            .flat_map_iter(|item| check_item(item, config))
            .collect::<Vec<_>>(),
    );
    diagnostics
}
