//! Registry documents and the Manifest Builder.
//!
//! `RegistryItem` and `RegistryIndex` mirror the externally owned registry
//! JSON schemas. Deserialization is lenient (every field defaulted) so that
//! malformed emitted documents reach schema validation instead of failing
//! to load.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{Block, FileRole, Layout, RegistryConfig};
use crate::discovery::{manifest_source_path, FileDescriptor};
use crate::imports::analyze_imports;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(rename = "registry:block")]
    Block,
    #[serde(rename = "registry:component")]
    Component,
    #[serde(rename = "registry:lib")]
    Lib,
    #[serde(rename = "registry:hook")]
    Hook,
    #[serde(rename = "registry:ui")]
    Ui,
    #[serde(rename = "registry:page")]
    Page,
    #[serde(rename = "registry:file")]
    File,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Block => "registry:block",
            ItemType::Component => "registry:component",
            ItemType::Lib => "registry:lib",
            ItemType::Hook => "registry:hook",
            ItemType::Ui => "registry:ui",
            ItemType::Page => "registry:page",
            ItemType::File => "registry:file",
        }
    }

    fn from_role(role: FileRole) -> Self {
        match role {
            FileRole::Page => ItemType::Page,
            FileRole::Library => ItemType::Lib,
            FileRole::Hook => ItemType::Hook,
            FileRole::UiPrimitive => ItemType::Ui,
            FileRole::GenericComponent => ItemType::Component,
            FileRole::TypeDefinition => ItemType::File,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default)]
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryItem {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub dev_dependencies: Vec<String>,
    #[serde(default)]
    pub registry_dependencies: Vec<String>,
    #[serde(default)]
    pub files: Vec<RegistryFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl RegistryItem {
    /// Targets of every file that declares one, normalized to `/` without a leading slash.
    pub fn targets(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|f| f.target.as_deref())
            .filter(|t| !t.is_empty())
            .map(normalize_target)
            .collect()
    }
}

pub fn normalize_target(target: &str) -> String {
    target.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Summary of one item inside the aggregate index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl IndexEntry {
    pub fn category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryIndex {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub items: Vec<IndexEntry>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MANIFEST BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Tie-break order when several roles are equally common.
const ROLE_PRIORITY: &[FileRole] = &[
    FileRole::GenericComponent,
    FileRole::Page,
    FileRole::Library,
    FileRole::Hook,
    FileRole::UiPrimitive,
    FileRole::TypeDefinition,
];

/// Page-bearing directory blocks are composite; everything else takes its dominant role.
pub fn classify_item(layout: Layout, roles: &[FileRole]) -> ItemType {
    if layout == Layout::Directory && roles.contains(&FileRole::Page) {
        return ItemType::Block;
    }

    let mut counts: BTreeMap<FileRole, usize> = BTreeMap::new();
    for role in roles {
        *counts.entry(*role).or_default() += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    ROLE_PRIORITY
        .iter()
        .find(|role| max > 0 && counts.get(role).copied() == Some(max))
        .map(|role| ItemType::from_role(*role))
        .unwrap_or(ItemType::Component)
}

#[derive(Debug, Default)]
struct DependencySets {
    external: BTreeSet<String>,
    registry: BTreeSet<String>,
}

pub struct ManifestBuilder<'c> {
    config: &'c RegistryConfig,
}

impl<'c> ManifestBuilder<'c> {
    pub fn new(config: &'c RegistryConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, block: &Block, files: &[FileDescriptor]) -> RegistryItem {
        let deps = self.collect_dependencies(files);
        let roles: Vec<FileRole> = files.iter().map(|f| f.role).collect();

        RegistryItem {
            schema: Some(self.config.schema_urls.item.clone()),
            name: block.id.clone(),
            item_type: classify_item(block.layout, &roles).as_str().to_string(),
            title: Some(block.name.clone()),
            description: None,
            dependencies: deps.external.into_iter().collect(),
            dev_dependencies: Vec::new(),
            registry_dependencies: deps.registry.into_iter().collect(),
            files: files
                .iter()
                .map(|f| RegistryFile {
                    path: manifest_source_path(&self.config.components_dir, f),
                    file_type: f.role.registry_type().to_string(),
                    target: Some(f.target_path.clone()),
                    content: f.content.clone(),
                })
                .collect(),
            categories: vec![block.category.clone()],
        }
    }

    fn collect_dependencies(&self, files: &[FileDescriptor]) -> DependencySets {
        let mut sets = DependencySets::default();
        for file in files {
            let Some(content) = &file.content else {
                continue;
            };
            let analysis = analyze_imports(content, &file.source_path, self.config);
            sets.external.extend(analysis.external_packages);
            sets.registry.extend(analysis.ui_primitive_imports);
        }
        sets
    }

    pub fn index(&self, items: &[RegistryItem]) -> RegistryIndex {
        let mut entries: Vec<IndexEntry> = items
            .iter()
            .map(|item| IndexEntry {
                name: item.name.clone(),
                item_type: item.item_type.clone(),
                title: item.title.clone(),
                categories: item.categories.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        RegistryIndex {
            schema: Some(self.config.schema_urls.registry.clone()),
            name: self.config.registry_name.clone(),
            homepage: self.config.homepage.clone(),
            items: entries,
        }
    }
}
