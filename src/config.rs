//! Configuration for the registry pipeline.
//!
//! Blocks, role tables and collaborator commands are plain data loaded from
//! `registry.config.json`. Every field has a default, so `{}` is a valid config.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "registry.config.json";
pub const INDEX_FILE: &str = "registry.json";

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCKS & ROLES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    #[serde(alias = "file")]
    SingleFile,
    Directory,
}

/// A publishable unit of component source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub category: String,
    #[serde(alias = "displayName")]
    pub name: String,
    #[serde(alias = "type")]
    pub layout: Layout,
}

/// Role of a single file inside a block, as installed into a consumer project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileRole {
    Page,
    Library,
    Hook,
    UiPrimitive,
    GenericComponent,
    TypeDefinition,
}

impl FileRole {
    pub fn registry_type(self) -> &'static str {
        match self {
            FileRole::Page => "registry:page",
            FileRole::Library => "registry:lib",
            FileRole::Hook => "registry:hook",
            FileRole::UiPrimitive => "registry:ui",
            FileRole::GenericComponent => "registry:component",
            FileRole::TypeDefinition => "registry:file",
        }
    }

    pub fn from_registry_type(value: &str) -> Option<Self> {
        match value {
            "registry:page" => Some(FileRole::Page),
            "registry:lib" => Some(FileRole::Library),
            "registry:hook" => Some(FileRole::Hook),
            "registry:ui" => Some(FileRole::UiPrimitive),
            "registry:component" | "registry:block" => Some(FileRole::GenericComponent),
            "registry:file" => Some(FileRole::TypeDefinition),
            _ => None,
        }
    }
}

/// A directory name that maps files onto a fixed location in the consumer project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialDir {
    pub segment: String,
    pub role: FileRole,
    /// Root of the installed location, e.g. `hooks` or `components/ui`.
    pub target_root: String,
    /// Whether directory blocks get their id inserted below `target_root`.
    #[serde(default)]
    pub namespaced: bool,
}

impl SpecialDir {
    fn new(segment: &str, role: FileRole, target_root: &str, namespaced: bool) -> Self {
        Self {
            segment: segment.to_string(),
            role,
            target_root: target_root.to_string(),
            namespaced,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEFAULT TABLES
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref DEFAULT_SPECIAL_DIRS: Vec<SpecialDir> = vec![
        SpecialDir::new("app", FileRole::Page, "app", false),
        SpecialDir::new("lib", FileRole::Library, "lib", true),
        SpecialDir::new("hooks", FileRole::Hook, "hooks", true),
        SpecialDir::new("ui", FileRole::UiPrimitive, "components/ui", false),
    ];

    static ref DEFAULT_BUILTIN_MODULES: Vec<&'static str> = vec![
        "react",
        "react-dom",
        "react/jsx-runtime",
        "react/jsx-dev-runtime",
        "next",
        "next/app",
        "next/document",
        "next/head",
        "next/image",
        "next/link",
        "next/navigation",
        "next/router",
        "next/script",
        "fs",
        "fs/promises",
        "path",
        "crypto",
        "util",
        "os",
        "stream",
        "events",
        "buffer",
        "url",
        "querystring",
        "http",
        "https",
        "zlib",
        "assert",
    ];

    static ref DEFAULT_BUILTIN_PREFIXES: Vec<&'static str> = vec!["@next/", "react/", "next/", "node:"];
}

fn default_special_dirs() -> Vec<SpecialDir> {
    DEFAULT_SPECIAL_DIRS.clone()
}

fn default_builtin_modules() -> Vec<String> {
    DEFAULT_BUILTIN_MODULES.iter().map(|s| s.to_string()).collect()
}

fn default_builtin_prefixes() -> Vec<String> {
    DEFAULT_BUILTIN_PREFIXES.iter().map(|s| s.to_string()).collect()
}

fn default_components_dir() -> PathBuf {
    PathBuf::from("content/components")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("public/r")
}

fn default_registry_name() -> String {
    "blocks".to_string()
}

fn default_homepage() -> String {
    "https://blocks.so".to_string()
}

fn default_alias() -> String {
    "@/".to_string()
}

fn default_shared_allowlist() -> Vec<String> {
    vec!["@/lib/utils".to_string()]
}

fn default_schema_cache_dir() -> PathBuf {
    PathBuf::from("tests/registry/.cache")
}

fn default_schema_hashes_fixture() -> PathBuf {
    PathBuf::from("tests/registry/fixtures/schema-hashes.json")
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaUrls {
    pub registry: String,
    pub item: String,
}

impl Default for SchemaUrls {
    fn default() -> Self {
        Self {
            registry: "https://ui.shadcn.com/schema/registry.json".to_string(),
            item: "https://ui.shadcn.com/schema/registry-item.json".to_string(),
        }
    }
}

/// A subprocess invocation with `{placeholder}` substitution in its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{}}}", key), value)
                })
            })
            .collect()
    }

    /// Human-readable command line for diagnostics.
    pub fn display(&self, vars: &[(&str, &str)]) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.render_args(vars));
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallConfig {
    pub installer: CommandSpec,
    pub typecheck: CommandSpec,
    /// `node_modules` directory linked into the mock project before type-checking.
    pub node_modules: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Block ids to install. Empty means one block per (layout, item type) pair.
    pub representative: Vec<String>,
    /// Source of `lib/utils.ts` for the mock project.
    pub utils_source: Option<PathBuf>,
    /// `package.json` fixture for the mock project.
    pub package_json: Option<PathBuf>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            installer: CommandSpec::new("bunx", &["shadcn", "add", "{url}", "--yes", "--overwrite"]),
            typecheck: CommandSpec::new(
                "npx",
                &["tsc", "--noEmit", "--project", "{project}/tsconfig.json"],
            ),
            node_modules: Some(PathBuf::from("node_modules")),
            timeout_secs: 600,
            representative: Vec::new(),
            utils_source: Some(PathBuf::from("lib/utils.ts")),
            package_json: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    #[serde(default = "default_components_dir")]
    pub components_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_registry_name")]
    pub registry_name: String,
    #[serde(default = "default_homepage")]
    pub homepage: String,
    #[serde(default = "default_alias")]
    pub alias: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default = "default_special_dirs")]
    pub special_dirs: Vec<SpecialDir>,
    #[serde(default = "default_builtin_modules")]
    pub builtin_modules: Vec<String>,
    #[serde(default = "default_builtin_prefixes")]
    pub builtin_prefixes: Vec<String>,
    #[serde(default = "default_shared_allowlist")]
    pub shared_allowlist: Vec<String>,
    #[serde(default)]
    pub ui_components_dir: Option<PathBuf>,
    #[serde(default)]
    pub schema_urls: SchemaUrls,
    #[serde(default = "default_schema_cache_dir")]
    pub schema_cache_dir: PathBuf,
    #[serde(default = "default_schema_hashes_fixture")]
    pub schema_hashes_fixture: PathBuf,
    #[serde(default)]
    pub install: InstallConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            components_dir: default_components_dir(),
            output_dir: default_output_dir(),
            registry_name: default_registry_name(),
            homepage: default_homepage(),
            alias: default_alias(),
            blocks: Vec::new(),
            special_dirs: default_special_dirs(),
            builtin_modules: default_builtin_modules(),
            builtin_prefixes: default_builtin_prefixes(),
            shared_allowlist: default_shared_allowlist(),
            ui_components_dir: None,
            schema_urls: SchemaUrls::default(),
            schema_cache_dir: default_schema_cache_dir(),
            schema_hashes_fixture: default_schema_hashes_fixture(),
            install: InstallConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| RegistryError::io(path, e))?;
        let config: RegistryConfig =
            serde_json::from_str(&raw).map_err(|e| RegistryError::json(path, e))?;
        config.check()?;
        Ok(config)
    }

    /// Rejects configs whose block ids would collide in the output directory.
    pub fn check(&self) -> Result<()> {
        if !self.alias.ends_with('/') {
            return Err(RegistryError::Config(format!(
                "alias '{}' must end with '/'",
                self.alias
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for block in &self.blocks {
            if block.id.is_empty() || block.id.contains('/') {
                return Err(RegistryError::Config(format!(
                    "invalid block id '{}'",
                    block.id
                )));
            }
            if !seen.insert(block.id.as_str()) {
                return Err(RegistryError::Config(format!(
                    "duplicate block id '{}'",
                    block.id
                )));
            }
        }
        Ok(())
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn special_dir(&self, segment: &str) -> Option<&SpecialDir> {
        self.special_dirs.iter().find(|d| d.segment == segment)
    }

    pub fn special_dir_for_role(&self, role: FileRole) -> Option<&SpecialDir> {
        self.special_dirs.iter().find(|d| d.role == role)
    }

    pub fn is_builtin(&self, specifier: &str) -> bool {
        self.builtin_modules.iter().any(|m| m == specifier)
            || self
                .builtin_prefixes
                .iter()
                .any(|p| specifier.starts_with(p.as_str()))
    }

    /// `@/components/ui/`
    pub fn ui_prefix(&self) -> String {
        format!("{}components/ui/", self.alias)
    }

    pub fn item_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.json", name))
    }

    pub fn index_path(&self) -> PathBuf {
        self.output_dir.join(INDEX_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_a_valid_config() {
        let config: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert!(config.check().is_ok());
    }

    #[test]
    fn builtin_matching_uses_exact_names_and_prefixes() {
        let config = RegistryConfig::default();
        assert!(config.is_builtin("react"));
        assert!(config.is_builtin("next/font/google"));
        assert!(config.is_builtin("node:fs"));
        assert!(!config.is_builtin("lucide-react"));
        assert!(!config.is_builtin("react-hook-form"));
    }

    #[test]
    fn blocks_accept_original_field_names() {
        let block: Block = serde_json::from_str(
            r#"{"id":"sidebar-01","category":"sidebar","displayName":"Sidebar","type":"directory"}"#,
        )
        .unwrap();
        assert_eq!(block.layout, Layout::Directory);
        assert_eq!(block.name, "Sidebar");

        let block: Block = serde_json::from_str(
            r#"{"id":"login-01","category":"login","name":"Login","layout":"file"}"#,
        )
        .unwrap();
        assert_eq!(block.layout, Layout::SingleFile);
    }

    #[test]
    fn duplicate_block_ids_are_rejected() {
        let block = Block {
            id: "a".into(),
            category: "c".into(),
            name: "A".into(),
            layout: Layout::SingleFile,
        };
        let config = RegistryConfig {
            blocks: vec![block.clone(), block],
            ..RegistryConfig::default()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn command_placeholders_are_substituted() {
        let cmd = CommandSpec::new("bunx", &["shadcn", "add", "{url}"]);
        assert_eq!(
            cmd.render_args(&[("url", "http://x/r/a.json")]),
            vec!["shadcn", "add", "http://x/r/a.json"]
        );
    }
}
