//! Discovery Module
//!
//! Walks a block's source location and produces one [`FileDescriptor`] per
//! relevant source file, with its role and install-time target path.
//! Also discovers blocks from a `<components>/<category>/<entry>` tree.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Block, FileRole, Layout, RegistryConfig};
use crate::error::{RegistryError, Result};

pub const SOURCE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js"];

const SKIPPED_SUFFIXES: &[&str] = &[
    ".d.ts",
    ".test.ts",
    ".test.tsx",
    ".spec.ts",
    ".spec.tsx",
    ".stories.ts",
    ".stories.tsx",
];

lazy_static! {
    static ref TYPE_FILE_RE: Regex =
        Regex::new(r"(^|/)types/|(^|/)types\.tsx?$|\.types\.ts$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE DESCRIPTORS
// ═══════════════════════════════════════════════════════════════════════════════

/// One physical source file belonging to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub source_path: PathBuf,
    /// Relative to the components root, `/`-separated.
    pub source_relative_path: String,
    /// Location once installed into a consumer project.
    pub target_path: String,
    pub role: FileRole,
    /// Post-transformation text; `None` when the file could not be read.
    pub content: Option<String>,
}

pub fn is_source_file(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    let has_extension = Path::new(&lower)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e))
        .unwrap_or(false);
    has_extension && !SKIPPED_SUFFIXES.iter().any(|skip| lower.contains(skip))
}

/// `types.ts`, `types.tsx`, `*.types.ts`, or anything below a `types/` directory.
pub fn is_type_file(relative_path: &str) -> bool {
    TYPE_FILE_RE.is_match(&relative_path.replace('\\', "/"))
}

pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Scanner<'c> {
    config: &'c RegistryConfig,
    components_root: PathBuf,
}

impl<'c> Scanner<'c> {
    pub fn new(config: &'c RegistryConfig) -> Self {
        Self {
            config,
            components_root: absolute(&config.components_dir),
        }
    }

    pub fn components_root(&self) -> &Path {
        &self.components_root
    }

    /// Find the block's source: `<category>/<id>/` or `<category>/<id>.<ext>`.
    pub fn locate_block(&self, block: &Block) -> Result<PathBuf> {
        let category_dir = self.components_root.join(&block.category);
        match block.layout {
            Layout::Directory => {
                let dir = category_dir.join(&block.id);
                if dir.is_dir() {
                    return Ok(dir);
                }
            }
            Layout::SingleFile => {
                for ext in SOURCE_EXTENSIONS {
                    let file = category_dir.join(format!("{}.{}", block.id, ext));
                    if file.is_file() {
                        return Ok(file);
                    }
                }
            }
        }
        Err(RegistryError::BlockNotFound {
            id: block.id.clone(),
            path: category_dir,
        })
    }

    pub fn scan_block(&self, block: &Block) -> Result<Vec<FileDescriptor>> {
        let root = self.locate_block(block)?;
        Ok(match block.layout {
            Layout::SingleFile => vec![self.describe_single_file(&root)],
            Layout::Directory => self.scan_directory(&root, &block.id),
        })
    }

    fn describe_single_file(&self, path: &Path) -> FileDescriptor {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        FileDescriptor {
            source_path: path.to_path_buf(),
            source_relative_path: self.relative_to_components(path),
            target_path: format!("components/{}", file_name),
            role: FileRole::GenericComponent,
            content: None,
        }
    }

    fn scan_directory(&self, root: &Path, block_id: &str) -> Vec<FileDescriptor> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root).follow_links(true).sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    tracing::warn!(block = block_id, path = %path, error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !is_source_file(&name) {
                continue;
            }

            let path = entry.path();
            let relative_to_root = path
                .strip_prefix(root)
                .map(to_slash_path)
                .unwrap_or_else(|_| name.to_string());
            let (role, target_path) = self.classify_directory_file(&relative_to_root, block_id);
            tracing::debug!(block = block_id, file = %relative_to_root, target = %target_path, ?role, "scanned");

            files.push(FileDescriptor {
                source_path: path.to_path_buf(),
                source_relative_path: self.relative_to_components(path),
                target_path,
                role,
                content: None,
            });
        }

        files
    }

    /// Role and target path for a file inside a directory block.
    ///
    /// Type files win over special directories; special directories win over
    /// the generic `components/<blockId>/` namespace.
    pub fn classify_directory_file(&self, relative_to_root: &str, block_id: &str) -> (FileRole, String) {
        if is_type_file(relative_to_root) {
            return (
                FileRole::TypeDefinition,
                format!("components/{}/{}", block_id, relative_to_root),
            );
        }

        let segments: Vec<&str> = relative_to_root.split('/').collect();
        let dirs = &segments[..segments.len().saturating_sub(1)];
        for (index, segment) in dirs.iter().enumerate() {
            if let Some(special) = self.config.special_dir(segment) {
                let rest = segments[index + 1..].join("/");
                let target = if special.namespaced {
                    format!("{}/{}/{}", special.target_root, block_id, rest)
                } else {
                    format!("{}/{}", special.target_root, rest)
                };
                return (special.role, target);
            }
        }

        (
            FileRole::GenericComponent,
            format!("components/{}/{}", block_id, relative_to_root),
        )
    }

    fn relative_to_components(&self, path: &Path) -> String {
        path.strip_prefix(&self.components_root)
            .map(to_slash_path)
            .unwrap_or_else(|_| to_slash_path(path))
    }
}

/// Path recorded in the emitted manifest, e.g. `content/components/login/login-01.tsx`.
pub fn manifest_source_path(components_dir: &Path, descriptor: &FileDescriptor) -> String {
    let base = to_slash_path(components_dir);
    if base.is_empty() {
        descriptor.source_relative_path.clone()
    } else {
        format!("{}/{}", base, descriptor.source_relative_path)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

pub fn list_categories(components_dir: &Path) -> Result<Vec<String>> {
    let entries =
        fs::read_dir(components_dir).map_err(|e| RegistryError::io(components_dir, e))?;
    let mut categories: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    categories.sort();
    Ok(categories)
}

pub fn list_category_entries(category_dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(category_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %category_dir.display(), error = %e, "failed to read category directory");
            return Vec::new();
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || name.starts_with("index.") {
                return false;
            }
            entry.file_type().map(|t| t.is_dir()).unwrap_or(false) || is_source_file(&name)
        })
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

fn title_case(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Infer blocks from the content tree when none are configured.
pub fn discover_blocks(components_dir: &Path) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    for category in list_categories(components_dir)? {
        let category_dir = components_dir.join(&category);
        for entry in list_category_entries(&category_dir) {
            let path = category_dir.join(&entry);
            let (id, layout) = if path.is_dir() {
                (entry.clone(), Layout::Directory)
            } else {
                let stem = Path::new(&entry)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| entry.clone());
                (stem, Layout::SingleFile)
            };
            blocks.push(Block {
                name: title_case(&id),
                id,
                category: category.clone(),
                layout,
            });
        }
    }
    Ok(blocks)
}
