//! Import Transformer
//!
//! Rewrites relative module specifiers into alias-qualified ones that point
//! at the installed location of the imported file. Only the specifier bytes
//! change; formatting and comments are preserved verbatim.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::cache::{TransformCache, TransformKey};
use crate::config::{FileRole, RegistryConfig};
use crate::discovery::{FileDescriptor, SOURCE_EXTENSIONS};
use crate::imports::{collect_specifiers, is_relative};

// ═══════════════════════════════════════════════════════════════════════════════
// TARGET MAP
// ═══════════════════════════════════════════════════════════════════════════════

/// Source path → target path for every file of one block.
#[derive(Debug, Clone, Default)]
pub struct TargetMap {
    by_source: HashMap<PathBuf, String>,
}

impl TargetMap {
    pub fn from_descriptors(files: &[FileDescriptor]) -> Self {
        let by_source = files
            .iter()
            .map(|f| (normalize_lexical(&f.source_path), f.target_path.clone()))
            .collect();
        Self { by_source }
    }

    /// Resolve an extension-less or directory import the way a bundler would.
    pub fn resolve(&self, base: &Path) -> Option<&str> {
        if let Some(target) = self.by_source.get(base) {
            return Some(target);
        }
        let file_name = base.file_name()?.to_string_lossy().to_string();
        for ext in SOURCE_EXTENSIONS {
            let candidate = base.with_file_name(format!("{}.{}", file_name, ext));
            if let Some(target) = self.by_source.get(&candidate) {
                return Some(target);
            }
        }
        for ext in SOURCE_EXTENSIONS {
            if let Some(target) = self.by_source.get(&base.join(format!("index.{}", ext))) {
                return Some(target);
            }
        }
        None
    }
}

pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `components/x/data.ts` → `components/x/data`; `components/x/index.tsx` → `components/x`.
fn import_path_for_target(target: &str, specifier: &str) -> String {
    let without_ext = strip_source_extension(target);
    let names_index = specifier.trim_end_matches('/').ends_with("index")
        || specifier.ends_with("index.tsx")
        || specifier.ends_with("index.ts");
    match without_ext.strip_suffix("/index") {
        Some(dir) if !names_index => dir.to_string(),
        _ => without_ext.to_string(),
    }
}

pub fn strip_source_extension(path: &str) -> &str {
    for ext in SOURCE_EXTENSIONS {
        if let Some(stripped) = path.strip_suffix(&format!(".{}", ext)) {
            return stripped;
        }
    }
    path
}

/// `../../foo/bar` → `foo/bar`
fn strip_relative_prefix(specifier: &str) -> String {
    specifier
        .split('/')
        .skip_while(|s| *s == "." || *s == "..")
        .collect::<Vec<_>>()
        .join("/")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORMER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ImportTransformer<'c> {
    config: &'c RegistryConfig,
    cache: &'c TransformCache,
}

impl<'c> ImportTransformer<'c> {
    pub fn new(config: &'c RegistryConfig, cache: &'c TransformCache) -> Self {
        Self { config, cache }
    }

    /// Read and transform one scanned file. `None` if the file is unreadable.
    pub fn transform_file(
        &self,
        descriptor: &FileDescriptor,
        namespace: Option<&str>,
        targets: &TargetMap,
    ) -> Option<String> {
        let key = TransformKey {
            path: descriptor.source_path.clone(),
            role: descriptor.role,
            block_id: namespace.unwrap_or_default().to_string(),
        };

        self.cache.get_or_insert_with(key, || {
            match fs::read_to_string(&descriptor.source_path) {
                Ok(content) => Some(self.transform_content(
                    &content,
                    &descriptor.source_path,
                    descriptor.role,
                    namespace,
                    Some(targets),
                )),
                Err(e) => {
                    tracing::warn!(
                        path = %descriptor.source_path.display(),
                        error = %e,
                        "could not read file for import transformation"
                    );
                    None
                }
            }
        })
    }

    pub fn transform_content(
        &self,
        content: &str,
        source_path: &Path,
        role: FileRole,
        namespace: Option<&str>,
        targets: Option<&TargetMap>,
    ) -> String {
        let mut replacements: Vec<(usize, usize, String)> = collect_specifiers(content, source_path)
            .into_iter()
            .filter(|spec| is_relative(&spec.value))
            .map(|spec| {
                let rewritten = self.rewrite_specifier(&spec.value, source_path, role, namespace, targets);
                (spec.start, spec.end, rewritten)
            })
            .collect();

        if replacements.is_empty() {
            return content.to_string();
        }

        // Apply back to front so earlier offsets stay valid.
        replacements.sort_by(|a, b| b.0.cmp(&a.0));
        let mut result = content.to_string();
        for (start, end, replacement) in replacements {
            result.replace_range(start..end, &replacement);
        }

        for issue in self.check_transformation(&result, source_path) {
            tracing::warn!(path = %source_path.display(), "{}", issue);
        }
        result
    }

    fn rewrite_specifier(
        &self,
        specifier: &str,
        source_path: &Path,
        role: FileRole,
        namespace: Option<&str>,
        targets: Option<&TargetMap>,
    ) -> String {
        if let (Some(targets), Some(source_dir)) = (targets, source_path.parent()) {
            let resolved = normalize_lexical(&source_dir.join(specifier));
            if let Some(target) = targets.resolve(&resolved) {
                return format!("{}{}", self.config.alias, import_path_for_target(target, specifier));
            }
        }
        format!("{}/{}", self.base_path(role, namespace), strip_relative_prefix(specifier))
    }

    /// Alias-qualified directory a file of `role` is installed under.
    pub fn base_path(&self, role: FileRole, namespace: Option<&str>) -> String {
        let (root, namespaced) = match role {
            FileRole::Library | FileRole::Hook => match self.config.special_dir_for_role(role) {
                Some(dir) => (dir.target_root.as_str(), dir.namespaced),
                None if role == FileRole::Library => ("lib", true),
                None => ("hooks", true),
            },
            _ => ("components", true),
        };
        match namespace {
            Some(id) if namespaced => format!("{}{}/{}", self.config.alias, root, id),
            _ => format!("{}{}", self.config.alias, root),
        }
    }

    /// Problems left behind by a transformation: stray relative imports or `@//` paths.
    pub fn check_transformation(&self, transformed: &str, source_path: &Path) -> Vec<String> {
        let double_slash = format!("{}/", self.config.alias);
        let mut issues = Vec::new();
        let specifiers = collect_specifiers(transformed, source_path);

        let remaining = specifiers.iter().filter(|s| is_relative(&s.value)).count();
        if remaining > 0 {
            issues.push(format!("{} relative imports were not transformed", remaining));
        }
        if specifiers.iter().any(|s| s.value.starts_with(&double_slash)) {
            issues.push(format!("found malformed {} imports", double_slash));
        }
        issues
    }
}
