//! Import Analyzer
//!
//! Parses TS/TSX sources with oxc and classifies every module specifier that
//! appears in an `import` declaration or an `export ... from` re-export.
//!
//! Classification priority:
//! 1. `./` or `../` prefix → relative
//! 2. project alias prefix (`@/`) → internal; `components/ui/<name>` also records a UI primitive
//! 3. built-in module (exact name or prefix) → ignored
//! 4. anything else → external package, keyed by package root

use oxc_allocator::Allocator;
use oxc_ast::ast::{ExportAllDeclaration, ExportNamedDeclaration, ImportDeclaration, StringLiteral};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::RegistryConfig;

/// A module specifier located in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpecifier {
    pub value: String,
    /// Byte range of the specifier text, quotes excluded.
    pub start: usize,
    pub end: usize,
    /// 1-based line of the specifier.
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    Relative,
    Internal { ui_primitive: Option<String> },
    Builtin,
    External(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportAnalysis {
    pub all_imports: Vec<String>,
    pub relative_imports: BTreeSet<String>,
    pub internal_alias_imports: BTreeSet<String>,
    pub ui_primitive_imports: BTreeSet<String>,
    pub external_packages: BTreeSet<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPECIFIER COLLECTION
// ═══════════════════════════════════════════════════════════════════════════════

struct SpecifierCollector<'s> {
    source: &'s str,
    found: Vec<ModuleSpecifier>,
}

impl SpecifierCollector<'_> {
    fn record(&mut self, literal: &StringLiteral) {
        let value = literal.value.as_str();
        if value.is_empty() {
            return;
        }
        // The literal span includes its quotes.
        let start = literal.span.start as usize + 1;
        let end = (literal.span.end as usize).saturating_sub(1);
        if start > end || end > self.source.len() {
            return;
        }
        self.found.push(ModuleSpecifier {
            value: value.to_string(),
            start,
            end,
            line: line_of(self.source, start),
        });
    }
}

impl<'a> Visit<'a> for SpecifierCollector<'_> {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        self.record(&decl.source);
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &decl.source {
            self.record(source);
        }
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        self.record(&decl.source);
    }
}

pub fn line_of(source: &str, offset: usize) -> u32 {
    let offset = offset.min(source.len());
    source.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count() as u32
        + 1
}

fn source_type_for(path: &Path) -> SourceType {
    SourceType::from_path(path).unwrap_or_else(|_| {
        SourceType::default()
            .with_module(true)
            .with_typescript(true)
            .with_jsx(true)
    })
}

/// Collect module specifiers in source order.
pub fn collect_specifiers(content: &str, path: &Path) -> Vec<ModuleSpecifier> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, content, source_type_for(path)).parse();
    if ret.panicked {
        tracing::warn!(path = %path.display(), "parser gave up; no imports collected");
        return Vec::new();
    }
    if !ret.errors.is_empty() {
        tracing::debug!(
            path = %path.display(),
            errors = ret.errors.len(),
            "recovered from syntax errors while collecting imports"
        );
    }

    let mut collector = SpecifierCollector {
        source: content,
        found: Vec::new(),
    };
    collector.visit_program(&ret.program);
    collector.found
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// `@scope/name/sub` → `@scope/name`, `pkg/sub` → `pkg`.
pub fn package_name(specifier: &str) -> String {
    let mut parts = specifier.split('/');
    let first = parts.next().unwrap_or_default();
    if first.starts_with('@') {
        if let Some(name) = parts.next().filter(|s| !s.is_empty()) {
            return format!("{}/{}", first, name);
        }
    }
    first.to_string()
}

/// `@/components/ui/button` → `button`.
pub fn ui_primitive_name(specifier: &str, config: &RegistryConfig) -> Option<String> {
    let rest = specifier.strip_prefix(config.ui_prefix().as_str())?;
    rest.split('/')
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.to_string())
}

pub fn classify(specifier: &str, config: &RegistryConfig) -> ImportKind {
    if is_relative(specifier) {
        return ImportKind::Relative;
    }
    if specifier.starts_with(config.alias.as_str()) {
        return ImportKind::Internal {
            ui_primitive: ui_primitive_name(specifier, config),
        };
    }
    if config.is_builtin(specifier) {
        return ImportKind::Builtin;
    }
    ImportKind::External(package_name(specifier))
}

pub fn analyze_specifiers(specifiers: &[ModuleSpecifier], config: &RegistryConfig) -> ImportAnalysis {
    let mut analysis = ImportAnalysis::default();
    for spec in specifiers {
        analysis.all_imports.push(spec.value.clone());
        match classify(&spec.value, config) {
            ImportKind::Relative => {
                analysis.relative_imports.insert(spec.value.clone());
            }
            ImportKind::Internal { ui_primitive } => {
                analysis.internal_alias_imports.insert(spec.value.clone());
                if let Some(name) = ui_primitive {
                    analysis.ui_primitive_imports.insert(name);
                }
            }
            ImportKind::Builtin => {}
            ImportKind::External(name) => {
                analysis.external_packages.insert(name);
            }
        }
    }
    analysis
}

/// Parse `content` and return its categorized imports.
pub fn analyze_imports(content: &str, path: &Path, config: &RegistryConfig) -> ImportAnalysis {
    analyze_specifiers(&collect_specifiers(content, path), config)
}
