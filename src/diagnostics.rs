//! Validation diagnostics.
//!
//! Every check reports into a [`Report`] instead of failing fast, so one run
//! surfaces the complete set of problems. Each diagnostic carries a stable
//! code, the offending item/file/line, and a suggested fix.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const REG_SCHEMA_VIOLATION: &str = "REG-SCHEMA-001";
pub const REG_SCHEMA_DRIFT: &str = "REG-SCHEMA-002";
pub const REG_IMPORT_RELATIVE: &str = "REG-IMPORT-001";
pub const REG_IMPORT_NO_TARGET: &str = "REG-IMPORT-002";
pub const REG_IMPORT_INTERNAL: &str = "REG-IMPORT-003";
pub const REG_IMPORT_SHARED: &str = "REG-IMPORT-004";
pub const REG_DEP_MISSING_REGISTRY: &str = "REG-DEP-001";
pub const REG_DEP_UNUSED_REGISTRY: &str = "REG-DEP-002";
pub const REG_DEP_MISSING_PACKAGE: &str = "REG-DEP-003";
pub const REG_DEP_UNKNOWN_UI: &str = "REG-DEP-004";
pub const REG_STRUCT_MISSING_ITEM: &str = "REG-STRUCT-001";
pub const REG_STRUCT_NO_ENTRY: &str = "REG-STRUCT-002";
pub const REG_STRUCT_TYPE_FILE: &str = "REG-STRUCT-003";
pub const REG_STRUCT_NO_CONTENT: &str = "REG-STRUCT-004";
pub const REG_STRUCT_DUPLICATE_TARGET: &str = "REG-STRUCT-005";
pub const REG_STRUCT_EMPTY: &str = "REG-STRUCT-006";
pub const REG_STRUCT_MISSING_DOCUMENT: &str = "REG-STRUCT-007";
pub const REG_STRUCT_UNLISTED_DOCUMENT: &str = "REG-STRUCT-008";
pub const REG_INSTALL_FAILED: &str = "REG-INSTALL-001";
pub const REG_INSTALL_TIMEOUT: &str = "REG-INSTALL-002";
pub const REG_INSTALL_MISSING_FILES: &str = "REG-INSTALL-003";
pub const REG_TYPECHECK_FAILED: &str = "REG-INSTALL-004";
pub const REG_INFRA: &str = "REG-INFRA-001";

fn get_title(code: &str) -> &'static str {
    match code {
        REG_SCHEMA_VIOLATION => "Schema Validation Failed",
        REG_SCHEMA_DRIFT => "Schema Hash Mismatch",
        REG_IMPORT_RELATIVE | REG_IMPORT_NO_TARGET => "Relative Imports Unresolved",
        REG_IMPORT_INTERNAL => "Import Resolution Failed",
        REG_IMPORT_SHARED => "Undeclared Shared Import",
        REG_DEP_MISSING_REGISTRY => "Missing Registry Dependencies",
        REG_DEP_UNUSED_REGISTRY => "Unused Registry Dependencies",
        REG_DEP_MISSING_PACKAGE => "Missing External Dependencies",
        REG_DEP_UNKNOWN_UI => "Unknown UI Import",
        REG_STRUCT_MISSING_ITEM => "Missing Registry Item",
        REG_STRUCT_NO_ENTRY => "Missing Directory Entry Point",
        REG_STRUCT_TYPE_FILE => "Type File Mismatch",
        REG_STRUCT_NO_CONTENT => "Missing File Content",
        REG_STRUCT_DUPLICATE_TARGET => "Duplicate File Target",
        REG_STRUCT_EMPTY => "Empty Registry Item",
        REG_INSTALL_FAILED => "Installation Failed",
        REG_INSTALL_TIMEOUT => "Installation Timed Out",
        REG_INSTALL_MISSING_FILES => "Missing Installed Files",
        REG_TYPECHECK_FAILED => "TypeScript Check Failed",
        REG_INFRA => "Infrastructure Failure",
        _ => "Registry Problem",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Check {
    Schema,
    ImportResolution,
    Dependencies,
    Structure,
    Installation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub check: Check,
    pub item: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub message: Option<String>,
    /// Labelled detail lines, rendered in order (`Import: ...`, `stdout: ...`).
    pub fields: Vec<(String, String)>,
    pub expected: Option<String>,
    pub received: Option<String>,
    pub diff: Option<String>,
    pub suggestion: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &str, check: Check, item: &str) -> Self {
        Self {
            code: code.to_string(),
            severity,
            check,
            item: item.to_string(),
            file: None,
            line: None,
            message: None,
            fields: Vec::new(),
            expected: None,
            received: None,
            diff: None,
            suggestion: String::new(),
        }
    }

    pub fn error(code: &str, check: Check, item: &str) -> Self {
        Self::new(Severity::Error, code, check, item)
    }

    pub fn warning(code: &str, check: Check, item: &str) -> Self {
        Self::new(Severity::Warning, code, check, item)
    }

    pub fn with_file(mut self, file: &str, line: Option<u32>) -> Self {
        self.file = Some(file.to_string());
        self.line = line;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_field(mut self, label: &str, value: impl Into<String>) -> Self {
        self.fields.push((label.to_string(), value.into()));
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_received(mut self, received: impl Into<String>) -> Self {
        self.received = Some(received.into());
        self
    }

    pub fn with_diff(mut self, diff: String) -> Self {
        self.diff = Some(diff);
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn title(&self) -> &'static str {
        get_title(&self.code)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} [{}]", self.title(), self.item, self.code)?;
        if let Some(file) = &self.file {
            match self.line {
                Some(line) => writeln!(f, "  File: {}:{}", file, line)?,
                None => writeln!(f, "  File: {}", file)?,
            }
        }
        if let Some(message) = &self.message {
            writeln!(f, "  Message: {}", message)?;
        }
        for (label, value) in &self.fields {
            writeln!(f, "  {}: {}", label, value)?;
        }
        if let Some(expected) = &self.expected {
            writeln!(f, "  Expected: {}", expected)?;
        }
        if let Some(received) = &self.received {
            writeln!(f, "  Received: {}", received)?;
        }
        if let Some(diff) = &self.diff {
            writeln!(f)?;
            writeln!(f, "{}", diff)?;
        }
        writeln!(f)?;
        write!(f, "  Suggested Fix: {}", self.suggestion)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn merge(&mut self, other: Report) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn for_check(&self, check: Check) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.check == check)
    }

    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }

    /// Stable ordering: by check, then item, then file, then line.
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            (a.check as u8, &a.item, &a.file, a.line).cmp(&(b.check as u8, &b.item, &b.file, b.line))
        });
    }

    pub fn render(&self) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FORMATTING HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref SAFE_KEY: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$-]*$").unwrap();
    static ref INDEX_KEY: Regex = Regex::new(r"^\d+$").unwrap();
}

/// JSON pointer → `files[0].type`; the document root is `$`.
pub fn format_json_path(pointer: &str) -> String {
    let mut path = String::new();
    for raw in pointer.split('/').filter(|p| !p.is_empty()) {
        let part = raw.replace("~1", "/").replace("~0", "~");
        if INDEX_KEY.is_match(&part) {
            path.push_str(&format!("[{}]", part));
        } else if SAFE_KEY.is_match(&part) {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(&part);
        } else {
            path.push_str(&format!("[\"{}\"]", part));
        }
    }
    if path.is_empty() {
        "$".to_string()
    } else {
        path
    }
}

pub fn json_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| format!("{:?}", values))
}

pub fn format_array_diff(label: &str, received: &[String], expected: &[String]) -> String {
    [
        "Diff:".to_string(),
        format!("  - {}: {}", label, json_string_list(received)),
        format!("  + {}: {}", label, json_string_list(expected)),
    ]
    .join("\n")
}

pub fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(", ")
}
