//! Registry Emitter
//!
//! Writes one document per item, then the aggregate index. Serialization is
//! deterministic, and files whose bytes would not change are left untouched.
//! Documents left over from items that are no longer built are removed.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{RegistryConfig, INDEX_FILE};
use crate::error::{RegistryError, Result};
use crate::manifest::{RegistryIndex, RegistryItem};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub written: usize,
    pub unchanged: usize,
    /// Stale item documents deleted from the output directory.
    pub removed: usize,
    pub index_path: PathBuf,
}

pub fn render_document<T: Serialize>(document: &T) -> Result<String> {
    let mut data = serde_json::to_string_pretty(document)?;
    data.push('\n');
    Ok(data)
}

/// Returns `true` if the file was (re)written.
fn write_if_changed(path: &Path, data: &str) -> Result<bool> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == data {
            return Ok(false);
        }
    }
    fs::write(path, data).map_err(|e| RegistryError::io(path, e))?;
    Ok(true)
}

/// Delete `*.json` documents in `out` that belong to none of `keep`.
fn remove_stale(out: &Path, keep: &BTreeSet<&str>) -> Result<usize> {
    let entries = fs::read_dir(out).map_err(|e| RegistryError::io(out, e))?;
    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_document = path.is_file()
            && path.extension().map(|ext| ext == "json").unwrap_or(false)
            && path.file_name().map(|n| n != INDEX_FILE).unwrap_or(false);
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string());
        match stem {
            Some(stem) if is_document && !keep.contains(stem.as_str()) => {
                fs::remove_file(&path).map_err(|e| RegistryError::io(&path, e))?;
                tracing::info!(path = %path.display(), "removed stale document");
                removed += 1;
            }
            _ => {}
        }
    }
    Ok(removed)
}

pub struct RegistryEmitter<'c> {
    config: &'c RegistryConfig,
}

impl<'c> RegistryEmitter<'c> {
    pub fn new(config: &'c RegistryConfig) -> Self {
        Self { config }
    }

    pub fn emit(&self, items: &[RegistryItem], index: &RegistryIndex) -> Result<EmitSummary> {
        let out = &self.config.output_dir;
        fs::create_dir_all(out).map_err(|e| RegistryError::io(out, e))?;

        // The index summarizes the items, so it is only written once they all are.
        let results = items
            .par_iter()
            .map(|item| {
                let path = self.config.item_path(&item.name);
                write_if_changed(&path, &render_document(item)?)
            })
            .collect::<Result<Vec<bool>>>()?;

        let index_path = self.config.index_path();
        let index_written = write_if_changed(&index_path, &render_document(index)?)?;

        let keep: BTreeSet<&str> = items.iter().map(|item| item.name.as_str()).collect();
        let removed = remove_stale(out, &keep)?;

        let written = results.iter().filter(|w| **w).count() + usize::from(index_written);
        let unchanged = results.len() + 1 - written;
        tracing::info!(
            out = %out.display(),
            items = items.len(),
            written,
            unchanged,
            removed,
            "registry emitted"
        );

        Ok(EmitSummary {
            written,
            unchanged,
            removed,
            index_path,
        })
    }
}
