//! Fixture helpers shared by the test modules.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::config::{Block, Layout, RegistryConfig};
use crate::manifest::{RegistryFile, RegistryItem};

pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub fn block(id: &str, category: &str, layout: Layout) -> Block {
    Block {
        id: id.to_string(),
        category: category.to_string(),
        name: id.to_string(),
        layout,
    }
}

/// Config rooted in `dir`: sources under `components/`, output under `out/`.
pub fn config_in(dir: &TempDir, blocks: Vec<Block>) -> RegistryConfig {
    RegistryConfig {
        components_dir: dir.path().join("components"),
        output_dir: dir.path().join("out"),
        schema_cache_dir: dir.path().join("cache"),
        schema_hashes_fixture: dir.path().join("schema-hashes.json"),
        blocks,
        ..RegistryConfig::default()
    }
}

pub fn file(path: &str, file_type: &str, target: &str, content: &str) -> RegistryFile {
    RegistryFile {
        path: path.to_string(),
        file_type: file_type.to_string(),
        target: Some(target.to_string()),
        content: Some(content.to_string()),
    }
}

pub fn item(name: &str, item_type: &str, files: Vec<RegistryFile>) -> RegistryItem {
    RegistryItem {
        name: name.to_string(),
        item_type: item_type.to_string(),
        files,
        ..RegistryItem::default()
    }
}
