//! Build pipeline: scan → transform → build → emit.
//!
//! Blocks and the files inside them are independent, so both levels run on
//! the rayon pool. Content problems are logged and never abort the run.

use rayon::prelude::*;

use crate::cache::{CacheStats, TransformCache};
use crate::config::{Block, Layout, RegistryConfig};
use crate::discovery::{FileDescriptor, Scanner};
use crate::emit::{EmitSummary, RegistryEmitter};
use crate::error::Result;
use crate::manifest::{ManifestBuilder, RegistryIndex, RegistryItem};
use crate::transform::{ImportTransformer, TargetMap};

#[derive(Debug, Clone)]
pub struct BlockBuild {
    pub block: Block,
    pub files: Vec<FileDescriptor>,
    pub item: RegistryItem,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub blocks: Vec<BlockBuild>,
    pub index: RegistryIndex,
    pub summary: EmitSummary,
    pub cache: CacheStats,
}

impl BuildOutput {
    pub fn items(&self) -> impl Iterator<Item = &RegistryItem> {
        self.blocks.iter().map(|b| &b.item)
    }
}

pub fn scan_and_transform(
    block: &Block,
    scanner: &Scanner<'_>,
    transformer: &ImportTransformer<'_>,
) -> Vec<FileDescriptor> {
    let mut files = match scanner.scan_block(block) {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(block = %block.id, error = %e, "block source missing; emitting empty item");
            return Vec::new();
        }
    };

    let targets = TargetMap::from_descriptors(&files);
    let namespace = (block.layout == Layout::Directory).then_some(block.id.as_str());
    files.par_iter_mut().for_each(|file| {
        file.content = transformer.transform_file(file, namespace, &targets);
    });
    files
}

/// Build every configured block without writing anything.
pub fn build_blocks(config: &RegistryConfig, cache: &TransformCache) -> Vec<BlockBuild> {
    let scanner = Scanner::new(config);
    let transformer = ImportTransformer::new(config, cache);
    let builder = ManifestBuilder::new(config);

    config
        .blocks
        .par_iter()
        .map(|block| {
            let files = scan_and_transform(block, &scanner, &transformer);
            let item = builder.build(block, &files);
            tracing::debug!(
                block = %block.id,
                files = files.len(),
                dependencies = item.dependencies.len(),
                registry_dependencies = item.registry_dependencies.len(),
                "built registry item"
            );
            BlockBuild {
                block: block.clone(),
                files,
                item,
            }
        })
        .collect()
}

pub fn run_build(config: &RegistryConfig) -> Result<BuildOutput> {
    tracing::info!(
        blocks = config.blocks.len(),
        components = %config.components_dir.display(),
        "building registry"
    );
    let cache = TransformCache::new();
    let blocks = build_blocks(config, &cache);

    let items: Vec<RegistryItem> = blocks.iter().map(|b| b.item.clone()).collect();
    let index = ManifestBuilder::new(config).index(&items);
    let summary = RegistryEmitter::new(config).emit(&items, &index)?;

    Ok(BuildOutput {
        blocks,
        index,
        summary,
        cache: cache.stats(),
    })
}
