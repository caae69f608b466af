#[cfg(test)]
mod tests {
    use crate::cache::{compute_hash, TransformCache, TransformKey};
    use crate::config::{FileRole, Layout, RegistryConfig};
    use crate::discovery::Scanner;
    use crate::test_support::{block, config_in, write};
    use crate::transform::{ImportTransformer, TargetMap};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transformed_by_target(dir: &tempfile::TempDir, id: &str) -> Vec<(String, String)> {
        let config = config_in(dir, vec![block(id, "cat", Layout::Directory)]);
        let cache = TransformCache::new();
        let transformer = ImportTransformer::new(&config, &cache);
        let files = Scanner::new(&config).scan_block(&config.blocks[0]).unwrap();
        let targets = TargetMap::from_descriptors(&files);
        files
            .iter()
            .map(|f| {
                (
                    f.target_path.clone(),
                    transformer.transform_file(f, Some(id), &targets).unwrap(),
                )
            })
            .collect()
    }

    fn content_of<'a>(files: &'a [(String, String)], target: &str) -> &'a str {
        &files.iter().find(|(t, _)| t == target).unwrap().1
    }

    #[test]
    fn test_rewrites_sibling_import_to_namespaced_alias() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("components");
        write(
            &root,
            "cat/block-01/index.tsx",
            "import { items } from \"./data\"\nexport function Block() { return items }\n",
        );
        write(&root, "cat/block-01/data.ts", "export const items = []\n");

        let files = transformed_by_target(&dir, "block-01");
        assert_eq!(
            content_of(&files, "components/block-01/index.tsx"),
            "import { items } from \"@/components/block-01/data\"\nexport function Block() { return items }\n"
        );
    }

    #[test]
    fn test_rewrites_through_special_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("components");
        write(
            &root,
            "cat/block-02/index.tsx",
            "import { useThing } from './hooks/use-thing'\nimport { fmt } from './lib/format'\nimport { Chart } from './ui/chart'\n",
        );
        write(
            &root,
            "cat/block-02/hooks/use-thing.ts",
            "import { fmt } from '../lib/format'\nexport const useThing = () => fmt\n",
        );
        write(&root, "cat/block-02/lib/format.ts", "export const fmt = 1\n");
        write(&root, "cat/block-02/ui/chart.tsx", "export const Chart = 1\n");

        let files = transformed_by_target(&dir, "block-02");
        let index = content_of(&files, "components/block-02/index.tsx");
        assert!(index.contains("'@/hooks/block-02/use-thing'"));
        assert!(index.contains("'@/lib/block-02/format'"));
        assert!(index.contains("'@/components/ui/chart'"));

        let hook = content_of(&files, "hooks/block-02/use-thing.ts");
        assert!(hook.contains("'@/lib/block-02/format'"));
    }

    #[test]
    fn test_directory_import_resolves_to_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("components");
        write(&root, "cat/block-03/index.tsx", "export * from './parts'\nexport * from './parts/index'\n");
        write(&root, "cat/block-03/parts/index.tsx", "export const a = 1\n");

        let files = transformed_by_target(&dir, "block-03");
        let index = content_of(&files, "components/block-03/index.tsx");
        assert!(index.contains("'@/components/block-03/parts'"));
        assert!(index.contains("'@/components/block-03/parts/index'"));
    }

    #[test]
    fn test_unresolved_import_falls_back_to_role_base() {
        let config = RegistryConfig::default();
        let cache = TransformCache::new();
        let transformer = ImportTransformer::new(&config, &cache);
        let out = transformer.transform_content(
            "import { x } from '../../shared/x'\n",
            Path::new("/src/cat/blk/hooks/use-x.ts"),
            FileRole::Hook,
            Some("blk"),
            None,
        );
        assert_eq!(out, "import { x } from '@/hooks/blk/shared/x'\n");

        let out = transformer.transform_content(
            "import { y } from './y'\n",
            Path::new("/src/login/login-01.tsx"),
            FileRole::GenericComponent,
            None,
            None,
        );
        assert_eq!(out, "import { y } from '@/components/y'\n");
    }

    #[test]
    fn test_preserves_formatting_and_non_relative_imports() {
        let config = RegistryConfig::default();
        let cache = TransformCache::new();
        let transformer = ImportTransformer::new(&config, &cache);
        let src = "// header comment\nimport   React from \"react\"   // keep\nimport {\n  a,\n  b,\n} from \"./ab\"\n\nexport const z = 1\n";
        let out = transformer.transform_content(src, Path::new("/x/blk/index.tsx"), FileRole::GenericComponent, Some("blk"), None);
        assert_eq!(
            out,
            "// header comment\nimport   React from \"react\"   // keep\nimport {\n  a,\n  b,\n} from \"@/components/blk/ab\"\n\nexport const z = 1\n"
        );
        assert!(transformer
            .check_transformation(&out, Path::new("/x/blk/index.tsx"))
            .is_empty());
    }

    #[test]
    fn test_check_transformation_flags_leftovers() {
        let config = RegistryConfig::default();
        let cache = TransformCache::new();
        let transformer = ImportTransformer::new(&config, &cache);
        let issues = transformer.check_transformation(
            "import a from './a'\nimport b from '@//b'\n",
            Path::new("x.ts"),
        );
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_base_paths() {
        let config = RegistryConfig::default();
        let cache = TransformCache::new();
        let transformer = ImportTransformer::new(&config, &cache);
        assert_eq!(transformer.base_path(FileRole::GenericComponent, Some("b")), "@/components/b");
        assert_eq!(transformer.base_path(FileRole::Library, Some("b")), "@/lib/b");
        assert_eq!(transformer.base_path(FileRole::Hook, Some("b")), "@/hooks/b");
        assert_eq!(transformer.base_path(FileRole::GenericComponent, None), "@/components");
        assert_eq!(transformer.base_path(FileRole::Hook, None), "@/hooks");
    }

    #[test]
    fn test_cache_computes_each_key_once() {
        let cache = TransformCache::new();
        let calls = AtomicUsize::new(0);
        let key = TransformKey {
            path: PathBuf::from("/a.tsx"),
            role: FileRole::GenericComponent,
            block_id: "a".to_string(),
        };

        for _ in 0..3 {
            let value = cache.get_or_insert_with(key.clone(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Some("done".to_string())
            });
            assert_eq!(value.as_deref(), Some("done"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 2, 1));

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_cache_is_keyed_by_namespace() {
        let cache = TransformCache::new();
        let key = |block: &str| TransformKey {
            path: PathBuf::from("/shared.tsx"),
            role: FileRole::GenericComponent,
            block_id: block.to_string(),
        };
        cache.get_or_insert_with(key("a"), || Some("a".to_string()));
        let b = cache.get_or_insert_with(key("b"), || Some("b".to_string()));
        assert_eq!(b.as_deref(), Some("b"));
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_cache_dedupes_concurrent_requests() {
        let cache = TransformCache::new();
        let calls = AtomicUsize::new(0);
        let key = TransformKey {
            path: PathBuf::from("/c.tsx"),
            role: FileRole::Page,
            block_id: String::new(),
        };
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    cache.get_or_insert_with(key.clone(), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        Some("x".to_string())
                    })
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_compute_hash_is_hex_sha256() {
        let hash = compute_hash("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
