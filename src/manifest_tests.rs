#[cfg(test)]
mod tests {
    use crate::config::{FileRole, Layout};
    use crate::discovery::FileDescriptor;
    use crate::emit::{render_document, RegistryEmitter};
    use crate::manifest::{classify_item, ItemType, ManifestBuilder, RegistryItem};
    use crate::test_support::{block, config_in, item};
    use std::path::PathBuf;

    fn descriptor(relative: &str, target: &str, role: FileRole, content: &str) -> FileDescriptor {
        FileDescriptor {
            source_path: PathBuf::from("/src").join(relative),
            source_relative_path: relative.to_string(),
            target_path: target.to_string(),
            role,
            content: Some(content.to_string()),
        }
    }

    #[test]
    fn test_classify_item() {
        use FileRole::*;
        assert_eq!(classify_item(Layout::SingleFile, &[GenericComponent]), ItemType::Component);
        assert_eq!(classify_item(Layout::Directory, &[GenericComponent, Page]), ItemType::Block);
        assert_eq!(classify_item(Layout::SingleFile, &[Page]), ItemType::Page);
        assert_eq!(classify_item(Layout::Directory, &[Hook, Hook, GenericComponent]), ItemType::Hook);
        assert_eq!(classify_item(Layout::Directory, &[Library, Hook]), ItemType::Lib);
        assert_eq!(classify_item(Layout::Directory, &[]), ItemType::Component);
    }

    #[test]
    fn test_build_unions_dependencies_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, vec![]);
        let blk = block("sidebar-01", "sidebar", Layout::Directory);
        let files = vec![
            descriptor(
                "sidebar/sidebar-01/index.tsx",
                "components/sidebar-01/index.tsx",
                FileRole::GenericComponent,
                "import { ChevronRight } from 'lucide-react'\nimport { Button } from '@/components/ui/button'\nimport { items } from '@/components/sidebar-01/data'\n",
            ),
            descriptor(
                "sidebar/sidebar-01/hooks/use-open.ts",
                "hooks/sidebar-01/use-open.ts",
                FileRole::Hook,
                "import { useState } from 'react'\nimport { Slot } from '@radix-ui/react-slot/dist'\nimport { Sheet } from '@/components/ui/sheet'\nimport { Button } from '@/components/ui/button'\n",
            ),
            FileDescriptor {
                content: None,
                ..descriptor("sidebar/sidebar-01/data.ts", "components/sidebar-01/data.ts", FileRole::GenericComponent, "")
            },
        ];

        let built = ManifestBuilder::new(&config).build(&blk, &files);
        assert_eq!(built.name, "sidebar-01");
        assert_eq!(built.item_type, "registry:component");
        assert_eq!(built.dependencies, vec!["@radix-ui/react-slot", "lucide-react"]);
        assert_eq!(built.registry_dependencies, vec!["button", "sheet"]);
        assert_eq!(built.categories, vec!["sidebar"]);
        assert_eq!(built.files.len(), 3);
        assert_eq!(built.files[1].file_type, "registry:hook");
        assert_eq!(built.files[1].target.as_deref(), Some("hooks/sidebar-01/use-open.ts"));
        assert!(built.files[1].path.ends_with("components/sidebar/sidebar-01/hooks/use-open.ts"));
        assert!(built.files[2].content.is_none());
    }

    #[test]
    fn test_item_json_shape() {
        let built = RegistryItem {
            schema: Some("https://ui.shadcn.com/schema/registry-item.json".to_string()),
            title: Some("Login".to_string()),
            ..item("login-01", "registry:component", vec![])
        };
        let value = serde_json::to_value(&built).unwrap();
        assert_eq!(value["$schema"], "https://ui.shadcn.com/schema/registry-item.json");
        assert_eq!(value["type"], "registry:component");
        assert!(value["registryDependencies"].is_array());
        assert!(value["devDependencies"].is_array());
        assert!(value.get("description").is_none());
        assert!(value.get("categories").is_none());
    }

    #[test]
    fn test_index_is_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, vec![]);
        let items = vec![
            item("zeta", "registry:component", vec![]),
            item("alpha", "registry:block", vec![]),
        ];
        let index = ManifestBuilder::new(&config).index(&items);
        let names: Vec<&str> = index.items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(index.items[0].item_type, "registry:block");
        assert_eq!(index.name, config.registry_name);
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = item("x", "registry:component", vec![]);
        let first = render_document(&a).unwrap();
        let second = render_document(&a.clone()).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with("}\n"));
    }

    #[test]
    fn test_emitter_skips_unchanged_documents() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, vec![]);
        let items = vec![
            item("a", "registry:component", vec![]),
            item("b", "registry:component", vec![]),
        ];
        let index = ManifestBuilder::new(&config).index(&items);
        let emitter = RegistryEmitter::new(&config);

        let first = emitter.emit(&items, &index).unwrap();
        assert_eq!((first.written, first.unchanged), (3, 0));
        assert!(config.item_path("a").is_file());
        assert!(first.index_path.is_file());

        let second = emitter.emit(&items, &index).unwrap();
        assert_eq!((second.written, second.unchanged), (0, 3));
    }

    #[test]
    fn test_emitter_removes_documents_of_dropped_items() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, vec![]);
        let builder = ManifestBuilder::new(&config);
        let emitter = RegistryEmitter::new(&config);

        let both = vec![
            item("a", "registry:component", vec![]),
            item("b", "registry:component", vec![]),
        ];
        emitter.emit(&both, &builder.index(&both)).unwrap();
        std::fs::write(config.output_dir.join("notes.txt"), "keep me").unwrap();

        let only_a = vec![item("a", "registry:component", vec![])];
        let summary = emitter.emit(&only_a, &builder.index(&only_a)).unwrap();
        assert_eq!(summary.removed, 1);
        assert!(config.item_path("a").is_file());
        assert!(!config.item_path("b").exists());
        assert!(config.index_path().is_file());
        assert!(config.output_dir.join("notes.txt").is_file());
    }
}
