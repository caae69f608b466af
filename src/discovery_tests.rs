#[cfg(test)]
mod tests {
    use crate::config::{FileRole, Layout};
    use crate::discovery::{discover_blocks, is_source_file, is_type_file, Scanner};
    use crate::error::RegistryError;
    use crate::test_support::{block, config_in, write};
    use std::collections::HashMap;

    #[test]
    fn test_source_file_filter() {
        assert!(is_source_file("index.tsx"));
        assert!(is_source_file("data.ts"));
        assert!(is_source_file("legacy.jsx"));
        assert!(!is_source_file("styles.css"));
        assert!(!is_source_file("env.d.ts"));
        assert!(!is_source_file("button.test.tsx"));
        assert!(!is_source_file("button.spec.ts"));
        assert!(!is_source_file("button.stories.tsx"));
    }

    #[test]
    fn test_type_file_convention() {
        assert!(is_type_file("types.ts"));
        assert!(is_type_file("nested/types.tsx"));
        assert!(is_type_file("sidebar.types.ts"));
        assert!(is_type_file("types/nav.ts"));
        assert!(!is_type_file("prototypes.ts"));
        assert!(!is_type_file("use-types-hook.ts"));
    }

    #[test]
    fn test_scan_directory_block_roles_and_targets() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("components");
        for file in [
            "dashboard/dashboard-01/index.tsx",
            "dashboard/dashboard-01/data.ts",
            "dashboard/dashboard-01/types.ts",
            "dashboard/dashboard-01/app/dashboard/page.tsx",
            "dashboard/dashboard-01/hooks/use-thing.ts",
            "dashboard/dashboard-01/lib/format.ts",
            "dashboard/dashboard-01/ui/chart.tsx",
            "dashboard/dashboard-01/parts/nav.tsx",
            "dashboard/dashboard-01/parts/nav.test.tsx",
            "dashboard/dashboard-01/parts/nav.stories.tsx",
            "dashboard/dashboard-01/global.d.ts",
            "dashboard/dashboard-01/README.md",
        ] {
            write(&root, file, "export {}\n");
        }

        let config = config_in(&dir, vec![block("dashboard-01", "dashboard", Layout::Directory)]);
        let scanner = Scanner::new(&config);
        let files = scanner.scan_block(&config.blocks[0]).unwrap();

        let by_relative: HashMap<&str, (FileRole, &str)> = files
            .iter()
            .map(|f| {
                (
                    f.source_relative_path.as_str(),
                    (f.role, f.target_path.as_str()),
                )
            })
            .collect();

        assert_eq!(files.len(), 8);
        assert_eq!(
            by_relative["dashboard/dashboard-01/index.tsx"],
            (FileRole::GenericComponent, "components/dashboard-01/index.tsx")
        );
        assert_eq!(
            by_relative["dashboard/dashboard-01/data.ts"],
            (FileRole::GenericComponent, "components/dashboard-01/data.ts")
        );
        assert_eq!(
            by_relative["dashboard/dashboard-01/types.ts"],
            (FileRole::TypeDefinition, "components/dashboard-01/types.ts")
        );
        assert_eq!(
            by_relative["dashboard/dashboard-01/app/dashboard/page.tsx"],
            (FileRole::Page, "app/dashboard/page.tsx")
        );
        assert_eq!(
            by_relative["dashboard/dashboard-01/hooks/use-thing.ts"],
            (FileRole::Hook, "hooks/dashboard-01/use-thing.ts")
        );
        assert_eq!(
            by_relative["dashboard/dashboard-01/lib/format.ts"],
            (FileRole::Library, "lib/dashboard-01/format.ts")
        );
        assert_eq!(
            by_relative["dashboard/dashboard-01/ui/chart.tsx"],
            (FileRole::UiPrimitive, "components/ui/chart.tsx")
        );
        assert_eq!(
            by_relative["dashboard/dashboard-01/parts/nav.tsx"],
            (FileRole::GenericComponent, "components/dashboard-01/parts/nav.tsx")
        );
        assert!(files.iter().all(|f| f.content.is_none()));
    }

    #[test]
    fn test_scan_order_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("components");
        for file in ["c/b/z.tsx", "c/b/a.tsx", "c/b/m/index.tsx"] {
            write(&root, file, "export {}\n");
        }
        let config = config_in(&dir, vec![block("b", "c", Layout::Directory)]);
        let scanner = Scanner::new(&config);
        let first: Vec<String> = scanner
            .scan_block(&config.blocks[0])
            .unwrap()
            .into_iter()
            .map(|f| f.target_path)
            .collect();
        let second: Vec<String> = scanner
            .scan_block(&config.blocks[0])
            .unwrap()
            .into_iter()
            .map(|f| f.target_path)
            .collect();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                "components/b/a.tsx",
                "components/b/m/index.tsx",
                "components/b/z.tsx"
            ]
        );
    }

    #[test]
    fn test_type_file_wins_over_special_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, vec![]);
        let scanner = Scanner::new(&config);
        assert_eq!(
            scanner.classify_directory_file("hooks/types.ts", "x"),
            (FileRole::TypeDefinition, "components/x/hooks/types.ts".to_string())
        );
    }

    #[test]
    fn test_single_file_block() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("components"), "login/login-01.tsx", "export {}\n");
        let config = config_in(&dir, vec![block("login-01", "login", Layout::SingleFile)]);
        let files = Scanner::new(&config).scan_block(&config.blocks[0]).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].role, FileRole::GenericComponent);
        assert_eq!(files[0].target_path, "components/login-01.tsx");
        assert_eq!(files[0].source_relative_path, "login/login-01.tsx");
    }

    #[test]
    fn test_missing_block_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, vec![block("ghost", "nowhere", Layout::Directory)]);
        let err = Scanner::new(&config).scan_block(&config.blocks[0]).unwrap_err();
        assert!(matches!(err, RegistryError::BlockNotFound { ref id, .. } if id == "ghost"));
    }

    #[test]
    fn test_discover_blocks_from_content_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("components");
        write(&root, "login/login-01.tsx", "export {}\n");
        write(&root, "login/index.ts", "export * from './login-01'\n");
        write(&root, "login/.draft.tsx", "export {}\n");
        write(&root, "sidebar/sidebar-01/index.tsx", "export {}\n");
        write(&root, ".hidden/x.tsx", "export {}\n");

        let blocks = discover_blocks(&root).unwrap();
        let summary: Vec<(&str, &str, Layout)> = blocks
            .iter()
            .map(|b| (b.category.as_str(), b.id.as_str(), b.layout))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("login", "login-01", Layout::SingleFile),
                ("sidebar", "sidebar-01", Layout::Directory),
            ]
        );
        assert_eq!(blocks[1].name, "Sidebar 01");
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_unreadable_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("components");
        write(&root, "cards/cards-01/index.tsx", "export {}\n");
        write(&root, "cards/cards-01/parts/item.tsx", "export {}\n");
        std::os::unix::fs::symlink(
            dir.path().join("nowhere.ts"),
            root.join("cards/cards-01/dangling.ts"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("nowhere-dir"),
            root.join("cards/cards-01/parts/gone"),
        )
        .unwrap();

        let config = config_in(&dir, vec![block("cards-01", "cards", Layout::Directory)]);
        let files = Scanner::new(&config).scan_block(&config.blocks[0]).unwrap();
        let targets: Vec<&str> = files.iter().map(|f| f.target_path.as_str()).collect();
        assert_eq!(
            targets,
            vec!["components/cards-01/index.tsx", "components/cards-01/parts/item.tsx"]
        );
    }
}
