#[cfg(test)]
mod tests {
    use crate::cache::{hash_schema, SchemaCache, SchemaCacheEntry};
    use crate::diagnostics::{format_json_path, Diagnostic, REG_SCHEMA_DRIFT, REG_SCHEMA_VIOLATION};
    use crate::schema::{
        check_drift, compile, load_pinned_hashes, pin_hashes, validate_document, CompiledSchemas,
        SchemaName,
    };
    use crate::suite::LoadedRegistry;
    use serde_json::{json, Value};
    use std::fs;

    const ITEM_URL: &str = "https://schemas.test/registry-item.json";
    const REGISTRY_URL: &str = "https://schemas.test/registry.json";

    fn item_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "required": ["name", "type", "files"],
            "properties": {
                "name": { "type": "string" },
                "type": { "enum": ["registry:component", "registry:block", "registry:ui"] },
                "files": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["path", "type"],
                        "additionalProperties": false,
                        "properties": {
                            "path": { "type": "string" },
                            "type": { "enum": ["registry:component", "registry:ui", "registry:file"] },
                            "target": { "type": "string" },
                            "content": { "type": "string" }
                        }
                    }
                }
            }
        })
    }

    fn registry_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "required": ["name", "homepage", "items"],
            "properties": {
                "name": { "type": "string" },
                "homepage": { "type": "string" },
                "items": { "type": "array", "items": { "$ref": ITEM_URL } }
            }
        })
    }

    fn find<'a>(diagnostics: &'a [Diagnostic], path: &str) -> &'a Diagnostic {
        diagnostics
            .iter()
            .find(|d| d.fields.iter().any(|(k, v)| k == "Path" && v == path))
            .unwrap_or_else(|| panic!("no diagnostic at {}: {:#?}", path, diagnostics))
    }

    #[test]
    fn test_format_json_path() {
        assert_eq!(format_json_path(""), "$");
        assert_eq!(format_json_path("/files/0/type"), "files[0].type");
        assert_eq!(format_json_path("/weird key/x"), "[\"weird key\"].x");
        assert_eq!(format_json_path("/a~1b"), "[\"a/b\"]");
        assert_eq!(format_json_path("/registryDependencies/2"), "registryDependencies[2]");
    }

    #[test]
    fn test_valid_document_has_no_diagnostics() {
        let validator = compile(SchemaName::Item, &item_schema(), None).unwrap();
        let doc = json!({
            "name": "login-01",
            "type": "registry:component",
            "files": [{ "path": "a.tsx", "type": "registry:component", "target": "components/a.tsx", "content": "" }]
        });
        assert!(validate_document(&validator, "login-01", &doc).is_empty());
    }

    #[test]
    fn test_violations_are_translated_per_keyword() {
        let validator = compile(SchemaName::Item, &item_schema(), None).unwrap();
        let doc = json!({
            "name": 42,
            "type": "registry:component",
            "files": [{ "path": "a.tsx", "type": "registry:bogus", "extra": true }]
        });
        let diagnostics = validate_document(&validator, "bad", &doc);
        assert!(diagnostics.iter().all(|d| d.code == REG_SCHEMA_VIOLATION));

        let name = find(&diagnostics, "name");
        assert_eq!(name.expected.as_deref(), Some("type string"));
        assert_eq!(name.received.as_deref(), Some("42"));
        assert_eq!(name.suggestion, "Update value to type string");

        let file_type = find(&diagnostics, "files[0].type");
        assert_eq!(file_type.received.as_deref(), Some("\"registry:bogus\""));
        assert_eq!(
            file_type.suggestion,
            "Update value to one of \"registry:component\", \"registry:ui\", \"registry:file\""
        );

        let extra = find(&diagnostics, "files[0]");
        assert_eq!(extra.suggestion, "Remove property \"extra\"");
    }

    #[test]
    fn test_missing_required_property() {
        let validator = compile(SchemaName::Item, &item_schema(), None).unwrap();
        let doc = json!({ "name": "x", "type": "registry:ui" });
        let diagnostics = validate_document(&validator, "x", &doc);
        assert_eq!(diagnostics.len(), 1);
        let missing = find(&diagnostics, "$");
        assert_eq!(missing.suggestion, "Add required property \"files\"");
        assert_eq!(missing.item, "x");
    }

    #[test]
    fn test_registry_schema_resolves_item_ref_locally() {
        let registry = SchemaCacheEntry::new("registry", REGISTRY_URL, registry_schema());
        let item = SchemaCacheEntry::new("item", ITEM_URL, item_schema());
        let compiled = CompiledSchemas::compile(&registry, &item).unwrap();

        let index = json!({
            "name": "blocks",
            "homepage": "https://blocks.test",
            "items": [{ "name": "a", "type": "registry:nope", "files": [] }]
        });
        let diagnostics = validate_document(&compiled.registry, "registry.json", &index);
        assert_eq!(diagnostics.len(), 1);
        find(&diagnostics, "items[0].type");
    }

    #[test]
    fn test_compiled_schemas_validate_loaded_registry() {
        let registry = SchemaCacheEntry::new("registry", REGISTRY_URL, registry_schema());
        let item = SchemaCacheEntry::new("item", ITEM_URL, item_schema());
        let compiled = CompiledSchemas::compile(&registry, &item).unwrap();

        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("registry.json"),
            r#"{"name":"blocks","homepage":"https://blocks.test","items":[{"name":"a","type":"registry:component","files":[]}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"name":"a","type":"registry:component","files":[{"path":"a.tsx"}]}"#,
        )
        .unwrap();

        let loaded = LoadedRegistry::load(dir.path());
        assert!(loaded.failures.is_empty());
        let diagnostics = compiled.validate(&loaded);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].item, "a");
        assert_eq!(diagnostics[0].suggestion, "Add required property \"type\"");
        assert_eq!(
            diagnostics[0].file.as_deref(),
            Some(dir.path().join("a.json").display().to_string().as_str())
        );
    }

    #[test]
    fn test_drift_detection() {
        let registry = SchemaCacheEntry::new("registry", REGISTRY_URL, registry_schema());
        let item = SchemaCacheEntry::new("item", ITEM_URL, item_schema());

        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("fixtures/schema-hashes.json");
        assert!(load_pinned_hashes(&fixture).unwrap().is_empty());

        let pinned = pin_hashes(&fixture, &[&registry, &item]).unwrap();
        assert_eq!(load_pinned_hashes(&fixture).unwrap(), pinned);
        assert!(check_drift(&pinned, &[&registry, &item]).is_empty());

        let changed = SchemaCacheEntry::new("item", ITEM_URL, json!({ "type": "object" }));
        let drift = check_drift(&pinned, &[&registry, &changed]);
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].code, REG_SCHEMA_DRIFT);
        assert_eq!(drift[0].expected.as_deref(), Some(item.hash.as_str()));
        assert_eq!(drift[0].received.as_deref(), Some(changed.hash.as_str()));

        let unpinned = check_drift(&Default::default(), &[&registry]);
        assert_eq!(unpinned[0].expected.as_deref(), Some("<missing>"));
    }

    #[test]
    fn test_hash_ignores_formatting() {
        let compact: Value = serde_json::from_str(r#"{"a":1,"b":[1,2]}"#).unwrap();
        let spaced: Value = serde_json::from_str("{\n  \"a\": 1,\n  \"b\": [1, 2]\n}").unwrap();
        assert_eq!(hash_schema(&compact), hash_schema(&spaced));
    }

    #[test]
    fn test_schema_cache_roundtrip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SchemaCache::new(dir.path().join("cache"));
        assert!(cache.get("item").is_none());

        let entry = SchemaCacheEntry::new("item", ITEM_URL, item_schema());
        cache.set(&entry).unwrap();
        let cached = cache.get("item").unwrap();
        assert_eq!(cached.hash, entry.hash);
        assert_eq!(cached.url, ITEM_URL);
        assert_eq!(cached.fetched_at, entry.fetched_at);

        let path = dir.path().join("cache/item.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(cache.get("item").is_none());
        assert!(!path.exists());
    }
}
