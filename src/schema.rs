//! Schema validation.
//!
//! The registry and item schemas are owned upstream. Each run fetches them,
//! records them in the [`SchemaCache`], compares their hashes against a
//! pinned fixture, and validates every emitted document.

use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::{Resource, ValidationError, Validator};
use rayon::prelude::*;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cache::{SchemaCache, SchemaCacheEntry};
use crate::config::{RegistryConfig, SchemaUrls};
use crate::diagnostics::{
    format_json_path, Check, Diagnostic, REG_INFRA, REG_SCHEMA_DRIFT, REG_SCHEMA_VIOLATION,
};
use crate::error::{RegistryError, Result};
use crate::suite::LoadedRegistry;

const USER_AGENT: &str = "blocks-registry-tests";
const MISSING_HASH: &str = "<missing>";
const RECEIVED_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaName {
    Registry,
    Item,
}

impl SchemaName {
    pub const ALL: [SchemaName; 2] = [SchemaName::Registry, SchemaName::Item];

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaName::Registry => "registry",
            SchemaName::Item => "item",
        }
    }

    pub fn url(self, urls: &SchemaUrls) -> &str {
        match self {
            SchemaName::Registry => &urls.registry,
            SchemaName::Item => &urls.item,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FETCH
// ═══════════════════════════════════════════════════════════════════════════════

pub struct SchemaFetcher {
    client: Client,
    urls: SchemaUrls,
    cache: SchemaCache,
}

impl SchemaFetcher {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|source| RegistryError::Http {
                url: config.schema_urls.registry.clone(),
                source,
            })?;
        Ok(Self {
            client,
            urls: config.schema_urls.clone(),
            cache: SchemaCache::new(&config.schema_cache_dir),
        })
    }

    async fn download(&self, url: &str) -> std::result::Result<Value, reqwest::Error> {
        self.client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }

    /// Fetch one schema, record it in the cache, and fall back to the cached
    /// copy when the network is unavailable.
    pub async fn fetch(&self, name: SchemaName) -> Result<SchemaCacheEntry> {
        let url = name.url(&self.urls);
        match self.download(url).await {
            Ok(schema) => {
                let entry = SchemaCacheEntry::new(name.as_str(), url, schema);
                if let Err(e) = self.cache.set(&entry) {
                    tracing::warn!(schema = name.as_str(), error = %e, "failed to write schema cache");
                }
                tracing::debug!(schema = name.as_str(), hash = %entry.hash, "fetched schema");
                Ok(entry)
            }
            Err(source) => match self.cache.get(name.as_str()) {
                Some(entry) if entry.url == url => {
                    tracing::warn!(
                        schema = name.as_str(),
                        error = %source,
                        fetched_at = %entry.fetched_at,
                        "schema fetch failed; using cached copy"
                    );
                    Ok(entry)
                }
                _ => Err(RegistryError::Http {
                    url: url.to_string(),
                    source,
                }),
            },
        }
    }

    pub async fn fetch_all(&self) -> Result<(SchemaCacheEntry, SchemaCacheEntry)> {
        tokio::try_join!(self.fetch(SchemaName::Registry), self.fetch(SchemaName::Item))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DRIFT
// ═══════════════════════════════════════════════════════════════════════════════

pub type PinnedHashes = BTreeMap<String, String>;

/// A missing fixture reads as empty, so every schema reports drift.
pub fn load_pinned_hashes(path: &Path) -> Result<PinnedHashes> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PinnedHashes::new()),
        Err(e) => return Err(RegistryError::io(path, e)),
    };
    serde_json::from_str(&data).map_err(|e| RegistryError::json(path, e))
}

pub fn pin_hashes(path: &Path, entries: &[&SchemaCacheEntry]) -> Result<PinnedHashes> {
    let pinned: PinnedHashes = entries
        .iter()
        .map(|e| (e.name.clone(), e.hash.clone()))
        .collect();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
    }
    let mut data = serde_json::to_string_pretty(&pinned)?;
    data.push('\n');
    fs::write(path, data).map_err(|e| RegistryError::io(path, e))?;
    tracing::info!(fixture = %path.display(), "pinned schema hashes");
    Ok(pinned)
}

pub fn check_drift(pinned: &PinnedHashes, entries: &[&SchemaCacheEntry]) -> Vec<Diagnostic> {
    entries
        .iter()
        .filter_map(|entry| {
            let expected = pinned
                .get(&entry.name)
                .map(String::as_str)
                .unwrap_or(MISSING_HASH);
            (expected != entry.hash).then(|| {
                Diagnostic::error(REG_SCHEMA_DRIFT, Check::Schema, &entry.name)
                    .with_field("Source", entry.url.clone())
                    .with_expected(expected)
                    .with_received(entry.hash.clone())
                    .suggest(
                        "Review the upstream schema change, then run `registry-native pin-schemas`",
                    )
            })
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

fn schema_error(name: SchemaName, message: impl ToString) -> RegistryError {
    RegistryError::Schema {
        name: name.as_str().to_string(),
        message: message.to_string(),
    }
}

/// Compile `schema`, registering `resource` (uri, document) so `$ref`s to it
/// resolve without a network round-trip.
pub fn compile(name: SchemaName, schema: &Value, resource: Option<(&str, &Value)>) -> Result<Validator> {
    let built = match resource {
        Some((uri, document)) => {
            let resource = Resource::from_contents(document.clone()).map_err(|e| schema_error(name, e))?;
            jsonschema::options().with_resource(uri, resource).build(schema)
        }
        None => jsonschema::options().build(schema),
    };
    built.map_err(|e| schema_error(name, e))
}

fn type_label(kind: &TypeKind) -> String {
    match kind {
        TypeKind::Single(primitive) => primitive.to_string(),
        TypeKind::Multiple(_) => "one of the allowed types".to_string(),
    }
}

fn truncate(value: String) -> String {
    if value.chars().count() <= RECEIVED_LIMIT {
        return value;
    }
    let cut: String = value.chars().take(RECEIVED_LIMIT).collect();
    format!("{}…", cut)
}

/// Expected value and suggested fix for the violated keyword.
fn explain(kind: &ValidationErrorKind) -> (Option<String>, String) {
    match kind {
        ValidationErrorKind::Type { kind } => {
            let label = type_label(kind);
            (Some(format!("type {}", label)), format!("Update value to type {}", label))
        }
        ValidationErrorKind::Enum { options } => {
            let allowed = match options {
                Value::Array(values) => values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                other => other.to_string(),
            };
            (
                Some(format!("one of {}", allowed)),
                format!("Update value to one of {}", allowed),
            )
        }
        ValidationErrorKind::Required { property } => {
            let property = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            (
                Some(format!("property \"{}\"", property)),
                format!("Add required property \"{}\"", property),
            )
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            let names = unexpected
                .iter()
                .map(|p| format!("\"{}\"", p))
                .collect::<Vec<_>>()
                .join(", ");
            (
                Some("no additional properties".to_string()),
                format!("Remove property {}", names),
            )
        }
        _ => (None, "Align value with schema".to_string()),
    }
}

fn to_diagnostic(document_name: &str, document: &Value, error: &ValidationError<'_>) -> Diagnostic {
    let pointer = error.instance_path.to_string();
    let (expected, suggestion) = explain(&error.kind);
    let received = document
        .pointer(&pointer)
        .map(|v| truncate(v.to_string()))
        .unwrap_or_else(|| "undefined".to_string());

    let mut diagnostic = Diagnostic::error(REG_SCHEMA_VIOLATION, Check::Schema, document_name)
        .with_field("Path", format_json_path(&pointer))
        .with_message(error.to_string())
        .with_received(received)
        .suggest(suggestion);
    if let Some(expected) = expected {
        diagnostic = diagnostic.with_expected(expected);
    }
    diagnostic
}

/// One diagnostic per violation; an empty result means the document is valid.
pub fn validate_document(validator: &Validator, document_name: &str, document: &Value) -> Vec<Diagnostic> {
    validator
        .iter_errors(document)
        .map(|error| to_diagnostic(document_name, document, &error))
        .collect()
}

pub struct CompiledSchemas {
    pub registry: Validator,
    pub item: Validator,
}

impl CompiledSchemas {
    pub fn compile(registry: &SchemaCacheEntry, item: &SchemaCacheEntry) -> Result<Self> {
        Ok(Self {
            registry: compile(
                SchemaName::Registry,
                &registry.schema,
                Some((item.url.as_str(), &item.schema)),
            )?,
            item: compile(SchemaName::Item, &item.schema, None)?,
        })
    }

    pub fn validate(&self, registry: &LoadedRegistry) -> Vec<Diagnostic> {
        let in_file = |path: &Path, diagnostics: Vec<Diagnostic>| {
            let file = path.display().to_string();
            diagnostics
                .into_iter()
                .map(|d| d.with_file(&file, None))
                .collect::<Vec<_>>()
        };

        let mut diagnostics = match &registry.index_raw {
            Some(index) => in_file(
                &registry.output_dir.join(crate::config::INDEX_FILE),
                validate_document(&self.registry, crate::config::INDEX_FILE, index),
            ),
            None => Vec::new(),
        };
        diagnostics.extend(
            registry
                .items
                .par_iter()
                .flat_map_iter(|loaded| {
                    in_file(
                        &loaded.document_path,
                        validate_document(&self.item, &loaded.item.name, &loaded.raw),
                    )
                })
                .collect::<Vec<_>>(),
        );
        diagnostics
    }
}

fn infra(item: &str, error: &RegistryError, suggestion: &str) -> Diagnostic {
    Diagnostic::error(REG_INFRA, Check::Schema, item)
        .with_message(error.to_string())
        .suggest(suggestion)
}

/// Fetch, drift-check, and validate. Infrastructure failures become diagnostics.
pub async fn check(config: &RegistryConfig, registry: &LoadedRegistry) -> Vec<Diagnostic> {
    let fetched = match SchemaFetcher::new(config) {
        Ok(fetcher) => fetcher.fetch_all().await,
        Err(e) => Err(e),
    };
    let (registry_schema, item_schema) = match fetched {
        Ok(entries) => entries,
        Err(e) => {
            return vec![infra(
                "schemas",
                &e,
                "Check network access to the schema host, or seed the schema cache",
            )]
        }
    };

    let mut diagnostics = match load_pinned_hashes(&config.schema_hashes_fixture) {
        Ok(pinned) => check_drift(&pinned, &[&registry_schema, &item_schema]),
        Err(e) => vec![infra(
            "schemas",
            &e,
            "Fix the pinned hash fixture, or regenerate it with `registry-native pin-schemas`",
        )],
    };

    match CompiledSchemas::compile(&registry_schema, &item_schema) {
        Ok(compiled) => diagnostics.extend(compiled.validate(registry)),
        Err(e) => diagnostics.push(infra(
            "schemas",
            &e,
            "Inspect the upstream schema; it no longer compiles as JSON Schema",
        )),
    }
    diagnostics
}

/// Fetch both schemas and rewrite the pinned hash fixture.
pub async fn pin_schemas(config: &RegistryConfig) -> Result<PinnedHashes> {
    let fetcher = SchemaFetcher::new(config)?;
    let (registry, item) = fetcher.fetch_all().await?;
    pin_hashes(&config.schema_hashes_fixture, &[&registry, &item])
}
