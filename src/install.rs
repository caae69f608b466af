//! Installation simulation.
//!
//! Builds a throwaway consumer project, serves the emitted registry over
//! loopback HTTP, installs a representative sample of items with the real
//! installer client, and type-checks the result. The project directory and
//! the server are both torn down on drop, whatever the outcome.

use axum::Router;
use serde_json::json;
use std::collections::BTreeSet;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use crate::config::{CommandSpec, Layout, RegistryConfig};
use crate::diagnostics::{
    json_string_list, Check, Diagnostic, REG_INFRA, REG_INSTALL_FAILED, REG_INSTALL_MISSING_FILES,
    REG_INSTALL_TIMEOUT, REG_TYPECHECK_FAILED,
};
use crate::error::{RegistryError, Result};
use crate::manifest::RegistryItem;
use crate::suite::LoadedRegistry;

/// Captured output is trimmed to its tail in diagnostics.
const OUTPUT_TAIL: usize = 4000;

const DEFAULT_UTILS: &str = r#"import { clsx, type ClassValue } from "clsx"
import { twMerge } from "tailwind-merge"

export function cn(...inputs: ClassValue[]) {
  return twMerge(clsx(inputs))
}
"#;

const PAGE_STUB: &str = "export default function Page() {\n  return <main />\n}\n";

const GLOBALS_CSS: &str = "@tailwind base;\n@tailwind components;\n@tailwind utilities;\n";

const NEXT_CONFIG: &str = "/** @type {import('next').NextConfig} */\nmodule.exports = {}\n";

const TAILWIND_CONFIG: &str = r#"import type { Config } from "tailwindcss"

export default {
  content: ["./app/**/*.{ts,tsx}", "./components/**/*.{ts,tsx}"],
} satisfies Config
"#;

// ═══════════════════════════════════════════════════════════════════════════════
// MOCK PROJECT
// ═══════════════════════════════════════════════════════════════════════════════

pub struct MockProject {
    dir: TempDir,
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| RegistryError::io(path, e))
}

fn pretty(value: &serde_json::Value) -> Result<String> {
    let mut data = serde_json::to_string_pretty(value)?;
    data.push('\n');
    Ok(data)
}

fn default_package_json() -> serde_json::Value {
    json!({
        "name": "registry-install-check",
        "version": "0.0.0",
        "private": true,
        "dependencies": {
            "clsx": "^2.1.1",
            "next": "^15.0.0",
            "react": "^19.0.0",
            "react-dom": "^19.0.0",
            "tailwind-merge": "^2.5.0"
        },
        "devDependencies": {
            "@types/node": "^22.0.0",
            "@types/react": "^19.0.0",
            "@types/react-dom": "^19.0.0",
            "tailwindcss": "^3.4.0",
            "typescript": "^5.6.0"
        }
    })
}

impl MockProject {
    pub fn create(config: &RegistryConfig) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("registry-install-")
            .tempdir()
            .map_err(|e| RegistryError::io(std::env::temp_dir(), e))?;
        let root = dir.path();
        let alias = config.alias.trim_end_matches('/');

        let package_json = match &config.install.package_json {
            Some(fixture) => fs::read_to_string(fixture).map_err(|e| RegistryError::io(fixture, e))?,
            None => pretty(&default_package_json())?,
        };
        write_file(&root.join("package.json"), &package_json)?;

        let components_json = json!({
            "$schema": "https://ui.shadcn.com/schema.json",
            "style": "new-york",
            "rsc": true,
            "tsx": true,
            "tailwind": {
                "config": "tailwind.config.ts",
                "css": "app/globals.css",
                "baseColor": "neutral",
                "cssVariables": true,
                "prefix": ""
            },
            "aliases": {
                "components": format!("{}/components", alias),
                "utils": format!("{}/lib/utils", alias),
                "ui": format!("{}/components/ui", alias),
                "lib": format!("{}/lib", alias),
                "hooks": format!("{}/hooks", alias)
            },
            "iconLibrary": "lucide"
        });
        write_file(&root.join("components.json"), &pretty(&components_json)?)?;

        let tsconfig = json!({
            "compilerOptions": {
                "target": "ES2017",
                "lib": ["dom", "dom.iterable", "esnext"],
                "allowJs": true,
                "skipLibCheck": true,
                "strict": true,
                "noEmit": true,
                "esModuleInterop": true,
                "module": "esnext",
                "moduleResolution": "bundler",
                "resolveJsonModule": true,
                "isolatedModules": true,
                "jsx": "preserve",
                "incremental": false,
                "paths": { format!("{}/*", alias): ["./*"] }
            },
            "include": ["**/*.ts", "**/*.tsx"],
            "exclude": ["node_modules"]
        });
        write_file(&root.join("tsconfig.json"), &pretty(&tsconfig)?)?;

        write_file(&root.join("next.config.js"), NEXT_CONFIG)?;
        write_file(&root.join("tailwind.config.ts"), TAILWIND_CONFIG)?;
        write_file(&root.join("app/page.tsx"), PAGE_STUB)?;
        write_file(&root.join("app/globals.css"), GLOBALS_CSS)?;

        let ui_dir = root.join("components/ui");
        fs::create_dir_all(&ui_dir).map_err(|e| RegistryError::io(&ui_dir, e))?;

        let utils = match config.install.utils_source.as_deref().filter(|p| p.is_file()) {
            Some(source) => fs::read_to_string(source).map_err(|e| RegistryError::io(source, e))?,
            None => DEFAULT_UTILS.to_string(),
        };
        write_file(&root.join("lib/utils.ts"), &utils)?;

        tracing::debug!(project = %root.display(), "created mock project");
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Symlink an existing `node_modules` into the project so the type-check sees real typings.
    pub fn link_node_modules(&self, source: &Path) -> Result<()> {
        let source = source
            .canonicalize()
            .map_err(|e| RegistryError::io(source, e))?;
        let link = self.root().join("node_modules");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&source, &link).map_err(|e| RegistryError::io(&link, e))?;
        #[cfg(windows)]
        std::os::windows::fs::symlink_dir(&source, &link).map_err(|e| RegistryError::io(&link, e))?;
        Ok(())
    }

    /// Targets of `item` that did not materialize on disk.
    pub fn missing_targets(&self, item: &RegistryItem) -> Vec<String> {
        item.targets()
            .into_iter()
            .filter(|target| !self.root().join(target).is_file())
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY SERVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Serves `<dir>/*.json` under `/r/` on an ephemeral loopback port.
pub struct RegistryServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RegistryServer {
    pub async fn start(dir: &Path) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| RegistryError::Server(format!("bind failed: {}", e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| RegistryError::Server(e.to_string()))?;

        let app = Router::new().nest_service("/r", ServeDir::new(dir));
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    rx.await.ok();
                })
                .await;
            if let Err(e) = served {
                tracing::warn!(error = %e, "registry server stopped with an error");
            }
        });

        tracing::info!(%addr, dir = %dir.display(), "serving registry");
        Ok(Self {
            addr,
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/r", self.addr)
    }

    pub fn item_url(&self, name: &str) -> String {
        format!("{}/{}.json", self.base_url(), name)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
    }
}

impl Drop for RegistryServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBPROCESSES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed(CommandOutput),
    /// Killed at the deadline; carries whatever output was captured before.
    TimedOut(CommandOutput),
}

/// Grace period for draining pipes once a timed-out child is killed.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

type Captured = Arc<Mutex<Vec<u8>>>;

/// Copy `reader` into a shared buffer until EOF, so partial output survives a kill.
fn capture<R>(reader: Option<R>) -> (Captured, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buffer);
    let handle = tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
            }
        }
    });
    (buffer, handle)
}

async fn snapshot(buffer: &Captured) -> String {
    String::from_utf8_lossy(&buffer.lock().await).to_string()
}

/// Run `spec` in `cwd`; the child is killed if it outlives `timeout`.
pub async fn run_command(
    spec: &CommandSpec,
    vars: &[(&str, &str)],
    cwd: &Path,
    timeout: Duration,
) -> Result<CommandOutcome> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(spec.render_args(vars))
        .current_dir(cwd)
        .env("CI", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(command = %spec.display(vars), cwd = %cwd.display(), "spawning");
    let mut child = cmd.spawn().map_err(|source| RegistryError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    let (stdout, mut stdout_task) = capture(child.stdout.take());
    let (stderr, mut stderr_task) = capture(child.stderr.take());

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            (&mut stdout_task).await.ok();
            (&mut stderr_task).await.ok();
            Ok(CommandOutcome::Completed(CommandOutput {
                code: status.code(),
                stdout: snapshot(&stdout).await,
                stderr: snapshot(&stderr).await,
            }))
        }
        Ok(Err(source)) => Err(RegistryError::Spawn {
            program: spec.program.clone(),
            source,
        }),
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::warn!(program = %spec.program, error = %e, "failed to kill timed-out process");
            }
            // Descendants may still hold the pipes open.
            tokio::time::timeout(DRAIN_GRACE, async {
                (&mut stdout_task).await.ok();
                (&mut stderr_task).await.ok();
            })
            .await
            .ok();
            stdout_task.abort();
            stderr_task.abort();
            Ok(CommandOutcome::TimedOut(CommandOutput {
                code: None,
                stdout: snapshot(&stdout).await,
                stderr: snapshot(&stderr).await,
            }))
        }
    }
}

fn tail(text: &str) -> String {
    let count = text.chars().count();
    if count <= OUTPUT_TAIL {
        return text.trim_end().to_string();
    }
    let tail: String = text.chars().skip(count - OUTPUT_TAIL).collect();
    format!("…{}", tail.trim_end())
}

fn failure(code: &str, item: &str, command: &str, output: &CommandOutput, suggestion: &str) -> Diagnostic {
    Diagnostic::error(code, Check::Installation, item)
        .with_field("Command", command)
        .with_field(
            "Exit Code",
            output
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "terminated by signal".to_string()),
        )
        .with_field("stdout", tail(&output.stdout))
        .with_field("stderr", tail(&output.stderr))
        .suggest(suggestion)
}

fn timed_out(code: &str, item: &str, command: &str, output: &CommandOutput, timeout: Duration) -> Diagnostic {
    Diagnostic::error(code, Check::Installation, item)
        .with_field("Command", command)
        .with_field("stdout", tail(&output.stdout))
        .with_field("stderr", tail(&output.stderr))
        .with_message(format!("no exit after {}s; process killed", timeout.as_secs()))
        .suggest("Check the command for interactive prompts, or raise install.timeoutSecs")
}

fn infra(item: &str, error: &RegistryError) -> Diagnostic {
    Diagnostic::error(REG_INFRA, Check::Installation, item)
        .with_message(error.to_string())
        .suggest("Check that the installer and type-checker are available on PATH")
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Layout of an emitted item; unconfigured items are inferred from their targets.
fn item_layout(item: &RegistryItem, config: &RegistryConfig) -> Layout {
    if let Some(block) = config.block(&item.name) {
        return block.layout;
    }
    let targets = item.targets();
    match targets.as_slice() {
        [only] if only.matches('/').count() == 1 && only.starts_with("components/") => {
            Layout::SingleFile
        }
        _ => Layout::Directory,
    }
}

/// Configured ids, or else the first item of each (layout, item type) pair.
pub fn select_representatives<'r>(
    config: &RegistryConfig,
    registry: &'r LoadedRegistry,
) -> Vec<&'r RegistryItem> {
    if !config.install.representative.is_empty() {
        return config
            .install
            .representative
            .iter()
            .filter_map(|id| {
                let item = registry.item(id);
                if item.is_none() {
                    tracing::warn!(item = %id, "representative item not found in emitted registry");
                }
                item
            })
            .collect();
    }

    let mut seen = BTreeSet::new();
    registry
        .registry_items()
        .filter(|item| !item.files.is_empty())
        .filter(|item| seen.insert((item_layout(item, config), item.item_type.clone())))
        .collect()
}

async fn install_item(
    config: &RegistryConfig,
    project: &MockProject,
    server: &RegistryServer,
    item: &RegistryItem,
    timeout: Duration,
) -> Option<Diagnostic> {
    let url = server.item_url(&item.name);
    let project_dir = project.root().display().to_string();
    let vars = [("url", url.as_str()), ("project", project_dir.as_str())];
    let installer = &config.install.installer;
    let command = installer.display(&vars);

    tracing::info!(item = %item.name, %url, "installing");
    match run_command(installer, &vars, project.root(), timeout).await {
        Err(e) => Some(infra(&item.name, &e)),
        Ok(CommandOutcome::TimedOut(output)) => Some(timed_out(
            REG_INSTALL_TIMEOUT,
            &item.name,
            &command,
            &output,
            timeout,
        )),
        Ok(CommandOutcome::Completed(output)) if !output.success() => Some(failure(
            REG_INSTALL_FAILED,
            &item.name,
            &command,
            &output,
            "Run the command above against the served registry to reproduce",
        )),
        Ok(CommandOutcome::Completed(_)) => {
            let missing = project.missing_targets(item);
            (!missing.is_empty()).then(|| {
                Diagnostic::error(REG_INSTALL_MISSING_FILES, Check::Installation, &item.name)
                    .with_field("Command", command)
                    .with_field("Missing", json_string_list(&missing))
                    .with_field("Targets", json_string_list(&item.targets()))
                    .suggest("Check each file's target; the installer wrote them elsewhere or skipped them")
            })
        }
    }
}

async fn typecheck(config: &RegistryConfig, project: &MockProject, timeout: Duration) -> Option<Diagnostic> {
    if let Some(node_modules) = &config.install.node_modules {
        if node_modules.is_dir() {
            if let Err(e) = project.link_node_modules(node_modules) {
                tracing::warn!(error = %e, "failed to link node_modules");
            }
        } else {
            tracing::warn!(path = %node_modules.display(), "node_modules not found; type-check may fail");
        }
    }

    let project_dir = project.root().display().to_string();
    let vars = [("project", project_dir.as_str())];
    let spec = &config.install.typecheck;
    let command = spec.display(&vars);
    tracing::info!(%command, "type-checking installed project");

    match run_command(spec, &vars, project.root(), timeout).await {
        Err(e) => Some(infra(&config.registry_name, &e)),
        Ok(CommandOutcome::TimedOut(output)) => Some(timed_out(
            REG_TYPECHECK_FAILED,
            &config.registry_name,
            &command,
            &output,
            timeout,
        )),
        Ok(CommandOutcome::Completed(output)) if !output.success() => Some(failure(
            REG_TYPECHECK_FAILED,
            &config.registry_name,
            &command,
            &output,
            "Fix the type errors above in the block sources and rebuild",
        )),
        Ok(CommandOutcome::Completed(_)) => None,
    }
}

/// Install the representative items one at a time into a fresh project, then type-check it.
pub async fn simulate(config: &RegistryConfig, registry: &LoadedRegistry) -> Vec<Diagnostic> {
    let representatives = select_representatives(config, registry);
    if representatives.is_empty() {
        tracing::warn!("no items to install; skipping installation simulation");
        return Vec::new();
    }

    let project = match MockProject::create(config) {
        Ok(project) => project,
        Err(e) => return vec![infra(&config.registry_name, &e)],
    };
    let server = match RegistryServer::start(&registry.output_dir).await {
        Ok(server) => server,
        Err(e) => return vec![infra(&config.registry_name, &e)],
    };
    let timeout = Duration::from_secs(config.install.timeout_secs);

    let mut diagnostics = Vec::new();
    for item in &representatives {
        diagnostics.extend(install_item(config, &project, &server, item, timeout).await);
    }
    server.stop().await;

    diagnostics.extend(typecheck(config, &project, timeout).await);
    tracing::info!(
        installed = representatives.len(),
        problems = diagnostics.len(),
        "installation simulation finished"
    );
    diagnostics
}
