//! Registry CLI
//!
//! Usage:
//!   registry-native build [--discover]
//!   registry-native validate [--install] [--skip-schema] [--json]
//!   registry-native install [--json]
//!   registry-native pin-schemas

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use registry_native::config::DEFAULT_CONFIG_FILE;
use registry_native::discovery::discover_blocks;
use registry_native::{run_build, run_suite, RegistryConfig, Report, Result, SuiteOptions};

#[derive(Parser)]
#[command(name = "registry-native")]
#[command(about = "Build and validate a component registry")]
struct Cli {
    /// Config file (default: registry.config.json if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Overrides {
    /// Output directory for registry documents
    #[arg(long)]
    out: Option<PathBuf>,

    /// Root of the component sources
    #[arg(long)]
    components: Option<PathBuf>,
}

#[derive(Args)]
struct ReportArgs {
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scan, transform, and emit every block
    Build {
        #[command(flatten)]
        overrides: Overrides,

        /// Infer blocks from <components>/<category>/<entry> when none are configured
        #[arg(long)]
        discover: bool,
    },
    /// Validate the emitted registry
    Validate {
        #[command(flatten)]
        overrides: Overrides,

        #[command(flatten)]
        report: ReportArgs,

        /// Also run the installation simulation
        #[arg(long)]
        install: bool,

        /// Skip fetching and validating against the upstream schemas
        #[arg(long)]
        skip_schema: bool,
    },
    /// Install representative items into a throwaway project and type-check it
    Install {
        #[command(flatten)]
        overrides: Overrides,

        #[command(flatten)]
        report: ReportArgs,
    },
    /// Fetch the upstream schemas and rewrite the pinned hash fixture
    PinSchemas,
}

fn load_config(path: Option<&Path>, overrides: Option<&Overrides>) -> Result<RegistryConfig> {
    let mut config = match path {
        Some(path) => RegistryConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            RegistryConfig::load(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => {
            tracing::warn!("no {} found; using defaults", DEFAULT_CONFIG_FILE);
            RegistryConfig::default()
        }
    };
    if let Some(overrides) = overrides {
        if let Some(out) = &overrides.out {
            config.output_dir = out.clone();
        }
        if let Some(components) = &overrides.components {
            config.components_dir = components.clone();
        }
    }
    Ok(config)
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    if !report.diagnostics.is_empty() {
        println!("{}", report.render());
        println!();
    }
    println!(
        "{} error(s), {} warning(s)",
        report.errors().count(),
        report.warnings().count()
    );
    Ok(())
}

fn exit_code(report: &Report) -> ExitCode {
    if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Build {
            overrides,
            discover,
        } => {
            let mut config = load_config(config_path, Some(&overrides))?;
            if discover && config.blocks.is_empty() {
                config.blocks = discover_blocks(&config.components_dir)?;
                tracing::info!(blocks = config.blocks.len(), "discovered blocks");
                config.check()?;
            }
            let output = tokio::task::block_in_place(|| run_build(&config))?;
            println!(
                "{} item(s) built, {} written, {} unchanged ({} cached transforms, {} hits)",
                output.blocks.len(),
                output.summary.written,
                output.summary.unchanged,
                output.cache.entries,
                output.cache.hits
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate {
            overrides,
            report,
            install,
            skip_schema,
        } => {
            let config = Arc::new(load_config(config_path, Some(&overrides))?);
            let options = SuiteOptions {
                schema: !skip_schema,
                static_checks: true,
                install,
            };
            let result = run_suite(config, options).await;
            print_report(&result, report.json)?;
            Ok(exit_code(&result))
        }
        Command::Install { overrides, report } => {
            let config = Arc::new(load_config(config_path, Some(&overrides))?);
            let options = SuiteOptions {
                schema: false,
                static_checks: false,
                install: true,
            };
            let result = run_suite(config, options).await;
            print_report(&result, report.json)?;
            Ok(exit_code(&result))
        }
        Command::PinSchemas => {
            let config = load_config(config_path, None)?;
            let pinned = registry_native::schema::pin_schemas(&config).await?;
            for (name, hash) in pinned {
                println!("{}: {}", name, hash);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
