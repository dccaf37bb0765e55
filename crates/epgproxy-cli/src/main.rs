//! epgproxy - resilient XMLTV EPG proxy CLI.

/// Application configuration (TOML).
mod config;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use epgproxy_api::query::DATE_FORMAT;
use epgproxy_api::{
    DirEdgeCache, HttpFetcher, QueryOrchestrator, SourceCache, SourceSet, encode_gzip,
};
use epgproxy_xmltv::{AliasIndex, AliasTable, list_channels};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, resolve_config_path};

/// Orchestrator wired with the HTTP fetcher and the optional on-disk edge cache.
type Orchestrator = QueryOrchestrator<HttpFetcher, Option<DirEdgeCache>>;

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Primary XMLTV source URL (overrides config).
    #[arg(long, global = true)]
    primary: Option<String>,

    /// Backup XMLTV source URL (overrides config).
    #[arg(long, global = true)]
    backup: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Show the programmes of one channel on one date as JSON.
    Query(QueryArgs),
    /// Write the source document to a file as XML or gzip.
    Export(ExportArgs),
    /// List the channels declared by the source.
    Channels,
    /// Print the canonical key of a channel name (no network).
    Normalize(NormalizeArgs),
}

/// Arguments for the `query` subcommand.
#[derive(clap::Args)]
struct QueryArgs {
    /// Channel name as a user would type it (e.g. "CCTV-1", "湖南卫视").
    #[arg(long, required = true)]
    channel: String,

    /// Date as YYYY-MM-DD (default: today).
    #[arg(long)]
    date: Option<String>,
}

/// Output encoding of `export`.
#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    /// Plain XMLTV text.
    Xml,
    /// Gzip-compressed XMLTV.
    Gzip,
}

/// Arguments for the `export` subcommand.
#[derive(clap::Args)]
struct ExportArgs {
    /// Output encoding.
    #[arg(long, value_enum, default_value = "xml")]
    format: ExportFormat,

    /// Destination file.
    #[arg(long, required = true)]
    output: PathBuf,
}

/// Arguments for the `normalize` subcommand.
#[derive(clap::Args)]
struct NormalizeArgs {
    /// Channel name to normalize.
    name: String,
}

/// Loads the config file from `--dir` or the default location.
fn load_config(dir: Option<&PathBuf>) -> Result<(AppConfig, PathBuf)> {
    let path = resolve_config_path(dir)?;
    let config = AppConfig::load(&path)?;
    let base = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    tracing::debug!(path = %path.display(), "Loaded config");
    Ok((config, base))
}

/// Resolves a config path relative to the config file's directory.
fn relative_to(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Builds the alias index: built-in table, then the user table if set.
fn build_aliases(config: &AppConfig, base: &Path) -> Result<AliasIndex> {
    let mut table = AliasTable::builtin()?;
    if let Some(ref path) = config.aliases.path {
        let path = relative_to(base, path);
        let extra = AliasTable::load(&path)?;
        tracing::debug!(
            path = %path.display(),
            entries = extra.entries.len(),
            "Loaded user alias table"
        );
        table.extend(extra);
    }
    Ok(AliasIndex::new(&table))
}

/// Picks source URLs from the command line, falling back to the config.
fn resolve_sources(cli: &Cli, config: &AppConfig) -> Result<SourceSet> {
    let Some(primary) = cli
        .primary
        .clone()
        .or_else(|| config.source.primary.clone())
    else {
        bail!("no primary source configured: pass --primary or set [source] primary in config.toml");
    };
    let backup = cli.backup.clone().or_else(|| config.source.backup.clone());
    Ok(SourceSet::new(primary, backup))
}

/// Builds the orchestrator with its fetcher, cache and alias index.
fn build_orchestrator(config: &AppConfig, base: &Path) -> Result<Orchestrator> {
    let cache_config = config.cache.to_source_cache_config()?;
    let fetcher = HttpFetcher::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .context("failed to build HTTP fetcher")?;
    let edge = config
        .cache
        .edge_dir
        .as_deref()
        .map(|dir| DirEdgeCache::new(relative_to(base, dir)));

    let cache = SourceCache::with_edge(fetcher, edge, cache_config);
    let aliases = build_aliases(config, base)?;
    Ok(QueryOrchestrator::new(Arc::new(cache), Arc::new(aliases)))
}

/// Parses `--date`, defaulting to today in local time.
fn parse_date(raw: Option<&str>) -> Result<NaiveDate> {
    raw.map_or_else(
        || Ok(chrono::Local::now().date_naive()),
        |s| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD"))
        },
    )
}

/// Runs the `query` subcommand.
///
/// Prints the 200 or 404 response body; both exit successfully.
///
/// # Errors
///
/// Returns an error if the date or configuration is invalid.
#[instrument(skip_all)]
async fn run_query(cli: &Cli, args: &QueryArgs) -> Result<()> {
    let date = parse_date(args.date.as_deref())?;
    let (config, base) = load_config(cli.dir.as_ref())?;
    let sources = resolve_sources(cli, &config)?;
    let orchestrator = build_orchestrator(&config, &base)?;

    let outcome = orchestrator.query(&sources, &args.channel, date).await;
    tracing::info!(code = outcome.code(), "Query finished");

    let body = serde_json::to_string_pretty(&outcome).context("failed to serialize response")?;
    writeln!(std::io::stdout().lock(), "{body}").context("failed to write response")?;
    Ok(())
}

/// Runs the `export` subcommand.
///
/// # Errors
///
/// Returns an error if no source document is available or the file cannot
/// be written.
#[instrument(skip_all)]
async fn run_export(cli: &Cli, args: &ExportArgs) -> Result<()> {
    let (config, base) = load_config(cli.dir.as_ref())?;
    let sources = resolve_sources(cli, &config)?;
    let orchestrator = build_orchestrator(&config, &base)?;

    let served = orchestrator.document(&sources).await?;
    let bytes = match args.format {
        ExportFormat::Xml => served.text.as_bytes().to_vec(),
        ExportFormat::Gzip => encode_gzip(&served.text).await?,
    };
    tokio::fs::write(&args.output, &bytes)
        .await
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    tracing::info!(
        source = %served.url,
        stale = served.stale,
        bytes = bytes.len(),
        output = %args.output.display(),
        "Exported source document"
    );
    Ok(())
}

/// Runs the `channels` subcommand.
///
/// # Errors
///
/// Returns an error if no source document is available.
#[instrument(skip_all)]
async fn run_channels(cli: &Cli) -> Result<()> {
    let (config, base) = load_config(cli.dir.as_ref())?;
    let sources = resolve_sources(cli, &config)?;
    let orchestrator = build_orchestrator(&config, &base)?;

    let served = orchestrator.document(&sources).await?;
    let channels = list_channels(&served.text);

    let mut out = std::io::stdout().lock();
    for channel in &channels {
        writeln!(
            out,
            "{}\t{}\t{}",
            channel.id, channel.display_name, channel.icon_url
        )
        .context("failed to write channel list")?;
    }
    tracing::info!(source = %served.url, "Total: {} channels", channels.len());
    Ok(())
}

/// Runs the `normalize` subcommand.
///
/// # Errors
///
/// Returns an error if the config or alias table cannot be loaded.
fn run_normalize(cli: &Cli, args: &NormalizeArgs) -> Result<()> {
    let (config, base) = load_config(cli.dir.as_ref())?;
    let aliases = build_aliases(&config, &base)?;
    writeln!(std::io::stdout().lock(), "{}", aliases.normalize(&args.name))
        .context("failed to write key")?;
    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Query(ref args) => run_query(&cli, args).await,
        Commands::Export(ref args) => run_export(&cli, args).await,
        Commands::Channels => run_channels(&cli).await,
        Commands::Normalize(ref args) => run_normalize(&cli, args),
    }
}
