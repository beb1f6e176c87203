//! iterdns
//!
//! Iterative DNS resolver research tool.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use iterdns::{log_config, resolver_config, QueryFile, QueryLog, QueryReplay};
use iterdns_cache::hints::install_root_hints;
use iterdns_cache::RrCache;
use iterdns_config::Config;
use iterdns_metrics::init_tracing;
use iterdns_resolver::{QueryDriver, Resolver, Shutdown};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Iterative DNS resolver and cache analysis tool
#[derive(Parser, Debug)]
#[command(name = "iterdns")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level: a level name, or a numeric verbosity (0 info, 1-4 debug, 5+ trace)
    #[arg(short = 'd', long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve every question of a query file, starting from the root hints
    Resolve {
        /// Query file (`<count>/<class>/<type>/<name>` per line)
        query_file: PathBuf,

        /// Use IPv4 transport only
        #[arg(short = '4', long, conflicts_with = "ipv6_only")]
        ipv4_only: bool,

        /// Use IPv6 transport only
        #[arg(short = '6', long)]
        ipv6_only: bool,

        /// Dump the resulting cache in text format
        #[arg(short = 'f', long, value_name = "FILE")]
        dump_file: Option<PathBuf>,

        /// Dump the resulting cache in binary format
        #[arg(short = 's', long = "serialize", value_name = "FILE")]
        serialize_file: Option<PathBuf>,

        /// Write response statistics
        #[arg(short = 'S', long, value_name = "FILE")]
        stats_file: Option<PathBuf>,

        /// Maximum number of queries in flight
        #[arg(short = 'n', long, value_name = "N")]
        max_query: Option<usize>,

        /// Query timeout in seconds
        #[arg(short = 't', long, value_name = "SECS")]
        query_timeout: Option<u64>,
    },

    /// Replay a query trace against a binary cache dump
    Replay {
        /// Query trace (`<time> <client>#<port> <qname> <qclass> <qtype>` per line)
        log_file: PathBuf,

        /// Binary cache dump to replay against
        #[arg(short = 'C', long, value_name = "FILE")]
        cache_db: PathBuf,

        /// Write per-question popularity and hit rate
        #[arg(short = 'p', long = "dump-popularity", value_name = "FILE")]
        popularity_file: Option<PathBuf>,

        /// Write the unique questions as a query file
        #[arg(short = 'q', long = "dump-queries", value_name = "FILE")]
        query_dump_file: Option<PathBuf>,

        /// Print per-RCODE statistics
        #[arg(short = 'r', long)]
        dump_rcode_stat: bool,

        /// Print per-type statistics
        #[arg(short = 't', long)]
        dump_qtype_stat: bool,
    },

    /// Aggregate a query trace into unique questions
    Querylog {
        /// Query trace
        log_file: PathBuf,

        /// Write cumulative query popularity
        #[arg(short = 'p', long = "dump-popularity", value_name = "FILE")]
        popularity_file: Option<PathBuf>,

        /// Write the unique questions as a query file
        #[arg(short = 'q', long = "dump-queries", value_name = "FILE")]
        query_dump_file: Option<PathBuf>,
    },
}

/// Requests shutdown of the driver on SIGINT or SIGTERM.
#[cfg(unix)]
fn spawn_signal_handler(shutdown: Shutdown) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Failed to register signal handlers");
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, stopping resolution");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, stopping resolution");
            }
        }

        shutdown.request();
    });
}

#[cfg(not(unix))]
fn spawn_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping resolution");
            shutdown.request();
        }
    });
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

async fn run_resolve(config: Config, query_file: &Path) -> Result<()> {
    let mut cache = RrCache::new();
    install_root_hints(&mut cache).context("Failed to install root hints")?;

    let questions = QueryFile::new(open(query_file)?);
    let resolver = Resolver::new(resolver_config(&config.resolver), cache);
    let mut driver = QueryDriver::new(resolver).context("Failed to set up query sockets")?;
    spawn_signal_handler(driver.shutdown_handle());

    driver.run(questions).await.context("Resolution failed")?;
    let resolver = driver.into_resolver();

    if let Some(path) = &config.output.stats_file {
        let mut writer = create(path)?;
        resolver.stats().dump(&mut writer)?;
        writer.flush()?;
    }
    let cache = resolver.into_cache();
    if let Some(path) = &config.output.dump_file {
        cache
            .dump(path, false)
            .with_context(|| format!("Failed to dump cache to {}", path.display()))?;
    }
    if let Some(path) = &config.output.serialize_file {
        cache
            .dump(path, true)
            .with_context(|| format!("Failed to serialize cache to {}", path.display()))?;
    }

    info!(rows = cache.len(), entries = cache.entry_count(), "Resolution complete");
    Ok(())
}

fn run_replay(
    log_file: &Path,
    cache_db: &Path,
    popularity_file: Option<&Path>,
    query_dump_file: Option<&Path>,
    dump_rcode_stat: bool,
    dump_qtype_stat: bool,
) -> Result<()> {
    let mut cache = RrCache::new();
    cache
        .load(cache_db)
        .with_context(|| format!("Failed to load cache from {}", cache_db.display()))?;

    let mut replay = QueryReplay::new(&mut cache);
    replay.replay(open(log_file)?)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    replay.write_summary(&mut out)?;
    if let Some(path) = popularity_file {
        let mut writer = create(path)?;
        replay.write_popularity(&mut writer)?;
        writer.flush()?;
    }
    if let Some(path) = query_dump_file {
        let mut writer = create(path)?;
        replay.write_queries(&mut writer)?;
        writer.flush()?;
    }
    if dump_rcode_stat {
        replay.write_rcode_stats(&mut out)?;
    }
    if dump_qtype_stat {
        replay.write_qtype_stats(&mut out)?;
    }
    Ok(())
}

fn run_querylog(
    log_file: &Path,
    popularity_file: Option<&Path>,
    query_dump_file: Option<&Path>,
) -> Result<()> {
    let log = QueryLog::read(open(log_file)?)?;
    println!("total_queries={}, unique queries={}", log.total(), log.unique());

    if let Some(path) = popularity_file {
        let mut writer = create(path)?;
        log.write_popularity(&mut writer)?;
        writer.flush()?;
    }
    if let Some(path) = query_dump_file {
        let mut writer = create(path)?;
        log.write_queries(&mut writer)?;
        writer.flush()?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Commands::Resolve {
        ipv4_only,
        ipv6_only,
        dump_file,
        serialize_file,
        stats_file,
        max_query,
        query_timeout,
        ..
    } = &cli.command
    {
        if *ipv4_only {
            config.resolver.ipv6 = false;
        }
        if *ipv6_only {
            config.resolver.ipv4 = false;
        }
        if let Some(n) = max_query {
            config.resolver.max_queries = *n;
        }
        if let Some(secs) = query_timeout {
            config.resolver.query_timeout_secs = *secs;
        }
        if dump_file.is_some() {
            config.output.dump_file = dump_file.clone();
        }
        if serialize_file.is_some() {
            config.output.serialize_file = serialize_file.clone();
        }
        if stats_file.is_some() {
            config.output.stats_file = stats_file.clone();
        }
    }

    config.validate().context("Invalid configuration")?;
    init_tracing(&log_config(&config, cli.log_level.as_deref()));

    match &cli.command {
        Commands::Resolve { query_file, .. } => run_resolve(config, query_file).await,
        Commands::Replay {
            log_file,
            cache_db,
            popularity_file,
            query_dump_file,
            dump_rcode_stat,
            dump_qtype_stat,
        } => {
            if !cache_db.exists() {
                bail!("Cache DB file {} does not exist", cache_db.display());
            }
            run_replay(
                log_file,
                cache_db,
                popularity_file.as_deref(),
                query_dump_file.as_deref(),
                *dump_rcode_stat,
                *dump_qtype_stat,
            )
        }
        Commands::Querylog {
            log_file,
            popularity_file,
            query_dump_file,
        } => run_querylog(log_file, popularity_file.as_deref(), query_dump_file.as_deref()),
    }
}
