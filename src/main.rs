use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fuzzmap::index::registry::map_path;
use fuzzmap::index::{Registry, TrigramMap, build, stats};
use fuzzmap::server::{Client, CommandProcessor, Server};
use fuzzmap::utils::{AppConfig, databases_dir, resolve_data_dir};
use fuzzmap::output;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fuzzmap")]
#[command(about = "Trigram fuzzy lookup server and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Data directory (default: FUZZMAP_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the lookup server in the foreground
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding the .trigrams files
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Store a needle on a running server
    Put {
        db: String,
        needle: String,
        reference: u64,
        #[arg(default_value_t = 0)]
        weight: u64,
        #[command(flatten)]
        remote: Remote,
    },
    /// Query a running server
    Find {
        db: String,
        needle: String,
        /// Maximum results (server default when omitted)
        #[arg(short, long)]
        limit: Option<usize>,
        #[command(flatten)]
        remote: Remote,
    },
    /// Remove a reference on a running server
    Delete {
        db: String,
        reference: u64,
        #[command(flatten)]
        remote: Remote,
    },
    /// Empty a database on a running server
    Clear {
        db: String,
        #[command(flatten)]
        remote: Remote,
    },
    /// Query a local database file without a server
    Lookup {
        db: String,
        needle: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Bulk load `needle<TAB>ref[<TAB>weight]` lines into a local database
    Import {
        db: String,
        file: PathBuf,
    },
    /// Show statistics for a .trigrams file (or list databases)
    Stats {
        file: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
struct Remote {
    /// Server host (default from config)
    #[arg(long)]
    host: Option<String>,

    /// Server port (default from config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl Remote {
    fn connect(&self, config: &AppConfig, db: &str) -> Result<Client> {
        let host = self.host.as_deref().unwrap_or(&config.host);
        let port = self.port.unwrap_or(config.port);
        Client::connect((host, port), db).with_context(|| format!("Failed to connect to {host}:{port}"))
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("FUZZMAP_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    let config = AppConfig::load(&data_dir)?;

    match cli.command {
        Commands::Serve { host, port, dir } => {
            let dir = dir.unwrap_or_else(|| databases_dir(&data_dir));
            let host = host.unwrap_or_else(|| config.host.clone());
            let port = port.unwrap_or(config.port);
            serve(&config, &host, port, dir)?;
        }
        Commands::Put {
            db,
            needle,
            reference,
            weight,
            remote,
        } => {
            remote.connect(&config, &db)?.put(&needle, reference, weight)?;
        }
        Commands::Find {
            db,
            needle,
            limit,
            remote,
        } => {
            let refs = remote.connect(&config, &db)?.find(&needle, limit)?;
            output::print_references(&refs, !remote.no_color)?;
        }
        Commands::Delete { db, reference, remote } => {
            remote.connect(&config, &db)?.delete(reference)?;
        }
        Commands::Clear { db, remote } => {
            remote.connect(&config, &db)?.clear()?;
        }
        Commands::Lookup { db, needle, limit } => {
            lookup(&config, &data_dir, &db, &needle, limit)?;
        }
        Commands::Import { db, file } => {
            let mut registry = Registry::with_limits(databases_dir(&data_dir), config.limits);
            let summary = build::import_tsv(&mut registry, &db, &file, cli.quiet)?;
            println!(
                "Imported {} needles into {} ({} duplicates, {} skipped)",
                summary.added, db, summary.duplicates, summary.skipped
            );
        }
        Commands::Stats { file: Some(file) } => {
            stats::show_stats(&file)?;
        }
        Commands::Stats { file: None } => {
            stats::list_databases(&databases_dir(&data_dir))?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn serve(config: &AppConfig, host: &str, port: u16, dir: PathBuf) -> Result<()> {
    tracing::info!(dir = %dir.display(), "serving databases");
    let registry = Registry::with_limits(dir, config.limits);
    let processor = CommandProcessor::new(registry, config.cache_size);
    let server = Server::bind(
        (host, port),
        processor,
        Duration::from_secs(config.save_interval_secs.max(1)),
    )?;
    server.run()
}

fn lookup(config: &AppConfig, data_dir: &Path, db: &str, needle: &str, limit: Option<usize>) -> Result<()> {
    let path = map_path(&databases_dir(data_dir), db);
    let map = TrigramMap::load(&path, config.limits)?;
    let matches = map.find(needle, limit.unwrap_or(config.limits.default_limit))?;
    output::print_matches(&matches, true)?;
    Ok(())
}
