//! vislog Inspect Binary
//!
//! Read-side view of an existing store: counts, listings and payload dumps.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use regex::Regex;
use tracing_subscriber::{fmt, EnvFilter};
use vislog::log;
use vislog::{CancelToken, Config, Store, VislogError};

/// vislog Inspect
#[derive(Parser, Debug)]
#[command(name = "vislog-inspect")]
#[command(about = "Inspect a vislog store without modifying it")]
#[command(version)]
struct Args {
    /// Path prefix of the store (files are <prefix>.idx and <prefix>.log)
    #[arg(short, long, default_value = "./vislog_data/store")]
    prefix: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index counters, replay report and data-log frame count
    Stats,

    /// List scopes that own at least one live name
    Scopes {
        /// Scope pattern (unanchored regex)
        #[arg(short, long, default_value = ".*")]
        scope: String,
    },

    /// List names that own at least one data entry
    Names {
        /// Scope pattern (unanchored regex)
        #[arg(short, long, default_value = ".*")]
        scope: String,

        /// Name pattern (unanchored regex)
        #[arg(short, long, default_value = ".*")]
        name: String,
    },

    /// Dump data points
    Data {
        /// Scope pattern (unanchored regex)
        #[arg(short, long, default_value = ".*")]
        scope: String,

        /// Name pattern (unanchored regex)
        #[arg(short, long, default_value = ".*")]
        name: String,

        /// Only entries ending past this data-log offset
        #[arg(short, long, default_value = "0")]
        min_offset: u64,

        /// Stop after this many points
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Dump scope configurations
    Configs {
        /// Scope pattern (unanchored regex)
        #[arg(short, long, default_value = ".*")]
        scope: String,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vislog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("vislog-inspect v{}", vislog::VERSION);
    tracing::info!("Store prefix: {}", args.prefix.display());

    // Never create or repair anything from here
    let config = Config::builder()
        .path_prefix(&args.prefix)
        .read_only(true)
        .build();

    let store = match Store::open(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(&store, args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(store: &Store, command: Commands) -> vislog::Result<()> {
    match command {
        Commands::Stats => stats(store),
        Commands::Scopes { scope } => {
            for scope in store.scopes(&pattern(&scope)?) {
                println!("{}\t{}\t{}", scope.scope_id, scope.scope, scope.created_at);
            }
            Ok(())
        }
        Commands::Names { scope, name } => {
            let scope_pat = pattern(&scope)?;
            for name in store.names(&scope_pat, &pattern(&name)?) {
                let scope = store
                    .with_index(|index| index.scope(name.scope_id).map(|s| s.scope.clone()))
                    .unwrap_or_default();
                let fields: Vec<String> = name
                    .fields
                    .iter()
                    .map(|field| format!("{}:{:?}", field.name, field.field_type))
                    .collect();
                println!("{}\t{}\t{}\t[{}]", name.name_id, scope, name.name, fields.join(", "));
            }
            Ok(())
        }
        Commands::Data {
            scope,
            name,
            min_offset,
            limit,
        } => {
            let cancel = CancelToken::new();
            let (result, stream) =
                store.get_data(&pattern(&scope)?, &pattern(&name)?, min_offset, &cancel)?;
            println!("# file_offset {}", result.file_offset);

            let limit = limit.unwrap_or(usize::MAX);
            for (printed, data) in stream.enumerate() {
                if printed >= limit {
                    cancel.cancel();
                    break;
                }
                let data = data?;
                let name = result
                    .names
                    .get(&data.name_id)
                    .map_or("?", |name| name.name.as_str());
                println!(
                    "{}\t{}\t{}\t{:?}",
                    data.entry_id, name, data.index, data.axes
                );
            }
            Ok(())
        }
        Commands::Configs { scope } => {
            let (result, stream) = store.get_configs(&pattern(&scope)?, 0, &CancelToken::new())?;
            for config in stream {
                let config = config?;
                let scope = result
                    .scopes
                    .get(&config.scope_id)
                    .map_or("?", |scope| scope.scope.as_str());
                println!("{}\t{}\t{:?}", config.entry_id, scope, config.attributes);
            }
            Ok(())
        }
    }
}

fn stats(store: &Store) -> vislog::Result<()> {
    let report = store.load_report();
    store.with_index(|index| {
        println!("scopes          {}", index.scope_count());
        println!("names           {}", index.name_count());
        println!("data entries    {}", index.entry_count());
        println!("config entries  {}", index.config_entry_count());
        println!("max id          {}", index.max_id());
        println!("high water      {}", index.high_water());
    });
    println!("records applied {}", report.records_applied);
    println!("records ignored {}", report.records_ignored);
    println!("index valid len {}", report.valid_len);
    if let Some(err) = &report.tail_error {
        println!("index torn tail {} bytes ({})", report.discarded_bytes, err);
    }

    let data = log::scan(&store.config().data_path(), |_, _| Ok(()))?;
    println!("data frames     {}", data.frames_read);
    println!("data valid len  {}", data.valid_len);
    if data.is_torn() {
        println!("data torn tail  {} bytes", data.torn_bytes());
    }
    Ok(())
}

fn pattern(pat: &str) -> vislog::Result<Regex> {
    Regex::new(pat).map_err(|e| VislogError::Config(format!("bad pattern {:?}: {}", pat, e)))
}
