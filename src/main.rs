//! Sage data CLI
//!
//! Command-line interface for the data API:
//! - Run queries and print or save the results
//! - Load saved responses
//! - Watch for new records
//! - Generate a config file

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sage_data_client::config::{generate_default_config, Config, LoggingConfig};
use sage_data_client::{load, DataClient, Query, Record, Table};

#[derive(Parser)]
#[command(name = "sage-data")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query and load records from the Sage data API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Query endpoint, overriding the config file
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Ndjson,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query
    Query {
        #[command(flatten)]
        args: QueryArgs,
        /// Save the raw response here instead of printing it (reload with `load`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a saved response (plain or gzipped)
    Load {
        /// Path to the saved response
        path: PathBuf,
    },

    /// Poll for new records and print them as they arrive
    Watch {
        #[command(flatten)]
        args: QueryArgs,
        /// Seconds between polls
        #[arg(long, default_value = "3")]
        interval_secs: u64,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
pub struct QueryArgs {
    /// Start time: relative ("-1h", "-30m") or absolute (RFC 3339)
    #[arg(short, long, default_value = "-1h", allow_hyphen_values = true)]
    start: String,
    /// End time, same forms as --start
    #[arg(short, long, allow_hyphen_values = true)]
    end: Option<String>,
    /// Earliest N records per series
    #[arg(long, conflicts_with = "tail")]
    head: Option<u64>,
    /// Latest N records per series
    #[arg(long)]
    tail: Option<u64>,
    /// Filters in key=pattern format, e.g. name=env.temperature or vsn=W0*
    #[arg(short = 'F', long = "filter")]
    filters: Vec<String>,
    /// Bucket to query
    #[arg(long)]
    bucket: Option<String>,
    /// Experimental aggregation function
    #[arg(long)]
    func: Option<String>,
    /// Experimental aggregation window
    #[arg(long)]
    window: Option<String>,
}

impl QueryArgs {
    fn to_query(&self, start: Option<DateTime<Utc>>) -> anyhow::Result<Query> {
        let mut query = match start {
            Some(start) => Query::new(start),
            None => Query::new(self.start.as_str()),
        };

        if let Some(end) = &self.end {
            query = query.end(end.as_str());
        }
        if let Some(n) = self.head {
            query = query.head(n);
        }
        if let Some(n) = self.tail {
            query = query.tail(n);
        }
        if !self.filters.is_empty() {
            query = query.filters(parse_filters(&self.filters)?);
        }
        if let Some(bucket) = &self.bucket {
            query = query.bucket(bucket.as_str());
        }
        if let Some(func) = &self.func {
            query = query.function(func.as_str());
        }
        if let Some(window) = &self.window {
            query = query.window(window.as_str());
        }
        Ok(query)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.client.endpoint = endpoint.clone();
    }

    init_logging(&config.logging);
    tracing::debug!(endpoint = %config.client.endpoint, "sage-data v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Query { args, output } => {
            let client = DataClient::new(config.client)?;
            let query = args.to_query(None)?;

            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {:?}", path))?;
                    let bytes = client.query_to_writer(&query, std::io::BufWriter::new(file))?;
                    eprintln!("Saved {} bytes to {:?}", bytes, path);
                }
                None => {
                    let table = client.query(&query)?;
                    print_results(&table, cli.format)?;
                }
            }
        }

        Commands::Load { path } => {
            if !path.exists() {
                bail!("File not found: {:?}", path);
            }
            let table = load(path)?;
            print_results(&table, cli.format)?;
        }

        Commands::Watch {
            args,
            interval_secs,
        } => {
            let client = DataClient::new(config.client)?;
            watch(&client, &args, interval_secs, cli.format)?;
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Stderr logging; `RUST_LOG` wins over the configured level
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sage_data_client={}", logging.level)));

    let json = logging.format.eq_ignore_ascii_case("json");
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let pretty_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .init();
}

fn parse_filters(filters: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for filter in filters {
        match filter.split_once('=') {
            Some((key, pattern)) if !key.trim().is_empty() => {
                map.insert(key.trim().to_string(), pattern.trim().to_string());
            }
            _ => bail!("Invalid filter {:?}. Use: key=pattern", filter),
        }
    }
    Ok(map)
}

/// Newest timestamp seen so far, plus the series already printed at exactly that instant
#[derive(Default)]
struct WatchCursor {
    last_seen: Option<DateTime<Utc>>,
    at_last_seen: HashSet<(String, BTreeMap<String, String>)>,
}

impl WatchCursor {
    /// Keep records not printed before and move the cursor past them
    fn advance(&mut self, table: Table) -> Table {
        let fresh: Vec<Record> = table
            .into_records()
            .into_iter()
            .filter(|r| match self.last_seen {
                None => true,
                Some(seen) if r.timestamp == seen => !self
                    .at_last_seen
                    .contains(&(r.name.clone(), r.meta.clone())),
                Some(seen) => r.timestamp > seen,
            })
            .collect();

        if let Some(newest) = fresh.iter().map(|r| r.timestamp).max() {
            if self.last_seen != Some(newest) {
                self.last_seen = Some(newest);
                self.at_last_seen.clear();
            }
            for r in fresh.iter().filter(|r| r.timestamp == newest) {
                self.at_last_seen.insert((r.name.clone(), r.meta.clone()));
            }
        }

        Table::from_records(fresh)
    }
}

/// Re-run the query from the newest timestamp seen so far and print only unseen records
fn watch(
    client: &DataClient,
    args: &QueryArgs,
    interval_secs: u64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let interval = std::time::Duration::from_secs(interval_secs.max(1));
    let mut cursor = WatchCursor::default();

    loop {
        let table = client.query(&args.to_query(cursor.last_seen)?)?;
        let fresh = cursor.advance(table);

        if !fresh.is_empty() {
            match format {
                OutputFormat::Table => print_table(&fresh),
                OutputFormat::Csv => fresh.write_csv(std::io::stdout().lock())?,
                OutputFormat::Ndjson => fresh.write_ndjson(std::io::stdout().lock())?,
            }
        } else {
            tracing::debug!("No new records");
        }

        std::thread::sleep(interval);
    }
}

fn print_results(table: &Table, format: OutputFormat) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    match format {
        OutputFormat::Table => {
            if table.is_empty() {
                println!("No records for the selected time range");
            } else {
                print_table(table);
            }
        }
        OutputFormat::Csv => table.write_csv(stdout.lock())?,
        OutputFormat::Ndjson => table.write_ndjson(stdout.lock())?,
    }
    Ok(())
}

const MAX_CELL_WIDTH: usize = 40;

fn print_table(table: &Table) {
    let columns = table.columns();

    let rows: Vec<Vec<String>> = (0..table.len())
        .map(|row| {
            columns
                .iter()
                .map(|c| match table.cell(row, c) {
                    Some(cell) if !cell.is_null() => truncate(&cell.to_string()),
                    _ => "-".to_string(),
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    println!("{}", format_row(columns.iter().map(String::as_str), &widths));
    println!(
        "{}",
        "-".repeat(widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1))
    );
    for row in &rows {
        println!("{}", format_row(row.iter().map(String::as_str), &widths));
    }
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_CELL_WIDTH {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(MAX_CELL_WIDTH - 1).collect();
        t.push('…');
        t
    }
}
