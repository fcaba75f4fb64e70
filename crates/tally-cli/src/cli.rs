use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tally_core::Frequency;

#[derive(Debug, Parser)]
#[command(
    name = "tally",
    version,
    about = "Fundamentals scraper and OHLCV market-data warehouse"
)]
pub struct Cli {
    /// Path to the DuckDB file. Defaults to $TALLY_HOME/tally.duckdb.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the warehouse file and apply pending migrations.
    Init,

    /// Scrape every company listed in a CSV with a `source_url` column.
    Scrape {
        /// Input CSV listing company page URLs.
        #[arg(long)]
        input: PathBuf,

        /// Companies in flight at once.
        #[arg(long, default_value_t = 2)]
        concurrency: usize,

        /// HTTP requests in flight at once, shared across all companies.
        #[arg(long, default_value_t = 2)]
        max_in_flight: usize,

        /// Cap outbound requests per minute. Unset means no quota beyond the
        /// in-flight limit.
        #[arg(long)]
        requests_per_minute: Option<u32>,
    },

    /// Load instrument symbols from an exchange listing CSV.
    LoadInstruments {
        /// CSV with symbol, company name, date of listing, ISIN and
        /// market cap columns.
        #[arg(long)]
        input: PathBuf,
    },

    /// Fetch OHLCV bars for every stored instrument at one frequency.
    Update {
        #[arg(long, value_enum, default_value_t = FrequencyArg::Daily)]
        freq: FrequencyArg,

        /// Where per-symbol failures are appended.
        #[arg(long, default_value = "logs/failed_symbols.txt")]
        failure_log: PathBuf,
    },

    /// Re-run every symbol recorded in the failure log.
    Reprocess {
        #[arg(long, default_value = "logs/failed_symbols.txt")]
        failure_log: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrequencyArg {
    Daily,
    Weekly,
}

impl From<FrequencyArg> for Frequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::Weekly => Frequency::Weekly,
        }
    }
}
