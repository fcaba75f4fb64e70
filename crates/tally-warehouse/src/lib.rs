//! DuckDB persistence for tally: scraped company payloads on one side and the
//! OHLCV time-series store on the other.
//!
//! All writes go through short-lived pooled connections; SQL is built with
//! single-quote escaping and `TRY_CAST` for timestamps the way the upstream
//! data warrants (everything arriving here is already normalized text).

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::Connection;
use serde::Serialize;
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};

const ISO_DATE: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unsupported bar frequency '{0}', expected D or W")]
    UnsupportedFrequency(String),

    #[error("stored value is not a date: '{0}'")]
    MalformedDate(String),
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_path: resolve_tally_home().join("tally.duckdb"),
            max_pool_size: 4,
        }
    }
}

/// One row of the `companies` table.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyRow {
    pub company_id: String,
    pub warehouse_id: Option<String>,
    pub company_name: Option<String>,
    pub source_url: String,
}

/// One row of the `failed_companies` table.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCompany {
    pub company_id: Option<String>,
    pub source_url: String,
    pub failure_reason: String,
}

/// One OHLCV bar as stored. For weekly bars `date` is the week start.
#[derive(Debug, Clone, Copy)]
pub struct OhlcvRow {
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open (creating parent directories and the file as needed) and run
    /// pending migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path, config.max_pool_size);
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Insert or fully replace the row for one company.
    pub fn upsert_company(
        &self,
        company_id: &str,
        warehouse_id: Option<&str>,
        company_name: Option<&str>,
        source_url: &str,
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let sql = format!(
            r#"
INSERT OR REPLACE INTO companies (company_id, warehouse_id, company_name, source_url, updated_at)
VALUES ('{company_id}', {warehouse_id}, {company_name}, '{source_url}', CURRENT_TIMESTAMP);
"#,
            company_id = escape_sql_string(company_id),
            warehouse_id = sql_option_str(warehouse_id),
            company_name = sql_option_str(company_name),
            source_url = escape_sql_string(source_url),
        );
        connection.execute_batch(sql.as_str())?;
        Ok(())
    }

    /// Append one raw payload snapshot. Never replaces earlier snapshots.
    pub fn store_raw_payload(
        &self,
        company_id: Option<&str>,
        source_url: &str,
        scraped_at: &str,
        payload_json: &str,
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let sql = format!(
            r#"
INSERT INTO raw_company_payloads (company_id, source_url, scraped_at, payload_json)
VALUES ({company_id}, '{source_url}', TRY_CAST('{scraped_at}' AS TIMESTAMP), '{payload_json}');
"#,
            company_id = sql_option_str(company_id),
            source_url = escape_sql_string(source_url),
            scraped_at = escape_sql_string(scraped_at),
            payload_json = escape_sql_string(payload_json),
        );
        connection.execute_batch(sql.as_str())?;
        Ok(())
    }

    /// Append one failure record. The company id is nullable: unrecoverable
    /// page errors happen before the id is known.
    pub fn mark_failed(
        &self,
        company_id: Option<&str>,
        source_url: &str,
        reason: &str,
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let sql = format!(
            r#"
INSERT INTO failed_companies (company_id, source_url, failure_reason, last_attempt)
VALUES ({company_id}, '{source_url}', '{reason}', CURRENT_TIMESTAMP);
"#,
            company_id = sql_option_str(company_id),
            source_url = escape_sql_string(source_url),
            reason = escape_sql_string(reason),
        );
        connection.execute_batch(sql.as_str())?;
        Ok(())
    }

    pub fn companies(&self) -> Result<Vec<CompanyRow>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT company_id, warehouse_id, company_name, source_url FROM companies ORDER BY company_id",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(CompanyRow {
                company_id: row.get(0)?,
                warehouse_id: row.get(1)?,
                company_name: row.get(2)?,
                source_url: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Failure records for offline inspection and reruns, oldest first.
    pub fn failed_companies(&self) -> Result<Vec<FailedCompany>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT company_id, source_url, failure_reason FROM failed_companies ORDER BY last_attempt",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(FailedCompany {
                company_id: row.get(0)?,
                source_url: row.get(1)?,
                failure_reason: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn raw_payload_count(&self, company_id: &str) -> Result<i64, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let sql = format!(
            "SELECT COUNT(*) FROM raw_company_payloads WHERE company_id = '{}'",
            escape_sql_string(company_id)
        );
        Ok(connection.query_row(sql.as_str(), [], |row| row.get(0))?)
    }

    /// Insert or fully replace one instrument row.
    pub fn add_instrument(
        &self,
        symbol: &str,
        company_name: Option<&str>,
        date_of_listing: Option<Date>,
        isin: Option<&str>,
        market_cap: Option<f64>,
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let sql = format!(
            r#"
INSERT OR REPLACE INTO instruments (symbol, company_name, date_of_listing, isin, market_cap)
VALUES ('{symbol}', {company_name}, {date_of_listing}, {isin}, {market_cap});
"#,
            symbol = escape_sql_string(symbol),
            company_name = sql_option_str(company_name),
            date_of_listing = sql_option_date(date_of_listing),
            isin = sql_option_str(isin),
            market_cap = sql_option_f64(market_cap),
        );
        connection.execute_batch(sql.as_str())?;
        Ok(())
    }

    /// All instrument symbols in ascending order.
    pub fn instrument_symbols(&self) -> Result<Vec<String>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement =
            connection.prepare("SELECT symbol FROM instruments ORDER BY symbol")?;
        let rows = statement.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Upsert a batch of bars for one symbol in one transaction.
    pub fn upsert_bars(
        &self,
        symbol: &str,
        freq: &str,
        bars: &[OhlcvRow],
    ) -> Result<(), WarehouseError> {
        if bars.is_empty() {
            return Ok(());
        }
        let (table, date_column) = bar_table(freq)?;

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            for bar in bars {
                let sql = format!(
                    r#"
INSERT OR REPLACE INTO {table} (symbol, {date_column}, open, high, low, close, volume)
VALUES ('{symbol}', DATE '{date}', {open}, {high}, {low}, {close}, {volume});
"#,
                    symbol = escape_sql_string(symbol),
                    date = format_date(bar.date),
                    open = bar.open,
                    high = bar.high,
                    low = bar.low,
                    close = bar.close,
                    volume = bar.volume,
                );
                connection.execute_batch(sql.as_str())?;
            }
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    /// Last stored bar date for a symbol, or `None` when the store is empty.
    pub fn max_bar_date(&self, symbol: &str, freq: &str) -> Result<Option<Date>, WarehouseError> {
        let (table, date_column) = bar_table(freq)?;
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let sql = format!(
            "SELECT CAST(MAX({date_column}) AS VARCHAR) FROM {table} WHERE symbol = '{}'",
            escape_sql_string(symbol)
        );
        let text: Option<String> = connection.query_row(sql.as_str(), [], |row| row.get(0))?;
        match text {
            None => Ok(None),
            Some(text) => Date::parse(&text, ISO_DATE)
                .map(Some)
                .map_err(|_| WarehouseError::MalformedDate(text)),
        }
    }

    pub fn bar_count(&self, symbol: &str, freq: &str) -> Result<i64, WarehouseError> {
        let (table, _) = bar_table(freq)?;
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE symbol = '{}'",
            escape_sql_string(symbol)
        );
        Ok(connection.query_row(sql.as_str(), [], |row| row.get(0))?)
    }
}

fn bar_table(freq: &str) -> Result<(&'static str, &'static str), WarehouseError> {
    match freq {
        "D" => Ok(("ohlcv_daily", "date")),
        "W" => Ok(("ohlcv_weekly", "week_start")),
        other => Err(WarehouseError::UnsupportedFrequency(other.to_owned())),
    }
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn format_date(date: Date) -> String {
    date.format(ISO_DATE)
        .expect("calendar dates always format as ISO")
}

fn resolve_tally_home() -> PathBuf {
    if let Some(path) = env::var_os("TALLY_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tally");
    }

    PathBuf::from(".tally")
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

fn sql_option_str(value: Option<&str>) -> String {
    match value {
        Some(value) => format!("'{}'", escape_sql_string(value)),
        None => String::from("NULL"),
    }
}

fn sql_option_f64(value: Option<f64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => String::from("NULL"),
    }
}

fn sql_option_date(value: Option<Date>) -> String {
    match value {
        Some(date) => format!("DATE '{}'", format_date(date)),
        None => String::from("NULL"),
    }
}
