use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_scraper_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS companies (
    company_id TEXT PRIMARY KEY,
    warehouse_id TEXT,
    company_name TEXT,
    source_url TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS raw_company_payloads (
    company_id TEXT,
    source_url TEXT NOT NULL,
    scraped_at TIMESTAMP NOT NULL,
    payload_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS failed_companies (
    company_id TEXT,
    source_url TEXT NOT NULL,
    failure_reason TEXT NOT NULL,
    last_attempt TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_market_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS instruments (
    symbol TEXT PRIMARY KEY,
    company_name TEXT,
    date_of_listing DATE,
    isin TEXT,
    market_cap DOUBLE
);

CREATE TABLE IF NOT EXISTS ohlcv_daily (
    symbol TEXT NOT NULL,
    date DATE NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    volume DOUBLE,
    PRIMARY KEY(symbol, date)
);

CREATE TABLE IF NOT EXISTS ohlcv_weekly (
    symbol TEXT NOT NULL,
    week_start DATE NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    volume DOUBLE,
    PRIMARY KEY(symbol, week_start)
);
"#,
    },
    Migration {
        version: "0003_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_raw_payloads_company ON raw_company_payloads(company_id);
CREATE INDEX IF NOT EXISTS idx_raw_payloads_scraped_at ON raw_company_payloads(scraped_at);
CREATE INDEX IF NOT EXISTS idx_failed_companies_url ON failed_companies(source_url);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let query = format!(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = '{}'",
            escape_sql_string(migration.version)
        );
        let applied_count: i64 = connection.query_row(query.as_str(), [], |row| row.get(0))?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            let insert = format!(
                "INSERT INTO schema_migrations (version) VALUES ('{}')",
                escape_sql_string(migration.version)
            );
            connection.execute_batch(insert.as_str())?;
        }
    }

    Ok(())
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}
