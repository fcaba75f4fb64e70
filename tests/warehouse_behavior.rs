//! Behavior tests for the DuckDB warehouse.
//!
//! Each test opens a fresh database under a tempdir and walks one storage
//! journey: company upserts, raw payload appends, failure records, instrument
//! loading, and the two OHLCV tables.

use tally_warehouse::{OhlcvRow, Warehouse, WarehouseConfig, WarehouseError};
use tempfile::tempdir;
use time::macros::date;

fn open_temp(temp: &tempfile::TempDir) -> Warehouse {
    Warehouse::open(WarehouseConfig {
        db_path: temp.path().join("tally.duckdb"),
        max_pool_size: 2,
    })
    .expect("warehouse open")
}

fn row(day: time::Date, close: f64) -> OhlcvRow {
    OhlcvRow {
        date: day,
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 25_000.0,
    }
}

// =============================================================================
// Companies
// =============================================================================

#[test]
fn when_a_company_is_upserted_twice_the_row_is_replaced() {
    // Given: a fresh warehouse with one company stored
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp(&temp);
    warehouse
        .upsert_company("12345", Some("987"), Some("Acme Ltd"), "https://upstream.test/company/ACME/")
        .expect("first upsert");

    // When: the same company id arrives with a new name
    warehouse
        .upsert_company(
            "12345",
            Some("987"),
            Some("Acme Industries Ltd"),
            "https://upstream.test/company/ACME/",
        )
        .expect("second upsert");

    // Then: there is still one row, carrying the latest name
    let companies = warehouse.companies().expect("query companies");
    assert_eq!(companies.len(), 1);
    assert_eq!(
        companies[0].company_name.as_deref(),
        Some("Acme Industries Ltd")
    );
}

#[test]
fn when_raw_payloads_accumulate_every_scrape_is_kept() {
    // Given: a company scraped twice
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp(&temp);

    // When: both raw payloads are stored
    warehouse
        .store_raw_payload(
            Some("12345"),
            "https://upstream.test/company/ACME/",
            "2026-08-29T10:00:00Z",
            r#"{"summary":{}}"#,
        )
        .expect("first payload");
    warehouse
        .store_raw_payload(
            Some("12345"),
            "https://upstream.test/company/ACME/",
            "2026-08-30T10:00:00Z",
            r#"{"summary":{}}"#,
        )
        .expect("second payload");

    // Then: the history is append-only
    assert_eq!(warehouse.raw_payload_count("12345").expect("count"), 2);
}

#[test]
fn when_a_scrape_fails_without_an_id_the_failure_is_still_recorded() {
    // Given: a URL that never yielded an identifier pair
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp(&temp);

    // When: the failure is recorded with no company id
    warehouse
        .mark_failed(None, "https://upstream.test/company/GONE/", "unrecoverable: http status 404")
        .expect("mark failed");

    // Then: the record is queryable by URL
    let failed = warehouse.failed_companies().expect("query failures");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].company_id, None);
    assert_eq!(failed[0].source_url, "https://upstream.test/company/GONE/");
    assert!(failed[0].failure_reason.contains("404"));
}

// =============================================================================
// Instruments and OHLCV
// =============================================================================

#[test]
fn when_instruments_load_the_symbols_come_back_sorted() {
    // Given: instruments inserted out of order
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp(&temp);
    warehouse
        .add_instrument("TCS", Some("Tata Consultancy"), Some(date!(2004 - 08 - 25)), None, None)
        .expect("add TCS");
    warehouse
        .add_instrument("INFY", Some("Infosys"), None, Some("INE009A01021"), Some(650_000.0))
        .expect("add INFY");

    // When: the update loop asks for the symbol list
    let symbols = warehouse.instrument_symbols().expect("symbols");

    // Then: it is in ascending symbol order
    assert_eq!(symbols, vec![String::from("INFY"), String::from("TCS")]);
}

#[test]
fn when_bars_are_upserted_twice_the_rows_stay_unique() {
    // Given: one stored trading day
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp(&temp);
    let day = date!(2026 - 08 - 28);
    warehouse
        .upsert_bars("TCS", "D", &[row(day, 100.0)])
        .expect("first upsert");

    // When: the same day arrives again with a corrected close
    warehouse
        .upsert_bars("TCS", "D", &[row(day, 101.0)])
        .expect("second upsert");

    // Then: still one row, and the series max is unchanged
    assert_eq!(warehouse.bar_count("TCS", "D").expect("count"), 1);
    assert_eq!(warehouse.max_bar_date("TCS", "D").expect("max"), Some(day));
}

#[test]
fn when_daily_and_weekly_bars_coexist_they_live_in_separate_tables() {
    // Given: bars at both frequencies for one symbol
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp(&temp);
    warehouse
        .upsert_bars("TCS", "D", &[row(date!(2026 - 08 - 28), 100.0)])
        .expect("daily upsert");
    warehouse
        .upsert_bars("TCS", "W", &[row(date!(2026 - 08 - 24), 99.0)])
        .expect("weekly upsert");

    // Then: each frequency answers from its own table
    assert_eq!(
        warehouse.max_bar_date("TCS", "D").expect("daily max"),
        Some(date!(2026 - 08 - 28))
    );
    assert_eq!(
        warehouse.max_bar_date("TCS", "W").expect("weekly max"),
        Some(date!(2026 - 08 - 24))
    );
}

#[test]
fn when_a_symbol_has_no_bars_the_max_date_is_none() {
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp(&temp);
    assert_eq!(warehouse.max_bar_date("NOPE", "D").expect("max"), None);
}

#[test]
fn when_an_unknown_frequency_is_requested_the_error_names_it() {
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp(&temp);
    let error = warehouse
        .max_bar_date("TCS", "monthly")
        .expect_err("unsupported frequency");
    assert!(matches!(error, WarehouseError::UnsupportedFrequency(_)));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn when_the_warehouse_reopens_data_and_migrations_survive() {
    // Given: a warehouse with data, then dropped
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("tally.duckdb");
    {
        let warehouse = Warehouse::open(WarehouseConfig {
            db_path: path.clone(),
            max_pool_size: 2,
        })
        .expect("first open");
        warehouse
            .upsert_company("12345", None, Some("Acme Ltd"), "https://upstream.test/company/ACME/")
            .expect("upsert");
    }

    // When: the same file is opened again (migrations re-run as no-ops)
    let warehouse = Warehouse::open(WarehouseConfig {
        db_path: path,
        max_pool_size: 2,
    })
    .expect("second open");

    // Then: the earlier data is still there
    let companies = warehouse.companies().expect("query companies");
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].company_id, "12345");
}
