use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::api::ParseError;
use crate::domain::{maybe_number_text, PeerTable};

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("static selector"));
static HEADER_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("thead tr").expect("static selector"));
static BODY_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tbody tr").expect("static selector"));
static HEADER_CELL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th, td").expect("static selector"));
static DATA_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("static selector"));

/// Parse the peers endpoint body into a [`PeerTable`].
///
/// The endpoint usually returns an HTML fragment with a `<table>`; plaintext
/// TSV is accepted as a fallback. A row whose first column starts with
/// `Median:` is split out as the aggregate row. An empty body is an empty
/// table, not an error.
pub fn parse_peers(body: &str) -> Result<PeerTable, ParseError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(PeerTable::default());
    }

    if body.to_lowercase().contains("<table") {
        return Ok(parse_html_table(body));
    }
    Ok(parse_tsv(body))
}

fn parse_html_table(html: &str) -> PeerTable {
    let document = Html::parse_fragment(html);
    let Some(table) = document.select(&TABLE).next() else {
        return PeerTable::default();
    };

    let mut headers: Vec<String> = table
        .select(&HEADER_ROW)
        .next()
        .map(|tr| tr.select(&HEADER_CELL).map(cell_text).collect())
        .unwrap_or_default();

    // html5ever wraps bare <tr> rows in a tbody, so this skips the header
    // row whether or not the fragment spelled out a <thead>.
    let mut peers = PeerTable::default();
    for tr in table.select(&BODY_ROW) {
        let cells: Vec<String> = tr.select(&DATA_CELL).map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }
        // No <thead>: the first row doubles as the header.
        if headers.is_empty() {
            headers = tr.select(&HEADER_CELL).map(cell_text).collect();
            continue;
        }
        push_row(&mut peers, &headers, cells);
    }
    peers
}

fn parse_tsv(text: &str) -> PeerTable {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return PeerTable::default();
    };
    let headers: Vec<String> = header_line.split('\t').map(|h| h.trim().to_owned()).collect();

    let mut peers = PeerTable::default();
    for line in lines {
        let cells: Vec<String> = line.split('\t').map(|c| c.trim().to_owned()).collect();
        push_row(&mut peers, &headers, cells);
    }
    peers
}

fn push_row(peers: &mut PeerTable, headers: &[String], mut cells: Vec<String>) {
    cells.resize(headers.len(), String::new());

    let row: BTreeMap<String, Value> = headers
        .iter()
        .zip(cells.iter())
        .map(|(header, cell)| (header.clone(), maybe_number_text(cell)))
        .collect();

    if cells.first().is_some_and(|c| c.starts_with("Median:")) {
        peers.median = Some(row);
    } else {
        peers.rows.push(row);
    }
}

fn cell_text(cell: scraper::ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_owned()
}
