//! Company page extraction.
//!
//! The company page carries the identifier pair, the summary ratio strip, six
//! named wide statement tables, and the pros/cons/profile analysis block.
//! Everything here is tolerant: a missing block yields an empty field, never
//! an error, because page layout drifts more often than the API does.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::domain::{maybe_number_text, Analysis, CompanyRef};
use crate::error::FetchError;
use crate::retry::{classify_status, StatusClass};
use crate::transport::Transport;

static ID_DIV: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div[data-company-id][data-warehouse-id]").expect("static selector")
});
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("static selector"));
static RATIO_ITEM: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".company-ratios li").expect("static selector"));
static RATIO_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.name").expect("static selector"));
static RATIO_VALUE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.value").expect("static selector"));
static PROS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#analysis .pros li").expect("static selector"));
static CONS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#analysis .cons li").expect("static selector"));
static ABOUT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.company-profile").expect("static selector"));
static HEADER_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("thead tr").expect("static selector"));
static HEADER_CELL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th, td").expect("static selector"));
static BODY_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tbody tr").expect("static selector"));
static DATA_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("static selector"));

/// Wide statement tables pulled off the page, keyed by the heading that
/// precedes each one.
const TABLE_SECTIONS: [(&str, &str); 6] = [
    ("quarterly_results", "Quarterly Results"),
    ("profit_and_loss", "Profit & Loss"),
    ("balance_sheet", "Balance Sheet"),
    ("cash_flows", "Cash Flows"),
    ("ratios", "Ratios"),
    ("shareholding_pattern", "Shareholding Pattern"),
];

/// Everything extracted from one company page.
#[derive(Debug, Clone)]
pub struct CompanyPage {
    pub meta: CompanyRef,
    /// Raw summary strip: company name plus the ratio labels as shown.
    pub summary: BTreeMap<String, String>,
    /// Summary ratios with numeric cleaning applied.
    pub quick_ratios: BTreeMap<String, Value>,
    pub tables: BTreeMap<String, Vec<BTreeMap<String, Value>>>,
    pub analysis: Analysis,
}

/// Seam between the orchestrator and the page fetch. The production impl
/// goes through the shared transport; tests substitute scripted pages.
///
/// Errors carry the HTTP status when there is one so the orchestrator can
/// classify unrecoverable pages without looking at the transport.
pub trait PageExtractor: Send + Sync {
    fn extract<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CompanyPage, FetchError>> + Send + 'a>>;
}

/// Production extractor: fetch the page over the transport, then parse it.
#[derive(Clone)]
pub struct HtmlPageExtractor {
    transport: Transport,
}

impl HtmlPageExtractor {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

impl PageExtractor for HtmlPageExtractor {
    fn extract<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CompanyPage, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self.transport.fetch(url).await?;
            if classify_status(response.status) != StatusClass::Success {
                return Err(FetchError::Status {
                    status: response.status,
                });
            }
            Ok(parse_company_page(&response.body, url))
        })
    }
}

/// Parse a company page. Missing blocks produce empty fields; the only hard
/// requirement on the caller's side is the identifier pair, checked via
/// `page.meta.company_id`.
pub fn parse_company_page(html: &str, url: &str) -> CompanyPage {
    let document = Html::parse_document(html);

    let mut meta = CompanyRef::unknown(url);
    if let Some(div) = document.select(&ID_DIV).next() {
        meta.company_id = div.value().attr("data-company-id").map(str::to_owned);
        meta.warehouse_id = div.value().attr("data-warehouse-id").map(str::to_owned);
    }

    let mut summary = BTreeMap::new();
    let mut quick_ratios = BTreeMap::new();
    if let Some(h1) = document.select(&H1).next() {
        let name = element_text(h1);
        if !name.is_empty() {
            meta.company_name = Some(name.clone());
            summary.insert(String::from("company_name"), name);
        }
    }
    for item in document.select(&RATIO_ITEM) {
        let (Some(name), Some(value)) = (
            item.select(&RATIO_NAME).next(),
            item.select(&RATIO_VALUE).next(),
        ) else {
            continue;
        };
        let name = element_text(name);
        let value = element_text(value);
        quick_ratios.insert(name.clone(), maybe_number_text(&value));
        summary.insert(name, value);
    }

    let mut tables = BTreeMap::new();
    for (key, heading) in TABLE_SECTIONS {
        tables.insert(key.to_owned(), extract_table(&document, heading));
    }

    let analysis = Analysis {
        pros: document.select(&PROS).map(element_text).collect(),
        cons: document.select(&CONS).map(element_text).collect(),
        about: document
            .select(&ABOUT)
            .next()
            .map(element_text)
            .unwrap_or_default(),
    };

    CompanyPage {
        meta,
        summary,
        quick_ratios,
        tables,
        analysis,
    }
}

/// Wide rows of the first `<table>` that follows a heading containing
/// `heading_text` (case-insensitive). The first column is renamed `Item`;
/// rows with no values outside `Item` are dropped.
fn extract_table(document: &Html, heading_text: &str) -> Vec<BTreeMap<String, Value>> {
    let Some(table) = table_after_heading(document, heading_text) else {
        return Vec::new();
    };

    let mut headers: Vec<String> = table
        .select(&HEADER_ROW)
        .next()
        .map(|tr| tr.select(&HEADER_CELL).map(element_text).collect())
        .unwrap_or_default();
    if let Some(first) = headers.first_mut() {
        *first = String::from("Item");
    }

    let mut rows = Vec::new();
    for tr in table.select(&BODY_ROW) {
        let mut cells: Vec<String> = tr.select(&DATA_CELL).map(element_text).collect();
        if cells.is_empty() {
            continue;
        }
        // No <thead>: the first body row doubles as the header.
        if headers.is_empty() {
            headers = cells;
            headers[0] = String::from("Item");
            continue;
        }
        cells.resize(headers.len(), String::new());

        let mut row = BTreeMap::new();
        let mut has_values = false;
        for (header, cell) in headers.iter().zip(cells.iter()) {
            if header == "Item" {
                row.insert(header.clone(), Value::String(cell.trim().to_owned()));
            } else {
                let value = maybe_number_text(cell);
                has_values |= !value.is_null();
                row.insert(header.clone(), value);
            }
        }
        if has_values || headers.len() == 1 {
            rows.push(row);
        }
    }
    rows
}

/// First `<table>` appearing after a matching h2/h3/h4, in document order.
fn table_after_heading<'a>(document: &'a Html, heading_text: &str) -> Option<ElementRef<'a>> {
    let needle = heading_text.to_lowercase();
    let mut past_heading = false;
    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        match element.value().name() {
            "h2" | "h3" | "h4" if !past_heading => {
                if element_text(element).to_lowercase().contains(&needle) {
                    past_heading = true;
                }
            }
            "table" if past_heading => return Some(element),
            _ => {}
        }
    }
    None
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
