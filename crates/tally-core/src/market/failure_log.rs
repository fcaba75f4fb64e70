//! Append-only failure log for the market updater.
//!
//! One line per failure, comma separated:
//! `SYMBOL,FREQ,START,END,EMPTY_INITIAL` for an empty initial load and
//! `SYMBOL,FREQ,ERROR,<reason>` for anything else. The file is not locked;
//! concurrent writers from separate processes may interleave lines.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use time::Date;

use crate::domain::Frequency;

#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an initial load that returned no bars at all.
    pub fn append_empty_initial(
        &self,
        symbol: &str,
        freq: Frequency,
        start: Date,
        end: Date,
    ) -> std::io::Result<()> {
        self.append_line(&format!("{symbol},{freq},{start},{end},EMPTY_INITIAL"))
    }

    /// Record a per-symbol error. Newlines in the reason are flattened so the
    /// log stays one line per failure.
    pub fn append_error(&self, symbol: &str, freq: Frequency, reason: &str) -> std::io::Result<()> {
        let reason = reason.replace(['\n', '\r'], " ");
        self.append_line(&format!("{symbol},{freq},ERROR,{reason}"))
    }

    /// Distinct `(symbol, frequency)` pairs in the log, sorted. Only the first
    /// two fields of each line matter; unparseable lines are skipped. A
    /// missing file is an empty log.
    pub fn load_pairs(&self) -> std::io::Result<Vec<(String, Frequency)>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut pairs = BTreeSet::new();
        for line in contents.lines() {
            let mut fields = line.split(',');
            let (Some(symbol), Some(freq)) = (fields.next(), fields.next()) else {
                continue;
            };
            let symbol = symbol.trim();
            let Ok(freq) = Frequency::from_str(freq.trim()) else {
                continue;
            };
            if !symbol.is_empty() {
                pairs.insert((symbol.to_owned(), freq));
            }
        }
        Ok(pairs.into_iter().collect())
    }

    /// Empty the log. Reprocessing truncates before re-running so fresh
    /// failures can re-append.
    pub fn truncate(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, "")
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}
