//! Transaction file loading
//!
//! CSV files need a header row `id,date,merchant,amount` (any column order);
//! JSON files hold an array of objects with the same fields. Dates are
//! `YYYY-MM-DD`; negative amounts are expenses.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use recur_core::Transaction;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Explicit --format value, else inferred from the file extension (CSV by default)
    pub fn resolve(format: Option<&str>, path: &Path) -> Result<Self> {
        match format.map(|f| f.to_lowercase()) {
            Some(f) if f == "csv" => Ok(Self::Csv),
            Some(f) if f == "json" => Ok(Self::Json),
            Some(f) => bail!("Unknown input format '{}' (expected csv or json)", f),
            None => {
                let is_json = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("json"));
                Ok(if is_json { Self::Json } else { Self::Csv })
            }
        }
    }
}

/// Load transactions from a file
pub fn load_transactions(path: &Path, format: Option<&str>) -> Result<Vec<Transaction>> {
    let format = InputFormat::resolve(format, path)?;
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let transactions = match format {
        InputFormat::Csv => parse_csv(reader),
        InputFormat::Json => parse_json(reader),
    }
    .with_context(|| format!("Failed to read transactions from {}", path.display()))?;

    tracing::debug!(count = transactions.len(), path = %path.display(), "Loaded transactions");
    Ok(transactions)
}

/// Parse CSV with a header row
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut transactions = Vec::new();
    for (i, record) in rdr.deserialize().enumerate() {
        // Row numbers count the header as line 1
        let tx: Transaction = record.with_context(|| format!("Invalid CSV row {}", i + 2))?;
        transactions.push(tx);
    }
    Ok(transactions)
}

/// Parse a JSON array of transactions
pub fn parse_json<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    serde_json::from_reader(reader).context("Invalid transaction JSON")
}
