use crate::domain::record::{CategoricalField, FeatureVector, HistoricalRecord};
use crate::resolve::error::BuildError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use encoding_rs::WINDOWS_1252;
use std::collections::HashMap;

pub const DATE_COLUMN: &str = "date";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Parse dataset bytes into historical records. ZIP archives (bulk portal
/// exports come zipped) are unpacked and the first `.csv` entry inside is
/// used; anything else is treated as plain CSV.
///
/// A missing header column, or a blank/unparseable required cell in any row,
/// is a build-time data-quality fault (`BuildError::MissingColumn`) and fails
/// the whole parse; a partially read dataset never reaches the index builder.
pub fn parse_dataset(bytes: &[u8]) -> Result<Vec<HistoricalRecord>> {
    if bytes.starts_with(ZIP_MAGIC) {
        return parse_csv(&unzip_first_csv(bytes)?);
    }
    parse_csv(bytes)
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<HistoricalRecord>> {
    let text = decode_text(bytes);
    let mut reader = csv::Reader::from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .context("read dataset header row failed")?
        .clone();
    let columns: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim(), idx))
        .collect();

    for field in CategoricalField::ALL {
        if !columns.contains_key(field.as_str()) {
            return Err(missing_column(field.as_str()));
        }
    }
    if !columns.contains_key(DATE_COLUMN) {
        return Err(missing_column(DATE_COLUMN));
    }
    for column in FeatureVector::COLUMNS {
        if !columns.contains_key(column) {
            return Err(missing_column(column));
        }
    }

    let mut out = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        // Header is line 1; data starts at line 2.
        let line = idx + 2;
        let row = row.with_context(|| format!("read dataset line {line} failed"))?;
        let record =
            parse_row(&columns, &row).with_context(|| format!("dataset line {line} invalid"))?;
        out.push(record);
    }

    tracing::debug!(rows = out.len(), "dataset parsed");
    Ok(out)
}

fn parse_row(
    columns: &HashMap<&str, usize>,
    row: &csv::StringRecord,
) -> Result<HistoricalRecord> {
    let date_text = required_text(columns, row, DATE_COLUMN)?;
    let date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{date_text}'"))?;

    Ok(HistoricalRecord {
        state: required_text(columns, row, CategoricalField::State.as_str())?,
        district: required_text(columns, row, CategoricalField::District.as_str())?,
        market: required_text(columns, row, CategoricalField::Market.as_str())?,
        commodity: required_text(columns, row, CategoricalField::Commodity.as_str())?,
        variety: required_text(columns, row, CategoricalField::Variety.as_str())?,
        grade: required_text(columns, row, CategoricalField::Grade.as_str())?,
        date,
        features: FeatureVector {
            price_spread: required_f64(columns, row, "price_spread")?,
            price_spread_ratio: required_f64(columns, row, "price_spread_ratio")?,
            modal_to_min_ratio: required_f64(columns, row, "modal_to_min_ratio")?,
            modal_to_max_ratio: required_f64(columns, row, "modal_to_max_ratio")?,
            commodity_price_zscore: required_f64(columns, row, "commodity_price_zscore")?,
            market_avg_price: required_f64(columns, row, "market_avg_price")?,
            state_avg_price: required_f64(columns, row, "state_avg_price")?,
            market_price_deviation: required_f64(columns, row, "market_price_deviation")?,
            lag_1: required_f64(columns, row, "lag_1")?,
            lag_7: required_f64(columns, row, "lag_7")?,
            pct_change_7: required_f64(columns, row, "pct_change_7")?,
            month: required_u32(columns, row, "month")?,
            week: required_u32(columns, row, "week")?,
            month_sin: required_f64(columns, row, "month_sin")?,
            month_cos: required_f64(columns, row, "month_cos")?,
        },
    })
}

fn required_text(
    columns: &HashMap<&str, usize>,
    row: &csv::StringRecord,
    column: &str,
) -> Result<String> {
    let idx = columns
        .get(column)
        .copied()
        .ok_or_else(|| missing_column(column))?;
    match row.get(idx).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(missing_column(column)),
    }
}

fn required_f64(
    columns: &HashMap<&str, usize>,
    row: &csv::StringRecord,
    column: &str,
) -> Result<f64> {
    let text = required_text(columns, row, column)?;
    text.parse::<f64>()
        .with_context(|| format!("column '{column}' has non-numeric value '{text}'"))
}

fn required_u32(
    columns: &HashMap<&str, usize>,
    row: &csv::StringRecord,
    column: &str,
) -> Result<u32> {
    // Exports sometimes carry integral columns as "6.0".
    let v = required_f64(columns, row, column)?;
    Ok(v as u32)
}

fn missing_column(column: &str) -> anyhow::Error {
    anyhow::Error::new(BuildError::MissingColumn {
        column: column.to_string(),
    })
}

/// Raw exports are not reliably UTF-8; regional market names show up in
/// Windows-1252. Try strict UTF-8 first and fall back.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (cow, _, _) = WINDOWS_1252.decode(bytes);
            cow.into_owned()
        }
    }
}

/// Pull the CSV out of a dataset archive. Prefers the first `.csv` entry,
/// falling back to the first entry of any name.
fn unzip_first_csv(zip_bytes: &[u8]) -> Result<Vec<u8>> {
    use std::io::{Cursor, Read};

    let reader = Cursor::new(zip_bytes);
    let mut zip = zip::ZipArchive::new(reader).context("open dataset archive failed")?;
    anyhow::ensure!(zip.len() >= 1, "dataset archive has no entries");

    let mut csv_idx: Option<usize> = None;
    for i in 0..zip.len() {
        let name = {
            let entry = zip.by_index(i).context("open archive entry failed")?;
            entry.name().to_string()
        };
        if name.to_ascii_lowercase().ends_with(".csv") {
            csv_idx = Some(i);
            break;
        }
    }
    let idx = csv_idx.unwrap_or(0);

    let mut entry = zip.by_index(idx).context("open archive entry failed")?;
    let mut buf = Vec::new();
    entry
        .read_to_end(&mut buf)
        .context("read archive entry failed")?;
    Ok(buf)
}
