//! Result export.
//!
//! Every output is first laid out as a [`Table`], then written row-oriented
//! (CSV) or column-major (JSON). Undefined values become empty CSV cells and
//! JSON `null`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IngestError, Result};
use crate::ingest::TIMESTAMP_COLUMN;
use crate::timestamp::format_timestamp;
use rumenkernel_temporal::{
    types::{animal_group, percentile_label},
    AnalysisReport, AnimalSeries, CosinorFit, CosinorRecord, CurveSeries, Diagnostic, DrinkEvent,
    FitStatus, PercentileReading,
};

/// File suffix of cosinor feature tables.
pub const COSINOR_SUFFIX: &str = "_cosinor_features";
/// File suffix of drinking behaviour tables.
pub const DRINK_SUFFIX: &str = "_drinking_behavior";
/// Extension of column-major JSON files.
pub const COLUMNAR_EXTENSION: &str = "columns.json";

// ============================================================================
// Tables
// ============================================================================

/// A single table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Text value.
    Text(String),
    /// Floating-point value; `NaN` is undefined.
    Float(f64),
    /// Integer value.
    Int(i64),
}

impl Cell {
    fn to_csv(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Float(v) if v.is_finite() => v.to_string(),
            Cell::Float(_) => String::new(),
            Cell::Int(v) => v.to_string(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Int(v) => Value::from(*v),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<u32> for Cell {
    fn from(v: u32) -> Self {
        Cell::Int(i64::from(v))
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        Cell::Int(v as i64)
    }
}

/// A header plus rows of cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Column names.
    pub headers: Vec<String>,
    /// Rows, each as long as `headers`.
    pub rows: Vec<Vec<Cell>>,
}

/// A column-major rendering of a [`Table`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnarTable {
    /// Row count.
    pub rows: usize,
    /// Columns in header order.
    pub columns: Vec<Column>,
}

/// One column of a [`ColumnarTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Values, one per row.
    pub values: Vec<Value>,
}

impl Table {
    /// Create an empty table with the given header.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, output: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(output);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(Cell::to_csv))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Column-major rendering.
    pub fn to_columnar(&self) -> ColumnarTable {
        let columns = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, name)| Column {
                name: name.clone(),
                values: self
                    .rows
                    .iter()
                    .map(|row| row.get(i).map(Cell::to_json).unwrap_or(Value::Null))
                    .collect(),
            })
            .collect();
        ColumnarTable {
            rows: self.rows.len(),
            columns,
        }
    }

    /// Write the column-major rendering as pretty JSON.
    pub fn write_columnar<W: Write>(&self, output: W) -> Result<()> {
        serde_json::to_writer_pretty(output, &self.to_columnar())?;
        Ok(())
    }

    /// Write CSV to `path`, creating or truncating it.
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_csv(std::io::BufWriter::new(file))
    }

    /// Write column-major JSON to `path`, creating or truncating it.
    pub fn save_columnar(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut writer = std::io::BufWriter::new(file);
        self.write_columnar(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// Record Layouts
// ============================================================================

/// Cosinor feature table. Percentile columns follow the order of `percentiles`.
pub fn cosinor_table(records: &[CosinorRecord], percentiles: &[f64]) -> Table {
    let mut headers: Vec<String> = [
        "group",
        "animal_id",
        "record_date",
        "record_num",
        "M",
        "A",
        "phi",
        "r_squared",
        "fit_status",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for p in percentiles {
        let label = percentile_label(*p);
        headers.push(format!("percent_{label}_min"));
        headers.push(format!("percent_{label}_max"));
    }

    let mut table = Table {
        headers,
        rows: Vec::with_capacity(records.len()),
    };
    for record in records {
        let mut row: Vec<Cell> = vec![
            record.group.as_str().into(),
            record.animal_id.as_str().into(),
            record.record_date.to_string().into(),
            record.record_num.into(),
            record.fit.mesor.into(),
            record.fit.amplitude.into(),
            record.fit.acrophase.into(),
            record.fit.r_squared.into(),
            fit_status_name(record.fit.status).into(),
        ];
        for (i, _) in percentiles.iter().enumerate() {
            let reading = record.percentiles.get(i);
            row.push(reading.map_or(f64::NAN, |r| r.low).into());
            row.push(reading.map_or(f64::NAN, |r| r.high).into());
        }
        table.rows.push(row);
    }
    table
}

/// Drinking behaviour table.
pub fn drink_table(events: &[DrinkEvent]) -> Table {
    let mut table = Table::new([
        TIMESTAMP_COLUMN,
        "hour",
        "drink_temp",
        "before_5min_temp",
        "before_10min_temp",
        "before_drink_temp",
        "after_drink_recover",
        "recover_time",
        "drop_time",
        "logger_code",
    ]);
    table.rows = events
        .iter()
        .map(|e| {
            vec![
                format_timestamp(&e.trough_timestamp).into(),
                e.hour.into(),
                e.trough_temp.into(),
                e.temp_5min_before_trough.into(),
                e.temp_10min_before_trough.into(),
                e.pre_drink_peak_temp.into(),
                e.post_drink_recovery_temp.into(),
                e.recovery_minutes.into(),
                e.drop_duration_minutes.into(),
                e.source_id.as_str().into(),
            ]
        })
        .collect();
    table
}

/// Narrow single-animal series table (`DT`, `<animal_id>`).
pub fn series_table(series: &AnimalSeries) -> Table {
    let mut table = Table::new([TIMESTAMP_COLUMN, series.animal_id.as_str()]);
    table.rows = series
        .samples
        .iter()
        .map(|s| vec![format_timestamp(&s.timestamp).into(), s.value.into()])
        .collect();
    table
}

/// Diagnostics table.
pub fn diagnostics_table(diagnostics: &[Diagnostic]) -> Table {
    let mut table = Table::new(["animal_id", "date", "path", "reason"]);
    table.rows = diagnostics
        .iter()
        .map(|d| {
            vec![
                d.animal_id.as_str().into(),
                d.date.map(|x| x.to_string()).unwrap_or_default().into(),
                d.path.map(|p| p.to_string()).unwrap_or_default().into(),
                d.reason.to_string().into(),
            ]
        })
        .collect();
    table
}

/// Long-format curve table (`label`, `hour`, `value`).
pub fn curve_table(curves: &[CurveSeries]) -> Table {
    let mut table = Table::new(["label", "hour", "value"]);
    for curve in curves {
        for (h, v) in curve.hours.iter().zip(&curve.values) {
            table
                .rows
                .push(vec![curve.label.as_str().into(), (*h).into(), (*v).into()]);
        }
    }
    table
}

fn fit_status_name(status: FitStatus) -> &'static str {
    match status {
        FitStatus::Converged => "converged",
        FitStatus::NotConverged => "not_converged",
        FitStatus::InsufficientData => "insufficient_data",
        FitStatus::Degenerate => "degenerate",
    }
}

fn parse_fit_status(name: &str) -> Option<FitStatus> {
    match name {
        "converged" => Some(FitStatus::Converged),
        "not_converged" => Some(FitStatus::NotConverged),
        "insufficient_data" => Some(FitStatus::InsufficientData),
        "degenerate" => Some(FitStatus::Degenerate),
        _ => None,
    }
}

// ============================================================================
// Reading Cosinor Tables Back
// ============================================================================

/// Read a cosinor feature table written by [`cosinor_table`].
///
/// Rows with an unparsable date are dropped. Without a `fit_status` column a
/// row counts as converged when all of `M`, `A` and `phi` are present.
pub fn read_cosinor_csv<R: Read>(input: R) -> Result<Vec<CosinorRecord>> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(input);
    let headers = rdr.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h == name);

    let required = ["animal_id", "record_date", "record_num", "M", "A", "phi"];
    let missing: Vec<&str> = required.iter().copied().filter(|c| find(c).is_none()).collect();
    if !missing.is_empty() {
        return Err(IngestError::missing(missing));
    }
    // Checked above.
    let idx = |name: &str| find(name).unwrap_or_default();

    let percentile_columns: Vec<(f64, usize, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let label = h.strip_prefix("percent_")?.strip_suffix("_min")?;
            let high = find(&format!("percent_{label}_max"))?;
            let p = label.parse::<f64>().ok()? / 100.0;
            Some((p, i, high))
        })
        .collect();

    let float = |record: &csv::StringRecord, i: Option<usize>| -> f64 {
        i.and_then(|i| record.get(i))
            .and_then(|c| c.parse::<f64>().ok())
            .unwrap_or(f64::NAN)
    };

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let Some(record_date) = row
            .get(idx("record_date"))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        let animal_id = row.get(idx("animal_id")).unwrap_or_default().to_string();

        let (mesor, amplitude, acrophase) = (
            float(&row, find("M")),
            float(&row, find("A")),
            float(&row, find("phi")),
        );
        let status = find("fit_status")
            .and_then(|i| row.get(i))
            .and_then(parse_fit_status)
            .unwrap_or(if mesor.is_finite() && amplitude.is_finite() && acrophase.is_finite() {
                FitStatus::Converged
            } else {
                FitStatus::NotConverged
            });

        records.push(CosinorRecord {
            group: find("group")
                .and_then(|i| row.get(i))
                .map(str::to_string)
                .unwrap_or_else(|| animal_group(&animal_id)),
            record_num: row
                .get(idx("record_num"))
                .and_then(|c| c.parse().ok())
                .unwrap_or_default(),
            animal_id,
            record_date,
            fit: CosinorFit {
                mesor,
                amplitude,
                acrophase,
                r_squared: float(&row, find("r_squared")),
                iterations: 0,
                status,
            },
            percentiles: percentile_columns
                .iter()
                .map(|&(percentile, lo, hi)| PercentileReading {
                    percentile,
                    low: float(&row, Some(lo)),
                    high: float(&row, Some(hi)),
                })
                .collect(),
        });
    }
    Ok(records)
}

/// Read a cosinor feature table from a file.
pub fn read_cosinor_path(path: impl AsRef<Path>) -> Result<Vec<CosinorRecord>> {
    let file = std::fs::File::open(path.as_ref())?;
    read_cosinor_csv(std::io::BufReader::new(file))
}

// ============================================================================
// Output Directory Writers
// ============================================================================

/// Writes per-animal result files into an output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    out_dir: PathBuf,
    columnar: bool,
}

impl ReportWriter {
    /// Create a writer for `out_dir`. The directory must exist.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            columnar: true,
        }
    }

    /// Toggle the column-major JSON companions.
    pub fn with_columnar(mut self, columnar: bool) -> Self {
        self.columnar = columnar;
        self
    }

    /// Output directory.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write cosinor and drink tables for one animal; returns the paths written.
    ///
    /// A table with no rows is not written.
    pub fn write_report(&self, report: &AnalysisReport, percentiles: &[f64]) -> Result<Vec<PathBuf>> {
        let id = &report.animal_id;
        let mut written = Vec::new();

        if report.cosinor_records.is_empty() {
            tracing::warn!(animal_id = %id, "no valid cosinor records extracted");
        } else {
            let cosinor = cosinor_table(&report.cosinor_records, percentiles);
            written.extend(self.write_table(&format!("{id}{COSINOR_SUFFIX}"), &cosinor)?);
        }

        if report.drink_events.is_empty() {
            tracing::warn!(animal_id = %id, "no drink events detected");
        } else {
            let drinks = drink_table(&report.drink_events);
            written.extend(self.write_table(&format!("{id}{DRINK_SUFFIX}"), &drinks)?);
        }

        tracing::debug!(animal_id = %id, files = written.len(), "report written");
        Ok(written)
    }

    /// Write one narrow CSV per animal, named `<animal_id>.csv`.
    pub fn write_split(&self, series: &[AnimalSeries]) -> Result<Vec<PathBuf>> {
        series
            .iter()
            .map(|s| {
                let path = self.out_dir.join(format!("{}.csv", s.animal_id));
                series_table(s).save_csv(&path)?;
                Ok(path)
            })
            .collect()
    }

    /// Write `<stem>.csv` and, when enabled, `<stem>.columns.json`.
    pub fn write_table(&self, stem: &str, table: &Table) -> Result<Vec<PathBuf>> {
        let csv_path = self.out_dir.join(format!("{stem}.csv"));
        table.save_csv(&csv_path)?;
        let mut written = vec![csv_path];
        if self.columnar {
            let json_path = self.out_dir.join(format!("{stem}.{COLUMNAR_EXTENSION}"));
            table.save_columnar(&json_path)?;
            written.push(json_path);
        }
        Ok(written)
    }
}
