//! Spreadsheet ingestion.
//!
//! Two layouts are understood:
//!
//! - wide: a `DT` timestamp column plus one temperature column per logger
//! - narrow: a `DT` column plus a single `<animal_id>` column, as written by
//!   the per-animal split
//!
//! Unparsable timestamps drop the whole row; empty or unparsable temperature
//! cells drop just that reading. A narrow file that cannot be used at all is
//! reported and skipped by [`load_narrow_sources`].

use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::timestamp::parse_timestamp;
use rumenkernel_temporal::{AnalysisReport, AnimalSeries, SkipReason, TemperatureSample};

/// Name of the timestamp column.
pub const TIMESTAMP_COLUMN: &str = "DT";

/// Counters from one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Data rows read.
    pub rows: usize,
    /// Rows dropped for an unparsable timestamp.
    pub skipped_rows: usize,
    /// Temperature cells dropped as empty or unparsable.
    pub skipped_cells: usize,
}

/// Whether a header names a logger column rather than a time/bookkeeping one.
///
/// The match is case-sensitive: `hour_of_day` is excluded, `Hourly_S1` is not.
pub fn is_animal_column(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(TIMESTAMP_COLUMN)
        && !name.contains("hour")
        && !name.contains("date")
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input)
}

fn timestamp_index(headers: &StringRecord) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == TIMESTAMP_COLUMN)
        .ok_or_else(|| IngestError::missing([TIMESTAMP_COLUMN]))
}

fn parse_temperature(cell: Option<&str>) -> Option<f64> {
    cell.filter(|c| !c.is_empty())
        .and_then(|c| c.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Read a wide table into one series per logger column.
pub fn read_wide<R: Read>(input: R) -> Result<(Vec<AnimalSeries>, IngestStats)> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    let ts_idx = timestamp_index(&headers)?;

    let columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != ts_idx && is_animal_column(name))
        .map(|(i, name)| (i, name.to_string()))
        .collect();
    if columns.is_empty() {
        return Err(IngestError::missing(["<animal columns>"]));
    }

    let mut samples: Vec<Vec<TemperatureSample>> = vec![Vec::new(); columns.len()];
    let mut stats = IngestStats::default();

    for record in rdr.records() {
        let record = record?;
        stats.rows += 1;
        let Some(timestamp) = record.get(ts_idx).and_then(parse_timestamp) else {
            stats.skipped_rows += 1;
            continue;
        };
        for (slot, (idx, _)) in samples.iter_mut().zip(&columns) {
            match parse_temperature(record.get(*idx)) {
                Some(value) => slot.push(TemperatureSample::new(timestamp, value)),
                None => stats.skipped_cells += 1,
            }
        }
    }

    let series: Vec<AnimalSeries> = columns
        .into_iter()
        .zip(samples)
        .map(|((_, id), s)| AnimalSeries::new(id, s))
        .collect();

    info!(
        animals = series.len(),
        rows = stats.rows,
        skipped_rows = stats.skipped_rows,
        "wide table ingested"
    );
    Ok((series, stats))
}

/// Read a wide table from a file.
pub fn read_wide_path(path: impl AsRef<Path>) -> Result<(Vec<AnimalSeries>, IngestStats)> {
    let file = std::fs::File::open(path.as_ref())?;
    read_wide(std::io::BufReader::new(file))
}

/// Read a narrow single-animal table. The animal id is the first logger
/// column header.
pub fn read_narrow<R: Read>(input: R) -> Result<(AnimalSeries, IngestStats)> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();

    let ts_idx = headers.iter().position(|h| h == TIMESTAMP_COLUMN);
    let id_col = headers
        .iter()
        .enumerate()
        .find(|(i, name)| Some(*i) != ts_idx && is_animal_column(name))
        .map(|(i, name)| (i, name.to_string()));

    let (ts_idx, (id_idx, animal_id)) = match (ts_idx, id_col) {
        (Some(t), Some(c)) => (t, c),
        (None, Some(_)) => return Err(IngestError::missing([TIMESTAMP_COLUMN])),
        (Some(_), None) => return Err(IngestError::missing(["<animal_id>"])),
        (None, None) => return Err(IngestError::missing([TIMESTAMP_COLUMN, "<animal_id>"])),
    };

    let mut samples = Vec::new();
    let mut stats = IngestStats::default();
    for record in rdr.records() {
        let record = record?;
        stats.rows += 1;
        let Some(timestamp) = record.get(ts_idx).and_then(parse_timestamp) else {
            stats.skipped_rows += 1;
            continue;
        };
        match parse_temperature(record.get(id_idx)) {
            Some(value) => samples.push(TemperatureSample::new(timestamp, value)),
            None => stats.skipped_cells += 1,
        }
    }

    debug!(animal_id = %animal_id, samples = samples.len(), "narrow table ingested");
    Ok((AnimalSeries::new(animal_id, samples), stats))
}

/// Read a narrow table from a file.
pub fn read_narrow_path(path: impl AsRef<Path>) -> Result<(AnimalSeries, IngestStats)> {
    let file = std::fs::File::open(path.as_ref())?;
    read_narrow(std::io::BufReader::new(file))
}

/// Narrow sources gathered from a file or directory.
#[derive(Debug, Default)]
pub struct SourceSet {
    /// Series that loaded.
    pub series: Vec<AnimalSeries>,
    /// One report per file that could not be used.
    pub skipped: Vec<AnalysisReport>,
}

/// Load one narrow CSV, or every `*.csv` in a directory in name order.
///
/// Only a missing input or an unlistable directory is an error. Each file
/// that fails to load becomes a skipped report keyed by its file stem, and
/// loading carries on with the next file.
pub fn load_narrow_sources(input: impl AsRef<Path>) -> Result<SourceSet> {
    let input = input.as_ref();
    let files = if std::fs::metadata(input)?.is_dir() {
        csv_files(input)?
    } else {
        vec![input.to_path_buf()]
    };

    let mut set = SourceSet::default();
    for file in files {
        match read_narrow_path(&file) {
            Ok((series, stats)) => {
                if stats.skipped_rows > 0 || stats.skipped_cells > 0 {
                    debug!(
                        file = %file.display(),
                        skipped_rows = stats.skipped_rows,
                        skipped_cells = stats.skipped_cells,
                        "readings dropped"
                    );
                }
                set.series.push(series);
            }
            Err(err) => {
                let report = AnalysisReport::skipped(source_stem(&file), source_skip(&file, err));
                for d in &report.diagnostics {
                    warn!("{d}");
                }
                set.skipped.push(report);
            }
        }
    }

    info!(
        loaded = set.series.len(),
        skipped = set.skipped.len(),
        "narrow sources loaded"
    );
    Ok(set)
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    Ok(files)
}

fn source_stem(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn source_skip(file: &Path, err: IngestError) -> SkipReason {
    match err {
        IngestError::MissingColumns(columns) => SkipReason::MissingColumns { columns },
        other => SkipReason::SourceUnreadable {
            file: file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            cause: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDE: &str = "\
DT,hour,S0012,S0013,record_date
2023-05-01 00:00:00,0,39.1,38.7,x
2023-05-01 00:05:00,0,39.2,,x
not a time,0,39.3,38.8,x
2023-05-01 00:15:00,0,oops,38.9,x
";

    #[test]
    fn test_is_animal_column() {
        assert!(is_animal_column("S0012"));
        assert!(!is_animal_column("DT"));
        assert!(!is_animal_column("DT_local"));
        assert!(!is_animal_column("hour"));
        assert!(!is_animal_column("record_date"));
        assert!(!is_animal_column(""));
        // Case-sensitive: capitalised names are logger columns.
        assert!(is_animal_column("Hourly_S1"));
        assert!(is_animal_column("Date_S2"));
    }

    #[test]
    fn test_read_wide() {
        let (series, stats) = read_wide(WIDE.as_bytes()).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].animal_id, "S0012");
        assert_eq!(series[0].len(), 2);
        assert_eq!(series[1].animal_id, "S0013");
        assert_eq!(series[1].len(), 2);
        assert_eq!(series[1].samples[1].value, 38.9);

        assert_eq!(stats.rows, 4);
        assert_eq!(stats.skipped_rows, 1);
        assert_eq!(stats.skipped_cells, 2);
    }

    #[test]
    fn test_wide_missing_timestamp() {
        let err = read_wide("time,S1\n2023-05-01 00:00:00,39\n".as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumns(ref c) if c[0] == "DT"));
    }

    #[test]
    fn test_read_narrow() {
        let csv = "DT,S0012\n2023-05-01 00:05:00,39.2\n2023-05-01 00:00:00,39.1\n";
        let (series, stats) = read_narrow(csv.as_bytes()).unwrap();
        assert_eq!(series.animal_id, "S0012");
        // Sorted on load.
        assert_eq!(series.samples[0].value, 39.1);
        assert_eq!(stats.rows, 2);
    }

    #[test]
    fn test_narrow_missing_columns() {
        let err = read_narrow("DT\n2023-05-01 00:00:00\n".as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumns(_)));

        let err = read_narrow("S0012\n39.0\n".as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "Missing required columns: DT");
    }

    #[test]
    fn test_read_wide_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.csv");
        std::fs::write(&path, WIDE).unwrap();
        let (series, _) = read_wide_path(&path).unwrap();
        assert_eq!(series.len(), 2);

        assert!(matches!(
            read_wide_path(dir.path().join("absent.csv")),
            Err(IngestError::Io(_))
        ));
    }

    #[test]
    fn test_load_narrow_sources_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("S0001.csv"),
            "DT,S0001\n2023-05-01 00:00:00,39.1\n2023-05-01 00:05:00,39.2\n",
        )
        .unwrap();
        // Invalid UTF-8 in a data row.
        std::fs::write(
            dir.path().join("S0002.csv"),
            b"DT,S0002\n2023-05-01 00:00:00,39\xff\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("S0003.csv"), "DT\n2023-05-01 00:00:00\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a source").unwrap();

        let set = load_narrow_sources(dir.path()).unwrap();

        assert_eq!(set.series.len(), 1);
        assert_eq!(set.series[0].animal_id, "S0001");
        assert_eq!(set.series[0].len(), 2);

        assert_eq!(set.skipped.len(), 2);
        let unreadable = &set.skipped[0];
        assert_eq!(unreadable.animal_id, "S0002");
        assert!(matches!(
            unreadable.diagnostics[0].reason,
            SkipReason::SourceUnreadable { ref file, .. } if file == "S0002.csv"
        ));
        assert!(unreadable.diagnostics[0]
            .to_string()
            .starts_with("animal S0002: cannot read S0002.csv: CSV error"));

        let missing = &set.skipped[1];
        assert_eq!(missing.animal_id, "S0003");
        assert!(matches!(
            missing.diagnostics[0].reason,
            SkipReason::MissingColumns { ref columns } if columns == &["<animal_id>".to_string()]
        ));
    }

    #[test]
    fn test_load_narrow_sources_single_file_and_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S0012.csv");
        std::fs::write(&path, "DT,S0012\n2023-05-01 00:00:00,39.1\n").unwrap();

        let set = load_narrow_sources(&path).unwrap();
        assert_eq!(set.series.len(), 1);
        assert!(set.skipped.is_empty());

        assert!(matches!(
            load_narrow_sources(dir.path().join("absent")),
            Err(IngestError::Io(_))
        ));
    }
}
