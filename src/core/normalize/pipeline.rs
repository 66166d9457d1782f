//! CSV to CSV normalization and lookups
//!
//! The input is read and resolved one chunk at a time. Output rows carry
//! the leading input columns followed by the flattened candidate fields and
//! the error columns. Resolved rows are spooled to a temporary file until
//! the input ends, so the header holds every candidate field of the run.

use super::address::{AddressReader, AddressRow};
use super::lookup::BatchLookup;
use super::normalizer::BatchNormalizer;
use super::{NormalizedRow, RowOutcome};
use crate::adapters::georef::PointQuery;
use crate::domain::{EntityType, GeorefError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{Duration, Instant};

const ERROR_COLUMNS: [&str; 2] = ["error_status", "error_reason"];

/// Counts of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeSummary {
    pub total: usize,
    pub normalized: usize,
    pub not_found: usize,
    pub errored: usize,
    #[serde(skip)]
    pub duration: Duration,
}

impl NormalizeSummary {
    fn record(&mut self, outcome: &RowOutcome) {
        self.total += 1;
        match outcome {
            RowOutcome::Normalized(_) => self.normalized += 1,
            RowOutcome::NotFound => self.not_found += 1,
            RowOutcome::Errored { .. } => self.errored += 1,
        }
    }

    /// Whether every row got an answer from the API
    pub fn is_complete(&self) -> bool {
        self.errored == 0
    }

    pub fn log_summary(&self) {
        tracing::info!(
            total = self.total,
            normalized = self.normalized,
            not_found = self.not_found,
            errored = self.errored,
            duration_secs = self.duration.as_secs(),
            "Normalization completed"
        );
    }
}

#[derive(Serialize, Deserialize)]
struct SpooledRow {
    leading: Vec<String>,
    cells: BTreeMap<String, String>,
}

/// Writes resolved rows as CSV
///
/// Nothing reaches `output` before [`finish`](Self::finish): rows wait in
/// a temporary file as JSON lines while the candidate columns accumulate.
pub struct NormalizedWriter<W: Write> {
    output: W,
    leading: Vec<String>,
    prefix: Option<String>,
    columns: BTreeSet<String>,
    spool: BufWriter<File>,
}

impl<W: Write> NormalizedWriter<W> {
    /// Writer for address rows, led by the five address columns
    pub fn new(output: W, prefix: Option<String>) -> Result<Self> {
        let leading = AddressRow::default()
            .columns()
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        Self::with_leading(output, leading, prefix)
    }

    /// Writer whose rows start with the `leading` columns
    pub fn with_leading(output: W, leading: Vec<String>, prefix: Option<String>) -> Result<Self> {
        Ok(Self {
            output,
            leading,
            prefix,
            columns: BTreeSet::new(),
            spool: BufWriter::new(tempfile::tempfile()?),
        })
    }

    /// Spools one row: its leading values and the cells of its outcome
    pub fn write_row(&mut self, leading: Vec<String>, outcome: &RowOutcome) -> Result<()> {
        let cells = outcome.cells(self.prefix.as_deref());
        self.columns.extend(
            cells
                .keys()
                .filter(|column| !ERROR_COLUMNS.contains(&column.as_str()))
                .cloned(),
        );

        serde_json::to_writer(&mut self.spool, &SpooledRow { leading, cells })?;
        self.spool.write_all(b"\n")?;
        Ok(())
    }

    pub fn write_chunk(&mut self, rows: &[NormalizedRow]) -> Result<()> {
        for row in rows {
            let leading = row
                .address
                .columns()
                .iter()
                .map(|(_, value)| value.to_string())
                .collect();
            self.write_row(leading, &row.outcome)?;
        }
        Ok(())
    }

    /// Writes the header and every spooled row, then returns the candidate
    /// columns of the header
    pub fn finish(self) -> Result<BTreeSet<String>> {
        let Self {
            output,
            leading,
            columns,
            spool,
            ..
        } = self;

        let mut spool = spool.into_inner().map_err(|e| e.into_error())?;
        spool.seek(SeekFrom::Start(0))?;

        let mut writer = csv::Writer::from_writer(output);
        let header: Vec<&str> = leading
            .iter()
            .chain(&columns)
            .map(String::as_str)
            .chain(ERROR_COLUMNS)
            .collect();
        writer.write_record(&header)?;

        for line in BufReader::new(spool).lines() {
            let row: SpooledRow = serde_json::from_str(&line?)?;
            let cells = columns
                .iter()
                .map(String::as_str)
                .chain(ERROR_COLUMNS)
                .map(|column| row.cells.get(column).map(String::as_str).unwrap_or_default());
            let record: Vec<&str> = row.leading.iter().map(String::as_str).chain(cells).collect();
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(columns)
    }
}

/// Number of data rows of a CSV file
pub fn count_rows(path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_reader(BufReader::new(File::open(path)?));
    let mut record = csv::ByteRecord::new();
    let mut count = 0;
    while reader.read_byte_record(&mut record)? {
        count += 1;
    }
    Ok(count)
}

/// Normalizes `input` into `output`, chunk by chunk
pub async fn normalize_file(
    normalizer: &BatchNormalizer<'_>,
    input: &Path,
    output: &Path,
    chunk_size: usize,
    address_column: &str,
    prefix: Option<String>,
) -> Result<NormalizeSummary> {
    let reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);
    normalize_stream(normalizer, reader, writer, chunk_size, address_column, prefix).await
}

pub(crate) async fn normalize_stream<R: Read, W: Write>(
    normalizer: &BatchNormalizer<'_>,
    input: R,
    output: W,
    chunk_size: usize,
    address_column: &str,
    prefix: Option<String>,
) -> Result<NormalizeSummary> {
    let start = Instant::now();
    let mut reader = AddressReader::new(input, address_column)?;
    let mut writer = NormalizedWriter::new(output, prefix)?;
    let mut summary = NormalizeSummary::default();

    loop {
        let chunk = reader.next_chunk(chunk_size.max(1))?;
        if chunk.is_empty() {
            break;
        }
        let rows = normalizer.normalize_chunk(summary.total, chunk).await?;
        writer.write_chunk(&rows)?;
        for row in &rows {
            summary.record(&row.outcome);
        }
        tracing::info!(processed = normalizer.processed(), "Chunk resolved");
    }

    let columns = writer.finish()?;
    tracing::debug!(columns = columns.len(), "Output written");

    summary.duration = start.elapsed();
    Ok(summary)
}

/// What a lookup run resolves for each input row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupTarget {
    /// Best record of `entity` named by `column`
    Names { entity: EntityType, column: String },
    /// Territorial units containing the point in `lat_column`/`lon_column`
    Points {
        lat_column: String,
        lon_column: String,
    },
}

/// Resolves every row of `input` into `output`, chunk by chunk
///
/// Output rows keep every input column.
pub async fn lookup_file(
    lookup: &BatchLookup<'_>,
    target: &LookupTarget,
    input: &Path,
    output: &Path,
    chunk_size: usize,
    prefix: Option<String>,
) -> Result<NormalizeSummary> {
    let reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);
    lookup_stream(lookup, target, reader, writer, chunk_size, prefix).await
}

pub(crate) async fn lookup_stream<R: Read, W: Write>(
    lookup: &BatchLookup<'_>,
    target: &LookupTarget,
    input: R,
    output: W,
    chunk_size: usize,
    prefix: Option<String>,
) -> Result<NormalizeSummary> {
    let start = Instant::now();
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers()?.clone();
    let position = |column: &str| {
        headers
            .iter()
            .position(|header| header.trim() == column)
            .ok_or_else(|| GeorefError::Validation(format!("Input has no '{column}' column")))
    };
    let indexes = match target {
        LookupTarget::Names { column, .. } => (position(column)?, None),
        LookupTarget::Points {
            lat_column,
            lon_column,
        } => (position(lat_column)?, Some(position(lon_column)?)),
    };

    let leading = headers.iter().map(String::from).collect();
    let mut writer = NormalizedWriter::with_leading(output, leading, prefix)?;
    let mut summary = NormalizeSummary::default();
    let mut records = reader.into_records();

    loop {
        let chunk: Vec<csv::StringRecord> = records
            .by_ref()
            .take(chunk_size.max(1))
            .collect::<std::result::Result<_, _>>()?;
        if chunk.is_empty() {
            break;
        }

        let outcomes = match (target, indexes) {
            (LookupTarget::Names { entity, .. }, (column, _)) => {
                let names = chunk
                    .iter()
                    .map(|record| record.get(column).unwrap_or_default().to_string())
                    .collect();
                lookup.similar(*entity, names).await?
            }
            (LookupTarget::Points { .. }, (lat, lon)) => {
                let coordinate = |record: &csv::StringRecord, index: Option<usize>| {
                    index
                        .and_then(|i| record.get(i))
                        .and_then(|text| text.trim().parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                };
                let points = chunk
                    .iter()
                    .map(|record| PointQuery::new(coordinate(record, Some(lat)), coordinate(record, lon)))
                    .collect();
                lookup.locate(points).await?
            }
        };

        for (record, outcome) in chunk.iter().zip(&outcomes) {
            writer.write_row(record.iter().map(String::from).collect(), outcome)?;
            summary.record(outcome);
        }
        tracing::info!(processed = lookup.processed(), "Chunk resolved");
    }

    writer.finish()?;
    summary.duration = start.elapsed();
    Ok(summary)
}
