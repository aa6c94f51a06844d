//! Grid loader: comma-separated records, one header line then one base cell
//! per line.
//!
//! Column order:
//!   id, field_capacity_mean, station_count, slope_class, porosity_mean,
//!   wilting_point, moist_threshold, intermediate_threshold, dry_threshold
//!
//! `id` is the flattened row-major base index. Any malformed line fails the
//! whole load.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::attributes::SoilAttributes;
use crate::error::{PyramidError, Result};

/// Column count of a record line.
pub const COLUMNS: usize = 9;

const FIELD_NAMES: [&str; COLUMNS] = [
    "id",
    "field_capacity_mean",
    "station_count",
    "slope_class",
    "porosity_mean",
    "wilting_point",
    "moist_threshold",
    "intermediate_threshold",
    "dry_threshold",
];

/// One loaded base cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    pub id: u64,
    pub attributes: SoilAttributes,
}

/// Read every record from `path`.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<CellRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    log::info!("reading grid records from {}", path.display());
    read_records(BufReader::new(file))
}

/// Read every record from an already-open source. The first line is the
/// header and is discarded; blank lines are skipped.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<CellRecord>> {
    let mut lines = reader.lines();
    match lines.next() {
        Some(header) => {
            header?;
        }
        None => return Err(PyramidError::MissingHeader),
    }

    let mut records = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        // Header is line 1.
        let line_no = i + 2;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_record(&line, line_no)?);
    }
    log::debug!("parsed {} grid records", records.len());
    Ok(records)
}

/// Parse one record line. `line_no` is only used for error reporting.
pub fn parse_record(line: &str, line_no: usize) -> Result<CellRecord> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != COLUMNS {
        return Err(PyramidError::ColumnCount {
            line: line_no,
            expected: COLUMNS,
            found: fields.len(),
        });
    }

    let attributes = SoilAttributes {
        field_capacity_mean: field(&fields, 1, line_no)?,
        station_count: field(&fields, 2, line_no)?,
        slope_class: field(&fields, 3, line_no)?,
        porosity_mean: field(&fields, 4, line_no)?,
        wilting_point: field(&fields, 5, line_no)?,
        moist_threshold: field(&fields, 6, line_no)?,
        intermediate_threshold: field(&fields, 7, line_no)?,
        dry_threshold: field(&fields, 8, line_no)?,
    };
    Ok(CellRecord {
        id: field(&fields, 0, line_no)?,
        attributes,
    })
}

fn field<T: FromStr>(fields: &[&str], column: usize, line_no: usize) -> Result<T> {
    fields[column].parse().map_err(|_| PyramidError::InvalidField {
        line: line_no,
        field: FIELD_NAMES[column],
        value: fields[column].to_string(),
    })
}
