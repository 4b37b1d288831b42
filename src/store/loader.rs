//! CSV dataset loading with skip-and-count for malformed rows.

use csv::{ByteRecord, ReaderBuilder};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

use crate::error::DatasetError;
use crate::projection::{Crs, Position};

/// Open a dataset file, transparently decompressing `.gz`
pub fn open_dataset(path: &Path) -> Result<Box<dyn Read>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Column indices for one dataset
#[derive(Debug, Clone, Copy)]
struct Columns {
    name: usize,
    x: usize,
    y: usize,
}

fn normalize_header(h: &str) -> String {
    h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h == name))
}

fn resolve_columns(
    headers: &ByteRecord,
    path: &Path,
    name_column: &str,
    crs: Crs,
) -> Result<Columns, DatasetError> {
    let headers: Vec<String> = headers
        .iter()
        .map(|h| normalize_header(&String::from_utf8_lossy(h)))
        .collect();
    let missing = |column: &str| DatasetError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
    };

    let (x_names, y_names): (&[&str], &[&str]) = if crs.is_projected() {
        (&["x", "easting"], &["y", "northing"])
    } else {
        (&["lon", "longitude", "lng"], &["lat", "latitude"])
    };

    Ok(Columns {
        name: find_column(&headers, &[name_column]).ok_or_else(|| missing(name_column))?,
        x: find_column(&headers, x_names).ok_or_else(|| missing(x_names[0]))?,
        y: find_column(&headers, y_names).ok_or_else(|| missing(y_names[0]))?,
    })
}

fn parse_coordinate(record: &ByteRecord, index: usize) -> Option<f64> {
    record
        .get(index)
        .and_then(|v| std::str::from_utf8(v).ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Lon/lat must lie on the globe; projected values are only checked for finiteness
fn in_domain(x: f64, y: f64, crs: Crs) -> bool {
    crs.is_projected() || ((-180.0..=180.0).contains(&x) && (-90.0..=90.0).contains(&y))
}

/// Read `(name, position)` rows from any reader.
///
/// Rows with a missing, unparseable or out-of-range coordinate are skipped
/// and counted. Names that are not valid UTF-8 are decoded lossily.
pub fn read_points<R: Read, T>(
    reader: R,
    path: &Path,
    name_column: &str,
    crs: Crs,
    make: impl Fn(String, Position) -> T,
) -> Result<Vec<T>, DatasetError> {
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.byte_headers().map_err(csv_err)?.clone();
    let columns = resolve_columns(&headers, path, name_column, crs)?;

    let mut points = Vec::new();
    let mut skipped = 0usize;
    let mut lossy = 0usize;

    for result in csv_reader.byte_records() {
        let record = result.map_err(csv_err)?;

        let (x, y) = match (
            parse_coordinate(&record, columns.x),
            parse_coordinate(&record, columns.y),
        ) {
            (Some(x), Some(y)) if in_domain(x, y, crs) => (x, y),
            _ => {
                skipped += 1;
                continue;
            }
        };

        let raw = record.get(columns.name).unwrap_or_default();
        let name = match std::str::from_utf8(raw) {
            Ok(name) => name.trim().to_string(),
            Err(_) => {
                lossy += 1;
                String::from_utf8_lossy(raw).trim().to_string()
            }
        };
        points.push(make(name, Position::new(x, y, crs)));
    }

    if lossy > 0 {
        warn!(
            "Decoded {} names with invalid UTF-8 in {}",
            lossy,
            path.display()
        );
    }
    if skipped > 0 {
        warn!(
            "Skipped {} rows without a usable position in {}",
            skipped,
            path.display()
        );
    }
    info!(
        "Loaded {} rows from {} ({})",
        points.len(),
        path.display(),
        crs
    );

    Ok(points)
}

/// Open and read a dataset file
pub fn load_points<T>(
    path: &Path,
    name_column: &str,
    crs: Crs,
    make: impl Fn(String, Position) -> T,
) -> Result<Vec<T>, DatasetError> {
    let reader = open_dataset(path)?;
    read_points(reader, path, name_column, crs, make)
}
