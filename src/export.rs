//! Mailing-list export and map preview shapes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::OnceLock;

use crate::projection::Crs;
use crate::proximity::Miles;

/// One line of the exported mailing list.
///
/// `x`/`y` are longitude/latitude for geographic exports and meters for
/// projected ones; the header names follow the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailingRow {
    pub address: String,
    #[serde(alias = "longitude")]
    pub x: f64,
    #[serde(alias = "latitude")]
    pub y: f64,
    #[serde(default)]
    pub distance: Option<f64>,
}

fn header(crs: Crs, with_distance: bool) -> Vec<&'static str> {
    let mut columns = if crs.is_projected() {
        vec!["address", "x", "y"]
    } else {
        vec!["address", "longitude", "latitude"]
    };
    if with_distance {
        columns.push("distance");
    }
    columns
}

/// Write rows as CSV in the order given
pub fn write_csv<W: Write>(
    rows: &[MailingRow],
    crs: Crs,
    with_distance: bool,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header(crs, with_distance))?;

    for row in rows {
        let mut record = vec![row.address.clone(), row.x.to_string(), row.y.to_string()];
        if with_distance {
            record.push(row.distance.map(|d| d.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Render rows to an in-memory CSV document
pub fn to_csv_string(
    rows: &[MailingRow],
    crs: Crs,
    with_distance: bool,
) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_csv(rows, crs, with_distance, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Parse an exported mailing list back into rows
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<MailingRow>, csv::Error> {
    csv::Reader::from_reader(reader).deserialize().collect()
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static pattern"))
}

/// File name embedding the school label and radius, e.g. `Belmont_High_0.5mi.csv`
pub fn export_filename(label: &str, radius: Miles) -> String {
    let label = label.trim();
    let label = if label.is_empty() { "school" } else { label };
    let spaced = label.replace(' ', "_");
    let safe = unsafe_chars().replace_all(&spaced, "_");
    format!("{}_{}mi.csv", safe, radius)
}

/// A point for the map preview, always WGS84
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// GeoJSON-like feature collection for map rendering
#[derive(Debug, Serialize, Deserialize)]
pub struct MapPreview {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub geo_type: String,
    /// [lon, lat]
    pub coordinates: [f64; 2],
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_mi: Option<f64>,
}

impl MapPreview {
    pub fn new(points: impl IntoIterator<Item = (MapPoint, String, Option<f64>)>) -> Self {
        let features = points
            .into_iter()
            .map(|(point, address, distance_mi)| Feature {
                feature_type: "Feature".to_string(),
                geometry: Geometry {
                    geo_type: "Point".to_string(),
                    coordinates: [point.longitude, point.latitude],
                },
                properties: FeatureProperties {
                    address,
                    distance_mi,
                },
            })
            .collect();

        Self {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }
}
