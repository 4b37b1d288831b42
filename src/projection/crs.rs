//! Coordinate reference systems understood by the filter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProjectionError;

/// Hemisphere of a UTM zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    North,
    South,
}

/// A coordinate reference system tag carried by every position.
///
/// `Wgs84` is geographic (x = longitude, y = latitude, in degrees).
/// `Utm` is projected, with linear units in meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    Wgs84,
    Utm { zone: u8, hemisphere: Hemisphere },
}

impl Crs {
    /// Build a UTM system, validating the zone number
    pub fn utm(zone: u8, hemisphere: Hemisphere) -> Result<Self, ProjectionError> {
        if !(1..=60).contains(&zone) {
            return Err(ProjectionError::InvalidZone(zone));
        }
        Ok(Crs::Utm { zone, hemisphere })
    }

    /// Standard UTM zone for a geographic location
    pub fn utm_for(lon: f64, lat: f64) -> Result<Self, ProjectionError> {
        if !lon.is_finite() || !lat.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ProjectionError::OutOfDomain { x: lon, y: lat });
        }
        let zone = (((lon + 180.0) / 6.0).floor() as i64).clamp(0, 59) as u8 + 1;
        let hemisphere = if lat >= 0.0 {
            Hemisphere::North
        } else {
            Hemisphere::South
        };
        Self::utm(zone, hemisphere)
    }

    /// True for systems measured in linear units
    pub fn is_projected(&self) -> bool {
        matches!(self, Crs::Utm { .. })
    }

    /// EPSG code for this system
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::Utm {
                zone,
                hemisphere: Hemisphere::North,
            } => 32600 + *zone as u32,
            Crs::Utm {
                zone,
                hemisphere: Hemisphere::South,
            } => 32700 + *zone as u32,
        }
    }

    /// Parse a bare EPSG code
    pub fn from_epsg(code: u32) -> Result<Self, ProjectionError> {
        match code {
            4326 => Ok(Crs::Wgs84),
            32601..=32660 => Self::utm((code - 32600) as u8, Hemisphere::North),
            32701..=32760 => Self::utm((code - 32700) as u8, Hemisphere::South),
            _ => Err(ProjectionError::UnsupportedCrs(format!("EPSG:{}", code))),
        }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::Wgs84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        let code: u32 = code
            .parse()
            .map_err(|_| ProjectionError::UnsupportedCrs(s.to_string()))?;
        Self::from_epsg(code)
    }
}

impl TryFrom<String> for Crs {
    type Error = ProjectionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}
