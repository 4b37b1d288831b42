//! Positions tagged with their coordinate reference system.

use geo::{Coord, Point};
use serde::{Deserialize, Serialize};

use super::crs::Crs;
use super::utm;
use crate::error::ProjectionError;

/// A 2D position that always knows which system it lives in.
///
/// For `Crs::Wgs84`, `x` is longitude and `y` is latitude (degrees).
/// For projected systems both are meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub crs: Crs,
}

impl Position {
    /// Geographic position from longitude/latitude degrees
    pub fn geographic(lon: f64, lat: f64) -> Self {
        Self {
            x: lon,
            y: lat,
            crs: Crs::Wgs84,
        }
    }

    /// Position in an arbitrary system
    pub fn new(x: f64, y: f64, crs: Crs) -> Self {
        Self { x, y, crs }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.x,
            y: self.y,
        }
    }

    pub fn point(&self) -> Point<f64> {
        Point::from(self.coord())
    }

    /// Convert this position into `target`.
    ///
    /// UTM to UTM conversions pass through WGS84.
    pub fn reproject(&self, target: Crs) -> Result<Position, ProjectionError> {
        if self.crs == target {
            return Ok(*self);
        }
        if !self.is_finite() {
            return Err(ProjectionError::OutOfDomain {
                x: self.x,
                y: self.y,
            });
        }

        let (lon, lat) = match self.crs {
            Crs::Wgs84 => (self.x, self.y),
            Crs::Utm { zone, hemisphere } => utm::inverse(self.x, self.y, zone, hemisphere),
        };

        match target {
            Crs::Wgs84 => Ok(Position::geographic(lon, lat)),
            Crs::Utm { zone, hemisphere } => {
                if !(utm::MIN_LAT..=utm::MAX_LAT).contains(&lat) || !(-180.0..=180.0).contains(&lon)
                {
                    return Err(ProjectionError::OutOfDomain { x: lon, y: lat });
                }
                let (x, y) = utm::forward(lon, lat, zone, hemisphere);
                Ok(Position::new(x, y, target))
            }
        }
    }

    /// Longitude/latitude of this position, for display
    pub fn to_lon_lat(&self) -> Result<(f64, f64), ProjectionError> {
        let geo = self.reproject(Crs::Wgs84)?;
        Ok((geo.x, geo.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Hemisphere;

    #[test]
    fn test_identity_reprojection() {
        let p = Position::geographic(-118.25, 34.05);
        assert_eq!(p.reproject(Crs::Wgs84).unwrap(), p);
    }

    #[test]
    fn test_reproject_round_trip() {
        let utm11 = Crs::utm(11, Hemisphere::North).unwrap();
        let p = Position::geographic(-118.25, 34.05);
        let projected = p.reproject(utm11).unwrap();
        assert_eq!(projected.crs, utm11);
        assert!(projected.x > 300_000.0 && projected.x < 500_000.0);

        let back = projected.reproject(Crs::Wgs84).unwrap();
        assert!((back.x - p.x).abs() < 1e-8);
        assert!((back.y - p.y).abs() < 1e-8);
    }

    #[test]
    fn test_utm_to_utm_via_geographic() {
        let utm10 = Crs::utm(10, Hemisphere::North).unwrap();
        let utm11 = Crs::utm(11, Hemisphere::North).unwrap();
        let p = Position::geographic(-120.0, 36.0);
        let in_10 = p.reproject(utm10).unwrap();
        let in_11 = in_10.reproject(utm11).unwrap();
        let (lon, lat) = in_11.to_lon_lat().unwrap();
        assert!((lon + 120.0).abs() < 1e-7);
        assert!((lat - 36.0).abs() < 1e-7);
    }

    #[test]
    fn test_rejects_polar_and_non_finite() {
        let utm11 = Crs::utm(11, Hemisphere::North).unwrap();
        assert!(Position::geographic(-118.0, 89.0).reproject(utm11).is_err());
        assert!(Position::geographic(f64::NAN, 34.0)
            .reproject(utm11)
            .is_err());
    }
}
