//! Distance-threshold filter on the sphere.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::candidates::CandidateSet;
use super::units::Miles;
use super::{Match, ProximityQuery};
use crate::error::ProximityError;
use crate::projection::{Crs, Position};

/// Earth's mean radius in statute miles
pub const EARTH_RADIUS_MI: f64 = 3959.0;

/// Widening applied to the prefilter box so rounding never drops a match
const BOX_MARGIN: f64 = 1.01;

/// Great-circle distance in miles between two lon/lat points (degrees).
///
/// Uses the haversine formula on a sphere of radius [`EARTH_RADIUS_MI`].
/// Ellipsoidal flattening is ignored, which costs up to ~0.5% at city scale.
#[inline]
pub fn haversine_miles(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_MI * a.clamp(0.0, 1.0).sqrt().asin()
}

/// Lon/lat box containing every point within `radius` of (lon, lat).
///
/// Returns `None` when the box would wrap a pole or the antimeridian.
fn search_box(lon: f64, lat: f64, radius: Miles) -> Option<([f64; 2], [f64; 2])> {
    let angular = radius.value() / EARTH_RADIUS_MI;
    let lat_delta = angular.to_degrees() * BOX_MARGIN;

    let min_lat = lat - lat_delta;
    let max_lat = lat + lat_delta;
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return None;
    }

    // Widest longitude offset reachable at this angular distance
    let ratio = angular.sin() / lat.to_radians().cos();
    if !(0.0..1.0).contains(&ratio) {
        return None;
    }
    let lon_delta = ratio.asin().to_degrees() * BOX_MARGIN;

    let min_lon = lon - lon_delta;
    let max_lon = lon + lon_delta;
    if min_lon < -180.0 || max_lon > 180.0 {
        return None;
    }

    Some(([min_lon, min_lat], [max_lon, max_lat]))
}

/// Keeps candidates whose haversine distance is at most the radius
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreatCircleRadius;

impl ProximityQuery for GreatCircleRadius {
    fn query<'a>(
        &self,
        reference: &Position,
        candidates: &'a CandidateSet,
        radius: Miles,
    ) -> Result<Vec<Match<'a>>, ProximityError> {
        let radius = radius.validate()?;

        if reference.crs != Crs::Wgs84 {
            return Err(ProximityError::NotGeographic(reference.crs));
        }
        match candidates.crs() {
            None => return Ok(Vec::new()),
            Some(crs) if crs != reference.crs => {
                return Err(ProximityError::CrsMismatch {
                    reference: reference.crs,
                    candidates: crs,
                })
            }
            Some(_) => {}
        }

        let (lon, lat) = (reference.x, reference.y);
        let indices = match search_box(lon, lat, radius) {
            Some((min, max)) => candidates.locate(min, max),
            None => candidates.all_indices(),
        };

        let matches: Vec<Match<'a>> = indices
            .into_iter()
            .filter_map(|index| {
                let candidate = candidates.get(index)?;
                let distance =
                    haversine_miles(lon, lat, candidate.position.x, candidate.position.y);
                (distance <= radius.value()).then_some(Match {
                    index,
                    candidate,
                    distance_mi: Some(distance),
                })
            })
            .collect();

        debug!(
            "Great-circle query at ({}, {}) r={} mi: {} of {} candidates",
            lon,
            lat,
            radius,
            matches.len(),
            candidates.len()
        );

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateAddress;
    use crate::projection::Hemisphere;

    fn set(points: &[(&str, f64, f64)]) -> CandidateSet {
        CandidateSet::new(
            points
                .iter()
                .map(|(a, lon, lat)| CandidateAddress::new(*a, Position::geographic(*lon, *lat)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_haversine_zero_and_symmetric() {
        assert_eq!(haversine_miles(-118.25, 34.05, -118.25, 34.05), 0.0);
        let ab = haversine_miles(-118.25, 34.05, -118.40, 33.94);
        let ba = haversine_miles(-118.40, 33.94, -118.25, 34.05);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Los Angeles to San Francisco, roughly 347 miles
        let d = haversine_miles(-118.2437, 34.0522, -122.4194, 37.7749);
        assert!((d - 347.0).abs() < 5.0, "got {}", d);
    }

    #[test]
    fn test_one_mile_north() {
        let candidates = set(&[("north", 0.0, 1.0 / 69.17)]);
        let reference = Position::geographic(0.0, 0.0);

        let half = GreatCircleRadius
            .query(&reference, &candidates, Miles(0.5))
            .unwrap();
        assert!(half.is_empty());

        let one = GreatCircleRadius
            .query(&reference, &candidates, Miles(1.0))
            .unwrap();
        assert_eq!(one.len(), 1);
        let d = one[0].distance_mi.unwrap();
        assert!((d - 1.0).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_same_point_included_at_zero_radius() {
        let candidates = set(&[("here", -118.25, 34.05)]);
        let reference = Position::geographic(-118.25, 34.05);
        let matches = GreatCircleRadius
            .query(&reference, &candidates, Miles(0.0))
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].distance_mi, Some(0.0));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let candidates = set(&[("edge", -118.24, 34.05)]);
        let reference = Position::geographic(-118.25, 34.05);
        let exact = haversine_miles(-118.25, 34.05, -118.24, 34.05);
        let matches = GreatCircleRadius
            .query(&reference, &candidates, Miles(exact))
            .unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_preserves_input_order() {
        let candidates = set(&[
            ("c", -118.251, 34.05),
            ("far", -117.0, 34.05),
            ("a", -118.249, 34.05),
            ("b", -118.25, 34.051),
        ]);
        let reference = Position::geographic(-118.25, 34.05);
        let matches = GreatCircleRadius
            .query(&reference, &candidates, Miles(0.5))
            .unwrap();
        let names: Vec<&str> = matches.iter().map(|m| m.candidate.address.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_antimeridian_falls_back_to_full_scan() {
        let candidates = set(&[("east", 179.999, 0.0), ("west", -179.999, 0.0)]);
        let reference = Position::geographic(180.0, 0.0);
        let matches = GreatCircleRadius
            .query(&reference, &candidates, Miles(1.0))
            .unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_empty_candidates() {
        let candidates = CandidateSet::new(vec![]).unwrap();
        let matches = GreatCircleRadius
            .query(&Position::geographic(0.0, 0.0), &candidates, Miles(1.0))
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_rejects_projected_input() {
        let utm = Crs::utm(11, Hemisphere::North).unwrap();
        let candidates = set(&[("a", -118.25, 34.05)]);
        let err = GreatCircleRadius
            .query(&Position::new(385_000.0, 3_768_000.0, utm), &candidates, Miles(1.0))
            .err()
            .unwrap();
        assert!(matches!(err, ProximityError::NotGeographic(_)));

        let projected = candidates.reproject(utm).unwrap();
        let err = GreatCircleRadius
            .query(&Position::geographic(-118.25, 34.05), &projected, Miles(1.0))
            .err()
            .unwrap();
        assert!(matches!(err, ProximityError::CrsMismatch { .. }));
    }
}
