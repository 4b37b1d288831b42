//! Proximity queries: which candidates lie within a radius of a reference point.
//!
//! Two strategies answer the same question. [`GreatCircleRadius`] measures
//! haversine distance on lon/lat degrees; [`ProjectedBufferContainment`]
//! buffers the reference point into a disk in a meters-based projection and
//! tests containment. Both return matches in candidate input order.

mod buffer;
mod candidates;
mod great_circle;
mod units;

pub use buffer::{buffer_disk, ProjectedBufferContainment, DEFAULT_SEGMENTS};
pub use candidates::CandidateSet;
pub use great_circle::{haversine_miles, GreatCircleRadius, EARTH_RADIUS_MI};
pub use units::{Miles, METERS_PER_MILE};

use serde::Serialize;

use crate::error::{ProjectionError, ProximityError};
use crate::models::CandidateAddress;
use crate::projection::{Crs, Position};

/// A candidate that passed the filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<'a> {
    /// Position of the candidate in its set
    pub index: usize,
    pub candidate: &'a CandidateAddress,
    /// Great-circle distance, when the strategy measures one
    pub distance_mi: Option<f64>,
}

/// The shared proximity-query capability
pub trait ProximityQuery {
    /// Candidates within `radius` of `reference`, in input order.
    ///
    /// Fails if the reference and candidates are in different systems, or
    /// if the system is not the one this strategy works in.
    fn query<'a>(
        &self,
        reference: &Position,
        candidates: &'a CandidateSet,
        radius: Miles,
    ) -> Result<Vec<Match<'a>>, ProximityError>;
}

/// Proximity strategy chosen at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ProximityFilter {
    GreatCircleRadius(GreatCircleRadius),
    ProjectedBufferContainment(ProjectedBufferContainment),
}

impl ProximityFilter {
    pub fn great_circle() -> Self {
        ProximityFilter::GreatCircleRadius(GreatCircleRadius)
    }

    pub fn buffer(segments: usize) -> Result<Self, ProximityError> {
        Ok(ProximityFilter::ProjectedBufferContainment(
            ProjectedBufferContainment::new(segments)?,
        ))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProximityFilter::GreatCircleRadius(_) => "great_circle",
            ProximityFilter::ProjectedBufferContainment(_) => "buffer",
        }
    }

    /// Whether this strategy reports a distance per match
    pub fn measures_distance(&self) -> bool {
        matches!(self, ProximityFilter::GreatCircleRadius(_))
    }

    /// Coordinate system the datasets must be in for this strategy.
    ///
    /// The buffer strategy uses `preferred` if it is projected, otherwise the
    /// UTM zone of `anchor` (lon, lat).
    pub fn working_crs(
        &self,
        preferred: Option<Crs>,
        anchor: (f64, f64),
    ) -> Result<Crs, ProjectionError> {
        match self {
            ProximityFilter::GreatCircleRadius(_) => Ok(Crs::Wgs84),
            ProximityFilter::ProjectedBufferContainment(_) => match preferred {
                Some(crs) if crs.is_projected() => Ok(crs),
                _ => Crs::utm_for(anchor.0, anchor.1),
            },
        }
    }
}

impl Default for ProximityFilter {
    fn default() -> Self {
        ProximityFilter::great_circle()
    }
}

impl ProximityQuery for ProximityFilter {
    fn query<'a>(
        &self,
        reference: &Position,
        candidates: &'a CandidateSet,
        radius: Miles,
    ) -> Result<Vec<Match<'a>>, ProximityError> {
        match self {
            ProximityFilter::GreatCircleRadius(f) => f.query(reference, candidates, radius),
            ProximityFilter::ProjectedBufferContainment(f) => {
                f.query(reference, candidates, radius)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Hemisphere;

    #[test]
    fn test_working_crs() {
        let anchor = (-118.25, 34.05);
        assert_eq!(
            ProximityFilter::great_circle()
                .working_crs(None, anchor)
                .unwrap(),
            Crs::Wgs84
        );

        let buffer = ProximityFilter::buffer(DEFAULT_SEGMENTS).unwrap();
        assert_eq!(
            buffer.working_crs(None, anchor).unwrap(),
            Crs::utm(11, Hemisphere::North).unwrap()
        );
        let zone10 = Crs::utm(10, Hemisphere::North).unwrap();
        assert_eq!(buffer.working_crs(Some(zone10), anchor).unwrap(), zone10);
        assert_eq!(
            buffer.working_crs(Some(Crs::Wgs84), anchor).unwrap(),
            Crs::utm(11, Hemisphere::North).unwrap()
        );
    }

    #[test]
    fn test_enum_delegates() {
        let candidates = CandidateSet::new(vec![CandidateAddress::new(
            "1 Main St",
            Position::geographic(-118.25, 34.05),
        )])
        .unwrap();
        let reference = Position::geographic(-118.25, 34.05);

        let matches = ProximityFilter::great_circle()
            .query(&reference, &candidates, Miles(0.25))
            .unwrap();
        assert_eq!(matches.len(), 1);

        // Buffer strategy refuses degrees
        assert!(ProximityFilter::buffer(DEFAULT_SEGMENTS)
            .unwrap()
            .query(&reference, &candidates, Miles(0.25))
            .is_err());
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&ProximityFilter::buffer(32).unwrap()).unwrap();
        assert_eq!(json, r#"{"strategy":"projected_buffer_containment","segments":32}"#);
    }
}
