//! Buffer-containment filter in a projected system.

use std::f64::consts::TAU;

use geo::{BoundingRect, Coord, Distance, Euclidean, Intersects, LineString, Polygon};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::candidates::CandidateSet;
use super::units::Miles;
use super::{Match, ProximityQuery};
use crate::error::ProximityError;
use crate::projection::Position;

/// Vertices per buffer ring (16 per quadrant)
pub const DEFAULT_SEGMENTS: usize = 64;

/// Positions this close to the circle (meters) count as on it
const BOUNDARY_TOLERANCE_M: f64 = 1e-6;

/// Disk polygon covering every point within `radius` of `center`.
///
/// The polygon is circumscribed: edge midpoints touch the circle, so no
/// point of the disk falls outside it.
pub fn buffer_disk(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let step = TAU / segments as f64;
    let vertex_radius = radius / (step / 2.0).cos();
    let mut ring: Vec<Coord<f64>> = (0..segments)
        .map(|i| {
            let theta = step * i as f64;
            let (sin, cos) = theta.sin_cos();
            Coord {
                x: center.x + vertex_radius * cos,
                y: center.y + vertex_radius * sin,
            }
        })
        .collect();

    // Close the ring
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }

    Polygon::new(LineString::new(ring), vec![])
}

/// Keeps candidates that fall inside (or on) a disk buffered around the reference.
///
/// The buffer polygon narrows the candidates; the exact planar distance
/// to the center decides membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedBufferContainment {
    pub segments: usize,
}

impl Default for ProjectedBufferContainment {
    fn default() -> Self {
        Self {
            segments: DEFAULT_SEGMENTS,
        }
    }
}

impl ProjectedBufferContainment {
    pub fn new(segments: usize) -> Result<Self, ProximityError> {
        if segments < 3 {
            return Err(ProximityError::InvalidSegments(segments));
        }
        Ok(Self { segments })
    }
}

impl ProximityQuery for ProjectedBufferContainment {
    fn query<'a>(
        &self,
        reference: &Position,
        candidates: &'a CandidateSet,
        radius: Miles,
    ) -> Result<Vec<Match<'a>>, ProximityError> {
        let radius = radius.validate()?;
        if self.segments < 3 {
            return Err(ProximityError::InvalidSegments(self.segments));
        }

        // Buffering lon/lat degrees would stretch the disk with latitude
        if !reference.crs.is_projected() {
            return Err(ProximityError::NotProjected(reference.crs));
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

        let center = reference.coord();
        let radius_m = radius.to_meters();

        let indices: Vec<usize> = if radius_m == 0.0 {
            candidates
                .locate([center.x, center.y], [center.x, center.y])
                .into_iter()
                .filter(|&i| candidates.get(i).is_some_and(|c| c.position.coord() == center))
                .collect()
        } else {
            let disk = buffer_disk(center, radius_m, self.segments);
            match disk.bounding_rect() {
                Some(rect) => candidates
                    .locate([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
                    .into_iter()
                    .filter(|&i| {
                        candidates.get(i).is_some_and(|c| {
                            let point = c.position.point();
                            let distance = Euclidean.distance(reference.point(), point);
                            disk.intersects(&point) && distance <= radius_m + BOUNDARY_TOLERANCE_M
                        })
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        let matches: Vec<Match<'a>> = indices
            .into_iter()
            .filter_map(|index| {
                candidates.get(index).map(|candidate| Match {
                    index,
                    candidate,
                    distance_mi: None,
                })
            })
            .collect();

        debug!(
            "Buffer query at ({}, {}) r={} mi ({:.1} m) in {}: {} of {} candidates",
            center.x,
            center.y,
            radius,
            radius_m,
            reference.crs,
            matches.len(),
            candidates.len()
        );

        Ok(matches)
    }
}
