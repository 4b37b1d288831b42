//! Candidate collection with an R-tree over positions.

use rstar::{RTree, RTreeObject, AABB};
use tracing::{info, warn};

use crate::error::ProximityError;
use crate::models::CandidateAddress;
use crate::projection::Crs;

/// Wrapper for R-tree indexing of candidate positions
#[derive(Debug, Clone)]
struct IndexedCandidate {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for IndexedCandidate {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// An immutable set of candidate addresses sharing one coordinate system.
///
/// Input order is preserved; lookups return indices in ascending order.
pub struct CandidateSet {
    candidates: Vec<CandidateAddress>,
    crs: Option<Crs>,
    tree: RTree<IndexedCandidate>,
}

impl CandidateSet {
    /// Build the set, failing if the candidates use more than one system
    pub fn new(candidates: Vec<CandidateAddress>) -> Result<Self, ProximityError> {
        let crs = match candidates.first() {
            Some(first) => {
                let first = first.position.crs;
                if let Some(other) = candidates
                    .iter()
                    .map(|c| c.position.crs)
                    .find(|crs| *crs != first)
                {
                    return Err(ProximityError::MixedCrs { first, other });
                }
                Some(first)
            }
            None => None,
        };

        let indexed: Vec<IndexedCandidate> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.position.is_finite())
            .map(|(index, c)| IndexedCandidate {
                index,
                position: [c.position.x, c.position.y],
            })
            .collect();

        let unindexed = candidates.len() - indexed.len();
        if unindexed > 0 {
            warn!(
                "{} candidates have non-finite positions and will never match",
                unindexed
            );
        }

        let tree = RTree::bulk_load(indexed);
        info!(
            "Candidate index built with {} entries ({})",
            tree.size(),
            crs.map(|c| c.to_string()).unwrap_or_else(|| "empty".into())
        );

        Ok(Self {
            candidates,
            crs,
            tree,
        })
    }

    /// Shared coordinate system, `None` for an empty set
    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CandidateAddress> {
        self.candidates.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateAddress> {
        self.candidates.iter()
    }

    pub fn as_slice(&self) -> &[CandidateAddress] {
        &self.candidates
    }

    /// Indices of candidates inside the box, in input order
    pub fn locate(&self, min: [f64; 2], max: [f64; 2]) -> Vec<usize> {
        let envelope = AABB::from_corners(min, max);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|ic| ic.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Indices of every indexed candidate, in input order
    pub fn all_indices(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self.tree.iter().map(|ic| ic.index).collect();
        all.sort_unstable();
        all
    }

    /// Copy of this set in another coordinate system
    ///
    /// Candidates outside the target projection's domain are dropped and counted.
    pub fn reproject(&self, crs: Crs) -> Result<CandidateSet, ProximityError> {
        let candidates: Vec<CandidateAddress> = self
            .candidates
            .iter()
            .filter_map(|c| c.reproject(crs).ok())
            .collect();

        let dropped = self.candidates.len() - candidates.len();
        if dropped > 0 {
            warn!("Dropped {} candidates that cannot be placed in {}", dropped, crs);
        }

        CandidateSet::new(candidates)
    }
}
