//! Read-only data store for schools and addresses.
//!
//! Built once at startup and never mutated; queries borrow from it.

mod loader;

pub use loader::{load_points, open_dataset, read_points};

use hashbrown::HashMap;
use tracing::{info, warn};

use crate::config::DatasetConfig;
use crate::error::{DatasetError, ProximityError};
use crate::models::{CandidateAddress, ReferencePoint};
use crate::projection::Crs;
use crate::proximity::CandidateSet;

pub struct DataStore {
    references: Vec<ReferencePoint>,
    by_label: HashMap<String, usize>,
    labels: Vec<String>,
    candidates: CandidateSet,
    crs: Crs,
}

impl DataStore {
    /// Load both datasets named in the config.
    ///
    /// Addresses declared in another system are reprojected into the
    /// schools' system so the store has exactly one.
    pub fn load(config: &DatasetConfig) -> Result<Self, DatasetError> {
        info!("Loading schools from {}", config.schools.display());
        let references = load_points(
            &config.schools,
            "label",
            config.schools_crs,
            ReferencePoint::new,
        )?;

        info!("Loading addresses from {}", config.addresses.display());
        let mut candidates = load_points(
            &config.addresses,
            "address",
            config.addresses_crs,
            CandidateAddress::new,
        )?;

        if config.addresses_crs != config.schools_crs {
            info!(
                "Reprojecting {} addresses from {} to {}",
                candidates.len(),
                config.addresses_crs,
                config.schools_crs
            );
            let before = candidates.len();
            candidates = candidates
                .iter()
                .filter_map(|c| c.reproject(config.schools_crs).ok())
                .collect();
            if candidates.len() < before {
                warn!(
                    "Skipped {} addresses that cannot be placed in {}",
                    before - candidates.len(),
                    config.schools_crs
                );
            }
        }

        Self::from_parts(references, candidates)
    }

    /// Build a store from in-memory collections.
    ///
    /// The first occurrence of a duplicate label wins.
    pub fn from_parts(
        references: Vec<ReferencePoint>,
        candidates: Vec<CandidateAddress>,
    ) -> Result<Self, DatasetError> {
        let candidates = CandidateSet::new(candidates)?;
        Self::with_candidate_set(references, candidates)
    }

    fn with_candidate_set(
        references: Vec<ReferencePoint>,
        candidates: CandidateSet,
    ) -> Result<Self, DatasetError> {
        let crs = references
            .first()
            .map(|r| r.position.crs)
            .or(candidates.crs())
            .unwrap_or_default();

        if let Some(other) = references
            .iter()
            .map(|r| r.position.crs)
            .find(|c| *c != crs)
        {
            return Err(ProximityError::MixedCrs { first: crs, other }.into());
        }
        if let Some(candidate_crs) = candidates.crs() {
            if candidate_crs != crs {
                return Err(ProximityError::CrsMismatch {
                    reference: crs,
                    candidates: candidate_crs,
                }
                .into());
            }
        }

        let mut by_label = HashMap::with_capacity(references.len());
        let mut kept = Vec::with_capacity(references.len());
        let mut duplicates = 0usize;
        for reference in references {
            if by_label.contains_key(&reference.label) {
                duplicates += 1;
                continue;
            }
            by_label.insert(reference.label.clone(), kept.len());
            kept.push(reference);
        }
        if duplicates > 0 {
            warn!("Ignored {} schools with duplicate labels", duplicates);
        }

        let mut labels: Vec<String> = kept.iter().map(|r| r.label.clone()).collect();
        labels.sort();

        info!(
            "Data store ready: {} schools, {} addresses ({})",
            kept.len(),
            candidates.len(),
            crs
        );

        Ok(Self {
            references: kept,
            by_label,
            labels,
            candidates,
            crs,
        })
    }

    /// The same data in another coordinate system.
    ///
    /// Rows the target projection cannot represent are dropped with a warning.
    pub fn into_crs(self, crs: Crs) -> Result<Self, DatasetError> {
        if crs == self.crs {
            return Ok(self);
        }
        info!("Reprojecting data store from {} to {}", self.crs, crs);
        let references: Vec<ReferencePoint> = self
            .references
            .iter()
            .filter_map(|r| match r.reproject(crs) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!("Dropping school '{}': {}", r.label, e);
                    None
                }
            })
            .collect();
        let candidates = self.candidates.reproject(crs)?;
        Self::with_candidate_set(references, candidates)
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// School labels, sorted and unique
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn reference(&self, label: &str) -> Option<&ReferencePoint> {
        self.by_label.get(label).map(|&i| &self.references[i])
    }

    pub fn references(&self) -> &[ReferencePoint] {
        &self.references
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Mean lon/lat of the schools, used to pick a projection zone
    pub fn anchor(&self) -> Option<(f64, f64)> {
        let points: Vec<(f64, f64)> = self
            .references
            .iter()
            .filter_map(|r| r.position.to_lon_lat().ok())
            .collect();
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sum_lon, sum_lat) = points
            .iter()
            .fold((0.0, 0.0), |(a, b), (lon, lat)| (a + lon, b + lat));
        Some((sum_lon / n, sum_lat / n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{Hemisphere, Position};
    use std::fs;

    fn school(label: &str, lon: f64, lat: f64) -> ReferencePoint {
        ReferencePoint::new(label, Position::geographic(lon, lat))
    }

    fn address(text: &str, lon: f64, lat: f64) -> CandidateAddress {
        CandidateAddress::new(text, Position::geographic(lon, lat))
    }

    #[test]
    fn test_labels_sorted_and_first_duplicate_wins() {
        let store = DataStore::from_parts(
            vec![
                school("Roosevelt High", -118.21, 34.04),
                school("Belmont High", -118.26, 34.07),
                school("Roosevelt High", -100.0, 40.0),
            ],
            vec![address("1 Main St", -118.25, 34.05)],
        )
        .unwrap();

        assert_eq!(store.labels(), &["Belmont High", "Roosevelt High"]);
        assert_eq!(
            store.reference("Roosevelt High").unwrap().position,
            Position::geographic(-118.21, 34.04)
        );
        assert!(store.reference("Nowhere").is_none());
    }

    #[test]
    fn test_rejects_mismatched_collections() {
        let utm = Crs::utm(11, Hemisphere::North).unwrap();
        let result = DataStore::from_parts(
            vec![school("A", -118.25, 34.05)],
            vec![CandidateAddress::new(
                "1 Main St",
                Position::new(385_000.0, 3_768_000.0, utm),
            )],
        );
        assert!(matches!(
            result,
            Err(DatasetError::Proximity(ProximityError::CrsMismatch { .. }))
        ));
    }

    #[test]
    fn test_into_crs_and_anchor() {
        let store = DataStore::from_parts(
            vec![school("A", -118.20, 34.00), school("B", -118.30, 34.10)],
            vec![address("1 Main St", -118.25, 34.05)],
        )
        .unwrap();

        let (lon, lat) = store.anchor().unwrap();
        assert!((lon + 118.25).abs() < 1e-9 && (lat - 34.05).abs() < 1e-9);

        let utm = Crs::utm(11, Hemisphere::North).unwrap();
        let projected = store.into_crs(utm).unwrap();
        assert_eq!(projected.crs(), utm);
        assert_eq!(projected.candidates().crs(), Some(utm));
        assert_eq!(projected.reference("A").unwrap().position.crs, utm);

        let (lon, lat) = projected.anchor().unwrap();
        assert!((lon + 118.25).abs() < 1e-6 && (lat - 34.05).abs() < 1e-6);
    }

    #[test]
    fn test_load_from_files_with_mixed_declared_systems() {
        let dir = tempfile::tempdir().unwrap();
        let schools = dir.path().join("schools.csv");
        let addresses = dir.path().join("addresses.csv");
        fs::write(&schools, "label,lon,lat\nCity Hall,-118.2437,34.0522\n").unwrap();
        fs::write(
            &addresses,
            "address,x,y\n200 N Spring St,385214.0,3768641.0\nbroken,,\n",
        )
        .unwrap();

        let config = DatasetConfig {
            schools,
            addresses,
            schools_crs: Crs::Wgs84,
            addresses_crs: Crs::utm(11, Hemisphere::North).unwrap(),
        };
        let store = DataStore::load(&config).unwrap();
        assert_eq!(store.crs(), Crs::Wgs84);
        assert_eq!(store.candidates().len(), 1);
        let c = store.candidates().get(0).unwrap();
        assert!((c.position.x + 118.2437).abs() < 1e-4);
        assert!((c.position.y - 34.0522).abs() < 1e-4);
    }

    #[test]
    fn test_into_crs_drops_rows_outside_projection() {
        let store = DataStore::from_parts(
            vec![school("City Hall", -118.2437, 34.0522), school("Polar", -118.0, 85.0)],
            vec![
                address("1 Main St", -118.25, 34.05),
                address("north", -118.25, 88.0),
            ],
        )
        .unwrap();

        let utm = Crs::utm(11, Hemisphere::North).unwrap();
        let projected = store.into_crs(utm).unwrap();
        assert_eq!(projected.labels(), &["City Hall"]);
        assert_eq!(projected.candidates().len(), 1);
        assert_eq!(projected.candidates().get(0).unwrap().address, "1 Main St");
    }

    #[test]
    fn test_load_skips_swapped_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let schools = dir.path().join("schools.csv");
        let addresses = dir.path().join("addresses.csv");
        fs::write(&schools, "label,lon,lat\nCity Hall,-118.2437,34.0522\n").unwrap();
        fs::write(
            &addresses,
            "address,lon,lat\n200 N Spring St,-118.2430,34.0530\nswapped,34.05,-118.25\n",
        )
        .unwrap();

        let config = DatasetConfig {
            schools,
            addresses,
            schools_crs: Crs::Wgs84,
            addresses_crs: Crs::Wgs84,
        };
        let store = DataStore::load(&config).unwrap();
        assert_eq!(store.candidates().len(), 1);

        let projected = store
            .into_crs(Crs::utm(11, Hemisphere::North).unwrap())
            .unwrap();
        assert_eq!(projected.candidates().len(), 1);
    }

    #[test]
    fn test_load_fails_when_file_missing() {
        let config = DatasetConfig {
            schools: "/nonexistent/schools.csv".into(),
            ..DatasetConfig::default()
        };
        assert!(matches!(
            DataStore::load(&config),
            Err(DatasetError::Open { .. })
        ));
    }
}
