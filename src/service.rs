//! Mailer service: one filter pass per user interaction.

use anyhow::{Context, Result};
use std::io::Write;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::QueryError;
use crate::export::{self, MailingRow, MapPoint, MapPreview};
use crate::models::ReferencePoint;
use crate::projection::Crs;
use crate::proximity::{Match, Miles, ProximityFilter, ProximityQuery};
use crate::store::DataStore;

/// Shown when a selection has no addresses
pub const EMPTY_MESSAGE: &str = "No addresses found in that buffer.";

/// Tolerance for matching a radius to a slider step
const STEP_EPSILON: f64 = 1e-9;

/// Radii the interactive surface offers: `min..=max` in `step` increments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusPolicy {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

impl Default for RadiusPolicy {
    fn default() -> Self {
        Self {
            min: 0.25,
            max: 2.0,
            step: 0.25,
            default: 0.5,
        }
    }
}

impl RadiusPolicy {
    pub fn new(min: f64, max: f64, step: f64, default: f64) -> Result<Self, QueryError> {
        if !(min.is_finite() && max.is_finite() && step.is_finite() && default.is_finite()) {
            return Err(QueryError::InvalidPolicy("values must be finite".into()));
        }
        if min < 0.0 || min > max {
            return Err(QueryError::InvalidPolicy(format!(
                "min {} must be between 0 and max {}",
                min, max
            )));
        }
        if step <= 0.0 {
            return Err(QueryError::InvalidPolicy(format!(
                "step {} must be positive",
                step
            )));
        }
        let policy = Self {
            min,
            max,
            step,
            default,
        };
        policy
            .check(default)
            .map_err(|_| QueryError::InvalidPolicy(format!("default {} is not a step", default)))?;
        Ok(policy)
    }

    /// Accept `radius` if it is one of the offered steps
    pub fn check(&self, radius: f64) -> Result<Miles, QueryError> {
        let out_of_range = || QueryError::RadiusOutOfRange {
            radius,
            min: self.min,
            max: self.max,
            step: self.step,
        };

        if !radius.is_finite()
            || radius < self.min - STEP_EPSILON
            || radius > self.max + STEP_EPSILON
        {
            return Err(out_of_range());
        }

        let steps = (radius - self.min) / self.step;
        if (steps - steps.round()).abs() > STEP_EPSILON * steps.abs().max(1.0) {
            return Err(out_of_range());
        }

        Ok(Miles(radius))
    }

    /// Every offered radius, ascending
    pub fn steps(&self) -> Vec<f64> {
        let count = ((self.max - self.min) / self.step + STEP_EPSILON).floor() as usize;
        (0..=count)
            .map(|i| self.min + self.step * i as f64)
            .collect()
    }
}

/// Data store plus the chosen strategy, held for the process lifetime
pub struct MailerService {
    store: DataStore,
    filter: ProximityFilter,
    policy: RadiusPolicy,
}

impl MailerService {
    /// Wrap a store, reprojecting it into the system `filter` works in.
    pub fn new(
        store: DataStore,
        filter: ProximityFilter,
        policy: RadiusPolicy,
        preferred_crs: Option<Crs>,
    ) -> Result<Self> {
        let anchor = store.anchor().unwrap_or((0.0, 0.0));
        let working = filter
            .working_crs(preferred_crs, anchor)
            .context("Failed to choose a working coordinate system")?;
        let store = store
            .into_crs(working)
            .with_context(|| format!("Failed to reproject datasets to {}", working))?;

        info!(
            "Mailer service ready: strategy={}, crs={}, {} schools, {} addresses",
            filter.name(),
            store.crs(),
            store.labels().len(),
            store.candidates().len()
        );

        Ok(Self {
            store,
            filter,
            policy,
        })
    }

    /// Load datasets and settings from a config. Any load failure is fatal.
    pub fn open(config: &Config) -> Result<Self> {
        let store = DataStore::load(&config.datasets).context("Failed to load datasets")?;
        let filter = config.query.proximity_filter()?;
        let policy = config.query.radius_policy()?;
        Self::new(store, filter, policy, config.query.projected_crs)
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn filter(&self) -> ProximityFilter {
        self.filter
    }

    pub fn policy(&self) -> &RadiusPolicy {
        &self.policy
    }

    /// School labels for the selection list
    pub fn labels(&self) -> &[String] {
        self.store.labels()
    }

    /// Addresses within `radius` miles of the school named `label`
    pub fn within(&self, label: &str, radius: f64) -> Result<Selection<'_>, QueryError> {
        let radius = self.policy.check(radius)?;
        let reference = self
            .store
            .reference(label)
            .ok_or_else(|| QueryError::UnknownLabel(label.to_string()))?;

        let matches = self
            .filter
            .query(&reference.position, self.store.candidates(), radius)?;

        debug!("{} within {} mi of {}", matches.len(), radius, label);

        Ok(Selection {
            reference,
            radius,
            crs: self.store.crs(),
            with_distance: self.filter.measures_distance(),
            matches,
        })
    }
}

/// Result of one query
#[derive(Debug)]
pub struct Selection<'a> {
    pub reference: &'a ReferencePoint,
    pub radius: Miles,
    pub crs: Crs,
    with_distance: bool,
    pub matches: Vec<Match<'a>>,
}

impl Selection<'_> {
    pub fn count(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Found {} addresses within {} mi of {}",
            self.count(),
            self.radius,
            self.reference.label
        )
    }

    /// Export rows in filter order
    pub fn rows(&self) -> Vec<MailingRow> {
        self.matches
            .iter()
            .map(|m| MailingRow {
                address: m.candidate.address.clone(),
                x: m.candidate.position.x,
                y: m.candidate.position.y,
                distance: m.distance_mi,
            })
            .collect()
    }

    /// Lat/lon for the map, reprojected from the working system
    pub fn map_points(&self) -> Result<Vec<MapPoint>, QueryError> {
        self.matches
            .iter()
            .map(|m| -> Result<MapPoint, QueryError> {
                let (longitude, latitude) = m.candidate.position.to_lon_lat()?;
                Ok(MapPoint {
                    latitude,
                    longitude,
                })
            })
            .collect()
    }

    pub fn map_preview(&self) -> Result<MapPreview, QueryError> {
        let points = self.map_points()?;
        Ok(MapPreview::new(points.into_iter().zip(&self.matches).map(
            |(point, m)| (point, m.candidate.address.clone(), m.distance_mi),
        )))
    }

    pub fn filename(&self) -> String {
        export::export_filename(&self.reference.label, self.radius)
    }

    /// Write the mailing list; refused when nothing matched
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), QueryError> {
        if self.is_empty() {
            return Err(QueryError::EmptyResult);
        }
        export::write_csv(&self.rows(), self.crs, self.with_distance, writer)?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String, QueryError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
