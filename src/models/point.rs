//! Reference points (schools) and candidate addresses.

use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;
use crate::projection::{Crs, Position};

/// A school the user can select; `label` is unique within its dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub label: String,
    pub position: Position,
}

impl ReferencePoint {
    pub fn new(label: impl Into<String>, position: Position) -> Self {
        Self {
            label: label.into(),
            position,
        }
    }

    pub fn reproject(&self, crs: Crs) -> Result<Self, ProjectionError> {
        Ok(Self {
            label: self.label.clone(),
            position: self.position.reproject(crs)?,
        })
    }
}

/// A mailing address that may fall inside a school's radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAddress {
    pub address: String,
    pub position: Position,
}

impl CandidateAddress {
    pub fn new(address: impl Into<String>, position: Position) -> Self {
        Self {
            address: address.into(),
            position,
        }
    }

    pub fn reproject(&self, crs: Crs) -> Result<Self, ProjectionError> {
        Ok(Self {
            address: self.address.clone(),
            position: self.position.reproject(crs)?,
        })
    }
}
