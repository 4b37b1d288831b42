use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProximityError;

/// Meters in one statute mile, as used for the buffer radius
pub const METERS_PER_MILE: f64 = 1609.34;

/// A radius in statute miles
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Miles(pub f64);

impl Miles {
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn to_meters(self) -> f64 {
        self.0 * METERS_PER_MILE
    }

    /// Negative or non-finite radii cannot describe a region. Zero is allowed.
    pub fn validate(self) -> Result<Self, ProximityError> {
        if self.0.is_finite() && self.0 >= 0.0 {
            Ok(self)
        } else {
            Err(ProximityError::InvalidRadius(self.0))
        }
    }
}

impl fmt::Display for Miles {
    /// Always shows a decimal point: `0.5`, `1.0`, `1.25`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() && self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_meters() {
        assert!((Miles(1.0).to_meters() - 1609.34).abs() < 1e-9);
        assert!((Miles(0.25).to_meters() - 402.335).abs() < 1e-9);
    }

    #[test]
    fn test_validate() {
        assert!(Miles(0.0).validate().is_ok());
        assert!(Miles(2.0).validate().is_ok());
        assert!(Miles(-0.1).validate().is_err());
        assert!(Miles(f64::NAN).validate().is_err());
        assert!(Miles(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Miles(0.5).to_string(), "0.5");
        assert_eq!(Miles(1.0).to_string(), "1.0");
        assert_eq!(Miles(1.25).to_string(), "1.25");
        assert_eq!(Miles(2.0).to_string(), "2.0");
    }
}
