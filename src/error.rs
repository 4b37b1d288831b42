//! Error types for the library.

use std::path::PathBuf;

use thiserror::Error;

use crate::projection::Crs;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid UTM zone {0}, expected 1-60")]
    InvalidZone(u8),

    #[error("Coordinate ({x}, {y}) is outside the projection domain")]
    OutOfDomain { x: f64, y: f64 },
}

#[derive(Error, Debug)]
pub enum ProximityError {
    #[error("Coordinate systems do not match: reference is {reference}, candidates are {candidates}")]
    CrsMismatch { reference: Crs, candidates: Crs },

    #[error("Candidate set mixes {first} and {other}")]
    MixedCrs { first: Crs, other: Crs },

    #[error("Great-circle filtering needs geographic coordinates, got {0}")]
    NotGeographic(Crs),

    #[error("Buffer containment needs projected coordinates, got {0}")]
    NotProjected(Crs),

    #[error("Invalid radius: {0} mi")]
    InvalidRadius(f64),

    #[error("Invalid buffer resolution: {0} segments")]
    InvalidSegments(usize),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to open dataset {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read dataset {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Dataset {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    #[error(transparent)]
    Proximity(#[from] ProximityError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unknown school: {0}")]
    UnknownLabel(String),

    #[error("Radius {radius} mi is outside {min}-{max} mi in steps of {step}")]
    RadiusOutOfRange {
        radius: f64,
        min: f64,
        max: f64,
        step: f64,
    },

    #[error("Invalid radius policy: {0}")]
    InvalidPolicy(String),

    #[error("No addresses found in that buffer.")]
    EmptyResult,

    #[error("Failed to write export: {0}")]
    Export(#[from] csv::Error),

    #[error(transparent)]
    Proximity(#[from] ProximityError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}
