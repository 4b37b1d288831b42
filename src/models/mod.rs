//! Core data models: the two point collections the filter works on.

pub mod point;

pub use point::{CandidateAddress, ReferencePoint};
