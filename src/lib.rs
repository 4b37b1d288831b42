//! Schoolmail - mailing lists of addresses near a school
//!
//! Loads a schools dataset and an addresses dataset once, then answers
//! "which addresses lie within R miles of this school" with either a
//! great-circle distance filter or a projected buffer-containment filter.

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod projection;
pub mod proximity;
pub mod service;
pub mod store;

pub use models::{CandidateAddress, ReferencePoint};
pub use projection::{Crs, Position};
pub use proximity::{Miles, ProximityFilter, ProximityQuery};
pub use service::{MailerService, Selection};
pub use store::DataStore;
