//! docclass Core
//!
//! Core types shared across the docclass crates.
//!
//! This crate provides:
//! - Documents, classification results, and batch jobs
//! - The error taxonomy surfaced to the web layer
//! - A clock abstraction so results can be stamped deterministically

pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use types::{
    BatchEntry, BatchItemOutcome, BatchJob, BatchStatus, CategoryAssignment, ClassificationError,
    ClassificationResult, Document,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::error::{Error, Result};
    pub use crate::types::{BatchJob, BatchStatus, ClassificationResult, Document};
}
