//! docclass Engine
//!
//! Rule-based document classification.
//!
//! Documents are scored against an immutable rule snapshot in a single pass:
//! - Predicate evaluation with graded keyword, regex, and metadata matches
//! - Per-category confidence normalized to [0.0, 1.0] with matched rule ids
//! - Bounded, order-preserving batch fan-out with per-item fault isolation
//! - A fingerprint cache keyed by rule set version
//!
//! All classification is CPU-bound and never suspends; only batch dispatch
//! and rule persistence await.

pub mod batch;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod service;
pub mod suggestions;

pub use batch::{BatchCoordinator, CANCELLED_BEFORE_DISPATCH};
pub use cache::{CacheKey, CachedClassifier, ClassificationCache};
pub use classifier::DocumentClassifier;
pub use config::EngineConfig;
pub use engine::ClassificationEngine;
pub use evaluator::{evaluate, evaluate_spec, explain};
pub use service::{
    BatchClassificationRequest, ClassificationRequest, ClassificationService, RuleCreateRequest,
    RuleUpdateRequest,
};
pub use suggestions::Suggestion;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::DocumentClassifier;
    pub use crate::engine::ClassificationEngine;
    pub use crate::service::{
        BatchClassificationRequest, ClassificationRequest, ClassificationService,
    };
}
