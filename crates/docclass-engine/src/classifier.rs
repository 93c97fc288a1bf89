//! Document classifier trait
//!
//! The batch coordinator fans work out through this trait rather than the
//! concrete engine, so alternative scorers and test doubles plug in at the
//! same seam.

use docclass_core::{ClassificationResult, Document, Result};
use docclass_rules::RuleSnapshot;

/// Trait for anything that classifies one document against a rule snapshot
///
/// Classification is CPU-bound and synchronous; callers that need to keep an
/// async runtime responsive run it on the blocking pool.
pub trait DocumentClassifier: Send + Sync {
    /// Classify `document` using exactly the rules in `snapshot`
    fn classify(
        &self,
        document: &Document,
        snapshot: &RuleSnapshot,
    ) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;
}
