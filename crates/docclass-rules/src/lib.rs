//! docclass Rules
//!
//! Classification rules and the store that publishes them.
//!
//! Rules are authored as serializable [`PredicateSpec`] trees, validated and
//! compiled into [`Predicate`] values, and published through a [`RuleStore`]
//! that hands readers immutable, versioned [`RuleSnapshot`]s:
//! - Keyword, regex, and metadata predicates with AND/OR/NOT composition
//! - Optimistic concurrency on updates via per-rule versions
//! - Pluggable persistence through [`RuleRepository`]

pub mod defaults;
pub mod predicate;
pub mod repository;
pub mod rule;
pub mod store;

pub use defaults::default_rules;
pub use predicate::{CompositeOperator, KeywordMatcher, Predicate, PredicateLimits, PredicateSpec};
pub use repository::{InMemoryRuleRepository, RuleRepository, YamlRuleRepository};
pub use rule::{CompiledRule, Rule, RuleDraft, RuleLimits, RulePatch, RuleSet};
pub use store::{RuleSnapshot, RuleStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::predicate::{Predicate, PredicateSpec};
    pub use crate::rule::{Rule, RuleDraft, RulePatch};
    pub use crate::store::{RuleSnapshot, RuleStore};
}
