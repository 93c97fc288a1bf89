//! Built-in starter rules
//!
//! A fresh deployment with an empty repository is seeded with one keyword
//! rule per broad document family.

use crate::predicate::PredicateSpec;
use crate::rule::RuleDraft;

const DEFAULT_WEIGHT: f64 = 0.9;

/// The starter rule set
pub fn default_rules() -> Vec<RuleDraft> {
    vec![
        starter(
            "rule-001",
            "Technical documents",
            "technical",
            &[
                "technical", "development", "architecture", "api", "code", "system",
                "framework", "database", "algorithm",
            ],
        ),
        starter(
            "rule-002",
            "Product documents",
            "product",
            &[
                "product", "feature", "requirement", "user", "experience", "design",
                "interaction", "interface",
            ],
        ),
        starter(
            "rule-003",
            "Operations documents",
            "operations",
            &[
                "operations", "promotion", "marketing", "campaign", "user growth",
                "data analysis", "market",
            ],
        ),
        starter(
            "rule-004",
            "Management documents",
            "management",
            &[
                "management", "process", "policy", "guideline", "standard", "team",
                "project", "plan",
            ],
        ),
        starter(
            "rule-005",
            "Training documents",
            "training",
            &[
                "training", "tutorial", "learning", "guide", "getting started", "teaching",
                "course",
            ],
        ),
    ]
}

fn starter(id: &str, name: &str, category: &str, keywords: &[&str]) -> RuleDraft {
    RuleDraft::new(name, category, PredicateSpec::keywords(keywords.iter().copied()))
        .with_id(id)
        .with_weight(DEFAULT_WEIGHT)
}
