//! Predicate evaluation
//!
//! Scores a document against a compiled predicate. Scores are graded in
//! `[0.0, 1.0]`; composites combine children with min (AND), max (OR), and
//! complement (NOT). Evaluation is pure and never fails: all validation
//! happens when the predicate is compiled.

use docclass_core::{Document, Result};
use docclass_rules::{Predicate, PredicateLimits, PredicateSpec};

/// Score `document` against `predicate`
pub fn evaluate(document: &Document, predicate: &Predicate) -> f64 {
    match predicate {
        Predicate::Keyword(matcher) => {
            if matcher.is_empty() || document.content.is_empty() {
                return 0.0;
            }
            matcher.matched(&document.content).len() as f64 / matcher.len() as f64
        }

        Predicate::Regex(re) => {
            if re.is_match(&document.content) {
                1.0
            } else {
                0.0
            }
        }

        Predicate::MetadataEquals { key, value } => match document.metadata.get(key) {
            Some(actual) if actual == value => 1.0,
            _ => 0.0,
        },

        Predicate::And(children) => children
            .iter()
            .map(|child| evaluate(document, child))
            .fold(1.0, f64::min),

        Predicate::Or(children) => children
            .iter()
            .map(|child| evaluate(document, child))
            .fold(0.0, f64::max),

        Predicate::Not(child) => 1.0 - evaluate(document, child),
    }
}

/// Compile `spec` with default limits, then evaluate it
pub fn evaluate_spec(document: &Document, spec: &PredicateSpec) -> Result<f64> {
    let predicate = Predicate::compile(spec, &PredicateLimits::default())?;
    Ok(evaluate(document, &predicate))
}

/// Human-readable reasons why `predicate` scored above zero
///
/// Only positive evidence is reported; a NOT that holds is described by the
/// child it negates.
pub fn explain(document: &Document, predicate: &Predicate) -> Vec<String> {
    let mut reasons = Vec::new();
    collect_reasons(document, predicate, &mut reasons);
    reasons
}

fn collect_reasons(document: &Document, predicate: &Predicate, out: &mut Vec<String>) {
    match predicate {
        Predicate::Keyword(matcher) => {
            for keyword in matcher.matched(&document.content) {
                out.push(format!("contains keyword \"{}\"", keyword));
            }
        }

        Predicate::Regex(re) => {
            if let Some(m) = re.find(&document.content) {
                out.push(format!("matches /{}/ at \"{}\"", re.as_str(), m.as_str()));
            }
        }

        Predicate::MetadataEquals { key, value } => {
            if document.metadata.get(key) == Some(value) {
                out.push(format!("metadata {} = \"{}\"", key, value));
            }
        }

        Predicate::And(children) | Predicate::Or(children) => {
            for child in children {
                if evaluate(document, child) > 0.0 {
                    collect_reasons(document, child, out);
                }
            }
        }

        Predicate::Not(child) => {
            let score = evaluate(document, child);
            if score < 1.0 {
                out.push(format!("negated condition scored {:.2}", score));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(content: &str) -> Document {
        Document::new("d1", content)
    }

    fn score(document: &Document, spec: PredicateSpec) -> f64 {
        evaluate_spec(document, &spec).unwrap()
    }

    #[test]
    fn test_keyword_fraction() {
        let d = doc("monthly invoice attached");
        assert_eq!(score(&d, PredicateSpec::keywords(["invoice", "bill"])), 0.5);
        assert_eq!(score(&d, PredicateSpec::keywords(["invoice"])), 1.0);
        assert_eq!(score(&d, PredicateSpec::keywords(["receipt"])), 0.0);
    }

    #[test]
    fn test_keyword_case_folding() {
        let d = doc("Quarterly INVOICE");
        assert_eq!(score(&d, PredicateSpec::keywords(["invoice"])), 1.0);
        assert_eq!(
            score(&d, PredicateSpec::keywords_case_sensitive(["invoice"])),
            0.0
        );
        assert_eq!(
            score(&d, PredicateSpec::keywords_case_sensitive(["INVOICE"])),
            1.0
        );
    }

    #[test]
    fn test_duplicate_keywords_count_once() {
        let d = doc("invoice");
        assert_eq!(
            score(&d, PredicateSpec::keywords(["invoice", "Invoice", "bill"])),
            0.5
        );
    }

    #[test]
    fn test_empty_content_scores_zero() {
        let d = doc("");
        assert_eq!(score(&d, PredicateSpec::keywords(["invoice"])), 0.0);
        assert_eq!(score(&d, PredicateSpec::regex("x")), 0.0);
    }

    #[test]
    fn test_regex_and_metadata() {
        let d = doc("PO-12345 received").with_metadata("source", "email");
        assert_eq!(score(&d, PredicateSpec::regex(r"PO-\d+")), 1.0);
        assert_eq!(score(&d, PredicateSpec::regex(r"^received")), 0.0);
        assert_eq!(score(&d, PredicateSpec::metadata_equals("source", "email")), 1.0);
        assert_eq!(score(&d, PredicateSpec::metadata_equals("source", "fax")), 0.0);
        assert_eq!(score(&d, PredicateSpec::metadata_equals("missing", "x")), 0.0);
    }

    #[test]
    fn test_composites() {
        let d = doc("invoice for services");
        let half = PredicateSpec::keywords(["invoice", "bill"]);
        let full = PredicateSpec::keywords(["services"]);
        let none = PredicateSpec::keywords(["contract"]);

        assert_eq!(score(&d, PredicateSpec::all(vec![half.clone(), full.clone()])), 0.5);
        assert_eq!(score(&d, PredicateSpec::any(vec![half.clone(), none.clone()])), 0.5);
        assert_eq!(score(&d, PredicateSpec::any(vec![half.clone(), full])), 1.0);
        assert_eq!(score(&d, PredicateSpec::not(half)), 0.5);
        assert_eq!(score(&d, PredicateSpec::not(none)), 1.0);
    }

    #[test]
    fn test_evaluate_spec_rejects_invalid() {
        let err = evaluate_spec(&doc("x"), &PredicateSpec::regex("(")).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_explain_lists_evidence() {
        let d = doc("Invoice PO-77 attached").with_metadata("dept", "finance");
        let spec = PredicateSpec::all(vec![
            PredicateSpec::keywords(["invoice", "bill"]),
            PredicateSpec::regex(r"PO-\d+"),
            PredicateSpec::metadata_equals("dept", "finance"),
        ]);
        let predicate = Predicate::compile(&spec, &PredicateLimits::default()).unwrap();

        let reasons = explain(&d, &predicate);
        assert_eq!(reasons.len(), 3);
        assert!(reasons[0].contains("invoice"));
        assert!(reasons[1].contains("PO-77"));
        assert!(reasons[2].contains("dept"));
    }

    #[test]
    fn test_explain_skips_failing_branches() {
        let d = doc("invoice");
        let spec = PredicateSpec::any(vec![
            PredicateSpec::keywords(["contract"]),
            PredicateSpec::keywords(["invoice"]),
        ]);
        let predicate = Predicate::compile(&spec, &PredicateLimits::default()).unwrap();
        assert_eq!(explain(&d, &predicate), vec!["contains keyword \"invoice\""]);
    }

    fn leaf() -> impl Strategy<Value = PredicateSpec> {
        prop_oneof![
            prop::collection::vec("[a-c]{1,3}", 1..4).prop_map(PredicateSpec::keywords),
            "[a-c]{1,2}".prop_map(PredicateSpec::regex),
            ("[a-b]", "[a-b]").prop_map(|(k, v)| PredicateSpec::metadata_equals(k, v)),
        ]
    }

    fn tree() -> impl Strategy<Value = PredicateSpec> {
        leaf().prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(PredicateSpec::all),
                prop::collection::vec(inner.clone(), 1..4).prop_map(PredicateSpec::any),
                inner.prop_map(PredicateSpec::not),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_score_is_bounded(spec in tree(), content in "[a-c ]{0,24}", meta in "[a-b]") {
            let d = doc(&content).with_metadata("a", meta);
            let s = score(&d, spec);
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn prop_evaluation_is_deterministic(spec in tree(), content in "[a-c ]{0,24}") {
            let d = doc(&content);
            let predicate = Predicate::compile(&spec, &PredicateLimits::default()).unwrap();
            prop_assert_eq!(evaluate(&d, &predicate), evaluate(&d, &predicate));
        }
    }
}
