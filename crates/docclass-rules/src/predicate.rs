//! Predicate definitions
//!
//! A [`PredicateSpec`] is the serializable, human-authored form of a rule's
//! test. [`Predicate::compile`] validates a spec and produces the compiled
//! form used at evaluation time: regexes are built and keyword sets are
//! turned into Aho-Corasick automatons once, so evaluating a compiled
//! predicate can never fail.

use aho_corasick::AhoCorasick;
use docclass_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Predicate tree as authored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredicateSpec {
    /// Fraction of configured keywords present in the content
    Keyword {
        keywords: Vec<String>,

        #[serde(default)]
        case_sensitive: bool,
    },

    /// Regex match anywhere in the content
    Regex { pattern: String },

    /// Exact metadata value match
    MetadataEquals { key: String, value: String },

    /// AND / OR / NOT over child predicates
    Composite {
        operator: CompositeOperator,
        children: Vec<PredicateSpec>,
    },
}

/// Operator for composite predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeOperator {
    And,
    Or,
    Not,
}

impl PredicateSpec {
    /// Case-insensitive keyword predicate
    pub fn keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Keyword {
            keywords: keywords.into_iter().map(Into::into).collect(),
            case_sensitive: false,
        }
    }

    /// Case-sensitive keyword predicate
    pub fn keywords_case_sensitive<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Keyword {
            keywords: keywords.into_iter().map(Into::into).collect(),
            case_sensitive: true,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
        }
    }

    pub fn metadata_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MetadataEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn all(children: Vec<PredicateSpec>) -> Self {
        Self::Composite {
            operator: CompositeOperator::And,
            children,
        }
    }

    pub fn any(children: Vec<PredicateSpec>) -> Self {
        Self::Composite {
            operator: CompositeOperator::Or,
            children,
        }
    }

    pub fn not(child: PredicateSpec) -> Self {
        Self::Composite {
            operator: CompositeOperator::Not,
            children: vec![child],
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        match self {
            Self::Composite { children, .. } => {
                1 + children.iter().map(PredicateSpec::node_count).sum::<usize>()
            }
            _ => 1,
        }
    }

    /// Depth of the tree (a leaf has depth 1)
    pub fn depth(&self) -> usize {
        match self {
            Self::Composite { children, .. } => {
                1 + children.iter().map(PredicateSpec::depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }
}

/// Structural bounds enforced when compiling predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateLimits {
    /// Maximum nesting depth of composite predicates
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum total number of nodes
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Maximum keywords in a single keyword predicate
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
}

impl Default for PredicateLimits {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_nodes: default_max_nodes(),
            max_keywords: default_max_keywords(),
        }
    }
}

fn default_max_depth() -> usize {
    16
}

fn default_max_nodes() -> usize {
    256
}

fn default_max_keywords() -> usize {
    20
}

/// Compiled predicate, ready for evaluation
#[derive(Debug, Clone)]
pub enum Predicate {
    Keyword(KeywordMatcher),
    Regex(regex::Regex),
    MetadataEquals { key: String, value: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Validate a spec and compile it
    ///
    /// Rejects empty keyword sets, blank keywords, invalid or empty regexes,
    /// blank metadata keys, composites without children, NOT nodes without
    /// exactly one child, and trees that exceed `limits`.
    pub fn compile(spec: &PredicateSpec, limits: &PredicateLimits) -> Result<Self> {
        let nodes = spec.node_count();
        if nodes > limits.max_nodes {
            return Err(Error::validation(format!(
                "predicate has {} nodes, limit is {}",
                nodes, limits.max_nodes
            )));
        }
        Self::compile_node(spec, limits, 1)
    }

    fn compile_node(spec: &PredicateSpec, limits: &PredicateLimits, depth: usize) -> Result<Self> {
        if depth > limits.max_depth {
            return Err(Error::validation(format!(
                "predicate nesting exceeds maximum depth of {}",
                limits.max_depth
            )));
        }

        match spec {
            PredicateSpec::Keyword {
                keywords,
                case_sensitive,
            } => {
                if keywords.len() > limits.max_keywords {
                    return Err(Error::validation(format!(
                        "keyword predicate has {} keywords, limit is {}",
                        keywords.len(),
                        limits.max_keywords
                    )));
                }
                KeywordMatcher::new(keywords, *case_sensitive).map(Self::Keyword)
            }

            PredicateSpec::Regex { pattern } => {
                if pattern.is_empty() {
                    return Err(Error::validation("regex pattern must not be empty"));
                }
                regex::Regex::new(pattern)
                    .map(Self::Regex)
                    .map_err(|e| Error::validation(format!("invalid regex '{}': {}", pattern, e)))
            }

            PredicateSpec::MetadataEquals { key, value } => {
                if key.trim().is_empty() {
                    return Err(Error::validation("metadata key must not be blank"));
                }
                Ok(Self::MetadataEquals {
                    key: key.clone(),
                    value: value.clone(),
                })
            }

            PredicateSpec::Composite { operator, children } => {
                if children.is_empty() {
                    return Err(Error::validation(format!(
                        "composite {:?} predicate needs at least one child",
                        operator
                    )));
                }
                if *operator == CompositeOperator::Not && children.len() != 1 {
                    return Err(Error::validation(format!(
                        "NOT predicate takes exactly one child, got {}",
                        children.len()
                    )));
                }

                let mut compiled = children
                    .iter()
                    .map(|child| Self::compile_node(child, limits, depth + 1))
                    .collect::<Result<Vec<_>>>()?;

                Ok(match operator {
                    CompositeOperator::And => Self::And(compiled),
                    CompositeOperator::Or => Self::Or(compiled),
                    CompositeOperator::Not => Self::Not(Box::new(compiled.remove(0))),
                })
            }
        }
    }
}

/// Multi-keyword matcher over a single automaton
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    automaton: AhoCorasick,
    keywords: Vec<String>,
    case_sensitive: bool,
}

impl KeywordMatcher {
    /// Build a matcher over the distinct keywords
    ///
    /// Case-insensitive matchers fold keywords (and later the content) to
    /// lowercase, so keywords differing only in case count once.
    pub fn new(keywords: &[String], case_sensitive: bool) -> Result<Self> {
        if keywords.is_empty() {
            return Err(Error::validation("keyword predicate needs at least one keyword"));
        }

        let mut distinct: Vec<String> = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            if keyword.trim().is_empty() {
                return Err(Error::validation("keywords must not be blank"));
            }
            let folded = if case_sensitive {
                keyword.clone()
            } else {
                keyword.to_lowercase()
            };
            if !distinct.contains(&folded) {
                distinct.push(folded);
            }
        }

        let automaton = AhoCorasick::new(&distinct).map_err(|e| {
            Error::validation(format!("failed to build keyword matcher: {}", e))
        })?;

        Ok(Self {
            automaton,
            keywords: distinct,
            case_sensitive,
        })
    }

    /// Number of distinct keywords
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Distinct keywords found in `content`, in configuration order
    pub fn matched<'a>(&'a self, content: &str) -> Vec<&'a str> {
        if content.is_empty() {
            return Vec::new();
        }

        let folded;
        let haystack = if self.case_sensitive {
            content
        } else {
            folded = content.to_lowercase();
            folded.as_str()
        };

        let mut found = vec![false; self.keywords.len()];
        let mut remaining = self.keywords.len();
        for m in self.automaton.find_overlapping_iter(haystack) {
            let idx = m.pattern().as_usize();
            if !found[idx] {
                found[idx] = true;
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }
        }

        self.keywords
            .iter()
            .zip(found)
            .filter_map(|(keyword, hit)| hit.then_some(keyword.as_str()))
            .collect()
    }
}
