use serde::Deserialize;

use crate::error::{Error, Result};

/// A plain predicate: identifies a code (exact, or parameterized by a single
/// `namespace//value` split) with optional value bounds. Plain predicate
/// columns are produced by the upstream predicate generator; the engine only
/// consumes them, but the task document still declares them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlainPredicate {
    pub code: String,
    #[serde(default)]
    pub value_min: Option<f64>,
    #[serde(default)]
    pub value_max: Option<f64>,
    #[serde(default)]
    pub value_min_inclusive: Option<bool>,
    #[serde(default)]
    pub value_max_inclusive: Option<bool>,
    /// Subject-level fact attached to the null-timestamp row.
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

/// Boolean combinator over derived-predicate inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// A derived predicate: `and(...)` or `or(...)` over at least two already
/// declared predicates, materialized as a `{0,1}` column.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedPredicate {
    pub expr: String,
    pub combinator: Combinator,
    pub inputs: Vec<String>,
    /// Names of inputs that are subject-level facts.
    pub static_inputs: Vec<String>,
}

impl DerivedPredicate {
    pub fn parse(expr: &str, static_inputs: Vec<String>) -> Result<Self> {
        if expr.is_empty() {
            return Err(Error::Config(
                "derived predicates must have a non-empty expression field".to_string(),
            ));
        }

        let (combinator, body) = if let Some(body) =
            expr.strip_prefix("and(").and_then(|s| s.strip_suffix(')'))
        {
            (Combinator::And, body)
        } else if let Some(body) = expr.strip_prefix("or(").and_then(|s| s.strip_suffix(')')) {
            (Combinator::Or, body)
        } else {
            return Err(Error::Config(format!(
                "derived predicate expression must be of the form 'and(...)' or 'or(...)'; \
                 got: '{}'",
                expr
            )));
        };

        let inputs: Vec<String> = body.split(',').map(|s| s.trim().to_string()).collect();
        if inputs.len() < 2 || inputs.iter().any(|s| s.is_empty()) {
            return Err(Error::Config(format!(
                "derived predicate expression must have at least two comma-separated input \
                 predicates; got: '{}'",
                expr
            )));
        }

        for name in &static_inputs {
            if !inputs.contains(name) {
                return Err(Error::Config(format!(
                    "static input '{}' is not an input of derived predicate '{}'",
                    name, expr
                )));
            }
        }

        Ok(Self {
            expr: expr.to_string(),
            combinator,
            inputs,
            static_inputs,
        })
    }
}

/// A declared predicate, plain or derived.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateDef {
    Plain(PlainPredicate),
    Derived(DerivedPredicate),
}

impl PredicateDef {
    pub fn is_plain(&self) -> bool {
        matches!(self, PredicateDef::Plain(_))
    }

    pub fn is_static(&self) -> bool {
        matches!(self, PredicateDef::Plain(p) if p.is_static)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_expression() {
        let pred = DerivedPredicate::parse("and(is_a, is_b, is_c)", Vec::new()).unwrap();
        assert_eq!(pred.combinator, Combinator::And);
        assert_eq!(pred.inputs, vec!["is_a", "is_b", "is_c"]);
    }

    #[test]
    fn test_parse_or_expression() {
        let pred = DerivedPredicate::parse("or(discharge,death)", Vec::new()).unwrap();
        assert_eq!(pred.combinator, Combinator::Or);
        assert_eq!(pred.inputs, vec!["discharge", "death"]);
    }

    #[test]
    fn test_rejects_single_input() {
        assert!(DerivedPredicate::parse("and(is_a)", Vec::new()).is_err());
    }

    #[test]
    fn test_rejects_unknown_combinator() {
        assert!(DerivedPredicate::parse("xor(is_a, is_b)", Vec::new()).is_err());
        assert!(DerivedPredicate::parse("", Vec::new()).is_err());
    }

    #[test]
    fn test_rejects_static_input_not_in_inputs() {
        assert!(DerivedPredicate::parse("or(is_a, is_b)", vec!["is_c".to_string()]).is_err());
    }
}
