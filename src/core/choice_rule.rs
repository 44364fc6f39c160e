//! Choice rules: comparisons bound to a next-state transition.
//!
//! A rule is one of four shapes — a bare comparison, its negation, or an
//! AND/OR combination over an ordered non-empty comparison list. Rules never
//! evaluate anything locally; the shape and operand order are preserved
//! through serialization for the execution engine to evaluate.

use crate::core::comparison::Comparison;
use crate::core::state::StateRef;
use crate::error::{BuildError, ValidationError};
use serde_json::Value;

/// A predicate plus the state to transition to when it holds.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::SucceedBuilder;
/// use statecraft::core::{ChoiceRule, Comparator, Comparison};
///
/// let target = SucceedBuilder::new("Done").build().unwrap();
/// let gt5 = Comparison::new("$.n", Comparator::NumericGreaterThan, 5).unwrap();
/// let lt3 = Comparison::new("$.n", Comparator::NumericLessThan, 3).unwrap();
///
/// let rule = ChoiceRule::any_of(vec![gt5, lt3], &target).unwrap();
/// let json = rule.to_json();
/// assert_eq!(json["Or"].as_array().unwrap().len(), 2);
/// assert_eq!(json["Next"], "Done");
/// ```
#[derive(Clone, Debug)]
pub enum ChoiceRule {
    /// The comparison itself.
    Simple { comparison: Comparison, next: StateRef },
    /// The negation of the comparison.
    Not { comparison: Comparison, next: StateRef },
    /// True when every comparison holds, tested in list order.
    And {
        comparisons: Vec<Comparison>,
        next: StateRef,
    },
    /// True when any comparison holds, tested in list order.
    Or {
        comparisons: Vec<Comparison>,
        next: StateRef,
    },
}

impl ChoiceRule {
    /// Rule that fires when the comparison holds.
    pub fn when(comparison: Comparison, next: &StateRef) -> Self {
        Self::Simple {
            comparison,
            next: next.clone(),
        }
    }

    /// Rule that fires when the comparison does not hold.
    pub fn not(comparison: Comparison, next: &StateRef) -> Self {
        Self::Not {
            comparison,
            next: next.clone(),
        }
    }

    /// Rule that fires when all comparisons hold. The list must be
    /// non-empty.
    pub fn all_of(comparisons: Vec<Comparison>, next: &StateRef) -> Result<Self, BuildError> {
        if comparisons.is_empty() {
            return Err(BuildError::EmptyComparisonList);
        }
        Ok(Self::And {
            comparisons,
            next: next.clone(),
        })
    }

    /// Rule that fires when any comparison holds. The list must be
    /// non-empty.
    pub fn any_of(comparisons: Vec<Comparison>, next: &StateRef) -> Result<Self, BuildError> {
        if comparisons.is_empty() {
            return Err(BuildError::EmptyComparisonList);
        }
        Ok(Self::Or {
            comparisons,
            next: next.clone(),
        })
    }

    /// The state this rule transitions to when it fires.
    pub fn next_state(&self) -> &StateRef {
        match self {
            Self::Simple { next, .. }
            | Self::Not { next, .. }
            | Self::And { next, .. }
            | Self::Or { next, .. } => next,
        }
    }

    pub(crate) fn set_next_state(&mut self, target: &StateRef) {
        match self {
            Self::Simple { next, .. }
            | Self::Not { next, .. }
            | Self::And { next, .. }
            | Self::Or { next, .. } => *next = target.clone(),
        }
    }

    pub(crate) fn comparisons(&self) -> &[Comparison] {
        match self {
            Self::Simple { comparison, .. } | Self::Not { comparison, .. } => {
                std::slice::from_ref(comparison)
            }
            Self::And { comparisons, .. } | Self::Or { comparisons, .. } => comparisons,
        }
    }

    pub(crate) fn validate(&self, state_name: &str) -> Result<(), ValidationError> {
        if self.comparisons().is_empty() {
            return Err(BuildError::EmptyComparisonList.into());
        }
        for comparison in self.comparisons() {
            comparison
                .validate()
                .map_err(|_| ValidationError::ComparisonMismatch {
                    state: state_name.to_string(),
                    comparator: comparison.comparator().name(),
                })?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        let mut json = match self {
            Self::Simple { comparison, .. } => comparison.to_json(),
            Self::Not { comparison, .. } => serde_json::json!({ "Not": comparison.to_json() }),
            Self::And { comparisons, .. } => {
                let operands: Vec<Value> = comparisons.iter().map(Comparison::to_json).collect();
                serde_json::json!({ "And": operands })
            }
            Self::Or { comparisons, .. } => {
                let operands: Vec<Value> = comparisons.iter().map(Comparison::to_json).collect();
                serde_json::json!({ "Or": operands })
            }
        };
        json["Next"] = Value::String(self.next_state().name());
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SucceedBuilder;
    use crate::core::Comparator;

    fn target(name: &str) -> StateRef {
        SucceedBuilder::new(name).build().unwrap()
    }

    #[test]
    fn simple_rule_flattens_comparison_into_rule_object() {
        let cmp = Comparison::new("$.x", Comparator::StringEquals, "yes").unwrap();
        let rule = ChoiceRule::when(cmp, &target("Next"));
        let json = rule.to_json();
        assert_eq!(json["Variable"], "$.x");
        assert_eq!(json["StringEquals"], "yes");
        assert_eq!(json["Next"], "Next");
    }

    #[test]
    fn not_rule_nests_comparison_under_not() {
        let cmp = Comparison::new("$.x", Comparator::BooleanEquals, false).unwrap();
        let rule = ChoiceRule::not(cmp, &target("Next"));
        let json = rule.to_json();
        assert_eq!(json["Not"]["Variable"], "$.x");
        assert_eq!(json["Not"]["BooleanEquals"], false);
        assert_eq!(json["Next"], "Next");
    }

    #[test]
    fn combinators_preserve_operand_order() {
        let first = Comparison::new("$.a", Comparator::NumericEquals, 1).unwrap();
        let second = Comparison::new("$.b", Comparator::NumericEquals, 2).unwrap();
        let rule = ChoiceRule::all_of(vec![first, second], &target("Next")).unwrap();
        let json = rule.to_json();
        let operands = json["And"].as_array().unwrap();
        assert_eq!(operands[0]["Variable"], "$.a");
        assert_eq!(operands[1]["Variable"], "$.b");
    }

    #[test]
    fn combinators_reject_empty_operand_lists() {
        let next = target("Next");
        assert!(matches!(
            ChoiceRule::all_of(vec![], &next),
            Err(BuildError::EmptyComparisonList)
        ));
        assert!(matches!(
            ChoiceRule::any_of(vec![], &next),
            Err(BuildError::EmptyComparisonList)
        ));
    }

    #[test]
    fn validate_delegates_to_contained_comparisons() {
        let cmp = Comparison::new("$.x", Comparator::NumericEquals, 3).unwrap();
        let rule = ChoiceRule::when(cmp, &target("Next"));
        assert!(rule.validate("Chooser").is_ok());
    }
}
