//! Typed comparison predicates for choice rules.
//!
//! A [`Comparison`] pairs a data path with one of the fixed ASL comparators
//! and a literal value. Comparators are grouped into four families (string,
//! numeric, boolean, timestamp) and the value's runtime type must agree with
//! the family of the comparator — the mismatch is rejected when the
//! comparison is constructed and re-checked during validation.

use crate::error::BuildError;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// The four comparator families of the states language.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparatorFamily {
    String,
    Numeric,
    Boolean,
    Timestamp,
}

impl ComparatorFamily {
    /// The value type this family accepts, for diagnostics.
    pub fn expected_value(self) -> &'static str {
        match self {
            Self::String | Self::Timestamp => "string",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
        }
    }
}

/// The comparison operators accepted in a choice rule.
///
/// The serialized document uses the operator name as the field key, so each
/// variant knows its exact ASL spelling.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{Comparator, ComparatorFamily};
///
/// assert_eq!(Comparator::NumericEquals.family(), ComparatorFamily::Numeric);
/// assert_eq!(Comparator::StringLessThan.name(), "StringLessThan");
/// assert_eq!("BooleanEquals".parse::<Comparator>().unwrap(), Comparator::BooleanEquals);
/// assert!("StringGreaterThanOrEqual".parse::<Comparator>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
    StringEquals,
    StringLessThan,
    StringGreaterThan,
    StringLessThanEquals,
    StringGreaterThanEquals,
    NumericEquals,
    NumericLessThan,
    NumericGreaterThan,
    NumericLessThanEquals,
    NumericGreaterThanEquals,
    BooleanEquals,
    TimestampLessThan,
    TimestampGreaterThan,
    TimestampLessThanEquals,
    TimestampGreaterThanEquals,
}

impl Comparator {
    const ALL: [Comparator; 15] = [
        Comparator::StringEquals,
        Comparator::StringLessThan,
        Comparator::StringGreaterThan,
        Comparator::StringLessThanEquals,
        Comparator::StringGreaterThanEquals,
        Comparator::NumericEquals,
        Comparator::NumericLessThan,
        Comparator::NumericGreaterThan,
        Comparator::NumericLessThanEquals,
        Comparator::NumericGreaterThanEquals,
        Comparator::BooleanEquals,
        Comparator::TimestampLessThan,
        Comparator::TimestampGreaterThan,
        Comparator::TimestampLessThanEquals,
        Comparator::TimestampGreaterThanEquals,
    ];

    /// The family this comparator belongs to.
    pub fn family(self) -> ComparatorFamily {
        match self {
            Self::StringEquals
            | Self::StringLessThan
            | Self::StringGreaterThan
            | Self::StringLessThanEquals
            | Self::StringGreaterThanEquals => ComparatorFamily::String,
            Self::NumericEquals
            | Self::NumericLessThan
            | Self::NumericGreaterThan
            | Self::NumericLessThanEquals
            | Self::NumericGreaterThanEquals => ComparatorFamily::Numeric,
            Self::BooleanEquals => ComparatorFamily::Boolean,
            Self::TimestampLessThan
            | Self::TimestampGreaterThan
            | Self::TimestampLessThanEquals
            | Self::TimestampGreaterThanEquals => ComparatorFamily::Timestamp,
        }
    }

    /// The exact ASL spelling, used as the JSON field key.
    pub fn name(self) -> &'static str {
        match self {
            Self::StringEquals => "StringEquals",
            Self::StringLessThan => "StringLessThan",
            Self::StringGreaterThan => "StringGreaterThan",
            Self::StringLessThanEquals => "StringLessThanEquals",
            Self::StringGreaterThanEquals => "StringGreaterThanEquals",
            Self::NumericEquals => "NumericEquals",
            Self::NumericLessThan => "NumericLessThan",
            Self::NumericGreaterThan => "NumericGreaterThan",
            Self::NumericLessThanEquals => "NumericLessThanEquals",
            Self::NumericGreaterThanEquals => "NumericGreaterThanEquals",
            Self::BooleanEquals => "BooleanEquals",
            Self::TimestampLessThan => "TimestampLessThan",
            Self::TimestampGreaterThan => "TimestampGreaterThan",
            Self::TimestampLessThanEquals => "TimestampLessThanEquals",
            Self::TimestampGreaterThanEquals => "TimestampGreaterThanEquals",
        }
    }
}

impl FromStr for Comparator {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| BuildError::UnknownComparator(s.to_string()))
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A literal value carried by a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum ComparisonValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl ComparisonValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) | Self::Float(_) => "numeric",
            Self::Boolean(_) => "boolean",
        }
    }

    fn matches(&self, family: ComparatorFamily) -> bool {
        match family {
            ComparatorFamily::String | ComparatorFamily::Timestamp => {
                matches!(self, Self::String(_))
            }
            ComparatorFamily::Numeric => matches!(self, Self::Integer(_) | Self::Float(_)),
            ComparatorFamily::Boolean => matches!(self, Self::Boolean(_)),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::String(s) => json!(s),
            Self::Integer(n) => json!(n),
            Self::Float(f) => json!(f),
            Self::Boolean(b) => json!(b),
        }
    }
}

impl From<&str> for ComparisonValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ComparisonValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for ComparisonValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for ComparisonValue {
    fn from(v: i32) -> Self {
        Self::Integer(v.into())
    }
}

impl From<f64> for ComparisonValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ComparisonValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// A single typed predicate over a location in the input document.
///
/// Immutable once constructed: the comparator/value agreement is enforced by
/// [`Comparison::new`], so a held `Comparison` is always internally
/// consistent.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{Comparator, Comparison};
///
/// let cmp = Comparison::new("$.myValue", Comparator::NumericGreaterThan, 5).unwrap();
/// let json = cmp.to_json();
/// assert_eq!(json["Variable"], "$.myValue");
/// assert_eq!(json["NumericGreaterThan"], 5);
///
/// // A string value cannot be compared numerically.
/// assert!(Comparison::new("$.myValue", Comparator::NumericEquals, "five").is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    variable: String,
    comparator: Comparator,
    value: ComparisonValue,
}

impl Comparison {
    /// Build a comparison, rejecting an empty variable path or a value whose
    /// type disagrees with the comparator's family.
    pub fn new(
        variable: impl Into<String>,
        comparator: Comparator,
        value: impl Into<ComparisonValue>,
    ) -> Result<Self, BuildError> {
        let variable = variable.into();
        if variable.is_empty() {
            return Err(BuildError::EmptyVariable);
        }
        let value = value.into();
        if !value.matches(comparator.family()) {
            return Err(BuildError::ComparatorValueMismatch {
                comparator: comparator.name(),
                expected: comparator.family().expected_value(),
                actual: value.type_name(),
            });
        }
        Ok(Self {
            variable,
            comparator,
            value,
        })
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn value(&self) -> &ComparisonValue {
        &self.value
    }

    /// Re-check the comparator/value agreement.
    pub fn validate(&self) -> Result<(), BuildError> {
        if !self.value.matches(self.comparator.family()) {
            return Err(BuildError::ComparatorValueMismatch {
                comparator: self.comparator.name(),
                expected: self.comparator.family().expected_value(),
                actual: self.value.type_name(),
            });
        }
        Ok(())
    }

    /// Render as `{"Variable": …, "<Comparator>": value}` — the comparator
    /// name is the field key, not a field value.
    pub fn to_json(&self) -> Value {
        json!({
            "Variable": self.variable,
            self.comparator.name(): self.value.to_json(),
        })
    }
}
