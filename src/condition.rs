//! Backend-agnostic condition tree
//!
//! A `Condition` is either a predicate over one element or a boolean
//! combinator over nested conditions. Children are strongly typed so no
//! backend ever has to downcast a payload to recover them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::Element;
use crate::value::Value;

/// Predicate operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equals,
    GreaterThan,
    GreaterEquals,
    LesserThan,
    LesserEquals,
    In,
    Like,
    Between,
}

impl Operator {
    pub const ALL: &'static [Operator] = &[
        Operator::Equals,
        Operator::GreaterThan,
        Operator::GreaterEquals,
        Operator::LesserThan,
        Operator::LesserEquals,
        Operator::In,
        Operator::Like,
        Operator::Between,
    ];

    pub fn kind(self) -> ConditionKind {
        match self {
            Operator::Equals => ConditionKind::Equals,
            Operator::GreaterThan => ConditionKind::GreaterThan,
            Operator::GreaterEquals => ConditionKind::GreaterEquals,
            Operator::LesserThan => ConditionKind::LesserThan,
            Operator::LesserEquals => ConditionKind::LesserEquals,
            Operator::In => ConditionKind::In,
            Operator::Like => ConditionKind::Like,
            Operator::Between => ConditionKind::Between,
        }
    }
}

/// Every node kind a condition tree can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Equals,
    GreaterThan,
    GreaterEquals,
    LesserThan,
    LesserEquals,
    In,
    Like,
    Between,
    And,
    Or,
    Not,
}

impl ConditionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::Equals => "EQUALS",
            ConditionKind::GreaterThan => "GT",
            ConditionKind::GreaterEquals => "GTE",
            ConditionKind::LesserThan => "LT",
            ConditionKind::LesserEquals => "LTE",
            ConditionKind::In => "IN",
            ConditionKind::Like => "LIKE",
            ConditionKind::Between => "BETWEEN",
            ConditionKind::And => "AND",
            ConditionKind::Or => "OR",
            ConditionKind::Not => "NOT",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recursive predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    Predicate { operator: Operator, element: Element },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn predicate(operator: Operator, element: Element) -> Self {
        Condition::Predicate { operator, element }
    }

    /// field == value
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(Operator::Equals, Element::new(field, value))
    }

    /// field > value
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(Operator::GreaterThan, Element::new(field, value))
    }

    /// field >= value
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(Operator::GreaterEquals, Element::new(field, value))
    }

    /// field < value
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(Operator::LesserThan, Element::new(field, value))
    }

    /// field <= value
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(Operator::LesserEquals, Element::new(field, value))
    }

    /// field is one of `values`
    pub fn in_list<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        Self::predicate(Operator::In, Element::new(field, Value::List(values)))
    }

    /// field matches a `%`/`_` pattern
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::predicate(Operator::Like, Element::new(field, Value::Text(pattern.into())))
    }

    /// lower <= field <= upper
    pub fn between(
        field: impl Into<String>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> Self {
        Self::predicate(
            Operator::Between,
            Element::new(field, Value::List(vec![lower.into(), upper.into()])),
        )
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(conditions)
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or(conditions)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// Kind of this node (not of its children)
    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::Predicate { operator, .. } => operator.kind(),
            Condition::And(_) => ConditionKind::And,
            Condition::Or(_) => ConditionKind::Or,
            Condition::Not(_) => ConditionKind::Not,
        }
    }
}
