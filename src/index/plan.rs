//! Decomposition of scan predicates into a start bound, stop conditions and
//! residual per-row filters.

use std::cmp::Ordering;

use tracing::debug;

use crate::{
    error::{IndexError, IndexResult},
    index::{
        key::{KeySchema, SortOrder},
        predicate::{CompareOp, Predicate, like_prefix, prefix_successor},
    },
    types::value::{Value, compare_values},
};

/// Where the leaf walk begins.
#[derive(Debug, Clone, PartialEq)]
pub enum StartBound {
    /// The first leaf of the index.
    First,
    /// The first key not ordered before the given prefix.
    AtOrAfter(Vec<Value>),
    /// The first key ordered after every key equal to the given prefix.
    After(Vec<Value>),
}

/// Ends the scan the first time it holds for a live key.
#[derive(Debug, Clone, PartialEq)]
pub enum StopCondition {
    /// The key no longer equals this prefix.
    NotEqual(Vec<Value>),
    /// `key[column] op value`.
    Compare {
        column: usize,
        op: CompareOp,
        value: Value,
    },
    /// `key[column]` no longer starts with `prefix`.
    LeavesPrefix { column: usize, prefix: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub start: StartBound,
    pub stops: Vec<StopCondition>,
    pub filters: Vec<Predicate>,
}

impl ScanPlan {
    pub fn build(
        schema: &KeySchema,
        leading: Option<Predicate>,
        secondary: Vec<Predicate>,
    ) -> IndexResult<ScanPlan> {
        for pred in leading.iter().chain(&secondary) {
            if let Some(col) = pred.max_column() {
                if col >= schema.len() {
                    return Err(IndexError::InvalidScan(format!(
                        "predicate {pred} refers to column {col}, index has {}",
                        schema.len()
                    )));
                }
            }
        }

        let mut plan = ScanPlan {
            start: StartBound::First,
            stops: Vec::new(),
            filters: secondary,
        };

        let Some(leading) = leading else {
            return Ok(plan);
        };

        let Some((column, op, literal)) = leading.column_literal() else {
            plan.filters.push(leading);
            return Ok(plan);
        };

        if column != 0 || literal.is_null() {
            plan.filters.push(leading);
            return Ok(plan);
        }

        let order = schema.column(0).map(|c| c.order).unwrap_or_default();
        let literal = literal.clone();

        match op {
            CompareOp::Eq => plan.pin_equalities(schema, literal),
            CompareOp::Lt | CompareOp::LtEq | CompareOp::Gt | CompareOp::GtEq => {
                plan.bound_range(order, op, literal);
                // NULL keys sit at one end of the range
                plan.filters.push(leading);
            }
            CompareOp::Like => match literal.as_str().and_then(like_prefix) {
                Some((prefix, pure)) => {
                    plan.bound_prefix(order, prefix);
                    if !pure {
                        plan.filters.push(leading);
                    }
                }
                None => plan.filters.push(leading),
            },
            CompareOp::NotEq | CompareOp::NotLike => plan.filters.push(leading),
        }

        debug!(start = ?plan.start, stops = plan.stops.len(), filters = plan.filters.len(), "scan plan");
        Ok(plan)
    }

    /// Folds equalities on columns 1, 2, ... into a composite key after the
    /// leading one, as long as they cover an unbroken column prefix.
    fn pin_equalities(&mut self, schema: &KeySchema, first: Value) {
        let mut key = vec![first];

        for column in 1..schema.len() {
            let found = self.filters.iter().position(|p| {
                matches!(
                    p.column_literal(),
                    Some((c, CompareOp::Eq, v)) if c == column && !v.is_null()
                )
            });
            let Some(idx) = found else { break };

            let pred = self.filters.remove(idx);
            if let Some((_, _, v)) = pred.column_literal() {
                key.push(v.clone());
            }
        }

        self.start = StartBound::AtOrAfter(key.clone());
        self.stops.push(StopCondition::NotEqual(key));
    }

    fn bound_range(&mut self, order: SortOrder, op: CompareOp, value: Value) {
        use CompareOp::*;

        match (order, op) {
            (SortOrder::Asc, Gt) | (SortOrder::Desc, Lt) => {
                self.start = StartBound::After(vec![value]);
            }
            (SortOrder::Asc, GtEq) | (SortOrder::Desc, LtEq) => {
                self.start = StartBound::AtOrAfter(vec![value]);
            }
            (SortOrder::Asc, Lt) => self.stop_at(GtEq, value),
            (SortOrder::Asc, LtEq) => self.stop_at(Gt, value),
            (SortOrder::Desc, Gt) => self.stop_at(LtEq, value),
            (SortOrder::Desc, GtEq) => self.stop_at(Lt, value),
            _ => {}
        }
    }

    fn stop_at(&mut self, op: CompareOp, value: Value) {
        self.stops.push(StopCondition::Compare {
            column: 0,
            op,
            value,
        });
    }

    fn bound_prefix(&mut self, order: SortOrder, prefix: String) {
        self.start = match order {
            SortOrder::Asc => StartBound::AtOrAfter(vec![Value::String(prefix.clone())]),
            SortOrder::Desc => match prefix_successor(&prefix) {
                Some(next) => StartBound::After(vec![Value::String(next)]),
                None => StartBound::First,
            },
        };
        self.stops.push(StopCondition::LeavesPrefix { column: 0, prefix });
    }

    pub fn should_stop(&self, schema: &KeySchema, key: &[Value]) -> bool {
        self.stops.iter().any(|stop| match stop {
            StopCondition::NotEqual(prefix) => schema.compare(key, prefix) != Ordering::Equal,
            StopCondition::Compare { column, op, value } => key
                .get(*column)
                .is_some_and(|v| op.holds(compare_values(v, value))),
            StopCondition::LeavesPrefix { column, prefix } => !key
                .get(*column)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
        })
    }

    pub fn accepts(&self, key: &[Value]) -> IndexResult<bool> {
        for filter in &self.filters {
            if !filter.passes(key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
