//! Extracts key ranges from predicates for table and index access.
//!
//! Only simple comparisons between a column and a literal, in either operand order, are
//! turned into ranges. Everything else remains a filter.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use arrow_schema::DataType;
use datafusion_common::ScalarValue;
use datafusion_expr::Operator;
use itertools::Itertools;

use crate::error::{OptResult, RangeError};
use crate::expr::constant::{as_f64, as_i128, compare_literals};
use crate::expr::{swap_comparison, Column, ColumnId, ScalarExpr};

/// A range of index keys.
///
/// Bounds are compared column by column. A bound shorter than the index is unbounded on the
/// remaining columns, e.g. `low = [1]`, `high = [1]` covers every key starting with `1`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct IndexRange {
    pub low: Vec<ScalarValue>,
    pub low_exclude: bool,
    pub high: Vec<ScalarValue>,
    pub high_exclude: bool,
}

impl IndexRange {
    pub fn full() -> Self {
        Self {
            low: vec![],
            low_exclude: false,
            high: vec![],
            high_exclude: false,
        }
    }

    pub fn point(values: Vec<ScalarValue>) -> Self {
        Self {
            low: values.clone(),
            low_exclude: false,
            high: values,
            high_exclude: false,
        }
    }
}

impl Display for IndexRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let bound = |values: &[ScalarValue], inf: &str| {
            if values.is_empty() {
                inf.to_string()
            } else {
                values.iter().join(" ")
            }
        };
        write!(
            f,
            "{}{},{}{}",
            if self.low_exclude { "(" } else { "[" },
            bound(&self.low, "-inf"),
            bound(&self.high, "+inf"),
            if self.high_exclude { ")" } else { "]" }
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetachRangeResult {
    /// Number of leading index columns restricted to single values.
    pub eq_cond_count: usize,
    pub access_conds: Vec<ScalarExpr>,
    /// Empty if the access conditions contradict each other.
    pub ranges: Vec<IndexRange>,
    pub remained_conds: Vec<ScalarExpr>,
}

/// `column op literal`, normalized so that the column is on the left.
fn as_simple_cond(expr: &ScalarExpr) -> Option<(ColumnId, Operator, &ScalarValue)> {
    match expr {
        ScalarExpr::BinaryExpr { left, op, right } => {
            match (left.as_ref(), right.as_ref()) {
                (ScalarExpr::Column(c), ScalarExpr::Literal(v)) => {
                    swap_comparison(*op).map(|_| (c.id(), *op, v))
                }
                (ScalarExpr::Literal(v), ScalarExpr::Column(c)) => {
                    swap_comparison(*op).map(|swapped| (c.id(), swapped, v))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Splits `conds` into `(access, remained)`, where access conditions are simple comparisons
/// on `column`.
pub fn detach_conds_for_column(
    conds: &[ScalarExpr],
    column: &Column,
) -> (Vec<ScalarExpr>, Vec<ScalarExpr>) {
    conds.iter().cloned().partition(|cond| {
        as_simple_cond(cond)
            .map(|(id, _, _)| id == column.id())
            .unwrap_or(false)
    })
}

/// Builds key ranges on the index `idx_cols` from `conds`.
///
/// Index columns are visited in order. Every simple comparison on the current column becomes
/// an access condition. The walk continues to the next column only if the current one is
/// restricted to single values. Conditions on a column indexed by prefix are also kept in the
/// remainder, since the index can't evaluate them exactly.
pub fn detach_cond_and_build_range_for_index(
    conds: &[ScalarExpr],
    idx_cols: &[Column],
    idx_col_lens: &[Option<usize>],
) -> OptResult<DetachRangeResult> {
    if idx_cols.len() != idx_col_lens.len() {
        return Err(RangeError::ColumnLengthMismatch {
            columns: idx_cols.len(),
            lens: idx_col_lens.len(),
        }
        .into());
    }

    let mut is_access = vec![false; conds.len()];
    let mut keep_remained = vec![false; conds.len()];
    let mut access_conds = Vec::new();
    let mut ranges = vec![IndexRange::full()];
    let mut eq_cond_count = 0;

    for (column, col_len) in idx_cols.iter().zip(idx_col_lens.iter()) {
        let col_conds = conds
            .iter()
            .enumerate()
            .filter_map(|(idx, cond)| {
                as_simple_cond(cond)
                    .filter(|(id, _, _)| *id == column.id())
                    .map(|(_, op, value)| (idx, op, value))
            })
            .collect::<Vec<_>>();
        if col_conds.is_empty() {
            break;
        }

        let mut intervals = vec![Interval::full()];
        for (idx, op, value) in col_conds {
            let cond_intervals = if value.is_null() {
                vec![]
            } else {
                let value = coerce(value, column.data_type())?;
                let (op, value) = match col_len {
                    Some(len) => truncate_prefix(op, value, *len),
                    None => (Some(op), value),
                };
                match op {
                    Some(op) => Interval::from_comparison(op, value),
                    None => vec![Interval::full()],
                }
            };
            intervals = intersect(&intervals, &cond_intervals);

            access_conds.push(conds[idx].clone());
            is_access[idx] = true;
            keep_remained[idx] = col_len.is_some();
        }

        if intervals.is_empty() {
            ranges.clear();
            break;
        }
        let is_point = intervals.iter().all(Interval::is_point);
        ranges = ranges
            .iter()
            .flat_map(|range| intervals.iter().map(move |iv| iv.extend(range)))
            .collect();
        if !is_point {
            break;
        }
        eq_cond_count += 1;
    }

    let remained_conds = conds
        .iter()
        .enumerate()
        .filter(|(idx, _)| !is_access[*idx] || keep_remained[*idx])
        .map(|(_, cond)| cond.clone())
        .collect();

    Ok(DetachRangeResult {
        eq_cond_count,
        access_conds,
        ranges,
        remained_conds,
    })
}

/// Converts `value` to the type of the column it's compared with.
fn coerce(value: &ScalarValue, target: &DataType) -> Result<ScalarValue, RangeError> {
    if &value.get_datatype() == target {
        return Ok(value.clone());
    }
    let incompatible = || RangeError::IncompatibleType {
        value: value.clone(),
        target: target.clone(),
    };
    let as_integer = || -> Option<i128> {
        match value {
            ScalarValue::Utf8(Some(s)) => s.trim().parse::<i128>().ok(),
            ScalarValue::Float32(_) | ScalarValue::Float64(_) => {
                as_f64(value).filter(|f| f.fract() == 0.0).map(|f| f as i128)
            }
            _ => as_i128(value),
        }
    };

    let coerced = match target {
        DataType::Int8 => as_integer()
            .and_then(|v| i8::try_from(v).ok())
            .map(|v| ScalarValue::Int8(Some(v))),
        DataType::Int16 => as_integer()
            .and_then(|v| i16::try_from(v).ok())
            .map(|v| ScalarValue::Int16(Some(v))),
        DataType::Int32 => as_integer()
            .and_then(|v| i32::try_from(v).ok())
            .map(|v| ScalarValue::Int32(Some(v))),
        DataType::Int64 => as_integer()
            .and_then(|v| i64::try_from(v).ok())
            .map(|v| ScalarValue::Int64(Some(v))),
        DataType::UInt8 => as_integer()
            .and_then(|v| u8::try_from(v).ok())
            .map(|v| ScalarValue::UInt8(Some(v))),
        DataType::UInt16 => as_integer()
            .and_then(|v| u16::try_from(v).ok())
            .map(|v| ScalarValue::UInt16(Some(v))),
        DataType::UInt32 => as_integer()
            .and_then(|v| u32::try_from(v).ok())
            .map(|v| ScalarValue::UInt32(Some(v))),
        DataType::UInt64 => as_integer()
            .and_then(|v| u64::try_from(v).ok())
            .map(|v| ScalarValue::UInt64(Some(v))),
        DataType::Float32 => float_of(value).map(|v| ScalarValue::Float32(Some(v as f32))),
        DataType::Float64 => float_of(value).map(|v| ScalarValue::Float64(Some(v))),
        DataType::Utf8 => as_i128(value).map(|v| ScalarValue::Utf8(Some(v.to_string()))),
        _ => None,
    };
    coerced.ok_or_else(incompatible)
}

fn float_of(value: &ScalarValue) -> Option<f64> {
    match value {
        ScalarValue::Utf8(Some(s)) => s.trim().parse::<f64>().ok(),
        other => as_f64(other),
    }
}

/// Truncates a string literal compared with a prefix indexed column.
///
/// A stored prefix key may stand for longer values, so once the literal fills the prefix the
/// bound must include it. `<>` then restricts nothing, which is returned as `None`.
fn truncate_prefix(op: Operator, value: ScalarValue, len: usize) -> (Option<Operator>, ScalarValue) {
    let truncated = match &value {
        ScalarValue::Utf8(Some(s)) if s.chars().count() >= len => {
            ScalarValue::Utf8(Some(s.chars().take(len).collect()))
        }
        _ => return (Some(op), value),
    };
    let op = match op {
        Operator::Lt => Some(Operator::LtEq),
        Operator::Gt => Some(Operator::GtEq),
        Operator::NotEq => None,
        other => Some(other),
    };
    (op, truncated)
}

#[derive(Clone, Debug, PartialEq)]
struct Bound {
    /// `None` is infinite.
    value: Option<ScalarValue>,
    exclude: bool,
}

impl Bound {
    fn infinite() -> Self {
        Self {
            value: None,
            exclude: false,
        }
    }

    fn of(value: ScalarValue, exclude: bool) -> Self {
        Self {
            value: Some(value),
            exclude,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Interval {
    low: Bound,
    high: Bound,
}

fn cmp_values(left: &ScalarValue, right: &ScalarValue) -> Ordering {
    compare_literals(left, right).unwrap_or(Ordering::Equal)
}

impl Interval {
    fn full() -> Self {
        Self {
            low: Bound::infinite(),
            high: Bound::infinite(),
        }
    }

    fn from_comparison(op: Operator, value: ScalarValue) -> Vec<Interval> {
        let interval = |low, high| Interval { low, high };
        match op {
            Operator::Eq => vec![interval(
                Bound::of(value.clone(), false),
                Bound::of(value, false),
            )],
            Operator::NotEq => vec![
                interval(Bound::infinite(), Bound::of(value.clone(), true)),
                interval(Bound::of(value, true), Bound::infinite()),
            ],
            Operator::Lt => vec![interval(Bound::infinite(), Bound::of(value, true))],
            Operator::LtEq => vec![interval(Bound::infinite(), Bound::of(value, false))],
            Operator::Gt => vec![interval(Bound::of(value, true), Bound::infinite())],
            Operator::GtEq => vec![interval(Bound::of(value, false), Bound::infinite())],
            _ => vec![Interval::full()],
        }
    }

    fn is_point(&self) -> bool {
        match (&self.low.value, &self.high.value) {
            (Some(l), Some(h)) => {
                !self.low.exclude && !self.high.exclude && cmp_values(l, h) == Ordering::Equal
            }
            _ => false,
        }
    }

    fn is_empty(&self) -> bool {
        match (&self.low.value, &self.high.value) {
            (Some(l), Some(h)) => match cmp_values(l, h) {
                Ordering::Greater => true,
                Ordering::Equal => self.low.exclude || self.high.exclude,
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    fn intersect(&self, other: &Interval) -> Interval {
        let low = match (&self.low.value, &other.low.value) {
            (None, _) => other.low.clone(),
            (_, None) => self.low.clone(),
            (Some(a), Some(b)) => match cmp_values(a, b) {
                Ordering::Greater => self.low.clone(),
                Ordering::Less => other.low.clone(),
                Ordering::Equal => Bound::of(a.clone(), self.low.exclude || other.low.exclude),
            },
        };
        let high = match (&self.high.value, &other.high.value) {
            (None, _) => other.high.clone(),
            (_, None) => self.high.clone(),
            (Some(a), Some(b)) => match cmp_values(a, b) {
                Ordering::Less => self.high.clone(),
                Ordering::Greater => other.high.clone(),
                Ordering::Equal => {
                    Bound::of(a.clone(), self.high.exclude || other.high.exclude)
                }
            },
        };
        Interval { low, high }
    }

    /// Appends this interval as the next column of `prefix`.
    fn extend(&self, prefix: &IndexRange) -> IndexRange {
        let mut range = prefix.clone();
        if let Some(low) = &self.low.value {
            range.low.push(low.clone());
            range.low_exclude = self.low.exclude;
        }
        if let Some(high) = &self.high.value {
            range.high.push(high.clone());
            range.high_exclude = self.high.exclude;
        }
        range
    }
}

fn intersect(left: &[Interval], right: &[Interval]) -> Vec<Interval> {
    left.iter()
        .cartesian_product(right.iter())
        .map(|(l, r)| l.intersect(r))
        .filter(|iv| !iv.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;
    use datafusion_common::ScalarValue;

    use crate::error::RangeError;
    use crate::expr::{col, lit, Column, ColumnId};
    use crate::ranger::{
        detach_cond_and_build_range_for_index, detach_conds_for_column, IndexRange,
    };

    fn int_column(id: u64, name: &str) -> Column {
        Column::new(ColumnId(id), name, DataType::Int64)
    }

    #[test]
    fn test_detach_conds_for_column() {
        let (id, a) = (int_column(1, "id"), int_column(2, "a"));
        let conds = vec![
            col(&id).gt(lit(1i64)),
            col(&a).eq(lit(2i64)),
            lit(10i64).gt_eq(col(&id)),
            col(&id).eq(col(&a)),
        ];

        let (access, remained) = detach_conds_for_column(&conds, &id);
        assert_eq!(vec![conds[0].clone(), conds[2].clone()], access);
        assert_eq!(vec![conds[1].clone(), conds[3].clone()], remained);
    }

    #[test]
    fn test_build_range_eq_prefix() {
        let (a, b, c) = (int_column(1, "a"), int_column(2, "b"), int_column(3, "c"));
        let conds = vec![
            col(&b).gt(lit(3i64)),
            col(&a).eq(lit(1i64)),
            col(&c).eq(lit(5i64)),
            col(&b).lt_eq(lit(7i64)),
        ];

        let result =
            detach_cond_and_build_range_for_index(&conds, &[a, b, c], &[None, None, None])
                .unwrap();

        // The range on b stops the walk, so c = 5 remains a filter.
        assert_eq!(1, result.eq_cond_count);
        assert_eq!(
            vec![conds[1].clone(), conds[0].clone(), conds[3].clone()],
            result.access_conds
        );
        assert_eq!(vec![conds[2].clone()], result.remained_conds);
        assert_eq!(
            vec![IndexRange {
                low: vec![ScalarValue::Int64(Some(1)), ScalarValue::Int64(Some(3))],
                low_exclude: true,
                high: vec![ScalarValue::Int64(Some(1)), ScalarValue::Int64(Some(7))],
                high_exclude: false,
            }],
            result.ranges
        );
    }

    #[test]
    fn test_build_range_contradiction() {
        let a = int_column(1, "a");
        let conds = vec![col(&a).eq(lit(1i64)), col(&a).gt(lit(5i64))];
        let result =
            detach_cond_and_build_range_for_index(&conds, &[a], &[None]).unwrap();
        assert_eq!(2, result.access_conds.len());
        assert!(result.ranges.is_empty());
    }

    #[test]
    fn test_build_range_with_coercion() {
        let a = int_column(1, "a");
        let conds = vec![col(&a).eq(lit("42"))];
        let result =
            detach_cond_and_build_range_for_index(&conds, &[a.clone()], &[None]).unwrap();
        assert_eq!(
            vec![IndexRange::point(vec![ScalarValue::Int64(Some(42))])],
            result.ranges
        );

        let conds = vec![col(&a).eq(lit("forty-two"))];
        let err = detach_cond_and_build_range_for_index(&conds, &[a], &[None]).unwrap_err();
        assert_eq!(
            Some(&RangeError::IncompatibleType {
                value: ScalarValue::Utf8(Some("forty-two".to_string())),
                target: DataType::Int64,
            }),
            err.downcast_ref::<RangeError>()
        );
    }

    #[test]
    fn test_prefix_column_conds_remain() {
        let name = Column::new(ColumnId(1), "name", DataType::Utf8);
        let conds = vec![col(&name).lt(lit("abcdef"))];
        let result =
            detach_cond_and_build_range_for_index(&conds, &[name], &[Some(3)]).unwrap();

        assert_eq!(conds, result.access_conds);
        assert_eq!(conds, result.remained_conds);
        assert_eq!(
            vec![IndexRange {
                low: vec![],
                low_exclude: false,
                high: vec![ScalarValue::Utf8(Some("abc".to_string()))],
                high_exclude: false,
            }],
            result.ranges
        );
    }

    #[test]
    fn test_prefix_column_with_exact_length_literal() {
        let name = Column::new(ColumnId(1), "name", DataType::Utf8);
        let conds = vec![col(&name).gt(lit("ab"))];
        let result =
            detach_cond_and_build_range_for_index(&conds, &[name.clone()], &[Some(2)]).unwrap();
        assert_eq!(conds, result.remained_conds);
        assert_eq!(
            vec![IndexRange {
                low: vec![ScalarValue::Utf8(Some("ab".to_string()))],
                low_exclude: false,
                high: vec![],
                high_exclude: false,
            }],
            result.ranges
        );

        let conds = vec![col(&name).not_eq(lit("ab"))];
        let result =
            detach_cond_and_build_range_for_index(&conds, &[name], &[Some(2)]).unwrap();
        assert_eq!(conds, result.remained_conds);
        assert_eq!(vec![IndexRange::full()], result.ranges);
    }

    #[test]
    fn test_length_mismatch() {
        let a = int_column(1, "a");
        let err = detach_cond_and_build_range_for_index(&[], &[a], &[]).unwrap_err();
        assert!(err.downcast_ref::<RangeError>().is_some());
    }
}
