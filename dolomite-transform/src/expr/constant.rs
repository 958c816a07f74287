//! Constant folding and propagation over predicate lists.

use std::cmp::Ordering;
use std::collections::HashMap;

use datafusion_common::ScalarValue;
use datafusion_expr::Operator;

use crate::expr::{
    conjunction, disjunction, has_side_effects, is_deterministic, lit, split_conjunction,
    split_disjunction, ColumnId, ScalarExpr,
};

/// Evaluates every subtree whose operands are literals, with three valued logic.
///
/// `AND`/`OR` are also simplified when only one side is a literal, e.g. `false AND x` is
/// `false`.
pub fn fold_constant(expr: ScalarExpr) -> ScalarExpr {
    expr.transform_up(&mut |e| match e {
        ScalarExpr::BinaryExpr { left, op, right } => fold_binary(*left, op, *right),
        ScalarExpr::Not(inner) => match inner.as_literal().map(as_bool) {
            Some(Some(b)) => lit(ScalarValue::Boolean(b.map(|v| !v))),
            _ => ScalarExpr::Not(inner),
        },
        ScalarExpr::IsNull(inner) => match inner.as_literal() {
            Some(v) => lit(v.is_null()),
            None => ScalarExpr::IsNull(inner),
        },
        other => other,
    })
}

fn fold_binary(left: ScalarExpr, op: Operator, right: ScalarExpr) -> ScalarExpr {
    match op {
        Operator::And => match (bool_literal(&left), bool_literal(&right)) {
            (Some(Some(false)), _) | (_, Some(Some(false))) => lit(false),
            (Some(Some(true)), _) => right,
            (_, Some(Some(true))) => left,
            (Some(None), Some(None)) => lit(ScalarValue::Boolean(None)),
            _ => left.and(right),
        },
        Operator::Or => match (bool_literal(&left), bool_literal(&right)) {
            (Some(Some(true)), _) | (_, Some(Some(true))) => lit(true),
            (Some(Some(false)), _) => right,
            (_, Some(Some(false))) => left,
            (Some(None), Some(None)) => lit(ScalarValue::Boolean(None)),
            _ => left.or(right),
        },
        Operator::Eq
        | Operator::NotEq
        | Operator::Lt
        | Operator::LtEq
        | Operator::Gt
        | Operator::GtEq => match (left.as_literal(), right.as_literal()) {
            (Some(l), Some(r)) if l.is_null() || r.is_null() => lit(ScalarValue::Boolean(None)),
            (Some(l), Some(r)) => match compare_literals(l, r) {
                Some(ord) => lit(comparison_holds(op, ord)),
                None => binary(left, op, right),
            },
            _ => binary(left, op, right),
        },
        _ => binary(left, op, right),
    }
}

fn binary(left: ScalarExpr, op: Operator, right: ScalarExpr) -> ScalarExpr {
    ScalarExpr::BinaryExpr {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn comparison_holds(op: Operator, ord: Ordering) -> bool {
    match op {
        Operator::Eq => ord == Ordering::Equal,
        Operator::NotEq => ord != Ordering::Equal,
        Operator::Lt => ord == Ordering::Less,
        Operator::LtEq => ord != Ordering::Greater,
        Operator::Gt => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    }
}

/// `Some(None)` is a boolean null.
fn as_bool(value: &ScalarValue) -> Option<Option<bool>> {
    match value {
        ScalarValue::Boolean(b) => Some(*b),
        ScalarValue::Null => Some(None),
        _ => None,
    }
}

fn bool_literal(expr: &ScalarExpr) -> Option<Option<bool>> {
    expr.as_literal().and_then(as_bool)
}

/// Compares two non null literals, widening numbers of different types.
pub fn compare_literals(left: &ScalarValue, right: &ScalarValue) -> Option<Ordering> {
    if left.get_datatype() == right.get_datatype() {
        return left.partial_cmp(right);
    }
    match (as_i128(left), as_i128(right)) {
        (Some(l), Some(r)) => Some(l.cmp(&r)),
        _ => as_f64(left)?.partial_cmp(&as_f64(right)?),
    }
}

pub(crate) fn as_i128(value: &ScalarValue) -> Option<i128> {
    match value {
        ScalarValue::Int8(v) => v.map(i128::from),
        ScalarValue::Int16(v) => v.map(i128::from),
        ScalarValue::Int32(v) => v.map(i128::from),
        ScalarValue::Int64(v) => v.map(i128::from),
        ScalarValue::UInt8(v) => v.map(i128::from),
        ScalarValue::UInt16(v) => v.map(i128::from),
        ScalarValue::UInt32(v) => v.map(i128::from),
        ScalarValue::UInt64(v) => v.map(i128::from),
        _ => None,
    }
}

pub(crate) fn as_f64(value: &ScalarValue) -> Option<f64> {
    match value {
        ScalarValue::Float32(v) => v.map(f64::from),
        ScalarValue::Float64(v) => *v,
        other => as_i128(other).map(|v| v as f64),
    }
}

/// Whether `expr` is a literal `false` or `NULL`, e.g. a filter rejecting every row.
pub fn is_constant_false_or_null(expr: &ScalarExpr) -> bool {
    match expr.as_literal() {
        Some(v) if v.is_null() => true,
        Some(ScalarValue::Boolean(Some(false))) => true,
        Some(v) => as_i128(v) == Some(0),
        None => false,
    }
}

fn is_constant_true(expr: &ScalarExpr) -> bool {
    matches!(expr.as_literal(), Some(ScalarValue::Boolean(Some(true))))
}

/// Matches `col = lit` or `lit = col` with a non null literal.
fn as_column_eq_constant(expr: &ScalarExpr) -> Option<(ColumnId, &ScalarValue)> {
    match expr {
        ScalarExpr::BinaryExpr {
            left,
            op: Operator::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (ScalarExpr::Column(c), ScalarExpr::Literal(v))
            | (ScalarExpr::Literal(v), ScalarExpr::Column(c))
                if !v.is_null() =>
            {
                Some((c.id(), v))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Substitutes `col = const` facts into the other conjuncts until nothing changes.
///
/// Facts are kept. Conjuncts folding to `true` are dropped, and a conjunct folding to `false`
/// or `NULL` collapses the whole list to a single `false`. Non-deterministic conjuncts and
/// conjuncts with side effects are never rewritten.
pub fn propagate_constant(conditions: Vec<ScalarExpr>) -> Vec<ScalarExpr> {
    let mut conditions: Vec<ScalarExpr> = conditions
        .iter()
        .flat_map(split_conjunction)
        .map(fold_constant)
        .collect();

    loop {
        let mut facts: HashMap<ColumnId, (usize, ScalarValue)> = HashMap::new();
        for (idx, cond) in conditions.iter().enumerate() {
            if let Some((column, value)) = as_column_eq_constant(cond) {
                facts.entry(column).or_insert_with(|| (idx, value.clone()));
            }
        }
        if facts.is_empty() {
            break;
        }

        let mut changed = false;
        for idx in 0..conditions.len() {
            let cond = &conditions[idx];
            if !is_deterministic(cond) || has_side_effects(cond) {
                continue;
            }
            let substituted = fold_constant(cond.clone().transform_up(&mut |e| match &e {
                ScalarExpr::Column(c) => match facts.get(&c.id()) {
                    Some((fact_idx, value)) if *fact_idx != idx => lit(value.clone()),
                    _ => e,
                },
                _ => e,
            }));
            if &substituted != cond {
                conditions[idx] = substituted;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    if conditions.iter().any(is_constant_false_or_null) {
        return vec![lit(false)];
    }
    conditions.retain(|c| !is_constant_true(c));
    conditions
}

/// Hoists the conjuncts shared by every disjunct of each `OR` in `conditions`.
///
/// `(a AND b) OR (a AND c)` becomes `a` and `b OR c`. If some disjunct consists of shared
/// conjuncts only, the residual `OR` is always true and is dropped.
pub fn extract_filters_from_dnfs(conditions: Vec<ScalarExpr>) -> Vec<ScalarExpr> {
    let mut result = Vec::with_capacity(conditions.len());
    for cond in conditions {
        let disjuncts = split_disjunction(&cond);
        if disjuncts.len() < 2 {
            result.push(cond);
            continue;
        }
        let disjunct_conjuncts: Vec<Vec<ScalarExpr>> =
            disjuncts.iter().map(split_conjunction).collect();
        let common: Vec<ScalarExpr> = disjunct_conjuncts[0]
            .iter()
            .filter(|c| is_deterministic(c))
            .filter(|c| disjunct_conjuncts[1..].iter().all(|d| d.contains(c)))
            .cloned()
            .collect();
        if common.is_empty() {
            result.push(cond);
            continue;
        }

        let mut residuals = Vec::with_capacity(disjunct_conjuncts.len());
        let mut always_true = false;
        for conjuncts in disjunct_conjuncts {
            match conjunction(conjuncts.into_iter().filter(|c| !common.contains(c))) {
                Some(residual) => residuals.push(residual),
                None => {
                    always_true = true;
                    break;
                }
            }
        }
        result.extend(common);
        if !always_true {
            result.extend(disjunction(residuals));
        }
    }
    result
}
