use std::collections::HashSet;

use datafusion_expr::Operator;

use crate::expr::{BuiltinFunc, Column, ScalarExpr};
use crate::properties::Schema;

/// Splits `a AND (b AND c)` into `[a, b, c]`.
pub fn split_conjunction(expr: &ScalarExpr) -> Vec<ScalarExpr> {
    split_binary(expr, Operator::And)
}

/// Splits `a OR (b OR c)` into `[a, b, c]`.
pub fn split_disjunction(expr: &ScalarExpr) -> Vec<ScalarExpr> {
    split_binary(expr, Operator::Or)
}

fn split_binary(expr: &ScalarExpr, target: Operator) -> Vec<ScalarExpr> {
    let mut ret = Vec::new();
    let mut stack = vec![expr];
    while let Some(cur) = stack.pop() {
        match cur {
            ScalarExpr::BinaryExpr { left, op, right } if *op == target => {
                stack.push(right);
                stack.push(left);
            }
            other => ret.push(other.clone()),
        }
    }
    ret
}

/// Combines predicates with `AND`. Returns `None` for an empty input.
pub fn conjunction<I: IntoIterator<Item = ScalarExpr>>(exprs: I) -> Option<ScalarExpr> {
    exprs.into_iter().reduce(|acc, e| acc.and(e))
}

/// Combines predicates with `OR`. Returns `None` for an empty input.
pub fn disjunction<I: IntoIterator<Item = ScalarExpr>>(exprs: I) -> Option<ScalarExpr> {
    exprs.into_iter().reduce(|acc, e| acc.or(e))
}

/// Distinct columns referenced by `expr`, in order of first appearance.
pub fn extract_columns(expr: &ScalarExpr) -> Vec<Column> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    expr.visit(&mut |e| {
        if let ScalarExpr::Column(c) = e {
            if seen.insert(c.id()) {
                columns.push(c.clone());
            }
        }
        true
    });
    columns
}

/// Replaces every column of `schema` referenced by `expr` with the expression at the same
/// position of `exprs`.
///
/// `exprs` is usually a projection's expressions together with its output schema. Columns
/// without an expression at their position are kept.
pub fn column_substitute(expr: &ScalarExpr, schema: &Schema, exprs: &[ScalarExpr]) -> ScalarExpr {
    expr.clone().transform_up(&mut |e| match &e {
        ScalarExpr::Column(c) => match schema.index_of(c).and_then(|idx| exprs.get(idx)) {
            Some(substitute) => substitute.clone(),
            None => e,
        },
        _ => e,
    })
}

fn contains_func<F: Fn(BuiltinFunc) -> bool>(expr: &ScalarExpr, pred: F) -> bool {
    !expr.visit(&mut |e| match e {
        ScalarExpr::ScalarFunction { func, .. } => !pred(*func),
        _ => true,
    })
}

/// Whether `expr` assigns a session variable.
pub fn has_assign_set_var(expr: &ScalarExpr) -> bool {
    contains_func(expr, |f| f == BuiltinFunc::SetVar)
}

/// Whether `expr` reads or assigns a session variable.
pub fn has_get_set_var(expr: &ScalarExpr) -> bool {
    contains_func(expr, |f| matches!(f, BuiltinFunc::GetVar | BuiltinFunc::SetVar))
}

/// Whether evaluating `expr` is observable besides its value, e.g. `@a := 1` or `rand()`.
pub fn has_side_effects(expr: &ScalarExpr) -> bool {
    contains_func(expr, |f| f.has_mutable_effect())
}

pub fn exprs_have_side_effects(exprs: &[ScalarExpr]) -> bool {
    exprs.iter().any(has_side_effects)
}

pub fn is_deterministic(expr: &ScalarExpr) -> bool {
    !contains_func(expr, |f| !f.is_deterministic())
}

/// Removes repeated deterministic expressions, keeping the first occurrence.
///
/// Non-deterministic expressions are kept even if repeated, since each evaluation may yield
/// a different value.
pub fn remove_dup_exprs(exprs: Vec<ScalarExpr>) -> Vec<ScalarExpr> {
    let mut seen = HashSet::with_capacity(exprs.len());
    exprs
        .into_iter()
        .filter(|e| !is_deterministic(e) || seen.insert(e.clone()))
        .collect()
}

/// Mirrors a comparison so that `a op b` equals `b op' a`.
pub fn swap_comparison(op: Operator) -> Option<Operator> {
    match op {
        Operator::Eq => Some(Operator::Eq),
        Operator::NotEq => Some(Operator::NotEq),
        Operator::Lt => Some(Operator::Gt),
        Operator::LtEq => Some(Operator::GtEq),
        Operator::Gt => Some(Operator::Lt),
        Operator::GtEq => Some(Operator::LtEq),
        _ => None,
    }
}
