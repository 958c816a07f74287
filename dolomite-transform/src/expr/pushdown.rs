//! Classifies expressions by whether the storage tier can evaluate them.

use datafusion_expr::Operator;

use crate::expr::{BuiltinFunc, ScalarExpr};
use crate::optimizer::OptimizerContext;

fn is_pushable_operator(op: Operator) -> bool {
    matches!(
        op,
        Operator::Eq
            | Operator::NotEq
            | Operator::Lt
            | Operator::LtEq
            | Operator::Gt
            | Operator::GtEq
            | Operator::Plus
            | Operator::Minus
            | Operator::Multiply
            | Operator::Divide
            | Operator::Modulo
            | Operator::And
            | Operator::Or
            | Operator::BitwiseAnd
            | Operator::BitwiseOr
            | Operator::BitwiseXor
    )
}

fn is_pushable_func(func: BuiltinFunc, ctx: &OptimizerContext) -> bool {
    !matches!(
        func,
        BuiltinFunc::GetVar
            | BuiltinFunc::SetVar
            | BuiltinFunc::Sleep
            | BuiltinFunc::Uuid
            | BuiltinFunc::Rand
    ) && !ctx.is_storage_blacklisted(func)
}

/// Whether the storage tier can evaluate every node of `expr`.
pub fn can_push_to_storage(expr: &ScalarExpr, ctx: &OptimizerContext) -> bool {
    expr.visit(&mut |e| match e {
        ScalarExpr::BinaryExpr { op, .. } => is_pushable_operator(*op),
        ScalarExpr::ScalarFunction { func, .. } => is_pushable_func(*func, ctx),
        _ => true,
    })
}

/// Splits `exprs` into `(pushed, remained)`, keeping the relative order in both.
pub fn split_pushable(
    exprs: &[ScalarExpr],
    ctx: &OptimizerContext,
) -> (Vec<ScalarExpr>, Vec<ScalarExpr>) {
    exprs
        .iter()
        .cloned()
        .partition(|e| can_push_to_storage(e, ctx))
}
