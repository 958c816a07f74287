use datafusion_expr::{JoinType, Operator};
use std::fmt::Formatter;

use crate::error::OptResult;
use crate::expr::{extract_columns, has_side_effects, is_deterministic, Column, ScalarExpr};
use crate::operator::{DisplayFields, ListFmt, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{LogicalProperty, Schema};

/// Logical join operator.
///
/// The `ON` conjuncts are kept classified by the inputs they reference.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Join {
    join_type: JoinType,
    /// `left_col = right_col` conjuncts.
    equal_conditions: Vec<ScalarExpr>,
    /// Conjuncts referencing only the left input.
    left_conditions: Vec<ScalarExpr>,
    /// Conjuncts referencing only the right input.
    right_conditions: Vec<ScalarExpr>,
    other_conditions: Vec<ScalarExpr>,
    left_keys: Vec<Column>,
    right_keys: Vec<Column>,
}

/// `ON` conjuncts classified by [`extract_on_condition`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OnConditions {
    pub equal: Vec<ScalarExpr>,
    pub left: Vec<ScalarExpr>,
    pub right: Vec<ScalarExpr>,
    pub other: Vec<ScalarExpr>,
}

/// Matches `l = r` where `l` comes from `left` and `r` from `right`, in either order.
fn as_equal_condition(
    cond: &ScalarExpr,
    left: &Schema,
    right: &Schema,
) -> Option<(Column, Column)> {
    match cond {
        ScalarExpr::BinaryExpr {
            left: l,
            op: Operator::Eq,
            right: r,
        } => match (l.as_column(), r.as_column()) {
            (Some(l), Some(r)) if left.contains(l) && right.contains(r) => {
                Some((l.clone(), r.clone()))
            }
            (Some(l), Some(r)) if left.contains(r) && right.contains(l) => {
                Some((r.clone(), l.clone()))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Classifies join conjuncts by the inputs they reference.
///
/// A deterministic conjunct without columns is a filter on both sides. Non-deterministic
/// conjuncts and conjuncts with side effects are always `other`, so that they are evaluated
/// exactly once per joined row.
pub fn extract_on_condition(
    conds: &[ScalarExpr],
    left: &Schema,
    right: &Schema,
) -> OnConditions {
    let mut result = OnConditions::default();
    for cond in conds {
        if !is_deterministic(cond) || has_side_effects(cond) {
            result.other.push(cond.clone());
            continue;
        }
        if let Some((l, r)) = as_equal_condition(cond, left, right) {
            result
                .equal
                .push(ScalarExpr::Column(l).eq(ScalarExpr::Column(r)));
            continue;
        }
        let columns = extract_columns(cond);
        if columns.is_empty() {
            result.left.push(cond.clone());
            result.right.push(cond.clone());
        } else if columns.iter().all(|c| left.contains(c)) {
            result.left.push(cond.clone());
        } else if columns.iter().all(|c| right.contains(c)) {
            result.right.push(cond.clone());
        } else {
            result.other.push(cond.clone());
        }
    }
    result
}

impl Join {
    /// Creates a join with `ON` conjuncts `conditions` over inputs with schema `left` and
    /// `right`.
    pub fn new(join_type: JoinType, conditions: &[ScalarExpr], left: &Schema, right: &Schema) -> Self {
        Self::with_conditions(join_type, extract_on_condition(conditions, left, right))
    }

    pub fn with_conditions(join_type: JoinType, conditions: OnConditions) -> Self {
        let (left_keys, right_keys) = conditions
            .equal
            .iter()
            .filter_map(|cond| match cond {
                ScalarExpr::BinaryExpr { left, right, .. } => {
                    Some((left.as_column()?.clone(), right.as_column()?.clone()))
                }
                _ => None,
            })
            .unzip();
        Self {
            join_type,
            equal_conditions: conditions.equal,
            left_conditions: conditions.left,
            right_conditions: conditions.right,
            other_conditions: conditions.other,
            left_keys,
            right_keys,
        }
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn equal_conditions(&self) -> &[ScalarExpr] {
        &self.equal_conditions
    }

    pub fn left_conditions(&self) -> &[ScalarExpr] {
        &self.left_conditions
    }

    pub fn right_conditions(&self) -> &[ScalarExpr] {
        &self.right_conditions
    }

    pub fn other_conditions(&self) -> &[ScalarExpr] {
        &self.other_conditions
    }

    pub fn left_keys(&self) -> &[Column] {
        &self.left_keys
    }

    pub fn right_keys(&self) -> &[Column] {
        &self.right_keys
    }

    /// Every `ON` conjunct.
    pub fn all_conditions(&self) -> impl Iterator<Item = &ScalarExpr> {
        self.left_conditions
            .iter()
            .chain(self.right_conditions.iter())
            .chain(self.equal_conditions.iter())
            .chain(self.other_conditions.iter())
    }
}

impl OperatorTrait for Join {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        let (left, right) = match inputs {
            [left, right] => (left.schema(), right.schema()),
            _ => anyhow::bail!("Join expects two inputs, but got {}", inputs.len()),
        };
        let schema = match self.join_type {
            JoinType::LeftSemi | JoinType::LeftAnti => left.clone(),
            JoinType::RightSemi | JoinType::RightAnti => right.clone(),
            _ => left.join(right),
        };
        Ok(LogicalProperty::new(schema))
    }
}

impl DisplayFields for Join {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("join_type", &self.join_type);
        if !self.equal_conditions.is_empty() {
            s.field("equal", &ListFmt(&self.equal_conditions));
        }
        if !self.left_conditions.is_empty() {
            s.field("left", &ListFmt(&self.left_conditions));
        }
        if !self.right_conditions.is_empty() {
            s.field("right", &ListFmt(&self.right_conditions));
        }
        if !self.other_conditions.is_empty() {
            s.field("other", &ListFmt(&self.other_conditions));
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;

    use crate::expr::{col, func, lit, BuiltinFunc};
    use crate::operator::extract_on_condition;
    use crate::optimizer::OptimizerContext;
    use crate::properties::Schema;

    #[test]
    fn test_extract_on_condition() {
        let ctx = OptimizerContext::default();
        let (a, b) = (
            ctx.new_column("a", DataType::Int64),
            ctx.new_column("b", DataType::Int64),
        );
        let (c, d) = (
            ctx.new_column("c", DataType::Int64),
            ctx.new_column("d", DataType::Int64),
        );
        let left = Schema::new(vec![a.clone(), b.clone()]);
        let right = Schema::new(vec![c.clone(), d.clone()]);

        let rand_cond = col(&a).lt(func(BuiltinFunc::Rand, vec![]));
        let conds = vec![
            col(&c).eq(col(&a)),
            col(&b).gt(lit(1i64)),
            col(&d).lt(lit(2i64)),
            col(&b).plus(col(&d)).gt(lit(3i64)),
            rand_cond.clone(),
        ];
        let result = extract_on_condition(&conds, &left, &right);

        assert_eq!(vec![col(&a).eq(col(&c))], result.equal);
        assert_eq!(vec![conds[1].clone()], result.left);
        assert_eq!(vec![conds[2].clone()], result.right);
        assert_eq!(vec![conds[3].clone(), rand_cond], result.other);
    }
}
