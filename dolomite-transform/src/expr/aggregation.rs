//! Aggregate function descriptors and two stage aggregation helpers.

use std::fmt::{Display, Formatter};

use arrow_schema::DataType;
use itertools::Itertools;
use strum_macros::{AsRefStr, EnumString};

use crate::expr::pushdown;
use crate::expr::{col, ScalarExpr};
use crate::optimizer::OptimizerContext;
use crate::properties::Schema;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AggFuncKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    /// Value of the first row of each group.
    FirstRow,
}

impl AggFuncKind {
    /// Whether the partial stage must output a row count for the final stage.
    pub fn need_count(&self) -> bool {
        matches!(self, AggFuncKind::Count | AggFuncKind::Avg)
    }

    /// Whether the partial stage must output a value for the final stage.
    pub fn need_value(&self) -> bool {
        !matches!(self, AggFuncKind::Count)
    }

    fn partial_output_len(&self) -> usize {
        usize::from(self.need_count()) + usize::from(self.need_value())
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, AsRefStr)]
pub enum AggMode {
    /// Raw rows in, final values out.
    Complete,
    /// Raw rows in, partial results out.
    Partial1,
    /// Partial results in, final values out.
    Final,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct AggFuncDesc {
    pub kind: AggFuncKind,
    pub args: Vec<ScalarExpr>,
    pub mode: AggMode,
    pub distinct: bool,
    pub ret_type: DataType,
}

impl AggFuncDesc {
    /// Creates a complete mode aggregate function.
    pub fn new(kind: AggFuncKind, args: Vec<ScalarExpr>, ret_type: DataType) -> Self {
        Self {
            kind,
            args,
            mode: AggMode::Complete,
            distinct: false,
            ret_type,
        }
    }

    pub fn with_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn with_mode(mut self, mode: AggMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Display for AggFuncDesc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}{})",
            self.kind.as_ref(),
            if self.distinct { "distinct " } else { "" },
            self.args.iter().join(", ")
        )
    }
}

/// Result of [`build_final_mode_aggregation`].
pub struct FinalModeAggregation {
    pub final_funcs: Vec<AggFuncDesc>,
    pub final_group_by: Vec<ScalarExpr>,
    /// Output of the partial stage, which is the input of the final stage.
    pub partial_schema: Schema,
}

/// Builds the final stage of a two stage aggregation from its partial stage.
///
/// The partial stage outputs, for each function in order, a count column if
/// [`AggFuncKind::need_count`] and a value column if [`AggFuncKind::need_value`], followed by
/// one column per group by item. A group by item which is a bare column keeps its identity.
/// `agg_schema` is the output schema of the original aggregation.
pub fn build_final_mode_aggregation(
    partial_funcs: &[AggFuncDesc],
    group_by: &[ScalarExpr],
    agg_schema: &Schema,
    ctx: &OptimizerContext,
) -> FinalModeAggregation {
    let mut partial_schema = Schema::default();
    let mut final_funcs = Vec::with_capacity(partial_funcs.len());
    for (idx, func) in partial_funcs.iter().enumerate() {
        let mut args = Vec::with_capacity(func.kind.partial_output_len());
        if func.kind.need_count() {
            let count = ctx.new_column(format!("partial_count_{}", idx), DataType::Int64);
            args.push(col(&count));
            partial_schema.push(count);
        }
        if func.kind.need_value() {
            let value_type = agg_schema
                .columns()
                .get(idx)
                .map(|c| c.data_type().clone())
                .unwrap_or_else(|| func.ret_type.clone());
            let value = ctx.new_column(format!("partial_value_{}", idx), value_type);
            args.push(col(&value));
            partial_schema.push(value);
        }
        final_funcs.push(AggFuncDesc {
            kind: func.kind,
            args,
            mode: AggMode::Final,
            distinct: false,
            ret_type: func.ret_type.clone(),
        });
    }

    let mut final_group_by = Vec::with_capacity(group_by.len());
    for item in group_by {
        let column = match item.as_column() {
            Some(c) => c.clone(),
            None => ctx.new_column(format!("{}", item), item.data_type()),
        };
        final_group_by.push(col(&column));
        partial_schema.push(column);
    }

    FinalModeAggregation {
        final_funcs,
        final_group_by,
        partial_schema,
    }
}

/// Drops partial `FirstRow(x)` functions whose argument is a group by item.
///
/// The group by item is already an output of the partial stage, so the matching final
/// function reads the group by column instead, and the value column is removed from
/// `partial_schema`. Returns the remaining partial functions.
pub fn remove_unnecessary_first_row(
    final_funcs: &mut [AggFuncDesc],
    final_group_by: &[ScalarExpr],
    partial_funcs: Vec<AggFuncDesc>,
    partial_group_by: &[ScalarExpr],
    partial_schema: &mut Schema,
) -> Vec<AggFuncDesc> {
    let mut partial_cursor = 0;
    let mut remained = Vec::with_capacity(partial_funcs.len());
    for (idx, func) in partial_funcs.into_iter().enumerate() {
        if func.kind == AggFuncKind::FirstRow {
            let group_by_idx = func.args.first().and_then(|arg| {
                partial_group_by
                    .iter()
                    .take(final_group_by.len())
                    .position(|item| item == arg)
            });
            if let Some(group_by_idx) = group_by_idx {
                final_funcs[idx].args = vec![final_group_by[group_by_idx].clone()];
                partial_schema.remove(partial_cursor);
                continue;
            }
        }
        partial_cursor += func.kind.partial_output_len();
        remained.push(func);
    }
    remained
}

/// Whether a complete mode aggregation can be split, with its partial stage evaluated by the
/// storage tier.
pub fn can_push_to_storage(
    funcs: &[AggFuncDesc],
    group_by: &[ScalarExpr],
    ctx: &OptimizerContext,
) -> bool {
    ctx.config().enable_aggregation_split
        && funcs.iter().all(|f| {
            !f.distinct
                && f.args
                    .iter()
                    .all(|arg| pushdown::can_push_to_storage(arg, ctx))
        })
        && group_by
            .iter()
            .all(|item| pushdown::can_push_to_storage(item, ctx))
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;

    use crate::expr::aggregation::{
        build_final_mode_aggregation, can_push_to_storage, remove_unnecessary_first_row,
        AggFuncDesc, AggFuncKind, AggMode,
    };
    use crate::expr::{col, get_var, ScalarExpr};
    use crate::optimizer::{OptimizerConfig, OptimizerContext};
    use crate::properties::Schema;

    #[test]
    fn test_build_final_mode_aggregation() {
        let ctx = OptimizerContext::default();
        let (a, b) = (
            ctx.new_column("a", DataType::Int64),
            ctx.new_column("b", DataType::Int64),
        );
        let funcs = vec![
            AggFuncDesc::new(AggFuncKind::Count, vec![col(&a)], DataType::Int64),
            AggFuncDesc::new(AggFuncKind::Avg, vec![col(&a)], DataType::Float64),
            AggFuncDesc::new(AggFuncKind::FirstRow, vec![col(&b)], DataType::Int64),
        ];
        let agg_schema = Schema::new(vec![
            ctx.new_column("count", DataType::Int64),
            ctx.new_column("avg", DataType::Float64),
            b.clone(),
        ]);
        let group_by = vec![col(&b)];

        let mut result = build_final_mode_aggregation(&funcs, &group_by, &agg_schema, &ctx);

        // count: [count], avg: [count, value], first_row: [value], group by: [b]
        assert_eq!(5, result.partial_schema.len());
        assert_eq!(&b, &result.partial_schema.columns()[4]);
        assert_eq!(vec![col(&b)], result.final_group_by);
        assert!(result.final_funcs.iter().all(|f| f.mode == AggMode::Final));
        assert_eq!(
            vec![
                col(&result.partial_schema.columns()[1]),
                col(&result.partial_schema.columns()[2])
            ],
            result.final_funcs[1].args
        );

        let partial_funcs: Vec<AggFuncDesc> = funcs
            .into_iter()
            .map(|f| f.with_mode(AggMode::Partial1))
            .collect();
        let partial_funcs = remove_unnecessary_first_row(
            &mut result.final_funcs,
            &result.final_group_by,
            partial_funcs,
            &group_by,
            &mut result.partial_schema,
        );

        assert_eq!(2, partial_funcs.len());
        assert_eq!(4, result.partial_schema.len());
        assert_eq!(vec![col(&b)], result.final_funcs[2].args);
    }

    #[test]
    fn test_can_push_to_storage() {
        let ctx = OptimizerContext::default();
        let a = ctx.new_column("a", DataType::Int64);
        let sum = AggFuncDesc::new(AggFuncKind::Sum, vec![col(&a)], DataType::Int64);
        let group_by: Vec<ScalarExpr> = vec![col(&a)];

        assert!(can_push_to_storage(&[sum.clone()], &group_by, &ctx));
        assert!(!can_push_to_storage(
            &[sum.clone().with_distinct()],
            &group_by,
            &ctx
        ));
        assert!(!can_push_to_storage(&[sum.clone()], &[get_var("v")], &ctx));

        let disabled = OptimizerContext::new(OptimizerConfig {
            enable_aggregation_split: false,
            ..Default::default()
        })
        .unwrap();
        assert!(!can_push_to_storage(&[sum], &group_by, &disabled));
    }
}
