use std::fmt::Formatter;

use crate::error::OptResult;
use crate::expr::aggregation::{AggFuncDesc, AggFuncKind};
use crate::expr::{Column, ScalarExpr};
use crate::operator::{single_input, DisplayFields, ListFmt, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{LogicalProperty, Schema};

/// Outputs one column per aggregate function. Group by columns are exposed through
/// `FirstRow` functions.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Aggregation {
    agg_funcs: Vec<AggFuncDesc>,
    group_by: Vec<ScalarExpr>,
}

impl Aggregation {
    pub fn new(agg_funcs: Vec<AggFuncDesc>, group_by: Vec<ScalarExpr>) -> Self {
        Self {
            agg_funcs,
            group_by,
        }
    }

    pub fn agg_funcs(&self) -> &[AggFuncDesc] {
        &self.agg_funcs
    }

    pub fn group_by(&self) -> &[ScalarExpr] {
        &self.group_by
    }

    /// Group by items which are bare columns.
    pub fn group_by_columns(&self) -> impl Iterator<Item = &Column> {
        self.group_by.iter().filter_map(|e| e.as_column())
    }
}

impl OperatorTrait for Aggregation {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        single_input(inputs)?;
        let columns = self
            .agg_funcs
            .iter()
            .map(|func| {
                let group_by_column = match (func.kind, func.args.as_slice()) {
                    (AggFuncKind::FirstRow, [ScalarExpr::Column(c)])
                        if self.group_by_columns().any(|g| g == c) =>
                    {
                        Some(c.clone())
                    }
                    _ => None,
                };
                group_by_column
                    .unwrap_or_else(|| ctx.new_column(func.to_string(), func.ret_type.clone()))
            })
            .collect();
        Ok(LogicalProperty::new(Schema::new(columns)))
    }
}

impl DisplayFields for Aggregation {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("agg_funcs", &ListFmt(&self.agg_funcs))
            .field("group_by", &ListFmt(&self.group_by))
            .finish()
    }
}
