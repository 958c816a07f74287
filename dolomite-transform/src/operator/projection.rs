use std::fmt::Formatter;

use crate::error::OptResult;
use crate::expr::ScalarExpr;
use crate::operator::{single_input, DisplayFields, ListFmt, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{LogicalProperty, Schema};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Projection {
    exprs: Vec<ScalarExpr>,
}

impl Projection {
    pub fn new<I: IntoIterator<Item = ScalarExpr>>(exprs: I) -> Self {
        Self {
            exprs: exprs.into_iter().collect(),
        }
    }

    pub fn exprs(&self) -> &[ScalarExpr] {
        &self.exprs
    }
}

impl OperatorTrait for Projection {
    /// A bare column keeps its identity, any other expression produces a new column.
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        single_input(inputs)?;
        let columns = self
            .exprs
            .iter()
            .map(|e| match e.as_column() {
                Some(c) => c.clone(),
                None => ctx.new_column(e.to_string(), e.data_type()),
            })
            .collect();
        Ok(LogicalProperty::new(Schema::new(columns)))
    }
}

impl DisplayFields for Projection {
    fn display(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("").field("exprs", &ListFmt(&self.exprs)).finish()
    }
}
