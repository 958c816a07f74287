use std::fmt::Formatter;

use crate::error::OptResult;
use crate::expr::ScalarExpr;
use crate::operator::{single_input, DisplayFields, ListFmt, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Keeps rows satisfying every condition.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Selection {
    conditions: Vec<ScalarExpr>,
}

impl Selection {
    pub fn new<I: IntoIterator<Item = ScalarExpr>>(conditions: I) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn conditions(&self) -> &[ScalarExpr] {
        &self.conditions
    }
}

impl OperatorTrait for Selection {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        Ok(single_input(inputs)?.clone())
    }
}

impl DisplayFields for Selection {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("conditions", &ListFmt(&self.conditions))
            .finish()
    }
}
