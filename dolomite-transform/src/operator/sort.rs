use std::fmt::{Display, Formatter};

use crate::error::OptResult;
use crate::expr::ScalarExpr;
use crate::operator::{single_input, DisplayFields, ListFmt, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// A sort key.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ByItem {
    pub expr: ScalarExpr,
    pub desc: bool,
}

impl ByItem {
    pub fn asc(expr: ScalarExpr) -> Self {
        Self { expr, desc: false }
    }

    pub fn desc(expr: ScalarExpr) -> Self {
        Self { expr, desc: true }
    }
}

impl Display for ByItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let order = if self.desc { "desc" } else { "asc" };
        write!(f, "{} {}", self.expr, order)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Sort {
    by_items: Vec<ByItem>,
}

impl Sort {
    pub fn new(by_items: Vec<ByItem>) -> Self {
        Self { by_items }
    }

    pub fn by_items(&self) -> &[ByItem] {
        &self.by_items
    }
}

impl OperatorTrait for Sort {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        Ok(single_input(inputs)?.clone())
    }
}

impl DisplayFields for Sort {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("by_items", &ListFmt(&self.by_items))
            .finish()
    }
}
