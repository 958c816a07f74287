//! Contains logical relational operators such as selection, join, aggregation, etc.
//!
//! Each operator kind has its own payload type, and [`LogicalOperator`] is the closed union
//! of them. Rules match operators by [`Operand`].
mod logical;
pub use logical::*;
mod selection;
pub use selection::*;
mod projection;
pub use projection::*;
mod aggregation;
pub use aggregation::*;
mod join;
pub use join::*;
mod sort;
pub use sort::*;
mod limit;
pub use limit::*;
mod table_scan;
pub use table_scan::*;
mod gather;
pub use gather::*;

use std::fmt::{Debug, Display, Formatter};

use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use strum_macros::AsRefStr;

use crate::error::OptResult;
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

#[enum_dispatch(LogicalOperator)]
pub trait OperatorTrait {
    /// Derives output property of this operator from properties of its inputs.
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty>;
}

#[enum_dispatch(LogicalOperator)]
pub trait DisplayFields {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result;
}

/// Operator kind matched by a pattern.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, AsRefStr)]
pub enum Operand {
    /// Matches any operator.
    Any,
    Selection,
    Projection,
    Aggregation,
    Join,
    Sort,
    Limit,
    TopN,
    DataSource,
    TableScan,
    IndexScan,
    SingleGather,
    TableDual,
}

impl Operand {
    pub fn matches(&self, other: Operand) -> bool {
        *self == Operand::Any || other == Operand::Any || *self == other
    }
}

/// Formats a list with `Display` of its items, for [`DisplayFields`].
pub(crate) struct ListFmt<'a, T>(pub &'a [T]);

impl<'a, T: Display> Debug for ListFmt<'a, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

/// Input of a unary operator.
fn single_input<'a>(inputs: &[&'a LogicalProperty]) -> OptResult<&'a LogicalProperty> {
    match inputs {
        [input] => Ok(input),
        _ => anyhow::bail!("Expect exactly one input, but got {}", inputs.len()),
    }
}
