use enum_as_inner::EnumAsInner;
use std::fmt::{Display, Formatter};

use crate::operator::{
    Aggregation, DataSource, DisplayFields, IndexScan, Join, Limit, Operand, Projection,
    Selection, SingleGather, Sort, TableDual, TableScan, TopN,
};
use enum_dispatch::enum_dispatch;
use strum_macros::AsRefStr;

/// Logical relational operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, AsRefStr)]
#[enum_dispatch]
pub enum LogicalOperator {
    LogicalSelection(Selection),
    LogicalProjection(Projection),
    LogicalAggregation(Aggregation),
    LogicalJoin(Join),
    LogicalSort(Sort),
    LogicalLimit(Limit),
    LogicalTopN(TopN),
    LogicalDataSource(DataSource),
    LogicalTableScan(TableScan),
    LogicalIndexScan(IndexScan),
    SingleGather(SingleGather),
    TableDual(TableDual),
}

impl LogicalOperator {
    pub fn operand(&self) -> Operand {
        match self {
            LogicalOperator::LogicalSelection(_) => Operand::Selection,
            LogicalOperator::LogicalProjection(_) => Operand::Projection,
            LogicalOperator::LogicalAggregation(_) => Operand::Aggregation,
            LogicalOperator::LogicalJoin(_) => Operand::Join,
            LogicalOperator::LogicalSort(_) => Operand::Sort,
            LogicalOperator::LogicalLimit(_) => Operand::Limit,
            LogicalOperator::LogicalTopN(_) => Operand::TopN,
            LogicalOperator::LogicalDataSource(_) => Operand::DataSource,
            LogicalOperator::LogicalTableScan(_) => Operand::TableScan,
            LogicalOperator::LogicalIndexScan(_) => Operand::IndexScan,
            LogicalOperator::SingleGather(_) => Operand::SingleGather,
            LogicalOperator::TableDual(_) => Operand::TableDual,
        }
    }

    /// Number of inputs of this operator.
    pub fn arity(&self) -> usize {
        match self.operand() {
            Operand::Join => 2,
            Operand::DataSource | Operand::TableScan | Operand::IndexScan | Operand::TableDual => 0,
            _ => 1,
        }
    }
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())?;
        self.display(f)
    }
}
