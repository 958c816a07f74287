use std::fmt::Formatter;

use crate::catalog::{IndexInfo, TableRef};
use crate::error::OptResult;
use crate::operator::{single_input, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Transfers rows read from `table` in the storage tier to the coordinator tier.
///
/// `index` is set when the rows are read through a secondary index.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SingleGather {
    table: TableRef,
    index: Option<IndexInfo>,
}

impl SingleGather {
    pub fn new(table: TableRef, index: Option<IndexInfo>) -> Self {
        Self { table, index }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn index(&self) -> Option<&IndexInfo> {
        self.index.as_ref()
    }
}

impl OperatorTrait for SingleGather {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        Ok(single_input(inputs)?.clone())
    }
}

impl DisplayFields for SingleGather {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("table", &self.table.name());
        if let Some(index) = &self.index {
            s.field("index", &index.name());
        }
        s.finish()
    }
}
