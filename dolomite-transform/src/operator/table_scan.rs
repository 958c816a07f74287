use std::fmt::Formatter;

use crate::catalog::{IndexInfo, TableRef};
use crate::error::OptResult;
use crate::expr::{Column, ScalarExpr};
use crate::operator::{DisplayFields, ListFmt, LogicalOperator, OperatorTrait, SingleGather};
use crate::optimizer::OptimizerContext;
use crate::properties::{LogicalProperty, Schema};
use crate::ranger::{DetachRangeResult, IndexRange};

fn table_prop(table: &TableRef, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
    if !inputs.is_empty() {
        anyhow::bail!("Scan of {} expects no inputs, but got {}", table.name(), inputs.len());
    }
    Ok(LogicalProperty::new(Schema::new(table.columns().to_vec())))
}

/// A table whose access path has not been chosen yet.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DataSource {
    table: TableRef,
}

impl DataSource {
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Returns every access path of this table, each as a gather over its storage tier scan.
    ///
    /// The first path is always the table scan, followed by one index scan per index.
    pub fn convert_to_gathers(&self) -> Vec<(SingleGather, LogicalOperator)> {
        let mut paths = vec![(
            SingleGather::new(self.table.clone(), None),
            TableScan::new(self.table.clone()).into(),
        )];
        paths.extend(
            self.table
                .indices()
                .iter()
                .filter(|index| !index.columns().is_empty())
                .map(|index| {
                    (
                        SingleGather::new(self.table.clone(), Some(index.clone())),
                        IndexScan::new(self.table.clone(), index.clone()).into(),
                    )
                }),
        );
        paths
    }
}

impl OperatorTrait for DataSource {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        table_prop(&self.table, inputs)
    }
}

impl DisplayFields for DataSource {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("").field("table", &self.table.name()).finish()
    }
}

/// Reads a table in handle order.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableScan {
    table: TableRef,
    handle: Option<Column>,
    /// Conditions on `handle` evaluated as key ranges.
    access_conds: Vec<ScalarExpr>,
}

impl TableScan {
    pub fn new(table: TableRef) -> Self {
        let handle = table.handle().cloned();
        Self {
            table,
            handle,
            access_conds: vec![],
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn handle(&self) -> Option<&Column> {
        self.handle.as_ref()
    }

    pub fn access_conds(&self) -> &[ScalarExpr] {
        &self.access_conds
    }

    /// Returns a copy of this scan which additionally evaluates `conds` as key ranges.
    pub fn with_access_conds<I: IntoIterator<Item = ScalarExpr>>(&self, conds: I) -> Self {
        let mut scan = self.clone();
        scan.access_conds.extend(conds);
        scan
    }
}

impl OperatorTrait for TableScan {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        table_prop(&self.table, inputs)
    }
}

impl DisplayFields for TableScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("table", &self.table.name());
        if !self.access_conds.is_empty() {
            s.field("access_conds", &ListFmt(&self.access_conds));
        }
        s.finish()
    }
}

/// Reads a table through a secondary index.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct IndexScan {
    table: TableRef,
    index: IndexInfo,
    idx_cols: Vec<Column>,
    idx_col_lens: Vec<Option<usize>>,
    access_conds: Vec<ScalarExpr>,
    /// Number of leading index columns restricted to single values.
    eq_cond_count: usize,
    ranges: Vec<IndexRange>,
    /// Whether rows must be looked up in the table after reading the index.
    is_double_read: bool,
}

impl IndexScan {
    pub fn new(table: TableRef, index: IndexInfo) -> Self {
        let is_double_read = !index.is_covering(&table);
        Self {
            idx_cols: index.columns().to_vec(),
            idx_col_lens: index.col_lens().to_vec(),
            table,
            index,
            access_conds: vec![],
            eq_cond_count: 0,
            ranges: vec![IndexRange::full()],
            is_double_read,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn index(&self) -> &IndexInfo {
        &self.index
    }

    pub fn idx_cols(&self) -> &[Column] {
        &self.idx_cols
    }

    pub fn idx_col_lens(&self) -> &[Option<usize>] {
        &self.idx_col_lens
    }

    pub fn access_conds(&self) -> &[ScalarExpr] {
        &self.access_conds
    }

    pub fn eq_cond_count(&self) -> usize {
        self.eq_cond_count
    }

    pub fn ranges(&self) -> &[IndexRange] {
        &self.ranges
    }

    pub fn is_double_read(&self) -> bool {
        self.is_double_read
    }

    /// Returns a copy of this scan with access conditions and ranges taken from `res`.
    pub fn with_ranges(&self, res: &DetachRangeResult) -> Self {
        Self {
            access_conds: res.access_conds.clone(),
            eq_cond_count: res.eq_cond_count,
            ranges: res.ranges.clone(),
            ..self.clone()
        }
    }
}

impl OperatorTrait for IndexScan {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        table_prop(&self.table, inputs)
    }
}

impl DisplayFields for IndexScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("table", &self.table.name())
            .field("index", &self.index.name());
        if !self.access_conds.is_empty() {
            s.field("access_conds", &ListFmt(&self.access_conds))
                .field("ranges", &ListFmt(&self.ranges));
        }
        s.finish()
    }
}

/// The empty relation with the given schema.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableDual {
    schema: Schema,
}

impl TableDual {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl OperatorTrait for TableDual {
    fn derive_logical_prop(
        &self,
        _inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        Ok(LogicalProperty::new(self.schema.clone()))
    }
}

impl DisplayFields for TableDual {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("schema", &format_args!("{}", self.schema))
            .finish()
    }
}
