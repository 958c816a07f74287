//! Logical plan trees, the input of memo construction.

use std::sync::Arc;

use anyhow::anyhow;
use datafusion_expr::JoinType;

use crate::catalog::{IndexInfo, TableRef};
use crate::error::OptResult;
use crate::expr::aggregation::AggFuncDesc;
use crate::expr::ScalarExpr;
use crate::operator::{
    Aggregation, ByItem, DataSource, IndexScan, Join, Limit, LogicalOperator, OperatorTrait,
    Projection, Selection, SingleGather, Sort, TableDual, TableScan, TopN,
};
use crate::optimizer::OptimizerContext;
use crate::properties::{LogicalProperty, Schema};

pub mod explain;

pub type PlanNodeId = u32;

pub type PlanNodeRef = Arc<PlanNode>;

/// One node in a plan.
///
/// A node may be an input of several nodes, in which case the plan is a dag.
#[derive(Debug)]
pub struct PlanNode {
    id: PlanNodeId,
    operator: LogicalOperator,
    inputs: Vec<PlanNodeRef>,
    logical_prop: LogicalProperty,
}

/// The `eq` should ignore `id`.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator
            && self.inputs == other.inputs
            && self.logical_prop == other.logical_prop
    }
}

impl PlanNode {
    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn operator(&self) -> &LogicalOperator {
        &self.operator
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }

    pub fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    pub fn schema(&self) -> &Schema {
        self.logical_prop.schema()
    }
}

/// A single root logical plan.
#[derive(PartialEq, Debug)]
pub struct Plan {
    root: PlanNodeRef,
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }
}

/// Builds a plan bottom up, deriving the schema of each node as it's added.
///
/// The first failure is kept and returned by [`LogicalPlanBuilder::build`].
pub struct LogicalPlanBuilder<'a> {
    ctx: &'a OptimizerContext,
    root: Option<PlanNodeRef>,
    error: Option<anyhow::Error>,
    next_plan_node_id: PlanNodeId,
}

impl<'a> LogicalPlanBuilder<'a> {
    pub fn new(ctx: &'a OptimizerContext) -> Self {
        Self {
            ctx,
            root: None,
            error: None,
            next_plan_node_id: 0,
        }
    }

    fn reset_root(&mut self, new_root: PlanNodeRef) -> &mut Self {
        self.root = Some(new_root);
        self.next_plan_node_id += 1;
        self
    }

    fn add_node(&mut self, operator: LogicalOperator, inputs: Vec<PlanNodeRef>) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        let input_props: Vec<&LogicalProperty> = inputs.iter().map(|i| &i.logical_prop).collect();
        match operator.derive_logical_prop(&input_props, self.ctx) {
            Ok(logical_prop) => {
                let plan_node = Arc::new(PlanNode {
                    id: self.next_plan_node_id,
                    operator,
                    inputs,
                    logical_prop,
                });
                self.reset_root(plan_node)
            }
            Err(e) => {
                self.error = Some(e);
                self
            }
        }
    }

    fn add_unary(&mut self, operator: LogicalOperator) -> &mut Self {
        match self.root.take() {
            Some(input) => self.add_node(operator, vec![input]),
            None => {
                self.error.get_or_insert_with(|| anyhow!("{} has no input", operator.as_ref()));
                self
            }
        }
    }

    /// Continues building on top of an existing node, e.g. to share it between parents.
    pub fn node(&mut self, node: PlanNodeRef) -> &mut Self {
        if self.error.is_none() {
            self.root = Some(node);
        }
        self
    }

    pub fn scan(&mut self, table: TableRef) -> &mut Self {
        self.add_node(DataSource::new(table).into(), vec![])
    }

    pub fn table_scan(&mut self, table: TableRef) -> &mut Self {
        self.add_node(TableScan::new(table).into(), vec![])
    }

    pub fn index_scan(&mut self, table: TableRef, index: IndexInfo) -> &mut Self {
        self.add_node(IndexScan::new(table, index).into(), vec![])
    }

    pub fn table_dual(&mut self, schema: Schema) -> &mut Self {
        self.add_node(TableDual::new(schema).into(), vec![])
    }

    pub fn single_gather(&mut self, table: TableRef, index: Option<IndexInfo>) -> &mut Self {
        self.add_unary(SingleGather::new(table, index).into())
    }

    pub fn selection<I: IntoIterator<Item = ScalarExpr>>(&mut self, conditions: I) -> &mut Self {
        self.add_unary(Selection::new(conditions).into())
    }

    pub fn projection<I: IntoIterator<Item = ScalarExpr>>(&mut self, exprs: I) -> &mut Self {
        self.add_unary(Projection::new(exprs).into())
    }

    pub fn aggregate(
        &mut self,
        agg_funcs: Vec<AggFuncDesc>,
        group_by: Vec<ScalarExpr>,
    ) -> &mut Self {
        self.add_unary(Aggregation::new(agg_funcs, group_by).into())
    }

    pub fn sort(&mut self, by_items: Vec<ByItem>) -> &mut Self {
        self.add_unary(Sort::new(by_items).into())
    }

    pub fn limit(&mut self, offset: u64, count: u64) -> &mut Self {
        self.add_unary(Limit::new(offset, count).into())
    }

    pub fn top_n(&mut self, by_items: Vec<ByItem>, offset: u64, count: u64) -> &mut Self {
        self.add_unary(TopN::new(by_items, offset, count).into())
    }

    /// Joins current plan, as the left input, with `right`.
    pub fn join(
        &mut self,
        join_type: JoinType,
        conditions: &[ScalarExpr],
        right: PlanNodeRef,
    ) -> &mut Self {
        match self.root.take() {
            Some(left) => {
                let join = Join::new(join_type, conditions, left.schema(), right.schema());
                self.add_node(join.into(), vec![left, right])
            }
            None => {
                self.error.get_or_insert_with(|| anyhow!("Join has no left input"));
                self
            }
        }
    }

    /// Consume current plan, but not reset state, e.g. plan node id.
    ///
    /// This is useful for building multi child plan, e.g. join.
    pub fn build(&mut self) -> OptResult<Plan> {
        if let Some(e) = self.error.take() {
            self.root = None;
            return Err(e);
        }
        self.root
            .take()
            .map(Plan::new)
            .ok_or_else(|| anyhow!("Empty plan"))
    }
}
