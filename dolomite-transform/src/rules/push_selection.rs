//! Rules pushing a selection below its input.

use anyhow::bail;
use log::debug;

use crate::cascades::Memo;
use crate::error::OptResult;
use crate::expr::pushdown::split_pushable;
use crate::expr::{
    column_substitute, extract_columns, has_assign_set_var, has_get_set_var, has_side_effects,
    is_deterministic, remove_dup_exprs, ScalarExpr,
};
use crate::operator::LogicalOperator::{
    LogicalAggregation, LogicalIndexScan, LogicalProjection, LogicalSelection, LogicalSort,
    LogicalTableScan, SingleGather,
};
use crate::operator::{Operand, Selection};
use crate::optimizer::OptimizerContext;
use crate::properties::EngineTier;
use crate::ranger::{detach_cond_and_build_range_for_index, detach_conds_for_column};
use crate::rules::RuleId::{
    PushSelDownAggregation, PushSelDownIndexScan, PushSelDownProjection,
    PushSelDownSingleGather, PushSelDownSort, PushSelDownTableScan,
};
use crate::rules::{in_group_like, OptExpression, Pattern, Rule, RuleId, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref PUSH_SEL_DOWN_TABLE_SCAN_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Selection, EngineTier::storage_only()))
          .leaf((Operand::TableScan, EngineTier::storage_only()))
        .end_node()
    };
    static ref PUSH_SEL_DOWN_INDEX_SCAN_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Selection, EngineTier::storage_only()))
          .leaf((Operand::IndexScan, EngineTier::storage_only()))
        .end_node()
    };
    static ref PUSH_SEL_DOWN_SINGLE_GATHER_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Selection, EngineTier::coordinator_only()))
          .begin_node((Operand::SingleGather, EngineTier::coordinator_only()))
            .leaf((Operand::Any, EngineTier::storage_only()))
          .end_node()
        .end_node()
    };
    static ref PUSH_SEL_DOWN_SORT_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Selection, EngineTier::coordinator_only()))
          .leaf((Operand::Sort, EngineTier::coordinator_only()))
        .end_node()
    };
    static ref PUSH_SEL_DOWN_PROJECTION_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Selection, EngineTier::coordinator_only()))
          .leaf((Operand::Projection, EngineTier::coordinator_only()))
        .end_node()
    };
    static ref PUSH_SEL_DOWN_AGGREGATION_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Selection, EngineTier::all()))
          .leaf((Operand::Aggregation, EngineTier::all()))
        .end_node()
    };
}

/// Wraps `input` with a selection of `conditions`, unless there is none.
fn with_selection(conditions: Vec<ScalarExpr>, input: OptExpression) -> OptExpression {
    if conditions.is_empty() {
        input
    } else {
        OptExpression::with_operator(Selection::new(conditions), vec![input])
    }
}

/// Moves conditions on the handle column of a table scan into its access conditions.
#[derive(Clone, Default)]
pub struct PushSelDownTableScanRule {}

impl PushSelDownTableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushSelDownTableScanRule {
    fn pattern(&self) -> &Pattern {
        &PUSH_SEL_DOWN_TABLE_SCAN_PATTERN
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (selection, scan) = match (input.get_operator(memo)?, input[0].get_operator(memo)?) {
            (LogicalSelection(selection), LogicalTableScan(scan)) => (selection, scan),
            _ => bail!("Pattern miss matched!"),
        };
        let handle = match scan.handle() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        let (access, remained) = detach_conds_for_column(selection.conditions(), handle);
        if access.is_empty() {
            return Ok(());
        }

        let new_scan = OptExpression::with_operator(scan.with_access_conds(access), vec![]);
        let new_expr = if remained.is_empty() {
            new_scan
        } else {
            let scan_schema = input[0].schema(memo)?.clone();
            with_selection(remained, new_scan.in_new_group(scan_schema))
        };
        result.add(new_expr);
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        PushSelDownTableScan
    }
}

/// Builds key ranges of an index scan from conditions above it.
///
/// Conditions already used by the scan are merged in first, so applying the rule again to its
/// own output produces nothing.
#[derive(Clone, Default)]
pub struct PushSelDownIndexScanRule {}

impl PushSelDownIndexScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushSelDownIndexScanRule {
    fn pattern(&self) -> &Pattern {
        &PUSH_SEL_DOWN_INDEX_SCAN_PATTERN
    }

    fn matches(&self, input: &OptExpression, memo: &Memo, _ctx: &OptimizerContext) -> bool {
        matches!(
            input[0].get_operator(memo),
            Ok(LogicalIndexScan(scan)) if !scan.idx_cols().is_empty()
        )
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (selection, scan) = match (input.get_operator(memo)?, input[0].get_operator(memo)?) {
            (LogicalSelection(selection), LogicalIndexScan(scan)) => (selection, scan),
            _ => bail!("Pattern miss matched!"),
        };

        let conds = remove_dup_exprs(
            selection
                .conditions()
                .iter()
                .chain(scan.access_conds())
                .cloned()
                .collect(),
        );
        let res = detach_cond_and_build_range_for_index(&conds, scan.idx_cols(), scan.idx_col_lens())?;

        let unchanged = res.access_conds.len() == scan.access_conds().len()
            && res
                .access_conds
                .iter()
                .all(|cond| scan.access_conds().contains(cond));
        if unchanged {
            debug!("Access conditions of index {} unchanged", scan.index().name());
            return Ok(());
        }

        let new_scan = OptExpression::with_operator(scan.with_ranges(&res), vec![]);
        let new_expr = if res.remained_conds.is_empty() {
            new_scan
        } else {
            let scan_schema = input[0].schema(memo)?.clone();
            with_selection(res.remained_conds, new_scan.in_new_group(scan_schema))
        };
        result.add(new_expr);
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        PushSelDownIndexScan
    }
}

/// Pushes conditions the storage tier can evaluate below a gather.
#[derive(Clone, Default)]
pub struct PushSelDownSingleGatherRule {}

impl PushSelDownSingleGatherRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushSelDownSingleGatherRule {
    fn pattern(&self) -> &Pattern {
        &PUSH_SEL_DOWN_SINGLE_GATHER_PATTERN
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (selection, gather) = match (input.get_operator(memo)?, input[0].get_operator(memo)?)
        {
            (LogicalSelection(selection), SingleGather(gather)) => (selection, gather),
            _ => bail!("Pattern miss matched!"),
        };
        let child = &input[0][0];
        let child_group = match child.group_id() {
            Some(group_id) => group_id,
            None => bail!("Pattern miss matched!"),
        };

        let (pushed, remained) = split_pushable(selection.conditions(), ctx);
        if pushed.is_empty() {
            return Ok(());
        }

        let pushed_sel = in_group_like(
            OptExpression::with_operator(Selection::new(pushed), vec![child.clone()]),
            memo,
            child_group,
        );
        let new_gather = OptExpression::with_operator(gather.clone(), vec![pushed_sel]);
        let new_expr = if remained.is_empty() {
            new_gather
        } else {
            let gather_schema = input[0].schema(memo)?.clone();
            with_selection(
                remained,
                new_gather.in_new_group_with_tier(gather_schema, EngineTier::Coordinator),
            )
        };
        result.add(new_expr);
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        PushSelDownSingleGather
    }
}

/// Swaps a selection with the sort below it.
#[derive(Clone, Default)]
pub struct PushSelDownSortRule {}

impl PushSelDownSortRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushSelDownSortRule {
    fn pattern(&self) -> &Pattern {
        &PUSH_SEL_DOWN_SORT_PATTERN
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (selection, sort) = match (input.get_operator(memo)?, input[0].get_operator(memo)?) {
            (LogicalSelection(selection), LogicalSort(sort)) => (selection, sort),
            _ => bail!("Pattern miss matched!"),
        };
        let child = input[0][0].clone();
        let child_schema = child.schema(memo)?.clone();

        let new_sel = OptExpression::with_operator(selection.clone(), vec![child])
            .in_new_group(child_schema);
        result.add(OptExpression::with_operator(sort.clone(), vec![new_sel]));
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        PushSelDownSort
    }
}

/// Pushes conditions below a projection, rewriting them over projection's input.
///
/// Nothing is pushed if the projection assigns variables. Conditions reading variables, or
/// becoming non deterministic after substitution, stay above.
#[derive(Clone, Default)]
pub struct PushSelDownProjectionRule {}

impl PushSelDownProjectionRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushSelDownProjectionRule {
    fn pattern(&self) -> &Pattern {
        &PUSH_SEL_DOWN_PROJECTION_PATTERN
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (selection, projection) =
            match (input.get_operator(memo)?, input[0].get_operator(memo)?) {
                (LogicalSelection(selection), LogicalProjection(projection)) => {
                    (selection, projection)
                }
                _ => bail!("Pattern miss matched!"),
            };
        if projection.exprs().iter().any(has_assign_set_var) {
            return Ok(());
        }

        let proj_schema = input[0].schema(memo)?;
        let mut pushed = Vec::with_capacity(selection.conditions().len());
        let mut remained = Vec::new();
        for cond in selection.conditions() {
            if has_get_set_var(cond) {
                remained.push(cond.clone());
                continue;
            }
            let substituted = column_substitute(cond, proj_schema, projection.exprs());
            let introduces_effects = (!is_deterministic(&substituted) || has_side_effects(&substituted))
                && is_deterministic(cond)
                && !has_side_effects(cond);
            if introduces_effects {
                remained.push(cond.clone());
            } else {
                pushed.push(substituted);
            }
        }
        if pushed.is_empty() {
            return Ok(());
        }

        let child = input[0][0].clone();
        let child_schema = child.schema(memo)?.clone();
        let pushed_sel = OptExpression::with_operator(Selection::new(pushed), vec![child])
            .in_new_group(child_schema);
        let new_proj = OptExpression::with_operator(projection.clone(), vec![pushed_sel]);
        let new_expr = if remained.is_empty() {
            new_proj
        } else {
            with_selection(remained, new_proj.in_new_group(proj_schema.clone()))
        };
        result.add(new_expr);
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        PushSelDownProjection
    }
}

/// Pushes conditions on group by columns below an aggregation.
///
/// Rows of a group share the group by values, so filtering them before or after grouping gives
/// the same groups. Without group by items, the aggregation always outputs one row and nothing
/// is pushed.
#[derive(Clone, Default)]
pub struct PushSelDownAggregationRule {}

impl PushSelDownAggregationRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushSelDownAggregationRule {
    fn pattern(&self) -> &Pattern {
        &PUSH_SEL_DOWN_AGGREGATION_PATTERN
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (selection, agg) = match (input.get_operator(memo)?, input[0].get_operator(memo)?) {
            (LogicalSelection(selection), LogicalAggregation(agg)) => (selection, agg),
            _ => bail!("Pattern miss matched!"),
        };
        if agg.group_by().is_empty() {
            return Ok(());
        }

        let agg_schema = input[0].schema(memo)?;
        let group_by_columns = agg
            .group_by_columns()
            .filter(|c| agg_schema.contains(c))
            .collect::<Vec<_>>();
        let (pushed, remained): (Vec<_>, Vec<_>) =
            selection.conditions().iter().cloned().partition(|cond| {
                is_deterministic(cond)
                    && !has_side_effects(cond)
                    && extract_columns(cond)
                        .iter()
                        .all(|c| group_by_columns.contains(&c))
            });
        if pushed.is_empty() {
            return Ok(());
        }

        let child = input[0][0].clone();
        let child_schema = child.schema(memo)?.clone();
        let pushed_sel = OptExpression::with_operator(Selection::new(pushed), vec![child])
            .in_new_group(child_schema);
        let new_agg = OptExpression::with_operator(agg.clone(), vec![pushed_sel]);
        let new_expr = if remained.is_empty() {
            new_agg
        } else {
            with_selection(remained, new_agg.in_new_group(agg_schema.clone()))
        };
        result.add(new_expr);
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        PushSelDownAggregation
    }
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;

    use crate::cascades::Memo;
    use crate::catalog::IndexInfo;
    use crate::error::RangeError;
    use crate::expr::aggregation::{AggFuncDesc, AggFuncKind};
    use crate::expr::{col, func, get_var, lit, set_var, BuiltinFunc};
    use crate::operator::LogicalOperator::LogicalIndexScan;
    use crate::operator::{ByItem, LogicalOperator, Selection, SingleGather, Sort, TableScan};
    use crate::optimizer::{OptimizerConfig, OptimizerContext};
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::EngineTier;
    use crate::rules::OptExprNode::OperatorNode;
    use crate::rules::{
        OptExpression, PushSelDownAggregationRule, PushSelDownIndexScanRule,
        PushSelDownProjectionRule, PushSelDownSingleGatherRule, PushSelDownSortRule,
        PushSelDownTableScanRule, Rule, RuleImpl, RuleResult,
    };
    use crate::test_utils::{apply_at_root, bind_rule, table_t1};

    /// Binds every group of memo to storage tier.
    fn to_storage(memo: &mut Memo) {
        let group_ids = memo.groups().map(|g| g.group_id()).collect::<Vec<_>>();
        for group_id in group_ids {
            memo.set_engine_tier(group_id, EngineTier::Storage).unwrap();
        }
    }

    fn operator(expr: &OptExpression) -> &LogicalOperator {
        match expr.node() {
            OperatorNode(op) => op,
            other => panic!("Unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_push_sel_down_table_scan() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let (c1, c2) = (t1.columns()[0].clone(), t1.columns()[1].clone());
        let plan = LogicalPlanBuilder::new(&ctx)
            .table_scan(t1.clone())
            .selection(vec![col(&c1).gt(lit(5i64)), col(&c2).eq(lit(1i64))])
            .build()
            .unwrap();
        let mut memo = Memo::from(plan);
        to_storage(&mut memo);

        let rule = RuleImpl::from(PushSelDownTableScanRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(result.erase_old());
        assert_eq!(1, result.exprs().len());

        let new_expr = &result.exprs()[0];
        assert_eq!(
            &LogicalOperator::from(Selection::new(vec![col(&c2).eq(lit(1i64))])),
            operator(new_expr)
        );
        assert_eq!(
            &LogicalOperator::from(
                TableScan::new(t1).with_access_conds(vec![col(&c1).gt(lit(5i64))])
            ),
            operator(&new_expr[0])
        );
        assert_eq!(
            memo[memo.root_group_id()].schema(),
            &new_expr[0].new_group().unwrap().schema
        );
    }

    #[test]
    fn test_push_sel_down_table_scan_without_handle_conds() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c2 = t1.columns()[1].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .table_scan(t1)
            .selection(vec![col(&c2).eq(lit(1i64))])
            .build()
            .unwrap();
        let mut memo = Memo::from(plan);
        to_storage(&mut memo);

        let rule = RuleImpl::from(PushSelDownTableScanRule::new());
        assert!(apply_at_root(&rule, &memo, &ctx).is_empty());
    }

    #[test]
    fn test_push_sel_down_index_scan() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let (c1, c2, c3) = (
            t1.columns()[0].clone(),
            t1.columns()[1].clone(),
            t1.columns()[2].clone(),
        );
        let index = t1.indices()[1].clone();
        let conds = vec![
            col(&c2).eq(lit(1i64)),
            col(&c3).gt(lit("a")),
            col(&c1).lt(lit(3i64)),
        ];
        let plan = LogicalPlanBuilder::new(&ctx)
            .index_scan(t1, index)
            .selection(conds)
            .build()
            .unwrap();
        let mut memo = Memo::from(plan);
        to_storage(&mut memo);

        let rule = RuleImpl::from(PushSelDownIndexScanRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(result.erase_old());
        let new_expr = &result.exprs()[0];
        assert_eq!(
            &LogicalOperator::from(Selection::new(vec![col(&c1).lt(lit(3i64))])),
            operator(new_expr)
        );
        match operator(&new_expr[0]) {
            LogicalIndexScan(scan) => {
                assert_eq!(
                    vec![col(&c2).eq(lit(1i64)), col(&c3).gt(lit("a"))],
                    scan.access_conds()
                );
                assert_eq!(1, scan.eq_cond_count());
                assert_eq!(1, scan.ranges().len());
            }
            other => panic!("Unexpected operator {}", other),
        }
    }

    #[test]
    fn test_push_sel_down_index_scan_is_idempotent() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let (c1, c2) = (t1.columns()[0].clone(), t1.columns()[1].clone());
        let index = t1.indices()[0].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .index_scan(t1, index)
            .selection(vec![col(&c2).eq(lit(1i64)), col(&c1).lt(lit(3i64))])
            .build()
            .unwrap();
        let mut memo = Memo::from(plan);
        to_storage(&mut memo);
        let root = memo.root_group_id();

        let old_id = memo[root].equivalents()[0];

        let rule = RuleImpl::from(PushSelDownIndexScanRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(!result.is_empty());
        let new_expr_id = memo
            .insert_opt_expression(&result.exprs()[0], root)
            .unwrap();
        assert!(memo.erase_group_expr(old_id));
        assert_eq!(&[new_expr_id], memo[root].equivalents());

        // Selection above the new scan keeps the remained condition only
        let input = bind_rule(&rule, &memo, root);
        let mut result = RuleResult::new();
        rule.apply(input, &memo, &ctx, &mut result).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_push_sel_down_index_scan_incompatible_literal() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c2 = t1.columns()[1].clone();
        let index = t1.indices()[0].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .index_scan(t1, index)
            .selection(vec![col(&c2).eq(lit("abc"))])
            .build()
            .unwrap();
        let mut memo = Memo::from(plan);
        to_storage(&mut memo);

        let rule = RuleImpl::from(PushSelDownIndexScanRule::new());
        let input = bind_rule(&rule, &memo, memo.root_group_id());
        let mut result = RuleResult::new();
        let err = rule.apply(input, &memo, &ctx, &mut result).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RangeError>(),
            Some(RangeError::IncompatibleType { .. })
        ));
        assert!(result.is_empty());
    }

    #[test]
    fn test_push_sel_down_index_scan_without_columns() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c2 = t1.columns()[1].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .index_scan(t1, IndexInfo::new("idx_empty", vec![]))
            .selection(vec![col(&c2).eq(lit(1i64))])
            .build()
            .unwrap();
        let mut memo = Memo::from(plan);
        to_storage(&mut memo);

        let rule = RuleImpl::from(PushSelDownIndexScanRule::new());
        let input = bind_rule(&rule, &memo, memo.root_group_id());
        assert!(!rule.matches(&input, &memo, &ctx));
    }

    #[test]
    fn test_push_sel_down_single_gather() {
        let ctx = OptimizerContext::new(OptimizerConfig {
            storage_pushdown_blacklist: vec!["lower".to_string()],
            ..Default::default()
        })
        .unwrap();
        let t1 = table_t1(&ctx);
        let (c1, c3) = (t1.columns()[0].clone(), t1.columns()[2].clone());
        let pushable = col(&c1).gt(lit(1i64));
        let blacklisted = func(BuiltinFunc::Lower, vec![col(&c3)]).eq(lit("a"));
        let plan = LogicalPlanBuilder::new(&ctx)
            .table_scan(t1.clone())
            .single_gather(t1.clone(), None)
            .selection(vec![pushable.clone(), blacklisted.clone()])
            .build()
            .unwrap();
        let mut memo = Memo::from(plan);
        let gather_group = memo[memo[memo.root_group_id()].equivalents()[0]].inputs()[0];
        let scan_group = memo[memo[gather_group].equivalents()[0]].inputs()[0];
        memo.set_engine_tier(scan_group, EngineTier::Storage).unwrap();

        let rule = RuleImpl::from(PushSelDownSingleGatherRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(result.erase_old());

        let new_expr = &result.exprs()[0];
        assert_eq!(
            &LogicalOperator::from(Selection::new(vec![blacklisted])),
            operator(new_expr)
        );
        assert_eq!(
            &LogicalOperator::from(SingleGather::new(t1, None)),
            operator(&new_expr[0])
        );
        let pushed = &new_expr[0][0];
        assert_eq!(
            &LogicalOperator::from(Selection::new(vec![pushable])),
            operator(pushed)
        );
        assert_eq!(
            Some(EngineTier::Storage),
            pushed.new_group().unwrap().engine_tier
        );
        assert_eq!(Some(scan_group), pushed[0].group_id());
    }

    #[test]
    fn test_push_sel_down_sort() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c1 = t1.columns()[0].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .sort(vec![ByItem::asc(col(&c1))])
            .selection(vec![col(&c1).gt(lit(1i64))])
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(PushSelDownSortRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(result.erase_old());
        let new_expr = &result.exprs()[0];
        assert_eq!(
            &LogicalOperator::from(Sort::new(vec![ByItem::asc(col(&c1))])),
            operator(new_expr)
        );
        assert_eq!(
            &LogicalOperator::from(Selection::new(vec![col(&c1).gt(lit(1i64))])),
            operator(&new_expr[0])
        );
        assert_eq!(
            memo[memo.root_group_id()].schema(),
            &new_expr[0].new_group().unwrap().schema
        );
    }

    #[test]
    fn test_push_sel_down_projection() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let (c1, c2) = (t1.columns()[0].clone(), t1.columns()[1].clone());
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .projection(vec![col(&c1).plus(col(&c2)), col(&c2)])
            .build()
            .unwrap();
        let sum = plan.root().schema().columns()[0].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .node(plan.root())
            .selection(vec![
                col(&sum).gt(lit(10i64)),
                col(&c2).lt(get_var("v")),
            ])
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(PushSelDownProjectionRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(result.erase_old());
        let new_expr = &result.exprs()[0];
        assert_eq!(
            &LogicalOperator::from(Selection::new(vec![col(&c2).lt(get_var("v"))])),
            operator(new_expr)
        );
        assert!(matches!(operator(&new_expr[0]), LogicalOperator::LogicalProjection(_)));
        assert_eq!(
            &LogicalOperator::from(Selection::new(vec![col(&c1)
                .plus(col(&c2))
                .gt(lit(10i64))])),
            operator(&new_expr[0][0])
        );
    }

    #[test]
    fn test_push_sel_down_projection_with_assignment() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c1 = t1.columns()[0].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .projection(vec![col(&c1), set_var("v", col(&c1))])
            .selection(vec![col(&c1).gt(lit(1i64))])
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(PushSelDownProjectionRule::new());
        assert!(apply_at_root(&rule, &memo, &ctx).is_empty());
    }

    #[test]
    fn test_push_sel_down_projection_keeps_non_deterministic() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .projection(vec![func(BuiltinFunc::Rand, vec![])])
            .build()
            .unwrap();
        let r = plan.root().schema().columns()[0].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .node(plan.root())
            .selection(vec![col(&r).lt(lit(0.5f64))])
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(PushSelDownProjectionRule::new());
        assert!(apply_at_root(&rule, &memo, &ctx).is_empty());
    }

    #[test]
    fn test_push_sel_down_aggregation() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let (c1, c2) = (t1.columns()[0].clone(), t1.columns()[1].clone());
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .aggregate(
                vec![
                    AggFuncDesc::new(AggFuncKind::Sum, vec![col(&c1)], DataType::Int64),
                    AggFuncDesc::new(AggFuncKind::FirstRow, vec![col(&c2)], DataType::Int64),
                ],
                vec![col(&c2)],
            )
            .build()
            .unwrap();
        let sum = plan.root().schema().columns()[0].clone();
        assert_eq!(&c2, &plan.root().schema().columns()[1]);

        let on_group_by = col(&c2).eq(lit(1i64));
        let on_sum = col(&sum).gt(lit(10i64));
        let plan = LogicalPlanBuilder::new(&ctx)
            .node(plan.root())
            .selection(vec![on_group_by.clone(), on_sum.clone()])
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(PushSelDownAggregationRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(result.erase_old());
        let new_expr = &result.exprs()[0];
        assert_eq!(
            &LogicalOperator::from(Selection::new(vec![on_sum])),
            operator(new_expr)
        );
        assert!(matches!(operator(&new_expr[0]), LogicalOperator::LogicalAggregation(_)));
        assert_eq!(
            &LogicalOperator::from(Selection::new(vec![on_group_by])),
            operator(&new_expr[0][0])
        );
    }

    #[test]
    fn test_push_sel_down_aggregation_without_group_by() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c1 = t1.columns()[0].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .aggregate(
                vec![AggFuncDesc::new(AggFuncKind::Count, vec![col(&c1)], DataType::Int64)],
                vec![],
            )
            .selection(vec![lit(false)])
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(PushSelDownAggregationRule::new());
        assert!(apply_at_root(&rule, &memo, &ctx).is_empty());
    }
}
