use anyhow::bail;

use crate::cascades::Memo;
use crate::error::OptResult;
use crate::expr::aggregation::{
    build_final_mode_aggregation, can_push_to_storage, remove_unnecessary_first_row, AggFuncDesc,
    AggMode, FinalModeAggregation,
};
use crate::expr::{column_substitute, exprs_have_side_effects};
use crate::operator::LogicalOperator::{LogicalAggregation, LogicalProjection, SingleGather};
use crate::operator::{Aggregation, Operand};
use crate::optimizer::OptimizerContext;
use crate::properties::EngineTier;
use crate::rules::RuleId::{MergeAggregationProjection, PushAggDownGather};
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref PUSH_AGG_DOWN_GATHER_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Aggregation, EngineTier::coordinator_only()))
          .leaf((Operand::SingleGather, EngineTier::coordinator_only()))
        .end_node()
    };
    static ref MERGE_AGGREGATION_PROJECTION_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Aggregation, EngineTier::coordinator_only()))
          .leaf((Operand::Projection, EngineTier::coordinator_only()))
        .end_node()
    };
}

/// Splits an aggregation above a gather into a final stage above the gather and a partial
/// stage below it.
///
/// The original aggregation is kept, since the split plan isn't always cheaper.
#[derive(Clone, Default)]
pub struct PushAggDownGatherRule {}

impl PushAggDownGatherRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushAggDownGatherRule {
    fn pattern(&self) -> &Pattern {
        &PUSH_AGG_DOWN_GATHER_PATTERN
    }

    fn matches(&self, input: &OptExpression, memo: &Memo, ctx: &OptimizerContext) -> bool {
        match input.get_operator(memo) {
            Ok(LogicalAggregation(agg)) => {
                agg.agg_funcs().iter().all(|f| f.mode == AggMode::Complete)
                    && can_push_to_storage(agg.agg_funcs(), agg.group_by(), ctx)
            }
            _ => false,
        }
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (agg, gather) = match (input.get_operator(memo)?, input[0].get_operator(memo)?) {
            (LogicalAggregation(agg), SingleGather(gather)) => (agg, gather),
            _ => bail!("Pattern miss matched!"),
        };
        let agg_schema = input.schema(memo)?;
        let child = input[0][0].clone();
        let child_tier = child
            .group_id()
            .and_then(|group_id| memo[group_id].engine_tier());

        let partial_funcs = agg
            .agg_funcs()
            .iter()
            .map(|f| f.clone().with_mode(AggMode::Partial1))
            .collect::<Vec<AggFuncDesc>>();
        let partial_group_by = agg.group_by().to_vec();
        let FinalModeAggregation {
            mut final_funcs,
            final_group_by,
            mut partial_schema,
        } = build_final_mode_aggregation(&partial_funcs, &partial_group_by, agg_schema, ctx);
        let partial_funcs = remove_unnecessary_first_row(
            &mut final_funcs,
            &final_group_by,
            partial_funcs,
            &partial_group_by,
            &mut partial_schema,
        );

        let partial_agg = OptExpression::with_operator(
            Aggregation::new(partial_funcs, partial_group_by),
            vec![child],
        );
        let partial_agg = match child_tier {
            Some(tier) => partial_agg.in_new_group_with_tier(partial_schema.clone(), tier),
            None => partial_agg.in_new_group(partial_schema.clone()),
        };
        let new_gather = OptExpression::with_operator(gather.clone(), vec![partial_agg])
            .in_new_group(partial_schema);
        result.add(OptExpression::with_operator(
            Aggregation::new(final_funcs, final_group_by),
            vec![new_gather],
        ));
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        PushAggDownGather
    }
}

/// Merges a projection into the aggregation above it.
#[derive(Clone, Default)]
pub struct MergeAggregationProjectionRule {}

impl MergeAggregationProjectionRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for MergeAggregationProjectionRule {
    fn pattern(&self) -> &Pattern {
        &MERGE_AGGREGATION_PROJECTION_PATTERN
    }

    fn matches(&self, input: &OptExpression, memo: &Memo, _ctx: &OptimizerContext) -> bool {
        match input[0].get_operator(memo) {
            Ok(LogicalProjection(projection)) => !exprs_have_side_effects(projection.exprs()),
            _ => false,
        }
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (agg, projection) = match (input.get_operator(memo)?, input[0].get_operator(memo)?) {
            (LogicalAggregation(agg), LogicalProjection(projection)) => (agg, projection),
            _ => bail!("Pattern miss matched!"),
        };
        let proj_schema = input[0].schema(memo)?;

        let agg_funcs = agg
            .agg_funcs()
            .iter()
            .map(|f| AggFuncDesc {
                args: f
                    .args
                    .iter()
                    .map(|arg| column_substitute(arg, proj_schema, projection.exprs()))
                    .collect(),
                ..f.clone()
            })
            .collect();
        let group_by = agg
            .group_by()
            .iter()
            .map(|item| column_substitute(item, proj_schema, projection.exprs()))
            .collect();

        result.add(OptExpression::with_operator(
            Aggregation::new(agg_funcs, group_by),
            input[0].inputs().to_vec(),
        ));
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        MergeAggregationProjection
    }
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;

    use crate::cascades::Memo;
    use crate::expr::aggregation::{AggFuncDesc, AggFuncKind, AggMode};
    use crate::catalog::TableRef;
    use crate::expr::{col, func, lit, set_var, BuiltinFunc, ScalarExpr};
    use crate::operator::LogicalOperator::{LogicalAggregation, SingleGather};
    use crate::operator::{Aggregation, LogicalOperator};
    use crate::optimizer::{OptimizerConfig, OptimizerContext};
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::EngineTier;
    use crate::rules::OptExprNode::{GroupHandleNode, OperatorNode};
    use crate::rules::{
        MergeAggregationProjectionRule, PushAggDownGatherRule, Rule, RuleImpl,
    };
    use crate::test_utils::{apply_at_root, bind_rule, table_t1};

    /// `Aggregation -> SingleGather -> TableScan`, with the scan in storage tier.
    fn gather_agg_memo(
        ctx: &OptimizerContext,
        t1: TableRef,
        funcs: Vec<AggFuncDesc>,
        group_by: Vec<ScalarExpr>,
    ) -> Memo {
        let plan = LogicalPlanBuilder::new(ctx)
            .table_scan(t1.clone())
            .single_gather(t1, None)
            .aggregate(funcs, group_by)
            .build()
            .unwrap();
        let mut memo = Memo::from(plan);
        let gather_group = memo[memo[memo.root_group_id()].equivalents()[0]].inputs()[0];
        let scan_group = memo[memo[gather_group].equivalents()[0]].inputs()[0];
        memo.set_engine_tier(scan_group, EngineTier::Storage).unwrap();
        memo
    }

    #[test]
    fn test_push_agg_down_gather() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let (c1, c2) = (t1.columns()[0].clone(), t1.columns()[1].clone());
        let memo = gather_agg_memo(
            &ctx,
            t1,
            vec![
                AggFuncDesc::new(AggFuncKind::Sum, vec![col(&c1)], DataType::Int64),
                AggFuncDesc::new(AggFuncKind::FirstRow, vec![col(&c2)], DataType::Int64),
            ],
            vec![col(&c2)],
        );

        let rule = RuleImpl::from(PushAggDownGatherRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(!result.erase_old());
        assert_eq!(1, result.exprs().len());

        let final_agg = &result.exprs()[0];
        match final_agg.node() {
            OperatorNode(LogicalAggregation(agg)) => {
                assert_eq!(2, agg.agg_funcs().len());
                assert!(agg.agg_funcs().iter().all(|f| f.mode == AggMode::Final));
                assert_eq!(1, agg.group_by().len());
            }
            other => panic!("Unexpected node {:?}", other),
        }

        let gather = &final_agg[0];
        assert!(matches!(gather.node(), OperatorNode(SingleGather(_))));
        // Partial sum value and group by column
        let partial_schema = &gather.new_group().unwrap().schema;
        assert_eq!(2, partial_schema.len());
        assert_eq!(None, gather.new_group().unwrap().engine_tier);

        let partial_agg = &gather[0];
        match partial_agg.node() {
            OperatorNode(LogicalAggregation(agg)) => {
                assert_eq!(1, agg.agg_funcs().len());
                assert_eq!(AggFuncKind::Sum, agg.agg_funcs()[0].kind);
                assert_eq!(AggMode::Partial1, agg.agg_funcs()[0].mode);
            }
            other => panic!("Unexpected node {:?}", other),
        }
        assert_eq!(
            Some(EngineTier::Storage),
            partial_agg.new_group().unwrap().engine_tier
        );
        assert_eq!(partial_schema, &partial_agg.new_group().unwrap().schema);
        assert!(matches!(partial_agg[0].node(), GroupHandleNode(_)));
    }

    #[test]
    fn test_push_agg_down_gather_not_matched() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c2 = t1.columns()[1].clone();
        let count = AggFuncDesc::new(AggFuncKind::Count, vec![col(&c2)], DataType::Int64);

        let rule = RuleImpl::from(PushAggDownGatherRule::new());
        let memo = gather_agg_memo(&ctx, t1.clone(), vec![count.clone()], vec![col(&c2)]);
        let input = bind_rule(&rule, &memo, memo.root_group_id());
        assert!(rule.matches(&input, &memo, &ctx));

        let memo = gather_agg_memo(
            &ctx,
            t1.clone(),
            vec![count.clone().with_distinct()],
            vec![col(&c2)],
        );
        let input = bind_rule(&rule, &memo, memo.root_group_id());
        assert!(!rule.matches(&input, &memo, &ctx));

        let memo = gather_agg_memo(
            &ctx,
            t1.clone(),
            vec![count.clone().with_mode(AggMode::Partial1)],
            vec![col(&c2)],
        );
        let input = bind_rule(&rule, &memo, memo.root_group_id());
        assert!(!rule.matches(&input, &memo, &ctx));

        let no_split = OptimizerContext::new(OptimizerConfig {
            enable_aggregation_split: false,
            ..Default::default()
        })
        .unwrap();
        let memo = gather_agg_memo(&no_split, t1, vec![count], vec![]);
        let input = bind_rule(&rule, &memo, memo.root_group_id());
        assert!(!rule.matches(&input, &memo, &no_split));
    }

    #[test]
    fn test_merge_aggregation_projection() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let (c1, c2) = (t1.columns()[0].clone(), t1.columns()[1].clone());
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .projection(vec![col(&c1), col(&c2).plus(lit(1i64))])
            .build()
            .unwrap();
        let p = plan.root().schema().columns()[1].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .node(plan.root())
            .aggregate(
                vec![AggFuncDesc::new(AggFuncKind::Count, vec![col(&c1)], DataType::Int64)],
                vec![col(&p)],
            )
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(MergeAggregationProjectionRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(result.erase_old());

        let expected = Aggregation::new(
            vec![AggFuncDesc::new(AggFuncKind::Count, vec![col(&c1)], DataType::Int64)],
            vec![col(&c2).plus(lit(1i64))],
        );
        let new_agg = &result.exprs()[0];
        assert_eq!(&OperatorNode(LogicalOperator::from(expected)), new_agg.node());
        assert!(matches!(new_agg[0].node(), GroupHandleNode(_)));
    }

    #[test]
    fn test_merge_aggregation_projection_with_side_effects() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c1 = t1.columns()[0].clone();
        let rule = RuleImpl::from(MergeAggregationProjectionRule::new());

        for exprs in [
            vec![set_var("v", col(&c1))],
            vec![col(&c1), func(BuiltinFunc::Sleep, vec![lit(1i64)])],
        ] {
            let plan = LogicalPlanBuilder::new(&ctx)
                .scan(t1.clone())
                .projection(exprs)
                .aggregate(vec![], vec![])
                .build()
                .unwrap();
            let memo = Memo::from(plan);

            let input = bind_rule(&rule, &memo, memo.root_group_id());
            assert!(!rule.matches(&input, &memo, &ctx));
        }
    }
}
