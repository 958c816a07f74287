use anyhow::bail;

use crate::cascades::Memo;
use crate::error::OptResult;
use crate::expr::{column_substitute, has_assign_set_var};
use crate::operator::LogicalOperator::{LogicalLimit, LogicalProjection, LogicalSort, LogicalTopN};
use crate::operator::{ByItem, Operand, TopN};
use crate::optimizer::OptimizerContext;
use crate::properties::EngineTier;
use crate::rules::RuleId::{PushTopNDownProjection, TransformLimitToTopN};
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref LIMIT_TO_TOP_N_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Limit, EngineTier::coordinator_only()))
          .leaf((Operand::Sort, EngineTier::coordinator_only()))
        .end_node()
    };
    static ref PUSH_TOP_N_DOWN_PROJECTION_PATTERN: Pattern = {
        Pattern::new_builder((Operand::TopN, EngineTier::coordinator_only()))
          .leaf((Operand::Projection, EngineTier::coordinator_only()))
        .end_node()
    };
}

/// Fuses `Limit -> Sort` into a TopN.
#[derive(Clone, Default)]
pub struct TransformLimitToTopNRule {}

impl TransformLimitToTopNRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for TransformLimitToTopNRule {
    fn pattern(&self) -> &Pattern {
        &LIMIT_TO_TOP_N_PATTERN
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        if let (LogicalLimit(limit), LogicalSort(sort)) =
            (input.get_operator(memo)?, input[0].get_operator(memo)?)
        {
            let top_n = TopN::new(sort.by_items().to_vec(), limit.offset(), limit.count());
            result.add(input[0].clone_with_inputs(top_n));
            result.set_erase_old(true);
            Ok(())
        } else {
            bail!("Pattern miss matched!")
        }
    }

    fn rule_id(&self) -> RuleId {
        TransformLimitToTopN
    }
}

/// Swaps a TopN with the projection below it, rewriting sort keys over projection's input.
///
/// Keys becoming constants are dropped.
#[derive(Clone, Default)]
pub struct PushTopNDownProjectionRule {}

impl PushTopNDownProjectionRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for PushTopNDownProjectionRule {
    fn pattern(&self) -> &Pattern {
        &PUSH_TOP_N_DOWN_PROJECTION_PATTERN
    }

    fn matches(&self, input: &OptExpression, memo: &Memo, _ctx: &OptimizerContext) -> bool {
        match input[0].get_operator(memo) {
            Ok(LogicalProjection(projection)) => {
                !projection.exprs().iter().any(has_assign_set_var)
            }
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
        if let (LogicalTopN(top_n), LogicalProjection(projection)) =
            (input.get_operator(memo)?, input[0].get_operator(memo)?)
        {
            let proj_schema = input[0].schema(memo)?;
            let by_items = top_n
                .by_items()
                .iter()
                .map(|item| ByItem {
                    expr: column_substitute(&item.expr, proj_schema, projection.exprs()),
                    desc: item.desc,
                })
                .filter(|item| !item.expr.is_literal())
                .collect();

            let child = input[0][0].clone();
            let child_schema = child.schema(memo)?.clone();
            let new_top_n = OptExpression::with_operator(
                TopN::new(by_items, top_n.offset(), top_n.count()),
                vec![child],
            )
            .in_new_group(child_schema);
            result.add(OptExpression::with_operator(projection.clone(), vec![new_top_n]));
            result.set_erase_old(true);
            Ok(())
        } else {
            bail!("Pattern miss matched!")
        }
    }

    fn rule_id(&self) -> RuleId {
        PushTopNDownProjection
    }
}

#[cfg(test)]
mod tests {
    use crate::cascades::Memo;
    use crate::expr::{col, lit, set_var};
    use crate::operator::{ByItem, LogicalOperator, Projection, TopN};
    use crate::optimizer::OptimizerContext;
    use crate::plan::LogicalPlanBuilder;
    use crate::rules::OptExprNode::OperatorNode;
    use crate::rules::{
        OptExpression, PushTopNDownProjectionRule, Rule, RuleImpl, TransformLimitToTopNRule,
    };
    use crate::test_utils::{apply_at_root, bind_rule, table_t1};
    use crate::utils::TreeBuilder;

    #[test]
    fn test_transform_limit_to_top_n() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c1 = t1.columns()[0].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .sort(vec![ByItem::asc(col(&c1))])
            .limit(5, 10)
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(TransformLimitToTopNRule::new());
        let opt_expr = bind_rule(&rule, &memo, memo.root_group_id());
        let scan_group_id = opt_expr[0][0].node().clone();

        let result = apply_at_root(&rule, &memo, &ctx);
        let expected_opt_expr = OptExpression::new_builder(LogicalOperator::from(TopN::new(
            vec![ByItem::asc(col(&c1))],
            5,
            10,
        )))
        .leaf(scan_group_id)
        .end_node();

        assert!(result.erase_old());
        assert_eq!(1, result.exprs().len());
        assert_eq!(expected_opt_expr, result.exprs()[0]);
    }

    #[test]
    fn test_push_top_n_down_projection() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let (c1, c2) = (t1.columns()[0].clone(), t1.columns()[1].clone());
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .projection(vec![col(&c1).plus(col(&c2)), lit(1i64)])
            .build()
            .unwrap();
        let (sum, one) = (
            plan.root().schema().columns()[0].clone(),
            plan.root().schema().columns()[1].clone(),
        );
        let plan = LogicalPlanBuilder::new(&ctx)
            .node(plan.root())
            .top_n(vec![ByItem::desc(col(&sum)), ByItem::asc(col(&one))], 0, 3)
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(PushTopNDownProjectionRule::new());
        let result = apply_at_root(&rule, &memo, &ctx);
        assert!(result.erase_old());

        let new_proj = &result.exprs()[0];
        assert_eq!(
            &OperatorNode(LogicalOperator::from(Projection::new(vec![
                col(&c1).plus(col(&c2)),
                lit(1i64)
            ]))),
            new_proj.node()
        );
        assert_eq!(
            &OperatorNode(LogicalOperator::from(TopN::new(
                vec![ByItem::desc(col(&c1).plus(col(&c2)))],
                0,
                3
            ))),
            new_proj[0].node()
        );
        let child_group = new_proj[0][0].group_id().unwrap();
        assert_eq!(
            memo[child_group].schema(),
            &new_proj[0].new_group().unwrap().schema
        );
    }

    #[test]
    fn test_push_top_n_down_projection_with_assignment() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c1 = t1.columns()[0].clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1)
            .projection(vec![set_var("v", col(&c1))])
            .top_n(vec![], 0, 1)
            .build()
            .unwrap();
        let memo = Memo::from(plan);

        let rule = RuleImpl::from(PushTopNDownProjectionRule::new());
        let input = bind_rule(&rule, &memo, memo.root_group_id());
        assert!(!rule.matches(&input, &memo, &ctx));
    }
}
