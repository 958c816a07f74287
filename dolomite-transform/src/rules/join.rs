use anyhow::bail;
use datafusion_expr::JoinType;
use log::debug;

use crate::cascades::Memo;
use crate::error::OptResult;
use crate::expr::constant::{extract_filters_from_dnfs, is_constant_false_or_null, propagate_constant};
use crate::expr::{remove_dup_exprs, ScalarExpr};
use crate::operator::LogicalOperator::{LogicalJoin, LogicalSelection};
use crate::operator::{extract_on_condition, Join, Operand, Selection, TableDual};
use crate::optimizer::OptimizerContext;
use crate::properties::EngineTier;
use crate::rules::RuleId::PushSelDownJoin;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref PUSH_SEL_DOWN_JOIN_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Selection, EngineTier::coordinator_only()))
          .leaf((Operand::Join, EngineTier::coordinator_only()))
        .end_node()
    };
}

/// Pushes conditions of a selection and `ON` conditions of an inner join into both join
/// inputs.
///
/// Conditions are first normalized: conjuncts shared by every branch of an `OR` are hoisted,
/// and `col = const` facts are propagated. A contradiction replaces the whole group with an
/// empty relation.
#[derive(Clone, Default)]
pub struct PushSelDownJoinRule {}

impl PushSelDownJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

/// Places a selection of `conditions` above `input`, if there is any condition.
fn build_child_selection(
    conditions: Vec<ScalarExpr>,
    input: &OptExpression,
    memo: &Memo,
) -> OptResult<OptExpression> {
    if conditions.is_empty() {
        return Ok(input.clone());
    }
    let schema = input.schema(memo)?.clone();
    Ok(OptExpression::with_operator(Selection::new(conditions), vec![input.clone()]).in_new_group(schema))
}

impl Rule for PushSelDownJoinRule {
    fn pattern(&self) -> &Pattern {
        &PUSH_SEL_DOWN_JOIN_PATTERN
    }

    fn matches(&self, input: &OptExpression, memo: &Memo, _ctx: &OptimizerContext) -> bool {
        matches!(
            input[0].get_operator(memo),
            Ok(LogicalJoin(join)) if join.join_type() == JoinType::Inner
        )
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (selection, join) = match (input.get_operator(memo)?, input[0].get_operator(memo)?) {
            (LogicalSelection(selection), LogicalJoin(join)) => (selection, join),
            _ => bail!("Pattern miss matched!"),
        };
        let (left, right) = (&input[0][0], &input[0][1]);

        let conditions = join
            .left_conditions()
            .iter()
            .chain(join.right_conditions())
            .chain(join.equal_conditions())
            .chain(join.other_conditions())
            .chain(selection.conditions())
            .cloned()
            .collect();
        let conditions = propagate_constant(extract_filters_from_dnfs(conditions));

        if let [cond] = conditions.as_slice() {
            if is_constant_false_or_null(cond) {
                debug!("Join conditions are contradictory: {}", cond);
                let join_schema = input[0].schema(memo)?.clone();
                result.add(OptExpression::with_operator(TableDual::new(join_schema), vec![]));
                result.set_erase_all(true);
                return Ok(());
            }
        }

        let mut on_conditions =
            extract_on_condition(&conditions, left.schema(memo)?, right.schema(memo)?);
        let left_conditions = remove_dup_exprs(std::mem::take(&mut on_conditions.left));
        let right_conditions = remove_dup_exprs(std::mem::take(&mut on_conditions.right));
        let new_join = Join::with_conditions(join.join_type(), on_conditions);

        let new_left = build_child_selection(left_conditions, left, memo)?;
        let new_right = build_child_selection(right_conditions, right, memo)?;
        result.add(OptExpression::with_operator(new_join, vec![new_left, new_right]));
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        PushSelDownJoin
    }
}
