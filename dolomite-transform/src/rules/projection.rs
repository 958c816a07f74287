use anyhow::bail;
use log::trace;

use crate::cascades::Memo;
use crate::error::OptResult;
use crate::expr::{column_substitute, exprs_have_side_effects};
use crate::operator::LogicalOperator::LogicalProjection;
use crate::operator::{Operand, Projection};
use crate::optimizer::OptimizerContext;
use crate::properties::EngineTier;
use crate::rules::RuleId::{EliminateProjection, MergeAdjacentProjection};
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref ELIMINATE_PROJECTION_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Projection, EngineTier::coordinator_only()))
          .leaf((Operand::Any, EngineTier::coordinator_only()))
        .end_node()
    };
    static ref MERGE_ADJACENT_PROJECTION_PATTERN: Pattern = {
        Pattern::new_builder((Operand::Projection, EngineTier::coordinator_only()))
          .leaf((Operand::Projection, EngineTier::coordinator_only()))
        .end_node()
    };
}

/// Removes a projection outputting exactly the columns of its input, by promoting every
/// expression of the input group into the projection's group.
#[derive(Clone, Default)]
pub struct EliminateProjectionRule {}

impl EliminateProjectionRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for EliminateProjectionRule {
    fn pattern(&self) -> &Pattern {
        &ELIMINATE_PROJECTION_PATTERN
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let child_group = match input[0].group_id() {
            Some(group_id) => group_id,
            None => bail!("Pattern miss matched!"),
        };
        if input.schema(memo)? != memo[child_group].schema() {
            return Ok(());
        }

        trace!("Promoting expressions of group {}", child_group);
        for group_expr_id in memo[child_group].equivalents() {
            result.add(OptExpression::with_expr_handle(*group_expr_id, vec![]));
        }
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        EliminateProjection
    }
}

/// Merges two adjacent projections by substituting the lower one into the upper one.
#[derive(Clone, Default)]
pub struct MergeAdjacentProjectionRule {}

impl MergeAdjacentProjectionRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for MergeAdjacentProjectionRule {
    fn pattern(&self) -> &Pattern {
        &MERGE_ADJACENT_PROJECTION_PATTERN
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let (upper, lower) = match (input.get_operator(memo)?, input[0].get_operator(memo)?) {
            (LogicalProjection(upper), LogicalProjection(lower)) => (upper, lower),
            _ => bail!("Pattern miss matched!"),
        };
        if exprs_have_side_effects(lower.exprs()) {
            return Ok(());
        }

        let lower_schema = input[0].schema(memo)?;
        let exprs = upper
            .exprs()
            .iter()
            .map(|e| column_substitute(e, lower_schema, lower.exprs()));
        result.add(OptExpression::with_operator(
            Projection::new(exprs),
            input[0].inputs().to_vec(),
        ));
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        MergeAdjacentProjection
    }
}
