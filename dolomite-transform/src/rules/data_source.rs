use anyhow::bail;

use crate::cascades::Memo;
use crate::error::OptResult;
use crate::operator::LogicalOperator::LogicalDataSource;
use crate::operator::Operand;
use crate::optimizer::OptimizerContext;
use crate::properties::EngineTier;
use crate::rules::RuleId::EnumeratePaths;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref ENUMERATE_PATHS_PATTERN: Pattern = {
        Pattern::new_leaf(Operand::DataSource, EngineTier::coordinator_only())
    };
}

/// Replaces a data source with its access paths.
///
/// Each path is a gather in the coordinator tier over a table scan or an index scan in the
/// storage tier.
#[derive(Clone, Default)]
pub struct EnumeratePathsRule {}

impl EnumeratePathsRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for EnumeratePathsRule {
    fn pattern(&self) -> &Pattern {
        &ENUMERATE_PATHS_PATTERN
    }

    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let data_source = match input.get_operator(memo)? {
            LogicalDataSource(data_source) => data_source,
            _ => bail!("Pattern miss matched!"),
        };
        let schema = input.schema(memo)?;

        for (gather, scan) in data_source.convert_to_gathers() {
            let scan = OptExpression::with_operator(scan, vec![])
                .in_new_group_with_tier(schema.clone(), EngineTier::Storage);
            result.add(OptExpression::with_operator(gather, vec![scan]));
        }
        result.set_erase_old(true);
        Ok(())
    }

    fn rule_id(&self) -> RuleId {
        EnumeratePaths
    }
}
