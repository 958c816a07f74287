//! Transformation rules.
//!
//! A rule defines an equivalent transformation of a logical plan fragment. Rules never touch
//! memo directly: the explorer enumerates bindings of a rule's [`Pattern`] as
//! [`OptExpression`]s, and the rule answers with replacement expressions in a [`RuleResult`].
//!
//! ## Pattern
//!
//! A pattern defines which expressions the rule operates on, and the engine tiers their groups
//! must run in. For example, the pattern of [`TransformLimitToTopNRule`] is:
//! ```no
//! static ref LIMIT_TO_TOP_N_PATTERN: Pattern = {
//!     Pattern::new_builder((Operand::Limit, EngineTier::coordinator_only()))
//!       .leaf((Operand::Sort, EngineTier::coordinator_only()))
//!     .end_node()
//! };
//! ```
//!
//! Its input and output look like:
//!```no
//! [GroupExprId(0, 0) Limit(5, 10)]                       [Operator TopN(c1 asc, 5, 10)]
//!              |                                                     |
//!              |                                                     |
//!              |               TransformLimitToTopNRule              |
//! [GroupExprId(1, 0) Sort(c1 asc)]       -------->              [GroupId (2)]
//!              |
//!              |
//!         [GroupId(2)]
//! ```
//!
//! Besides the new expressions, a rule tells whether the matched expression should be erased
//! from its group, or whether the whole group should be replaced.
mod pattern;
pub use pattern::*;
mod opt_expr;
pub use opt_expr::*;
mod push_selection;
pub use push_selection::*;
mod join;
pub use join::*;
mod data_source;
pub use data_source::*;
mod aggregation;
pub use aggregation::*;
mod limit;
pub use limit::*;
mod projection;
pub use projection::*;

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use enum_dispatch::enum_dispatch;
use enumset::{EnumSet, EnumSetType};
use std::convert::AsRef;
use strum_macros::{AsRefStr, EnumString};

use crate::cascades::{GroupId, Memo};
use crate::error::OptResult;
use crate::operator::Operand;
use crate::optimizer::{OptimizerConfig, OptimizerContext};

/// Output of one rule application.
#[derive(Default)]
pub struct RuleResult {
    exprs: Vec<OptExpression>,
    erase_old: bool,
    erase_all: bool,
}

impl RuleResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, new_expr: OptExpression) {
        self.exprs.push(new_expr);
    }

    /// The matched expression should be removed from its group.
    pub fn set_erase_old(&mut self, erase_old: bool) {
        self.erase_old = erase_old;
    }

    /// Every expression of the matched group should be replaced by the new ones.
    pub fn set_erase_all(&mut self, erase_all: bool) {
        self.erase_all = erase_all;
    }

    pub fn exprs(&self) -> &[OptExpression] {
        &self.exprs
    }

    pub fn erase_old(&self) -> bool {
        self.erase_old
    }

    pub fn erase_all(&self) -> bool {
        self.erase_all
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn results(self) -> impl Iterator<Item = OptExpression> {
        self.exprs.into_iter()
    }
}

/// A rule should only focus on providing equivalent transformations of optimizer expressions.
#[enum_dispatch(RuleImpl)]
pub trait Rule {
    /// Pattern for rule.
    fn pattern(&self) -> &Pattern;

    /// Extra check on a binding of [`Rule::pattern`], run before [`Rule::apply`].
    fn matches(&self, _input: &OptExpression, _memo: &Memo, _ctx: &OptimizerContext) -> bool {
        true
    }

    /// Apply a rule to a binding.
    ///
    /// Leaving `result` empty means the rule doesn't apply to this binding.
    fn apply(
        &self,
        input: OptExpression,
        memo: &Memo,
        ctx: &OptimizerContext,
        result: &mut RuleResult,
    ) -> OptResult<()>;

    /// Use to identify each rule.
    ///
    /// This is used to avoid applying same rule repeatedly to same group expression.
    fn rule_id(&self) -> RuleId;
}

#[enum_dispatch]
#[derive(Clone, AsRefStr)]
pub enum RuleImpl {
    // Predicate push down
    PushSelDownTableScanRule,
    PushSelDownIndexScanRule,
    PushSelDownSingleGatherRule,
    PushSelDownSortRule,
    PushSelDownProjectionRule,
    PushSelDownAggregationRule,
    PushSelDownJoinRule,

    // Access paths
    EnumeratePathsRule,

    // Aggregation
    PushAggDownGatherRule,
    MergeAggregationProjectionRule,

    // Limit
    TransformLimitToTopNRule,
    PushTopNDownProjectionRule,

    // Projection
    EliminateProjectionRule,
    MergeAdjacentProjectionRule,
}

#[derive(EnumSetType, Debug, EnumString, AsRefStr)]
pub enum RuleId {
    PushSelDownTableScan,
    PushSelDownIndexScan,
    PushSelDownSingleGather,
    PushSelDownSort,
    PushSelDownProjection,
    PushSelDownAggregation,
    PushSelDownJoin,
    EnumeratePaths,
    PushAggDownGather,
    MergeAggregationProjection,
    TransformLimitToTopN,
    PushTopNDownProjection,
    EliminateProjection,
    MergeAdjacentProjection,
}

impl Debug for RuleImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_ref())
    }
}

/// Ordered rules per root operand of their patterns.
pub struct RuleCatalog {
    rules: HashMap<Operand, Vec<RuleImpl>>,
}

impl Default for RuleCatalog {
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            Operand::Selection,
            vec![
                PushSelDownTableScanRule::new().into(),
                PushSelDownSingleGatherRule::new().into(),
                PushSelDownSortRule::new().into(),
                PushSelDownProjectionRule::new().into(),
                PushSelDownAggregationRule::new().into(),
                PushSelDownJoinRule::new().into(),
                PushSelDownIndexScanRule::new().into(),
            ],
        );
        rules.insert(Operand::DataSource, vec![EnumeratePathsRule::new().into()]);
        rules.insert(
            Operand::Aggregation,
            vec![
                PushAggDownGatherRule::new().into(),
                MergeAggregationProjectionRule::new().into(),
            ],
        );
        rules.insert(Operand::Limit, vec![TransformLimitToTopNRule::new().into()]);
        rules.insert(
            Operand::Projection,
            vec![
                EliminateProjectionRule::new().into(),
                MergeAdjacentProjectionRule::new().into(),
            ],
        );
        rules.insert(Operand::TopN, vec![PushTopNDownProjectionRule::new().into()]);
        Self { rules }
    }
}

impl RuleCatalog {
    /// Default catalog without rules disabled in `config`.
    pub fn with_config(config: &OptimizerConfig) -> OptResult<Self> {
        let disabled = config
            .disabled_rule_ids()?
            .into_iter()
            .collect::<EnumSet<RuleId>>();
        let mut catalog = Self::default();
        for rules in catalog.rules.values_mut() {
            rules.retain(|rule| !disabled.contains(rule.rule_id()));
        }
        Ok(catalog)
    }

    /// Rules whose pattern root is `operand`, in application order.
    pub fn rules_for(&self, operand: Operand) -> &[RuleImpl] {
        self.rules.get(&operand).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rule_ids(&self) -> EnumSet<RuleId> {
        self.rules
            .values()
            .flatten()
            .map(|rule| rule.rule_id())
            .collect()
    }
}

/// Places a new operator node into a new group shaped like `like`: same schema, same tier.
pub(crate) fn in_group_like(expr: OptExpression, memo: &Memo, like: GroupId) -> OptExpression {
    let group = &memo[like];
    let schema = group.schema().clone();
    match group.engine_tier() {
        Some(tier) => expr.in_new_group_with_tier(schema, tier),
        None => expr.in_new_group(schema),
    }
}
