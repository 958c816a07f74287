use log::{debug, info, trace};

use crate::cascades::{Binding, GroupExprId, Memo};
use crate::error::OptResult;
use crate::optimizer::OptimizerContext;
use crate::rules::{Rule, RuleCatalog, RuleImpl, RuleResult};

/// What happened to a group after rules were applied to one of its expressions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExploreOutcome {
    /// Expressions produced by rules, after insertion into memo.
    pub new_exprs: Vec<GroupExprId>,
    /// The explored expression was removed from its group.
    pub erased_old: bool,
    /// Every previous member of the group was removed.
    pub erased_all: bool,
}

impl ExploreOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.new_exprs.is_empty() && !self.erased_old && !self.erased_all
    }
}

/// Rewrites proposed by one rule for one group expression, not yet in memo.
struct PendingRewrites<'r> {
    rule: &'r RuleImpl,
    results: Vec<RuleResult>,
}

impl<'r> PendingRewrites<'r> {
    fn erase_all(&self) -> Option<&RuleResult> {
        self.results.iter().find(|result| result.erase_all())
    }
}

/// Applies rules of a catalog to single group expressions.
///
/// Every rule runs against an unchanged memo, and every rewrite is validated before memo is
/// modified, so a failing rule leaves memo as it was. The matched expression is erased only
/// after all rewrites are inserted. A rewrite dominating the whole group replaces its members
/// and discards other rewrites.
pub struct Explorer<'a> {
    catalog: &'a RuleCatalog,
    context: &'a OptimizerContext,
}

impl<'a> Explorer<'a> {
    pub fn new(catalog: &'a RuleCatalog, context: &'a OptimizerContext) -> Self {
        Self { catalog, context }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        self.catalog
    }

    /// Applies one rule to `group_expr_id`.
    pub fn apply_rule(
        &self,
        memo: &mut Memo,
        rule: &RuleImpl,
        group_expr_id: GroupExprId,
    ) -> OptResult<ExploreOutcome> {
        let pending = self
            .collect_rewrites(memo, rule, group_expr_id)?
            .into_iter()
            .collect();
        Self::commit(memo, group_expr_id, pending)
    }

    /// Applies every catalog rule registered for the operand of `group_expr_id`.
    pub fn explore_expr(
        &self,
        memo: &mut Memo,
        group_expr_id: GroupExprId,
    ) -> OptResult<ExploreOutcome> {
        let operand = memo[group_expr_id].operator().operand();
        let mut pending = Vec::new();
        for rule in self.catalog.rules_for(operand) {
            if let Some(rewrites) = self.collect_rewrites(memo, rule, group_expr_id)? {
                let erase_all = rewrites.erase_all().is_some();
                pending.push(rewrites);
                if erase_all {
                    break;
                }
            }
        }
        Self::commit(memo, group_expr_id, pending)
    }

    /// Runs `rule` on every binding of `group_expr_id`, or returns `None` if the rule doesn't
    /// apply to it anymore.
    fn collect_rewrites<'r>(
        &self,
        memo: &Memo,
        rule: &'r RuleImpl,
        group_expr_id: GroupExprId,
    ) -> OptResult<Option<PendingRewrites<'r>>> {
        if memo[group_expr_id].is_rule_applied(rule.rule_id())
            || !memo[group_expr_id.group_id()].is_equivalent(group_expr_id)
        {
            return Ok(None);
        }

        info!(
            "Beginning to apply rule {:?} to group expression {}",
            rule, group_expr_id
        );
        let mut results = Vec::new();
        for binding in Binding::new(group_expr_id, rule.pattern(), memo) {
            trace!("Binding of rule {:?}: {:?}", rule, binding);
            if !rule.matches(&binding, memo, self.context) {
                debug!("Rule {:?} rejected binding {:?}", rule, binding);
                continue;
            }

            let mut result = RuleResult::new();
            rule.apply(binding, memo, self.context, &mut result)?;
            if result.is_empty() {
                debug!("Rule {:?} found no rewrite for {}", rule, group_expr_id);
            } else if result.erase_all() {
                results = vec![result];
                break;
            } else {
                results.push(result);
            }
        }
        Ok(Some(PendingRewrites { rule, results }))
    }

    fn commit(
        memo: &mut Memo,
        group_expr_id: GroupExprId,
        pending: Vec<PendingRewrites<'_>>,
    ) -> OptResult<ExploreOutcome> {
        let group_id = group_expr_id.group_id();
        let dominating = pending
            .iter()
            .find_map(|p| p.erase_all().map(|result| (p.rule, result)));
        let to_insert = match dominating {
            Some(rewrite) => vec![rewrite],
            None => pending
                .iter()
                .flat_map(|p| p.results.iter().map(move |result| (p.rule, result)))
                .collect(),
        };

        for (_, result) in &to_insert {
            for opt_expr in result.exprs() {
                memo.validate_opt_expression(opt_expr, group_id)?;
            }
        }

        let mut outcome = ExploreOutcome::default();
        if dominating.is_some() {
            memo.erase_all_group_exprs(group_id)?;
            outcome.erased_all = true;
        }
        for (rule, result) in &to_insert {
            for opt_expr in result.exprs() {
                info!(
                    "Result of applying rule {:?} to group expression {}: {:?}",
                    rule, group_expr_id, opt_expr
                );
                outcome
                    .new_exprs
                    .push(memo.insert_opt_expression(opt_expr, group_id)?);
            }
        }
        for rewrites in &pending {
            memo.set_rule_applied(group_expr_id, rewrites.rule.rule_id());
        }

        // A rewrite may produce the matched expression itself.
        let erase_old = to_insert.iter().any(|(_, result)| result.erase_old());
        if erase_old && !outcome.erased_all && !outcome.new_exprs.contains(&group_expr_id) {
            outcome.erased_old = memo.erase_group_expr(group_expr_id);
        }
        Ok(outcome)
    }
}
