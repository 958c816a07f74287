use std::iter::{empty, once};

use itertools::Itertools;

use crate::cascades::{GroupExprId, GroupId, Memo};
use crate::operator::Operand;
use crate::rules::{OptExpression, Pattern};

pub type BindingIter<'a> = Box<dyn Iterator<Item = OptExpression> + 'a>;

/// Enumerates every way a pattern matches memo, starting from a set of candidate group
/// expressions for the pattern root.
///
/// Each binding is an [`OptExpression`] with an [`crate::rules::OptExprNode::ExprHandleNode`] for
/// every matched pattern node, and a [`crate::rules::OptExprNode::GroupHandleNode`] for each
/// [`Operand::Any`] leaf and for each input of other leaves. Candidates are visited lazily, while
/// bindings of inputs of one candidate are collected before their cartesian product is taken.
#[derive(Clone)]
pub struct Binding<'a> {
    candidates: Vec<GroupExprId>,
    memo: &'a Memo,
    pattern: &'a Pattern,
}

impl<'a> IntoIterator for Binding<'a> {
    type Item = OptExpression;
    type IntoIter = BindingIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        let Binding {
            candidates,
            memo,
            pattern,
        } = self;
        Box::new(
            candidates
                .into_iter()
                .flat_map(move |group_expr_id| bind(group_expr_id, pattern, memo)),
        )
    }
}

impl<'a> Binding<'a> {
    /// Bindings whose root is `group_expr_id`.
    pub fn new(group_expr_id: GroupExprId, pattern: &'a Pattern, memo: &'a Memo) -> Self {
        Self {
            candidates: vec![group_expr_id],
            memo,
            pattern,
        }
    }

    /// Bindings whose root is any equivalent of `group_id`.
    pub fn of_group(group_id: GroupId, pattern: &'a Pattern, memo: &'a Memo) -> Self {
        Self {
            candidates: memo[group_id].equivalents().to_vec(),
            memo,
            pattern,
        }
    }
}

fn bind<'a>(group_expr_id: GroupExprId, pattern: &'a Pattern, memo: &'a Memo) -> BindingIter<'a> {
    let group_expr = &memo[group_expr_id];
    if !pattern.accepts_tier(memo[group_expr_id.group_id()].engine_tier())
        || !pattern.matches_without_children(
            group_expr.operator().operand(),
            group_expr.inputs().len(),
        )
    {
        return Box::new(empty());
    }

    match &pattern.children {
        None => Box::new(once(OptExpression::with_expr_handle(
            group_expr_id,
            group_expr
                .inputs()
                .iter()
                .map(|group_id| OptExpression::with_group_handle(*group_id)),
        ))),
        Some(children_patterns) => {
            let children_bindings = children_patterns
                .iter()
                .zip(group_expr.inputs())
                .map(|(child_pattern, group_id)| bind_input(*group_id, child_pattern, memo))
                .collect::<Vec<Vec<OptExpression>>>();

            Box::new(
                children_bindings
                    .into_iter()
                    .map(|bindings| bindings.into_iter())
                    .multi_cartesian_product()
                    .map(move |inputs| OptExpression::with_expr_handle(group_expr_id, inputs)),
            )
        }
    }
}

fn bind_input(group_id: GroupId, pattern: &Pattern, memo: &Memo) -> Vec<OptExpression> {
    if pattern.operand == Operand::Any && pattern.children.is_none() {
        if pattern.accepts_tier(memo[group_id].engine_tier()) {
            vec![OptExpression::with_group_handle(group_id)]
        } else {
            vec![]
        }
    } else {
        Binding::of_group(group_id, pattern, memo)
            .into_iter()
            .collect()
    }
}
