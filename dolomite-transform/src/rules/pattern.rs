use enumset::EnumSet;
use std::fmt::{Debug, Formatter};

use crate::operator::Operand;
use crate::properties::EngineTier;
use crate::utils::RootBuilder;

/// A pattern defines how to match a sub tree of memo.
///
/// Each node constrains the operand of matched operator and the engine tiers its group may be
/// bound to. If we want to match `Selection -> SingleGather -> Any` where the gather's input runs
/// in storage tier, the pattern tree should be defined like:
/// ```
/// use dolomite_transform::operator::Operand;
/// use dolomite_transform::properties::EngineTier;
/// use dolomite_transform::rules::Pattern;
/// use dolomite_transform::utils::TreeBuilder;
///
/// Pattern::new_builder((Operand::Selection, EngineTier::coordinator_only()))
///   .begin_node((Operand::SingleGather, EngineTier::coordinator_only()))
///     .leaf((Operand::Any, EngineTier::storage_only()))
///   .end_node()
/// .end_node();
/// ```
///
/// A node with [`Operand::Any`] matches a whole group rather than its members.
#[derive(Clone, PartialEq)]
pub struct Pattern {
    pub operand: Operand,
    pub engine_tiers: EnumSet<EngineTier>,
    /// `None` for leaf node, which matches an expression regardless of its inputs.
    pub children: Option<Vec<Pattern>>,
}

/// Constraint of one pattern node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatternNode {
    pub operand: Operand,
    pub engine_tiers: EnumSet<EngineTier>,
}

impl From<(Operand, EnumSet<EngineTier>)> for PatternNode {
    fn from((operand, engine_tiers): (Operand, EnumSet<EngineTier>)) -> Self {
        Self {
            operand,
            engine_tiers,
        }
    }
}

impl From<(PatternNode, Vec<Pattern>)> for Pattern {
    fn from((node, children): (PatternNode, Vec<Pattern>)) -> Self {
        Self {
            operand: node.operand,
            engine_tiers: node.engine_tiers,
            children: if children.is_empty() {
                None
            } else {
                Some(children)
            },
        }
    }
}

impl Pattern {
    pub fn new_builder<N: Into<PatternNode>>(node: N) -> RootBuilder<Pattern, PatternNode> {
        RootBuilder::new(node.into())
    }

    pub fn new_leaf(operand: Operand, engine_tiers: EnumSet<EngineTier>) -> Pattern {
        Pattern::from((PatternNode::from((operand, engine_tiers)), vec![]))
    }

    /// Whether a group bound to `engine_tier` may provide a match for this node.
    ///
    /// A group whose tier is not fixed yet only matches nodes accepting every tier.
    pub fn accepts_tier(&self, engine_tier: Option<EngineTier>) -> bool {
        match engine_tier {
            Some(tier) => self.engine_tiers.contains(tier),
            None => self.engine_tiers == EngineTier::all(),
        }
    }

    /// Checks operand and number of inputs of an expression, without looking into its inputs.
    pub fn matches_without_children(&self, operand: Operand, input_len: usize) -> bool {
        self.operand.matches(operand)
            && self
                .children
                .as_ref()
                .map(|c| c.len() == input_len)
                .unwrap_or(true)
    }
}

impl Debug for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:?}", self.operand.as_ref(), self.engine_tiers)?;
        if let Some(children) = &self.children {
            f.debug_list().entries(children).finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::operator::Operand;
    use crate::properties::EngineTier;
    use crate::rules::Pattern;
    use crate::utils::TreeBuilder;

    #[test]
    fn test_build_pattern() {
        let pattern = Pattern::new_builder((Operand::Selection, EngineTier::coordinator_only()))
            .begin_node((Operand::SingleGather, EngineTier::coordinator_only()))
            .leaf((Operand::Any, EngineTier::storage_only()))
            .end_node()
            .end_node();

        assert_eq!(Operand::Selection, pattern.operand);
        let children = pattern.children.as_ref().unwrap();
        assert_eq!(1, children.len());
        assert_eq!(Operand::SingleGather, children[0].operand);

        let leaf = &children[0].children.as_ref().unwrap()[0];
        assert_eq!(Operand::Any, leaf.operand);
        assert!(leaf.children.is_none());
        assert!(leaf.accepts_tier(Some(EngineTier::Storage)));
        assert!(!leaf.accepts_tier(Some(EngineTier::Coordinator)));
        assert!(!leaf.accepts_tier(None));

        assert!(pattern.matches_without_children(Operand::Selection, 1));
        assert!(!pattern.matches_without_children(Operand::Selection, 2));
        assert!(!pattern.matches_without_children(Operand::Projection, 1));
    }
}
