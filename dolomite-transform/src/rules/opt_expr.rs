use crate::cascades::{GroupExprId, GroupId, Memo};
use crate::error::OptResult;
use crate::operator::LogicalOperator;
use crate::properties::{EngineTier, Schema};
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::utils::RootBuilder;
use anyhow::bail;
use std::fmt::{Debug, Formatter};
use std::ops::Index;

/// One node in [`OptExpression`].
#[derive(Clone, PartialEq)]
pub enum OptExprNode {
    OperatorNode(LogicalOperator),
    ExprHandleNode(GroupExprId),
    GroupHandleNode(GroupId),
}

impl Debug for OptExprNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorNode(op) => write!(f, "OperatorNode: {}", op),
            ExprHandleNode(handle) => write!(f, "ExprHandleNode: {:?}", handle),
            GroupHandleNode(handle) => write!(f, "GroupHandleNode: {:?}", handle),
        }
    }
}

impl From<LogicalOperator> for OptExprNode {
    fn from(t: LogicalOperator) -> Self {
        OperatorNode(t)
    }
}

impl From<GroupExprId> for OptExprNode {
    fn from(t: GroupExprId) -> Self {
        ExprHandleNode(t)
    }
}

impl From<GroupId> for OptExprNode {
    fn from(t: GroupId) -> Self {
        GroupHandleNode(t)
    }
}

/// Group created in memo for a non root [`OperatorNode`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewGroup {
    pub schema: Schema,
    /// `None` means the tier of parent group.
    pub engine_tier: Option<EngineTier>,
}

/// Optimizer expression tree matches rule pattern. Used as input/output of optimizer rule.
///
/// When used as input, every node is either an [`ExprHandleNode`] or a [`GroupHandleNode`]. The
/// latter binds a whole group, as for a [`crate::operator::Operand::Any`] pattern node, or inputs
/// of a leaf pattern node.
///
/// When used as output, the root replaces matched expression in its group:
/// * An [`OperatorNode`] is a new expression. A non root operator node must carry a
/// [`NewGroup`], since its group is created along with it.
/// * An [`ExprHandleNode`] refers to an existing expression. At root it's copied into the group
/// of matched expression, elsewhere it stands for its own group.
/// * A [`GroupHandleNode`] refers to an existing group, and can't be root.
pub struct OptExpression {
    node: OptExprNode,
    inputs: Vec<OptExpression>,
    new_group: Option<NewGroup>,
}

impl Clone for OptExpression {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            inputs: self.inputs.clone(),
            new_group: self.new_group.clone(),
        }
    }
}

impl PartialEq for OptExpression {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.inputs == other.inputs && self.new_group == other.new_group
    }
}

impl OptExpression {
    pub fn new_builder<N: Into<OptExprNode>>(node: N) -> RootBuilder<Self, OptExprNode> {
        RootBuilder::new(node.into())
    }

    pub fn with_operator<O, I>(operator: O, inputs: I) -> Self
    where
        O: Into<LogicalOperator>,
        I: IntoIterator<Item = Self>,
    {
        Self {
            node: OperatorNode(operator.into()),
            inputs: inputs.into_iter().collect(),
            new_group: None,
        }
    }

    pub fn with_expr_handle<I>(handle: GroupExprId, inputs: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self {
            node: ExprHandleNode(handle),
            inputs: inputs.into_iter().collect(),
            new_group: None,
        }
    }

    /// Creates an opt expression with group handle.
    ///
    /// Note that group handle can only be leaf node, so it never inputs.
    pub fn with_group_handle(handle: GroupId) -> Self {
        Self {
            node: GroupHandleNode(handle),
            inputs: vec![],
            new_group: None,
        }
    }

    /// Places this operator node into a new group with `schema`, bound to tier of parent group.
    pub fn in_new_group(mut self, schema: Schema) -> Self {
        self.new_group = Some(NewGroup {
            schema,
            engine_tier: None,
        });
        self
    }

    /// Places this operator node into a new group with `schema`, bound to `engine_tier`.
    pub fn in_new_group_with_tier(mut self, schema: Schema, engine_tier: EngineTier) -> Self {
        self.new_group = Some(NewGroup {
            schema,
            engine_tier: Some(engine_tier),
        });
        self
    }

    pub fn clone_with_inputs<O: Into<LogicalOperator>>(&self, operator: O) -> Self {
        Self {
            node: OperatorNode(operator.into()),
            inputs: self.inputs.clone(),
            new_group: None,
        }
    }

    pub fn inputs(&self) -> &[Self] {
        &self.inputs
    }

    pub fn node(&self) -> &OptExprNode {
        &self.node
    }

    pub fn new_group(&self) -> Option<&NewGroup> {
        self.new_group.as_ref()
    }

    /// Group this node refers to, if it refers to memo content.
    pub fn group_id(&self) -> Option<GroupId> {
        match &self.node {
            ExprHandleNode(handle) => Some(handle.group_id()),
            GroupHandleNode(handle) => Some(*handle),
            OperatorNode(_) => None,
        }
    }

    pub fn get_operator<'a>(&'a self, memo: &'a Memo) -> OptResult<&'a LogicalOperator> {
        match &self.node {
            ExprHandleNode(handle) => Ok(memo[*handle].operator()),
            OperatorNode(op) => Ok(op),
            GroupHandleNode(_) => bail!("Can't get operator from group handle!"),
        }
    }

    /// Output schema of this node.
    pub fn schema<'a>(&'a self, memo: &'a Memo) -> OptResult<&'a Schema> {
        match (self.group_id(), &self.new_group) {
            (Some(group_id), _) => Ok(memo[group_id].schema()),
            (None, Some(new_group)) => Ok(&new_group.schema),
            (None, None) => bail!("Schema of {:?} is unknown", self.node),
        }
    }
}

impl Debug for OptExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format(f, 0)
    }
}

/// Creates a leaf opt expression from operator.
impl From<LogicalOperator> for OptExpression {
    fn from(op: LogicalOperator) -> Self {
        OptExpression::with_operator(op, vec![])
    }
}

impl OptExpression {
    fn format(&self, f: &mut Formatter<'_>, level: usize) -> std::fmt::Result {
        let prefix = if level > 0 {
            format!("{}--", "  ".repeat(level - 1))
        } else {
            "".to_string()
        };

        write!(f, "{}{:?}", prefix, self.node)?;
        match &self.new_group {
            Some(new_group) => writeln!(f, " in new group {}", new_group.schema)?,
            None => writeln!(f)?,
        }
        for input in &self.inputs {
            input.format(f, level + 1)?;
        }

        Ok(())
    }
}

/// Index of inputs.
impl Index<usize> for OptExpression {
    type Output = OptExpression;

    fn index(&self, index: usize) -> &Self::Output {
        &self.inputs[index]
    }
}

impl From<(OptExprNode, Vec<OptExpression>)> for OptExpression {
    fn from(t: (OptExprNode, Vec<OptExpression>)) -> Self {
        OptExpression {
            node: t.0,
            inputs: t.1,
            new_group: None,
        }
    }
}
