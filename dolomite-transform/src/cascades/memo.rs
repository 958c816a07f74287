use anyhow::{anyhow, bail};
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Index, IndexMut};

use enumset::EnumSet;
use itertools::Itertools;
use log::debug;
use prettytable::{row, Table};
use smallvec::SmallVec;

use crate::error::OptResult;
use crate::operator::LogicalOperator;
use crate::plan::{Plan, PlanNode, PlanNodeRef};
use crate::properties::{EngineTier, LogicalProperty, Schema};
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::rules::{OptExpression, RuleId};

/// Dynamic programming table used for storing expression groups.
///
/// Groups and group expressions are never physically removed, so their ids stay valid. Erasing
/// an expression only removes it from the equivalents of its group.
pub struct Memo {
    groups: Vec<Group>,
    root_group_id: GroupId,
}

impl Memo {
    pub fn root_group_id(&self) -> GroupId {
        self.root_group_id
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn group(&self, group_id: GroupId) -> Option<&Group> {
        self.groups.get(group_id.0)
    }

    pub fn group_expr(&self, group_expr_id: GroupExprId) -> Option<&GroupExpr> {
        self.group(group_expr_id.group_id)
            .and_then(|group| group.exprs.get(group_expr_id.expr_id))
    }

    /// Creates an empty group.
    pub fn new_group(
        &mut self,
        logical_prop: LogicalProperty,
        engine_tier: Option<EngineTier>,
    ) -> GroupId {
        let group_id = GroupId(self.groups.len());
        self.groups.push(Group::new(group_id, logical_prop, engine_tier));
        group_id
    }

    pub fn set_engine_tier(&mut self, group_id: GroupId, engine_tier: EngineTier) -> OptResult<()> {
        self.check_group(group_id)?;
        self[group_id].engine_tier = Some(engine_tier);
        Ok(())
    }

    /// Inserts an expression into a group.
    ///
    /// If the group already has an equivalent expression with same operator and inputs, its id
    /// is returned and nothing is inserted.
    pub fn insert_group_expr(
        &mut self,
        group_id: GroupId,
        operator: LogicalOperator,
        inputs: &[GroupId],
    ) -> OptResult<GroupExprId> {
        self.check_group(group_id)?;
        for input in inputs {
            self.check_group(*input)?;
        }
        if operator.arity() != inputs.len() {
            bail!(
                "{} expects {} inputs, but got {}",
                operator.as_ref(),
                operator.arity(),
                inputs.len()
            );
        }
        let key = GroupExprKey {
            operator,
            inputs: inputs.iter().copied().collect(),
        };
        Ok(self[group_id].insert(key))
    }

    /// Removes an expression from equivalents of its group.
    ///
    /// Returns false if it's not an equivalent.
    pub fn erase_group_expr(&mut self, group_expr_id: GroupExprId) -> bool {
        let erased = match self.groups.get_mut(group_expr_id.group_id.0) {
            Some(group) => group.erase(group_expr_id),
            None => false,
        };
        if erased {
            debug!("Erased group expression {}", group_expr_id);
        }
        erased
    }

    /// Removes every expression from equivalents of a group.
    pub fn erase_all_group_exprs(&mut self, group_id: GroupId) -> OptResult<()> {
        self.check_group(group_id)?;
        let group = &mut self[group_id];
        group.equivalents.clear();
        group.fingerprints.clear();
        debug!("Erased all group expressions of group {}", group_id);
        Ok(())
    }

    pub(crate) fn set_rule_applied(&mut self, group_expr_id: GroupExprId, rule_id: RuleId) {
        if let Some(group_expr) = self
            .groups
            .get_mut(group_expr_id.group_id.0)
            .and_then(|group| group.exprs.get_mut(group_expr_id.expr_id))
        {
            group_expr.applied_rules |= rule_id;
        }
    }

    /// Insert a rule result into `target_group` and return its group expression id.
    ///
    /// The whole expression is validated before memo is modified, so a failed insertion leaves
    /// memo unchanged. New groups created for non root operator nodes are bound to the tier of
    /// their parent group unless the node specifies one. A root [`ExprHandleNode`] referring to
    /// another group is copied into `target_group`.
    pub fn insert_opt_expression(
        &mut self,
        opt_expr: &OptExpression,
        target_group: GroupId,
    ) -> OptResult<GroupExprId> {
        self.check_group(target_group)?;
        self.validate(opt_expr, true)?;

        match opt_expr.node() {
            ExprHandleNode(group_expr_id) if group_expr_id.group_id == target_group => {
                Ok(*group_expr_id)
            }
            ExprHandleNode(group_expr_id) => {
                let key = self[*group_expr_id].key.clone();
                Ok(self[target_group].insert(key))
            }
            OperatorNode(operator) => {
                let parent_tier = self[target_group].engine_tier;
                let inputs = opt_expr
                    .inputs()
                    .iter()
                    .map(|input| self.insert_input(input, parent_tier))
                    .collect();
                let key = GroupExprKey {
                    operator: operator.clone(),
                    inputs,
                };
                Ok(self[target_group].insert(key))
            }
            GroupHandleNode(_) => bail!("Should not insert group handle directly!"),
        }
    }

    /// Inserts an input of a validated opt expression and returns its group.
    fn insert_input(&mut self, opt_expr: &OptExpression, parent_tier: Option<EngineTier>) -> GroupId {
        match opt_expr.node() {
            GroupHandleNode(group_id) => *group_id,
            ExprHandleNode(group_expr_id) => group_expr_id.group_id,
            OperatorNode(operator) => {
                let (schema, engine_tier) = match opt_expr.new_group() {
                    Some(new_group) => (
                        new_group.schema.clone(),
                        new_group.engine_tier.or(parent_tier),
                    ),
                    None => (Schema::default(), parent_tier),
                };
                let inputs = opt_expr
                    .inputs()
                    .iter()
                    .map(|input| self.insert_input(input, engine_tier))
                    .collect();
                let group_id = self.new_group(LogicalProperty::new(schema), engine_tier);
                self[group_id].insert(GroupExprKey {
                    operator: operator.clone(),
                    inputs,
                });
                group_id
            }
        }
    }

    /// Checks that `opt_expr` could be inserted into `target_group`, without modifying memo.
    pub fn validate_opt_expression(
        &self,
        opt_expr: &OptExpression,
        target_group: GroupId,
    ) -> OptResult<()> {
        self.check_group(target_group)?;
        self.validate(opt_expr, true)
    }

    fn validate(&self, opt_expr: &OptExpression, is_root: bool) -> OptResult<()> {
        match opt_expr.node() {
            OperatorNode(operator) => {
                if !is_root && opt_expr.new_group().is_none() {
                    bail!("Non root operator {} must be placed in a new group", operator);
                }
                if operator.arity() != opt_expr.inputs().len() {
                    bail!(
                        "{} expects {} inputs, but got {}",
                        operator.as_ref(),
                        operator.arity(),
                        opt_expr.inputs().len()
                    );
                }
                opt_expr
                    .inputs()
                    .iter()
                    .try_for_each(|input| self.validate(input, false))
            }
            ExprHandleNode(group_expr_id) => self
                .group_expr(*group_expr_id)
                .map(|_| ())
                .ok_or_else(|| anyhow!("Group expression {} not found", group_expr_id)),
            GroupHandleNode(group_id) if is_root => {
                bail!("Group handle {} can't be root of rule result", group_id)
            }
            GroupHandleNode(group_id) => self.check_group(*group_id),
        }
    }

    fn check_group(&self, group_id: GroupId) -> OptResult<()> {
        self.group(group_id)
            .map(|_| ())
            .ok_or_else(|| anyhow!("Group {} not found", group_id))
    }
}

/// Converts `Plan` to `Memo`.
///
/// Each plan node gets its own coordinator tier group. A node shared by several parents, i.e. the
/// same `Arc`, is inserted only once.
impl From<Plan> for Memo {
    fn from(plan: Plan) -> Self {
        let mut memo = Memo {
            groups: vec![],
            root_group_id: GroupId(0),
        };
        let mut node_to_group_id = HashMap::new();
        memo.root_group_id = memo.insert_plan_node(&plan.root(), &mut node_to_group_id);
        memo
    }
}

impl Memo {
    fn insert_plan_node(
        &mut self,
        node: &PlanNodeRef,
        node_to_group_id: &mut HashMap<*const PlanNode, GroupId>,
    ) -> GroupId {
        if let Some(group_id) = node_to_group_id.get(&PlanNodeRef::as_ptr(node)) {
            return *group_id;
        }
        let inputs = node
            .inputs()
            .iter()
            .map(|input| self.insert_plan_node(input, node_to_group_id))
            .collect();
        let group_id = self.new_group(node.logical_prop().clone(), Some(EngineTier::Coordinator));
        self[group_id].insert(GroupExprKey {
            operator: node.operator().clone(),
            inputs,
        });
        node_to_group_id.insert(PlanNodeRef::as_ptr(node), group_id);
        group_id
    }
}

impl Index<GroupId> for Memo {
    type Output = Group;

    fn index(&self, index: GroupId) -> &Group {
        &self.groups[index.0]
    }
}

impl IndexMut<GroupId> for Memo {
    fn index_mut(&mut self, index: GroupId) -> &mut Self::Output {
        &mut self.groups[index.0]
    }
}

impl Index<GroupExprId> for Memo {
    type Output = GroupExpr;

    fn index(&self, index: GroupExprId) -> &Self::Output {
        &self[index.group_id][index]
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "Groups in memo (root {}):", self.root_group_id)?;
        writeln!(f)?;

        for group in &self.groups {
            writeln!(f, "{:?}", group)?;
        }

        Ok(())
    }
}

/// A group id is an index of `groups` in `Memo`.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Ord, PartialOrd)]
pub struct GroupId(pub usize);

impl Debug for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// A group expression id is an index of `exprs` in `Group`.
#[derive(Hash, Eq, PartialEq, Clone, Copy)]
pub struct GroupExprId {
    group_id: GroupId,
    expr_id: usize,
}

impl Debug for GroupExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}.{:?}", self.group_id, self.expr_id)
    }
}

impl Display for GroupExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}.{:?}", self.group_id, self.expr_id)
    }
}

impl GroupExprId {
    pub fn new(group_id: GroupId, expr_id: usize) -> Self {
        Self { group_id, expr_id }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn expr_id(&self) -> usize {
        self.expr_id
    }
}

/// A group contains a set of logically equivalent `GroupExpression`s.
pub struct Group {
    group_id: GroupId,
    logical_prop: LogicalProperty,
    /// `None` until some rule binds this group to a tier.
    engine_tier: Option<EngineTier>,
    /// Every expression ever inserted, indexed by expr id.
    exprs: Vec<GroupExpr>,
    /// Expressions not erased, in insertion order.
    equivalents: Vec<GroupExprId>,
    /// Used to avoid inserting duplicated equivalents.
    fingerprints: HashMap<GroupExprKey, GroupExprId>,
}

impl Debug for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let tier = self
            .engine_tier
            .map(|t| t.as_ref().to_string())
            .unwrap_or_else(|| "Unbound".to_string());
        writeln!(f, "Group {:?} ({}) {}:", &self.group_id.0, tier, self.schema())?;

        let mut table = Table::new();
        table.add_row(row!["Group Expression Id", "Operator", "Inputs"]);
        for group_expr_id in &self.equivalents {
            let group_expr = &self[*group_expr_id];
            table.add_row(row![
                group_expr_id.expr_id,
                format!("{}", group_expr.key.operator),
                format!("{:?}", group_expr.key.inputs.as_slice())
            ]);
        }

        writeln!(f, "{}", table)
    }
}

impl Index<GroupExprId> for Group {
    type Output = GroupExpr;

    fn index(&self, index: GroupExprId) -> &Self::Output {
        &self.exprs[index.expr_id]
    }
}

impl Group {
    fn new(group_id: GroupId, logical_prop: LogicalProperty, engine_tier: Option<EngineTier>) -> Self {
        Self {
            group_id,
            logical_prop,
            engine_tier,
            exprs: vec![],
            equivalents: vec![],
            fingerprints: HashMap::new(),
        }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    pub fn schema(&self) -> &Schema {
        self.logical_prop.schema()
    }

    pub fn engine_tier(&self) -> Option<EngineTier> {
        self.engine_tier
    }

    /// Ids of expressions not erased, in insertion order.
    pub fn equivalents(&self) -> &[GroupExprId] {
        &self.equivalents
    }

    /// Operators of equivalents, in insertion order.
    pub fn operators(&self) -> impl Iterator<Item = &LogicalOperator> {
        self.equivalents
            .iter()
            .map(move |id| self[*id].operator())
    }

    pub fn is_equivalent(&self, group_expr_id: GroupExprId) -> bool {
        group_expr_id.group_id == self.group_id
            && self
                .exprs
                .get(group_expr_id.expr_id)
                .map(|e| self.fingerprints.get(&e.key) == Some(&group_expr_id))
                .unwrap_or(false)
    }

    fn insert(&mut self, key: GroupExprKey) -> GroupExprId {
        if let Some(existing) = self.fingerprints.get(&key) {
            return *existing;
        }
        let group_expr_id = GroupExprId {
            group_id: self.group_id,
            expr_id: self.exprs.len(),
        };
        self.fingerprints.insert(key.clone(), group_expr_id);
        self.exprs.push(GroupExpr::new(key));
        self.equivalents.push(group_expr_id);
        group_expr_id
    }

    fn erase(&mut self, group_expr_id: GroupExprId) -> bool {
        if !self.is_equivalent(group_expr_id) {
            return false;
        }
        self.fingerprints.remove(&self.exprs[group_expr_id.expr_id].key);
        self.equivalents.retain(|id| *id != group_expr_id);
        true
    }
}

/// Base group expression information.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub(crate) struct GroupExprKey {
    operator: LogicalOperator,
    inputs: SmallVec<[GroupId; 2]>,
}

pub struct GroupExpr {
    /// Can be used to uniquely identify a group expression in its group.
    ///
    /// It should not be changed after creation.
    key: GroupExprKey,

    /// Rules already applied to this group expression.
    applied_rules: EnumSet<RuleId>,
}

impl GroupExpr {
    fn new(key: GroupExprKey) -> Self {
        Self {
            key,
            applied_rules: EnumSet::new(),
        }
    }

    pub fn operator(&self) -> &LogicalOperator {
        &self.key.operator
    }

    pub fn inputs(&self) -> &[GroupId] {
        &self.key.inputs
    }

    pub fn is_rule_applied(&self, rule_id: RuleId) -> bool {
        self.applied_rules.contains(rule_id)
    }

    pub fn applied_rules(&self) -> EnumSet<RuleId> {
        self.applied_rules
    }
}

impl Debug for GroupExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:?}",
            self.key.operator,
            self.key.inputs.iter().map(|g| g.0).collect_vec()
        )
    }
}
