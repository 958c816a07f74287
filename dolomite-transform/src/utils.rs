/// Builds trees top down, e.g. [`crate::rules::Pattern`] and [`crate::rules::OptExpression`].
///
/// ```no
/// Pattern::new_builder((Operand::Selection, EngineTier::coordinator_only()))
///   .begin_node((Operand::SingleGather, EngineTier::coordinator_only()))
///     .leaf((Operand::Any, EngineTier::storage_only()))
///   .end_node()
/// .end_node()
/// ```
pub trait TreeBuilder: Sized {
    type Node;
    type Tree: From<(Self::Node, Vec<Self::Tree>)>;
    /// What closing current node gives back: the finished tree for a root, the parent builder
    /// otherwise.
    type Output;

    /// Opens a child of current node.
    fn begin_node<K: Into<Self::Node>>(self, node: K) -> NodeBuilder<Self> {
        NodeBuilder {
            parent: self,
            node: node.into(),
            children: vec![],
        }
    }

    /// Adds a child without children.
    fn leaf<K: Into<Self::Node>>(self, node: K) -> Self {
        self.subtree(Self::Tree::from((node.into(), vec![])))
    }

    /// Adds a child built elsewhere.
    fn subtree(self, tree: Self::Tree) -> Self;

    /// Closes current node.
    fn end_node(self) -> Self::Output;
}

pub struct RootBuilder<T, N> {
    node: N,
    children: Vec<T>,
}

impl<T, N> RootBuilder<T, N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            children: vec![],
        }
    }
}

impl<T, N> TreeBuilder for RootBuilder<T, N>
where
    T: From<(N, Vec<T>)>,
{
    type Node = N;
    type Tree = T;
    type Output = T;

    fn subtree(mut self, tree: T) -> Self {
        self.children.push(tree);
        self
    }

    fn end_node(self) -> T {
        T::from((self.node, self.children))
    }
}

/// Builder of a non root node, whose parent builder is `P`.
pub struct NodeBuilder<P: TreeBuilder> {
    parent: P,
    node: P::Node,
    children: Vec<P::Tree>,
}

impl<P: TreeBuilder> TreeBuilder for NodeBuilder<P> {
    type Node = P::Node;
    type Tree = P::Tree;
    type Output = P;

    fn subtree(mut self, tree: P::Tree) -> Self {
        self.children.push(tree);
        self
    }

    fn end_node(self) -> P {
        let tree = P::Tree::from((self.node, self.children));
        self.parent.subtree(tree)
    }
}
