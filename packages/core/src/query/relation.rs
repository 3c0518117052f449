//! §9 design note: "Implement as an arena or owning-node-plus-parent-index
//! structure, not a pair of mutual owning references." Builders navigate
//! upward only during construction (to resolve FKs); emission walks the
//! arena top-down by child index, so no `Rc`/`Weak` cycles are needed.

use crate::schema::ForeignKey;

#[derive(Debug, Clone)]
pub struct SelectColumn {
    pub name: String,
    pub alias: String,
}

#[derive(Debug, Clone)]
pub struct RelationNode {
    pub name: String,
    pub alias: String,
    pub inner: bool,
    pub columns: Vec<SelectColumn>,
    pub wants_star: bool,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
    /// The foreign key resolving this node to its parent (child → parent).
    /// `None` for the root.
    pub fk: Option<ForeignKey>,
}

impl RelationNode {
    fn new(name: String, alias: String, inner: bool, parent: Option<usize>) -> Self {
        Self {
            name,
            alias,
            inner,
            columns: Vec::new(),
            wants_star: false,
            children: Vec::new(),
            parent,
            fk: None,
        }
    }
}

/// An arena of nodes; index 0 is always the root.
#[derive(Debug, Clone)]
pub struct RelationTree {
    pub nodes: Vec<RelationNode>,
}

impl RelationTree {
    pub fn new(root_name: impl Into<String>) -> Self {
        let root_name = root_name.into();
        let root = RelationNode::new(root_name.clone(), root_name, false, None);
        Self { nodes: vec![root] }
    }

    pub const ROOT: usize = 0;

    pub fn root(&self) -> &RelationNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, idx: usize) -> &RelationNode {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: usize) -> &mut RelationNode {
        &mut self.nodes[idx]
    }

    /// Appends a new child node under `parent_idx` and returns its index.
    pub fn push_child(
        &mut self,
        parent_idx: usize,
        name: impl Into<String>,
        alias: impl Into<String>,
        inner: bool,
        fk: ForeignKey,
    ) -> usize {
        let mut node = RelationNode::new(name.into(), alias.into(), inner, Some(parent_idx));
        node.fk = Some(fk);
        self.nodes.push(node);
        let idx = self.nodes.len() - 1;
        self.nodes[parent_idx].children.push(idx);
        idx
    }

    /// Depth of the deepest leaf, root counted as depth 1.
    pub fn depth(&self) -> usize {
        fn walk(tree: &RelationTree, idx: usize) -> usize {
            let node = tree.node(idx);
            1 + node
                .children
                .iter()
                .map(|&child| walk(tree, child))
                .max()
                .unwrap_or(0)
        }
        walk(self, Self::ROOT)
    }
}
