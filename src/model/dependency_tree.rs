use serde::{Deserialize, Serialize};

/// Transient dependency graph produced by the Dependency Analyzer (spec §3
/// "DependencyTree (transient, not persisted)", §4.4). Never reaches the
/// store; consumed and discarded within one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyTree {
    pub root: DependencyNode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DependencyNodeKind {
    File,
    Function,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyNode {
    pub kind: DependencyNodeKind,
    pub name: String,
    pub full_path: String,
    pub line_number: Option<usize>,
    /// Set when revisiting this node within the current path (spec §4.4
    /// "the child is emitted with `is_cyclic = true` and no further expansion").
    pub is_cyclic: bool,
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    pub fn leaf_stub(name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            kind: DependencyNodeKind::Function,
            name: name.into(),
            full_path: full_path.into(),
            line_number: None,
            is_cyclic: false,
            children: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(DependencyNode::node_count).sum::<usize>()
    }
}
