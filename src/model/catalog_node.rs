use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An element of the forest rooted at a Document (spec §3 "CatalogNode").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CatalogNode {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub title: String,
    /// Unique within its repository (not merely within siblings).
    pub slug: String,
    pub order_index: i32,
    /// Planner-provided guidance threaded into the Section Generator prompt.
    pub prompt: String,
    pub is_completed: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// In-memory forest view used by the Outline Planner and Section Generator;
/// the persisted rows are flat, this is the tree assembled from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTreeNode {
    pub node: CatalogNode,
    pub children: Vec<CatalogTreeNode>,
}

impl CatalogTreeNode {
    /// Depth-first, `order_index` ascending — the deterministic leaf order
    /// the Section Generator processes (spec §4.9).
    pub fn leaves_in_order(&self) -> Vec<&CatalogNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<&CatalogNode>) {
        if self.children.is_empty() {
            out.push(&self.node);
            return;
        }
        let mut sorted: Vec<&CatalogTreeNode> = self.children.iter().collect();
        sorted.sort_by_key(|c| c.node.order_index);
        for child in sorted {
            child.collect_leaves(out);
        }
    }

    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(CatalogTreeNode::depth)
            .max()
            .unwrap_or(0)
    }
}

/// Builds parent/child trees from flat rows, validating the invariants from
/// spec §3 ("no cycles; slugs unique per repository").
pub fn build_forest(nodes: Vec<CatalogNode>) -> Result<Vec<CatalogTreeNode>, String> {
    use std::collections::{HashMap, HashSet};

    let mut seen_slugs = HashSet::new();
    for n in &nodes {
        if !seen_slugs.insert(&n.slug) {
            return Err(format!("duplicate slug {:?} in repository", n.slug));
        }
    }

    let mut children_of: HashMap<Option<Uuid>, Vec<CatalogNode>> = HashMap::new();
    for n in nodes {
        children_of.entry(n.parent_id).or_default().push(n);
    }

    fn build(
        parent: Option<Uuid>,
        children_of: &mut std::collections::HashMap<Option<Uuid>, Vec<CatalogNode>>,
        visiting: &mut std::collections::HashSet<Uuid>,
    ) -> Result<Vec<CatalogTreeNode>, String> {
        let Some(mut nodes) = children_of.remove(&parent) else {
            return Ok(Vec::new());
        };
        nodes.sort_by_key(|n| n.order_index);
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !visiting.insert(node.id) {
                return Err(format!("cycle detected at catalog node {}", node.id));
            }
            let children = build(Some(node.id), children_of, visiting)?;
            visiting.remove(&node.id);
            out.push(CatalogTreeNode { node, children });
        }
        Ok(out)
    }

    let mut visiting = HashSet::new();
    let roots = build(None, &mut children_of, &mut visiting)?;

    if !children_of.is_empty() {
        return Err("orphaned catalog nodes reference a missing parent".to_string());
    }

    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: Uuid, parent: Option<Uuid>, slug: &str, order: i32) -> CatalogNode {
        let now = chrono::Utc::now();
        CatalogNode {
            id,
            repository_id: Uuid::new_v4(),
            parent_id: parent,
            title: slug.to_string(),
            slug: slug.to_string(),
            order_index: order,
            prompt: String::new(),
            is_completed: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn build_forest_orders_children_by_order_index() {
        let root = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let nodes = vec![
            node(root, None, "root", 0),
            node(second, Some(root), "second", 1),
            node(first, Some(root), "first", 0),
        ];
        let forest = build_forest(nodes).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].node.id, first);
        assert_eq!(forest[0].children[1].node.id, second);
    }

    #[test]
    fn build_forest_rejects_duplicate_slugs() {
        let nodes = vec![node(Uuid::new_v4(), None, "same", 0), node(Uuid::new_v4(), None, "same", 1)];
        assert!(build_forest(nodes).is_err());
    }

    #[test]
    fn build_forest_rejects_orphaned_parent() {
        let nodes = vec![node(Uuid::new_v4(), Some(Uuid::new_v4()), "orphan", 0)];
        assert!(build_forest(nodes).is_err());
    }

    #[test]
    fn leaves_in_order_is_depth_first_over_order_index() {
        let root = Uuid::new_v4();
        let branch_a = Uuid::new_v4();
        let branch_b = Uuid::new_v4();
        let leaf_a = Uuid::new_v4();
        let leaf_b = Uuid::new_v4();
        let nodes = vec![
            node(root, None, "root", 0),
            node(branch_b, Some(root), "b", 1),
            node(branch_a, Some(root), "a", 0),
            node(leaf_b, Some(branch_b), "leaf-b", 0),
            node(leaf_a, Some(branch_a), "leaf-a", 0),
        ];
        let forest = build_forest(nodes).unwrap();
        let leaves: Vec<Uuid> = forest[0].leaves_in_order().iter().map(|n| n.id).collect();
        assert_eq!(leaves, vec![leaf_a, leaf_b]);
    }

    #[test]
    fn depth_counts_root_as_one() {
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let nodes = vec![node(root, None, "root", 0), node(child, Some(root), "child", 0)];
        let forest = build_forest(nodes).unwrap();
        assert_eq!(forest[0].depth(), 2);
    }
}
