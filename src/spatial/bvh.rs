use tracing::trace;

use crate::config::TreeConfig;
use crate::types::Aabb;

/// Anything that can report its own axis-aligned bounds.
pub trait BoundsProvider {
    fn bounds(&self) -> Aabb;
}

/// Predicate used to prune and filter a tree traversal.
pub trait QueryRegion<T> {
    /// Whether the region can reach anything inside `aabb`.
    fn intersects(&self, aabb: &Aabb) -> bool;
    /// Whether `item` belongs to the result set.
    fn contains(&self, item: &T) -> bool;
}

/// Stable handle to an item stored in a [`BvhTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(usize);

type NodeId = usize;

#[derive(Debug, Clone)]
enum NodeKind {
    Internal { left: NodeId, right: NodeId },
    Leaf { items: Vec<ItemId> },
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Aabb,
    parent: Option<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    item: T,
    bounds: Aabb,
    leaf: NodeId,
}

/// Binary bounding volume hierarchy over [`BoundsProvider`] items.
///
/// Nodes live in a flat arena linked by index, so re-fitting after an insert
/// or removal walks a single leaf-to-root path.
#[derive(Debug, Clone)]
pub struct BvhTree<T> {
    nodes: Vec<Node>,
    free_nodes: Vec<NodeId>,
    root: Option<NodeId>,
    slots: Vec<Option<Slot<T>>>,
    free_slots: Vec<usize>,
    len: usize,
    config: TreeConfig,
}

impl<T: BoundsProvider> Default for BvhTree<T> {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl<T: BoundsProvider> BvhTree<T> {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            root: None,
            slots: Vec::new(),
            free_slots: Vec::new(),
            len: 0,
            config,
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bounds of everything in the tree, [`Aabb::EMPTY`] when empty.
    pub fn bounds(&self) -> Aabb {
        self.root.map_or(Aabb::EMPTY, |r| self.nodes[r].bounds)
    }

    pub fn get(&self, id: ItemId) -> Option<&T> {
        self.slots.get(id.0)?.as_ref().map(|s| &s.item)
    }

    /// Iterate over all stored items in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|s| s.as_ref().map(|s| &s.item))
    }

    /// Remove every item and node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_nodes.clear();
        self.root = None;
        self.slots.clear();
        self.free_slots.clear();
        self.len = 0;
    }

    /// Longest root-to-leaf path, counting the root as depth 0.
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut max_depth = 0;
        let mut stack = vec![(root, 0usize)];
        while let Some((id, d)) = stack.pop() {
            max_depth = max_depth.max(d);
            if let NodeKind::Internal { left, right } = self.nodes[id].kind {
                stack.push((left, d + 1));
                stack.push((right, d + 1));
            }
        }
        max_depth
    }

    /// Insert an item. Items whose bounds are not valid are ignored and
    /// `None` is returned.
    pub fn insert(&mut self, item: T) -> Option<ItemId> {
        let bounds = item.bounds();
        if !bounds.is_valid() {
            trace!("Skipping item with invalid bounds");
            return None;
        }

        let Some(root) = self.root else {
            let leaf = self.alloc_node(Node {
                bounds,
                parent: None,
                kind: NodeKind::Leaf { items: Vec::new() },
            });
            let id = self.alloc_slot(item, bounds, leaf);
            self.leaf_items_mut(leaf).push(id);
            self.root = Some(leaf);
            self.len += 1;
            return Some(id);
        };

        let leaf = self.find_best_leaf(root, &bounds);
        let id = self.alloc_slot(item, bounds, leaf);
        self.leaf_items_mut(leaf).push(id);
        self.len += 1;

        // Grow every box on the path so the containment invariant holds.
        let mut current = Some(leaf);
        while let Some(node) = current {
            let n = &mut self.nodes[node];
            n.bounds = n.bounds.merge(&bounds);
            current = n.parent;
        }

        self.split_if_needed(leaf);
        Some(id)
    }

    /// Remove an item by handle in O(depth).
    pub fn remove_by_id(&mut self, id: ItemId) -> Option<T> {
        let slot = self.slots.get_mut(id.0)?.take()?;
        self.free_slots.push(id.0);
        self.len -= 1;

        let leaf = slot.leaf;
        self.leaf_items_mut(leaf).retain(|&other| other != id);
        self.after_leaf_shrink(leaf);
        Some(slot.item)
    }

    /// Remove the first stored item equal to `item`, located by a top-down
    /// search that only descends into boxes containing the item's bounds.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let bounds = item.bounds();
        if !bounds.is_valid() {
            return false;
        }
        let Some(root) = self.root else {
            return false;
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !self.nodes[node].bounds.contains(&bounds) {
                continue;
            }
            match &self.nodes[node].kind {
                NodeKind::Leaf { items } => {
                    let found = items.iter().copied().find(|id| {
                        self.slots[id.0].as_ref().is_some_and(|s| s.item == *item)
                    });
                    if let Some(id) = found {
                        return self.remove_by_id(id).is_some();
                    }
                }
                NodeKind::Internal { left, right } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        false
    }

    /// Collect every item accepted by `region`, pruning subtrees whose box the
    /// region does not intersect.
    pub fn query<R: QueryRegion<T>>(&self, region: &R) -> Vec<&T> {
        let mut results = Vec::new();
        let Some(root) = self.root else {
            return results;
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node];
            if !region.intersects(&n.bounds) {
                continue;
            }
            match &n.kind {
                NodeKind::Leaf { items } => {
                    for id in items {
                        if let Some(slot) = &self.slots[id.0] {
                            if region.contains(&slot.item) {
                                results.push(&slot.item);
                            }
                        }
                    }
                }
                NodeKind::Internal { left, right } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        results
    }

    /// Descend choosing the child needing the smaller volume enlargement.
    ///
    /// Flat inputs make every volume zero, so exact ties fall back to the
    /// half-perimeter enlargement before preferring the left child.
    fn find_best_leaf(&self, mut node: NodeId, bounds: &Aabb) -> NodeId {
        loop {
            match self.nodes[node].kind {
                NodeKind::Leaf { .. } => return node,
                NodeKind::Internal { left, right } => {
                    let lb = &self.nodes[left].bounds;
                    let rb = &self.nodes[right].bounds;
                    let le = lb.enlargement(bounds);
                    let re = rb.enlargement(bounds);
                    node = if le < re {
                        left
                    } else if re < le {
                        right
                    } else if margin_enlargement(lb, bounds) <= margin_enlargement(rb, bounds) {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Split an overfull leaf at the median of item centres along the
    /// longest axis of its box. The leaf's arena slot becomes the new
    /// internal node, so the parent link stays valid.
    fn split_if_needed(&mut self, leaf: NodeId) {
        let count = match &self.nodes[leaf].kind {
            NodeKind::Leaf { items } => items.len(),
            NodeKind::Internal { .. } => return,
        };
        if count <= self.config.max_leaf_size.max(1) {
            return;
        }
        if self.node_depth(leaf) >= self.config.max_depth {
            return;
        }

        let axis = self.nodes[leaf].bounds.longest_axis();
        let mut items = match std::mem::replace(
            &mut self.nodes[leaf].kind,
            NodeKind::Leaf { items: Vec::new() },
        ) {
            NodeKind::Leaf { items } => items,
            NodeKind::Internal { .. } => unreachable!("checked above"),
        };

        items.sort_by(|a, b| {
            let ca = self.slot_bounds(*a).center()[axis];
            let cb = self.slot_bounds(*b).center()[axis];
            ca.total_cmp(&cb)
        });
        let right_items = items.split_off(items.len() / 2);
        let left_items = items;

        let left = self.make_leaf(left_items, leaf);
        let right = self.make_leaf(right_items, leaf);
        self.nodes[leaf].kind = NodeKind::Internal { left, right };
        trace!(node = leaf, count, axis, "Split overfull leaf");
    }

    fn make_leaf(&mut self, items: Vec<ItemId>, parent: NodeId) -> NodeId {
        let bounds = items
            .iter()
            .fold(Aabb::EMPTY, |bb, id| bb.merge(&self.slot_bounds(*id)));
        let node = self.alloc_node(Node {
            bounds,
            parent: Some(parent),
            kind: NodeKind::Leaf { items: Vec::new() },
        });
        for id in &items {
            if let Some(slot) = self.slots[id.0].as_mut() {
                slot.leaf = node;
            }
        }
        self.nodes[node].kind = NodeKind::Leaf { items };
        node
    }

    /// Re-fit after a removal: collapse an emptied leaf into its sibling,
    /// then recompute boxes up to the root.
    fn after_leaf_shrink(&mut self, leaf: NodeId) {
        let empty = matches!(&self.nodes[leaf].kind, NodeKind::Leaf { items } if items.is_empty());
        let mut refit_from = Some(leaf);

        if empty {
            match self.nodes[leaf].parent {
                None => {
                    self.free_node(leaf);
                    self.root = None;
                    return;
                }
                Some(parent) => {
                    let sibling = match self.nodes[parent].kind {
                        NodeKind::Internal { left, right } => {
                            if left == leaf {
                                right
                            } else {
                                left
                            }
                        }
                        NodeKind::Leaf { .. } => unreachable!("parent is always internal"),
                    };
                    let grandparent = self.nodes[parent].parent;
                    self.nodes[sibling].parent = grandparent;
                    match grandparent {
                        None => self.root = Some(sibling),
                        Some(gp) => {
                            if let NodeKind::Internal { left, right } = &mut self.nodes[gp].kind {
                                if *left == parent {
                                    *left = sibling;
                                } else if *right == parent {
                                    *right = sibling;
                                }
                            }
                        }
                    }
                    self.free_node(leaf);
                    self.free_node(parent);
                    refit_from = grandparent;
                }
            }
        }

        let mut current = refit_from;
        while let Some(node) = current {
            let bounds = match &self.nodes[node].kind {
                NodeKind::Leaf { items } => items
                    .iter()
                    .fold(Aabb::EMPTY, |bb, id| bb.merge(&self.slot_bounds(*id))),
                NodeKind::Internal { left, right } => {
                    self.nodes[*left].bounds.merge(&self.nodes[*right].bounds)
                }
            };
            self.nodes[node].bounds = bounds;
            current = self.nodes[node].parent;
        }
    }

    fn node_depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes[node].parent;
        while let Some(p) = current {
            depth += 1;
            current = self.nodes[p].parent;
        }
        depth
    }

    fn slot_bounds(&self, id: ItemId) -> Aabb {
        self.slots[id.0].as_ref().map_or(Aabb::EMPTY, |s| s.bounds)
    }

    fn leaf_items_mut(&mut self, leaf: NodeId) -> &mut Vec<ItemId> {
        match &mut self.nodes[leaf].kind {
            NodeKind::Leaf { items } => items,
            NodeKind::Internal { .. } => unreachable!("item slots always point at leaves"),
        }
    }

    fn alloc_node(&mut self, node: Node) -> NodeId {
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, id: NodeId) {
        self.nodes[id].kind = NodeKind::Leaf { items: Vec::new() };
        self.nodes[id].parent = None;
        self.nodes[id].bounds = Aabb::EMPTY;
        self.free_nodes.push(id);
    }

    fn alloc_slot(&mut self, item: T, bounds: Aabb, leaf: NodeId) -> ItemId {
        let slot = Some(Slot { item, bounds, leaf });
        match self.free_slots.pop() {
            Some(i) => {
                self.slots[i] = slot;
                ItemId(i)
            }
            None => {
                self.slots.push(slot);
                ItemId(self.slots.len() - 1)
            }
        }
    }
}

/// Increase in half-perimeter (sum of extents) needed to enclose `other`.
fn margin_enlargement(aabb: &Aabb, other: &Aabb) -> f64 {
    let margin = |bb: &Aabb| {
        let e = bb.extents();
        e.x + e.y + e.z
    };
    margin(&aabb.merge(other)) - margin(aabb)
}
