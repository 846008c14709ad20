use smallvec::SmallVec;

use crate::geometry::{Aabb, RayCastInput};
use crate::math::Vec2;
use crate::settings::{AABB_EXTENSION, AABB_MULTIPLIER};

/// Identifier of a proxy (leaf) in a [`DynamicTree`]
pub type ProxyId = u32;

/// Sentinel for "no node"
pub const NULL_NODE: u32 = u32::MAX;

type NodeStack = SmallVec<[u32; 256]>;

/// A node in the dynamic tree
#[derive(Debug, Clone)]
struct TreeNode<T> {
    /// Enlarged AABB
    aabb: Aabb,
    /// Proxy payload, only set on leaves
    user_data: Option<T>,
    parent: u32,
    child1: u32,
    child2: u32,
    /// Leaf = 0, free node = -1
    height: i32,
    /// Set when the proxy was reinserted since the last pair update
    moved: bool,
}

impl<T> TreeNode<T> {
    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }

    fn free() -> Self {
        Self {
            aabb: Aabb::EMPTY,
            user_data: None,
            parent: NULL_NODE,
            child1: NULL_NODE,
            child2: NULL_NODE,
            height: -1,
            moved: false,
        }
    }
}

/// A dynamic AABB tree broad-phase.
///
/// Leaves hold fattened AABBs so proxies can move a little without touching
/// the tree. Internal nodes store the union of their children and the height
/// of their subtree, which drives the AVL-style rebalancing on insert and remove.
#[derive(Debug, Clone)]
pub struct DynamicTree<T> {
    nodes: Vec<TreeNode<T>>,
    root: u32,
    /// Free node list for reuse
    free_list: Vec<u32>,
    insertion_count: u32,
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> DynamicTree<T> {
    /// Creates a new empty tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(16),
            root: NULL_NODE,
            free_list: Vec::new(),
            insertion_count: 0,
        }
    }

    /// Creates a proxy for a tight AABB. The stored AABB is fattened by [`AABB_EXTENSION`].
    pub fn create_proxy(&mut self, aabb: Aabb, user_data: T) -> ProxyId {
        let proxy_id = self.allocate_node();

        let node = &mut self.nodes[proxy_id as usize];
        node.aabb = aabb.expand(AABB_EXTENSION);
        node.user_data = Some(user_data);
        node.height = 0;
        node.moved = true;

        self.insert_leaf(proxy_id);
        proxy_id
    }

    /// Destroys a proxy. The id may be reused afterwards.
    pub fn destroy_proxy(&mut self, proxy_id: ProxyId) {
        debug_assert!(self.is_leaf(proxy_id));
        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);
    }

    /// Moves a proxy to a new tight AABB, predicting motion along `displacement`.
    ///
    /// Returns true only when the proxy was reinserted: either the tight AABB
    /// escaped the stored fat AABB, or the stored AABB had grown much larger
    /// than needed (a fast body that has slowed down).
    pub fn move_proxy(&mut self, proxy_id: ProxyId, aabb: Aabb, displacement: Vec2) -> bool {
        debug_assert!(self.is_leaf(proxy_id));

        // Extend AABB
        let mut fat_aabb = aabb.expand(AABB_EXTENSION);

        // Predict AABB movement
        let d = displacement * AABB_MULTIPLIER;
        if d.x < 0.0 {
            fat_aabb.min.x += d.x;
        } else {
            fat_aabb.max.x += d.x;
        }
        if d.y < 0.0 {
            fat_aabb.min.y += d.y;
        } else {
            fat_aabb.max.y += d.y;
        }

        let tree_aabb = self.nodes[proxy_id as usize].aabb;
        if tree_aabb.contains(aabb) {
            // The tree AABB still contains the object, but it might be too large.
            let huge_aabb = fat_aabb.expand(4.0 * AABB_EXTENSION);
            if huge_aabb.contains(tree_aabb) {
                return false;
            }
        }

        self.remove_leaf(proxy_id);
        self.nodes[proxy_id as usize].aabb = fat_aabb;
        self.insert_leaf(proxy_id);
        self.nodes[proxy_id as usize].moved = true;

        true
    }

    /// The payload of a proxy
    #[inline]
    pub fn user_data(&self, proxy_id: ProxyId) -> Option<T> {
        self.nodes.get(proxy_id as usize).and_then(|n| n.user_data)
    }

    #[inline]
    pub fn was_moved(&self, proxy_id: ProxyId) -> bool {
        self.nodes[proxy_id as usize].moved
    }

    #[inline]
    pub fn clear_moved(&mut self, proxy_id: ProxyId) {
        self.nodes[proxy_id as usize].moved = false;
    }

    /// The fattened AABB stored for a proxy
    #[inline]
    pub fn fat_aabb(&self, proxy_id: ProxyId) -> Aabb {
        self.nodes[proxy_id as usize].aabb
    }

    /// Visits every proxy whose fat AABB overlaps `aabb`.
    /// The callback returns false to stop the query.
    pub fn query(&self, aabb: Aabb, mut callback: impl FnMut(ProxyId) -> bool) {
        let mut stack = NodeStack::new();
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id as usize];
            if node.aabb.overlaps(aabb) {
                if node.is_leaf() {
                    if !callback(node_id) {
                        return;
                    }
                } else {
                    stack.push(node.child1);
                    stack.push(node.child2);
                }
            }
        }
    }

    /// Casts a ray against the proxies in the tree.
    ///
    /// The callback performs the exact shape test and returns the new max
    /// fraction: 0 terminates, a positive value clips the ray, and the input
    /// max fraction continues unchanged. Negative values ignore the proxy.
    pub fn ray_cast(&self, input: &RayCastInput, mut callback: impl FnMut(&RayCastInput, ProxyId) -> f32) {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = (p2 - p1).normalize();

        // v is perpendicular to the segment.
        let v = Vec2::scalar_cross(1.0, r);
        let abs_v = v.abs();

        // Separating axis for segment (Gino, p80).
        // |dot(v, p1 - c)| > dot(|v|, h)

        let mut max_fraction = input.max_fraction;

        let segment_aabb = |max_fraction: f32| {
            let t = p1 + (p2 - p1) * max_fraction;
            Aabb::new(p1.min(t), p1.max(t))
        };
        let mut seg_aabb = segment_aabb(max_fraction);

        let mut stack = NodeStack::new();
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id as usize];
            if !node.aabb.overlaps(seg_aabb) {
                continue;
            }

            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1,
                    p2,
                    max_fraction,
                };

                let value = callback(&sub_input, node_id);

                if value == 0.0 {
                    // The client has terminated the ray cast.
                    return;
                }

                if value > 0.0 {
                    // Update segment bounding box.
                    max_fraction = value;
                    seg_aabb = segment_aabb(max_fraction);
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Height of the tree, 0 when empty or a single leaf
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }

    /// Maximum height difference between the children of any node
    pub fn max_balance(&self) -> i32 {
        self.nodes
            .iter()
            .filter(|node| node.height > 1)
            .map(|node| {
                (self.nodes[node.child2 as usize].height - self.nodes[node.child1 as usize].height).abs()
            })
            .max()
            .unwrap_or(0)
    }

    /// Ratio of the summed node perimeters to the root perimeter
    pub fn area_ratio(&self) -> f32 {
        if self.root == NULL_NODE {
            return 0.0;
        }

        let root_area = self.nodes[self.root as usize].aabb.perimeter();
        let total_area: f32 = self
            .nodes
            .iter()
            .filter(|node| node.height >= 0)
            .map(|node| node.aabb.perimeter())
            .sum();

        total_area / root_area
    }

    /// Number of proxies in the tree
    pub fn proxy_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.height >= 0 && n.is_leaf())
            .count()
    }

    /// Number of leaf insertions performed so far
    pub fn insertion_count(&self) -> u32 {
        self.insertion_count
    }

    /// Checks the structure and metrics of the whole tree: parent links,
    /// cached heights and every internal AABB being the union of its children.
    pub fn validate(&self) -> bool {
        if self.root != NULL_NODE && self.nodes[self.root as usize].parent != NULL_NODE {
            return false;
        }

        let free_count = self.free_list.len();
        let live_count = self.nodes.iter().filter(|n| n.height >= 0).count();
        if free_count + live_count != self.nodes.len() {
            return false;
        }

        self.validate_node(self.root) && self.height() == self.compute_height(self.root)
    }

    fn validate_node(&self, index: u32) -> bool {
        if index == NULL_NODE {
            return true;
        }

        let node = &self.nodes[index as usize];
        if node.is_leaf() {
            return node.child2 == NULL_NODE && node.height == 0;
        }

        let (child1, child2) = (node.child1, node.child2);
        let n1 = &self.nodes[child1 as usize];
        let n2 = &self.nodes[child2 as usize];

        if n1.parent != index || n2.parent != index {
            return false;
        }
        if node.height != 1 + n1.height.max(n2.height) {
            return false;
        }
        if node.aabb != n1.aabb.union(n2.aabb) {
            return false;
        }

        self.validate_node(child1) && self.validate_node(child2)
    }

    fn compute_height(&self, index: u32) -> i32 {
        if index == NULL_NODE {
            return 0;
        }
        let node = &self.nodes[index as usize];
        if node.is_leaf() {
            return 0;
        }
        1 + self.compute_height(node.child1).max(self.compute_height(node.child2))
    }

    /// Builds an optimal tree by greedily pairing the cheapest leaves.
    /// Very expensive, for testing tree quality.
    pub fn rebuild_bottom_up(&mut self) {
        let mut leaves: Vec<u32> = Vec::new();

        // Build array of leaves. Free the rest.
        for i in 0..self.nodes.len() as u32 {
            let node = &mut self.nodes[i as usize];
            if node.height < 0 {
                continue;
            }

            if node.is_leaf() {
                node.parent = NULL_NODE;
                leaves.push(i);
            } else {
                self.free_node(i);
            }
        }

        if leaves.is_empty() {
            self.root = NULL_NODE;
            return;
        }

        while leaves.len() > 1 {
            let mut min_cost = f32::MAX;
            let (mut i_min, mut j_min) = (0, 1);
            for i in 0..leaves.len() {
                let aabb_i = self.nodes[leaves[i] as usize].aabb;
                for j in (i + 1)..leaves.len() {
                    let aabb_j = self.nodes[leaves[j] as usize].aabb;
                    let cost = aabb_i.union(aabb_j).perimeter();
                    if cost < min_cost {
                        i_min = i;
                        j_min = j;
                        min_cost = cost;
                    }
                }
            }

            let index1 = leaves[i_min];
            let index2 = leaves[j_min];

            let parent_index = self.allocate_node();
            let (h1, h2) = (self.nodes[index1 as usize].height, self.nodes[index2 as usize].height);
            let union = self.nodes[index1 as usize]
                .aabb
                .union(self.nodes[index2 as usize].aabb);

            let parent = &mut self.nodes[parent_index as usize];
            parent.child1 = index1;
            parent.child2 = index2;
            parent.height = 1 + h1.max(h2);
            parent.aabb = union;
            parent.parent = NULL_NODE;

            self.nodes[index1 as usize].parent = parent_index;
            self.nodes[index2 as usize].parent = parent_index;

            let last = leaves.len() - 1;
            leaves[j_min] = leaves[last];
            leaves[i_min] = parent_index;
            leaves.pop();
        }

        self.root = leaves[0];
    }

    /// Moves every stored AABB so that `new_origin` becomes the origin
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for node in &mut self.nodes {
            node.aabb = node.aabb.translate(-new_origin);
        }
    }

    fn is_leaf(&self, proxy_id: ProxyId) -> bool {
        self.nodes
            .get(proxy_id as usize)
            .map(|n| n.height >= 0 && n.is_leaf())
            .unwrap_or(false)
    }

    fn allocate_node(&mut self) -> u32 {
        let node = TreeNode {
            height: 0,
            ..TreeNode::free()
        };
        if let Some(index) = self.free_list.pop() {
            self.nodes[index as usize] = node;
            index
        } else {
            let index = self.nodes.len() as u32;
            self.nodes.push(node);
            index
        }
    }

    fn free_node(&mut self, index: u32) {
        self.nodes[index as usize] = TreeNode::free();
        self.free_list.push(index);
    }

    fn insert_leaf(&mut self, leaf: u32) {
        self.insertion_count += 1;

        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent = NULL_NODE;
            return;
        }

        // Find the best sibling for this node
        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut index = self.root;
        while !self.nodes[index as usize].is_leaf() {
            let node = &self.nodes[index as usize];
            let child1 = node.child1;
            let child2 = node.child2;

            let area = node.aabb.perimeter();
            let combined_area = node.aabb.union(leaf_aabb).perimeter();

            // Cost of creating a new parent for this node and the new leaf
            let cost = 2.0 * combined_area;

            // Minimum cost of pushing the leaf further down the tree
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost1 = self.descend_cost(child1, leaf_aabb) + inheritance_cost;
            let cost2 = self.descend_cost(child2, leaf_aabb) + inheritance_cost;

            // Descend according to the minimum cost.
            if cost < cost1 && cost < cost2 {
                break;
            }

            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;

        // Create a new parent.
        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.allocate_node();
        {
            let sibling_node = &self.nodes[sibling as usize];
            let aabb = leaf_aabb.union(sibling_node.aabb);
            let height = sibling_node.height + 1;
            let parent = &mut self.nodes[new_parent as usize];
            parent.parent = old_parent;
            parent.aabb = aabb;
            parent.height = height;
            parent.child1 = sibling;
            parent.child2 = leaf;
        }
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        if old_parent != NULL_NODE {
            // The sibling was not the root.
            let old = &mut self.nodes[old_parent as usize];
            if old.child1 == sibling {
                old.child1 = new_parent;
            } else {
                old.child2 = new_parent;
            }
        } else {
            // The sibling was the root.
            self.root = new_parent;
        }

        // Walk back up the tree fixing heights and AABBs
        self.refit(self.nodes[leaf as usize].parent);
    }

    fn descend_cost(&self, child: u32, leaf_aabb: Aabb) -> f32 {
        let node = &self.nodes[child as usize];
        let new_area = leaf_aabb.union(node.aabb).perimeter();
        if node.is_leaf() {
            new_area
        } else {
            new_area - node.aabb.perimeter()
        }
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grand_parent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].child1 == leaf {
            self.nodes[parent as usize].child2
        } else {
            self.nodes[parent as usize].child1
        };

        if grand_parent != NULL_NODE {
            // Destroy parent and connect sibling to grand parent.
            let gp = &mut self.nodes[grand_parent as usize];
            if gp.child1 == parent {
                gp.child1 = sibling;
            } else {
                gp.child2 = sibling;
            }
            self.nodes[sibling as usize].parent = grand_parent;
            self.free_node(parent);

            // Adjust ancestor bounds.
            self.refit(grand_parent);
        } else {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL_NODE;
            self.free_node(parent);
        }
    }

    /// Rebalances and refits every ancestor starting at `start`
    fn refit(&mut self, start: u32) {
        let mut index = start;
        while index != NULL_NODE {
            index = self.balance(index);

            let child1 = self.nodes[index as usize].child1;
            let child2 = self.nodes[index as usize].child2;
            let (a1, h1) = (self.nodes[child1 as usize].aabb, self.nodes[child1 as usize].height);
            let (a2, h2) = (self.nodes[child2 as usize].aabb, self.nodes[child2 as usize].height);

            let node = &mut self.nodes[index as usize];
            node.height = 1 + h1.max(h2);
            node.aabb = a1.union(a2);

            index = node.parent;
        }
    }

    /// Performs a left or right rotation if node A is imbalanced.
    /// Returns the new root index of the subtree.
    fn balance(&mut self, i_a: u32) -> u32 {
        let a = &self.nodes[i_a as usize];
        if a.is_leaf() || a.height < 2 {
            return i_a;
        }

        let i_b = a.child1;
        let i_c = a.child2;
        let balance = self.nodes[i_c as usize].height - self.nodes[i_b as usize].height;

        if balance > 1 {
            // Rotate C up
            self.rotate_up(i_a, i_c, i_b, true);
            return i_c;
        }

        if balance < -1 {
            // Rotate B up
            self.rotate_up(i_a, i_b, i_c, false);
            return i_b;
        }

        i_a
    }

    /// Promotes child `i_up` of `i_a` into A's place. `i_other` is A's remaining child.
    /// `up_is_child2` tells which slot of A the promoted child came from.
    fn rotate_up(&mut self, i_a: u32, i_up: u32, i_other: u32, up_is_child2: bool) {
        let i_f = self.nodes[i_up as usize].child1;
        let i_g = self.nodes[i_up as usize].child2;

        // Swap A and the promoted node
        let a_parent = self.nodes[i_a as usize].parent;
        self.nodes[i_up as usize].child1 = i_a;
        self.nodes[i_up as usize].parent = a_parent;
        self.nodes[i_a as usize].parent = i_up;

        // A's old parent should point to the promoted node
        if a_parent != NULL_NODE {
            let p = &mut self.nodes[a_parent as usize];
            if p.child1 == i_a {
                p.child1 = i_up;
            } else {
                p.child2 = i_up;
            }
        } else {
            self.root = i_up;
        }

        // The taller grandchild stays with the promoted node, the shorter one moves to A
        let (keep, give) = if self.nodes[i_f as usize].height > self.nodes[i_g as usize].height {
            (i_f, i_g)
        } else {
            (i_g, i_f)
        };

        self.nodes[i_up as usize].child2 = keep;
        if up_is_child2 {
            self.nodes[i_a as usize].child2 = give;
        } else {
            self.nodes[i_a as usize].child1 = give;
        }
        self.nodes[give as usize].parent = i_a;

        let other = &self.nodes[i_other as usize];
        let given = &self.nodes[give as usize];
        let a_aabb = other.aabb.union(given.aabb);
        let a_height = 1 + other.height.max(given.height);

        let kept = &self.nodes[keep as usize];
        let up_aabb = a_aabb.union(kept.aabb);
        let up_height = 1 + a_height.max(kept.height);

        self.nodes[i_a as usize].aabb = a_aabb;
        self.nodes[i_a as usize].height = a_height;
        self.nodes[i_up as usize].aabb = up_aabb;
        self.nodes[i_up as usize].height = up_height;
    }
}
