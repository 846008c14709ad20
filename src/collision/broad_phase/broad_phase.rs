use super::dynamic_tree::{DynamicTree, ProxyId, NULL_NODE};
use crate::geometry::{Aabb, RayCastInput};
use crate::math::Vec2;

/// Pair discovery on top of a [`DynamicTree`].
///
/// Proxies that moved are buffered; [`BroadPhase::update_pairs`] queries each
/// buffered proxy against the tree and reports every new overlapping pair once.
#[derive(Debug, Clone)]
pub struct BroadPhase<T> {
    tree: DynamicTree<T>,
    proxy_count: usize,
    move_buffer: Vec<ProxyId>,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new() -> Self {
        Self {
            tree: DynamicTree::new(),
            proxy_count: 0,
            move_buffer: Vec::with_capacity(16),
            pair_buffer: Vec::with_capacity(16),
        }
    }

    /// Creates a proxy with a tight AABB. Pairs are not reported until
    /// [`BroadPhase::update_pairs`] is called.
    pub fn create_proxy(&mut self, aabb: Aabb, user_data: T) -> ProxyId {
        let proxy_id = self.tree.create_proxy(aabb, user_data);
        self.proxy_count += 1;
        self.buffer_move(proxy_id);
        proxy_id
    }

    pub fn destroy_proxy(&mut self, proxy_id: ProxyId) {
        self.unbuffer_move(proxy_id);
        self.proxy_count -= 1;
        self.tree.destroy_proxy(proxy_id);
    }

    /// Moves a proxy. Only reinserted proxies are buffered for pair updates.
    pub fn move_proxy(&mut self, proxy_id: ProxyId, aabb: Aabb, displacement: Vec2) {
        if self.tree.move_proxy(proxy_id, aabb, displacement) {
            self.buffer_move(proxy_id);
        }
    }

    /// Forces the proxy to be re-queried on the next pair update
    pub fn touch_proxy(&mut self, proxy_id: ProxyId) {
        self.buffer_move(proxy_id);
    }

    #[inline]
    pub fn fat_aabb(&self, proxy_id: ProxyId) -> Aabb {
        self.tree.fat_aabb(proxy_id)
    }

    #[inline]
    pub fn user_data(&self, proxy_id: ProxyId) -> Option<T> {
        self.tree.user_data(proxy_id)
    }

    /// Tests whether the fat AABBs of two proxies overlap
    #[inline]
    pub fn test_overlap(&self, proxy_a: ProxyId, proxy_b: ProxyId) -> bool {
        self.tree.fat_aabb(proxy_a).overlaps(self.tree.fat_aabb(proxy_b))
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    #[inline]
    pub fn tree(&self) -> &DynamicTree<T> {
        &self.tree
    }

    pub fn tree_height(&self) -> i32 {
        self.tree.height()
    }

    pub fn tree_balance(&self) -> i32 {
        self.tree.max_balance()
    }

    pub fn tree_quality(&self) -> f32 {
        self.tree.area_ratio()
    }

    /// Reports every new pair of overlapping proxies to `callback`.
    ///
    /// When both proxies of a pair moved, the pair is found from the query of
    /// the lower id only, so each pair is reported exactly once.
    pub fn update_pairs(&mut self, mut callback: impl FnMut(T, T)) {
        self.pair_buffer.clear();

        let tree = &self.tree;
        let pair_buffer = &mut self.pair_buffer;
        for &query_id in &self.move_buffer {
            if query_id == NULL_NODE {
                continue;
            }

            let fat_aabb = tree.fat_aabb(query_id);
            tree.query(fat_aabb, |proxy_id| {
                // A proxy cannot form a pair with itself.
                if proxy_id == query_id {
                    return true;
                }

                // Both moved: avoid the duplicate pair.
                if tree.was_moved(proxy_id) && proxy_id > query_id {
                    return true;
                }

                pair_buffer.push((proxy_id.min(query_id), proxy_id.max(query_id)));
                true
            });
        }

        for &(a, b) in &self.pair_buffer {
            if let (Some(user_a), Some(user_b)) = (self.tree.user_data(a), self.tree.user_data(b)) {
                callback(user_a, user_b);
            }
        }

        // Clear move flags
        for &proxy_id in &self.move_buffer {
            if proxy_id != NULL_NODE {
                self.tree.clear_moved(proxy_id);
            }
        }

        self.move_buffer.clear();
    }

    /// Visits proxies whose fat AABB overlaps `aabb`
    pub fn query(&self, aabb: Aabb, callback: impl FnMut(ProxyId) -> bool) {
        self.tree.query(aabb, callback);
    }

    /// Casts a ray against the proxies, see [`DynamicTree::ray_cast`]
    pub fn ray_cast(&self, input: &RayCastInput, callback: impl FnMut(&RayCastInput, ProxyId) -> f32) {
        self.tree.ray_cast(input, callback);
    }

    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.tree.shift_origin(new_origin);
    }

    fn buffer_move(&mut self, proxy_id: ProxyId) {
        self.move_buffer.push(proxy_id);
    }

    fn unbuffer_move(&mut self, proxy_id: ProxyId) {
        for id in &mut self.move_buffer {
            if *id == proxy_id {
                *id = NULL_NODE;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_at(x: f32) -> Aabb {
        Aabb::new(Vec2::new(x, 0.0), Vec2::new(x + 1.0, 1.0))
    }

    fn collect_pairs(bp: &mut BroadPhase<u32>) -> Vec<(u32, u32)> {
        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a.min(b), a.max(b))));
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn test_pairs_reported_once() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(unit_at(0.0), 10);
        bp.create_proxy(unit_at(0.5), 11);
        bp.create_proxy(unit_at(10.0), 12);

        assert_eq!(collect_pairs(&mut bp), vec![(10, 11)]);
        // Nothing moved since
        assert!(collect_pairs(&mut bp).is_empty());
    }

    #[test]
    fn test_small_move_is_not_buffered() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(unit_at(0.0), 0);
        bp.create_proxy(unit_at(0.5), 1);
        collect_pairs(&mut bp);

        bp.move_proxy(a, unit_at(0.01), Vec2::new(0.01, 0.0));
        assert!(collect_pairs(&mut bp).is_empty());

        bp.touch_proxy(a);
        assert_eq!(collect_pairs(&mut bp), vec![(0, 1)]);
    }

    #[test]
    fn test_destroyed_proxy_is_unbuffered() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(unit_at(0.0), 0);
        let b = bp.create_proxy(unit_at(0.5), 1);
        bp.destroy_proxy(a);
        assert_eq!(bp.proxy_count(), 1);
        assert!(collect_pairs(&mut bp).is_empty());
        assert_eq!(bp.user_data(b), Some(1));
    }

    #[test]
    fn test_overlap_uses_fat_aabbs() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(unit_at(0.0), 0);
        // Gap of 0.15 is bridged by the two 0.1 margins
        let b = bp.create_proxy(unit_at(1.15), 1);
        assert!(bp.test_overlap(a, b));
    }
}
