//! Window layout tree.
//!
//! A recursive binary tree of screen rectangles backed by a slotmap
//! arena. Leaves display a buffer; split nodes stack their two children
//! vertically (`HSplit`) or side by side (`VSplit`). Every mutation
//! restores the tiling invariant before returning: children of an
//! `HSplit` share its width and their heights sum to its height, and
//! symmetrically for `VSplit`. The tree knows nothing about rendering.

use slotmap::{new_key_type, SlotMap};
use tracing::error;

use crate::client::buffer::BufferId;

new_key_type! {
    /// Stable handle to a tree node. Keys survive unrelated insertions
    /// and removals.
    pub struct WindowId;
}

/// Per-leaf view state, carried across splits and promotions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafState {
    pub buffer: BufferId,
    /// Lines scrolled up from the bottom of the message history.
    pub scroll: usize,
    pub resize_mode: bool,
    pub search_mode: bool,
}

impl LeafState {
    fn new(buffer: BufferId) -> Self {
        Self {
            buffer,
            scroll: 0,
            resize_mode: false,
            search_mode: false,
        }
    }
}

#[derive(Clone, Debug)]
pub enum WindowKind {
    Leaf(LeafState),
    /// Children stacked vertically; `one` on top.
    HSplit { one: WindowId, two: WindowId },
    /// Children side by side; `one` on the left.
    VSplit { one: WindowId, two: WindowId },
}

/// One tree node with its absolute screen rectangle.
#[derive(Clone, Debug)]
pub struct Window {
    pub parent: Option<WindowId>,
    pub height: u16,
    pub width: u16,
    pub y: u16,
    pub x: u16,
    pub kind: WindowKind,
}

impl Window {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, WindowKind::Leaf(_))
    }

    fn children(&self) -> Option<(WindowId, WindowId)> {
        match self.kind {
            WindowKind::Leaf(_) => None,
            WindowKind::HSplit { one, two } | WindowKind::VSplit { one, two } => Some((one, two)),
        }
    }
}

pub struct WindowTree {
    nodes: SlotMap<WindowId, Window>,
    root: WindowId,
}

impl WindowTree {
    /// A tree with a single root leaf covering the whole screen.
    pub fn new(height: u16, width: u16, buffer: BufferId) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Window {
            parent: None,
            height,
            width,
            y: 0,
            x: 0,
            kind: WindowKind::Leaf(LeafState::new(buffer)),
        });
        Self { nodes, root }
    }

    pub fn root(&self) -> WindowId {
        self.root
    }

    pub fn get(&self, id: WindowId) -> &Window {
        &self.nodes[id]
    }

    pub fn leaf(&self, id: WindowId) -> &LeafState {
        match &self.nodes[id].kind {
            WindowKind::Leaf(state) => state,
            _ => unreachable!("leaf() on a split node"),
        }
    }

    pub fn leaf_mut(&mut self, id: WindowId) -> &mut LeafState {
        match &mut self.nodes[id].kind {
            WindowKind::Leaf(state) => state,
            _ => unreachable!("leaf_mut() on a split node"),
        }
    }

    /// All leaves in pre-order (top-left first).
    pub fn leaves(&self) -> Vec<WindowId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match self.nodes[id].kind {
                WindowKind::Leaf(_) => out.push(id),
                WindowKind::HSplit { one, two } | WindowKind::VSplit { one, two } => {
                    stack.push(two);
                    stack.push(one);
                }
            }
        }
        // stack pops reverse the push order per node, so `one` comes
        // out before `two` already; nothing further to fix up
        out
    }

    /// Point every leaf showing `old` at `new` instead.
    pub fn replace_buffer(&mut self, old: BufferId, new: BufferId) {
        for id in self.leaves() {
            let state = self.leaf_mut(id);
            if state.buffer == old {
                state.buffer = new;
            }
        }
    }

    /// The leaf whose rectangle contains the point `(y, x)`.
    pub fn find(&self, y: u16, x: u16) -> WindowId {
        let mut id = self.root;
        loop {
            let node = &self.nodes[id];
            id = match node.kind {
                WindowKind::Leaf(_) => return id,
                WindowKind::VSplit { one, two } => {
                    let left = &self.nodes[one];
                    if x < left.x + left.width {
                        one
                    } else {
                        two
                    }
                }
                WindowKind::HSplit { one, two } => {
                    let top = &self.nodes[one];
                    if y < top.y + top.height {
                        one
                    } else {
                        two
                    }
                }
            };
        }
    }

    /// Redistribute widths and x origins below `id`: a `VSplit` gives
    /// its first child the odd column, an `HSplit` passes its width
    /// through to both children.
    fn hbalance(&mut self, id: WindowId) {
        let node = &self.nodes[id];
        let (width, x) = (node.width, node.x);
        let Some((one, two)) = node.children() else {
            return;
        };

        let split = matches!(node.kind, WindowKind::VSplit { .. });
        let one_width = if split { (width / 2) + (width & 1) } else { width };

        {
            let w = &mut self.nodes[one];
            w.width = one_width;
            w.x = x;
        }
        {
            let w = &mut self.nodes[two];
            w.width = if split { width - one_width } else { width };
            w.x = if split { x + one_width } else { x };
        }

        self.hbalance(one);
        self.hbalance(two);
    }

    /// Mirror of [`hbalance`] for heights and y origins.
    fn vbalance(&mut self, id: WindowId) {
        let node = &self.nodes[id];
        let (height, y) = (node.height, node.y);
        let Some((one, two)) = node.children() else {
            return;
        };

        let split = matches!(node.kind, WindowKind::HSplit { .. });
        let one_height = if split { (height / 2) + (height & 1) } else { height };

        {
            let w = &mut self.nodes[one];
            w.height = one_height;
            w.y = y;
        }
        {
            let w = &mut self.nodes[two];
            w.height = if split { height - one_height } else { height };
            w.y = if split { y + one_height } else { y };
        }

        self.vbalance(one);
        self.vbalance(two);
    }

    /// Fit the whole tree to a new screen size.
    pub fn resize(&mut self, height: u16, width: u16) {
        let root = self.root;
        {
            let node = &mut self.nodes[root];
            node.height = height;
            node.width = width;
            node.y = 0;
            node.x = 0;
        }
        self.hbalance(root);
        self.vbalance(root);
    }

    /// Split a leaf into two stacked leaves. The first (top) child
    /// inherits the old leaf's state, the second shows `buffer`.
    /// `size` measures the second child; `-1` means an even split with
    /// the odd row going to the first child. Returns `(first, second)`.
    pub fn hsplit(&mut self, id: WindowId, buffer: BufferId, size: i32) -> (WindowId, WindowId) {
        let node = self.nodes[id].clone();
        let state = match node.kind {
            WindowKind::Leaf(state) => state,
            _ => {
                debug_assert!(false, "hsplit on a split node");
                error!("hsplit on a split node");
                return (id, id);
            }
        };

        let two_h = if size == -1 {
            node.height / 2
        } else {
            (size as u16).clamp(1, node.height.saturating_sub(1).max(1))
        };
        let one_h = node.height - two_h;

        let one = self.nodes.insert(Window {
            parent: Some(id),
            height: one_h,
            width: node.width,
            y: node.y,
            x: node.x,
            kind: WindowKind::Leaf(state),
        });
        let two = self.nodes.insert(Window {
            parent: Some(id),
            height: two_h,
            width: node.width,
            y: node.y + one_h,
            x: node.x,
            kind: WindowKind::Leaf(LeafState::new(buffer)),
        });
        self.nodes[id].kind = WindowKind::HSplit { one, two };

        (one, two)
    }

    /// Side-by-side variant of [`hsplit`]; the first child is on the
    /// left and `size` measures the second (right) child.
    pub fn vsplit(&mut self, id: WindowId, buffer: BufferId, size: i32) -> (WindowId, WindowId) {
        let node = self.nodes[id].clone();
        let state = match node.kind {
            WindowKind::Leaf(state) => state,
            _ => {
                debug_assert!(false, "vsplit on a split node");
                error!("vsplit on a split node");
                return (id, id);
            }
        };

        let two_w = if size == -1 {
            node.width / 2
        } else {
            (size as u16).clamp(1, node.width.saturating_sub(1).max(1))
        };
        let one_w = node.width - two_w;

        let one = self.nodes.insert(Window {
            parent: Some(id),
            height: node.height,
            width: one_w,
            y: node.y,
            x: node.x,
            kind: WindowKind::Leaf(state),
        });
        let two = self.nodes.insert(Window {
            parent: Some(id),
            height: node.height,
            width: two_w,
            y: node.y,
            x: node.x + one_w,
            kind: WindowKind::Leaf(LeafState::new(buffer)),
        });
        self.nodes[id].kind = WindowKind::VSplit { one, two };

        (one, two)
    }

    fn sibling(&self, id: WindowId) -> Option<WindowId> {
        let parent = self.nodes[id].parent?;
        let (one, two) = self.nodes[parent].children()?;
        Some(if one == id { two } else { one })
    }

    /// Remove a leaf, promoting its sibling's subtree into the parent
    /// slot. Deleting the root is a no-op. Returns the leaf now
    /// occupying the deleted parent's origin.
    pub fn delete(&mut self, id: WindowId) -> WindowId {
        let Some(parent) = self.nodes[id].parent else {
            return id;
        };
        let sibling = self.sibling(id).expect("split node with one child");

        // the axis to rebalance is the parent's before promotion
        let was_hsplit = matches!(self.nodes[parent].kind, WindowKind::HSplit { .. });

        let promoted = self.nodes[sibling].kind.clone();
        if let Some((one, two)) = self.nodes[sibling].children() {
            self.nodes[one].parent = Some(parent);
            self.nodes[two].parent = Some(parent);
        }
        self.nodes[parent].kind = promoted;
        self.nodes.remove(sibling);
        self.nodes.remove(id);

        if !self.nodes[parent].is_leaf() {
            if was_hsplit {
                self.vbalance(parent);
            } else {
                self.hbalance(parent);
            }
        }

        let node = &self.nodes[parent];
        self.find(node.y, node.x)
    }

    /// Grow `id` by `dy` rows at the expense of the sibling under its
    /// nearest `HSplit` ancestor. No-op at the root or when either side
    /// would drop below one row.
    pub fn grow_y(&mut self, id: WindowId, dy: i32) {
        let mut w = id;
        let mut parent = self.nodes[w].parent;
        while let Some(p) = parent {
            if matches!(self.nodes[p].kind, WindowKind::HSplit { .. }) {
                break;
            }
            w = p;
            parent = self.nodes[p].parent;
        }
        let Some(p) = parent else {
            return;
        };

        let sibling = self.sibling(w).expect("split node with one child");
        let grown = self.nodes[w].height as i32 + dy;
        let shrunk = self.nodes[sibling].height as i32 - dy;
        if grown < 1 || shrunk < 1 {
            return;
        }

        let (one, two) = self.nodes[p].children().expect("ancestor is a split");
        self.nodes[w].height = grown as u16;
        self.nodes[sibling].height = shrunk as u16;
        if w == one {
            let y = self.nodes[two].y as i32 + dy;
            self.nodes[two].y = y as u16;
        } else {
            let y = self.nodes[w].y as i32 - dy;
            self.nodes[w].y = y as u16;
        }

        self.vbalance(one);
        self.vbalance(two);
    }

    /// Column-axis counterpart of [`grow_y`], using the nearest
    /// `VSplit` ancestor.
    pub fn grow_x(&mut self, id: WindowId, dx: i32) {
        let mut w = id;
        let mut parent = self.nodes[w].parent;
        while let Some(p) = parent {
            if matches!(self.nodes[p].kind, WindowKind::VSplit { .. }) {
                break;
            }
            w = p;
            parent = self.nodes[p].parent;
        }
        let Some(p) = parent else {
            return;
        };

        let sibling = self.sibling(w).expect("split node with one child");
        let grown = self.nodes[w].width as i32 + dx;
        let shrunk = self.nodes[sibling].width as i32 - dx;
        if grown < 1 || shrunk < 1 {
            return;
        }

        let (one, two) = self.nodes[p].children().expect("ancestor is a split");
        self.nodes[w].width = grown as u16;
        self.nodes[sibling].width = shrunk as u16;
        if w == one {
            let x = self.nodes[two].x as i32 + dx;
            self.nodes[two].x = x as u16;
        } else {
            let x = self.nodes[w].x as i32 - dx;
            self.nodes[w].x = x as u16;
        }

        self.hbalance(one);
        self.hbalance(two);
    }

    /// Next leaf in traversal order, wrapping from the last back to the
    /// first. A lone root returns itself.
    pub fn next(&self, id: WindowId) -> WindowId {
        debug_assert!(self.nodes[id].is_leaf());

        let mut w = id;
        let mut parent = self.nodes[w].parent;
        if parent.is_none() {
            return w;
        }

        while let Some(p) = parent {
            let (_, two) = self.nodes[p].children().expect("parent is a split");
            if two != w {
                w = two;
                break;
            }
            w = p;
            parent = self.nodes[p].parent;
        }
        // at the root after exhausting second children: wrap around

        while let Some((one, _)) = self.nodes[w].children() {
            w = one;
        }
        w
    }

    /// Previous leaf in traversal order, wrapping from the first back
    /// to the last.
    pub fn prev(&self, id: WindowId) -> WindowId {
        debug_assert!(self.nodes[id].is_leaf());

        let mut w = id;
        let mut parent = self.nodes[w].parent;
        if parent.is_none() {
            return w;
        }

        while let Some(p) = parent {
            let (one, _) = self.nodes[p].children().expect("parent is a split");
            if one != w {
                w = one;
                break;
            }
            w = p;
            parent = self.nodes[p].parent;
        }

        while let Some((_, two)) = self.nodes[w].children() {
            w = two;
        }
        w
    }

    /// Leaf immediately to the right of `id`, probing one column past
    /// its right edge. Returns `id` at the screen edge.
    pub fn right(&self, id: WindowId) -> WindowId {
        let node = &self.nodes[id];
        let root = &self.nodes[self.root];
        if node.x + node.width == root.width {
            id
        } else {
            self.find(node.y, node.x + node.width)
        }
    }

    pub fn left(&self, id: WindowId) -> WindowId {
        let node = &self.nodes[id];
        if node.x == 0 {
            id
        } else {
            self.find(node.y, node.x - 1)
        }
    }

    pub fn up(&self, id: WindowId) -> WindowId {
        let node = &self.nodes[id];
        if node.y == 0 {
            id
        } else {
            self.find(node.y - 1, node.x)
        }
    }

    pub fn down(&self, id: WindowId) -> WindowId {
        let node = &self.nodes[id];
        let root = &self.nodes[self.root];
        if node.y + node.height == root.height {
            id
        } else {
            self.find(node.y + node.height, node.x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // children must tile their parent exactly, all the way down
    fn check_tiling(tree: &WindowTree, id: WindowId) {
        let node = tree.get(id);
        match node.kind {
            WindowKind::Leaf(_) => {}
            WindowKind::HSplit { one, two } => {
                let (a, b) = (tree.get(one), tree.get(two));
                assert_eq!(a.width, node.width);
                assert_eq!(b.width, node.width);
                assert_eq!(a.x, node.x);
                assert_eq!(b.x, node.x);
                assert_eq!(a.y, node.y);
                assert_eq!(b.y, node.y + a.height);
                assert_eq!(a.height + b.height, node.height);
                check_tiling(tree, one);
                check_tiling(tree, two);
            }
            WindowKind::VSplit { one, two } => {
                let (a, b) = (tree.get(one), tree.get(two));
                assert_eq!(a.height, node.height);
                assert_eq!(b.height, node.height);
                assert_eq!(a.y, node.y);
                assert_eq!(b.y, node.y);
                assert_eq!(a.x, node.x);
                assert_eq!(b.x, node.x + a.width);
                assert_eq!(a.width + b.width, node.width);
                check_tiling(tree, one);
                check_tiling(tree, two);
            }
        }
    }

    const BUF: BufferId = 1;
    const BUF2: BufferId = 2;

    #[test]
    fn even_split_of_even_extent() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (one, two) = tree.vsplit(tree.root(), BUF2, -1);
        assert_eq!(tree.get(one).width, 40);
        assert_eq!(tree.get(two).width, 40);
        assert_eq!(tree.get(two).x, 40);
        check_tiling(&tree, tree.root());
    }

    #[test]
    fn even_split_of_odd_extent_favors_first() {
        let mut tree = WindowTree::new(24, 81, BUF);
        let (one, two) = tree.vsplit(tree.root(), BUF2, -1);
        assert_eq!(tree.get(one).width, 41);
        assert_eq!(tree.get(two).width, 40);
        check_tiling(&tree, tree.root());
    }

    #[test]
    fn split_inherits_state_and_assigns_buffers() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let root = tree.root();
        tree.leaf_mut(root).scroll = 7;
        let (one, two) = tree.hsplit(root, BUF2, -1);
        assert_eq!(tree.leaf(one).buffer, BUF);
        assert_eq!(tree.leaf(one).scroll, 7);
        assert_eq!(tree.leaf(two).buffer, BUF2);
        assert_eq!(tree.leaf(two).scroll, 0);
        assert_eq!(tree.get(one).height, 12);
        assert_eq!(tree.get(two).y, 12);
    }

    #[test]
    fn explicit_split_size_measures_second_child() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (one, two) = tree.hsplit(tree.root(), BUF2, 5);
        assert_eq!(tree.get(two).height, 5);
        assert_eq!(tree.get(one).height, 19);
        check_tiling(&tree, tree.root());
    }

    #[test]
    fn grow_and_shrink_restore_geometry() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (one, two) = tree.vsplit(tree.root(), BUF2, -1);
        tree.grow_x(one, 5);
        assert_eq!(tree.get(one).width, 45);
        assert_eq!(tree.get(two).width, 35);
        assert_eq!(tree.get(two).x, 45);
        check_tiling(&tree, tree.root());
        tree.grow_x(one, -5);
        assert_eq!(tree.get(one).width, 40);
        assert_eq!(tree.get(two).width, 40);
        check_tiling(&tree, tree.root());
    }

    #[test]
    fn grow_that_would_starve_a_side_is_a_no_op() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (one, two) = tree.vsplit(tree.root(), BUF2, -1);
        tree.grow_x(one, 40);
        assert_eq!(tree.get(one).width, 40);
        assert_eq!(tree.get(two).width, 40);
    }

    #[test]
    fn grow_without_matching_ancestor_is_a_no_op() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (one, _) = tree.hsplit(tree.root(), BUF2, -1);
        tree.grow_x(one, 3);
        assert_eq!(tree.get(one).width, 80);
        check_tiling(&tree, tree.root());
    }

    #[test]
    fn next_and_prev_cycle_through_all_leaves() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (a, b) = tree.vsplit(tree.root(), BUF2, -1);
        let (b1, b2) = tree.hsplit(b, BUF, -1);

        assert_eq!(tree.next(a), b1);
        assert_eq!(tree.next(b1), b2);
        assert_eq!(tree.next(b2), a); // wraps

        assert_eq!(tree.prev(a), b2); // wraps
        assert_eq!(tree.prev(b2), b1);
        assert_eq!(tree.prev(b1), a);
    }

    #[test]
    fn next_on_lone_root_returns_itself() {
        let tree = WindowTree::new(24, 80, BUF);
        assert_eq!(tree.next(tree.root()), tree.root());
        assert_eq!(tree.prev(tree.root()), tree.root());
    }

    #[test]
    fn directional_navigation() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (a, b) = tree.vsplit(tree.root(), BUF2, -1);
        let (b1, b2) = tree.hsplit(b, BUF, -1);

        assert_eq!(tree.right(a), b1);
        assert_eq!(tree.left(b1), a);
        assert_eq!(tree.down(b1), b2);
        assert_eq!(tree.up(b2), b1);
        // screen edges
        assert_eq!(tree.left(a), a);
        assert_eq!(tree.up(b1), b1);
        assert_eq!(tree.down(b2), b2);
        assert_eq!(tree.right(b1), b1);
    }

    #[test]
    fn delete_root_is_a_no_op() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let root = tree.root();
        assert_eq!(tree.delete(root), root);
        assert!(tree.get(root).is_leaf());
    }

    #[test]
    fn delete_promotes_leaf_sibling() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let root = tree.root();
        let (one, two) = tree.vsplit(root, BUF2, -1);
        let focus = tree.delete(two);
        assert_eq!(focus, root);
        let node = tree.get(root);
        assert!(node.is_leaf());
        assert_eq!((node.height, node.width), (24, 80));
        assert_eq!(tree.leaf(root).buffer, BUF);
        let _ = one; // removed from the arena with its parent slot reused
    }

    #[test]
    fn delete_promotes_split_sibling_and_rebalances() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (a, b) = tree.vsplit(tree.root(), BUF2, -1);
        let (b1, b2) = tree.hsplit(b, BUF, -1);

        let focus = tree.delete(a);
        check_tiling(&tree, tree.root());
        // the sibling's stack now spans the full width
        assert_eq!(tree.get(b1).width, 80);
        assert_eq!(tree.get(b2).width, 80);
        assert_eq!(tree.get(b1).x, 0);
        // focus lands on the leaf at the old parent's origin
        assert_eq!(focus, b1);
    }

    #[test]
    fn resize_rebalances_the_whole_tree() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (a, b) = tree.vsplit(tree.root(), BUF2, -1);
        tree.grow_x(a, 10);
        tree.resize(30, 120);
        check_tiling(&tree, tree.root());
        assert_eq!(tree.get(a).height, 30);
        assert_eq!(tree.get(a).width + tree.get(b).width, 120);
    }

    #[test]
    fn find_locates_leaf_by_point() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (a, b) = tree.vsplit(tree.root(), BUF2, -1);
        assert_eq!(tree.find(0, 0), a);
        assert_eq!(tree.find(23, 39), a);
        assert_eq!(tree.find(0, 40), b);
        assert_eq!(tree.find(23, 79), b);
    }

    #[test]
    fn replace_buffer_rewrites_matching_leaves() {
        let mut tree = WindowTree::new(24, 80, BUF);
        let (a, b) = tree.vsplit(tree.root(), BUF, -1);
        tree.replace_buffer(BUF, BUF2);
        assert_eq!(tree.leaf(a).buffer, BUF2);
        assert_eq!(tree.leaf(b).buffer, BUF2);
    }
}
