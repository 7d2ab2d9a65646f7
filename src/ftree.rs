
const NIL: u32 = u32::MAX;

/// Stable handle to a node in an [`FTree`]. Handles stay valid until the
/// node is removed, across any number of rotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(u32);

struct Node<T> {
    item: T,
    left: u32,
    right: u32,
    parent: u32,
    height: u8,
    count: u32,
}

/// Order-statistic balanced tree keyed by `f32`.
///
/// Keys are not stored: every operation that needs an ordering takes a key
/// closure, evaluated against the stored items at call time. This is what
/// lets the 2D sweep order active monotone polygons by their left-edge x at
/// the *current* sweep y: the ordering key is externally mutable, and the
/// tree stays valid as long as relative order of live nodes does not change
/// between structural operations.
///
/// Equal keys are stable: insertion descends right of equals, so among ties
/// the earliest-inserted node is leftmost. Rekeying is remove + insert.
pub struct FTree<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<u32>,
    root: u32,
}

impl<T> FTree<T> {
    pub fn new() -> Self {
        FTree { nodes: Vec::new(), free: Vec::new(), root: NIL }
    }

    pub fn len(&self) -> usize {
        if self.root == NIL { 0 } else { self.node(self.root).count as usize }
    }

    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    pub fn get(&self, id: NodeId) -> &T {
        &self.node(id.0).item
    }

    pub fn insert(&mut self, item: T, key: impl Fn(&T) -> f32) -> NodeId {
        let k = key(&item);
        let id = self.alloc(item);
        if self.root == NIL {
            self.root = id;
            return NodeId(id);
        }
        let mut cur = self.root;
        loop {
            let next = if k < key(&self.node(cur).item) {
                &mut self.node_mut(cur).left
            } else {
                &mut self.node_mut(cur).right
            };
            if *next == NIL {
                *next = id;
                self.node_mut(id).parent = cur;
                break;
            }
            cur = *next;
        }
        self.retrace(cur);
        NodeId(id)
    }

    pub fn remove(&mut self, id: NodeId) -> T {
        let n = id.0;
        let (left, right) = (self.node(n).left, self.node(n).right);
        let fix_from;
        if left != NIL && right != NIL {
            // Two children: splice the in-order successor out of its place
            // and move the whole node (not the item) into n's position, so
            // every other NodeId stays valid.
            let s = self.min_of(right);
            let s_parent = self.node(s).parent;
            let s_right = self.node(s).right;
            if s_parent != n {
                self.replace_child(s_parent, s, s_right);
                self.node_mut(s).right = right;
                self.node_mut(right).parent = s;
                fix_from = s_parent;
            } else {
                fix_from = s;
            }
            let parent = self.node(n).parent;
            self.replace_child(parent, n, s);
            self.node_mut(s).parent = parent;
            self.node_mut(s).left = left;
            self.node_mut(left).parent = s;
        } else {
            let child = if left != NIL { left } else { right };
            let parent = self.node(n).parent;
            self.replace_child(parent, n, child);
            if child != NIL {
                self.node_mut(child).parent = parent;
            }
            fix_from = parent;
        }
        if fix_from != NIL {
            self.retrace(fix_from);
        }
        let node = self.nodes[n as usize].take().expect("node already removed");
        self.free.push(n);
        node.item
    }

    pub fn first(&self) -> Option<NodeId> {
        if self.root == NIL { None } else { Some(NodeId(self.min_of(self.root))) }
    }

    pub fn last(&self) -> Option<NodeId> {
        if self.root == NIL {
            return None;
        }
        let mut cur = self.root;
        while self.node(cur).right != NIL {
            cur = self.node(cur).right;
        }
        Some(NodeId(cur))
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = id.0;
        if self.node(cur).right != NIL {
            return Some(NodeId(self.min_of(self.node(cur).right)));
        }
        loop {
            let parent = self.node(cur).parent;
            if parent == NIL {
                return None;
            }
            if self.node(parent).left == cur {
                return Some(NodeId(parent));
            }
            cur = parent;
        }
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = id.0;
        if self.node(cur).left != NIL {
            let mut m = self.node(cur).left;
            while self.node(m).right != NIL {
                m = self.node(m).right;
            }
            return Some(NodeId(m));
        }
        loop {
            let parent = self.node(cur).parent;
            if parent == NIL {
                return None;
            }
            if self.node(parent).right == cur {
                return Some(NodeId(parent));
            }
            cur = parent;
        }
    }

    /// The `k`-th node in key order, zero-based. O(log n) via subtree counts.
    pub fn select(&self, mut k: usize) -> Option<NodeId> {
        if k >= self.len() {
            return None;
        }
        let mut cur = self.root;
        loop {
            let lc = self.count_of(self.node(cur).left) as usize;
            if k < lc {
                cur = self.node(cur).left;
            } else if k == lc {
                return Some(NodeId(cur));
            } else {
                k -= lc + 1;
                cur = self.node(cur).right;
            }
        }
    }

    /// Lower median of the stored keys.
    pub fn median(&self) -> Option<NodeId> {
        if self.is_empty() { None } else { self.select((self.len() - 1) / 2) }
    }

    /// Greatest node whose key does not exceed `bound`; equal keys resolve
    /// to the latest-inserted among them.
    pub fn last_not_above(&self, bound: f32, key: impl Fn(&T) -> f32) -> Option<NodeId> {
        let mut cur = self.root;
        let mut found = None;
        while cur != NIL {
            if key(&self.node(cur).item) <= bound {
                found = Some(NodeId(cur));
                cur = self.node(cur).right;
            } else {
                cur = self.node(cur).left;
            }
        }
        found
    }

    fn alloc(&mut self, item: T) -> u32 {
        let node = Node { item, left: NIL, right: NIL, parent: NIL, height: 1, count: 1 };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                (self.nodes.len() - 1) as u32
            }
        }
    }

    fn node(&self, id: u32) -> &Node<T> {
        self.nodes[id as usize].as_ref().expect("stale node id")
    }

    fn node_mut(&mut self, id: u32) -> &mut Node<T> {
        self.nodes[id as usize].as_mut().expect("stale node id")
    }

    fn height_of(&self, id: u32) -> u8 {
        if id == NIL { 0 } else { self.node(id).height }
    }

    fn count_of(&self, id: u32) -> u32 {
        if id == NIL { 0 } else { self.node(id).count }
    }

    fn min_of(&self, mut id: u32) -> u32 {
        while self.node(id).left != NIL {
            id = self.node(id).left;
        }
        id
    }

    fn replace_child(&mut self, parent: u32, old: u32, new: u32) {
        if parent == NIL {
            self.root = new;
        } else if self.node(parent).left == old {
            self.node_mut(parent).left = new;
        } else {
            self.node_mut(parent).right = new;
        }
    }

    fn refresh(&mut self, id: u32) {
        let (l, r) = (self.node(id).left, self.node(id).right);
        let h = 1 + self.height_of(l).max(self.height_of(r));
        let c = 1 + self.count_of(l) + self.count_of(r);
        let node = self.node_mut(id);
        node.height = h;
        node.count = c;
    }

    fn balance_of(&self, id: u32) -> i16 {
        self.height_of(self.node(id).left) as i16 - self.height_of(self.node(id).right) as i16
    }

    fn rotate_left(&mut self, x: u32) -> u32 {
        let y = self.node(x).right;
        let t = self.node(y).left;
        let parent = self.node(x).parent;
        self.node_mut(x).right = t;
        if t != NIL {
            self.node_mut(t).parent = x;
        }
        self.node_mut(y).left = x;
        self.node_mut(x).parent = y;
        self.node_mut(y).parent = parent;
        self.replace_child(parent, x, y);
        self.refresh(x);
        self.refresh(y);
        y
    }

    fn rotate_right(&mut self, x: u32) -> u32 {
        let y = self.node(x).left;
        let t = self.node(y).right;
        let parent = self.node(x).parent;
        self.node_mut(x).left = t;
        if t != NIL {
            self.node_mut(t).parent = x;
        }
        self.node_mut(y).right = x;
        self.node_mut(x).parent = y;
        self.node_mut(y).parent = parent;
        self.replace_child(parent, x, y);
        self.refresh(x);
        self.refresh(y);
        y
    }

    /// Walk from `id` to the root, refreshing heights/counts and applying
    /// AVL rotations where a subtree went out of balance.
    fn retrace(&mut self, id: u32) {
        let mut cur = id;
        while cur != NIL {
            self.refresh(cur);
            let bf = self.balance_of(cur);
            let top = if bf > 1 {
                let l = self.node(cur).left;
                if self.balance_of(l) < 0 {
                    self.rotate_left(l);
                }
                self.rotate_right(cur)
            } else if bf < -1 {
                let r = self.node(cur).right;
                if self.balance_of(r) > 0 {
                    self.rotate_right(r);
                }
                self.rotate_left(cur)
            } else {
                cur
            };
            cur = self.node(top).parent;
        }
    }
}
