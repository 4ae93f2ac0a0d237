//! Arena-backed red-black tree
//!
//! The original `pynosql` implementation (`pysql/datastructures/rb_set.py`,
//! which wraps a pointer-based `rbtree.py`) links nodes with `Node.left` /
//! `Node.right` / `Node.parent` object references. A direct Rust port of
//! that shape would need `Rc<RefCell<Node>>` with weak parent links, which
//! is exactly the kind of translation this crate avoids — instead the tree
//! here lives in one arena (`Vec<Option<Node<K, V>>>`), and links are
//! `Option<usize>` indices into it. Deleted slots are recycled from a free
//! list. This is the standard idiomatic-Rust shape for linked structures
//! that need parent pointers and is what makes `delete`'s rotations and
//! fix-ups straightforward without unsafe code or reference counting.

use std::cmp::Ordering;
use std::collections::VecDeque;

use super::errors::{RbTreeError, RbTreeResult};

/// Node color. The on-disk encoding spells these `"R"` and `"B"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

impl Color {
    /// The single-letter spelling used in the index file encoding.
    pub fn as_letter(self) -> &'static str {
        match self {
            Color::Red => "R",
            Color::Black => "B",
        }
    }

    /// Parse the single-letter spelling back into a `Color`.
    pub fn from_letter(s: &str) -> RbTreeResult<Self> {
        match s {
            "R" => Ok(Color::Red),
            "B" => Ok(Color::Black),
            other => Err(RbTreeError::Corruption(format!(
                "unrecognized node color {:?} (expected \"R\" or \"B\")",
                other
            ))),
        }
    }
}

type Link = Option<usize>;

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    color: Color,
    parent: Link,
    left: Link,
    right: Link,
}

/// An ordered map from `K` to `V`, backed by a red-black tree.
///
/// Duplicate keys overwrite the existing value. `delete` is a silent
/// no-op on a missing key.
#[derive(Debug, Clone)]
pub struct RbTree<K, V> {
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    root: Link,
    len: usize,
}

impl<K, V> Default for RbTree<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RbTree<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn alloc(&mut self, node: Node<K, V>) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.nodes[idx] = None;
        self.free.push(idx);
    }

    fn node(&self, idx: usize) -> &Node<K, V> {
        self.nodes[idx]
            .as_ref()
            .expect("index referenced by a live link must be occupied")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K, V> {
        self.nodes[idx]
            .as_mut()
            .expect("index referenced by a live link must be occupied")
    }

    fn color(&self, link: Link) -> Color {
        match link {
            Some(idx) => self.node(idx).color,
            None => Color::Black,
        }
    }

    fn parent(&self, idx: usize) -> Link {
        self.node(idx).parent
    }

    fn left(&self, idx: usize) -> Link {
        self.node(idx).left
    }

    fn right(&self, idx: usize) -> Link {
        self.node(idx).right
    }

    fn set_color(&mut self, idx: usize, c: Color) {
        self.node_mut(idx).color = c;
    }

    fn set_parent(&mut self, idx: usize, p: Link) {
        self.node_mut(idx).parent = p;
    }

    fn set_left(&mut self, idx: usize, l: Link) {
        self.node_mut(idx).left = l;
    }

    fn set_right(&mut self, idx: usize, r: Link) {
        self.node_mut(idx).right = r;
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self
            .right(x)
            .expect("rotate_left requires x to have a right child");
        let y_left = self.left(y);
        self.set_right(x, y_left);
        if let Some(yl) = y_left {
            self.set_parent(yl, Some(x));
        }
        self.set_parent(y, self.parent(x));
        match self.parent(x) {
            None => self.root = Some(y),
            Some(p) => {
                if self.left(p) == Some(x) {
                    self.set_left(p, Some(y));
                } else {
                    self.set_right(p, Some(y));
                }
            }
        }
        self.set_left(y, Some(x));
        self.set_parent(x, Some(y));
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self
            .left(x)
            .expect("rotate_right requires x to have a left child");
        let y_right = self.right(y);
        self.set_left(x, y_right);
        if let Some(yr) = y_right {
            self.set_parent(yr, Some(x));
        }
        self.set_parent(y, self.parent(x));
        match self.parent(x) {
            None => self.root = Some(y),
            Some(p) => {
                if self.right(p) == Some(x) {
                    self.set_right(p, Some(y));
                } else {
                    self.set_left(p, Some(y));
                }
            }
        }
        self.set_right(y, Some(x));
        self.set_parent(x, Some(y));
    }

    /// Inserts `key -> value`. If `key` is already present, overwrites the
    /// value in place without otherwise touching the tree's structure.
    pub fn insert(&mut self, key: K, value: V) {
        let mut parent: Link = None;
        let mut cur = self.root;
        let mut insert_left = false;

        while let Some(c) = cur {
            parent = Some(c);
            match key.cmp(&self.node(c).key) {
                Ordering::Less => {
                    insert_left = true;
                    cur = self.left(c);
                }
                Ordering::Greater => {
                    insert_left = false;
                    cur = self.right(c);
                }
                Ordering::Equal => {
                    self.node_mut(c).value = value;
                    return;
                }
            }
        }

        let z = self.alloc(Node {
            key,
            value,
            color: Color::Red,
            parent,
            left: None,
            right: None,
        });

        match parent {
            None => self.root = Some(z),
            Some(p) => {
                if insert_left {
                    self.set_left(p, Some(z));
                } else {
                    self.set_right(p, Some(z));
                }
            }
        }

        self.len += 1;
        self.insert_fixup(z);
    }

    fn insert_fixup(&mut self, mut z: usize) {
        loop {
            let Some(p) = self.parent(z) else { break };
            if self.color(Some(p)) != Color::Red {
                break;
            }
            let gp = self
                .parent(p)
                .expect("a red node always has a black (non-root) grandparent");

            if Some(p) == self.left(gp) {
                let uncle = self.right(gp);
                if self.color(uncle) == Color::Red {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle.expect("red uncle is never nil"), Color::Black);
                    self.set_color(gp, Color::Red);
                    z = gp;
                } else {
                    if Some(z) == self.right(p) {
                        z = p;
                        self.rotate_left(z);
                    }
                    let p = self.parent(z).expect("z has a parent after the rotation above");
                    let gp = self.parent(p).expect("p has a parent after the rotation above");
                    self.set_color(p, Color::Black);
                    self.set_color(gp, Color::Red);
                    self.rotate_right(gp);
                }
            } else {
                let uncle = self.left(gp);
                if self.color(uncle) == Color::Red {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle.expect("red uncle is never nil"), Color::Black);
                    self.set_color(gp, Color::Red);
                    z = gp;
                } else {
                    if Some(z) == self.left(p) {
                        z = p;
                        self.rotate_right(z);
                    }
                    let p = self.parent(z).expect("z has a parent after the rotation above");
                    let gp = self.parent(p).expect("p has a parent after the rotation above");
                    self.set_color(p, Color::Black);
                    self.set_color(gp, Color::Red);
                    self.rotate_left(gp);
                }
            }
        }
        if let Some(root) = self.root {
            self.set_color(root, Color::Black);
        }
    }

    fn find_node(&self, key: &K) -> Link {
        let mut cur = self.root;
        while let Some(c) = cur {
            match key.cmp(&self.node(c).key) {
                Ordering::Less => cur = self.left(c),
                Ordering::Greater => cur = self.right(c),
                Ordering::Equal => return Some(c),
            }
        }
        None
    }

    /// Looks up `key`, returning a reference to its value if present.
    pub fn search(&self, key: &K) -> Option<&V> {
        self.find_node(key).map(|idx| &self.node(idx).value)
    }

    /// Returns whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find_node(key).is_some()
    }

    fn minimum(&self, mut x: usize) -> usize {
        while let Some(l) = self.left(x) {
            x = l;
        }
        x
    }

    fn transplant(&mut self, u: usize, v: Link) {
        let p = self.parent(u);
        match p {
            None => self.root = v,
            Some(pp) => {
                if self.left(pp) == Some(u) {
                    self.set_left(pp, v);
                } else {
                    self.set_right(pp, v);
                }
            }
        }
        if let Some(vi) = v {
            self.set_parent(vi, p);
        }
    }

    /// Removes `key` if present. Silently does nothing otherwise.
    pub fn delete(&mut self, key: &K) {
        let Some(z) = self.find_node(key) else {
            return;
        };

        let mut y = z;
        let mut y_original_color = self.color(Some(y));
        let x: Link;
        let x_parent: Link;

        if self.left(z).is_none() {
            x = self.right(z);
            x_parent = self.parent(z);
            self.transplant(z, self.right(z));
        } else if self.right(z).is_none() {
            x = self.left(z);
            x_parent = self.parent(z);
            self.transplant(z, self.left(z));
        } else {
            y = self.minimum(self.right(z).expect("checked above"));
            y_original_color = self.color(Some(y));
            x = self.right(y);

            if self.parent(y) == Some(z) {
                x_parent = Some(y);
            } else {
                x_parent = self.parent(y);
                self.transplant(y, self.right(y));
                let z_right = self.right(z);
                self.set_right(y, z_right);
                self.set_parent(
                    self.right(y).expect("z had two children, so its right child exists"),
                    Some(y),
                );
            }

            self.transplant(z, Some(y));
            let z_left = self.left(z);
            self.set_left(y, z_left);
            self.set_parent(
                self.left(y).expect("z had two children, so its left child exists"),
                Some(y),
            );
            self.set_color(y, self.color(Some(z)));
        }

        self.free_node(z);
        self.len -= 1;

        if y_original_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }
    }

    fn delete_fixup(&mut self, mut x: Link, mut x_parent: Link) {
        while x != self.root && self.color(x) == Color::Black {
            let Some(xp) = x_parent else { break };

            if x == self.left(xp) {
                let mut w = self
                    .right(xp)
                    .expect("black-height invariant guarantees a sibling here");
                if self.color(Some(w)) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(xp, Color::Red);
                    self.rotate_left(xp);
                    w = self
                        .right(xp)
                        .expect("sibling still exists after rotation");
                }
                if self.color(self.left(w)) == Color::Black && self.color(self.right(w)) == Color::Black {
                    self.set_color(w, Color::Red);
                    x = Some(xp);
                    x_parent = self.parent(xp);
                } else {
                    if self.color(self.right(w)) == Color::Black {
                        if let Some(wl) = self.left(w) {
                            self.set_color(wl, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self
                            .right(xp)
                            .expect("sibling still exists after rotation");
                    }
                    self.set_color(w, self.color(Some(xp)));
                    self.set_color(xp, Color::Black);
                    if let Some(wr) = self.right(w) {
                        self.set_color(wr, Color::Black);
                    }
                    self.rotate_left(xp);
                    x = self.root;
                    x_parent = None;
                }
            } else {
                let mut w = self
                    .left(xp)
                    .expect("black-height invariant guarantees a sibling here");
                if self.color(Some(w)) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(xp, Color::Red);
                    self.rotate_right(xp);
                    w = self.left(xp).expect("sibling still exists after rotation");
                }
                if self.color(self.right(w)) == Color::Black && self.color(self.left(w)) == Color::Black {
                    self.set_color(w, Color::Red);
                    x = Some(xp);
                    x_parent = self.parent(xp);
                } else {
                    if self.color(self.left(w)) == Color::Black {
                        if let Some(wr) = self.right(w) {
                            self.set_color(wr, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.left(xp).expect("sibling still exists after rotation");
                    }
                    self.set_color(w, self.color(Some(xp)));
                    self.set_color(xp, Color::Black);
                    if let Some(wl) = self.left(w) {
                        self.set_color(wl, Color::Black);
                    }
                    self.rotate_right(xp);
                    x = self.root;
                    x_parent = None;
                }
            }
        }

        if let Some(xi) = x {
            self.set_color(xi, Color::Black);
        }
    }

    /// Ascending in-order iterator over `(key, value)` pairs.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tree: self,
            stack: Vec::new(),
            current: self.root,
        }
    }

    /// Level-order dump suitable for a verbatim round trip via [`Self::load`].
    ///
    /// Each present node emits `Some((key, value, color))`; each absent
    /// child emits `None`. A `None` entry's own children are never visited,
    /// mirroring the original `rb_set.py`'s `dump`.
    pub fn dump(&self) -> Vec<Option<(K, V, Color)>> {
        let mut out = Vec::new();
        if self.root.is_none() {
            return out;
        }

        let mut queue: VecDeque<Link> = VecDeque::new();
        queue.push_back(self.root);

        while let Some(link) = queue.pop_front() {
            match link {
                Some(idx) => {
                    let node = self.node(idx);
                    out.push(Some((node.key.clone(), node.value.clone(), node.color)));
                    queue.push_back(self.left(idx));
                    queue.push_back(self.right(idx));
                }
                None => out.push(None),
            }
        }

        out
    }

    /// Reconstructs a tree from a [`Self::dump`] encoding.
    ///
    /// Trusts the stored colors verbatim; it does not re-run the
    /// insert fix-up. A structurally invalid encoding (a null root entry)
    /// is reported as [`RbTreeError::Corruption`] and no tree is built.
    pub fn load(encoding: &[Option<(K, V, Color)>]) -> RbTreeResult<Self> {
        let mut tree = Self::new();
        if encoding.is_empty() {
            return Ok(tree);
        }

        let root_entry = encoding[0]
            .clone()
            .ok_or_else(|| RbTreeError::Corruption("root entry of encoding is null".to_string()))?;

        let root_idx = tree.alloc(Node {
            key: root_entry.0,
            value: root_entry.1,
            color: root_entry.2,
            parent: None,
            left: None,
            right: None,
        });
        tree.root = Some(root_idx);
        tree.len = 1;

        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(root_idx);
        let mut i = 1;

        while let Some(parent_idx) = queue.pop_front() {
            if i >= encoding.len() {
                break;
            }
            if let Some((k, v, c)) = encoding[i].clone() {
                let left_idx = tree.alloc(Node {
                    key: k,
                    value: v,
                    color: c,
                    parent: Some(parent_idx),
                    left: None,
                    right: None,
                });
                tree.set_left(parent_idx, Some(left_idx));
                queue.push_back(left_idx);
                tree.len += 1;
            }
            i += 1;

            if i < encoding.len() {
                if let Some((k, v, c)) = encoding[i].clone() {
                    let right_idx = tree.alloc(Node {
                        key: k,
                        value: v,
                        color: c,
                        parent: Some(parent_idx),
                        left: None,
                        right: None,
                    });
                    tree.set_right(parent_idx, Some(right_idx));
                    queue.push_back(right_idx);
                    tree.len += 1;
                }
                i += 1;
            }
        }

        Ok(tree)
    }

    /// Checks the standard red-black invariants. Exposed for tests and for
    /// callers (recovery tooling) that want to validate a loaded tree
    /// rather than trust the stored colors blindly.
    pub fn check_invariants(&self) -> RbTreeResult<()> {
        let Some(root) = self.root else {
            return Ok(());
        };
        if self.color(Some(root)) != Color::Black {
            return Err(RbTreeError::InvariantViolation("root is not black".to_string()));
        }
        self.check_node(root)?;
        Ok(())
    }

    fn check_node(&self, idx: usize) -> RbTreeResult<usize> {
        let node = self.node(idx);
        if node.color == Color::Red {
            for child in [node.left, node.right] {
                if let Some(c) = child {
                    if self.color(Some(c)) == Color::Red {
                        return Err(RbTreeError::InvariantViolation(
                            "red node has a red child".to_string(),
                        ));
                    }
                }
            }
        }

        let left_bh = match node.left {
            Some(l) => self.check_node(l)?,
            None => 0,
        };
        let right_bh = match node.right {
            Some(r) => self.check_node(r)?,
            None => 0,
        };
        if left_bh != right_bh {
            return Err(RbTreeError::InvariantViolation(
                "black-height differs between left and right subtrees".to_string(),
            ));
        }

        Ok(left_bh + if node.color == Color::Black { 1 } else { 0 })
    }
}

/// Ascending in-order iterator produced by [`RbTree::iter`].
pub struct Iter<'a, K, V> {
    tree: &'a RbTree<K, V>,
    stack: Vec<usize>,
    current: Link,
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(c) = self.current {
            self.stack.push(c);
            self.current = self.tree.left(c);
        }
        let idx = self.stack.pop()?;
        self.current = self.tree.right(idx);
        let node = self.tree.node(idx);
        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascending_keys<K: Ord + Clone, V: Clone>(tree: &RbTree<K, V>) -> Vec<K> {
        tree.iter().map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn test_insert_and_search() {
        let mut tree: RbTree<i32, &str> = RbTree::new();
        tree.insert(10, "a");
        tree.insert(2, "b");
        tree.insert(3, "c");

        assert_eq!(tree.search(&10), Some(&"a"));
        assert_eq!(tree.search(&2), Some(&"b"));
        assert_eq!(tree.search(&42), None);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_duplicate_key_overwrites_value() {
        let mut tree: RbTree<i32, i32> = RbTree::new();
        tree.insert(1, 100);
        tree.insert(1, 200);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.search(&1), Some(&200));
    }

    #[test]
    fn test_in_order_traversal_is_ascending() {
        let mut tree: RbTree<i32, ()> = RbTree::new();
        for k in [10, 2, 3, 5, 11] {
            tree.insert(k, ());
        }
        assert_eq!(ascending_keys(&tree), vec![2, 3, 5, 10, 11]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_invariants_hold_across_many_inserts_and_deletes() {
        let mut tree: RbTree<i32, i32> = RbTree::new();
        for i in 0..200 {
            tree.insert(i, i * 2);
            tree.check_invariants().unwrap();
        }
        for i in (0..200).step_by(3) {
            tree.delete(&i);
            tree.check_invariants().unwrap();
        }
        let remaining = ascending_keys(&tree);
        let mut sorted = remaining.clone();
        sorted.sort();
        assert_eq!(remaining, sorted);
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let mut tree: RbTree<i32, i32> = RbTree::new();
        tree.insert(1, 1);
        tree.delete(&999);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.search(&1), Some(&1));
    }

    #[test]
    fn test_delete_to_empty() {
        let mut tree: RbTree<i32, i32> = RbTree::new();
        tree.insert(1, 1);
        tree.delete(&1);
        assert!(tree.is_empty());
        assert_eq!(tree.search(&1), None);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_dump_load_roundtrip_preserves_order_and_colors() {
        let mut tree: RbTree<i32, &str> = RbTree::new();
        for k in [10, 2, 3, 5, 11] {
            tree.insert(k, "v");
        }
        let dumped = tree.dump();
        let loaded = RbTree::load(&dumped).unwrap();

        assert_eq!(ascending_keys(&tree), ascending_keys(&loaded));
        assert_eq!(dumped, loaded.dump());
    }

    #[test]
    fn test_load_empty_encoding_is_empty_tree() {
        let tree: RbTree<i32, i32> = RbTree::load(&[]).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_load_null_root_is_corruption() {
        let encoding: Vec<Option<(i32, i32, Color)>> = vec![None];
        let err = RbTree::<i32, i32>::load(&encoding).unwrap_err();
        assert!(matches!(err, RbTreeError::Corruption(_)));
    }

    #[test]
    fn test_color_letter_roundtrip() {
        assert_eq!(Color::from_letter("R").unwrap(), Color::Red);
        assert_eq!(Color::from_letter("B").unwrap(), Color::Black);
        assert!(Color::from_letter("X").is_err());
    }
}
