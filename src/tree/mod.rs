//! Persistent balanced sequence (AVL tree with cached summaries)
//!
//! `SumTree` stores an ordered sequence of items in an AVL tree. Every node
//! caches the combined [`Summary`] of its subtree, so positional lookups along
//! any summary dimension (bytes, characters, lines, ...) are O(log N).
//!
//! Nodes are shared through `Arc`. Mutating operations copy only the nodes on
//! the path they touch (a node is reused in place when nothing else holds it),
//! so a cloned tree is an immutable snapshot that stays valid while the
//! original keeps changing.

use std::cmp::max;
use std::sync::Arc;

/// Aggregate data cached for every subtree
pub trait Summary: Copy + Default + std::fmt::Debug {
    fn combine(&self, other: &Self) -> Self;
}

/// An element of a [`SumTree`]
pub trait Item: Clone {
    type Summary: Summary;

    fn summary(&self) -> Self::Summary;
}

type Link<T> = Option<Arc<Node<T>>>;

#[derive(Clone)]
struct Node<T: Item> {
    left: Link<T>,
    right: Link<T>,
    item: T,

    // Metadata
    item_summary: T::Summary,
    summary: T::Summary, // Summary of this subtree
    count: usize,        // Number of items in this subtree
    height: usize,       // Height for AVL balancing
}

impl<T: Item> Node<T> {
    fn leaf(item: T) -> Self {
        let item_summary = item.summary();
        Self {
            left: None,
            right: None,
            item,
            item_summary,
            summary: item_summary,
            count: 1,
            height: 1,
        }
    }
}

/// A persistent sequence of items with O(log N) split, join and seek.
pub struct SumTree<T: Item> {
    root: Link<T>,
}

impl<T: Item> Clone for SumTree<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<T: Item> Default for SumTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Item> SumTree<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Build a perfectly balanced tree from items in order. O(N).
    pub fn from_items(items: Vec<T>) -> Self {
        let n = items.len();
        let mut iter = items.into_iter();
        Self {
            root: build(&mut iter, n),
        }
    }

    /// Number of items
    pub fn len(&self) -> usize {
        count(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Combined summary of every item
    pub fn summary(&self) -> T::Summary {
        summary_of(&self.root)
    }

    /// Whether both trees share the same root node
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        let mut index = index;
        loop {
            let left_count = count(&node.left);
            if index < left_count {
                node = node.left.as_deref()?;
            } else if index == left_count {
                return Some(&node.item);
            } else {
                index -= left_count + 1;
                node = node.right.as_deref()?;
            }
        }
    }

    /// Summary of the first `index` items
    pub fn prefix(&self, index: usize) -> T::Summary {
        let mut acc = T::Summary::default();
        let mut node = self.root.as_deref();
        let mut index = index;
        while let Some(n) = node {
            let left_count = count(&n.left);
            if index <= left_count {
                node = n.left.as_deref();
            } else {
                acc = acc
                    .combine(&summary_of(&n.left))
                    .combine(&n.item_summary);
                index -= left_count + 1;
                node = n.right.as_deref();
            }
        }
        acc
    }

    /// Locate the item containing `target` along the dimension `dim`.
    ///
    /// Returns the index of the first item whose cumulative end along `dim`
    /// is greater than `target`, together with the summary of every item
    /// before it. When `target` is at or past the end, the index is `len()`
    /// and the summary covers the whole tree.
    pub fn seek<F>(&self, target: usize, dim: F) -> (usize, T::Summary)
    where
        F: Fn(&T::Summary) -> usize,
    {
        let mut acc = T::Summary::default();
        let mut index = 0;
        let mut target = target;
        let mut node = self.root.as_deref();

        while let Some(n) = node {
            let left_summary = summary_of(&n.left);
            let left_dim = dim(&left_summary);
            if target < left_dim {
                node = n.left.as_deref();
                continue;
            }
            target -= left_dim;
            let item_dim = dim(&n.item_summary);
            if target < item_dim {
                return (index + count(&n.left), acc.combine(&left_summary));
            }
            target -= item_dim;
            acc = acc.combine(&left_summary).combine(&n.item_summary);
            index += count(&n.left) + 1;
            node = n.right.as_deref();
        }

        (index, acc)
    }

    /// Split into the first `index` items and the rest
    pub fn split_at(self, index: usize) -> (Self, Self) {
        let (left, right) = split(self.root, index);
        (Self { root: left }, Self { root: right })
    }

    /// Concatenate two sequences. O(log N).
    pub fn concat(left: Self, right: Self) -> Self {
        Self {
            root: merge(left.root, right.root),
        }
    }

    /// Concatenate `left`, a single item and `right`. O(log N).
    pub fn join(left: Self, item: T, right: Self) -> Self {
        Self {
            root: Some(join_with_root(left.root, Node::leaf(item), right.root)),
        }
    }

    pub fn push_back(&mut self, item: T) {
        let left = self.root.take();
        self.root = Some(join_with_root(left, Node::leaf(item), None));
    }

    pub fn insert(&mut self, index: usize, item: T) {
        let (left, right) = split(self.root.take(), index);
        self.root = Some(join_with_root(left, Node::leaf(item), right));
    }

    /// Replace the items in `range` with `items`
    pub fn splice(&mut self, range: std::ops::Range<usize>, items: Vec<T>) {
        let (left, rest) = split(self.root.take(), range.start);
        let (_, right) = split(rest, range.end.saturating_sub(range.start));
        let middle = Self::from_items(items);
        self.root = merge(merge(left, middle.root), right);
    }

    /// Borrowing in-order iterator
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.root.as_deref(), 0)
    }

    /// Borrowing iterator starting at item `index`
    pub fn iter_from(&self, index: usize) -> Iter<'_, T> {
        Iter::new(self.root.as_deref(), index)
    }

    /// Owning iterator starting at item `index`; keeps its nodes alive on its own
    pub fn cursor(&self, index: usize) -> Cursor<T> {
        Cursor::new(self.root.clone(), index)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Height of the tree (for balance checks)
    pub fn height(&self) -> usize {
        height(&self.root)
    }
}

impl<T: Item + std::fmt::Debug> std::fmt::Debug for SumTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// in-order iterator over borrowed nodes
pub struct Iter<'a, T: Item> {
    stack: Vec<&'a Node<T>>,
}

impl<'a, T: Item> Iter<'a, T> {
    fn new(root: Option<&'a Node<T>>, index: usize) -> Self {
        let mut stack = Vec::new();
        let mut node = root;
        let mut index = index;
        while let Some(n) = node {
            let left_count = count(&n.left);
            if index < left_count {
                stack.push(n);
                node = n.left.as_deref();
            } else if index == left_count {
                stack.push(n);
                break;
            } else {
                index -= left_count + 1;
                node = n.right.as_deref();
            }
        }
        Self { stack }
    }

    fn push_left(&mut self, mut node: &'a Node<T>) {
        self.stack.push(node);
        while let Some(left) = node.left.as_deref() {
            self.stack.push(left);
            node = left;
        }
    }
}

impl<'a, T: Item> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(right) = node.right.as_deref() {
            self.push_left(right);
        }
        Some(&node.item)
    }
}

/// in-order iterator that owns `Arc`s to its nodes
pub struct Cursor<T: Item> {
    stack: Vec<Arc<Node<T>>>,
}

impl<T: Item> Cursor<T> {
    fn new(root: Link<T>, index: usize) -> Self {
        let mut stack = Vec::new();
        let mut node = root;
        let mut index = index;
        while let Some(n) = node {
            let left_count = count(&n.left);
            if index < left_count {
                node = n.left.clone();
                stack.push(n);
            } else if index == left_count {
                stack.push(n);
                break;
            } else {
                index -= left_count + 1;
                node = n.right.clone();
            }
        }
        Self { stack }
    }

    fn push_left(&mut self, node: Arc<Node<T>>) {
        let mut next = Some(node);
        while let Some(n) = next {
            next = n.left.clone();
            self.stack.push(n);
        }
    }
}

impl<T: Item> Iterator for Cursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(right) = node.right.clone() {
            self.push_left(right);
        }
        Some(node.item.clone())
    }
}

// --- Tree Operations ---

fn height<T: Item>(node: &Link<T>) -> usize {
    node.as_ref().map_or(0, |n| n.height)
}

fn count<T: Item>(node: &Link<T>) -> usize {
    node.as_ref().map_or(0, |n| n.count)
}

fn summary_of<T: Item>(node: &Link<T>) -> T::Summary {
    node.as_ref().map_or_else(T::Summary::default, |n| n.summary)
}

/// Take ownership of a node, copying it only if a snapshot still shares it
fn take<T: Item>(node: Arc<Node<T>>) -> Node<T> {
    Arc::try_unwrap(node).unwrap_or_else(|shared| (*shared).clone())
}

fn update<T: Item>(node: &mut Node<T>) {
    node.summary = summary_of(&node.left)
        .combine(&node.item_summary)
        .combine(&summary_of(&node.right));
    node.count = count(&node.left) + 1 + count(&node.right);
    node.height = 1 + max(height(&node.left), height(&node.right));
}

fn build<T: Item>(items: &mut impl Iterator<Item = T>, n: usize) -> Link<T> {
    if n == 0 {
        return None;
    }
    let left_n = n / 2;
    let left = build(items, left_n);
    let item = items.next()?;
    let right = build(items, n - left_n - 1);
    let mut node = Node::leaf(item);
    node.left = left;
    node.right = right;
    update(&mut node);
    Some(Arc::new(node))
}

fn balance<T: Item>(mut node: Node<T>) -> Arc<Node<T>> {
    update(&mut node);
    let balance_factor = height(&node.left) as isize - height(&node.right) as isize;

    if balance_factor > 1 {
        let left = node.left.as_deref();
        if left.map_or(0, |l| height(&l.left)) >= left.map_or(0, |l| height(&l.right)) {
            return Arc::new(rotate_right(node));
        } else {
            return Arc::new(rotate_left_right(node));
        }
    } else if balance_factor < -1 {
        let right = node.right.as_deref();
        if right.map_or(0, |r| height(&r.right)) >= right.map_or(0, |r| height(&r.left)) {
            return Arc::new(rotate_left(node));
        } else {
            return Arc::new(rotate_right_left(node));
        }
    }
    Arc::new(node)
}

fn rotate_right<T: Item>(mut node: Node<T>) -> Node<T> {
    let Some(left) = node.left.take() else {
        return node;
    };
    let mut new_root = take(left);
    node.left = new_root.right.take();
    update(&mut node);
    new_root.right = Some(Arc::new(node));
    update(&mut new_root);
    new_root
}

fn rotate_left<T: Item>(mut node: Node<T>) -> Node<T> {
    let Some(right) = node.right.take() else {
        return node;
    };
    let mut new_root = take(right);
    node.right = new_root.left.take();
    update(&mut node);
    new_root.left = Some(Arc::new(node));
    update(&mut new_root);
    new_root
}

fn rotate_left_right<T: Item>(mut node: Node<T>) -> Node<T> {
    if let Some(left) = node.left.take() {
        node.left = Some(Arc::new(rotate_left(take(left))));
    }
    rotate_right(node)
}

fn rotate_right_left<T: Item>(mut node: Node<T>) -> Node<T> {
    if let Some(right) = node.right.take() {
        node.right = Some(Arc::new(rotate_right(take(right))));
    }
    rotate_left(node)
}

// --- Split and Merge ---

/// Split so that the left result holds the first `index` items
fn split<T: Item>(root: Link<T>, index: usize) -> (Link<T>, Link<T>) {
    let Some(node) = root else {
        return (None, None);
    };
    let mut node = take(node);
    let left_count = count(&node.left);

    if index <= left_count {
        let (l, r) = split(node.left.take(), index);
        let right = node.right.take();
        (l, Some(join_with_root(r, node, right)))
    } else {
        let (l, r) = split(node.right.take(), index - left_count - 1);
        let left = node.left.take();
        (Some(join_with_root(left, node, l)), r)
    }
}

fn merge<T: Item>(left: Link<T>, right: Link<T>) -> Link<T> {
    match (left, right) {
        (None, r) => r,
        (l, None) => l,
        (Some(l), Some(r)) => {
            let (new_left, center) = delete_max(take(l));
            Some(join_with_root(new_left, center, Some(r)))
        }
    }
}

fn delete_max<T: Item>(mut node: Node<T>) -> (Link<T>, Node<T>) {
    if let Some(right) = node.right.take() {
        let (new_right, max) = delete_max(take(right));
        node.right = new_right;
        (Some(balance(node)), max)
    } else {
        let left = node.left.take();
        (left, node)
    }
}

/// Join two trees around `center`, where every item of `left` precedes
/// `center` and every item of `right` follows it.
fn join_with_root<T: Item>(left: Link<T>, mut center: Node<T>, right: Link<T>) -> Arc<Node<T>> {
    let lh = height(&left);
    let rh = height(&right);

    if (lh as isize - rh as isize).abs() <= 1 {
        center.left = left;
        center.right = right;
        update(&mut center);
        Arc::new(center)
    } else if lh > rh {
        let Some(left) = left else {
            return Arc::new(center);
        };
        let mut left_node = take(left);
        let new_right = join_with_root(left_node.right.take(), center, right);
        left_node.right = Some(new_right);
        balance(left_node)
    } else {
        let Some(right) = right else {
            return Arc::new(center);
        };
        let mut right_node = take(right);
        let new_left = join_with_root(left, center, right_node.left.take());
        right_node.left = Some(new_left);
        balance(right_node)
    }
}
