use std::fmt::{Debug, Display, Formatter};
use std::ops::RangeBounds;

use debug_tree::{add_branch_to, AsTree, TreeBuilder};
use derivative::Derivative;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{range_to_lr, Direction, Idx, OutOfRange, Sequence, DEFAULT_SEED};

/// Marks a missing child.
const EMPTY: Idx = usize::MAX;

fn node_fmt(u: &Idx, f: &mut Formatter) -> std::fmt::Result {
    if *u == EMPTY {
        write!(f, "∅")
    } else {
        write!(f, "{u}")
    }
}
fn node2_fmt([u, v]: &[Idx; 2], f: &mut Formatter) -> std::fmt::Result {
    write!(f, "[")?;
    node_fmt(u, f)?;
    write!(f, ", ")?;
    node_fmt(v, f)?;
    write!(f, "]")
}

/// Used to pretty print a Idx, outputting ∅ if it is EMPTY.
pub struct PrettyIdx(pub Idx);

impl Display for PrettyIdx {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        node_fmt(&self.0, f)
    }
}

impl Debug for PrettyIdx {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        <Self as Display>::fmt(self, f)
    }
}

use PrettyIdx as I;

/// Aggregated data of a subtree, read in positional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Summary {
    sum: i64,
    /// Value of the first element.
    first: i64,
    /// Value of the last element.
    last: i64,
    min: i64,
    max: i64,
    /// Non-decreasing.
    ascending: bool,
    /// Non-increasing.
    descending: bool,
}

impl Summary {
    fn from(value: i64) -> Self {
        Self::constant(value, 1)
    }
    fn constant(value: i64, size: usize) -> Self {
        Self {
            sum: value.wrapping_mul(size as i64),
            first: value,
            last: value,
            min: value,
            max: value,
            ascending: true,
            descending: true,
        }
    }
    /// Merge with the summary of the elements immediately to the right.
    fn merge(self, right: Self) -> Self {
        Self {
            sum: self.sum.wrapping_add(right.sum),
            first: self.first,
            last: right.last,
            min: self.min.min(right.min),
            max: self.max.max(right.max),
            ascending: self.ascending && right.ascending && self.last <= right.first,
            descending: self.descending && right.descending && self.last >= right.first,
        }
    }
    fn reverse(self) -> Self {
        Self {
            sum: self.sum,
            first: self.last,
            last: self.first,
            ascending: self.descending,
            descending: self.ascending,
            ..self
        }
    }
    /// Every element stays inside `i64` after adding `delta`.
    fn can_add(&self, delta: i64) -> bool {
        self.min.checked_add(delta).is_some() && self.max.checked_add(delta).is_some()
    }
    /// Shift every one of the `size` elements by `delta`. Order is kept when the shifted
    /// values do not wrap.
    fn add(self, delta: i64, size: usize) -> Self {
        Self {
            sum: self.sum.wrapping_add(delta.wrapping_mul(size as i64)),
            first: self.first.wrapping_add(delta),
            last: self.last.wrapping_add(delta),
            min: self.min.wrapping_add(delta),
            max: self.max.wrapping_add(delta),
            ..self
        }
    }
    /// Sorted the way the last permutation in `direction` is, so no further step exists.
    fn is_terminal(&self, direction: Direction) -> bool {
        match direction {
            Direction::Next => self.descending,
            Direction::Prev => self.ascending,
        }
    }
}

/// `a` placed right before `b` breaks the terminal order of `direction`.
fn breaks_terminal(direction: Direction, a: i64, b: i64) -> bool {
    match direction {
        Direction::Next => a < b,
        Direction::Prev => a > b,
    }
}

/// Tags applied to a node but not yet to its children. Pushed in field order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Pending {
    /// Children should be mirrored.
    flip: bool,
    /// Children should be reset to zero before `delta` is added, so together they form an
    /// overwrite with `delta`.
    overwrite: bool,
    delta: i64,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Node {
    /// Left and right child
    #[derivative(Debug(format_with = "node2_fmt"))]
    child: [Idx; 2],
    value: i64,
    size: usize,
    /// Aggregated data for this node's subtree, with `pending` already accounted for.
    summary: Summary,
    pending: Pending,
    #[derivative(Debug = "ignore")]
    priority: u32,
}

impl Node {
    fn new(value: i64, priority: u32) -> Self {
        Self {
            child: [EMPTY; 2],
            value,
            size: 1,
            summary: Summary::from(value),
            pending: Pending::default(),
            priority,
        }
    }
}

/// Implicit treap over an arena of nodes. Priorities come from `rng`, which the treap owns.
pub struct Treap<R = StdRng> {
    nodes: Vec<Node>,
    /// Released slots, reused before the arena grows.
    free: Vec<Idx>,
    root: Idx,
    rng: R,
}

impl<R> Debug for Treap<R> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let builder = TreeBuilder::new();
        {
            let _b = builder.add_branch(&format!("Treap (len {})", self.size(self.root)));
            if self.root != EMPTY {
                self.tree_inorder_dbg(self.root, &builder);
            }
        }
        writeln!(f, "{}", builder.string())
    }
}

impl Default for Treap {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}

impl<R: Rng + SeedableRng> FromIterator<i64> for Treap<R> {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self::from_values(DEFAULT_SEED, iter)
    }
}

impl<R> Treap<R> {
    fn tree_inorder_dbg<T: AsTree>(&self, u: Idx, tree: &T) {
        let nu = &self.nodes[u];
        if nu.child[0] != EMPTY {
            add_branch_to!(*tree, "left child of {u}");
            self.tree_inorder_dbg(nu.child[0], tree);
        }
        add_branch_to!(*tree, "[{u}] {nu:?}");
        if nu.child[1] != EMPTY {
            self.tree_inorder_dbg(nu.child[1], tree);
        }
    }
    fn n(&self, u: Idx) -> Option<&Node> {
        if u == EMPTY {
            None
        } else {
            Some(&self.nodes[u])
        }
    }
    fn size(&self, u: Idx) -> usize {
        self.n(u).map_or(0, |n| n.size)
    }
    fn summary(&self, u: Idx) -> Option<Summary> {
        self.n(u).map(|n| n.summary)
    }

    // Tags. Each one is fully applied to u and left pending for u's children.

    fn apply_flip(&mut self, u: Idx) {
        if u == EMPTY {
            return;
        }
        let n = &mut self.nodes[u];
        n.child.swap(0, 1);
        n.summary = n.summary.reverse();
        n.pending.flip ^= true;
    }
    fn apply_reset(&mut self, u: Idx) {
        if u == EMPTY {
            return;
        }
        let n = &mut self.nodes[u];
        n.value = 0;
        n.summary = Summary::constant(0, n.size);
        n.pending.overwrite = true;
        n.pending.delta = 0;
    }
    fn apply_add(&mut self, u: Idx, delta: i64) {
        if u == EMPTY {
            return;
        }
        let n = &mut self.nodes[u];
        n.value = n.value.wrapping_add(delta);
        n.summary = n.summary.add(delta, n.size);
        // Pending deltas compose modulo 2^64, values checked by range_add come out exact.
        n.pending.delta = n.pending.delta.wrapping_add(delta);
    }
    fn apply_overwrite(&mut self, u: Idx, value: i64) {
        self.apply_reset(u);
        self.apply_add(u, value);
    }
    /// Moves the pending tags of u to its children. Must be called before reading or
    /// relinking them.
    fn push(&mut self, u: Idx) {
        let pending = std::mem::take(&mut self.nodes[u].pending);
        if pending == Pending::default() {
            return;
        }
        for c in self.nodes[u].child {
            if pending.flip {
                self.apply_flip(c);
            }
            if pending.overwrite {
                self.apply_reset(c);
            }
            if pending.delta != 0 {
                self.apply_add(c, pending.delta);
            }
        }
    }
    /// Call when children are changed. u must have been pushed.
    fn recalc(&mut self, u: Idx) -> Idx {
        if u == EMPTY {
            return EMPTY;
        }
        let [l, r] = self.nodes[u].child;
        let mut summary = Summary::from(self.nodes[u].value);
        if let Some(left) = self.summary(l) {
            summary = left.merge(summary);
        }
        if let Some(right) = self.summary(r) {
            summary = summary.merge(right);
        }
        let size = self.size(l) + 1 + self.size(r);
        let n = &mut self.nodes[u];
        n.size = size;
        n.summary = summary;
        u
    }

    /// (First k, rest)
    fn split_k(&mut self, u: Idx, k: usize) -> (Idx, Idx) {
        if u == EMPTY || k == 0 {
            // If k == 0 the node is fully returned on the right
            return (EMPTY, u);
        }
        self.push(u);
        let [l, r] = self.nodes[u].child;
        let szl = self.size(l);
        log::trace!("split_k u = {u} k = {k} l = {l} r = {r} szl = {szl}", l = I(l), r = I(r));
        if k <= szl {
            let (ll, lr) = self.split_k(l, k);
            self.nodes[u].child[0] = lr;
            (ll, self.recalc(u))
        } else {
            let (rl, rr) = self.split_k(r, k - szl - 1);
            self.nodes[u].child[1] = rl;
            (self.recalc(u), rr)
        }
    }
    /// Splits a tree sorted by value (in either direction) into the elements for which
    /// `goes_left` holds and the rest. `goes_left` must hold for a prefix of the sequence.
    fn split_by(&mut self, u: Idx, goes_left: &impl Fn(i64) -> bool) -> (Idx, Idx) {
        if u == EMPTY {
            return (EMPTY, EMPTY);
        }
        self.push(u);
        let [l, r] = self.nodes[u].child;
        if goes_left(self.nodes[u].value) {
            let (rl, rr) = self.split_by(r, goes_left);
            self.nodes[u].child[1] = rl;
            (self.recalc(u), rr)
        } else {
            let (ll, lr) = self.split_by(l, goes_left);
            self.nodes[u].child[0] = lr;
            (ll, self.recalc(u))
        }
    }
    /// (before ql, [ql, qr), from qr on). The suffix is split off first.
    fn split_lr(&mut self, u: Idx, ql: usize, qr: usize) -> (Idx, Idx, Idx) {
        let (lm, r) = self.split_k(u, qr);
        let (l, m) = self.split_k(lm, ql);
        log::trace!("split_lr({}, {ql}, {qr}) = ({}, {}, {})", I(u), I(l), I(m), I(r));
        (l, m, r)
    }
    /// Concats two trees, all elements of u come before those of v. Returns the new root.
    fn concat(&mut self, u: Idx, v: Idx) -> Idx {
        if u == EMPTY {
            return v;
        } else if v == EMPTY {
            return u;
        }
        if self.nodes[u].priority > self.nodes[v].priority {
            log::trace!("concat({u}, {v}) keeps {u} as root");
            self.push(u);
            let old_r = self.nodes[u].child[1];
            self.nodes[u].child[1] = self.concat(old_r, v);
            self.recalc(u)
        } else {
            log::trace!("concat({u}, {v}) keeps {v} as root");
            self.push(v);
            let old_l = self.nodes[v].child[0];
            self.nodes[v].child[0] = self.concat(u, old_l);
            self.recalc(v)
        }
    }
    fn concat_all(&mut self, all: impl IntoIterator<Item = Idx>) -> Idx {
        let mut u = EMPTY;
        for v in all {
            u = self.concat(u, v);
        }
        u
    }
    /// Detaches the range from the main tree, lets `f` rewrite it and puts the result back.
    fn with_range<T>(
        &mut self,
        range: impl RangeBounds<usize>,
        f: impl FnOnce(&mut Self, Idx) -> (Idx, T),
    ) -> Result<T, OutOfRange> {
        let [ql, qr] = range_to_lr(range, self.len_inner())?;
        let root = self.root;
        let (l, m, r) = self.split_lr(root, ql, qr);
        let (m, ret) = f(self, m);
        self.root = self.concat_all([l, m, r]);
        Ok(ret)
    }
    fn len_inner(&self) -> usize {
        self.size(self.root)
    }

    /// Number of leading elements of u that a permutation step in `direction` may touch: all
    /// of them up to and including the pivot. Zero if u is already in its terminal order.
    fn sorted_prefix_len(&mut self, mut u: Idx, direction: Direction) -> usize {
        let mut offset = 0;
        while u != EMPTY {
            self.push(u);
            let [l, r] = self.nodes[u].child;
            let value = self.nodes[u].value;
            let szl = self.size(l);
            if let Some(right) = self.summary(r) {
                if !right.is_terminal(direction) {
                    offset += szl + 1;
                    u = r;
                    continue;
                }
                if breaks_terminal(direction, value, right.first) {
                    return offset + szl + 1;
                }
            }
            if let Some(left) = self.summary(l) {
                if breaks_terminal(direction, left.last, value) {
                    return offset + szl;
                }
            }
            u = l;
        }
        log::trace!("sorted_prefix_len reached a leaf at offset {offset}");
        offset
    }
    /// Rearranges the whole tree u into its next or previous permutation. Returns the new root
    /// and whether it did not wrap around.
    fn step(&mut self, segment: Idx, direction: Direction) -> (Idx, bool) {
        // The prefix is empty only when the whole segment is in terminal order.
        let Some(pivot_pos) = self.sorted_prefix_len(segment, direction).checked_sub(1) else {
            log::debug!(
                "{direction:?} permutation of {} elements wraps around",
                self.size(segment)
            );
            self.apply_flip(segment);
            return (segment, false);
        };
        let (prefix, pivot, suffix) = self.split_lr(segment, pivot_pos, pivot_pos + 1);
        let pivot_value = self.nodes[pivot].value;
        log::trace!(
            "pivot at {pivot_pos} with value {pivot_value}, suffix of {}",
            self.size(suffix)
        );
        let segment = match direction {
            Direction::Next => {
                // Non-increasing suffix, now ascending.
                self.apply_flip(suffix);
                let (low, high) = self.split_by(suffix, &|v| v <= pivot_value);
                // Smallest value above the pivot; nonempty as the suffix starts above it.
                let (swap, high) = self.split_k(high, 1);
                self.concat_all([prefix, swap, low, pivot, high])
            }
            Direction::Prev => {
                let (low, high) = self.split_by(suffix, &|v| v < pivot_value);
                // Largest value below the pivot; nonempty as the suffix starts below it.
                let low_len = self.size(low);
                let (low, swap) = self.split_k(low, low_len - 1);
                self.apply_flip(low);
                self.apply_flip(high);
                self.concat_all([prefix, swap, high, pivot, low])
            }
        };
        (segment, true)
    }

    fn collect(&mut self, u: Idx, out: &mut Vec<i64>) {
        if u == EMPTY {
            return;
        }
        self.push(u);
        let [l, r] = self.nodes[u].child;
        self.collect(l, out);
        out.push(self.nodes[u].value);
        self.collect(r, out);
    }
    /// Returns u and its whole subtree to the free list.
    fn release(&mut self, u: Idx) {
        let mut stack = vec![u];
        while let Some(u) = stack.pop() {
            if u == EMPTY {
                continue;
            }
            stack.extend(std::mem::replace(&mut self.nodes[u].child, [EMPTY; 2]));
            self.free.push(u);
        }
    }
}

impl<R: Rng> Treap<R> {
    /// Empty treap drawing its priorities from `rng`.
    pub fn with_rng(rng: R) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: EMPTY,
            rng,
        }
    }

    fn create(&mut self, value: i64) -> Idx {
        let node = Node::new(value, self.rng.gen());
        if let Some(u) = self.free.pop() {
            self.nodes[u] = node;
            u
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }
}

impl<R: Rng + SeedableRng> Sequence for Treap<R> {
    fn with_seed(seed: u64) -> Self {
        Self::with_rng(R::seed_from_u64(seed))
    }

    fn len(&self) -> usize {
        self.len_inner()
    }

    fn push_back(&mut self, value: i64) {
        let u = self.create(value);
        self.root = self.concat(self.root, u);
    }

    fn insert(&mut self, pos: usize, value: i64) -> Result<(), OutOfRange> {
        let len = self.len();
        if pos > len {
            return Err(OutOfRange::Position { pos, len });
        }
        let u = self.create(value);
        let root = self.root;
        let (l, r) = self.split_k(root, pos);
        self.root = self.concat_all([l, u, r]);
        Ok(())
    }

    fn remove(&mut self, pos: usize) -> Result<i64, OutOfRange> {
        let len = self.len();
        if pos >= len {
            return Err(OutOfRange::Position { pos, len });
        }
        let root = self.root;
        let (l, m, r) = self.split_lr(root, pos, pos + 1);
        let value = self.nodes[m].value;
        self.release(m);
        self.root = self.concat(l, r);
        Ok(value)
    }

    fn range_sum(&mut self, range: impl RangeBounds<usize>) -> Result<i64, OutOfRange> {
        self.with_range(range, |t, m| (m, t.summary(m).map_or(0, |s| s.sum)))
    }

    fn range_add(&mut self, delta: i64, range: impl RangeBounds<usize>) -> Result<(), OutOfRange> {
        let added = self.with_range(range, |t, m| {
            let fits = t.summary(m).is_some_and(|s| s.can_add(delta));
            if fits {
                t.apply_add(m, delta);
            }
            (m, fits)
        })?;
        if added {
            Ok(())
        } else {
            log::debug!("range_add({delta}) rejected, it would overflow");
            Err(OutOfRange::Overflow { delta })
        }
    }

    fn range_set(&mut self, value: i64, range: impl RangeBounds<usize>) -> Result<(), OutOfRange> {
        self.with_range(range, |t, m| {
            t.apply_overwrite(m, value);
            (m, ())
        })
    }

    fn reverse(&mut self, range: impl RangeBounds<usize>) -> Result<(), OutOfRange> {
        self.with_range(range, |t, m| {
            t.apply_flip(m);
            (m, ())
        })
    }

    fn permutation_step(
        &mut self,
        direction: Direction,
        range: impl RangeBounds<usize>,
    ) -> Result<bool, OutOfRange> {
        self.with_range(range, |t, m| t.step(m, direction))
    }

    fn to_vec(&mut self) -> Vec<i64> {
        let mut out = Vec::with_capacity(self.len());
        self.collect(self.root, &mut out);
        out
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = EMPTY;
    }
}
