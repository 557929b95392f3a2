// This module implements a monotone set-propagation network. It holds a fixed collection of
// sets and a list of directed edges between them; an edge from A to B means "whenever A gains an
// element x, add x to B unless x is in the edge's exclusion list". Insertion is the only way to
// mutate a set. It checks membership first and does nothing for an element already present, so
// listeners never re-fire and propagation around a cycle stops as soon as it meets a set that
// already holds the element. Cascades run from an explicit pending stack rather than nested
// calls, which keeps stack depth constant however long the propagation chains are. Because the
// sets only grow and the element domain is finite, the network settles at the least fixed point
// of its edge constraints whatever the order of edges and seeds.

//! Incremental set-propagation network.

use hashbrown::HashSet;
use std::hash::Hash;

/// Index of a set in a [`LiveNetwork`].
pub type SetId = usize;

struct Edge<'a, T> {
    to: SetId,
    except: &'a [T],
}

pub struct LiveNetwork<'a, T> {
    sets: Vec<HashSet<T>>,
    edges: Vec<Vec<Edge<'a, T>>>,
    pending: Vec<(SetId, T)>,
    inserted: usize,
    fired: usize,
}

impl<'a, T: Copy + Eq + Hash> LiveNetwork<'a, T> {
    pub fn new() -> Self {
        Self {
            sets: Vec::new(),
            edges: Vec::new(),
            pending: Vec::new(),
            inserted: 0,
            fired: 0,
        }
    }

    pub fn with_capacity(sets: usize) -> Self {
        Self {
            sets: Vec::with_capacity(sets),
            edges: Vec::with_capacity(sets),
            pending: Vec::new(),
            inserted: 0,
            fired: 0,
        }
    }

    pub fn add_set(&mut self) -> SetId {
        self.sets.push(HashSet::new());
        self.edges.push(Vec::new());
        self.sets.len() - 1
    }

    /// Forward every element added to `from` into `to`, except those in `except`.
    ///
    /// Elements already in `from` are not replayed; wire edges before seeding.
    pub fn add_edge(&mut self, from: SetId, to: SetId, except: &'a [T]) {
        self.edges[from].push(Edge { to, except });
    }

    /// Add `value` to `set` and propagate. Returns false if it was already present.
    pub fn insert(&mut self, set: SetId, value: T) -> bool {
        if !self.sets[set].insert(value) {
            return false;
        }
        self.inserted += 1;
        self.pending.push((set, value));

        while let Some((from, value)) = self.pending.pop() {
            for edge in &self.edges[from] {
                if edge.except.contains(&value) {
                    continue;
                }
                self.fired += 1;
                if self.sets[edge.to].insert(value) {
                    self.inserted += 1;
                    self.pending.push((edge.to, value));
                }
            }
        }
        true
    }

    pub fn contains(&self, set: SetId, value: &T) -> bool {
        self.sets[set].contains(value)
    }

    pub fn set(&self, set: SetId) -> &HashSet<T> {
        &self.sets[set]
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// Elements newly added to any set, counting seeds.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Edge activations: an element reaching an edge that does not exclude it.
    pub fn fired(&self) -> usize {
        self.fired
    }
}

impl<'a, T: Copy + Eq + Hash> Default for LiveNetwork<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}
