use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam_queue::SegQueue;

use crate::slot::SlotKey;

/// A single capacity-accounting touch, queued by any reader/committer
/// thread and drained exclusively by the evictor.
#[derive(Debug, Clone)]
pub struct MruTouch {
    pub key: SlotKey,
    /// Signed change in the slot's resident byte size. Positive on fill,
    /// negative on shrink, zero on a pure recency touch.
    pub delta: i64,
}

/// Lock-free MRU mutation queue: the hot path (readers, committers) only
/// ever pushes here; the evictor thread is the sole consumer. This
/// decouples capacity accounting from the hot path at the cost of
/// transient overshoot, using `crossbeam_queue::SegQueue`, a lock-free
/// MPSC-capable queue.
#[derive(Default)]
pub struct MruQueue {
    queue: SegQueue<MruTouch>,
}

impl MruQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, touch: MruTouch) {
        self.queue.push(touch);
    }

    pub fn pop(&self) -> Option<MruTouch> {
        self.queue.pop()
    }
}

/// Non-negative byte counter tracking resident cache footprint, updated
/// only by the evictor thread as it drains [`MruQueue`] touches. Exposed
/// via a plain atomic so other threads (tests, metrics) can observe it
/// without contending a lock.
#[derive(Default)]
pub struct CapacityAccountant {
    bytes: AtomicI64,
}

impl CapacityAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_delta(&self, delta: i64) {
        self.bytes.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed).max(0) as u64
    }
}

struct Node {
    key: SlotKey,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Recency-ordered doubly-linked list of `(table, key)` pairs, rightmost
/// (tail) = most recent. Owned exclusively by the evictor thread; no
/// internal synchronization is needed because every mutation arrives
/// pre-serialized through [`MruQueue`].
///
/// Implemented as a slab of nodes plus a free list rather than
/// `std::collections::LinkedList` (which can't relocate a node to the tail
/// in O(1) without first finding it) or `IndexMap::shift_remove` (which is
/// O(n) per relocation).
#[derive(Default)]
pub struct MruList {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    position: HashMap<SlotKey, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl MruList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    pub fn contains(&self, key: &SlotKey) -> bool {
        self.position.contains_key(key)
    }

    /// Adds `key` at the tail, or relocates it there if already present.
    pub fn touch(&mut self, key: SlotKey) {
        if let Some(&idx) = self.position.get(&key) {
            self.unlink(idx);
            self.link_at_tail(idx);
            return;
        }
        let idx = self.alloc(key.clone());
        self.position.insert(key, idx);
        self.link_at_tail(idx);
    }

    /// Peeks the least-recently-used key (the head) without removing it.
    pub fn peek_head(&self) -> Option<&SlotKey> {
        self.head.map(|idx| &self.nodes[idx].as_ref().unwrap().key)
    }

    /// Removes the head and returns its key.
    pub fn pop_head(&mut self) -> Option<SlotKey> {
        let idx = self.head?;
        self.unlink(idx);
        let node = self.nodes[idx].take().unwrap();
        self.free.push(idx);
        self.position.remove(&node.key);
        Some(node.key)
    }

    /// Keys in recency order, least- to most-recently-used, without
    /// removing any of them. Lets a caller walk past an entry it can't
    /// currently act on (e.g. a slot whose lock is contended) while leaving
    /// it linked at its original position for the next pass.
    pub fn keys_from_head(&self) -> Vec<SlotKey> {
        let mut out = Vec::with_capacity(self.position.len());
        let mut cur = self.head;
        while let Some(idx) = cur {
            let node = self.nodes[idx].as_ref().unwrap();
            out.push(node.key.clone());
            cur = node.next;
        }
        out
    }

    /// Removes an arbitrary key, not necessarily the current head — the
    /// evictor uses this once it has decided a slot is evicted or no longer
    /// present, having walked past any contended entries ahead of it.
    pub fn remove(&mut self, key: &SlotKey) -> bool {
        let Some(idx) = self.position.remove(key) else {
            return false;
        };
        self.unlink(idx);
        self.nodes[idx] = None;
        self.free.push(idx);
        true
    }

    fn alloc(&mut self, key: SlotKey) -> usize {
        let node = Node {
            key,
            prev: None,
            next: None,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().unwrap();
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
        let node = self.nodes[idx].as_mut().unwrap();
        node.prev = None;
        node.next = None;
    }

    fn link_at_tail(&mut self, idx: usize) {
        let old_tail = self.tail;
        if let Some(t) = old_tail {
            self.nodes[t].as_mut().unwrap().next = Some(idx);
        } else {
            self.head = Some(idx);
        }
        self.nodes[idx].as_mut().unwrap().prev = old_tail;
        self.tail = Some(idx);
    }
}
