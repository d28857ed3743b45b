//! Frontier trees stored as flat Euler tours. Byte `0` closes the current
//! node and byte `1 + m` opens a child reached by move `m`. Replaying a tour
//! with a move stack reproduces every node of the subtree without any
//! pointers between nodes.

use super::puzzle::Move;
use log::trace;
use std::sync::{Mutex, PoisonError};

const POP: u8 = 0;

/// One step of a tour replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// Descend to the child reached by this move.
    Push(Move),
    /// Return to the parent of the current node.
    Pop,
}

impl Edge {
    #[inline(always)]
    fn from_byte(byte: u8) -> Self {
        if byte == POP {
            Edge::Pop
        } else {
            Edge::Push(Move::from_index_unchecked(byte - 1))
        }
    }
}

/// An append-only, fixed-capacity tour buffer handed out by a [`TreePool`].
#[derive(Debug)]
pub struct EulerTour {
    data: Vec<u8>,
    capacity: usize,
}

impl EulerTour {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// The capacity of the pool this tour was allocated by.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left before the buffer reaches its capacity.
    #[inline(always)]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    #[inline(always)]
    pub fn push_move(&mut self, move_: Move) {
        debug_assert!(self.data.len() < self.capacity);
        self.data.push(1 + move_.index());
    }

    #[inline(always)]
    pub fn push_pop(&mut self) {
        debug_assert!(self.data.len() < self.capacity);
        self.data.push(POP);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.data.iter().map(|&byte| Edge::from_byte(byte))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

struct PoolInner {
    capacity: usize,
    free: Vec<EulerTour>,
}

/// A freelist of retired tours that all share one capacity. Growing the
/// pool doubles the capacity and drops every pooled tour; tours of the old
/// capacity that come back afterwards are freed instead of pooled.
pub struct TreePool {
    inner: Mutex<PoolInner>,
}

impl TreePool {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                capacity,
                free: Vec::new(),
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity
    }

    /// Number of tours waiting in the freelist.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .free
            .len()
    }

    /// An empty tour of the current capacity.
    #[must_use]
    pub fn acquire(&self) -> EulerTour {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.free.pop() {
            Some(tour) => tour,
            None => EulerTour::with_capacity(inner.capacity),
        }
    }

    pub fn release(&self, mut tour: EulerTour) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if tour.capacity == inner.capacity {
            tour.clear();
            inner.free.push(tour);
        }
    }

    /// Double the capacity and flush the freelist.
    pub fn grow(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.free.clear();
        inner.capacity *= 2;
        trace!("Tree pool capacity grown to {} bytes", inner.capacity);
    }
}
