// src/slab.rs
use crate::conn::Conn;

enum Slot {
    Free { next: Option<usize> },
    Live(Box<Conn>),
}

/// Free-list slab of connections addressed by stable integer handles.
///
/// Replaces the intrusive doubly-linked registry of the original design:
/// the readiness table stores a handle per slot, so a displaced connection
/// is found by direct indexing instead of a list walk.
pub struct ConnSlab {
    slots: Vec<Slot>,
    head_free: Option<usize>,
    live: usize,
}

impl ConnSlab {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            head_free: None,
            live: 0,
        }
    }

    /// O(1) insertion; the returned handle stays valid until `remove`.
    pub fn insert(&mut self, conn: Conn) -> u64 {
        self.live += 1;
        match self.head_free {
            Some(idx) => {
                let next = match self.slots[idx] {
                    Slot::Free { next } => next,
                    Slot::Live(_) => unreachable!("free list points at a live slot"),
                };
                self.head_free = next;
                self.slots[idx] = Slot::Live(Box::new(conn));
                idx as u64
            }
            None => {
                self.slots.push(Slot::Live(Box::new(conn)));
                (self.slots.len() - 1) as u64
            }
        }
    }

    /// O(1) removal; returns the connection so its descriptors close on drop.
    pub fn remove(&mut self, handle: u64) -> Option<Conn> {
        let idx = handle as usize;
        match self.slots.get(idx) {
            Some(Slot::Live(_)) => {}
            _ => return None,
        }
        let old = std::mem::replace(
            &mut self.slots[idx],
            Slot::Free {
                next: self.head_free,
            },
        );
        self.head_free = Some(idx);
        self.live -= 1;
        match old {
            Slot::Live(conn) => Some(*conn),
            Slot::Free { .. } => unreachable!(),
        }
    }

    pub fn get(&self, handle: u64) -> Option<&Conn> {
        match self.slots.get(handle as usize) {
            Some(Slot::Live(conn)) => Some(conn),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: u64) -> Option<&mut Conn> {
        match self.slots.get_mut(handle as usize) {
            Some(Slot::Live(conn)) => Some(conn),
            _ => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Handles of all live connections, in slot order.
    pub fn handles(&self) -> Vec<u64> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                Slot::Live(_) => Some(i as u64),
                Slot::Free { .. } => None,
            })
            .collect()
    }
}
