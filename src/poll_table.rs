// src/poll_table.rs
use std::os::unix::io::RawFd;

/// Extra slots allocated beyond the populated count on every reallocation.
pub const OVERALLOC: usize = 8;
/// Free slack beyond which the table is reallocated downwards.
pub const DOWNSIZE_THRESHOLD: usize = 15;

/// Slot 0 always carries the listening socket.
pub const LISTENER_SLOT: usize = 0;
/// Handle stored for the listener slot; never a valid slab handle.
pub const LISTENER_HANDLE: u64 = u64::MAX;

fn empty_slot() -> libc::pollfd {
    libc::pollfd {
        fd: -1,
        events: 0,
        revents: 0,
    }
}

/// Dense descriptor table consumed by `poll(2)`.
///
/// `slots[0..populated)` is the live prefix; a parallel vector carries the
/// slab handle of the connection owning each slot, which makes swap-remove
/// O(1) instead of the O(n) registry scan it replaces.
pub struct PollTable {
    slots: Vec<libc::pollfd>,
    handles: Vec<u64>,
    populated: usize,
}

impl PollTable {
    pub fn new(listener_fd: RawFd) -> Self {
        let capacity = 1 + 3 + OVERALLOC;
        let mut slots = vec![empty_slot(); capacity];
        let handles = vec![LISTENER_HANDLE; capacity];
        slots[LISTENER_SLOT] = libc::pollfd {
            fd: listener_fd,
            events: libc::POLLIN,
            revents: 0,
        };
        Self {
            slots,
            handles,
            populated: 1,
        }
    }

    #[inline]
    pub fn populated(&self) -> usize {
        self.populated
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Appends a slot for `fd` owned by slab entry `handle`; grows the table
    /// when the populated prefix would touch the last slot.
    pub fn push(&mut self, fd: RawFd, events: i16, handle: u64) -> usize {
        if self.populated >= self.capacity() - 1 {
            self.resize(self.populated + 3 + OVERALLOC);
        }
        let idx = self.populated;
        self.slots[idx] = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        self.handles[idx] = handle;
        self.populated += 1;
        idx
    }

    /// Swap-removes slot `idx`. When another connection's slot is moved into
    /// `idx`, its handle is returned so the caller can fix that connection's
    /// stored table index.
    pub fn swap_remove(&mut self, idx: usize) -> Option<u64> {
        debug_assert!(idx != LISTENER_SLOT && idx < self.populated);
        let last = self.populated - 1;
        let displaced = if idx != last {
            self.slots[idx] = self.slots[last];
            self.handles[idx] = self.handles[last];
            Some(self.handles[idx])
        } else {
            None
        };
        self.slots[last] = empty_slot();
        self.handles[last] = LISTENER_HANDLE;
        self.populated = last;
        self.maybe_shrink();
        displaced
    }

    fn resize(&mut self, new_capacity: usize) {
        self.slots.resize(new_capacity, empty_slot());
        self.handles.resize(new_capacity, LISTENER_HANDLE);
    }

    fn maybe_shrink(&mut self) {
        if self.populated + 2 + DOWNSIZE_THRESHOLD < self.capacity() {
            let target = self.populated + 3 + OVERALLOC;
            self.slots.truncate(target);
            self.handles.truncate(target);
            self.slots.shrink_to_fit();
            self.handles.shrink_to_fit();
        }
    }

    #[inline]
    pub fn set_events(&mut self, idx: usize, events: i16) {
        self.slots[idx].events = events;
    }

    #[inline]
    pub fn revents(&self, idx: usize) -> i16 {
        self.slots[idx].revents
    }

    #[inline]
    pub fn handle(&self, idx: usize) -> u64 {
        self.handles[idx]
    }

    /// Live prefix handed to the readiness wait.
    pub fn polled_mut(&mut self) -> &mut [libc::pollfd] {
        &mut self.slots[..self.populated]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_occupies_slot_zero() {
        let table = PollTable::new(5);
        assert_eq!(table.populated(), 1);
        assert_eq!(table.handle(LISTENER_SLOT), LISTENER_HANDLE);
    }

    #[test]
    fn push_grows_before_the_last_slot_is_touched() {
        let mut table = PollTable::new(5);
        let initial_capacity = table.capacity();
        for i in 0..initial_capacity {
            table.push(100 + i as i32, libc::POLLIN, i as u64);
        }
        assert!(table.capacity() > initial_capacity);
        assert_eq!(table.populated(), initial_capacity + 1);
    }

    #[test]
    fn swap_remove_reports_the_displaced_handle() {
        let mut table = PollTable::new(5);
        let a = table.push(10, libc::POLLIN, 0);
        let _b = table.push(11, libc::POLLIN, 1);
        let c = table.push(12, libc::POLLOUT, 2);

        // removing a middle slot moves the last entry into it
        assert_eq!(table.swap_remove(a), Some(2));
        assert_eq!(table.handle(a), 2);
        assert_eq!(table.populated(), 3);

        // removing the tail slot displaces nothing
        assert_eq!(table.swap_remove(c - 1), None);
        assert_eq!(table.populated(), 2);
    }

    #[test]
    fn table_shrinks_once_slack_exceeds_the_threshold() {
        let mut table = PollTable::new(5);
        let mut idxs = Vec::new();
        for i in 0..32 {
            idxs.push(table.push(100 + i, libc::POLLIN, i as u64));
        }
        let grown = table.capacity();
        assert!(grown >= 33);

        // drain from the tail so indices stay valid
        while table.populated() > 1 {
            table.swap_remove(table.populated() - 1);
        }
        assert!(table.capacity() < grown);
        assert!(table.capacity() >= 1 + 3 + OVERALLOC);
    }
}
