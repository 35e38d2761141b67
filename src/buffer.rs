// src/buffer.rs
use crate::error::{ServerError, ServerResult};

/// Initial capacity of every connection buffer.
pub const BUFFER_SIZE: usize = 1024;
/// Hard ceiling; a request that does not fit is dropped with its connection.
pub const MAX_BUFFER: usize = 1024 * 1024;

/// Growable byte buffer shared by the receive and send paths of a connection.
///
/// `cursor` is the first unsent/unconsumed byte, `len` the populated prefix.
/// Invariant: `0 <= cursor <= len <= capacity <= MAX_BUFFER`.
pub struct IoBuf {
    data: Box<[u8]>,
    cursor: usize,
    len: usize,
}

impl IoBuf {
    pub fn new() -> Self {
        Self {
            data: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            cursor: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Doubles the capacity, zeroing the new half.
    pub fn grow(&mut self) -> ServerResult<()> {
        let cap = self.data.len();
        if cap >= MAX_BUFFER {
            return Err(ServerError::BufferOverflow);
        }
        let new_cap = (cap * 2).min(MAX_BUFFER);
        let mut bigger = vec![0u8; new_cap].into_boxed_slice();
        bigger[..self.len].copy_from_slice(&self.data[..self.len]);
        self.data = bigger;
        Ok(())
    }

    /// Unpopulated tail, the receive target.
    #[inline]
    pub fn free_tail(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.data[len..]
    }

    /// Marks `n` freshly received bytes as populated.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.len += n;
        debug_assert!(self.len <= self.data.len());
    }

    /// Populated prefix.
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Populated bytes not yet written out.
    #[inline]
    pub fn unsent(&self) -> &[u8] {
        &self.data[self.cursor..self.len]
    }

    /// Marks `n` bytes as sent.
    #[inline]
    pub fn consume(&mut self, n: usize) {
        self.cursor += n;
        debug_assert!(self.cursor <= self.len);
    }

    #[inline]
    pub fn is_drained(&self) -> bool {
        self.cursor == self.len
    }

    /// Replaces the contents with `bytes`, rewinding the cursor.
    pub fn set_contents(&mut self, bytes: &[u8]) -> ServerResult<()> {
        if bytes.len() > self.data.len() {
            return Err(ServerError::BufferOverflow);
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
        self.cursor = 0;
        Ok(())
    }

    /// Empties the buffer and exposes the whole capacity for a refill.
    pub fn refill_target(&mut self) -> &mut [u8] {
        self.cursor = 0;
        self.len = 0;
        &mut self.data[..]
    }

    /// Marks `n` refilled bytes as populated and unsent.
    pub fn refilled(&mut self, n: usize) {
        debug_assert!(n <= self.data.len());
        self.cursor = 0;
        self.len = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_by_doubling_up_to_the_ceiling() {
        let mut buf = IoBuf::new();
        assert_eq!(buf.capacity(), BUFFER_SIZE);

        let tail = buf.free_tail();
        tail[..BUFFER_SIZE].copy_from_slice(&[7u8; BUFFER_SIZE]);
        buf.advance(BUFFER_SIZE);
        assert!(buf.is_full());

        buf.grow().unwrap();
        assert_eq!(buf.capacity(), 2 * BUFFER_SIZE);
        assert!(!buf.is_full());
        // previously received bytes survive the reallocation
        assert!(buf.filled().iter().all(|&b| b == 7));

        while buf.capacity() < MAX_BUFFER {
            buf.grow().unwrap();
        }
        assert!(matches!(buf.grow(), Err(ServerError::BufferOverflow)));
    }

    #[test]
    fn cursor_tracks_partial_sends() {
        let mut buf = IoBuf::new();
        buf.set_contents(b"HTTP/1.0 200 OK\r\n\r\n").unwrap();
        assert_eq!(buf.unsent(), b"HTTP/1.0 200 OK\r\n\r\n");

        buf.consume(9);
        assert_eq!(buf.unsent(), b"200 OK\r\n\r\n");
        assert!(!buf.is_drained());

        buf.consume(buf.unsent().len());
        assert!(buf.is_drained());
    }

    #[test]
    fn refill_rewinds_both_marks() {
        let mut buf = IoBuf::new();
        buf.set_contents(b"headers").unwrap();
        buf.consume(7);

        let target = buf.refill_target();
        target[..4].copy_from_slice(b"body");
        buf.refilled(4);

        assert_eq!(buf.cursor(), 0);
        assert_eq!(buf.unsent(), b"body");
    }
}
