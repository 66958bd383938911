//! Growable byte buffer (C1, spec §3, §4.1).
//!
//! A thin wrapper over `Vec<u8>` rather than a hand-rolled `malloc`/`realloc`
//! pair: Rust's `Vec` already gives amortized-O(1) append and an explicit
//! `capacity`, which is all the original buffer's `{data, size, capacity}`
//! triple was providing. What the wrapper adds back is the spec's specific
//! growth factor and its `drain`/`printf` semantics, which plain `Vec`
//! doesn't expose directly.

use std::fmt::Write as _;

/// Growth factor applied to `capacity` when an `append` would overflow it.
const GROWTH_FACTOR: f64 = 1.5;

/// A growable byte buffer with `append`/`drain`/`printf` (spec §4.1).
#[derive(Debug, Default, Clone)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Buffer {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Appends `bytes`, growing capacity to `ceil((len + n) * 1.5)` first if
    /// the current capacity would be exceeded (spec §4.1).
    pub fn append(&mut self, bytes: &[u8]) {
        let needed = self.data.len() + bytes.len();
        if needed > self.data.capacity() {
            let target = (needed as f64 * GROWTH_FACTOR).ceil() as usize;
            self.data.reserve(target - self.data.len());
        }
        self.data.extend_from_slice(bytes);
    }

    /// Removes the first `n` bytes. `n >= len()` empties the buffer; a
    /// shorter drain shifts the remaining tail to the front (spec §4.1).
    pub fn drain(&mut self, n: usize) {
        if n >= self.data.len() {
            self.data.clear();
        } else {
            self.data.drain(0..n);
        }
    }

    /// Appends formatted text, for debug inspection (spec §4.1 `printf`).
    pub fn printf(&mut self, args: std::fmt::Arguments<'_>) {
        let mut scratch = String::new();
        let _ = scratch.write_fmt(args);
        self.data.extend_from_slice(scratch.as_bytes());
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Buffer { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_grows_geometrically() {
        let mut b = Buffer::new();
        b.append(b"hello");
        assert_eq!(b.as_slice(), b"hello");
        assert!(b.capacity() >= 5);
    }

    #[test]
    fn drain_all_clears() {
        let mut b = Buffer::from(b"hello world".to_vec());
        b.drain(100);
        assert!(b.is_empty());
    }

    #[test]
    fn drain_partial_shifts_tail() {
        let mut b = Buffer::from(b"hello world".to_vec());
        b.drain(6);
        assert_eq!(b.as_slice(), b"world");
    }

    #[test]
    fn printf_appends_formatted_text() {
        let mut b = Buffer::new();
        b.printf(format_args!("n={}", 42));
        assert_eq!(b.as_slice(), b"n=42");
    }
}
