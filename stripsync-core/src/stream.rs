//! Randomly indexable event streams.

use crate::{Error, Result};

/// A record carrying a trigger clock value.
pub trait Clocked {
    /// Raw clock counter value.
    fn clock(&self) -> u64;
}

/// An ordered, randomly indexable, read-only sequence of records.
///
/// Implementations may read lazily from storage; `read` returns an owned
/// record so that callers never hold a borrow into the backing store.
pub trait EventStream {
    /// Record type yielded by the stream.
    type Record;

    /// Number of entries in the stream.
    fn len(&self) -> usize;

    /// Reads the entry at `index`.
    ///
    /// # Errors
    /// Returns `NotFound` when `index >= len()`, or a backend-specific error.
    fn read(&self, index: usize) -> Result<Self::Record>;

    /// Returns true if the stream has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: EventStream + ?Sized> EventStream for &S {
    type Record = S::Record;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn read(&self, index: usize) -> Result<Self::Record> {
        (**self).read(index)
    }
}

/// In-memory stream backed by a vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VecStream<T> {
    records: Vec<T>,
}

impl<T> VecStream<T> {
    /// Wraps a vector of records.
    #[must_use]
    pub fn new(records: Vec<T>) -> Self {
        Self { records }
    }

    /// Returns the underlying records.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.records
    }
}

impl<T> FromIterator<T> for VecStream<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<T: Clone> EventStream for VecStream<T> {
    type Record = T;

    fn len(&self) -> usize {
        self.records.len()
    }

    fn read(&self, index: usize) -> Result<T> {
        self.records.get(index).cloned().ok_or(Error::NotFound {
            index,
            len: self.records.len(),
        })
    }
}

/// Bare clock value, useful for streams that carry nothing else.
impl Clocked for u64 {
    #[inline]
    fn clock(&self) -> u64 {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_stream_read() {
        let stream = VecStream::new(vec![10u64, 20, 30]);
        assert_eq!(stream.len(), 3);
        assert!(!stream.is_empty());
        assert_eq!(stream.read(1), Ok(20));
        assert_eq!(stream.read(1).map(|r| r.clock()), Ok(20));
    }

    #[test]
    fn test_vec_stream_not_found() {
        let stream: VecStream<u64> = (0..4).collect();
        assert_eq!(stream.read(4), Err(Error::NotFound { index: 4, len: 4 }));
    }

    #[test]
    fn test_stream_by_reference() {
        let stream = VecStream::new(vec![1u64]);
        let by_ref = &stream;
        assert_eq!(EventStream::len(&by_ref), 1);
        assert_eq!(by_ref.read(0), Ok(1));
    }
}
