use crate::error::{WireError, WireResult};

const MIN_CAPACITY: usize = 1 << 4;

/// Rounds `x` up to the next power of two, floored at [`MIN_CAPACITY`].
fn align_default(x: usize) -> usize {
    x.max(MIN_CAPACITY).next_power_of_two()
}

/// An append-only byte container that doubles its capacity on demand.
///
/// The write side has two modes: [`Blob::send_chunk`] for a plain
/// copy-and-append, and the preallocate/commit pair
/// ([`Blob::preallocate`]/[`Blob::commit`]) for callers that want to write
/// directly into the blob's backing storage (e.g. a serializer assembling a
/// packet field by field) before declaring how much they actually wrote.
#[derive(Debug, Clone, Default)]
pub struct Blob {
    buf: Vec<u8>,
    size: usize,
}

impl Blob {
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self { buf: vec![0u8; initial_capacity], size: 0 }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn clear(&mut self) {
        self.size = 0;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.size]
    }

    fn upscale_on_demand(&mut self, addend: usize) {
        if self.size + addend <= self.capacity() {
            return;
        }
        let new_capacity = align_default(self.size + addend);
        let mut new_buf = vec![0u8; new_capacity];
        new_buf[..self.size].copy_from_slice(&self.buf[..self.size]);
        self.buf = new_buf;
    }

    /// Appends `src`, growing the backing storage if necessary.
    pub fn send_chunk(&mut self, src: &[u8]) {
        self.upscale_on_demand(src.len());
        self.buf[self.size..self.size + src.len()].copy_from_slice(src);
        self.size += src.len();
    }

    /// Copies up to `dst.len()` bytes starting at `src_offset`, leaving the
    /// blob's own contents untouched. Returns the number of bytes copied.
    pub fn receive_chunk(&self, dst: &mut [u8], src_offset: usize) -> usize {
        let remaining = self.size.saturating_sub(src_offset);
        let n = dst.len().min(remaining);
        if n == 0 {
            return 0;
        }
        dst[..n].copy_from_slice(&self.buf[src_offset..src_offset + n]);
        n
    }

    /// Grows the blob so that at least `requested_buf_size` bytes of
    /// writable space follow the current end, and returns that window.
    /// The caller writes into the returned slice and then calls
    /// [`Blob::commit`] to declare how much of it was actually used.
    pub fn preallocate(&mut self, requested_buf_size: usize) -> &mut [u8] {
        self.upscale_on_demand(requested_buf_size);
        let start = self.size;
        &mut self.buf[start..start + requested_buf_size]
    }

    /// Declares that `size` bytes of a window previously returned by
    /// [`Blob::preallocate`] were written. Fails (and clamps growth at the
    /// current capacity) if `size` overruns what was actually preallocated.
    pub fn commit(&mut self, size: usize) -> WireResult<()> {
        self.size += size;
        if self.size > self.capacity() {
            self.size = self.capacity();
            return Err(WireError::NoEnoughCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_chunk_grows_as_needed() {
        let mut b = Blob::with_capacity(4);
        b.send_chunk(b"hello world");
        assert_eq!(b.size(), 11);
        assert!(b.capacity() >= 11);
        assert_eq!(b.as_slice(), b"hello world");
    }

    #[test]
    fn receive_chunk_does_not_consume() {
        let mut b = Blob::with_capacity(16);
        b.send_chunk(b"abcdef");
        let mut out = [0u8; 3];
        assert_eq!(b.receive_chunk(&mut out, 2), 3);
        assert_eq!(&out, b"cde");
        assert_eq!(b.size(), 6);
    }

    #[test]
    fn preallocate_commit_round_trip() {
        let mut b = Blob::with_capacity(4);
        {
            let window = b.preallocate(8);
            window[..5].copy_from_slice(b"abcde");
        }
        b.commit(5).unwrap();
        assert_eq!(b.as_slice(), b"abcde");
    }

    #[test]
    fn commit_beyond_capacity_errors_and_clamps() {
        let mut b = Blob::with_capacity(16);
        let _ = b.preallocate(4);
        let err = b.commit(100).unwrap_err();
        assert_eq!(err, WireError::NoEnoughCapacity);
        assert_eq!(b.size(), b.capacity());
    }

    #[test]
    fn align_default_rounds_to_power_of_two_floor_sixteen() {
        assert_eq!(align_default(1), 16);
        assert_eq!(align_default(16), 16);
        assert_eq!(align_default(17), 32);
        assert_eq!(align_default(1000), 1024);
    }
}
