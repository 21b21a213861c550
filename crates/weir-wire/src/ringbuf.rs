/// A fixed-capacity byte FIFO.
///
/// `start_offset` marks the first live byte and `size` counts how many bytes
/// are live; both wrap modulo `capacity`. Writing past the remaining
/// capacity overwrites the oldest bytes still in the buffer rather than
/// growing it — callers that cannot tolerate data loss are expected to check
/// [`RingBuffer::remaining_capacity`] first.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: Vec<u8>,
    start_offset: usize,
    size: usize,
}

impl RingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: vec![0u8; capacity], start_offset: 0, size: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity() - self.size
    }

    pub fn clear(&mut self) {
        self.size = 0;
    }

    /// Appends `src` to the buffer, overwriting the oldest bytes first if
    /// `src` does not fit. Returns the number of bytes that were overwritten
    /// (0 if everything fit without eviction).
    pub fn send_chunk(&mut self, src: &[u8]) -> usize {
        let capacity = self.capacity();
        if capacity == 0 || src.is_empty() {
            return 0;
        }

        let mut write_len = src.len();
        let mut src = src;
        if write_len > capacity {
            // Only the tail that still fits in the buffer can possibly
            // survive; everything before it would just be overwritten by
            // the end of this very write.
            src = &src[write_len - capacity..];
            write_len = capacity;
        }

        for (i, byte) in src.iter().enumerate() {
            let at = (self.start_offset + self.size + i) % capacity;
            self.buf[at] = *byte;
        }

        let exceeded = (self.size + write_len) as isize - capacity as isize;
        if exceeded > 0 {
            self.start_offset = (self.start_offset + exceeded as usize) % capacity;
            self.size = capacity;
        } else {
            self.size += write_len;
        }

        exceeded.max(0) as usize
    }

    /// Copies up to `dst.len()` live bytes into `dst` and consumes them.
    /// Returns the number of bytes actually copied.
    pub fn receive_chunk(&mut self, dst: &mut [u8]) -> usize {
        let capacity = self.capacity();
        let n = dst.len().min(self.size);
        for (i, slot) in dst.iter_mut().enumerate().take(n) {
            *slot = self.buf[(self.start_offset + i) % capacity.max(1)];
        }
        self.start_offset = (self.start_offset + n) % capacity.max(1);
        self.size -= n;
        n
    }

    /// Un-consumes `src`, pushing it back in front of the buffer. This is
    /// the inverse of [`RingBuffer::receive_chunk`], used to return bytes
    /// that were read out speculatively (e.g. a partial socket write).
    pub fn return_chunk(&mut self, src: &[u8]) {
        let capacity = self.capacity();
        if capacity == 0 || src.is_empty() {
            return;
        }
        let n = src.len().min(capacity);
        let src = &src[src.len() - n..];
        self.start_offset = (self.start_offset + capacity - n) % capacity;
        for (i, byte) in src.iter().enumerate() {
            self.buf[(self.start_offset + i) % capacity] = *byte;
        }
        self.size = (self.size + n).min(capacity);
    }

    /// Copies up to `len` live bytes from `self` into `dst` without
    /// consuming them from `self`.
    pub fn copy(&self, dst: &mut RingBuffer, len: usize) -> usize {
        let n = len.min(self.size);
        let capacity = self.capacity().max(1);
        let mut staged = Vec::with_capacity(n);
        for i in 0..n {
            staged.push(self.buf[(self.start_offset + i) % capacity]);
        }
        dst.send_chunk(&staged);
        n
    }

    /// Moves up to `len` live bytes from `self` into `dst`, consuming them
    /// from `self`.
    pub fn transfer(&mut self, dst: &mut RingBuffer, len: usize) -> usize {
        let n = self.copy(dst, len);
        let mut sink = vec![0u8; n];
        self.receive_chunk(&mut sink);
        n
    }

    /// Grows the buffer to at least `needed` bytes of capacity, relinearizing
    /// the live bytes to start at offset 0. No-op if capacity already
    /// suffices.
    pub fn upscale_if_needed(&mut self, needed: usize) {
        if needed <= self.capacity() {
            return;
        }
        let mut new_buf = vec![0u8; needed];
        let capacity = self.capacity().max(1);
        for i in 0..self.size {
            new_buf[i] = self.buf[(self.start_offset + i) % capacity];
        }
        self.buf = new_buf;
        self.start_offset = 0;
    }
}
