use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

/// Pool configuration for rented buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BufferPoolOpts {
    /// Maximum bytes retained across all size classes.
    pub max_pool_bytes: usize,
    /// Maximum number of retained buffers per size class.
    pub max_buffers_per_class: usize,
}

impl Default for BufferPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 64 * 1024 * 1024,
            max_buffers_per_class: 16,
        }
    }
}

/// Counters describing pool behavior.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Buffers currently parked in the pool.
    pub retained_buffers: usize,
    /// Bytes currently parked in the pool.
    pub retained_bytes: usize,
    /// Rent calls satisfied by a fresh allocation.
    pub alloc_buffers: u64,
    /// Rent calls satisfied from a parked buffer.
    pub reused_buffers: u64,
    /// Buffers handed back to the pool.
    pub returned_buffers: u64,
    /// Returned buffers dropped because a cap was hit.
    pub dropped_on_return: u64,
}

// Size class `c` holds buffers with capacity exactly `1 << c` elements.
fn size_class(len: usize) -> usize {
    len.max(1).next_power_of_two().trailing_zeros() as usize
}

struct PoolState<T> {
    classes: Vec<Vec<Vec<T>>>,
    stats: BufferPoolStats,
}

/// Thread-safe, size-bucketed pool of element buffers.
///
/// Buffers are rented through [`BufferPool::rent`] and come back automatically when the returned
/// [`PooledBuffer`] guard drops, on every exit path.
pub struct BufferPool<T> {
    opts: BufferPoolOpts,
    state: Mutex<PoolState<T>>,
}

impl<T: Copy + Default + Send> BufferPool<T> {
    /// Create an empty pool.
    pub fn new(opts: BufferPoolOpts) -> Self {
        Self {
            opts,
            state: Mutex::new(PoolState {
                classes: Vec::new(),
                stats: BufferPoolStats::default(),
            }),
        }
    }

    /// Snapshot current counters.
    pub fn stats(&self) -> BufferPoolStats {
        self.lock().stats.clone()
    }

    /// Rent a zero-filled buffer of exactly `len` elements.
    pub fn rent(self: &Arc<Self>, len: usize) -> PooledBuffer<T> {
        let class = size_class(len);
        let parked = {
            let mut st = self.lock();
            let found = st.classes.get_mut(class).and_then(Vec::pop);
            if let Some(buf) = &found {
                let bytes = byte_len::<T>(buf.capacity());
                st.stats.retained_buffers = st.stats.retained_buffers.saturating_sub(1);
                st.stats.retained_bytes = st.stats.retained_bytes.saturating_sub(bytes);
                st.stats.reused_buffers = st.stats.reused_buffers.saturating_add(1);
            } else {
                st.stats.alloc_buffers = st.stats.alloc_buffers.saturating_add(1);
            }
            found
        };

        let mut buf = parked.unwrap_or_else(|| Vec::with_capacity(1 << class));
        buf.clear();
        buf.resize(len, T::default());
        PooledBuffer {
            buf,
            pool: Some(Arc::clone(self)),
        }
    }

    fn give_back(&self, buf: Vec<T>) {
        let class = size_class(buf.capacity());
        let bytes = byte_len::<T>(buf.capacity());
        let mut st = self.lock();
        st.stats.returned_buffers = st.stats.returned_buffers.saturating_add(1);

        // Only exact power-of-two capacities are parked so a class always satisfies its requests.
        if buf.capacity() != 1 << class
            || self.opts.max_buffers_per_class == 0
            || st.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            st.stats.dropped_on_return = st.stats.dropped_on_return.saturating_add(1);
            tracing::trace!(class, bytes, "buffer pool dropped returned buffer");
            return;
        }

        if st.classes.len() <= class {
            st.classes.resize_with(class + 1, Vec::new);
        }
        if st.classes[class].len() >= self.opts.max_buffers_per_class {
            st.stats.dropped_on_return = st.stats.dropped_on_return.saturating_add(1);
            return;
        }

        st.classes[class].push(buf);
        st.stats.retained_buffers = st.stats.retained_buffers.saturating_add(1);
        st.stats.retained_bytes = st.stats.retained_bytes.saturating_add(bytes);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState<T>> {
        // Pool state stays consistent across a panicking holder; every update is a single step.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn byte_len<T>(elems: usize) -> usize {
    elems.saturating_mul(std::mem::size_of::<T>())
}

/// Buffer rented from a [`BufferPool`]; returned to the pool on drop.
pub struct PooledBuffer<T: Copy + Default + Send> {
    buf: Vec<T>,
    pool: Option<Arc<BufferPool<T>>>,
}

impl<T: Copy + Default + Send> PooledBuffer<T> {
    /// Empty buffer not attached to any pool.
    pub fn detached() -> Self {
        Self {
            buf: Vec::new(),
            pool: None,
        }
    }

    /// Shrink the visible length without releasing capacity.
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }
}

impl<T: Copy + Default + Send> Deref for PooledBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.buf
    }
}

impl<T: Copy + Default + Send> DerefMut for PooledBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.buf
    }
}

impl<T: Copy + Default + Send> Drop for PooledBuffer<T> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.give_back(std::mem::take(&mut self.buf));
        }
    }
}

impl<T: Copy + Default + Send + std::fmt::Debug> std::fmt::Debug for PooledBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/pool.rs"]
mod tests;
