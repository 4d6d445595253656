use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use crate::foundation::error::{ScaleError, ScaleResult};
use crate::foundation::fingerprint::{CacheKey, StableHasher};
use crate::foundation::pool::{BufferPool, BufferPoolOpts};
use crate::kernel::interpolator::{self, InterpolationSettings};
use crate::kernel::map::{KernelMap, KernelPools, KernelWeight, build_map};

/// Kernel cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct KernelCacheOpts {
    /// Maximum number of maps kept in the index. `0` disables caching.
    pub capacity: usize,
    /// Pool limits for map storage and build scratch.
    pub pool: BufferPoolOpts,
}

impl Default for KernelCacheOpts {
    fn default() -> Self {
        Self {
            capacity: 32,
            pool: BufferPoolOpts::default(),
        }
    }
}

/// Counters describing cache behavior.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KernelCacheStats {
    /// Lookups answered from the index.
    pub hits: u64,
    /// Lookups that built a new map.
    pub misses: u64,
    /// Builds for filters without a stable identity.
    pub uncached_builds: u64,
    /// Entries dropped from the index for capacity.
    pub evictions: u64,
    /// Entries found already released and replaced.
    pub stale: u64,
}

struct Entry<T: KernelWeight> {
    map: KernelMap<T>,
    last_used: u64,
}

struct CacheState<T: KernelWeight> {
    entries: HashMap<CacheKey, Entry<T>>,
    tick: u64,
    stats: KernelCacheStats,
}

/// Content-addressed, bounded LRU store of kernel maps.
///
/// Maps are returned as new references; eviction only drops the cache's own reference, so a map
/// stays usable by callers that still hold it.
pub struct KernelCache<T: KernelWeight> {
    opts: KernelCacheOpts,
    pools: KernelPools<T>,
    state: Mutex<CacheState<T>>,
}

static F32_CACHE: LazyLock<KernelCache<f32>> =
    LazyLock::new(|| KernelCache::new(KernelCacheOpts::default()));
static I32_CACHE: LazyLock<KernelCache<i32>> =
    LazyLock::new(|| KernelCache::new(KernelCacheOpts::default()));

pub(crate) fn global_f32() -> &'static KernelCache<f32> {
    &F32_CACHE
}

pub(crate) fn global_i32() -> &'static KernelCache<i32> {
    &I32_CACHE
}

fn cache_key(
    tag: u8,
    input_size: u32,
    output_size: u32,
    channels: u32,
    offset: f64,
    filter_id: u128,
    blur: f64,
) -> CacheKey {
    let mut h = StableHasher::new();
    h.write_u8(tag);
    h.write_u32(input_size);
    h.write_u32(output_size);
    h.write_u32(channels);
    h.write_f64(offset);
    h.write_u128(filter_id);
    h.write_f64(blur);
    h.finish()
}

impl<T: KernelWeight> KernelCache<T> {
    /// Create an empty cache with its own pools.
    pub fn new(opts: KernelCacheOpts) -> Self {
        Self {
            opts,
            pools: KernelPools {
                weights: Arc::new(BufferPool::new(opts.pool)),
                index: Arc::new(BufferPool::new(opts.pool)),
                scratch: Arc::new(BufferPool::new(opts.pool)),
            },
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                tick: 0,
                stats: KernelCacheStats::default(),
            }),
        }
    }

    /// Process-wide cache for `T`.
    pub fn global() -> &'static Self {
        T::global_cache()
    }

    pub(crate) fn pools(&self) -> &KernelPools<T> {
        &self.pools
    }

    /// Snapshot current counters.
    pub fn stats(&self) -> KernelCacheStats {
        self.lock().stats.clone()
    }

    /// Number of indexed maps.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// `true` when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached reference.
    pub fn clear(&self) {
        let drained: Vec<Entry<T>> = {
            let mut st = self.lock();
            st.entries.drain().map(|(_, e)| e).collect()
        };
        drop(drained);
    }

    /// Look up or build the map for the given parameters.
    pub fn get_or_add(
        &self,
        input_size: u32,
        output_size: u32,
        settings: &InterpolationSettings,
        channels: u32,
        offset: f64,
    ) -> ScaleResult<KernelMap<T>> {
        let build =
            || build_map(input_size, output_size, settings, channels, offset, &self.pools);

        let filter_id = settings.weighting_function.unique_id();
        let Some(filter_id) = filter_id.filter(|_| self.opts.capacity > 0) else {
            self.lock().stats.uncached_builds += 1;
            return build();
        };
        let key = cache_key(
            T::TAG,
            input_size,
            output_size,
            channels,
            offset,
            filter_id,
            settings.blur,
        );

        if let Some(map) = self.lookup(key) {
            return Ok(map);
        }

        let built = build()?;

        let mut st = self.lock();
        st.stats.misses += 1;
        // Another thread may have inserted the same key while this one was building.
        if let Some(map) = Self::acquire(&mut st, key) {
            return Ok(map);
        }
        let handle = built
            .try_clone()
            .ok_or_else(|| ScaleError::disposed("freshly built kernel map was released"))?;
        st.tick += 1;
        let tick = st.tick;
        st.entries.insert(
            key,
            Entry {
                map: built,
                last_used: tick,
            },
        );
        let evicted = self.evict(&mut st, key);
        drop(st);
        drop(evicted);
        Ok(handle)
    }

    /// Resampling map: the offset is 0.5 for point samplers, else 0.25 with `subsample_offset`,
    /// else 0.
    pub fn create_resample(
        &self,
        input_size: u32,
        output_size: u32,
        settings: &InterpolationSettings,
        channels: u32,
        subsample_offset: bool,
    ) -> ScaleResult<KernelMap<T>> {
        let offset = if settings.is_point_sampler() {
            0.5
        } else if subsample_offset {
            0.25
        } else {
            0.0
        };
        self.get_or_add(input_size, output_size, settings, channels, offset)
    }

    /// Same-size Gaussian blur map for `radius`.
    pub fn create_blur(&self, size: u32, radius: f64, channels: u32) -> ScaleResult<KernelMap<T>> {
        let settings = InterpolationSettings::new(interpolator::gaussian(radius)?, 1.0)?;
        self.get_or_add(size, size, &settings, channels, 0.0)
    }

    fn lookup(&self, key: CacheKey) -> Option<KernelMap<T>> {
        let mut st = self.lock();
        let found = Self::acquire(&mut st, key);
        if found.is_some() {
            st.stats.hits += 1;
            tracing::trace!(key = ?key, "kernel cache hit");
        }
        found
    }

    fn acquire(st: &mut CacheState<T>, key: CacheKey) -> Option<KernelMap<T>> {
        st.tick += 1;
        let tick = st.tick;
        let entry = st.entries.get_mut(&key)?;
        if let Some(map) = entry.map.try_clone() {
            entry.last_used = tick;
            return Some(map);
        }
        st.entries.remove(&key);
        st.stats.stale += 1;
        None
    }

    // Returns evicted entries so their references drop outside the lock.
    fn evict(&self, st: &mut CacheState<T>, keep: CacheKey) -> Vec<Entry<T>> {
        let mut evicted = Vec::new();
        while st.entries.len() > self.opts.capacity {
            let oldest = st
                .entries
                .iter()
                .filter(|(k, _)| **k != keep)
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k);
            let Some(oldest) = oldest else { break };
            if let Some(e) = st.entries.remove(&oldest) {
                evicted.push(e);
            }
            st.stats.evictions += 1;
            tracing::debug!(key = ?oldest, "kernel cache evicted entry");
        }
        evicted
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: KernelWeight> std::fmt::Debug for KernelCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache")
            .field("opts", &self.opts)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/cache.rs"]
mod tests;
