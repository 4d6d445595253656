use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use smallvec::SmallVec;

use crate::foundation::error::{ScaleError, ScaleResult};
use crate::foundation::math::{UQ15_ONE, fix15, gcd};
use crate::foundation::pool::{BufferPool, PooledBuffer};
use crate::kernel::cache::KernelCache;
use crate::kernel::interpolator::{InterpolationSettings, Interpolator};
use crate::simd;

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for f32 {}
}

/// Numeric representation of kernel weights.
///
/// `i32` stores Q15 fixed-point weights once per tap. `f32` stores float weights replicated for
/// each interleaved channel so a convolution loop can multiply whole pixels at a time.
pub trait KernelWeight:
    sealed::Sealed + Copy + Default + PartialEq + Send + Sync + fmt::Debug + 'static
{
    /// Distinguishes weight types inside cache keys.
    const TAG: u8;

    /// `true` when weights are replicated per channel.
    const INTERLEAVED: bool;

    /// Convert a normalized float tap vector into `out` (`kernel.len() * channels` values).
    fn convert(kernel: &[f32], out: &mut [Self], channels: usize) -> ScaleResult<()>;

    /// Raw bit pattern, for exact comparison.
    fn to_bits(self) -> u32;

    /// Process-wide cache for this weight type.
    fn global_cache() -> &'static KernelCache<Self>;
}

fn ensure_len(needed: usize, have: usize) -> ScaleResult<()> {
    if have < needed {
        return Err(ScaleError::buffer_too_small(format!(
            "weight buffer holds {have} values, {needed} required"
        )));
    }
    Ok(())
}

impl KernelWeight for f32 {
    const TAG: u8 = 1;
    const INTERLEAVED: bool = true;

    fn convert(kernel: &[f32], out: &mut [f32], channels: usize) -> ScaleResult<()> {
        ensure_len(kernel.len() * channels, out.len())?;
        for (dst, &w) in out.chunks_exact_mut(channels).zip(kernel) {
            dst.fill(w);
        }
        Ok(())
    }

    fn to_bits(self) -> u32 {
        f32::to_bits(self)
    }

    fn global_cache() -> &'static KernelCache<f32> {
        crate::kernel::cache::global_f32()
    }
}

impl KernelWeight for i32 {
    const TAG: u8 = 2;
    const INTERLEAVED: bool = false;

    fn convert(kernel: &[f32], out: &mut [i32], channels: usize) -> ScaleResult<()> {
        debug_assert_eq!(channels, 1);
        ensure_len(kernel.len(), out.len())?;
        let out = &mut out[..kernel.len()];

        for (dst, &w) in out.iter_mut().zip(kernel) {
            *dst = fix15(w);
        }

        // Rounding drift goes to the dominant tap so the vector sums to exactly one.
        let sum: i32 = out.iter().sum();
        let largest = out
            .iter()
            .enumerate()
            .max_by_key(|(_, w)| w.abs())
            .map_or(0, |(j, _)| j);
        if let Some(tap) = out.get_mut(largest) {
            *tap += UQ15_ONE - sum;
        }
        Ok(())
    }

    fn to_bits(self) -> u32 {
        self as u32
    }

    fn global_cache() -> &'static KernelCache<i32> {
        crate::kernel::cache::global_i32()
    }
}

/// Pools a kernel map draws its storage and build scratch from.
pub(crate) struct KernelPools<T: KernelWeight> {
    pub(crate) weights: Arc<BufferPool<T>>,
    pub(crate) index: Arc<BufferPool<i32>>,
    pub(crate) scratch: Arc<BufferPool<f32>>,
}

impl<T: KernelWeight> Clone for KernelPools<T> {
    fn clone(&self) -> Self {
        Self {
            weights: Arc::clone(&self.weights),
            index: Arc::clone(&self.index),
            scratch: Arc::clone(&self.scratch),
        }
    }
}

struct MapData<T: KernelWeight> {
    // (start, weight offset) per output pixel.
    index: PooledBuffer<i32>,
    weights: PooledBuffer<T>,
    live: bool,
}

struct MapStorage<T: KernelWeight> {
    refs: AtomicI32,
    data: RwLock<MapData<T>>,
}

impl<T: KernelWeight> MapStorage<T> {
    fn try_add_ref(&self) -> bool {
        let mut current = self.refs.load(Ordering::Acquire);
        loop {
            if current <= 0 {
                return false;
            }
            match self.refs.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(seen) => current = seen,
            }
        }
    }

    fn release(&self) {
        if self.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        // Only the thread that moves the count from zero to the disposed marker frees storage.
        if self
            .refs
            .compare_exchange(0, i32::MIN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.live = false;
        data.index = PooledBuffer::detached();
        data.weights = PooledBuffer::detached();
    }
}

/// Reference-counted 1-D resampling table.
///
/// Cloning is explicit through [`KernelMap::try_clone`]; every handle releases its reference on
/// drop and the storage goes back to its pool when the last one is gone.
pub struct KernelMap<T: KernelWeight> {
    input_size: u32,
    pixels: usize,
    samples: usize,
    channels: usize,
    storage: Arc<MapStorage<T>>,
}

impl<T: KernelWeight> KernelMap<T> {
    /// Build an uncached map using the process-wide pools for `T`.
    pub fn build(
        input_size: u32,
        output_size: u32,
        settings: &InterpolationSettings,
        channels: u32,
        offset: f64,
    ) -> ScaleResult<Self> {
        build_map(
            input_size,
            output_size,
            settings,
            channels,
            offset,
            T::global_cache().pools(),
        )
    }

    /// Resampling map from the process-wide cache.
    pub fn create_resample(
        input_size: u32,
        output_size: u32,
        settings: &InterpolationSettings,
        channels: u32,
        subsample_offset: bool,
    ) -> ScaleResult<Self> {
        T::global_cache().create_resample(
            input_size,
            output_size,
            settings,
            channels,
            subsample_offset,
        )
    }

    /// Symmetric Gaussian blur map from the process-wide cache.
    pub fn create_blur(size: u32, radius: f64, channels: u32) -> ScaleResult<Self> {
        T::global_cache().create_blur(size, radius, channels)
    }

    /// Input axis length the map reads from.
    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Output count.
    pub fn pixels(&self) -> usize {
        self.pixels
    }

    /// Taps per output after clamping and padding.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Weight replication factor.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Acquire another reference, or `None` if the map has already been released.
    pub fn try_clone(&self) -> Option<Self> {
        self.storage.try_add_ref().then(|| Self {
            input_size: self.input_size,
            pixels: self.pixels,
            samples: self.samples,
            channels: self.channels,
            storage: Arc::clone(&self.storage),
        })
    }

    /// `true` when both handles refer to the same weight storage.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Current reference count; non-positive once released.
    pub fn ref_count(&self) -> i32 {
        self.storage.refs.load(Ordering::Acquire)
    }

    /// Borrow the table for reading.
    pub fn view(&self) -> ScaleResult<KernelView<'_, T>> {
        if self.ref_count() <= 0 {
            return Err(ScaleError::disposed("kernel map has been released"));
        }
        let data = self
            .storage
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if !data.live {
            return Err(ScaleError::disposed("kernel map has been released"));
        }
        Ok(KernelView {
            data,
            pixels: self.pixels,
            vlen: self.samples * self.channels,
        })
    }
}

impl<T: KernelWeight> Drop for KernelMap<T> {
    fn drop(&mut self) {
        self.storage.release();
    }
}

impl<T: KernelWeight> fmt::Debug for KernelMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelMap")
            .field("input_size", &self.input_size)
            .field("pixels", &self.pixels)
            .field("samples", &self.samples)
            .field("channels", &self.channels)
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Read access to a live [`KernelMap`].
pub struct KernelView<'a, T: KernelWeight> {
    data: RwLockReadGuard<'a, MapData<T>>,
    pixels: usize,
    vlen: usize,
}

impl<T: KernelWeight> KernelView<'_, T> {
    /// Output count.
    pub fn pixels(&self) -> usize {
        self.pixels
    }

    /// First input index read for output `i`.
    pub fn start(&self, i: usize) -> usize {
        self.data.index[2 * i] as usize
    }

    /// Offset of output `i`'s weight vector within the packed storage.
    pub fn weight_offset(&self, i: usize) -> usize {
        self.data.index[2 * i + 1] as usize
    }

    /// Weight vector for output `i` (`samples * channels` values).
    pub fn weights(&self, i: usize) -> &[T] {
        let off = self.weight_offset(i);
        &self.data.weights[off..off + self.vlen]
    }

    /// Number of weight values physically stored after deduplication.
    pub fn stored_len(&self) -> usize {
        self.data.weights.len()
    }
}

fn padding(input: usize, ksize: usize, channels: usize) -> usize {
    let inc = if channels == 3 {
        4
    } else {
        let width = if ksize >= 8 {
            simd::vector_count::<f32>()
        } else {
            4
        };
        width / channels
    };
    let thresh = if channels == 4 {
        1
    } else if simd::is_supported() || channels == 1 {
        2
    } else {
        3
    };
    if inc <= 1 || ksize < thresh {
        return 0;
    }

    let pad = ksize.div_ceil(inc) * inc - ksize;
    if ksize + pad > input { 0 } else { pad }
}

// Center of output `i` is `num / den + offset` with integer `num` and `den`, so the tap distances
// of positions one cycle apart are computed from identical operands.
fn fill_taps(
    kernel: &mut [f32],
    filter: &dyn Interpolator,
    start: i64,
    num: i64,
    den: i64,
    offset: f64,
    scale: f64,
) {
    let mut sum = 0.0f64;
    let mut nearest = (0usize, f64::INFINITY);
    let mut raw: SmallVec<[f64; 32]> = SmallVec::with_capacity(kernel.len());
    for j in 0..kernel.len() {
        let dist = (((start + j as i64) * den - num) as f64 / den as f64 - offset).abs();
        if dist < nearest.1 {
            nearest = (j, dist);
        }
        let w = filter.value(dist * scale);
        sum += w;
        raw.push(w);
    }

    if sum.abs() < f64::EPSILON {
        kernel.fill(0.0);
        kernel[nearest.0] = 1.0;
        return;
    }
    for (dst, w) in kernel.iter_mut().zip(raw) {
        *dst = (w / sum) as f32;
    }
}

// Fold taps outside `[0, input)` onto the boundary tap and return the shifted start.
fn fold_edges(kernel: &[f32], folded: &mut [f32], start: i64, input: i64) -> i64 {
    let samples = folded.len() as i64;
    let first = start.clamp(0, input - samples);
    folded.fill(0.0);
    for (j, &w) in kernel.iter().enumerate() {
        let pos = (start + j as i64).clamp(0, input - 1);
        folded[(pos - first) as usize] += w;
    }
    first
}

fn same_bits<T: KernelWeight>(a: &[T], b: &[T]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

#[tracing::instrument(level = "debug", skip(settings, pools))]
pub(crate) fn build_map<T: KernelWeight>(
    input_size: u32,
    output_size: u32,
    settings: &InterpolationSettings,
    channels: u32,
    offset: f64,
    pools: &KernelPools<T>,
) -> ScaleResult<KernelMap<T>> {
    if input_size == 0 || output_size == 0 {
        return Err(ScaleError::validation(format!(
            "kernel axis sizes must be non-zero, got {input_size} -> {output_size}"
        )));
    }
    if !(1..=4).contains(&channels) {
        return Err(ScaleError::validation(format!(
            "kernel channel count must be 1..=4, got {channels}"
        )));
    }
    if !offset.is_finite() {
        return Err(ScaleError::validation("kernel offset must be finite"));
    }

    let filter = settings.weighting_function.as_ref();
    let input = input_size as usize;
    let output = output_size as usize;

    let scale = (f64::from(output_size) / f64::from(input_size)).min(1.0) / settings.blur;
    let mut support = filter.support() / scale;
    if input_size < 3 && support * 2.0 > f64::from(input_size) {
        support = f64::from(input_size) / 2.0;
    }

    let wchannels = if T::INTERLEAVED { channels as usize } else { 1 };
    let ksize = ((support * 2.0).ceil() as usize).max(1);
    let kpad = if T::INTERLEAVED {
        padding(input, ksize, wchannels)
    } else {
        0
    };
    let klen = ksize + kpad;
    let samples = klen.min(input);
    let vlen = samples * wchannels;
    if output
        .checked_mul(vlen)
        .is_none_or(|total| total > i32::MAX as usize)
    {
        return Err(ScaleError::validation("kernel map too large"));
    }

    let cycle = (output_size / gcd(input_size, output_size)) as usize;

    let mut kernel = pools.scratch.rent(klen);
    let mut folded = pools.scratch.rent(samples);
    let mut converted = pools.weights.rent(vlen);
    let mut index = pools.index.rent(output * 2);
    let mut weights = pools.weights.rent(output * vlen);
    let mut used = 0usize;

    let in_i = i64::from(input_size);
    let den = 2 * i64::from(output_size);
    for i in 0..output {
        let num = (2 * i as i64 + 1) * in_i - i64::from(output_size);
        // Split off the integer part so the float work is identical one cycle apart.
        let frac = num.rem_euclid(den) as f64 / den as f64 + offset + support;
        let start = num.div_euclid(den) + frac.floor() as i64 - ksize as i64 + 1;

        fill_taps(
            &mut kernel[..ksize],
            filter,
            start,
            num,
            den,
            offset,
            scale,
        );
        kernel[ksize..].fill(0.0);
        let first = fold_edges(&kernel, &mut folded, start, in_i);
        T::convert(&folded, &mut converted, wchannels)?;

        index[2 * i] = first as i32;
        if i >= cycle {
            let prev = index[2 * (i - cycle) + 1] as usize;
            if same_bits(&weights[prev..prev + vlen], &converted) {
                index[2 * i + 1] = prev as i32;
                continue;
            }
        }
        weights[used..used + vlen].copy_from_slice(&converted);
        index[2 * i + 1] = used as i32;
        used += vlen;
    }
    weights.truncate(used);

    tracing::debug!(
        samples,
        channels = wchannels,
        stored_vectors = used / vlen.max(1),
        "kernel map built"
    );

    Ok(KernelMap {
        input_size,
        pixels: output,
        samples,
        channels: wchannels,
        storage: Arc::new(MapStorage {
            refs: AtomicI32::new(1),
            data: RwLock::new(MapData {
                index,
                weights,
                live: true,
            }),
        }),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/map.rs"]
mod tests;
