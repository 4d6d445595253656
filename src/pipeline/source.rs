use std::sync::Arc;

use crate::convert::format::PixelFormat;
use crate::foundation::core::PixelArea;
use crate::foundation::error::{ScaleError, ScaleResult};
use crate::pipeline::profiler::SourceProfiler;

/// A stage of the lazy pull chain.
///
/// Geometry and format are fixed at construction. `fill_region` writes exactly `area` of this
/// stage's output into `dst`, one row every `stride` bytes, or fails without a partial result.
pub trait PixelSource: Send {
    /// Stage name used in statistics.
    fn name(&self) -> &str;

    /// Output width in pixels.
    fn width(&self) -> u32;

    /// Output height in pixels.
    fn height(&self) -> u32;

    /// Output pixel format.
    fn format(&self) -> PixelFormat;

    /// Produce `area` into `dst`.
    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()>;
}

/// Validate a `fill_region` request against a source's geometry and the caller buffer.
pub fn check_region(
    width: u32,
    height: u32,
    format: PixelFormat,
    area: PixelArea,
    stride: usize,
    dst: &[u8],
) -> ScaleResult<()> {
    area.ensure_within(width, height)?;
    let row = area.width as usize * format.bytes_per_pixel();
    if stride < row {
        return Err(ScaleError::buffer_too_small(format!(
            "stride {stride} is smaller than a {row}-byte row"
        )));
    }
    let needed = (area.height as usize - 1) * stride + row;
    if dst.len() < needed {
        return Err(ScaleError::buffer_too_small(format!(
            "destination holds {} bytes, {needed} required",
            dst.len()
        )));
    }
    Ok(())
}

/// Exclusively owned link to a stage's upstream.
///
/// When the consuming stage is profiled, its clock is paused for the duration of every pull.
pub struct Upstream {
    source: Box<dyn PixelSource>,
    consumer: Option<Arc<SourceProfiler>>,
}

impl Upstream {
    /// Wrap `source` without instrumentation.
    pub fn new(source: Box<dyn PixelSource>) -> Self {
        Self {
            source,
            consumer: None,
        }
    }

    pub(crate) fn with_consumer(mut self, profiler: Option<Arc<SourceProfiler>>) -> Self {
        self.consumer = profiler;
        self
    }

    /// Upstream width.
    pub fn width(&self) -> u32 {
        self.source.width()
    }

    /// Upstream height.
    pub fn height(&self) -> u32 {
        self.source.height()
    }

    /// Upstream format.
    pub fn format(&self) -> PixelFormat {
        self.source.format()
    }

    /// Pull `area` from upstream.
    pub fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        if let Some(p) = &self.consumer {
            p.pause();
        }
        let res = self.source.fill_region(area, stride, dst);
        if let Some(p) = &self.consumer {
            p.resume();
        }
        res
    }

    /// Give back the wrapped source.
    pub fn into_inner(self) -> Box<dyn PixelSource> {
        self.source
    }
}

/// Stage wrapper that records calls, pixels and time into a [`SourceProfiler`].
pub(crate) struct Profiled {
    inner: Box<dyn PixelSource>,
    profiler: Arc<SourceProfiler>,
}

impl Profiled {
    pub(crate) fn new(inner: Box<dyn PixelSource>, profiler: Arc<SourceProfiler>) -> Self {
        Self { inner, profiler }
    }
}

impl PixelSource for Profiled {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn format(&self) -> PixelFormat {
        self.inner.format()
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        self.profiler.start();
        let res = self.inner.fill_region(area, stride, dst);
        self.profiler.stop(if res.is_ok() { area.pixel_count() } else { 0 });
        res
    }
}

/// Leaf source over an in-memory pixel buffer.
#[derive(Clone, Debug)]
pub struct MemorySource {
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: usize,
    data: Vec<u8>,
}

impl MemorySource {
    /// Source over tightly packed rows.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> ScaleResult<Self> {
        Self::with_stride(width, height, format, width as usize * format.bytes_per_pixel(), data)
    }

    /// Source over rows `stride` bytes apart.
    pub fn with_stride(
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: usize,
        data: Vec<u8>,
    ) -> ScaleResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScaleError::validation("memory source dimensions must be non-zero"));
        }
        check_region(width, height, format, PixelArea::full(width, height), stride, &data)?;
        Ok(Self {
            width,
            height,
            format,
            stride,
            data,
        })
    }
}

impl PixelSource for MemorySource {
    fn name(&self) -> &str {
        "MemorySource"
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        check_region(self.width, self.height, self.format, area, stride, dst)?;
        let bpp = self.format.bytes_per_pixel();
        let row = area.width as usize * bpp;
        for y in 0..area.height as usize {
            let src = (area.y as usize + y) * self.stride + area.x as usize * bpp;
            dst[y * stride..y * stride + row].copy_from_slice(&self.data[src..src + row]);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/source.rs"]
mod tests;
