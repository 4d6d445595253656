//! Separable two-pass convolution.
//!
//! A request pulls the upstream block covered by the kernel windows of every requested output
//! pixel, convolves each of its rows horizontally into an intermediate buffer and then combines
//! those rows vertically. Byte and UQ15 formats use Q15 fixed-point weights with a single
//! rounding step at the end; float formats use float weights and the detected lane width.
//! Alpha must be premultiplied so transparent pixels contribute no color.

use crate::convert::format::{NumericRepresentation, PixelFormat};
use crate::convert::{read_f32, read_u16, write_f32, write_u16};
use crate::foundation::core::PixelArea;
use crate::foundation::error::{ScaleError, ScaleResult};
use crate::foundation::math::UQ15_ONE;
use crate::kernel::interpolator::InterpolationSettings;
use crate::kernel::map::{KernelMap, KernelView, KernelWeight};
use crate::pipeline::source::{PixelSource, Upstream, check_region};
use crate::simd::{Lanes, SimdLevel, with_lanes};

const Q30_ROUND: i64 = 1 << 29;

enum AxisMaps {
    Fixed {
        h: KernelMap<i32>,
        v: KernelMap<i32>,
    },
    Float {
        h: KernelMap<f32>,
        v: KernelMap<f32>,
    },
}

#[derive(Clone, Copy)]
enum Sample {
    Byte,
    Uq15,
    Float,
}

impl Sample {
    fn of(format: PixelFormat) -> ScaleResult<Self> {
        if let Some(premultiplied) = format.premultiplied() {
            return Err(ScaleError::unsupported_format(format!(
                "cannot convolve straight alpha ({format}), convert to {premultiplied} first"
            )));
        }
        match format.desc().numeric {
            NumericRepresentation::UnsignedInteger => Ok(Self::Byte),
            NumericRepresentation::Fixed => Ok(Self::Uq15),
            NumericRepresentation::Float => Ok(Self::Float),
            NumericRepresentation::Indexed => Err(ScaleError::unsupported_format(format!(
                "cannot convolve palette indices ({format})"
            ))),
        }
    }
}

/// Resampling or blurring stage.
pub struct Convolution {
    name: &'static str,
    upstream: Upstream,
    width: u32,
    height: u32,
    format: PixelFormat,
    maps: AxisMaps,
    level: SimdLevel,
    block: Vec<u8>,
    fixed_rows: Vec<i64>,
    float_src: Vec<f32>,
    float_rows: Vec<f32>,
}

impl Convolution {
    /// Resample `upstream` to `width x height`.
    pub fn resize(
        upstream: Upstream,
        width: u32,
        height: u32,
        settings: &InterpolationSettings,
        subsample_offset: bool,
    ) -> ScaleResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScaleError::validation(format!(
                "resize target must be non-zero, got {width}x{height}"
            )));
        }
        let format = upstream.format();
        let channels = format.channels() as u32;
        let (in_w, in_h) = (upstream.width(), upstream.height());
        let maps = match Sample::of(format)? {
            Sample::Byte | Sample::Uq15 => AxisMaps::Fixed {
                h: KernelMap::create_resample(in_w, width, settings, 1, subsample_offset)?,
                v: KernelMap::create_resample(in_h, height, settings, 1, subsample_offset)?,
            },
            Sample::Float => AxisMaps::Float {
                h: KernelMap::create_resample(in_w, width, settings, channels, subsample_offset)?,
                v: KernelMap::create_resample(in_h, height, settings, 1, subsample_offset)?,
            },
        };
        Ok(Self::with_maps("Resize", upstream, width, height, maps))
    }

    /// Gaussian blur of `upstream` with standard deviation `radius`.
    pub fn blur(upstream: Upstream, radius: f64) -> ScaleResult<Self> {
        let format = upstream.format();
        let channels = format.channels() as u32;
        let (w, h) = (upstream.width(), upstream.height());
        let maps = match Sample::of(format)? {
            Sample::Byte | Sample::Uq15 => AxisMaps::Fixed {
                h: KernelMap::create_blur(w, radius, 1)?,
                v: KernelMap::create_blur(h, radius, 1)?,
            },
            Sample::Float => AxisMaps::Float {
                h: KernelMap::create_blur(w, radius, channels)?,
                v: KernelMap::create_blur(h, radius, 1)?,
            },
        };
        Ok(Self::with_maps("GaussianBlur", upstream, w, h, maps))
    }

    fn with_maps(
        name: &'static str,
        upstream: Upstream,
        width: u32,
        height: u32,
        maps: AxisMaps,
    ) -> Self {
        let format = upstream.format();
        Self {
            name,
            upstream,
            width,
            height,
            format,
            maps,
            level: SimdLevel::detect(),
            block: Vec::new(),
            fixed_rows: Vec::new(),
            float_src: Vec::new(),
            float_rows: Vec::new(),
        }
    }

    /// Pin the vector width used by the float passes.
    pub fn with_level(mut self, level: SimdLevel) -> Self {
        self.level = level;
        self
    }
}

// Input range `[lo, hi)` read by outputs `from..to`.
fn span<T: KernelWeight>(view: &KernelView<'_, T>, samples: usize, from: u32, to: u32) -> (u32, u32) {
    let mut lo = usize::MAX;
    let mut hi = 0;
    for i in from as usize..to as usize {
        let s = view.start(i);
        lo = lo.min(s);
        hi = hi.max(s + samples);
    }
    (lo as u32, hi as u32)
}

fn pull_block<T: KernelWeight>(
    upstream: &mut Upstream,
    block: &mut Vec<u8>,
    (h, hv): (&KernelMap<T>, &KernelView<'_, T>),
    (v, vv): (&KernelMap<T>, &KernelView<'_, T>),
    area: PixelArea,
) -> ScaleResult<PixelArea> {
    let (sx0, sx1) = span(hv, h.samples(), area.x, area.right());
    let (sy0, sy1) = span(vv, v.samples(), area.y, area.bottom());
    let src = PixelArea::new(sx0, sy0, sx1 - sx0, sy1 - sy0);
    let src_stride = src.width as usize * upstream.format().bytes_per_pixel();
    block.resize(src_stride * src.height as usize, 0);
    upstream.fill_region(src, src_stride, block)?;
    Ok(src)
}

impl PixelSource for Convolution {
    fn name(&self) -> &str {
        self.name
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
        let Self {
            upstream,
            format,
            maps,
            level,
            block,
            fixed_rows,
            float_src,
            float_rows,
            ..
        } = self;

        let format = *format;
        match &*maps {
            AxisMaps::Fixed { h, v } => {
                let (hv, vv) = (h.view()?, v.view()?);
                let src = pull_block(upstream, block, (h, &hv), (v, &vv), area)?;
                let wide = format.desc().bytes_per_channel() == 2;
                let rows = FixedRows {
                    channels: format.channels(),
                    wide,
                    src,
                    area,
                };
                rows.horizontal(&hv, block, fixed_rows);
                rows.vertical(&vv, fixed_rows, stride, dst);
            }
            AxisMaps::Float { h, v } => {
                let (hv, vv) = (h.view()?, v.view()?);
                let src = pull_block(upstream, block, (h, &hv), (v, &vv), area)?;
                float_src.clear();
                float_src.extend(block.chunks_exact(4).map(read_f32));
                let channels = format.channels();
                let pass = FloatRows {
                    channels,
                    samples: h.samples(),
                    src,
                    area,
                };
                with_lanes!(*level, L => {
                    pass.horizontal::<L>(&hv, float_src, float_rows);
                    pass.vertical::<L>(&vv, float_rows, stride, dst);
                });
            }
        }
        Ok(())
    }
}

struct FixedRows {
    channels: usize,
    wide: bool,
    src: PixelArea,
    area: PixelArea,
}

impl FixedRows {
    fn sample(&self, line: &[u8], i: usize) -> i64 {
        if self.wide {
            i64::from(read_u16(&line[i * 2..]))
        } else {
            i64::from(line[i])
        }
    }

    // Each block row becomes `area.width * channels` Q15-scaled sums.
    fn horizontal(&self, hv: &KernelView<'_, i32>, block: &[u8], rows: &mut Vec<i64>) {
        let ch = self.channels;
        let bpc = if self.wide { 2 } else { 1 };
        let src_stride = self.src.width as usize * ch * bpc;
        let row_len = self.area.width as usize * ch;
        rows.resize(row_len * self.src.height as usize, 0);

        for (line, out) in block
            .chunks_exact(src_stride)
            .zip(rows.chunks_exact_mut(row_len))
        {
            for x in 0..self.area.width as usize {
                let ox = self.area.x as usize + x;
                let start = hv.start(ox) - self.src.x as usize;
                let w = hv.weights(ox);
                for c in 0..ch {
                    let mut acc = 0i64;
                    for (j, &wj) in w.iter().enumerate() {
                        acc += i64::from(wj) * self.sample(line, (start + j) * ch + c);
                    }
                    out[x * ch + c] = acc;
                }
            }
        }
    }

    fn vertical(&self, vv: &KernelView<'_, i32>, rows: &[i64], stride: usize, dst: &mut [u8]) {
        let row_len = self.area.width as usize * self.channels;
        let max = if self.wide { i64::from(UQ15_ONE) } else { 255 };
        for y in 0..self.area.height as usize {
            let oy = self.area.y as usize + y;
            let start = vv.start(oy) - self.src.y as usize;
            let w = vv.weights(oy);
            let out = &mut dst[y * stride..];
            for e in 0..row_len {
                let mut acc = 0i64;
                for (k, &wk) in w.iter().enumerate() {
                    acc += i64::from(wk) * rows[(start + k) * row_len + e];
                }
                let val = ((acc + Q30_ROUND) >> 30).clamp(0, max);
                if self.wide {
                    write_u16(&mut out[e * 2..], val as u16);
                } else {
                    out[e] = val as u8;
                }
            }
        }
    }
}

struct FloatRows {
    channels: usize,
    samples: usize,
    src: PixelArea,
    area: PixelArea,
}

impl FloatRows {
    fn horizontal<L: Lanes>(&self, hv: &KernelView<'_, f32>, block: &[f32], rows: &mut Vec<f32>) {
        let ch = self.channels;
        let src_len = self.src.width as usize * ch;
        let row_len = self.area.width as usize * ch;
        let vlen = self.samples * ch;
        let vectorized = L::LANES % ch == 0;
        rows.resize(row_len * self.src.height as usize, 0.0);

        let mut lanes = [0.0f32; 8];
        for (line, out) in block
            .chunks_exact(src_len)
            .zip(rows.chunks_exact_mut(row_len))
        {
            for x in 0..self.area.width as usize {
                let ox = self.area.x as usize + x;
                let base = (hv.start(ox) - self.src.x as usize) * ch;
                let window = &line[base..base + vlen];
                let w = hv.weights(ox);
                let px = &mut out[x * ch..(x + 1) * ch];
                px.fill(0.0);

                let mut j = 0;
                if vectorized {
                    let mut acc = L::splat(0.0);
                    while j + L::LANES <= vlen {
                        acc = acc.mul_add_mem(L::load(&w[j..]), &window[j..]);
                        j += L::LANES;
                    }
                    if ch == 1 {
                        px[0] += acc.hsum();
                    } else {
                        acc.store(&mut lanes);
                        for (k, &v) in lanes[..L::LANES].iter().enumerate() {
                            px[k % ch] += v;
                        }
                    }
                }
                // Vector chunks are whole pixels, so `j % ch` is still the channel.
                for k in j..vlen {
                    px[k % ch] += w[k] * window[k];
                }
            }
        }
    }

    fn vertical<L: Lanes>(&self, vv: &KernelView<'_, f32>, rows: &[f32], stride: usize, dst: &mut [u8]) {
        let row_len = self.area.width as usize * self.channels;
        let mut buf = [0.0f32; 8];
        for y in 0..self.area.height as usize {
            let oy = self.area.y as usize + y;
            let start = vv.start(oy) - self.src.y as usize;
            let w = vv.weights(oy);
            let out = &mut dst[y * stride..];

            let mut e = 0;
            while e + L::LANES <= row_len {
                let mut acc = L::splat(0.0);
                for (k, &wk) in w.iter().enumerate() {
                    acc = acc.mul_add_mem(L::splat(wk), &rows[(start + k) * row_len + e..]);
                }
                acc.store(&mut buf);
                for (i, &v) in buf[..L::LANES].iter().enumerate() {
                    write_f32(&mut out[(e + i) * 4..], v);
                }
                e += L::LANES;
            }
            for e in e..row_len {
                let mut acc = 0.0f32;
                for (k, &wk) in w.iter().enumerate() {
                    acc += wk * rows[(start + k) * row_len + e];
                }
                write_f32(&mut out[e * 4..], acc);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/convolution.rs"]
mod tests;
