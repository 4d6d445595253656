use crate::convert::format::PixelFormat;
use crate::convert::format_converter::{FormatConverter, MatteColor, matte_line, matte_output_format};
use crate::convert::grey::GreyConverter;
use crate::foundation::core::{Orientation, PixelArea};
use crate::foundation::error::{ScaleError, ScaleResult};
use crate::pipeline::source::{PixelSource, Upstream, check_region};
use crate::simd::SimdLevel;

/// Sub-rectangle of the upstream frame.
pub struct Crop {
    upstream: Upstream,
    area: PixelArea,
}

impl Crop {
    /// Crop `upstream` to `area`.
    pub fn new(upstream: Upstream, area: PixelArea) -> ScaleResult<Self> {
        area.ensure_within(upstream.width(), upstream.height())?;
        Ok(Self { upstream, area })
    }
}

impl PixelSource for Crop {
    fn name(&self) -> &str {
        "Crop"
    }

    fn width(&self) -> u32 {
        self.area.width
    }

    fn height(&self) -> u32 {
        self.area.height
    }

    fn format(&self) -> PixelFormat {
        self.upstream.format()
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        check_region(self.width(), self.height(), self.format(), area, stride, dst)?;
        let shifted = PixelArea::new(
            area.x + self.area.x,
            area.y + self.area.y,
            area.width,
            area.height,
        );
        self.upstream.fill_region(shifted, stride, dst)
    }
}

// Pull `area` from upstream one row at a time and hand each row to `f`.
fn for_each_row(
    upstream: &mut Upstream,
    line: &mut Vec<u8>,
    area: PixelArea,
    stride: usize,
    dst: &mut [u8],
    mut f: impl FnMut(&[u8], &mut [u8]) -> ScaleResult<()>,
) -> ScaleResult<()> {
    let in_row = area.width as usize * upstream.format().bytes_per_pixel();
    line.resize(in_row, 0);
    for y in 0..area.height {
        let row = PixelArea::new(area.x, area.y + y, area.width, 1);
        upstream.fill_region(row, in_row, line)?;
        let off = y as usize * stride;
        f(line, &mut dst[off..])?;
    }
    Ok(())
}

/// Bit-depth, transfer-function or alpha conversion.
pub struct ConvertFormat {
    upstream: Upstream,
    converter: FormatConverter,
    format: PixelFormat,
    line: Vec<u8>,
}

impl ConvertFormat {
    /// Convert `upstream` pixels to `format`.
    pub fn new(upstream: Upstream, format: PixelFormat) -> ScaleResult<Self> {
        let converter = FormatConverter::new(upstream.format(), format)?;
        Ok(Self {
            upstream,
            converter,
            format,
            line: Vec::new(),
        })
    }
}

impl PixelSource for ConvertFormat {
    fn name(&self) -> &str {
        "ConvertFormat"
    }

    fn width(&self) -> u32 {
        self.upstream.width()
    }

    fn height(&self) -> u32 {
        self.upstream.height()
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        check_region(self.width(), self.height(), self.format, area, stride, dst)?;
        let out_row = area.width as usize * self.format.bytes_per_pixel();
        let converter = self.converter;
        for_each_row(&mut self.upstream, &mut self.line, area, stride, dst, |line, out| {
            converter.convert_line(line, &mut out[..out_row])
        })
    }
}

/// Luma extraction.
pub struct ToGrey {
    upstream: Upstream,
    converter: GreyConverter,
    format: PixelFormat,
    line: Vec<u8>,
}

impl ToGrey {
    /// Reduce `upstream` to a single luma channel.
    pub fn new(upstream: Upstream) -> ScaleResult<Self> {
        let format = GreyConverter::output_format(upstream.format())?;
        Ok(Self {
            upstream,
            converter: GreyConverter::new(),
            format,
            line: Vec::new(),
        })
    }
}

impl PixelSource for ToGrey {
    fn name(&self) -> &str {
        "ToGrey"
    }

    fn width(&self) -> u32 {
        self.upstream.width()
    }

    fn height(&self) -> u32 {
        self.upstream.height()
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        check_region(self.width(), self.height(), self.format, area, stride, dst)?;
        let out_row = area.width as usize * self.format.bytes_per_pixel();
        let in_format = self.upstream.format();
        let converter = self.converter;
        for_each_row(&mut self.upstream, &mut self.line, area, stride, dst, |line, out| {
            converter.convert_line(in_format, line, &mut out[..out_row])
        })
    }
}

/// Flatten straight alpha over a solid color.
pub struct Matte {
    upstream: Upstream,
    color: MatteColor,
    format: PixelFormat,
    level: SimdLevel,
}

impl Matte {
    /// Flatten `upstream` over `color`.
    pub fn new(upstream: Upstream, color: MatteColor) -> ScaleResult<Self> {
        let format = matte_output_format(upstream.format())?;
        Ok(Self {
            upstream,
            color,
            format,
            level: SimdLevel::detect(),
        })
    }
}

impl PixelSource for Matte {
    fn name(&self) -> &str {
        "Matte"
    }

    fn width(&self) -> u32 {
        self.upstream.width()
    }

    fn height(&self) -> u32 {
        self.upstream.height()
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        check_region(self.width(), self.height(), self.format, area, stride, dst)?;
        self.upstream.fill_region(area, stride, dst)?;
        let row = area.width as usize * self.format.bytes_per_pixel();
        let in_format = self.upstream.format();
        for y in 0..area.height as usize {
            let off = y * stride;
            matte_line(self.level, in_format, &mut dst[off..off + row], self.color)?;
        }
        Ok(())
    }
}

/// Exif orientation correction.
pub struct Orient {
    upstream: Upstream,
    orientation: Orientation,
    block: Vec<u8>,
}

impl Orient {
    /// Present `upstream` (stored with `orientation`) upright.
    pub fn new(upstream: Upstream, orientation: Orientation) -> Self {
        Self {
            upstream,
            orientation,
            block: Vec::new(),
        }
    }

    // Stored-frame coordinate of output pixel (x, y).
    fn source_of(&self, x: u32, y: u32) -> (u32, u32) {
        let o = self.orientation;
        let (u, v) = if o.swaps_dimensions() { (y, x) } else { (x, y) };
        let sx = if o.flips_x() {
            self.upstream.width() - 1 - u
        } else {
            u
        };
        let sy = if o.flips_y() {
            self.upstream.height() - 1 - v
        } else {
            v
        };
        (sx, sy)
    }
}

impl PixelSource for Orient {
    fn name(&self) -> &str {
        "Orient"
    }

    fn width(&self) -> u32 {
        if self.orientation.swaps_dimensions() {
            self.upstream.height()
        } else {
            self.upstream.width()
        }
    }

    fn height(&self) -> u32 {
        if self.orientation.swaps_dimensions() {
            self.upstream.width()
        } else {
            self.upstream.height()
        }
    }

    fn format(&self) -> PixelFormat {
        self.upstream.format()
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        check_region(self.width(), self.height(), self.format(), area, stride, dst)?;
        let bpp = self.format().bytes_per_pixel();
        if self.orientation == Orientation::Normal {
            return self.upstream.fill_region(area, stride, dst);
        }

        let (ax, ay) = self.source_of(area.x, area.y);
        let (bx, by) = self.source_of(area.right() - 1, area.bottom() - 1);
        let src = PixelArea::new(ax.min(bx), ay.min(by), ax.abs_diff(bx) + 1, ay.abs_diff(by) + 1);
        let src_stride = src.width as usize * bpp;
        self.block.resize(src_stride * src.height as usize, 0);
        let mut block = std::mem::take(&mut self.block);
        let pulled = self.upstream.fill_region(src, src_stride, &mut block);
        if let Err(e) = pulled {
            self.block = block;
            return Err(e);
        }

        for y in 0..area.height {
            let row = &mut dst[y as usize * stride..];
            for x in 0..area.width {
                let (sx, sy) = self.source_of(area.x + x, area.y + y);
                let s = (sy - src.y) as usize * src_stride + (sx - src.x) as usize * bpp;
                let d = x as usize * bpp;
                row[d..d + bpp].copy_from_slice(&block[s..s + bpp]);
            }
        }
        self.block = block;
        Ok(())
    }
}

/// Reject planar component formats where interleaved pixels are required.
pub(crate) fn ensure_interleaved(format: PixelFormat, op: &str) -> ScaleResult<()> {
    if format.is_planar_component() && format != PixelFormat::Y8 {
        return Err(ScaleError::not_supported(format!(
            "{op} requires interleaved pixels, got {format}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/transforms.rs"]
mod tests;
