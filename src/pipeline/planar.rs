use crate::convert::format::PixelFormat;
use crate::foundation::core::PixelArea;
use crate::foundation::error::{ScaleError, ScaleResult};
use crate::foundation::math::{UQ15_ROUND, fix15_coef};
use crate::pipeline::source::{PixelSource, Upstream, check_region};

// Full-range BT.601 inverse matrix.
const CR_TO_R: i32 = fix15_coef(1.402) as i32;
const CB_TO_G: i32 = fix15_coef(0.344_136) as i32;
const CR_TO_G: i32 = fix15_coef(0.714_136) as i32;
const CB_TO_B: i32 = fix15_coef(1.772) as i32;

/// The three planes of a YCbCr image.
pub struct Planes {
    /// Luma plane.
    pub y: Upstream,
    /// Blue-difference plane.
    pub cb: Upstream,
    /// Red-difference plane.
    pub cr: Upstream,
}

impl Planes {
    fn check(&self) -> ScaleResult<()> {
        for (plane, want) in [
            (&self.y, PixelFormat::Y8),
            (&self.cb, PixelFormat::Cb8),
            (&self.cr, PixelFormat::Cr8),
        ] {
            if plane.format() != want {
                return Err(ScaleError::unsupported_format(format!(
                    "expected a {want} plane, got {}",
                    plane.format()
                )));
            }
        }
        Ok(())
    }
}

/// Converts same-sized Y, Cb and Cr planes into interleaved [`PixelFormat::Bgr24`].
pub struct YccMerge {
    planes: Planes,
    lines: [Vec<u8>; 3],
}

impl YccMerge {
    /// Merge `planes`; chroma must already match the luma size.
    pub fn new(planes: Planes) -> ScaleResult<Self> {
        planes.check()?;
        let size = (planes.y.width(), planes.y.height());
        for chroma in [&planes.cb, &planes.cr] {
            if (chroma.width(), chroma.height()) != size {
                return Err(ScaleError::validation(format!(
                    "chroma plane is {}x{}, luma is {}x{}",
                    chroma.width(),
                    chroma.height(),
                    size.0,
                    size.1
                )));
            }
        }
        Ok(Self {
            planes,
            lines: Default::default(),
        })
    }
}

fn ycc_to_bgr(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = (i32::from(y) << 15) + UQ15_ROUND;
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;
    let px = |v: i32| (v >> 15).clamp(0, 255) as u8;
    [
        px(y + CB_TO_B * cb),
        px(y - CB_TO_G * cb - CR_TO_G * cr),
        px(y + CR_TO_R * cr),
    ]
}

impl PixelSource for YccMerge {
    fn name(&self) -> &str {
        "YccMerge"
    }

    fn width(&self) -> u32 {
        self.planes.y.width()
    }

    fn height(&self) -> u32 {
        self.planes.y.height()
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::Bgr24
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        check_region(self.width(), self.height(), PixelFormat::Bgr24, area, stride, dst)?;
        let w = area.width as usize;
        let len = w * area.height as usize;
        let [y, cb, cr] = &mut self.lines;
        for (plane, line) in [
            (&mut self.planes.y, &mut *y),
            (&mut self.planes.cb, &mut *cb),
            (&mut self.planes.cr, &mut *cr),
        ] {
            line.resize(len, 0);
            plane.fill_region(area, w, line)?;
        }

        for row in 0..area.height as usize {
            let out = &mut dst[row * stride..row * stride + w * 3];
            let span = row * w..(row + 1) * w;
            let samples = y[span.clone()].iter().zip(&cb[span.clone()]).zip(&cr[span]);
            for (px, ((&l, &b), &r)) in out.chunks_exact_mut(3).zip(samples) {
                px.copy_from_slice(&ycc_to_bgr(l, b, r));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/planar.rs"]
mod tests;
