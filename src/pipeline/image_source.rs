use std::io::Cursor;

use anyhow::Context;
use image::{DynamicImage, ImageDecoder};

use crate::convert::format::PixelFormat;
use crate::foundation::core::{FrameInfo, Orientation, PixelArea};
use crate::foundation::error::ScaleResult;
use crate::pipeline::source::{MemorySource, PixelSource};

/// Leaf source over a decoded [`image::DynamicImage`].
///
/// RGB layouts are reordered to BGR on construction. 8-bit and 32-bit float images keep their
/// depth; every other layout is reduced to 8 bits.
#[derive(Clone, Debug)]
pub struct ImageSource {
    pixels: MemorySource,
    info: FrameInfo,
}

fn swap_rb<T: Copy>(data: &mut [T], channels: usize) {
    for px in data.chunks_exact_mut(channels) {
        px.swap(0, 2);
    }
}

fn float_bytes(data: Vec<f32>) -> Vec<u8> {
    data.into_iter().flat_map(f32::to_ne_bytes).collect()
}

impl ImageSource {
    /// Decode encoded image bytes, reading the Exif orientation when the container has one.
    pub fn decode(bytes: &[u8]) -> ScaleResult<Self> {
        let mut decoder = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .context("sniff image container")?
            .into_decoder()
            .context("open image decoder")?;
        let orientation = decoder
            .orientation()
            .map(|o| Orientation::from_exif(u16::from(o.to_exif())))
            .unwrap_or_default();
        let img = DynamicImage::from_decoder(decoder).context("decode image")?;
        Self::from_dynamic(img, orientation)
    }

    /// Adapt an already decoded image stored with `orientation`.
    pub fn from_dynamic(img: DynamicImage, orientation: Orientation) -> ScaleResult<Self> {
        let has_alpha = img.color().has_alpha();
        let (width, height) = (img.width(), img.height());
        let (format, data) = match img {
            DynamicImage::ImageLuma8(buf) => (PixelFormat::Grey8, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => {
                let mut raw = buf.into_raw();
                swap_rb(&mut raw, 3);
                (PixelFormat::Bgr24, raw)
            }
            DynamicImage::ImageRgba8(buf) => {
                let mut raw = buf.into_raw();
                swap_rb(&mut raw, 4);
                (PixelFormat::Bgra32, raw)
            }
            DynamicImage::ImageRgb32F(buf) => {
                let mut raw = buf.into_raw();
                swap_rb(&mut raw, 3);
                (PixelFormat::Bgr96Float, float_bytes(raw))
            }
            DynamicImage::ImageRgba32F(buf) => {
                let mut raw = buf.into_raw();
                swap_rb(&mut raw, 4);
                (PixelFormat::Bgra128Float, float_bytes(raw))
            }
            other if has_alpha => {
                let mut raw = other.to_rgba8().into_raw();
                swap_rb(&mut raw, 4);
                (PixelFormat::Bgra32, raw)
            }
            other if !other.color().has_color() => (PixelFormat::Grey8, other.to_luma8().into_raw()),
            other => {
                let mut raw = other.to_rgb8().into_raw();
                swap_rb(&mut raw, 3);
                (PixelFormat::Bgr24, raw)
            }
        };

        tracing::debug!(width, height, %format, ?orientation, "adapted decoded image");
        Ok(Self {
            pixels: MemorySource::new(width, height, format, data)?,
            info: FrameInfo::from_stored(width, height, has_alpha, orientation),
        })
    }

    /// Metadata of the decoded frame.
    pub fn frame_info(&self) -> FrameInfo {
        self.info
    }
}

impl PixelSource for ImageSource {
    fn name(&self) -> &str {
        "ImageSource"
    }

    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn format(&self) -> PixelFormat {
        self.pixels.format()
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        self.pixels.fill_region(area, stride, dst)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/image_source.rs"]
mod tests;
