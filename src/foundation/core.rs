use crate::foundation::error::{ScaleError, ScaleResult};

/// Axis-aligned pixel rectangle `[x, x+width) x [y, y+height)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelArea {
    /// Left edge (inclusive).
    pub x: u32,
    /// Top edge (inclusive).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelArea {
    /// Create an area from origin and size.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area covering a full `width x height` frame.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge.
    pub fn right(self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(self) -> u32 {
        self.y + self.height
    }

    /// Number of pixels covered.
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Return `true` when the area covers no pixels.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Return `true` when `self` lies entirely inside a `width x height` frame.
    pub fn fits_within(self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }

    /// Validate that `self` is a non-empty area inside a `width x height` frame.
    pub fn ensure_within(self, width: u32, height: u32) -> ScaleResult<()> {
        if self.is_empty() {
            return Err(ScaleError::validation("requested pixel area must be non-empty"));
        }
        if !self.fits_within(width, height) {
            return Err(ScaleError::validation(format!(
                "requested area {}x{}@{},{} exceeds source bounds {width}x{height}",
                self.width, self.height, self.x, self.y
            )));
        }
        Ok(())
    }
}

/// Exif orientation of a decoded frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Orientation {
    /// Stored upright.
    #[default]
    Normal,
    /// Mirrored left-right.
    FlipHorizontal,
    /// Rotated 180 degrees.
    Rotate180,
    /// Mirrored top-bottom.
    FlipVertical,
    /// Mirrored along the main diagonal.
    Transpose,
    /// Rotated 90 degrees clockwise.
    Rotate90,
    /// Mirrored along the anti-diagonal.
    Transverse,
    /// Rotated 270 degrees clockwise.
    Rotate270,
}

impl Orientation {
    /// Map an Exif orientation tag (1..=8), clamping out-of-range values.
    pub fn from_exif(tag: u16) -> Self {
        match tag {
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    /// `true` when correcting this orientation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }

    /// `true` when correcting this orientation mirrors the x axis.
    pub fn flips_x(self) -> bool {
        matches!(
            self,
            Self::FlipHorizontal | Self::Rotate180 | Self::Rotate270 | Self::Transverse
        )
    }

    /// `true` when correcting this orientation mirrors the y axis.
    pub fn flips_y(self) -> bool {
        matches!(
            self,
            Self::FlipVertical | Self::Rotate180 | Self::Rotate90 | Self::Transverse
        )
    }

    /// Orientation that undoes `self`.
    pub fn invert(self) -> Self {
        match self {
            Self::Rotate90 => Self::Rotate270,
            Self::Rotate270 => Self::Rotate90,
            o => o,
        }
    }
}

/// Per-frame facts supplied by an upstream decoder alongside its pixel source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameInfo {
    /// Width in pixels, after orientation correction.
    pub width: u32,
    /// Height in pixels, after orientation correction.
    pub height: u32,
    /// Whether the frame carries transparency.
    pub has_alpha: bool,
    /// Stored Exif orientation.
    pub orientation: Orientation,
}

impl FrameInfo {
    /// Build frame info from stored (uncorrected) dimensions.
    pub fn from_stored(width: u32, height: u32, has_alpha: bool, orientation: Orientation) -> Self {
        let (width, height) = if orientation.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        };
        Self {
            width,
            height,
            has_alpha,
            orientation,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
