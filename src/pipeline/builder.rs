use std::sync::Arc;

use rayon::prelude::*;
use smallvec::SmallVec;

use crate::convert::format::PixelFormat;
use crate::convert::format_converter::MatteColor;
use crate::foundation::core::{Orientation, PixelArea};
use crate::foundation::error::{ScaleError, ScaleResult};
use crate::kernel::interpolator::{FilterKind, InterpolationSettings};
use crate::pipeline::convolution::Convolution;
use crate::pipeline::native::{Delegation, NativeTransforms};
use crate::pipeline::planar::{Planes, YccMerge};
use crate::pipeline::profiler::{PixelSourceStats, SourceProfiler};
use crate::pipeline::source::{PixelSource, Profiled, Upstream};
use crate::pipeline::transforms::{ConvertFormat, Crop, Matte, Orient, ToGrey, ensure_interleaved};

/// Pipeline construction and execution options.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineOpts {
    /// Record per-stage statistics.
    pub profile: bool,
    /// Rows pulled per request by [`Pipeline::render_to_vec`].
    pub band_height: u32,
    /// Shift resampling windows by a quarter pixel, matching chroma-subsampled decoders.
    pub subsample_offset: bool,
    /// Filter used by [`PipelineBuilder::resize`].
    pub filter: FilterKind,
    /// Blur factor applied to `filter`.
    pub blur: f64,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            profile: false,
            band_height: 64,
            subsample_offset: false,
            filter: FilterKind::default(),
            blur: 1.0,
        }
    }
}

impl PipelineOpts {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> ScaleResult<Self> {
        serde_json::from_str(json).map_err(|e| ScaleError::serde(format!("pipeline options: {e}")))
    }

    fn validate(&self) -> ScaleResult<InterpolationSettings> {
        if self.band_height == 0 {
            return Err(ScaleError::validation("band_height must be >= 1"));
        }
        self.filter.to_settings(self.blur)
    }
}

type Source = Box<dyn PixelSource>;

type Offer<'a> = &'a dyn Fn(&dyn NativeTransforms, Source) -> ScaleResult<Delegation>;

enum Head {
    Interleaved(Source),
    Planar { y: Source, cb: Source, cr: Source },
}

struct Chain {
    opts: PipelineOpts,
    settings: InterpolationSettings,
    profilers: SmallVec<[Arc<SourceProfiler>; 8]>,
    native: Option<Arc<dyn NativeTransforms>>,
}

impl Chain {
    fn profiler(&self, name: &str) -> Option<Arc<SourceProfiler>> {
        self.opts.profile.then(|| Arc::new(SourceProfiler::new(name)))
    }

    fn seal(&mut self, stage: Source, profiler: Option<Arc<SourceProfiler>>) -> Source {
        match profiler {
            Some(p) => {
                self.profilers.push(Arc::clone(&p));
                Box::new(Profiled::new(stage, p))
            }
            None => stage,
        }
    }

    fn leaf(&mut self, source: Source) -> Source {
        let profiler = self.profiler(source.name());
        self.seal(source, profiler)
    }

    fn stage<S, F>(&mut self, source: Source, name: &str, make: F) -> ScaleResult<Source>
    where
        S: PixelSource + 'static,
        F: FnOnce(Upstream) -> ScaleResult<S>,
    {
        let profiler = self.profiler(name);
        let stage = make(Upstream::new(source).with_consumer(profiler.clone()))?;
        Ok(self.seal(Box::new(stage), profiler))
    }
}

/// Assembles a chain of stages over a leaf source.
///
/// Stages are appended by value; [`build`](Self::build) consumes the builder, so nothing can be
/// appended to a materialized [`Pipeline`].
pub struct PipelineBuilder {
    head: Head,
    chain: Chain,
}

const PLANAR_UNSUPPORTED: &str = "transform chain doesn't support planar mode";

impl PipelineBuilder {
    /// Start a chain over an interleaved source.
    pub fn new(source: impl PixelSource + 'static, opts: PipelineOpts) -> ScaleResult<Self> {
        let mut chain = Self::chain(opts)?;
        let head = Head::Interleaved(chain.leaf(Box::new(source)));
        Ok(Self { head, chain })
    }

    /// Start a chain over the three planes of a YCbCr image.
    pub fn planar(
        y: impl PixelSource + 'static,
        cb: impl PixelSource + 'static,
        cr: impl PixelSource + 'static,
        opts: PipelineOpts,
    ) -> ScaleResult<Self> {
        let expected = [PixelFormat::Y8, PixelFormat::Cb8, PixelFormat::Cr8];
        let got = [y.format(), cb.format(), cr.format()];
        if got != expected {
            return Err(ScaleError::unsupported_format(format!(
                "planar chain needs Y8/Cb8/Cr8 planes, got {}/{}/{}",
                got[0], got[1], got[2]
            )));
        }
        let mut chain = Self::chain(opts)?;
        let head = Head::Planar {
            y: chain.leaf(Box::new(y)),
            cb: chain.leaf(Box::new(cb)),
            cr: chain.leaf(Box::new(cr)),
        };
        Ok(Self { head, chain })
    }

    fn chain(opts: PipelineOpts) -> ScaleResult<Chain> {
        let settings = opts.validate()?;
        Ok(Chain {
            opts,
            settings,
            profilers: SmallVec::new(),
            native: None,
        })
    }

    /// Offer crop, scale, orientation and format conversion to `native` before appending stages.
    pub fn with_native(mut self, native: Arc<dyn NativeTransforms>) -> Self {
        self.chain.native = Some(native);
        self
    }

    /// Current output width.
    pub fn width(&self) -> u32 {
        match &self.head {
            Head::Interleaved(s) => s.width(),
            Head::Planar { y, .. } => y.width(),
        }
    }

    /// Current output height.
    pub fn height(&self) -> u32 {
        match &self.head {
            Head::Interleaved(s) => s.height(),
            Head::Planar { y, .. } => y.height(),
        }
    }

    /// Current output format; the luma format while planar.
    pub fn format(&self) -> PixelFormat {
        match &self.head {
            Head::Interleaved(s) => s.format(),
            Head::Planar { y, .. } => y.format(),
        }
    }

    /// `true` while the chain still carries separate Y, Cb and Cr planes.
    pub fn is_planar(&self) -> bool {
        matches!(self.head, Head::Planar { .. })
    }

    // Offer a transform to the native hook; the flag is `true` when the hook applied it.
    fn offer_native(self, name: &str, offer: Option<Offer<'_>>) -> ScaleResult<(Self, bool)> {
        let (Some(offer), Some(native)) = (offer, self.chain.native.clone()) else {
            return Ok((self, false));
        };
        let Self { head, chain } = self;
        let Head::Interleaved(source) = head else {
            return Ok((Self { head, chain }, false));
        };
        let (source, handled) = match offer(native.as_ref(), source)? {
            Delegation::Handled(done) => {
                tracing::debug!(stage = name, "transform handled natively");
                (done, true)
            }
            Delegation::Declined(back) => (back, false),
        };
        Ok((
            Self {
                head: Head::Interleaved(source),
                chain,
            },
            handled,
        ))
    }

    fn push<S, F>(self, name: &str, make: F) -> ScaleResult<Self>
    where
        S: PixelSource + 'static,
        F: FnOnce(Upstream) -> ScaleResult<S>,
    {
        let Self { head, mut chain } = self;
        let Head::Interleaved(source) = head else {
            return Err(ScaleError::not_supported(format!(
                "{name}: {PLANAR_UNSUPPORTED}"
            )));
        };
        let head = Head::Interleaved(chain.stage(source, name, make)?);
        Ok(Self { head, chain })
    }

    // Append an interleaved-only stage, first offering it to the native hook if `offer` is set.
    fn append<S, F>(self, name: &str, offer: Option<Offer<'_>>, make: F) -> ScaleResult<Self>
    where
        S: PixelSource + 'static,
        F: FnOnce(Upstream) -> ScaleResult<S>,
    {
        let (this, handled) = self.offer_native(name, offer)?;
        if handled {
            return Ok(this);
        }
        this.push(name, make)
    }

    // Like `append`, but straight alpha is premultiplied around the convolution and restored after.
    fn convolve<F>(self, name: &str, offer: Option<Offer<'_>>, make: F) -> ScaleResult<Self>
    where
        F: FnOnce(Upstream) -> ScaleResult<Convolution>,
    {
        let (this, handled) = self.offer_native(name, offer)?;
        if handled {
            return Ok(this);
        }
        let straight = this.format();
        let Some(premultiplied) = straight.premultiplied() else {
            return this.push(name, make);
        };
        this.push("ConvertFormat", |up| ConvertFormat::new(up, premultiplied))?
            .push(name, make)?
            .push("ConvertFormat", |up| ConvertFormat::new(up, straight))
    }

    /// Restrict output to `area`.
    pub fn crop(self, area: PixelArea) -> ScaleResult<Self> {
        area.ensure_within(self.width(), self.height())?;
        if area == PixelArea::full(self.width(), self.height()) {
            return Ok(self);
        }
        if self.is_planar() {
            return self.crop_planes(area);
        }
        self.append(
            "Crop",
            Some(&|n: &dyn NativeTransforms, s: Source| n.crop(s, area)),
            |up| Crop::new(up, area),
        )
    }

    fn crop_planes(self, area: PixelArea) -> ScaleResult<Self> {
        let Self { head, mut chain } = self;
        let Head::Planar { y, cb, cr } = head else {
            return Err(ScaleError::not_supported("expected planar chain"));
        };
        let (lw, lh) = (y.width(), y.height());
        let y = chain.stage(y, "Crop", |up| Crop::new(up, area))?;
        let mut crop_chroma = |plane: Source| -> ScaleResult<Source> {
            let sub = chroma_area(area, (lw, lh), (plane.width(), plane.height()));
            chain.stage(plane, "Crop", |up| Crop::new(up, sub))
        };
        let cb = crop_chroma(cb)?;
        let cr = crop_chroma(cr)?;
        Ok(Self {
            head: Head::Planar { y, cb, cr },
            chain,
        })
    }

    /// Resample to `width x height` with the configured filter.
    pub fn resize(self, width: u32, height: u32) -> ScaleResult<Self> {
        let settings = self.chain.settings.clone();
        self.resize_with(width, height, &settings)
    }

    /// Resample to `width x height` with explicit filter settings.
    pub fn resize_with(
        self,
        width: u32,
        height: u32,
        settings: &InterpolationSettings,
    ) -> ScaleResult<Self> {
        if (width, height) == (self.width(), self.height()) {
            return Ok(self);
        }
        let subsample = self.chain.opts.subsample_offset;
        if self.is_planar() {
            return self.resize_planes(width, height, settings);
        }
        self.convolve(
            "Resize",
            Some(&|n: &dyn NativeTransforms, s: Source| n.scale(s, width, height)),
            |up| Convolution::resize(up, width, height, settings, subsample),
        )
    }

    fn resize_planes(
        self,
        width: u32,
        height: u32,
        settings: &InterpolationSettings,
    ) -> ScaleResult<Self> {
        let Self { head, mut chain } = self;
        let Head::Planar { y, cb, cr } = head else {
            return Err(ScaleError::not_supported("expected planar chain"));
        };
        let subsample = chain.opts.subsample_offset;
        let (lw, lh) = (y.width(), y.height());
        let y = chain.stage(y, "Resize", |up| {
            Convolution::resize(up, width, height, settings, subsample)
        })?;
        let mut resize_chroma = |plane: Source| -> ScaleResult<Source> {
            let w = scaled_len(width, plane.width(), lw);
            let h = scaled_len(height, plane.height(), lh);
            if (w, h) == (plane.width(), plane.height()) {
                return Ok(plane);
            }
            chain.stage(plane, "Resize", |up| {
                Convolution::resize(up, w, h, settings, subsample)
            })
        };
        let cb = resize_chroma(cb)?;
        let cr = resize_chroma(cr)?;
        Ok(Self {
            head: Head::Planar { y, cb, cr },
            chain,
        })
    }

    /// Gaussian blur with standard deviation `radius`.
    pub fn blur(self, radius: f64) -> ScaleResult<Self> {
        ensure_interleaved(self.format(), "blur")?;
        self.convolve("GaussianBlur", None, |up| Convolution::blur(up, radius))
    }

    /// Convert pixels to `format`.
    pub fn convert_format(self, format: PixelFormat) -> ScaleResult<Self> {
        if !self.is_planar() && self.format() == format {
            return Ok(self);
        }
        self.append(
            "ConvertFormat",
            Some(&|n: &dyn NativeTransforms, s: Source| n.convert(s, format)),
            |up| ConvertFormat::new(up, format),
        )
    }

    /// Reduce to luma. On a planar chain the chroma planes are dropped.
    pub fn to_grey(self) -> ScaleResult<Self> {
        let already_grey = matches!(
            self.format(),
            PixelFormat::Grey8 | PixelFormat::Grey32Float | PixelFormat::Y8
        );
        if already_grey {
            let Self { head, chain } = self;
            let head = match head {
                Head::Planar { y, .. } => Head::Interleaved(y),
                interleaved => interleaved,
            };
            return Ok(Self { head, chain });
        }
        self.append("ToGrey", None, ToGrey::new)
    }

    /// Flatten straight alpha over `color`.
    pub fn matte(self, color: MatteColor) -> ScaleResult<Self> {
        self.append("Matte", None, |up| Matte::new(up, color))
    }

    /// Correct a stored Exif `orientation`.
    pub fn orient(self, orientation: Orientation) -> ScaleResult<Self> {
        if orientation == Orientation::Normal {
            return Ok(self);
        }
        self.append(
            "Orient",
            Some(&|n: &dyn NativeTransforms, s: Source| n.orient(s, orientation)),
            |up| Ok(Orient::new(up, orientation)),
        )
    }

    /// Merge Y, Cb and Cr planes into BGR, upsampling chroma to the luma size.
    pub fn merge_planar(self) -> ScaleResult<Self> {
        let Self { head, mut chain } = self;
        let Head::Planar { y, cb, cr } = head else {
            return Err(ScaleError::not_supported(PLANAR_UNSUPPORTED));
        };
        let (w, h) = (y.width(), y.height());
        let linear = InterpolationSettings::linear();
        let subsample = chain.opts.subsample_offset;
        let mut upsample = |plane: Source| -> ScaleResult<Source> {
            if (plane.width(), plane.height()) == (w, h) {
                return Ok(plane);
            }
            chain.stage(plane, "Resize", |up| {
                Convolution::resize(up, w, h, &linear, subsample)
            })
        };
        let cb = upsample(cb)?;
        let cr = upsample(cr)?;

        let profiler = chain.profiler("YccMerge");
        let planes = Planes {
            y: Upstream::new(y).with_consumer(profiler.clone()),
            cb: Upstream::new(cb).with_consumer(profiler.clone()),
            cr: Upstream::new(cr).with_consumer(profiler.clone()),
        };
        let merged = YccMerge::new(planes)?;
        let head = Head::Interleaved(chain.seal(Box::new(merged), profiler));
        Ok(Self { head, chain })
    }

    /// Materialize the chain.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn build(self) -> ScaleResult<Pipeline> {
        let Self { head, chain } = self;
        let Head::Interleaved(source) = head else {
            return Err(ScaleError::not_supported(
                "planar chain must be merged or reduced to grey before building",
            ));
        };
        tracing::debug!(
            width = source.width(),
            height = source.height(),
            format = %source.format(),
            stages = chain.profilers.len(),
            "pipeline built"
        );
        Ok(Pipeline {
            source,
            profilers: chain.profilers,
            band_height: chain.opts.band_height,
        })
    }
}

// Size of a plane stored at `plane` while luma `from` becomes `to`, rounded up.
fn scaled_len(to: u32, plane: u32, from: u32) -> u32 {
    let n = u64::from(to) * u64::from(plane);
    n.div_ceil(u64::from(from)).max(1) as u32
}

// Chroma rectangle covering luma `area`.
fn chroma_area(area: PixelArea, luma: (u32, u32), chroma: (u32, u32)) -> PixelArea {
    let axis = |start: u32, len: u32, l: u32, c: u32| {
        let (l, c) = (u64::from(l), u64::from(c));
        let lo = u64::from(start) * c / l;
        let hi = (u64::from(start + len) * c).div_ceil(l).min(c).max(lo + 1);
        (lo as u32, (hi - lo) as u32)
    };
    let (x, w) = axis(area.x, area.width, luma.0, chroma.0);
    let (y, h) = axis(area.y, area.height, luma.1, chroma.1);
    PixelArea::new(x, y, w, h)
}

/// A materialized chain, pulled by an encoder.
pub struct Pipeline {
    source: Source,
    profilers: SmallVec<[Arc<SourceProfiler>; 8]>,
    band_height: u32,
}

impl Pipeline {
    /// Output width.
    pub fn width(&self) -> u32 {
        self.source.width()
    }

    /// Output height.
    pub fn height(&self) -> u32 {
        self.source.height()
    }

    /// Output format.
    pub fn format(&self) -> PixelFormat {
        self.source.format()
    }

    /// Tightly packed row length in bytes.
    pub fn row_bytes(&self) -> usize {
        self.width() as usize * self.format().bytes_per_pixel()
    }

    /// Pull `area` of the final stage.
    pub fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        self.source.fill_region(area, stride, dst)
    }

    /// Render the whole frame into a tightly packed buffer, one band of rows at a time.
    pub fn render_to_vec(&mut self) -> ScaleResult<Vec<u8>> {
        let (width, height) = (self.width(), self.height());
        let row = self.row_bytes();
        let mut out = vec![0u8; row * height as usize];
        let mut y = 0;
        while y < height {
            let rows = self.band_height.min(height - y);
            let band = &mut out[y as usize * row..(y + rows) as usize * row];
            self.source
                .fill_region(PixelArea::new(0, y, width, rows), row, band)?;
            y += rows;
        }
        Ok(out)
    }

    /// Counters for every profiled stage, leaf first.
    pub fn stats(&self) -> Vec<PixelSourceStats> {
        self.profilers.iter().map(|p| p.stats()).collect()
    }
}

impl PixelSource for Pipeline {
    fn name(&self) -> &str {
        "Pipeline"
    }

    fn width(&self) -> u32 {
        Pipeline::width(self)
    }

    fn height(&self) -> u32 {
        Pipeline::height(self)
    }

    fn format(&self) -> PixelFormat {
        Pipeline::format(self)
    }

    fn fill_region(&mut self, area: PixelArea, stride: usize, dst: &mut [u8]) -> ScaleResult<()> {
        Pipeline::fill_region(self, area, stride, dst)
    }
}

fn build_thread_pool(threads: Option<usize>) -> ScaleResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ScaleError::validation("batch 'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ScaleError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

/// Render independent pipelines in parallel.
///
/// Each pipeline runs on one worker; results come back in input order and a failing pipeline
/// does not affect the others.
#[tracing::instrument(level = "debug", skip(jobs), fields(jobs = jobs.len()))]
pub fn process_batch(
    jobs: Vec<Pipeline>,
    threads: Option<usize>,
) -> ScaleResult<Vec<ScaleResult<Vec<u8>>>> {
    let pool = build_thread_pool(threads)?;
    let results = pool.install(|| {
        jobs.into_par_iter()
            .map(|mut job| job.render_to_vec())
            .collect::<Vec<_>>()
    });
    let failed = results.iter().filter(|r| r.is_err()).count();
    tracing::debug!(failed, "batch finished");
    Ok(results)
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/builder.rs"]
mod tests;
