// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Two-pass rendering with CDF colour normalisation.
//!
//! Pass 1 iterates every pixel and keeps its smooth escape index.
//! Those indices cluster badly: most of a view escapes within a narrow
//! band of iterations, so a linear `smooth / max_iter` lookup paints
//! nearly everything the same colour.  Instead we build a fine
//! histogram of the escaped values, accumulate it into a cumulative
//! distribution, and look each pixel up through that.  The colours then
//! spread evenly over whatever values the view actually contains.
//!
//! Pass 1 is split across threads by horizontal bands; each worker owns
//! its band of the output, so there is nothing to lock.

use image::{Rgba, RgbaImage};
use rand::Rng;
use tracing::debug;

use crate::adaptive::{AdaptiveConfig, AdaptiveRenderer};
use crate::error::{Error, Result};
use crate::iteration::{Fractal, IterationResult};
use crate::palette::{CycleMode, Palette};
use crate::planes::{Pixel, PlaneMapper, Viewport};

/// Stored in a smooth buffer for pixels that never escaped.
pub const IN_SET: f64 = -1.0;

/// In-set pixels are painted this near-black, never palette-mapped.
pub const INTERIOR_COLOR: [u8; 3] = [0, 0, 5];

/// Histogram bins per iteration.
pub const CDF_OVERSAMPLING: usize = 100;

/// A brightness ripple laid over the palette colour:
/// `base + amplitude * sin(smooth * frequency)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BrightnessWave {
    /// Mean multiplier.
    pub base: f64,
    /// Ripple amplitude.
    pub amplitude: f64,
    /// Ripple frequency in radians per iteration.
    pub frequency: f64,
}

impl Default for BrightnessWave {
    fn default() -> Self {
        BrightnessWave {
            base: 0.8,
            amplitude: 0.6,
            frequency: 0.05,
        }
    }
}

impl BrightnessWave {
    fn apply(&self, color: [u8; 3], smooth: f64) -> [u8; 3] {
        let k = (self.base + self.amplitude * (smooth * self.frequency).sin()).max(0.0);
        let scale = |c: u8| (f64::from(c) * k).round().min(255.0) as u8;
        [scale(color[0]), scale(color[1]), scale(color[2])]
    }
}

/// Which smooth-field producer a [`Renderer`] uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Adaptive tiles for non-integer powers, direct otherwise.
    Auto,
    /// Iterate every pixel.
    Direct,
    /// Always use adaptive tiles.
    Adaptive,
}

/// How smooth values become colours, and how much parallelism to use.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Fold applied to the CDF value before palette lookup.
    pub cycle_mode: CycleMode,
    /// Blend factor for the 4-neighbour anti-grain pass; `None` skips it.
    pub anti_grain: Option<f64>,
    /// Optional brightness ripple.
    pub color_wave: Option<BrightnessWave>,
    /// Worker threads for the per-pixel passes.
    pub threads: usize,
    /// Direct or adaptive.
    pub strategy: RenderStrategy,
    /// Tuning for the adaptive renderer.
    pub adaptive: AdaptiveConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            cycle_mode: CycleMode::default(),
            anti_grain: None,
            color_wave: None,
            threads: num_cpus::get(),
            strategy: RenderStrategy::Auto,
            adaptive: AdaptiveConfig::default(),
        }
    }
}

/// Per-pixel smooth escape indices for one render.
#[derive(Clone, Debug, PartialEq)]
pub struct SmoothBuffer {
    width: usize,
    height: usize,
    max_iter: usize,
    values: Vec<f64>,
}

impl SmoothBuffer {
    /// Wraps a row-major vector of values.
    pub fn from_values(width: usize, height: usize, max_iter: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), width * height);
        SmoothBuffer {
            width,
            height,
            max_iter,
            values,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The iteration cap the values were computed with.
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Row-major values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The value at a pixel.
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.width + x]
    }

    /// Interior pixels carry either the `IN_SET` sentinel or the cap itself.
    #[inline]
    pub fn is_interior(&self, value: f64) -> bool {
        value < 0.0 || value >= self.max_iter as f64
    }
}

/// The value pass 1 stores for an iteration result.
#[inline]
pub fn stored_value(result: IterationResult) -> f64 {
    if result.in_set {
        IN_SET
    } else {
        result.smooth.max(0.0)
    }
}

/// Normalised cumulative histogram of escaped smooth values.
#[derive(Clone, Debug, PartialEq)]
pub struct Cdf {
    bins: Vec<f64>,
    max_iter: usize,
}

impl Cdf {
    /// Builds the CDF over `[0, max_iter)` with `CDF_OVERSAMPLING` bins
    /// per iteration.  Interior values are ignored.  With no escaped
    /// value at all every bin stays zero.
    pub fn build(values: &[f64], max_iter: usize) -> Cdf {
        let size = (max_iter * CDF_OVERSAMPLING).max(1);
        let mut bins = vec![0.0; size];
        let cap = max_iter as f64;
        for &v in values {
            if v >= 0.0 && v < cap {
                bins[bin_index(v, cap, size)] += 1.0;
            }
        }

        let mut total = 0.0;
        for b in bins.iter_mut() {
            total += *b;
            *b = total;
        }
        if total > 0.0 {
            for b in bins.iter_mut() {
                *b /= total;
            }
        }
        Cdf { bins, max_iter }
    }

    /// The cumulative share at a smooth value.
    #[inline]
    pub fn normalize(&self, smooth: f64) -> f64 {
        self.bins[bin_index(smooth, self.max_iter as f64, self.bins.len())]
    }

    /// The cumulative bins.
    pub fn bins(&self) -> &[f64] {
        &self.bins
    }
}

#[inline]
fn bin_index(v: f64, cap: f64, size: usize) -> usize {
    if cap <= 0.0 {
        return 0;
    }
    let raw = (v / cap) * (size - 1) as f64;
    (raw.max(0.0).floor() as usize).min(size - 1)
}

/// Fills `values`, a row-major `width`-wide grid, by calling `f` for
/// every cell, splitting the rows across `threads` scoped workers.
pub(crate) fn fill_rows<F>(values: &mut [f64], width: usize, threads: usize, f: F) -> Result<()>
where
    F: Fn(Pixel) -> f64 + Sync,
{
    if values.is_empty() || width == 0 {
        return Ok(());
    }
    let height = values.len() / width;
    let threads = threads.max(1).min(height);
    let rows_per_band = (height + threads - 1) / threads;
    let f = &f;

    crossbeam::scope(|spawner| {
        for (band, cells) in values.chunks_mut(rows_per_band * width).enumerate() {
            spawner.spawn(move |_| {
                let top = band * rows_per_band;
                for (i, cell) in cells.iter_mut().enumerate() {
                    *cell = f(Pixel(i % width, top + i / width));
                }
            });
        }
    })
    .map_err(|_| Error::WorkerPanic)
}

/// Pass 1: the smooth index of every pixel, `IN_SET` for interior ones.
pub fn smooth_pass(
    fractal: &Fractal,
    plane: &PlaneMapper,
    max_iter: usize,
    threads: usize,
) -> Result<SmoothBuffer> {
    let mut values = vec![IN_SET; plane.len()];
    fill_rows(&mut values, plane.width(), threads, |pixel| {
        stored_value(fractal.iterate(plane.pixel_to_point(&pixel), max_iter))
    })?;
    Ok(SmoothBuffer::from_values(plane.width(), plane.height(), max_iter, values))
}

/// Pass 2: maps every escaped value through the CDF, the cycle mode and
/// the palette; paints interior pixels `INTERIOR_COLOR`.  Runs the
/// anti-grain blend afterwards when configured.
pub fn colorize(buffer: &SmoothBuffer, palette: &Palette, config: &RenderConfig) -> RgbaImage {
    let cdf = Cdf::build(buffer.values(), buffer.max_iter());
    let mut image = RgbaImage::new(buffer.width() as u32, buffer.height() as u32);

    for (pixel, &v) in image.pixels_mut().zip(buffer.values()) {
        let rgb = if buffer.is_interior(v) {
            INTERIOR_COLOR
        } else {
            let t = config.cycle_mode.apply(cdf.normalize(v));
            let color = palette.color_at(t);
            match config.color_wave {
                Some(wave) => wave.apply(color, v),
                None => color,
            }
        };
        *pixel = Rgba([rgb[0], rgb[1], rgb[2], 255]);
    }

    if let Some(blend) = config.anti_grain {
        anti_grain(&mut image, blend);
    }
    image
}

/// Blends every non-border pixel with its four neighbours:
/// `(1 - blend) * self + blend / 4 * (left + right + up + down)`.
pub fn anti_grain(image: &mut RgbaImage, blend: f64) {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return;
    }
    let original = image.clone();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let neighbours = [
                original.get_pixel(x - 1, y),
                original.get_pixel(x + 1, y),
                original.get_pixel(x, y - 1),
                original.get_pixel(x, y + 1),
            ];
            let here = original.get_pixel(x, y);
            let out = image.get_pixel_mut(x, y);
            for c in 0..3 {
                let mut sum = f64::from(here[c]) * (1.0 - blend);
                for n in &neighbours {
                    sum += f64::from(n[c]) * (blend / 4.0);
                }
                out[c] = sum.round().max(0.0).min(255.0) as u8;
            }
        }
    }
}

/// Renders views of one fractal with one palette.  Picks the direct or
/// adaptive smooth-field producer according to the config.
pub struct Renderer<'a> {
    fractal: &'a Fractal,
    palette: &'a Palette,
    config: &'a RenderConfig,
}

impl<'a> Renderer<'a> {
    /// Builds a renderer.
    pub fn new(fractal: &'a Fractal, palette: &'a Palette, config: &'a RenderConfig) -> Self {
        Renderer {
            fractal,
            palette,
            config,
        }
    }

    /// Whether renders go through the adaptive tile renderer.
    pub fn uses_adaptive(&self) -> bool {
        match self.config.strategy {
            RenderStrategy::Direct => false,
            RenderStrategy::Adaptive => true,
            RenderStrategy::Auto => !self.fractal.is_integer_power(),
        }
    }

    /// The smooth field for a `width`×`height` image of `view`.
    pub fn smooth_field<R: Rng + ?Sized>(
        &self,
        view: &Viewport,
        width: usize,
        height: usize,
        max_iter: usize,
        rng: &mut R,
    ) -> Result<SmoothBuffer> {
        let plane = PlaneMapper::for_view(view, width, height)?;
        if self.uses_adaptive() {
            let adaptive = AdaptiveRenderer::new(
                self.fractal,
                &plane,
                max_iter,
                &self.config.adaptive,
                self.config.threads,
            );
            let (buffer, _tiles) = adaptive.render(rng)?;
            Ok(buffer)
        } else {
            debug!(width, height, max_iter, "direct render");
            smooth_pass(self.fractal, &plane, max_iter, self.config.threads)
        }
    }

    /// A coloured `width`×`height` image of `view`.
    pub fn render<R: Rng + ?Sized>(
        &self,
        view: &Viewport,
        width: usize,
        height: usize,
        max_iter: usize,
        rng: &mut R,
    ) -> Result<RgbaImage> {
        let field = self.smooth_field(view, width, height, max_iter, rng)?;
        Ok(colorize(&field, self.palette, self.config))
    }
}
