// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The adaptive tile renderer.  For powers off the fast path every
//! iteration costs a logarithm and an exponential, and a deep interior
//! view can spend nearly all of its time proving that black pixels are
//! black.  So: sample every k-th pixel first, mark tiles whose samples
//! all sat at the cap as candidates, check each candidate with a few
//! random pixels and its rim, and only then skip it.

use rand::Rng;
use tracing::debug;

use crate::error::Result;
use crate::iteration::Fractal;
use crate::planes::{Pixel, PlaneMapper};
use crate::render::{fill_rows, SmoothBuffer};

/// Knobs for the adaptive renderer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AdaptiveConfig {
    /// Distance between sparse samples, in pixels.
    pub sparse_step: usize,
    /// Tile edge length, in pixels.
    pub tile_size: usize,
    /// Random pixels checked per candidate tile.
    pub verify_samples: usize,
    /// Also iterate every pixel on a candidate's border.
    pub verify_rim: bool,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        AdaptiveConfig {
            sparse_step: 4,
            tile_size: 32,
            verify_samples: 8,
            verify_rim: true,
        }
    }
}

/// Where a tile stands in the classify, verify, commit sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TileClass {
    /// Not looked at yet.
    Unclassified,
    /// Every sparse sample inside sat at the cap.
    SolidInteriorCandidate,
    /// Verified; filled without iterating.
    SolidInterior,
    /// Iterated pixel by pixel.
    NeedsCompute,
}

/// A rectangle of the image.  Edge tiles may be smaller than the
/// configured size.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tile {
    /// Left column.
    pub x: usize,
    /// Top row.
    pub y: usize,
    /// Width.
    pub w: usize,
    /// Height.
    pub h: usize,
    /// Current classification.
    pub class: TileClass,
}

impl Tile {
    fn rim(&self) -> impl Iterator<Item = Pixel> {
        let Tile { x, y, w, h, .. } = *self;
        let horizontal = (x..x + w).flat_map(move |px| vec![Pixel(px, y), Pixel(px, y + h - 1)]);
        let vertical = (y..y + h).flat_map(move |py| vec![Pixel(x, py), Pixel(x + w - 1, py)]);
        horizontal.chain(vertical)
    }
}

/// Cuts a `width`×`height` image into row-major tiles.
pub fn tile_grid(width: usize, height: usize, tile_size: usize) -> Vec<Tile> {
    let size = tile_size.max(1);
    let mut tiles = vec![];
    for y in (0..height).step_by(size) {
        for x in (0..width).step_by(size) {
            tiles.push(Tile {
                x,
                y,
                w: size.min(width - x),
                h: size.min(height - y),
                class: TileClass::Unclassified,
            });
        }
    }
    tiles
}

/// The sparse pre-sample: the smooth value at every `step`-th pixel.
#[derive(Clone, Debug)]
pub struct SparseGrid {
    step: usize,
    columns: usize,
    rows: usize,
    values: Vec<f64>,
}

impl SparseGrid {
    /// Value of sample `(sx, sy)`.
    pub fn get(&self, sx: usize, sy: usize) -> f64 {
        self.values[sy * self.columns + sx]
    }

    /// Samples per row and per column.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }
}

/// Counters from one adaptive render.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TileStats {
    /// Tiles in the image.
    pub tiles: usize,
    /// Tiles that survived sparse classification.
    pub candidates: usize,
    /// Candidates that survived verification.
    pub solid: usize,
    /// Candidates that verification threw out.
    pub rejected: usize,
    /// Pixels filled without iterating.
    pub skipped_pixels: usize,
}

impl TileStats {
    /// Tallies a verified tile set from `verify`'s `(confirmed, rejected)`.
    pub fn of(tiles: &[Tile], (confirmed, rejected): (usize, usize)) -> Self {
        TileStats {
            tiles: tiles.len(),
            candidates: confirmed + rejected,
            solid: confirmed,
            rejected,
            skipped_pixels: tiles
                .iter()
                .filter(|t| t.class == TileClass::SolidInterior)
                .map(|t| t.w * t.h)
                .sum(),
        }
    }
}

/// One adaptive render of a plane.
pub struct AdaptiveRenderer<'a> {
    fractal: &'a Fractal,
    plane: &'a PlaneMapper,
    max_iter: usize,
    config: &'a AdaptiveConfig,
    threads: usize,
}

impl<'a> AdaptiveRenderer<'a> {
    /// Sets up a render.
    pub fn new(
        fractal: &'a Fractal,
        plane: &'a PlaneMapper,
        max_iter: usize,
        config: &'a AdaptiveConfig,
        threads: usize,
    ) -> Self {
        AdaptiveRenderer {
            fractal,
            plane,
            max_iter,
            config,
            threads,
        }
    }

    fn cap_value(&self, pixel: Pixel) -> f64 {
        self.fractal.iterate(self.plane.pixel_to_point(&pixel), self.max_iter).smooth
    }

    fn is_interior(&self, pixel: Pixel) -> bool {
        self.fractal.iterate(self.plane.pixel_to_point(&pixel), self.max_iter).in_set
    }

    /// Phase 1: iterate every `sparse_step`-th pixel.
    pub fn sparse_sample(&self) -> Result<SparseGrid> {
        let step = self.config.sparse_step.max(1);
        let (width, height) = (self.plane.width(), self.plane.height());
        let columns = (width + step - 1) / step;
        let rows = (height + step - 1) / step;

        let mut values = vec![0.0; columns * rows];
        fill_rows(&mut values, columns, self.threads, |Pixel(sx, sy)| {
            let px = (sx * step).min(width - 1);
            let py = (sy * step).min(height - 1);
            self.cap_value(Pixel(px, py))
        })?;
        Ok(SparseGrid {
            step,
            columns,
            rows,
            values,
        })
    }

    /// Phase 2: a tile becomes a candidate iff it holds at least one
    /// sparse sample and every one of them sat at the cap.
    pub fn classify(&self, sparse: &SparseGrid, tiles: &mut [Tile]) {
        let threshold = self.max_iter as f64 - 0.1;
        for tile in tiles.iter_mut() {
            let sx0 = tile.x / sparse.step;
            let sy0 = tile.y / sparse.step;
            let sx1 = (sx0 + (tile.w + sparse.step - 1) / sparse.step).min(sparse.columns);
            let sy1 = (sy0 + (tile.h + sparse.step - 1) / sparse.step).min(sparse.rows);

            let mut seen = false;
            let mut all_capped = true;
            for sy in sy0..sy1 {
                for sx in sx0..sx1 {
                    seen = true;
                    all_capped &= sparse.get(sx, sy) >= threshold;
                }
            }
            tile.class = if seen && all_capped {
                TileClass::SolidInteriorCandidate
            } else {
                TileClass::NeedsCompute
            };
        }
    }

    /// Phase 2b: every candidate is re-checked at random pixels (and
    /// along its rim when configured).  Any escape sends it back to
    /// `NeedsCompute`.  Returns `(confirmed, rejected)`.
    pub fn verify<R: Rng + ?Sized>(&self, tiles: &mut [Tile], rng: &mut R) -> (usize, usize) {
        let (mut confirmed, mut rejected) = (0, 0);
        for tile in tiles.iter_mut().filter(|t| t.class == TileClass::SolidInteriorCandidate) {
            let mut solid = (0..self.config.verify_samples).all(|_| {
                let px = rng.gen_range(tile.x, tile.x + tile.w);
                let py = rng.gen_range(tile.y, tile.y + tile.h);
                self.is_interior(Pixel(px, py))
            });
            if solid && self.config.verify_rim {
                solid = tile.rim().all(|pixel| self.is_interior(pixel));
            }

            if solid {
                tile.class = TileClass::SolidInterior;
                confirmed += 1;
            } else {
                tile.class = TileClass::NeedsCompute;
                rejected += 1;
            }
        }
        (confirmed, rejected)
    }

    /// Phase 3: fills solid tiles with the cap and iterates the rest.
    pub fn fill(&self, tiles: &[Tile]) -> Result<SmoothBuffer> {
        let (width, height) = (self.plane.width(), self.plane.height());
        let size = self.config.tile_size.max(1);
        let tiles_across = (width + size - 1) / size;
        let cap = self.max_iter as f64;

        let mut values = vec![0.0; width * height];
        fill_rows(&mut values, width, self.threads, |pixel| {
            let tile = &tiles[(pixel.1 / size) * tiles_across + pixel.0 / size];
            if tile.class == TileClass::SolidInterior {
                cap
            } else {
                self.cap_value(pixel).max(0.0)
            }
        })?;
        Ok(SmoothBuffer::from_values(width, height, self.max_iter, values))
    }

    /// All phases.  Interior pixels hold `max_iter` in the returned
    /// buffer; the final tile classification comes back alongside it.
    pub fn render<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(SmoothBuffer, Vec<Tile>)> {
        let mut tiles = tile_grid(self.plane.width(), self.plane.height(), self.config.tile_size);
        if tiles.is_empty() {
            let buffer = SmoothBuffer::from_values(self.plane.width(), self.plane.height(), self.max_iter, vec![]);
            return Ok((buffer, tiles));
        }

        let sparse = self.sparse_sample()?;
        self.classify(&sparse, &mut tiles);
        let verdicts = self.verify(&mut tiles, rng);

        let stats = TileStats::of(&tiles, verdicts);
        debug!(
            tiles = stats.tiles,
            candidates = stats.candidates,
            solid = stats.solid,
            rejected = stats.rejected,
            skipped_pixels = stats.skipped_pixels,
            "adaptive tiles"
        );

        let buffer = self.fill(&tiles)?;
        Ok((buffer, tiles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iteration::{PowerSpec, Variant};
    use crate::planes::Viewport;
    use crate::render::smooth_pass;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn tiles_cover_the_image_once() {
        let tiles = tile_grid(70, 40, 32);
        assert_eq!(tiles.len(), 6);
        let area: usize = tiles.iter().map(|t| t.w * t.h).sum();
        assert_eq!(area, 70 * 40);
        assert_eq!((tiles[2].w, tiles[2].h), (6, 32));
        assert_eq!((tiles[5].w, tiles[5].h), (6, 8));
    }

    #[test]
    fn rim_walks_the_border() {
        let tile = Tile {
            x: 2,
            y: 3,
            w: 4,
            h: 3,
            class: TileClass::Unclassified,
        };
        let rim: Vec<Pixel> = tile.rim().collect();
        assert!(rim.contains(&Pixel(2, 3)));
        assert!(rim.contains(&Pixel(5, 5)));
        assert!(rim.contains(&Pixel(5, 4)));
        assert!(!rim.contains(&Pixel(3, 4)));
    }

    fn interior_view() -> (Fractal, PlaneMapper) {
        // Deep inside the main cardioid: everything is interior.
        let fractal = Fractal::new(PowerSpec::classic());
        let plane = PlaneMapper::for_view(&Viewport::new(-0.1, 0.0, 200.0), 64, 64).unwrap();
        (fractal, plane)
    }

    #[test]
    fn solid_view_skips_every_tile() {
        let (fractal, plane) = interior_view();
        let config = AdaptiveConfig::default();
        let renderer = AdaptiveRenderer::new(&fractal, &plane, 100, &config, 2);
        let mut rng = StdRng::seed_from_u64(8);
        let (buffer, tiles) = renderer.render(&mut rng).unwrap();
        assert!(tiles.iter().all(|t| t.class == TileClass::SolidInterior));
        assert!(buffer.values().iter().all(|&v| v == 100.0));
    }

    #[test]
    fn matches_the_direct_renderer() {
        let fractal = Fractal::new(PowerSpec::new(2.5, 0.0, Variant::Standard));
        let plane = PlaneMapper::for_view(&Viewport::new(0.0, 0.0, 5.0), 96, 80).unwrap();
        let config = AdaptiveConfig {
            tile_size: 16,
            ..AdaptiveConfig::default()
        };
        let renderer = AdaptiveRenderer::new(&fractal, &plane, 60, &config, 3);
        let mut rng = StdRng::seed_from_u64(21);
        let (adaptive, tiles) = renderer.render(&mut rng).unwrap();
        let direct = smooth_pass(&fractal, &plane, 60, 3).unwrap();

        assert!(tiles.iter().any(|t| t.class == TileClass::SolidInterior));
        assert!(tiles.iter().any(|t| t.class == TileClass::NeedsCompute));
        for (&a, &d) in adaptive.values().iter().zip(direct.values()) {
            if direct.is_interior(d) {
                assert!(adaptive.is_interior(a));
            } else {
                assert_eq!(a, d);
            }
        }
    }

    #[test]
    fn a_single_escape_rejects_a_candidate() {
        let (fractal, plane) = interior_view();
        let config = AdaptiveConfig::default();
        let renderer = AdaptiveRenderer::new(&fractal, &plane, 100, &config, 1);
        // Pretend a tile far outside the set is a candidate.
        let outside = PlaneMapper::for_view(&Viewport::new(3.0, 3.0, 5.0), 64, 64).unwrap();
        let far = AdaptiveRenderer::new(&fractal, &outside, 100, &config, 1);
        let mut tiles = tile_grid(64, 64, 32);
        for t in tiles.iter_mut() {
            t.class = TileClass::SolidInteriorCandidate;
        }
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(far.verify(&mut tiles, &mut rng), (0, 4));
        assert!(tiles.iter().all(|t| t.class == TileClass::NeedsCompute));

        for t in tiles.iter_mut() {
            t.class = TileClass::SolidInteriorCandidate;
        }
        assert_eq!(renderer.verify(&mut tiles, &mut rng), (4, 0));
    }

    #[test]
    fn stats_count_verification_outcomes() {
        let (fractal, plane) = interior_view();
        let config = AdaptiveConfig::default();
        let renderer = AdaptiveRenderer::new(&fractal, &plane, 100, &config, 1);
        let mut rng = StdRng::seed_from_u64(5);
        let mut tiles = tile_grid(64, 64, 32);
        for t in tiles.iter_mut().take(3) {
            t.class = TileClass::SolidInteriorCandidate;
        }

        let verdicts = renderer.verify(&mut tiles, &mut rng);
        let stats = TileStats::of(&tiles, verdicts);
        assert_eq!(stats.tiles, 4);
        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.solid, 3);
        assert_eq!(stats.skipped_pixels, 3 * 32 * 32);

        let outside = PlaneMapper::for_view(&Viewport::new(3.0, 3.0, 5.0), 64, 64).unwrap();
        let far = AdaptiveRenderer::new(&fractal, &outside, 100, &config, 1);
        let mut tiles = tile_grid(64, 64, 32);
        for t in tiles.iter_mut().take(2) {
            t.class = TileClass::SolidInteriorCandidate;
        }
        let verdicts = far.verify(&mut tiles, &mut rng);
        let stats = TileStats::of(&tiles, verdicts);
        assert_eq!((stats.candidates, stats.solid, stats.rejected), (2, 0, 2));
        assert_eq!(stats.skipped_pixels, 0);
    }
}
