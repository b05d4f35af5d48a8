// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Deciding whether a view is worth keeping.
//!
//! Two gates.  The cheap one, [`sample`], iterates a tiny grid straight
//! through the engine and only asks "is enough of this visible?", so
//! that obviously black views never get rendered.  The full one,
//! [`analyze`], looks at a coloured render and measures colour spread,
//! visibility, edge density and how evenly detail fills the frame.
//! Every threshold must hold at once; there is no averaging that lets
//! a strong metric paper over a failing one.
//!
//! The full check only looks at the middle horizontal third of the
//! image.  The top and bottom thirds are mostly cropped away for one
//! device or another, so they say little about framing.

use image::RgbaImage;
use itertools::iproduct;

use crate::iteration::Fractal;
use crate::planes::{ComplexPlane, Pixel, PlaneMapper, Viewport};

/// Brightness at or below this counts as black.
pub const BLACK_FLOOR: f64 = 15.0;
/// Gradient magnitude above which a sample counts as an edge.
pub const EDGE_THRESHOLD: f64 = 30.0;
/// Side of the activity grid.
pub const GRID_SIZE: usize = 5;
/// A grid cell whose non-black share exceeds this is active.
pub const CELL_ACTIVITY_FLOOR: f64 = 0.1;
/// Columns of the pre-check grid.
pub const SAMPLE_COLUMNS: usize = 48;
/// Rows of the pre-check grid.
pub const SAMPLE_ROWS: usize = 27;

const EDGE_STRIDE: usize = 4;
const CELL_STRIDE: usize = 8;
const BUCKET_OCCUPANCY: f64 = 0.001;

/// Minimums a candidate has to meet.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QualityConfig {
    /// Share of non-black pixels (also the pre-check threshold).
    pub min_visible_pixels: f64,
    /// Share of the 256 brightness buckets in use.
    pub min_color_diversity: f64,
    /// Share of strided samples sitting on an edge.
    pub min_edge_density: f64,
    /// Composite geometry score.
    pub min_geometry_score: f64,
    /// Active cells out of 25.
    pub min_active_cells: usize,
    /// Floor for the boundary search's complexity score.
    pub min_complexity_score: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        QualityConfig {
            min_visible_pixels: 0.7,
            min_color_diversity: 0.1,
            min_edge_density: 0.02,
            min_geometry_score: 0.15,
            min_active_cells: 8,
            min_complexity_score: 0.0,
        }
    }
}

/// Result of the cheap pre-check.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VisibilitySample {
    /// Share of grid points that escaped.
    pub visible_ratio: f64,
    /// Whether the ratio clears `min_visible_pixels`.
    pub passes: bool,
}

/// Everything the full check measured.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QualityReport {
    /// Share of non-black pixels.
    pub visible_ratio: f64,
    /// Share of the 256 brightness buckets with non-trivial occupancy.
    pub color_diversity: f64,
    /// Share of strided samples whose gradient exceeds the edge threshold.
    pub edge_density: f64,
    /// Active cells over all cells.
    pub spatial_distribution: f64,
    /// One minus the coefficient of variation of cell activity, floored at 0.
    pub spatial_evenness: f64,
    /// Cells whose activity exceeds the floor.
    pub active_cells: usize,
    /// `0.6·edge + 0.3·distribution + 0.1·evenness`.
    pub geometry_score: f64,
    /// Whether every minimum was met.
    pub passes: bool,
}

/// Spread of detail across the activity grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpatialDistribution {
    /// Active cells over all cells.
    pub score: f64,
    /// One minus the coefficient of variation, floored at 0.
    pub evenness: f64,
    /// Number of active cells.
    pub active_cells: usize,
}

/// Iterates a 48×27 grid over the square `±3.5 / zoom` window and
/// reports the share that escaped.  No pixel buffer is involved.
pub fn sample(
    fractal: &Fractal,
    view: &Viewport,
    max_iter: usize,
    config: &QualityConfig,
) -> VisibilitySample {
    let ComplexPlane(ll, ru) = view.square_bounds();
    let escaped = match PlaneMapper::new(SAMPLE_COLUMNS, SAMPLE_ROWS, ll, ru) {
        Ok(plane) => iproduct!(0..SAMPLE_ROWS, 0..SAMPLE_COLUMNS)
            .filter(|&(row, col)| {
                let c = plane.pixel_to_point(&Pixel(col, row));
                !fractal.iterate(c, max_iter).in_set
            })
            .count(),
        // A degenerate zoom has nothing to look at.
        Err(_) => 0,
    };
    let visible_ratio = escaped as f64 / (SAMPLE_COLUMNS * SAMPLE_ROWS) as f64;
    VisibilitySample {
        visible_ratio,
        passes: visible_ratio >= config.min_visible_pixels,
    }
}

/// Runs the full check over a coloured image.
pub fn analyze(image: &RgbaImage, config: &QualityConfig) -> QualityReport {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let (start, end) = middle_third(height);
    let central = (end - start) * width;

    let mut buckets = [0usize; 256];
    let mut non_black = 0usize;
    for (x, y) in iproduct!(0..width, start..end) {
        let b = brightness(image, x, y);
        buckets[(b as usize).min(255)] += 1;
        if b > BLACK_FLOOR {
            non_black += 1;
        }
    }

    let (color_diversity, visible_ratio) = if central == 0 {
        (0.0, 0.0)
    } else {
        let floor = central as f64 * BUCKET_OCCUPANCY;
        let used = buckets.iter().filter(|&&n| n as f64 > floor).count();
        (used as f64 / 256.0, non_black as f64 / central as f64)
    };

    let edge_density = edge_density(image);
    let spatial = spatial_distribution(image);
    let geometry_score = geometry_score(edge_density, &spatial);

    let passes = color_diversity >= config.min_color_diversity
        && visible_ratio >= config.min_visible_pixels
        && geometry_score >= config.min_geometry_score
        && spatial.active_cells >= config.min_active_cells
        && edge_density >= config.min_edge_density;

    QualityReport {
        visible_ratio,
        color_diversity,
        edge_density,
        spatial_distribution: spatial.score,
        spatial_evenness: spatial.evenness,
        active_cells: spatial.active_cells,
        geometry_score,
        passes,
    }
}

/// The composite geometry score.
pub fn geometry_score(edge_density: f64, spatial: &SpatialDistribution) -> f64 {
    0.6 * edge_density + 0.3 * spatial.score + 0.1 * spatial.evenness
}

/// Samples every fourth pixel of the middle third and compares it with
/// the pixels two to the right and two below.
pub fn edge_density(image: &RgbaImage) -> f64 {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let (start, end) = middle_third(height);
    if width < 5 || end < start + 5 {
        return 0.0;
    }

    let mut edges = 0usize;
    let mut samples = 0usize;
    for y in (start + 2..end - 2).step_by(EDGE_STRIDE) {
        for x in (2..width - 2).step_by(EDGE_STRIDE) {
            let center = brightness(image, x, y);
            let right = brightness(image, x + 2, y);
            let down = brightness(image, x, y + 2);
            if (center - right).abs() + (center - down).abs() > EDGE_THRESHOLD {
                edges += 1;
            }
            samples += 1;
        }
    }

    if samples == 0 {
        0.0
    } else {
        edges as f64 / samples as f64
    }
}

/// Splits the middle third into a 5×5 grid, samples every eighth pixel
/// of each cell and measures how many cells carry detail and how
/// evenly.
pub fn spatial_distribution(image: &RgbaImage) -> SpatialDistribution {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let (start, end) = middle_third(height);
    let cell_w = width / GRID_SIZE;
    let cell_h = (end - start) / GRID_SIZE;

    let activity: Vec<f64> = iproduct!(0..GRID_SIZE, 0..GRID_SIZE)
        .map(|(gy, gx)| {
            let (x0, y0) = (gx * cell_w, start + gy * cell_h);
            let x1 = ((gx + 1) * cell_w).min(width);
            let y1 = (start + (gy + 1) * cell_h).min(end);
            let mut lit = 0usize;
            let mut total = 0usize;
            for y in (y0..y1).step_by(CELL_STRIDE) {
                for x in (x0..x1).step_by(CELL_STRIDE) {
                    if brightness(image, x, y) > BLACK_FLOOR {
                        lit += 1;
                    }
                    total += 1;
                }
            }
            if total > 0 {
                lit as f64 / total as f64
            } else {
                0.0
            }
        })
        .collect();

    let active_cells = activity.iter().filter(|&&a| a > CELL_ACTIVITY_FLOOR).count();
    let n = activity.len() as f64;
    let mean = activity.iter().sum::<f64>() / n;
    let variance = activity.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
    let evenness = if mean > 0.0 {
        1.0 - (variance.sqrt() / mean).min(1.0)
    } else {
        0.0
    };

    SpatialDistribution {
        score: active_cells as f64 / n,
        evenness,
        active_cells,
    }
}

/// Mean of the three colour channels.
#[inline]
pub fn brightness(image: &RgbaImage, x: usize, y: usize) -> f64 {
    let p = image.get_pixel(x as u32, y as u32);
    (f64::from(p[0]) + f64::from(p[1]) + f64::from(p[2])) / 3.0
}

fn middle_third(height: usize) -> (usize, usize) {
    (height / 3, (2 * height) / 3)
}
