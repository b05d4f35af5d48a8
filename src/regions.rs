// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Where searches start.  The classic integer powers come with a table
//! of hand-picked seed regions; everything else has its regions found
//! by scanning a coarse grid for cells whose escape times vary the
//! most.

use itertools::iproduct;
use num::Complex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::iteration::{Fractal, PowerSpec, Variant};
use crate::quality::QualityConfig;
use crate::search::{SearchStrategy, ZoomMultiplier};

/// How the search strategy for a region is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionStrategy {
    /// `SearchStrategy::default()`.
    Standard,
    /// `SearchStrategy::complex_power`.
    ComplexPower,
    /// Dense sampling and bold zooms for the Multibrot-4 petals.
    Petal,
}

impl RegionStrategy {
    /// Resolves to a concrete strategy, drawing any random step counts.
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> SearchStrategy {
        match self {
            RegionStrategy::Standard => SearchStrategy::default(),
            RegionStrategy::ComplexPower => SearchStrategy::complex_power(rng),
            RegionStrategy::Petal => SearchStrategy {
                zoom_steps: rng.gen_range(6, 15),
                samples: 200,
                multiplier: ZoomMultiplier {
                    min: 1.8,
                    max: 3.0,
                    adaptive_max: 3.0,
                },
                ..SearchStrategy::default()
            },
        }
    }
}

/// A named place to start searching, with the quality bar that applies
/// to views found from it.
#[derive(Clone, Debug, PartialEq)]
pub struct SeedRegion {
    /// Region name.
    pub name: String,
    /// Where the search starts.
    pub center: Complex<f64>,
    /// Quality thresholds for this region.
    pub quality: QualityConfig,
    /// Search strategy for this region.
    pub strategy: RegionStrategy,
}

fn quality(min_visible_pixels: f64, min_edge_density: f64, min_geometry_score: f64, min_active_cells: usize) -> QualityConfig {
    QualityConfig {
        min_visible_pixels,
        min_edge_density,
        min_geometry_score,
        min_active_cells,
        min_color_diversity: 0.1,
        min_complexity_score: 0.0,
    }
}

// name, x, y, edge, geometry, active
const MANDELBROT: &[(&str, f64, f64, f64, f64, usize)] = &[
    ("Spiral_Valley", -0.7269, 0.1889, 0.02, 0.25, 10),
    ("Elephant_Valley", -0.7453, 0.1127, 0.02, 0.18, 8),
    ("Seahorse_Valley", -0.1607, 1.0376, 0.02, 0.18, 8),
    ("Double_Hook", -0.7902, 0.1608, 0.02, 0.15, 7),
    ("Mini_Elephant", -0.7747, 0.1102, 0.02, 0.14, 6),
    ("Triple_Spiral", 0.2850, 0.0100, 0.02, 0.22, 9),
    ("Seahorse_Tail", -0.1011, 0.9563, 0.005, 0.18, 7),
    ("Baby_Elephant", -0.7500, 0.1000, 0.02, 0.16, 7),
    ("Filament_Region", -0.1600, 1.0405, 0.01, 0.08, 4),
    ("Deep_Spiral", -0.7746, 0.1102, 0.02, 0.23, 9),
    ("Tendril_Garden", -0.1592, 1.0317, 0.01, 0.12, 6),
    ("Eastern_Spiral", 0.3750, 0.2170, 0.02, 0.2, 8),
    ("Southern_Seahorse", -0.1011, -0.9563, 0.005, 0.18, 7),
    ("Northern_Arc", -0.1252, 0.7500, 0.02, 0.16, 7),
    ("Southern_Spiral", -0.7269, -0.1889, 0.02, 0.2, 8),
    ("Lower_Triple", 0.2850, -0.0100, 0.02, 0.21, 9),
    ("Western_Formation", -0.5251, 0.5260, 0.02, 0.18, 8),
    ("Eastern_Edge", 0.3500, 0.0500, 0.02, 0.19, 8),
    ("Upper_Arc", -0.1000, 0.6557, 0.02, 0.16, 7),
    ("Upper_Valley", -0.7010, 0.3842, 0.02, 0.22, 9),
];

const MULTIBROT3: &[(&str, f64, f64, f64, f64, usize)] = &[
    ("Center", 0.0, 0.0, 0.02, 0.18, 8),
    ("Upper_Lobe", 0.0, 0.8, 0.02, 0.20, 8),
    ("Side_Detail", -0.5, 0.5, 0.02, 0.19, 8),
];

const MULTIBROT4: &[(&str, f64, f64)] = &[
    ("Eastern_Petal", 0.5, 0.0),
    ("Northern_Petal", 0.0, 0.55),
    ("Western_Petal", -0.6, 0.0),
    ("Southern_Petal", 0.0, -0.58),
    ("Diagonal_Nexus_NE", 0.42, 0.42),
    ("Diagonal_Nexus_NW", -0.44, 0.44),
    ("Diagonal_Nexus_SE", 0.46, -0.46),
    ("Eastern_Lobe_Upper", 0.52, 0.2),
];

fn from_table(table: &[(&str, f64, f64, f64, f64, usize)]) -> Vec<SeedRegion> {
    table
        .iter()
        .map(|&(name, x, y, edge, geometry, active)| SeedRegion {
            name: name.to_string(),
            center: Complex::new(x, y),
            quality: quality(0.7, edge, geometry, active),
            strategy: RegionStrategy::Standard,
        })
        .collect()
}

/// The hand-picked regions for a spec, if it has any.  Only the
/// standard-variant powers 2, 3 and 4 do.
pub fn known_regions(spec: &PowerSpec) -> Option<Vec<SeedRegion>> {
    if spec.variant != Variant::Standard {
        return None;
    }
    match spec.integer_power() {
        Some(2) => Some(from_table(MANDELBROT)),
        Some(3) => Some(from_table(MULTIBROT3)),
        Some(4) => Some(
            MULTIBROT4
                .iter()
                .map(|&(name, x, y)| SeedRegion {
                    name: name.to_string(),
                    center: Complex::new(x, y),
                    quality: quality(0.6, 0.015, 0.15, 6),
                    strategy: RegionStrategy::Petal,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Looks up a hand-picked region by name (case-insensitive).
pub fn region_by_name(spec: &PowerSpec, name: &str) -> Result<SeedRegion> {
    known_regions(spec)
        .unwrap_or_default()
        .into_iter()
        .find(|r| r.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnknownRegion {
            region: name.to_string(),
            fractal: spec.name(),
        })
}

/// Parameters of the region discovery scan.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DiscoveryConfig {
    /// Centre of the scanned square.
    pub center: Complex<f64>,
    /// Side of the scanned square.
    pub width: f64,
    /// Cells per side.
    pub grid: usize,
    /// Samples per cell side.
    pub subsamples: usize,
    /// Iteration cap for the scan.
    pub max_iter: usize,
    /// Cells below this variance are never regions.
    pub min_variance: f64,
    /// How many regions to keep.
    pub regions: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            center: Complex::new(-0.5, 0.0),
            width: 3.0,
            grid: 12,
            subsamples: 6,
            max_iter: 300,
            min_variance: 5.0,
            regions: 5,
        }
    }
}

impl DiscoveryConfig {
    /// A coarser scan for previews.
    pub fn quick() -> Self {
        DiscoveryConfig {
            grid: 8,
            subsamples: 4,
            max_iter: 150,
            ..DiscoveryConfig::default()
        }
    }
}

/// Escape-time statistics of one scan cell.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CellStats {
    /// Cell centre.
    pub center: Complex<f64>,
    /// Variance of the smooth indices sampled in the cell.
    pub variance: f64,
    /// Their mean.
    pub mean: f64,
    /// Whether any sample stayed in the set.
    pub has_set: bool,
}

/// Samples every cell of the discovery grid.
pub fn analyze_cells(fractal: &Fractal, config: &DiscoveryConfig) -> Vec<CellStats> {
    let cell = config.width / config.grid as f64;
    let x_min = config.center.re - config.width / 2.0;
    let y_min = config.center.im - config.width / 2.0;
    let n = config.subsamples.max(2);
    let cap = config.max_iter as f64;

    iproduct!(0..config.grid, 0..config.grid)
        .map(|(gy, gx)| {
            let center = Complex::new(x_min + (gx as f64 + 0.5) * cell, y_min + (gy as f64 + 0.5) * cell);
            let corner = center - Complex::new(cell / 2.0, cell / 2.0);
            let samples: Vec<f64> = iproduct!(0..n, 0..n)
                .map(|(sy, sx)| {
                    let c = corner
                        + Complex::new(
                            sx as f64 / (n - 1) as f64 * cell,
                            sy as f64 / (n - 1) as f64 * cell,
                        );
                    fractal.iterate(c, config.max_iter).smooth
                })
                .collect();
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64;
            CellStats {
                center,
                variance,
                mean,
                has_set: samples.iter().any(|&s| s == cap),
            }
        })
        .collect()
}

/// The cells worth starting from, highest variance first.  A cell must
/// reach `min_variance` and, unless no cell manages both, contain
/// some of the set.  Of those, only the top quarter by variance is kept.
pub fn interesting_cells(cells: &[CellStats], min_variance: f64, top_n: usize) -> Vec<CellStats> {
    let mut candidates: Vec<CellStats> = cells
        .iter()
        .filter(|c| c.variance >= min_variance && c.has_set)
        .cloned()
        .collect();
    if candidates.is_empty() {
        debug!("no boundary cells, dropping the in-set requirement");
        candidates = cells.iter().filter(|c| c.variance >= min_variance).cloned().collect();
    }

    candidates.sort_by(|a, b| b.variance.partial_cmp(&a.variance).unwrap_or(Ordering::Equal));
    let threshold = candidates
        .get(candidates.len() / 4)
        .map_or(min_variance, |c| c.variance);

    candidates
        .into_iter()
        .filter(|c| c.variance >= threshold)
        .take(top_n)
        .collect()
}

/// Quality bar for a discovered region: stricter for busier cells.
pub fn quality_for_variance(variance: f64) -> QualityConfig {
    let nv = (variance / 60_000.0).min(1.0);
    QualityConfig {
        min_visible_pixels: 0.9,
        min_edge_density: 0.005 + nv * 0.01,
        min_geometry_score: 0.08 + nv * 0.12,
        min_active_cells: (4.0 + nv * 4.0).floor() as usize,
        min_color_diversity: 0.06 + nv * 0.04,
        min_complexity_score: 0.0,
    }
}

/// Finds seed regions by scanning the fractal.  Never returns an empty
/// list: if nothing stands out, the scan centre itself is used.
pub fn discover_regions(fractal: &Fractal, config: &DiscoveryConfig) -> Vec<SeedRegion> {
    let cells = analyze_cells(fractal, config);
    let interesting = interesting_cells(&cells, config.min_variance, config.regions);
    let fractional = !fractal.is_integer_power();

    let mut regions: Vec<SeedRegion> = interesting
        .iter()
        .enumerate()
        .map(|(i, cell)| SeedRegion {
            name: format!("Discovered_{}", i + 1),
            center: cell.center,
            quality: quality_for_variance(cell.variance),
            strategy: RegionStrategy::ComplexPower,
        })
        .collect();

    if regions.is_empty() {
        warn!(fractal = fractal.spec().name().as_str(), "no interesting cells, falling back to the scan centre");
        regions.push(SeedRegion {
            name: "Discovered_Fallback".to_string(),
            center: config.center,
            quality: QualityConfig {
                min_visible_pixels: 0.9,
                min_edge_density: 0.005,
                min_geometry_score: 0.1,
                min_active_cells: 4,
                min_color_diversity: 0.06,
                min_complexity_score: 0.0,
            },
            strategy: RegionStrategy::ComplexPower,
        });
    }

    // Fractional powers have intricate boundaries; insist on seeing them.
    if fractional {
        for region in regions.iter_mut() {
            region.quality.min_edge_density = region.quality.min_edge_density.max(0.05);
        }
    }

    info!(
        fractal = fractal.spec().name().as_str(),
        found = regions.len(),
        "discovered regions"
    );
    regions
}

/// A bounded memory of recently used region names.
#[derive(Clone, Debug)]
pub struct RecentRing {
    capacity: usize,
    names: VecDeque<String>,
}

impl RecentRing {
    /// Remembers up to `capacity` names.
    pub fn new(capacity: usize) -> Self {
        RecentRing {
            capacity,
            names: VecDeque::with_capacity(capacity),
        }
    }

    /// Records a use, forgetting the oldest once full.
    pub fn push(&mut self, name: &str) {
        if self.capacity == 0 {
            return;
        }
        self.names.retain(|n| n != name);
        if self.names.len() == self.capacity {
            self.names.pop_front();
        }
        self.names.push_back(name.to_string());
    }

    /// Whether a name was used recently.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Names in order of use, oldest first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.as_str())
    }

    /// Picks a region at random, avoiding recent ones unless every
    /// region is recent.
    pub fn choose<'r, R: Rng + ?Sized>(&self, regions: &'r [SeedRegion], rng: &mut R) -> Option<&'r SeedRegion> {
        let fresh: Vec<&SeedRegion> = regions.iter().filter(|r| !self.contains(&r.name)).collect();
        if fresh.is_empty() {
            regions.choose(rng)
        } else {
            fresh.choose(rng).cloned()
        }
    }
}
