// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run configuration.  Everything here is a plain value with its
//! defaults filled in; nothing downstream looks for a missing key.

use num::Complex;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::crop::AspectTarget;
use crate::iteration::{PowerSpec, Variant};
use crate::regions::DiscoveryConfig;
use crate::render::RenderConfig;
use crate::search::SearchStrategy;

/// Weighted random choice of which fractal to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSelection {
    /// Weight of picking an integer power.
    pub integer_weight: f64,
    /// Weight of picking a complex power.
    pub complex_weight: f64,
    /// Integer powers and their weights.  Their range also bounds the
    /// real part of complex powers.
    pub integer_powers: Vec<(u32, f64)>,
    /// Variants and their weights.
    pub variants: Vec<(Variant, f64)>,
    /// Chance of discovering regions even where seed regions exist.
    pub organic_rate: f64,
}

impl Default for ParameterSelection {
    fn default() -> Self {
        ParameterSelection {
            integer_weight: 0.6,
            complex_weight: 0.4,
            integer_powers: vec![(2, 1.0), (3, 1.0), (4, 1.0)],
            variants: vec![
                (Variant::Standard, 0.7),
                (Variant::ConjugateNegation, 0.15),
                (Variant::AbsoluteValue, 0.15),
            ],
            organic_rate: 0.15,
        }
    }
}

/// Picks one item by weight; falls back to the first item when the
/// weights are unusable.
fn weighted<T: Copy, R: Rng + ?Sized>(items: &[(T, f64)], rng: &mut R) -> Option<T> {
    let first = items.first()?.0;
    match WeightedIndex::new(items.iter().map(|(_, w)| *w)) {
        Ok(dist) => Some(items[dist.sample(rng)].0),
        Err(_) => Some(first),
    }
}

impl ParameterSelection {
    /// Draws a power.  Complex powers take a real part uniformly
    /// between the smallest and largest integer power, and an
    /// imaginary part of magnitude 0.2 to 2 with a random sign.
    pub fn power<R: Rng + ?Sized>(&self, rng: &mut R) -> PowerSpec {
        let integer = weighted(&[(true, self.integer_weight), (false, self.complex_weight)], rng).unwrap_or(true);
        let powers: Vec<(u32, f64)> = self.integer_powers.iter().cloned().filter(|&(_, w)| w > 0.0).collect();
        let variant = weighted(&self.variants, rng).unwrap_or(Variant::Standard);

        if integer {
            let n = weighted(&powers, rng).unwrap_or(2);
            return PowerSpec::new(f64::from(n), 0.0, variant);
        }

        let min = powers.iter().map(|&(n, _)| n).min().unwrap_or(2);
        let max = powers.iter().map(|&(n, _)| n).max().unwrap_or(4);
        let real = f64::from(min) + rng.gen::<f64>() * f64::from(max - min);
        let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
        let imag = sign * (0.2 + rng.gen::<f64>() * 1.8);
        PowerSpec::new(real, imag, variant)
    }

    /// Whether this run discovers its regions regardless of the power.
    pub fn organic<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() < self.organic_rate
    }
}

/// Choices forced from outside instead of drawn at random.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overrides {
    /// Exponent.
    pub power: Option<Complex<f64>>,
    /// Variant.
    pub variant: Option<Variant>,
    /// Palette name.
    pub palette: Option<String>,
    /// Seed region name.
    pub region: Option<String>,
    /// Force region discovery on or off.
    pub organic: Option<bool>,
}

/// Everything one generator run needs.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorConfig {
    /// Side of the square scan render.
    pub scan_resolution: usize,
    /// Iteration cap before zoom and visibility scaling.
    pub base_max_iter: usize,
    /// Extra multiplier on the iteration cap.
    pub max_iter_multiplier: f64,
    /// Ceiling on pixels × iterations across the scan and all crops.
    pub max_total_iterations: f64,
    /// Iteration cap of the visibility pre-check.
    pub precheck_max_iter: usize,
    /// Attempts before giving up.
    pub max_attempts: usize,
    /// Starting zoom is drawn from this range.
    pub initial_zoom: (f64, f64),
    /// How many region names to avoid repeating.
    pub recent_regions: usize,
    /// Device shapes to crop for.
    pub targets: Vec<AspectTarget>,
    /// Colouring and render strategy.
    pub render: RenderConfig,
    /// Random fractal choice.
    pub selection: ParameterSelection,
    /// Region discovery scan.
    pub discovery: DiscoveryConfig,
    /// Replaces every region's zoom strategy when set.
    pub search: Option<SearchStrategy>,
    /// Forced choices.
    pub overrides: Overrides,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            scan_resolution: 1200,
            base_max_iter: 500,
            max_iter_multiplier: 1.0,
            max_total_iterations: 1e11,
            precheck_max_iter: 10_000,
            max_attempts: 30,
            initial_zoom: (10.0, 100.0),
            recent_regions: 5,
            targets: vec![AspectTarget::desktop(), AspectTarget::mobile()],
            render: RenderConfig::default(),
            selection: ParameterSelection::default(),
            discovery: DiscoveryConfig::default(),
            search: None,
            overrides: Overrides::default(),
        }
    }
}

impl GeneratorConfig {
    /// Small scan and crop sizes and a coarse discovery scan, for quick
    /// looks.
    pub fn preview() -> Self {
        let defaults = GeneratorConfig::default();
        GeneratorConfig {
            scan_resolution: 400,
            precheck_max_iter: 2_000,
            targets: defaults.targets.iter().map(|t| t.scaled_to_width(t.out_width / 4)).collect(),
            discovery: DiscoveryConfig::quick(),
            ..defaults
        }
    }

    /// Pixels rendered by one accepted attempt.
    pub fn total_pixels(&self) -> f64 {
        let scan = (self.scan_resolution * self.scan_resolution) as f64;
        let targets: usize = self.targets.iter().map(|t| t.out_width * t.out_height).sum();
        scan + targets as f64
    }
}
