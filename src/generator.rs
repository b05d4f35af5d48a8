// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The pipeline: pick a fractal, palette and region, walk the zoom
//! search, pre-check the view, render a square scan, gate it on
//! quality, then crop and re-render for every device.  A rejected
//! attempt is simply dropped and a fresh one drawn, up to a ceiling.

use image::RgbaImage;
use rand::Rng;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;
use crate::crop::{select_crops, AspectTarget, CropRectangle};
use crate::error::{Error, Result};
use crate::iteration::{Fractal, PowerSpec};
use crate::palette::{palette_by_name, random_palette, Palette};
use crate::planes::{PlaneMapper, Viewport};
use crate::quality::{self, QualityConfig, QualityReport};
use crate::regions::{discover_regions, known_regions, region_by_name, RecentRing, SeedRegion};
use crate::render::Renderer;
use crate::search::{BoundarySearch, SearchStrategy};

/// Iteration caps never drop below this.
pub const MIN_MAX_ITER: usize = 64;

/// Why an attempt was dropped.  None of these is an error: the
/// generator just tries again.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    /// The zoom walk did not get anywhere.
    Search {
        /// Zoom the walk ended at.
        zoom: f64,
    },
    /// The pre-check saw too much of the set.
    Visibility {
        /// Share of escaped samples.
        visible_ratio: f64,
    },
    /// The scan failed at least one quality threshold.
    Quality(QualityReport),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rejection::Search { zoom } => write!(f, "search stalled at {:.1}x", zoom),
            Rejection::Visibility { visible_ratio } => {
                write!(f, "only {:.1}% of the pre-check escaped", visible_ratio * 100.0)
            }
            Rejection::Quality(report) => write!(
                f,
                "quality gate failed (diversity {:.3}, visible {:.3}, edges {:.3}, geometry {:.3}, cells {})",
                report.color_diversity, report.visible_ratio, report.edge_density, report.geometry_score, report.active_cells
            ),
        }
    }
}

/// The outcome of one stage: a value, or the reason to try again.
pub type Verdict<T> = std::result::Result<T, Rejection>;

/// The visibility scalar `x⁶·e^(x−1)` on `x` clamped to `[0, 1]`.
pub fn visibility_scalar(x: f64) -> f64 {
    let x = x.max(0.0).min(1.0);
    x.powi(6) * (x - 1.0).exp()
}

/// The iteration cap for a view: grows with the zoom, shrinks sharply
/// as the pre-check visibility approaches the minimum, and is then
/// scaled down so the whole attempt stays within the iteration budget.
pub fn iteration_budget(config: &GeneratorConfig, zoom: f64, visible_ratio: f64, min_visible: f64) -> usize {
    let headroom = (1.0 - min_visible).max(std::f64::EPSILON);
    let factor = ((visible_ratio - min_visible) / headroom).max(0.1);
    let base = (config.base_max_iter as f64 * config.max_iter_multiplier * (1.0 + zoom.log10() / 2.0)).floor();
    let mut max_iter = ((base * visibility_scalar(factor)).floor() as usize).max(MIN_MAX_ITER);

    let projected = config.total_pixels() * max_iter as f64;
    if projected > config.max_total_iterations {
        let scaled = ((max_iter as f64 * config.max_total_iterations / projected).floor() as usize).max(MIN_MAX_ITER);
        warn!(projected, from = max_iter, to = scaled, "iteration budget exceeded, scaling down");
        max_iter = scaled;
    }
    max_iter
}

/// Everything one attempt runs with, chosen before any work starts.
#[derive(Clone, Debug)]
pub struct Candidate {
    /// The fractal.
    pub spec: PowerSpec,
    /// The colours.
    pub palette: Palette,
    /// Where the search starts and the quality bar it must clear.
    pub region: SeedRegion,
    /// How the search walks.
    pub strategy: SearchStrategy,
    /// The starting viewport.
    pub start: Viewport,
}

/// A device render.
#[derive(Clone, Debug)]
pub struct RenderedCrop {
    /// The device shape.
    pub target: AspectTarget,
    /// Where the crop sits in the scan.
    pub crop: CropRectangle,
    /// The view it was re-rendered from.
    pub view: Viewport,
    /// The image, at the target's resolution.
    pub image: RgbaImage,
}

/// An accepted view, before it is labelled.
#[derive(Clone, Debug)]
pub struct Rendered {
    /// The scan's view, where the search ended.
    pub view: Viewport,
    /// Iteration cap used for every render.
    pub max_iter: usize,
    /// Quality of the scan.
    pub quality: QualityReport,
    /// The square scan render.
    pub scan: RgbaImage,
    /// One render per device.
    pub crops: Vec<RenderedCrop>,
}

/// What was made and how.
#[derive(Clone, Debug)]
pub struct Metadata {
    /// Attempt that succeeded, from 1.
    pub attempt: usize,
    /// Fractal name.
    pub fractal: String,
    /// Power and variant.
    pub spec: PowerSpec,
    /// Palette name.
    pub palette: String,
    /// Region name.
    pub region: String,
    /// The scan's view.
    pub view: Viewport,
    /// Iteration cap.
    pub max_iter: usize,
    /// Quality of the scan.
    pub quality: QualityReport,
    /// Device name and view per crop.
    pub crops: Vec<(String, Viewport)>,
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "fractal: {}", self.fractal)?;
        writeln!(f, "power: {}", self.spec)?;
        writeln!(f, "palette: {}", self.palette)?;
        writeln!(f, "region: {}", self.region)?;
        writeln!(f, "center: {:.15} {:+.15}i", self.view.center.re, self.view.center.im)?;
        writeln!(f, "zoom: {:.3}", self.view.zoom)?;
        writeln!(f, "max_iter: {}", self.max_iter)?;
        writeln!(f, "attempt: {}", self.attempt)?;
        writeln!(
            f,
            "quality: diversity {:.3} visible {:.3} edges {:.3} spatial {:.3} cells {} geometry {:.3}",
            self.quality.color_diversity,
            self.quality.visible_ratio,
            self.quality.edge_density,
            self.quality.spatial_distribution,
            self.quality.active_cells,
            self.quality.geometry_score
        )?;
        for (name, view) in &self.crops {
            writeln!(
                f,
                "crop {}: center {:.15} {:+.15}i zoom {:.3}",
                name, view.center.re, view.center.im, view.zoom
            )?;
        }
        Ok(())
    }
}

/// A finished wallpaper set.
#[derive(Clone, Debug)]
pub struct Wallpaper {
    /// How it was made.
    pub metadata: Metadata,
    /// The square scan render.
    pub scan: RgbaImage,
    /// One render per device.
    pub crops: Vec<RenderedCrop>,
}

/// Runs attempts until one is accepted.  Holds the recent-region
/// memory across calls so consecutive wallpapers differ.
pub struct Generator {
    config: GeneratorConfig,
    recent: RecentRing,
}

impl Generator {
    /// A generator for a configuration.
    pub fn new(config: GeneratorConfig) -> Self {
        let recent = RecentRing::new(config.recent_regions);
        Generator { config, recent }
    }

    /// The configuration in use.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Regions used lately, oldest first.
    pub fn recent_regions(&self) -> impl Iterator<Item = &str> {
        self.recent.names()
    }

    /// Draws the fractal, palette, region and strategy for one attempt,
    /// honouring the overrides.  Errors only for names that do not exist.
    pub fn prepare<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Candidate> {
        let overrides = &self.config.overrides;
        let mut spec = self.config.selection.power(rng);
        if let Some(power) = overrides.power {
            spec.power = power;
        }
        if let Some(variant) = overrides.variant {
            spec.variant = variant;
        }
        let organic = match overrides.organic {
            Some(organic) => organic,
            None => self.config.selection.organic(rng),
        };

        let palette = match overrides.palette {
            Some(ref name) => palette_by_name(name)?,
            None => random_palette(rng),
        };

        let fractal = Fractal::new(spec);
        let region = match known_regions(&spec) {
            Some(regions) if !organic => match overrides.region {
                Some(ref name) => region_by_name(&spec, name)?,
                None => self.pick(&regions, &spec, rng)?,
            },
            _ => {
                if let Some(ref name) = overrides.region {
                    warn!(region = name.as_str(), "regions are discovered for this fractal, ignoring the forced region");
                }
                let regions = discover_regions(&fractal, &self.config.discovery);
                self.pick(&regions, &spec, rng)?
            }
        };
        self.recent.push(&region.name);

        let strategy = region.strategy.resolve(rng);
        let (low, high) = self.config.initial_zoom;
        let zoom = low + rng.gen::<f64>() * (high - low);
        let start = Viewport {
            center: region.center,
            zoom,
        };

        info!(
            fractal = spec.name().as_str(),
            palette = palette.name.as_str(),
            region = region.name.as_str(),
            zoom,
            "candidate"
        );
        Ok(Candidate {
            spec,
            palette,
            region,
            strategy,
            start,
        })
    }

    fn pick<R: Rng + ?Sized>(&self, regions: &[SeedRegion], spec: &PowerSpec, rng: &mut R) -> Result<SeedRegion> {
        self.recent
            .choose(regions, rng)
            .cloned()
            .ok_or_else(|| Error::UnknownRegion {
                region: "any".to_string(),
                fractal: spec.name(),
            })
    }

    /// Runs one candidate through the whole pipeline.
    pub fn attempt<R: Rng + ?Sized>(&self, candidate: &Candidate, rng: &mut R) -> Result<Verdict<Rendered>> {
        let fractal = Fractal::new(candidate.spec);
        let quality = &candidate.region.quality;
        let search = BoundarySearch::new(&fractal, candidate.strategy, quality, self.config.render.threads);
        let outcome = search.search(candidate.start, rng)?;
        if !outcome.found_good {
            return Ok(Err(Rejection::Search {
                zoom: outcome.state.zoom,
            }));
        }
        self.evaluate(&fractal, &candidate.palette, quality, outcome.state, rng)
    }

    /// Everything after the search: pre-check, scan, quality gate,
    /// crops and final renders.  Nothing is rendered unless the
    /// pre-check passes.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        fractal: &Fractal,
        palette: &Palette,
        quality: &QualityConfig,
        view: Viewport,
        rng: &mut R,
    ) -> Result<Verdict<Rendered>> {
        let sample = quality::sample(fractal, &view, self.config.precheck_max_iter, quality);
        debug!(visible_ratio = sample.visible_ratio, "pre-check");
        if !sample.passes {
            return Ok(Err(Rejection::Visibility {
                visible_ratio: sample.visible_ratio,
            }));
        }

        let max_iter = iteration_budget(&self.config, view.zoom, sample.visible_ratio, quality.min_visible_pixels);
        info!(max_iter, zoom = view.zoom, "rendering scan");

        let size = self.config.scan_resolution;
        let renderer = Renderer::new(fractal, palette, &self.config.render);
        let plane = PlaneMapper::for_view(&view, size, size)?;
        let scan = renderer.render(&view, size, size, max_iter, rng)?;

        let report = quality::analyze(&scan, quality);
        debug!(?report, "scan quality");
        if !report.passes {
            return Ok(Err(Rejection::Quality(report)));
        }

        let mut crops = vec![];
        for chosen in select_crops(&scan, &plane, &self.config.targets, quality) {
            let target = chosen.target;
            info!(
                target = target.name.as_str(),
                width = target.out_width,
                height = target.out_height,
                "rendering crop"
            );
            let image = renderer.render(&chosen.view, target.out_width, target.out_height, max_iter, rng)?;
            crops.push(RenderedCrop {
                target,
                crop: chosen.crop,
                view: chosen.view,
                image,
            });
        }

        Ok(Ok(Rendered {
            view,
            max_iter,
            quality: report,
            scan,
            crops,
        }))
    }

    /// Tries up to `max_attempts` fresh candidates.  Running out is the
    /// one fatal outcome.
    pub fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Wallpaper> {
        let attempts = self.config.max_attempts;
        for attempt in 1..=attempts {
            info!(attempt, of = attempts, "attempt");
            let candidate = self.prepare(rng)?;
            let candidate = match self.config.search {
                Some(strategy) => Candidate { strategy, ..candidate },
                None => candidate,
            };
            match self.attempt(&candidate, rng)? {
                Ok(rendered) => {
                    let metadata = Metadata {
                        attempt,
                        fractal: candidate.spec.name(),
                        spec: candidate.spec,
                        palette: candidate.palette.name.clone(),
                        region: candidate.region.name.clone(),
                        view: rendered.view,
                        max_iter: rendered.max_iter,
                        quality: rendered.quality,
                        crops: rendered
                            .crops
                            .iter()
                            .map(|c| (c.target.name.clone(), c.view))
                            .collect(),
                    };
                    info!(attempt, fractal = metadata.fractal.as_str(), "accepted");
                    return Ok(Wallpaper {
                        metadata,
                        scan: rendered.scan,
                        crops: rendered.crops,
                    });
                }
                Err(rejection) => info!(attempt, reason = %rejection, "rejected"),
            }
        }
        Err(Error::Exhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iteration::Variant;
    use num::Complex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lenient() -> QualityConfig {
        QualityConfig {
            min_visible_pixels: 0.0,
            min_color_diversity: 0.0,
            min_edge_density: 0.0,
            min_geometry_score: 0.0,
            min_active_cells: 0,
            min_complexity_score: 0.0,
        }
    }

    fn small_config() -> GeneratorConfig {
        let mut config = GeneratorConfig::default();
        config.scan_resolution = 96;
        config.base_max_iter = 100;
        config.precheck_max_iter = 300;
        config.targets = vec![
            AspectTarget::desktop().scaled_to_width(64),
            AspectTarget::mobile().scaled_to_width(36),
        ];
        config.render.threads = 2;
        config
    }

    #[test]
    fn visibility_scalar_spans_zero_to_one() {
        assert_eq!(visibility_scalar(0.0), 0.0);
        assert_eq!(visibility_scalar(1.0), 1.0);
        assert_eq!(visibility_scalar(2.0), 1.0);
        assert!(visibility_scalar(0.5) < visibility_scalar(0.9));
    }

    #[test]
    fn budget_follows_zoom_and_visibility() {
        let config = GeneratorConfig::default();
        assert_eq!(iteration_budget(&config, 1.0, 1.0, 0.7), 500);
        assert!(iteration_budget(&config, 1e6, 1.0, 0.7) > iteration_budget(&config, 1e3, 1.0, 0.7));
        // Barely visible views get the floor.
        assert_eq!(iteration_budget(&config, 1e6, 0.7, 0.7), MIN_MAX_ITER);
    }

    #[test]
    fn budget_scales_down_to_the_ceiling() {
        let mut config = GeneratorConfig::default();
        config.max_total_iterations = 5e9;
        // 20314368 pixels at 500 iterations is about 1.0e10.
        assert_eq!(iteration_budget(&config, 1.0, 1.0, 0.7), 246);
        config.max_total_iterations = 1e6;
        assert_eq!(iteration_budget(&config, 1.0, 1.0, 0.7), MIN_MAX_ITER);
    }

    #[test]
    fn black_views_fail_the_precheck() {
        let generator = Generator::new(small_config());
        let fractal = Fractal::new(PowerSpec::classic());
        let palette = random_palette(&mut StdRng::seed_from_u64(3));
        let view = Viewport::new(-0.1, 0.0, 1e4);
        let verdict = generator
            .evaluate(&fractal, &palette, &QualityConfig::default(), view, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(verdict.unwrap_err(), Rejection::Visibility { visible_ratio: 0.0 });
    }

    #[test]
    fn accepted_views_get_a_render_per_target() {
        let generator = Generator::new(small_config());
        let fractal = Fractal::new(PowerSpec::classic());
        let palette = palette_by_name("Fire_Ice").unwrap();
        let view = Viewport::new(-0.75, 0.1, 4.0);
        let rendered = generator
            .evaluate(&fractal, &palette, &lenient(), view, &mut StdRng::seed_from_u64(5))
            .unwrap()
            .unwrap();

        assert_eq!(rendered.view, view);
        assert!(rendered.max_iter >= MIN_MAX_ITER);
        assert_eq!(rendered.scan.dimensions(), (96, 96));
        assert_eq!(rendered.crops.len(), 2);
        assert_eq!(rendered.crops[0].image.dimensions(), (64, 36));
        assert_eq!(rendered.crops[1].image.dimensions(), (36, 64));
        for crop in &rendered.crops {
            assert!(crop.view.zoom >= view.zoom);
        }
    }

    #[test]
    fn stalled_searches_exhaust_the_attempts() {
        let mut config = small_config();
        config.max_attempts = 3;
        config.search = Some(SearchStrategy {
            zoom_steps: 0,
            blind_steps: 0,
            deep_steps: 0,
            ..SearchStrategy::default()
        });
        config.overrides.power = Some(Complex::new(2.0, 0.0));
        config.overrides.variant = Some(Variant::Standard);
        config.overrides.organic = Some(false);

        let mut generator = Generator::new(config);
        match generator.generate(&mut StdRng::seed_from_u64(11)) {
            Err(Error::Exhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {:?}", other.map(|w| w.metadata)),
        }
        assert_eq!(generator.recent_regions().count(), 3);
    }

    #[test]
    fn forced_names_are_checked() {
        let mut config = small_config();
        config.overrides.palette = Some("No Such Palette".to_string());
        let mut generator = Generator::new(config);
        assert!(generator.prepare(&mut StdRng::seed_from_u64(1)).is_err());

        let mut config = small_config();
        config.overrides.power = Some(Complex::new(2.0, 0.0));
        config.overrides.variant = Some(Variant::Standard);
        config.overrides.organic = Some(false);
        config.overrides.region = Some("spiral_valley".to_string());
        let mut generator = Generator::new(config);
        let candidate = generator.prepare(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(candidate.region.name, "Spiral_Valley");
        assert!(candidate.start.zoom >= 10.0 && candidate.start.zoom <= 100.0);
    }
}
