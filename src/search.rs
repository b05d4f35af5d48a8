// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The boundary search walks a viewport towards detail.
//!
//! Each step lays a square grid over the neighbourhood of the cursor
//! and scores every grid point by how sharply the escape count changes
//! between it and its four neighbours.  The best point becomes the new
//! cursor and the zoom is multiplied up.  A broad phase covers a wide
//! radius with modest iteration limits; a deep-focus phase then
//! refines with a tighter radius, a denser grid and more iterations.
//! Either phase stops the moment a grid turns up nothing that clears
//! the complexity floor.

use crossbeam::thread::ScopedJoinHandle;
use num::Complex;
use rand::Rng;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::iteration::Fractal;
use crate::planes::Viewport;
use crate::quality::QualityConfig;

/// Splits `[0, 1]` at two uniform cut points and returns the three
/// pieces, so the weights are non-negative and sum to 1.
pub fn random_simplex_weights3<R: Rng + ?Sized>(rng: &mut R) -> [f64; 3] {
    let (a, b) = (rng.gen::<f64>(), rng.gen::<f64>());
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    [lo, hi - lo, 1.0 - hi]
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    min + rng.gen::<f64>() * (max - min)
}

/// How the three scoring terms are mixed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScoreWeights {
    /// Weight of the neighbourhood complexity.
    pub complexity: f64,
    /// Weight of the mean escape count.
    pub avg_iter: f64,
    /// Weight of the closeness to the search centre.
    pub center_bias: f64,
}

impl ScoreWeights {
    /// Weights drawn with [`random_simplex_weights3`].
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let [complexity, avg_iter, center_bias] = random_simplex_weights3(rng);
        ScoreWeights {
            complexity,
            avg_iter,
            center_bias,
        }
    }
}

/// Bounds for the per-step zoom multiplier.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoomMultiplier {
    /// Lower bound.
    pub min: f64,
    /// Upper bound for ordinary steps.
    pub max: f64,
    /// Upper bound when the step found very high complexity.
    pub adaptive_max: f64,
}

/// A fully resolved search strategy.  Built once before a search; the
/// search itself never falls back to other values.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SearchStrategy {
    /// Scoring weights.
    pub weights: ScoreWeights,
    /// Steps in the broad phase.
    pub zoom_steps: usize,
    /// Grid points per side in the broad phase; doubled when deep.
    pub samples: usize,
    /// Zoom multiplier bounds.
    pub multiplier: ZoomMultiplier,
    /// Complexity floor for a candidate point.
    pub min_complexity: f64,
    /// Complexity above which a step may zoom by up to `adaptive_max`.
    pub high_complexity: f64,
    /// Leading broad steps that zoom blindly without sampling.
    pub blind_steps: usize,
    /// Steps in the deep-focus phase.
    pub deep_steps: usize,
    /// Iteration cap while sampling the broad phase.
    pub broad_max_iter: usize,
    /// Iteration cap while sampling the deep-focus phase.
    pub deep_max_iter: usize,
    /// A candidate escaping sooner than this carries no boundary detail.
    pub min_center_iter: usize,
}

impl Default for SearchStrategy {
    fn default() -> Self {
        SearchStrategy {
            weights: ScoreWeights {
                complexity: 0.7,
                avg_iter: 0.25,
                center_bias: 0.05,
            },
            zoom_steps: 10,
            samples: 100,
            multiplier: ZoomMultiplier {
                min: 1.8,
                max: 2.5,
                adaptive_max: 3.5,
            },
            min_complexity: 5.0,
            high_complexity: 30.0,
            blind_steps: 2,
            deep_steps: 10,
            broad_max_iter: 256,
            deep_max_iter: 512,
            min_center_iter: 8,
        }
    }
}

impl SearchStrategy {
    /// The gentler strategy used for non-integer powers, whose
    /// boundaries are expensive to sample and easy to zoom past.  The
    /// number of broad steps is drawn from 8 to 16.
    pub fn complex_power<R: Rng + ?Sized>(rng: &mut R) -> Self {
        SearchStrategy {
            weights: ScoreWeights {
                complexity: 0.75,
                avg_iter: 0.2,
                center_bias: 0.05,
            },
            zoom_steps: rng.gen_range(8, 17),
            samples: 80,
            multiplier: ZoomMultiplier {
                min: 1.2,
                max: 1.4,
                adaptive_max: 2.0,
            },
            blind_steps: 0,
            ..SearchStrategy::default()
        }
    }

    /// The default strategy with randomly partitioned weights.
    pub fn randomized<R: Rng + ?Sized>(rng: &mut R) -> Self {
        SearchStrategy {
            weights: ScoreWeights::random(rng),
            ..SearchStrategy::default()
        }
    }
}

/// The outcome of scoring one grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundaryPoint {
    /// Where the best point is.
    pub point: Complex<f64>,
    /// Its neighbourhood complexity.
    pub complexity: f64,
    /// Its weighted score.
    pub score: f64,
}

/// Which phase a step belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Wide radius, zoom multiplied without sampling.
    Blind,
    /// Wide radius, coarse grid.
    Broad,
    /// Narrow radius, dense grid.
    Deep,
}

/// One accepted step of the walk.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoomStep {
    /// Phase of the step.
    pub phase: Phase,
    /// Complexity of the accepted point, 0 for blind steps.
    pub complexity: f64,
    /// The cursor after the step.
    pub state: Viewport,
}

/// Where the search ended and how it got there.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    /// The final cursor.
    pub state: Viewport,
    /// Whether the zoom grew by more than 2×.  A heuristic for "made
    /// real progress", not a guarantee of an interesting view.
    pub found_good: bool,
    /// Every accepted step in order.
    pub trail: Vec<ZoomStep>,
}

/// Drives the broad and deep-focus zoom walk for one fractal.
pub struct BoundarySearch<'a> {
    fractal: &'a Fractal,
    strategy: SearchStrategy,
    threads: usize,
}

impl<'a> BoundarySearch<'a> {
    /// A search over `fractal`.  The complexity floor is the larger of
    /// the strategy's and the quality config's.
    pub fn new(fractal: &'a Fractal, strategy: SearchStrategy, quality: &QualityConfig, threads: usize) -> Self {
        let mut strategy = strategy;
        strategy.min_complexity = strategy.min_complexity.max(quality.min_complexity_score);
        BoundarySearch {
            fractal,
            strategy,
            threads: threads.max(1),
        }
    }

    /// The strategy in effect.
    pub fn strategy(&self) -> &SearchStrategy {
        &self.strategy
    }

    /// Walks from `start`.
    pub fn search<R: Rng + ?Sized>(&self, start: Viewport, rng: &mut R) -> Result<SearchOutcome> {
        let s = &self.strategy;
        let mut state = start;
        let mut trail = vec![];

        debug!(
            complexity = s.weights.complexity,
            avg_iter = s.weights.avg_iter,
            center_bias = s.weights.center_bias,
            "search weights"
        );

        for step in 0..s.zoom_steps {
            if step < s.blind_steps {
                state.zoom *= uniform(rng, s.multiplier.min, s.multiplier.max);
                debug!(step = step + 1, zoom = state.zoom, "blind zoom");
                trail.push(ZoomStep {
                    phase: Phase::Blind,
                    complexity: 0.0,
                    state,
                });
                continue;
            }

            let radius = 2.0 / state.zoom;
            let found = match self.best_point(state.center, radius, s.samples, s.broad_max_iter)? {
                Some(found) => found,
                None => {
                    debug!(step = step + 1, "no boundary detail, ending broad phase");
                    break;
                }
            };

            let fast = found.complexity > s.high_complexity && step + 3 < s.zoom_steps;
            let upper = if fast { s.multiplier.adaptive_max } else { s.multiplier.max };
            state.center = found.point;
            state.zoom *= uniform(rng, s.multiplier.min, upper);
            debug!(step = step + 1, complexity = found.complexity, zoom = state.zoom, "broad step");
            trail.push(ZoomStep {
                phase: Phase::Broad,
                complexity: found.complexity,
                state,
            });
        }

        for step in 0..s.deep_steps {
            let radius = (0.25 / state.zoom).max(1e-6);
            let found = match self.best_point(state.center, radius, s.samples * 2, s.deep_max_iter)? {
                Some(found) => found,
                None => {
                    debug!(step = step + 1, "no boundary detail, ending deep focus");
                    break;
                }
            };
            state.center = found.point;
            state.zoom *= uniform(rng, s.multiplier.min, s.multiplier.max);
            debug!(step = step + 1, complexity = found.complexity, zoom = state.zoom, "deep step");
            trail.push(ZoomStep {
                phase: Phase::Deep,
                complexity: found.complexity,
                state,
            });
        }

        let found_good = state.zoom > start.zoom * 2.0;
        info!(
            x = state.center.re,
            y = state.center.im,
            zoom = state.zoom,
            found_good,
            steps = trail.len(),
            "search finished"
        );
        Ok(SearchOutcome {
            state,
            found_good,
            trail,
        })
    }

    /// Scores a `samples`×`samples` grid spanning `±radius` around
    /// `center` and returns the best-scoring point, if any point
    /// qualified.  Equal scores resolve to the earliest grid point.
    pub fn best_point(
        &self,
        center: Complex<f64>,
        radius: f64,
        samples: usize,
        max_iter: usize,
    ) -> Result<Option<BoundaryPoint>> {
        if samples == 0 {
            return Ok(None);
        }
        let threads = self.threads.min(samples);
        let rows_per_band = (samples + threads - 1) / threads;

        let bands: Vec<Option<BoundaryPoint>> = crossbeam::scope(|spawner| {
            let handles: Vec<ScopedJoinHandle<Option<BoundaryPoint>>> = (0..samples)
                .step_by(rows_per_band)
                .map(|top| {
                    let rows = top..(top + rows_per_band).min(samples);
                    spawner.spawn(move |_| {
                        let mut best: Option<BoundaryPoint> = None;
                        for sy in rows {
                            for sx in 0..samples {
                                if let Some(found) = self.score_at(center, radius, samples, max_iter, sx, sy) {
                                    if found.score > best.map_or(0.0, |b| b.score) {
                                        best = Some(found);
                                    }
                                }
                            }
                        }
                        best
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().map_err(|_| Error::WorkerPanic))
                .collect::<Result<Vec<_>>>()
        })
        .map_err(|_| Error::WorkerPanic)??;

        // Bands arrive in grid order, so keeping the incumbent on a tie
        // keeps the lowest index.
        let best = bands
            .into_iter()
            .flatten()
            .fold(None, |best: Option<BoundaryPoint>, candidate| match best {
                Some(b) if b.score >= candidate.score => Some(b),
                _ => Some(candidate),
            });
        Ok(best)
    }

    /// The scoring primitive for grid point `(sx, sy)`.
    fn score_at(
        &self,
        center: Complex<f64>,
        radius: f64,
        samples: usize,
        max_iter: usize,
        sx: usize,
        sy: usize,
    ) -> Option<BoundaryPoint> {
        let s = &self.strategy;
        let n = samples as f64;
        let point = Complex::new(
            center.re + (sx as f64 / n - 0.5) * radius * 2.0,
            center.im + (sy as f64 / n - 0.5) * radius * 2.0,
        );

        let here = self.fractal.iterate(point, max_iter);
        if here.in_set || here.iterations < s.min_center_iter {
            return None;
        }

        let delta = radius / n;
        let offsets = [
            Complex::new(delta, 0.0),
            Complex::new(-delta, 0.0),
            Complex::new(0.0, delta),
            Complex::new(0.0, -delta),
        ];
        let escaped: Vec<usize> = offsets
            .iter()
            .map(|offset| self.fractal.iterate(point + offset, max_iter))
            .filter(|r| !r.in_set)
            .map(|r| r.iterations)
            .collect();
        if escaped.len() < 2 {
            return None;
        }

        let complexity: f64 = escaped
            .iter()
            .map(|&i| (here.iterations as f64 - i as f64).abs())
            .sum();
        if complexity < s.min_complexity {
            return None;
        }

        let total: usize = here.iterations + escaped.iter().sum::<usize>();
        let avg_iter = total as f64 / (escaped.len() + 1) as f64;
        let distance = (point - center).norm() / radius;
        let center_bias = 1.0 - distance.min(1.0);

        let score = s.weights.complexity * complexity + s.weights.avg_iter * avg_iter + s.weights.center_bias * center_bias;
        Some(BoundaryPoint {
            point,
            complexity,
            score,
        })
    }
}
