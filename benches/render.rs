// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[macro_use]
extern crate criterion;
extern crate rand;
extern crate wallbrot;

use criterion::Criterion;
use rand::rngs::StdRng;
use rand::SeedableRng;

use wallbrot::adaptive::{AdaptiveConfig, AdaptiveRenderer};
use wallbrot::iteration::{Fractal, PowerSpec, Variant};
use wallbrot::planes::{PlaneMapper, Viewport};
use wallbrot::render::smooth_pass;

fn direct_classic(c: &mut Criterion) {
    let fractal = Fractal::new(PowerSpec::classic());
    let plane = PlaneMapper::for_view(&Viewport::new(-0.75, 0.1, 4.0), 256, 256).unwrap();
    c.bench_function("direct classic 256", move |b| {
        b.iter(|| smooth_pass(&fractal, &plane, 500, 4).unwrap())
    });
}

fn direct_vs_adaptive(c: &mut Criterion) {
    let fractal = Fractal::new(PowerSpec::new(2.5, 0.3, Variant::Standard));
    let plane = PlaneMapper::for_view(&Viewport::new(-0.2, 0.0, 3.0), 192, 192).unwrap();
    let config = AdaptiveConfig::default();
    c.bench_function("direct complex 192", {
        let (fractal, plane) = (fractal, plane.clone());
        move |b| b.iter(|| smooth_pass(&fractal, &plane, 300, 4).unwrap())
    });
    c.bench_function("adaptive complex 192", move |b| {
        let renderer = AdaptiveRenderer::new(&fractal, &plane, 300, &config, 4);
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| renderer.render(&mut rng).unwrap())
    });
}

criterion_group!(benches, direct_classic, direct_vs_adaptive);
criterion_main!(benches);
