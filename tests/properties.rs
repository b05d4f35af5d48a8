// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Invariants checked over generated inputs.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use wallbrot::adaptive::{AdaptiveConfig, AdaptiveRenderer, TileClass};
use wallbrot::iteration::{Fractal, PowerSpec, Variant};
use wallbrot::palette::{builtin_palettes, CycleMode};
use wallbrot::planes::{PlaneMapper, Viewport};
use wallbrot::render::{smooth_pass, Cdf, IN_SET};

fn variant() -> impl Strategy<Value = Variant> {
    prop_oneof![
        Just(Variant::Standard),
        Just(Variant::ConjugateNegation),
        Just(Variant::AbsoluteValue),
    ]
}

proptest! {
    #[test]
    fn cdf_is_a_distribution(
        escaped in prop::collection::vec(0.0f64..100.0, 1..200),
        interior in 0usize..50,
    ) {
        let mut values = escaped.clone();
        values.extend(std::iter::repeat(IN_SET).take(interior));
        let cdf = Cdf::build(&values, 100);

        let bins = cdf.bins();
        prop_assert!(bins.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(bins.iter().all(|&b| b >= 0.0 && b <= 1.0));
        prop_assert_eq!(*bins.last().unwrap(), 1.0);
        for &v in &escaped {
            let t = cdf.normalize(v);
            prop_assert!(t > 0.0 && t <= 1.0);
        }
    }

    #[test]
    fn cycle_modes_fold_into_the_unit_interval(t in 0.0f64..10.0) {
        for mode in &[CycleMode::Clamp, CycleMode::Reflect, CycleMode::Modulo] {
            let folded = mode.apply(t);
            prop_assert!(folded >= 0.0 && folded <= 1.0, "{} folded {} to {}", mode, t, folded);
        }
    }

    #[test]
    fn palette_colours_stay_between_the_stops(t in -1.0f64..2.0, index in 0usize..6) {
        let palettes = builtin_palettes();
        let palette = &palettes[index % palettes.len()];
        let colour = palette.color_at(t);
        for channel in 0..3 {
            let lo = palette.stops().iter().map(|s| s[channel]).min().unwrap();
            let hi = palette.stops().iter().map(|s| s[channel]).max().unwrap();
            prop_assert!(colour[channel] >= lo && colour[channel] <= hi);
        }
    }

    #[test]
    fn smooth_values_are_bounded(
        re in -2.5f64..2.5,
        im in -2.5f64..2.5,
        power_re in 2.0f64..4.0,
        power_im in -2.0f64..2.0,
        variant in variant(),
    ) {
        let fractal = Fractal::new(PowerSpec::new(power_re, power_im, variant));
        let result = fractal.iterate_xy(re, im, 200);
        prop_assert!(result.smooth.is_finite());
        prop_assert!(result.iterations <= 200);
        if result.in_set {
            prop_assert_eq!(result.smooth, 200.0);
        } else {
            prop_assert!(result.smooth < 200.0);
        }
    }

    #[test]
    fn escaped_neighbours_have_close_smooth_values(re in -2.0f64..0.5, im in 1.2f64..2.0) {
        // Escape counts jump by whole iterations between neighbours;
        // the smooth index should not.
        let fractal = Fractal::new(PowerSpec::classic());
        let a = fractal.iterate_xy(re, im, 500);
        let b = fractal.iterate_xy(re + 1e-4, im, 500);
        prop_assume!(!a.in_set && !b.in_set);
        prop_assert!((a.smooth - b.smooth).abs() < 0.05);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn solid_tiles_never_hide_an_escape(
        x in -1.5f64..0.5,
        y in -1.0f64..1.0,
        zoom in 0.5f64..4.0,
        power in 2u32..4,
        seed in any::<u64>(),
    ) {
        let fractal = Fractal::new(PowerSpec::new(f64::from(power), 0.0, Variant::Standard));
        let plane = PlaneMapper::for_view(&Viewport::new(x, y, zoom), 64, 64).unwrap();
        let config = AdaptiveConfig { tile_size: 16, ..AdaptiveConfig::default() };
        let renderer = AdaptiveRenderer::new(&fractal, &plane, 48, &config, 2);
        let (adaptive, tiles) = renderer.render(&mut StdRng::seed_from_u64(seed)).unwrap();
        let direct = smooth_pass(&fractal, &plane, 48, 2).unwrap();

        for tile in tiles.iter().filter(|t| t.class == TileClass::SolidInterior) {
            for py in tile.y..tile.y + tile.h {
                for px in tile.x..tile.x + tile.w {
                    prop_assert!(direct.is_interior(direct.get(px, py)));
                }
            }
        }
        for (&a, &d) in adaptive.values().iter().zip(direct.values()) {
            if !direct.is_interior(d) {
                prop_assert_eq!(a, d);
            }
        }
    }
}
