// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Palettes: ordered RGB stops with an eased blend between neighbours,
//! and the cycle policies that fold a normalised value into `[0, 1]`
//! before lookup.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// An ordered sequence of colour stops.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    /// Name used for lookup and metadata.
    pub name: String,
    stops: Vec<[u8; 3]>,
}

impl Palette {
    /// Builds a palette; at least one stop is required.
    pub fn new(name: &str, stops: Vec<[u8; 3]>) -> Result<Self> {
        if stops.is_empty() {
            return Err(Error::EmptyPalette(name.to_string()));
        }
        Ok(Palette {
            name: name.to_string(),
            stops,
        })
    }

    /// The colour stops.
    pub fn stops(&self) -> &[[u8; 3]] {
        &self.stops
    }

    /// Looks up `t` in `[0, 1]`, blending the two surrounding stops with
    /// a smoothstep ease.  Values past the end land on the last stop.
    pub fn color_at(&self, t: f64) -> [u8; 3] {
        let last = self.stops.len() - 1;
        let position = t.max(0.0) * last as f64;
        let index = position.floor() as usize;
        if index >= last {
            return self.stops[last];
        }
        let frac = position - index as f64;
        let ease = frac * frac * (3.0 - 2.0 * frac);
        let (a, b) = (self.stops[index], self.stops[index + 1]);
        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = f64::from(a[c]) + (f64::from(b[c]) - f64::from(a[c])) * ease;
            out[c] = v.round() as u8;
        }
        out
    }
}

/// How a normalised value outside `[0, 1]` is folded back before lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CycleMode {
    /// Saturate at 1.
    Clamp,
    /// Triangle wave: 0 → 1 → 0 over each period of 2.
    Reflect,
    /// Wrap around.
    Modulo,
}

impl CycleMode {
    /// Folds `t`.
    pub fn apply(self, t: f64) -> f64 {
        match self {
            CycleMode::Clamp => t.min(1.0),
            CycleMode::Reflect => {
                let t = t % 2.0;
                if t > 1.0 {
                    2.0 - t
                } else {
                    t
                }
            }
            CycleMode::Modulo => t % 1.0,
        }
    }
}

impl Default for CycleMode {
    fn default() -> Self {
        CycleMode::Modulo
    }
}

impl fmt::Display for CycleMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            CycleMode::Clamp => "clamp",
            CycleMode::Reflect => "reflect",
            CycleMode::Modulo => "modulo",
        })
    }
}

impl FromStr for CycleMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(CycleMode::Clamp),
            "reflect" => Ok(CycleMode::Reflect),
            "modulo" => Ok(CycleMode::Modulo),
            _ => Err(Error::InvalidCycleMode(s.to_string())),
        }
    }
}

const BUILTIN: &[(&str, &[[u8; 3]])] = &[
    (
        "Fire_Ice",
        &[[5, 5, 20], [40, 20, 80], [80, 60, 140], [180, 40, 80], [220, 80, 40], [240, 160, 60], [255, 220, 140]],
    ),
    (
        "Tropical_Sunset",
        &[[10, 5, 25], [100, 20, 80], [180, 60, 100], [220, 100, 80], [240, 160, 80], [255, 200, 100], [255, 240, 180]],
    ),
    (
        "Ocean_Depths",
        &[[5, 10, 20], [20, 40, 80], [40, 80, 140], [80, 140, 180], [120, 180, 200], [160, 220, 220], [200, 240, 240]],
    ),
    (
        "Northern_Lights",
        &[[5, 10, 30], [40, 60, 120], [60, 120, 160], [100, 180, 180], [140, 200, 140], [180, 220, 100], [220, 240, 160]],
    ),
    (
        "Volcanic_Fury",
        &[[10, 5, 5], [60, 10, 20], [120, 30, 30], [180, 60, 30], [220, 120, 40], [240, 180, 80], [255, 230, 140]],
    ),
    (
        "Cosmic_Nebula",
        &[[5, 5, 15], [60, 20, 80], [100, 40, 120], [140, 80, 140], [180, 120, 160], [200, 160, 200], [220, 200, 240]],
    ),
];

/// The palettes that ship with the crate.
pub fn builtin_palettes() -> Vec<Palette> {
    BUILTIN
        .iter()
        .map(|(name, stops)| Palette {
            name: (*name).to_string(),
            stops: stops.to_vec(),
        })
        .collect()
}

/// Finds a built-in palette by name (case-insensitive).
pub fn palette_by_name(name: &str) -> Result<Palette> {
    builtin_palettes()
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnknownPalette(name.to_string()))
}

/// Picks one of the built-in palettes at random.
pub fn random_palette<R: Rng + ?Sized>(rng: &mut R) -> Palette {
    let palettes = builtin_palettes();
    palettes
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| palettes[0].clone())
}
