#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Wallbrot: escape-time fractal wallpapers
//!
//! The Mandelbrot set iterates `z ← z² + c` and colours each point `c`
//! by how quickly `z` runs off to infinity.  Raise `z` to some other
//! power, integer or complex, fold it through a conjugate or an
//! absolute value first, and a whole family of related sets appears,
//! most of which are dull almost everywhere.
//!
//! This crate hunts for the parts that are not.  It starts from a seed
//! region (hand-picked for the classic powers, discovered by a coarse
//! variance scan for the rest), walks inward along the boundary by
//! repeatedly zooming onto the most complex nearby point, and checks
//! the result twice: a cheap sample before any pixels are rendered,
//! then a full analysis of a square scan.  A view that survives both is
//! cropped for each device shape and re-rendered at that device's
//! resolution.  Colouring goes through a histogram-equalised smooth
//! iteration count so that every palette colour gets its share of the
//! picture.
//!
//! Anything that fails along the way is simply thrown away and tried
//! again; see [`Generator::generate`].

#[macro_use]
extern crate failure;
extern crate crossbeam;
extern crate image;
extern crate itertools;
extern crate num;
extern crate num_cpus;
extern crate rand;
extern crate tracing;

pub mod adaptive;
pub mod config;
pub mod crop;
pub mod error;
pub mod generator;
pub mod iteration;
pub mod palette;
pub mod planes;
pub mod quality;
pub mod regions;
pub mod render;
pub mod search;

pub use config::{GeneratorConfig, Overrides, ParameterSelection};
pub use crop::AspectTarget;
pub use error::{Error, Result};
pub use generator::{Generator, Wallpaper};
pub use iteration::{Fractal, PowerSpec, Variant};
pub use palette::Palette;
pub use planes::{PlaneMapper, Viewport};
pub use quality::QualityConfig;
pub use render::{RenderConfig, Renderer};
