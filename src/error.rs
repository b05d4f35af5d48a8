// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The crate-wide error type.
//!
//! Only conditions a caller has to act on live here.  A candidate view
//! that fails the boundary search or one of the quality gates is not an
//! error; the generator's retry loop absorbs those, and only running out
//! of attempts escalates to [`Error::Exhausted`].

/// Everything that can go wrong between picking parameters and handing
/// back a finished wallpaper.
#[derive(Debug, Fail)]
pub enum Error {
    /// The retry budget ran out without a single accepted candidate.
    #[fail(display = "no candidate passed the quality gates after {} attempts", attempts)]
    Exhausted {
        /// How many attempts were made.
        attempts: usize,
    },

    /// The corners handed to a plane mapper do not describe a rectangle.
    #[fail(display = "invalid plane: {}", _0)]
    InvalidPlane(String),

    /// A power string such as `2.5+0.7i` could not be parsed.
    #[fail(display = "could not parse power: {:?}", _0)]
    InvalidPower(String),

    /// A variant name was not one of the recognised variants.
    #[fail(display = "unknown variant: {:?}", _0)]
    InvalidVariant(String),

    /// A cycle mode name was not one of `clamp`, `reflect` or `modulo`.
    #[fail(display = "unknown cycle mode: {:?}", _0)]
    InvalidCycleMode(String),

    /// A palette was requested by a name nobody knows.
    #[fail(display = "palette {:?} not found", _0)]
    UnknownPalette(String),

    /// A region was requested by a name that is not defined for the fractal.
    #[fail(display = "region {:?} not found for {}", region, fractal)]
    UnknownRegion {
        /// Requested region name.
        region: String,
        /// Name of the fractal the lookup was made for.
        fractal: String,
    },

    /// A palette needs at least one colour stop.
    #[fail(display = "palette {:?} has no colour stops", _0)]
    EmptyPalette(String),

    /// One of the scoped render workers panicked.
    #[fail(display = "a render worker panicked")]
    WorkerPanic,
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
