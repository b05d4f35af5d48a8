// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time engine.
//!
//! Every fractal this crate knows about is the same iteration,
//! `z -> T(z)^w + c`, starting from `z = 0`, where `w` is a (possibly
//! complex, possibly fractional) power and `T` is one of a handful of
//! transforms applied to the running iterate before exponentiation.
//! The classic Mandelbrot set is `w = 2` with the identity transform;
//! negating the imaginary part gives the Tricorn family, and taking
//! component-wise absolute values gives the Burning Ship family.
//!
//! Integer powers never touch a transcendental function.  Anything
//! else goes through `exp(w * ln z)`.

use num::Complex;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Points whose squared magnitude exceeds this have escaped.  A radius
/// of 16 rather than the textbook 2 keeps the smooth-colouring error
/// negligible.
pub const ESCAPE_RADIUS_SQR: f64 = 256.0;

/// The transform applied to the running iterate before it is raised to
/// the power.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Identity.
    Standard,
    /// Negate the imaginary part (Tricorn-like).
    ConjugateNegation,
    /// Absolute value of both parts (Burning Ship-like).
    AbsoluteValue,
}

impl Variant {
    /// Every variant, in a fixed order.
    pub const ALL: [Variant; 3] = [
        Variant::Standard,
        Variant::ConjugateNegation,
        Variant::AbsoluteValue,
    ];

    /// Applies the variant's transform to an iterate.
    #[inline]
    pub fn apply(self, z: Complex<f64>) -> Complex<f64> {
        match self {
            Variant::Standard => z,
            Variant::ConjugateNegation => Complex::new(z.re, -z.im),
            Variant::AbsoluteValue => Complex::new(z.re.abs(), z.im.abs()),
        }
    }

    /// The short name used on the command line and in metadata.
    pub fn name(self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::ConjugateNegation => "conjugate",
            Variant::AbsoluteValue => "burning-ship",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Variant::Standard),
            "conjugate" | "tricorn" => Ok(Variant::ConjugateNegation),
            "burning-ship" | "burningship" | "absolute" => Ok(Variant::AbsoluteValue),
            _ => Err(Error::InvalidVariant(s.to_string())),
        }
    }
}

/// A power plus the variant transform.  Together these pick one member
/// of the fractal family.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PowerSpec {
    /// The exponent `w` in `z -> T(z)^w + c`.
    pub power: Complex<f64>,
    /// The transform `T`.
    pub variant: Variant,
}

impl PowerSpec {
    /// Builds a spec from the real and imaginary parts of the power.
    pub fn new(real: f64, imag: f64, variant: Variant) -> Self {
        PowerSpec {
            power: Complex::new(real, imag),
            variant,
        }
    }

    /// The classic Mandelbrot set.
    pub fn classic() -> Self {
        PowerSpec::new(2.0, 0.0, Variant::Standard)
    }

    /// Returns the power as an integer when the fast path applies:
    /// real, whole and non-negative.
    pub fn integer_power(&self) -> Option<u32> {
        let re = self.power.re;
        if self.power.im == 0.0 && re >= 0.0 && re.fract() == 0.0 && re <= f64::from(u32::MAX) {
            Some(re as u32)
        } else {
            None
        }
    }

    /// A human-readable name, e.g. `Mandelbrot`, `Multibrot3_conjugate`
    /// or `Power2.37+0.81i`.
    pub fn name(&self) -> String {
        let base = match self.integer_power() {
            Some(2) => "Mandelbrot".to_string(),
            Some(n) => format!("Multibrot{}", n),
            None => format!("Power{:.2}{:+.2}i", self.power.re, self.power.im),
        };
        match self.variant {
            Variant::Standard => base,
            v => format!("{}_{}", base, v.name()),
        }
    }
}

impl Default for PowerSpec {
    fn default() -> Self {
        PowerSpec::classic()
    }
}

impl FromStr for PowerSpec {
    type Err = Error;

    /// Parses `3`, `2.5`, `2.5+0.7i` or `-1.5-0.2i` (whitespace is
    /// ignored).  The variant is always `Standard`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || Error::InvalidPower(s.to_string());

        if let Some(body) = compact.strip_suffix('i') {
            // The sign that separates the two parts is the last one that
            // does not start the string or follow an exponent marker.
            let bytes = body.as_bytes();
            let split = (1..bytes.len())
                .rev()
                .find(|&i| {
                    (bytes[i] == b'+' || bytes[i] == b'-')
                        && bytes[i - 1] != b'e'
                        && bytes[i - 1] != b'E'
                })
                .ok_or_else(invalid)?;
            let re: f64 = body[..split].parse().map_err(|_| invalid())?;
            let im: f64 = body[split..].parse().map_err(|_| invalid())?;
            Ok(PowerSpec::new(re, im, Variant::Standard))
        } else {
            let re: f64 = compact.parse().map_err(|_| invalid())?;
            Ok(PowerSpec::new(re, 0.0, Variant::Standard))
        }
    }
}

impl fmt::Display for PowerSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.power.im == 0.0 {
            write!(f, "{} ({})", self.power.re, self.variant)
        } else {
            write!(f, "{}{:+}i ({})", self.power.re, self.power.im, self.variant)
        }
    }
}

/// The outcome of iterating one point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IterationResult {
    /// How many times the map was applied.
    pub iterations: usize,
    /// Continuous escape index.  Equal to `max_iter` for points in the set.
    pub smooth: f64,
    /// True iff the point never escaped within `max_iter` iterations.
    pub in_set: bool,
}

#[derive(Copy, Clone, Debug)]
enum Kernel {
    Integer(u32),
    General(Complex<f64>),
}

/// An iteration engine for one member of the family.  Resolving the
/// fast path happens once, here, rather than on every point.
#[derive(Copy, Clone, Debug)]
pub struct Fractal {
    spec: PowerSpec,
    kernel: Kernel,
}

impl Fractal {
    /// Builds the engine for a power spec.
    pub fn new(spec: PowerSpec) -> Self {
        let kernel = match spec.integer_power() {
            Some(n) => Kernel::Integer(n),
            None => Kernel::General(spec.power),
        };
        Fractal { spec, kernel }
    }

    /// The power and variant this engine iterates.
    pub fn spec(&self) -> PowerSpec {
        self.spec
    }

    /// Whether this engine runs on the transcendental-free path.
    pub fn is_integer_power(&self) -> bool {
        match self.kernel {
            Kernel::Integer(_) => true,
            Kernel::General(_) => false,
        }
    }

    /// Iterates `c` until it escapes or `max_iter` is reached.
    pub fn iterate(&self, c: Complex<f64>, max_iter: usize) -> IterationResult {
        let variant = self.spec.variant;
        let mut z = Complex::new(0.0, 0.0);
        let mut iterations = 0;

        while z.norm_sqr() <= ESCAPE_RADIUS_SQR && iterations < max_iter {
            let t = variant.apply(z);
            z = match self.kernel {
                Kernel::Integer(n) => integer_power(t, n),
                Kernel::General(w) => complex_power(t, w),
            } + c;
            iterations += 1;
        }

        if iterations == max_iter {
            return IterationResult {
                iterations,
                smooth: max_iter as f64,
                in_set: true,
            };
        }

        IterationResult {
            iterations,
            smooth: smooth_index(iterations, z.norm_sqr()),
            in_set: false,
        }
    }

    /// Convenience wrapper taking the two coordinates separately.
    #[inline]
    pub fn iterate_xy(&self, x0: f64, y0: f64, max_iter: usize) -> IterationResult {
        self.iterate(Complex::new(x0, y0), max_iter)
    }
}

/// Iterates a single point for a spec.  Builds a throwaway engine; hot
/// loops should hold on to a [`Fractal`] instead.
pub fn iterate(x0: f64, y0: f64, max_iter: usize, spec: PowerSpec) -> IterationResult {
    Fractal::new(spec).iterate_xy(x0, y0, max_iter)
}

/// The continuous escape index: `n + 1 - log2(ln|z| / ln 2)`.
#[inline]
pub fn smooth_index(iterations: usize, norm_sqr: f64) -> f64 {
    let log_zn = norm_sqr.ln() / 2.0;
    let nu = (log_zn / std::f64::consts::LN_2).log2();
    iterations as f64 + 1.0 - nu
}

/// `z^n` for a non-negative integer `n` by closed forms up to 4 and
/// repeated multiplication above that.
#[inline]
pub fn integer_power(z: Complex<f64>, n: u32) -> Complex<f64> {
    let (x, y) = (z.re, z.im);
    match n {
        0 => Complex::new(1.0, 0.0),
        1 => z,
        2 => Complex::new(x * x - y * y, 2.0 * x * y),
        3 => {
            let (x2, y2) = (x * x, y * y);
            Complex::new(x2 * x - 3.0 * x * y2, 3.0 * x2 * y - y2 * y)
        }
        4 => {
            let (x2, y2) = (x * x, y * y);
            Complex::new(
                x2 * x2 - 6.0 * x2 * y2 + y2 * y2,
                4.0 * x2 * x * y - 4.0 * x * y2 * y,
            )
        }
        _ => {
            let mut acc = z;
            for _ in 1..n {
                acc = Complex::new(acc.re * x - acc.im * y, acc.re * y + acc.im * x);
            }
            acc
        }
    }
}

/// `z^w` through the principal logarithm.  Zero maps to zero; the
/// logarithm is never evaluated there.
#[inline]
pub fn complex_power(z: Complex<f64>, w: Complex<f64>) -> Complex<f64> {
    if z.re == 0.0 && z.im == 0.0 {
        return Complex::new(0.0, 0.0);
    }
    let ln_z = Complex::new(z.norm().ln(), z.im.atan2(z.re));
    (w * ln_z).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Complex<f64>, b: Complex<f64>) -> bool {
        (a - b).norm() < 1e-9 * (1.0 + b.norm())
    }

    #[test]
    fn zero_iterations_is_in_set() {
        for &(x, y) in &[(0.0, 0.0), (2.0, 2.0), (-100.0, 3.0)] {
            let r = iterate(x, y, 0, PowerSpec::classic());
            assert!(r.in_set);
            assert_eq!(r.smooth, 0.0);
            assert_eq!(r.iterations, 0);
        }
    }

    #[test]
    fn origin_never_escapes() {
        for &max_iter in &[1, 10, 256, 5000] {
            let r = iterate(0.0, 0.0, max_iter, PowerSpec::classic());
            assert!(r.in_set);
            assert_eq!(r.smooth, max_iter as f64);
        }
    }

    #[test]
    fn far_point_escapes_quickly() {
        let r = iterate(2.0, 2.0, 1000, PowerSpec::classic());
        assert!(!r.in_set);
        assert_eq!(r.iterations, 3);
    }

    #[test]
    fn integer_fast_path_matches_repeated_multiplication() {
        let z = Complex::new(0.3, -1.7);
        for n in 0..9u32 {
            let mut expected = Complex::new(1.0, 0.0);
            for _ in 0..n {
                expected = expected * z;
            }
            assert!(close(integer_power(z, n), expected), "n = {}", n);
        }
    }

    #[test]
    fn general_path_agrees_with_integer_path() {
        let z = Complex::new(-0.4, 0.9);
        for n in 1..6u32 {
            let fast = integer_power(z, n);
            let slow = complex_power(z, Complex::new(f64::from(n), 0.0));
            assert!(close(fast, slow), "n = {}", n);
        }
    }

    #[test]
    fn complex_power_guards_zero() {
        let r = complex_power(Complex::new(0.0, 0.0), Complex::new(2.5, 0.7));
        assert_eq!(r, Complex::new(0.0, 0.0));
        assert!(r.re.is_finite() && r.im.is_finite());
    }

    #[test]
    fn fast_path_selection() {
        assert!(Fractal::new(PowerSpec::new(3.0, 0.0, Variant::Standard)).is_integer_power());
        assert!(Fractal::new(PowerSpec::new(0.0, 0.0, Variant::Standard)).is_integer_power());
        assert!(!Fractal::new(PowerSpec::new(2.5, 0.0, Variant::Standard)).is_integer_power());
        assert!(!Fractal::new(PowerSpec::new(2.0, 0.1, Variant::Standard)).is_integer_power());
        assert!(!Fractal::new(PowerSpec::new(-2.0, 0.0, Variant::Standard)).is_integer_power());
    }

    #[test]
    fn variants_transform_the_iterate() {
        let z = Complex::new(-1.5, -2.0);
        assert_eq!(Variant::Standard.apply(z), z);
        assert_eq!(Variant::ConjugateNegation.apply(z), Complex::new(-1.5, 2.0));
        assert_eq!(Variant::AbsoluteValue.apply(z), Complex::new(1.5, 2.0));
    }

    #[test]
    fn variant_changes_the_orbit() {
        // The classic set is symmetric about the real axis; the burning
        // ship is not.  A classic orbit for conj(c) is the conjugate orbit,
        // so membership must match exactly there.
        let ship = Fractal::new(PowerSpec::new(2.0, 0.0, Variant::AbsoluteValue));
        let classic = Fractal::new(PowerSpec::classic());
        let (mut ship_asym, mut classic_asym) = (0, 0);
        for a in 0..40 {
            for b in 0..40 {
                let c = Complex::new(-2.0 + 3.0 * f64::from(a) / 40.0, -1.5 + 3.0 * f64::from(b) / 40.0);
                let mirror = c.conj();
                if ship.iterate(c, 100).in_set != ship.iterate(mirror, 100).in_set {
                    ship_asym += 1;
                }
                if classic.iterate(c, 100).in_set != classic.iterate(mirror, 100).in_set {
                    classic_asym += 1;
                }
            }
        }
        assert!(ship_asym > 0);
        assert_eq!(classic_asym, 0);
    }

    #[test]
    fn smooth_index_is_continuous() {
        let fractal = Fractal::new(PowerSpec::classic());
        let a = fractal.iterate_xy(-0.7435, 0.1314, 1000);
        let b = fractal.iterate_xy(-0.7435 + 1e-12, 0.1314, 1000);
        assert!(!a.in_set);
        assert_eq!(a.iterations, b.iterations);
        assert!((a.smooth - b.smooth).abs() < 1e-6);
    }

    #[test]
    fn parses_power_strings() {
        let p: PowerSpec = "3".parse().unwrap();
        assert_eq!(p.power, Complex::new(3.0, 0.0));
        let p: PowerSpec = "2.5 + 0.7i".parse().unwrap();
        assert_eq!(p.power, Complex::new(2.5, 0.7));
        let p: PowerSpec = "-1.5-0.2i".parse().unwrap();
        assert_eq!(p.power, Complex::new(-1.5, -0.2));
        assert!("banana".parse::<PowerSpec>().is_err());
        assert!("2.5i".parse::<PowerSpec>().is_err());
    }

    #[test]
    fn parses_variants() {
        assert_eq!("burning-ship".parse::<Variant>().unwrap(), Variant::AbsoluteValue);
        assert_eq!("Conjugate".parse::<Variant>().unwrap(), Variant::ConjugateNegation);
        assert!("wobbly".parse::<Variant>().is_err());
    }

    #[test]
    fn names() {
        assert_eq!(PowerSpec::classic().name(), "Mandelbrot");
        assert_eq!(
            PowerSpec::new(3.0, 0.0, Variant::ConjugateNegation).name(),
            "Multibrot3_conjugate"
        );
        assert_eq!(PowerSpec::new(2.5, -0.7, Variant::Standard).name(), "Power2.50-0.70i");
    }
}
