// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image space and fractal space.  A `Viewport` says where the camera
//! sits and how far in it is; a `PlaneMapper` pins an image of a given
//! size onto the rectangle of the complex plane that viewport shows.

use num::Complex;

use crate::error::{Error, Result};

/// Half the extent, at zoom 1, of the shorter image axis.  A viewport
/// at zoom `z` spans `2 * VIEW_HALF_EXTENT / z` along that axis.
pub const VIEW_HALF_EXTENT: f64 = 3.5;

/// Describes the width and height of an integral plane that is assumed
/// to start at 0,0.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegralPlane(pub usize, pub usize);

/// Describes the left-lower corner and right-upper corner of the
/// complex plane, treating the real part of each value as the
/// x-component and the imaginary part of each value as the
/// y-component.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ComplexPlane(pub Complex<f64>, pub Complex<f64>);

/// Describes the x, y of a point in a region.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// Where the camera is: a centre on the complex plane and a zoom
/// factor.  This is the search cursor as well as the render target.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Centre of the view.
    pub center: Complex<f64>,
    /// Magnification; 1 shows `±3.5` along the shorter axis.
    pub zoom: f64,
}

impl Viewport {
    /// Builds a viewport.
    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        Viewport {
            center: Complex::new(x, y),
            zoom,
        }
    }

    /// The complex extents covered by an image of the given size.  The
    /// shorter axis spans `±3.5 / zoom`; the longer one is stretched by
    /// the aspect ratio so pixels stay square.
    pub fn bounds(&self, width: usize, height: usize) -> ComplexPlane {
        let base = VIEW_HALF_EXTENT / self.zoom;
        let aspect = width as f64 / height.max(1) as f64;
        let (half_w, half_h) = if aspect > 1.0 {
            (base * aspect, base)
        } else {
            (base, base / aspect)
        };
        ComplexPlane(
            Complex::new(self.center.re - half_w, self.center.im - half_h),
            Complex::new(self.center.re + half_w, self.center.im + half_h),
        )
    }

    /// The square window `±3.5 / zoom` around the centre, regardless
    /// of the sampling grid laid over it.
    pub fn square_bounds(&self) -> ComplexPlane {
        let half = VIEW_HALF_EXTENT / self.zoom;
        ComplexPlane(
            Complex::new(self.center.re - half, self.center.im - half),
            Complex::new(self.center.re + half, self.center.im + half),
        )
    }

    /// The viewport that frames `plane` exactly when rendered at the
    /// given aspect ratio (width / height).  The plane's aspect is
    /// assumed to match.
    pub fn framing(plane: &ComplexPlane, aspect: f64) -> Self {
        let width = plane.1.re - plane.0.re;
        let height = plane.1.im - plane.0.im;
        let shorter = if aspect > 1.0 { height } else { width };
        Viewport {
            center: Complex::new((plane.0.re + plane.1.re) / 2.0, (plane.0.im + plane.1.im) / 2.0),
            zoom: 2.0 * VIEW_HALF_EXTENT / shorter,
        }
    }
}

/// Maps pixels of a `width`×`height` image onto a rectangle of the
/// complex plane.  Row 0 sits on the rectangle's lower imaginary edge.
#[derive(Clone, Debug)]
pub struct PlaneMapper {
    /// Image size in pixels.
    pub integral_plane: IntegralPlane,
    /// Lower-left and upper-right corners on the complex plane.
    pub complex_plane: ComplexPlane,
    // Pixels per unit of the complex plane, along each axis.
    grid_factors: (f64, f64),
}

impl PlaneMapper {
    /// Takes the size of the integral plane and two points describing
    /// the complex plane.
    pub fn new(
        width: usize,
        height: usize,
        leftlower: Complex<f64>,
        rightupper: Complex<f64>,
    ) -> Result<PlaneMapper> {
        if !(rightupper.re > leftlower.re) {
            return Err(Error::InvalidPlane(
                "the left lower corner is not to the left of the right upper corner".to_string(),
            ));
        }

        if !(rightupper.im > leftlower.im) {
            return Err(Error::InvalidPlane(
                "the left lower corner is not lower than the right upper corner".to_string(),
            ));
        }

        let region_width = rightupper.re - leftlower.re;
        let region_height = rightupper.im - leftlower.im;

        let grid_factors = (
            (width as f64) / region_width,
            (height as f64) / region_height,
        );

        Ok(PlaneMapper {
            integral_plane: IntegralPlane(width, height),
            complex_plane: ComplexPlane(leftlower, rightupper),
            grid_factors,
        })
    }

    /// The mapper for an image of the given size looking through a viewport.
    pub fn for_view(view: &Viewport, width: usize, height: usize) -> Result<PlaneMapper> {
        let ComplexPlane(ll, ru) = view.bounds(width, height);
        PlaneMapper::new(width, height, ll, ru)
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.integral_plane.0
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.integral_plane.1
    }

    /// Pixel count.
    pub fn len(&self) -> usize {
        self.integral_plane.0 * self.integral_plane.1
    }

    /// True when either side is zero pixels.
    pub fn is_empty(&self) -> bool {
        self.integral_plane.0 == 0 || self.integral_plane.1 == 0
    }

    /// The complex point at a pixel's lower-left corner.
    #[inline]
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        Complex::new(
            ((pixel.0 as f64) / self.grid_factors.0) + self.complex_plane.0.re,
            ((pixel.1 as f64) / self.grid_factors.1) + self.complex_plane.0.im,
        )
    }

    /// The complex rectangle covered by the pixel rectangle starting at
    /// `(x, y)` with the given size.  Inverse of the mapping the image
    /// was rendered with.
    pub fn pixel_rect_to_plane(&self, x: usize, y: usize, w: usize, h: usize) -> ComplexPlane {
        ComplexPlane(
            self.pixel_to_point(&Pixel(x, y)),
            self.pixel_to_point(&Pixel(x + w, y + h)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planemapper_fails_on_bad_shape() {
        let pm = PlaneMapper::new(4, 4, Complex::new(-1.0, 1.0), Complex::new(1.0, -1.0));
        assert!(pm.is_err());
    }

    #[test]
    fn planemapper_passes_on_good_shape() {
        let pm = PlaneMapper::new(4, 4, Complex::new(-1.0, -1.0), Complex::new(1.0, 1.0));
        assert!(pm.is_ok());
    }

    #[test]
    fn pixel_to_points_on_mixed_planes() {
        let pm = PlaneMapper::new(4, 4, Complex::new(-2.0, -2.0), Complex::new(2.0, 2.0)).unwrap();
        assert_eq!(pm.pixel_to_point(&Pixel(2, 2)), Complex::new(0.0, 0.0));
        assert_eq!(pm.pixel_to_point(&Pixel(0, 0)), Complex::new(-2.0, -2.0));
        assert_eq!(pm.pixel_to_point(&Pixel(4, 4)), Complex::new(2.0, 2.0));
    }

    #[test]
    fn square_view_spans_the_half_extent() {
        let view = Viewport::new(-0.5, 0.0, 1.0);
        let ComplexPlane(ll, ru) = view.bounds(100, 100);
        assert_eq!(ll, Complex::new(-4.0, -3.5));
        assert_eq!(ru, Complex::new(3.0, 3.5));
    }

    #[test]
    fn wide_view_stretches_the_long_axis() {
        let view = Viewport::new(0.0, 0.0, 2.0);
        let ComplexPlane(ll, ru) = view.bounds(200, 100);
        assert!((ru.im - ll.im - 3.5).abs() < 1e-12);
        assert!((ru.re - ll.re - 7.0).abs() < 1e-12);

        let ComplexPlane(ll, ru) = view.bounds(100, 200);
        assert!((ru.re - ll.re - 3.5).abs() < 1e-12);
        assert!((ru.im - ll.im - 7.0).abs() < 1e-12);
    }

    #[test]
    fn framing_inverts_bounds() {
        for &(w, h) in &[(160usize, 90usize), (90, 160), (64, 64)] {
            let view = Viewport::new(-0.74, 0.13, 37.5);
            let plane = view.bounds(w, h);
            let back = Viewport::framing(&plane, w as f64 / h as f64);
            assert!((back.zoom - view.zoom).abs() < 1e-9 * view.zoom);
            assert!((back.center - view.center).norm() < 1e-12);
        }
    }

    #[test]
    fn pixel_rect_round_trips_through_a_view() {
        let pm = PlaneMapper::for_view(&Viewport::new(0.0, 0.0, 1.0), 70, 70).unwrap();
        let ComplexPlane(ll, ru) = pm.pixel_rect_to_plane(0, 0, 70, 70);
        assert!((ll - Complex::new(-3.5, -3.5)).norm() < 1e-12);
        assert!((ru - Complex::new(3.5, 3.5)).norm() < 1e-12);
    }
}
