// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Picks the best sub-rectangle of a scan for each device shape and
//! turns it back into a viewport, so each device gets its own render
//! at native resolution instead of an upscaled slice of the scan.

use image::RgbaImage;
use tracing::{debug, info};

use crate::planes::{PlaneMapper, Viewport};
use crate::quality::{analyze, QualityConfig, QualityReport};

/// Candidate offsets per axis.
pub const CROP_GRID: usize = 6;

/// A device shape and the resolution it is rendered at.
#[derive(Clone, Debug, PartialEq)]
pub struct AspectTarget {
    /// Used in file names and logs.
    pub name: String,
    /// Aspect numerator.
    pub aspect_width: u32,
    /// Aspect denominator.
    pub aspect_height: u32,
    /// Output width in pixels.
    pub out_width: usize,
    /// Output height in pixels.
    pub out_height: usize,
}

impl AspectTarget {
    /// 16:9 at 4096×2304.
    pub fn desktop() -> Self {
        AspectTarget {
            name: "desktop".to_string(),
            aspect_width: 16,
            aspect_height: 9,
            out_width: 4096,
            out_height: 2304,
        }
    }

    /// 9:16 at 2304×4096.
    pub fn mobile() -> Self {
        AspectTarget {
            name: "mobile".to_string(),
            aspect_width: 9,
            aspect_height: 16,
            out_width: 2304,
            out_height: 4096,
        }
    }

    /// Width over height.
    pub fn aspect(&self) -> f64 {
        f64::from(self.aspect_width) / f64::from(self.aspect_height)
    }

    /// The same shape at a different output width.
    pub fn scaled_to_width(&self, out_width: usize) -> Self {
        AspectTarget {
            out_width,
            out_height: (out_width as f64 / self.aspect()).round() as usize,
            ..self.clone()
        }
    }
}

/// A pixel rectangle inside an image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect {
    /// Left column.
    pub x: usize,
    /// Top row.
    pub y: usize,
    /// Width.
    pub w: usize,
    /// Height.
    pub h: usize,
}

impl Rect {
    /// Area in pixels.
    pub fn area(&self) -> usize {
        self.w * self.h
    }
}

/// The winning crop for one target.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CropRectangle {
    /// Where it sits in the scan.
    pub rect: Rect,
    /// Weighted score, centre bias included.
    pub score: f64,
    /// Quality of the cropped pixels.
    pub quality: QualityReport,
}

/// The largest `aspect`-shaped rectangle that fits in the image.
pub fn largest_crop(width: usize, height: usize, aspect: f64) -> (usize, usize) {
    let image_aspect = width as f64 / height as f64;
    if image_aspect > aspect {
        ((height as f64 * aspect).floor() as usize, height)
    } else {
        (width, (width as f64 / aspect).floor() as usize)
    }
}

fn extract(image: &RgbaImage, rect: &Rect) -> RgbaImage {
    RgbaImage::from_fn(rect.w as u32, rect.h as u32, |x, y| {
        *image.get_pixel(rect.x as u32 + x, rect.y as u32 + y)
    })
}

/// Tries a `CROP_GRID`×`CROP_GRID` set of offsets for a `crop_w`×`crop_h`
/// window and keeps the best.  Crops are ranked, not gated: the scan
/// already passed, so the best-scoring window wins even if it would
/// fail the thresholds on its own.  Returns `None` when the window does
/// not fit.
pub fn find_best_crop(image: &RgbaImage, crop_w: usize, crop_h: usize, config: &QualityConfig) -> Option<CropRectangle> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if crop_w == 0 || crop_h == 0 || crop_w > width || crop_h > height {
        return None;
    }
    let step_x = ((width - crop_w) / (CROP_GRID - 1)).max(1);
    let step_y = ((height - crop_h) / (CROP_GRID - 1)).max(1);

    let mut best: Option<CropRectangle> = None;
    for gy in 0..CROP_GRID {
        for gx in 0..CROP_GRID {
            let rect = Rect {
                x: (gx * step_x).min(width - crop_w),
                y: (gy * step_y).min(height - crop_h),
                w: crop_w,
                h: crop_h,
            };
            let quality = analyze(&extract(image, &rect), config);

            let cx = (rect.x as f64 + crop_w as f64 / 2.0) / width as f64 - 0.5;
            let cy = (rect.y as f64 + crop_h as f64 / 2.0) / height as f64 - 0.5;
            let center_bias = 1.0 - (cx * cx + cy * cy).sqrt().min(1.0);

            let raw = quality.geometry_score * 0.45
                + quality.edge_density * 0.30
                + quality.spatial_distribution * 0.15
                + quality.visible_ratio * 0.10;
            let score = raw * (0.9 + 0.1 * center_bias);

            if best.map_or(true, |b| score > b.score) {
                best = Some(CropRectangle { rect, score, quality });
            }
        }
    }
    best
}

/// Where two rectangles intersect, if they do.
pub fn overlap(a: &Rect, b: &Rect) -> Option<Rect> {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);
    if x2 <= x1 || y2 <= y1 {
        None
    } else {
        Some(Rect {
            x: x1,
            y: y1,
            w: x2 - x1,
            h: y2 - y1,
        })
    }
}

/// The viewport that frames `rect` of an image rendered through `plane`.
pub fn crop_view(rect: &Rect, plane: &PlaneMapper) -> Viewport {
    let region = plane.pixel_rect_to_plane(rect.x, rect.y, rect.w, rect.h);
    Viewport::framing(&region, rect.w as f64 / rect.h as f64)
}

/// A chosen crop and the view to re-render it from.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceCrop {
    /// The device shape.
    pub target: AspectTarget,
    /// The winning window in the scan.
    pub crop: CropRectangle,
    /// The fractal view that frames it.
    pub view: Viewport,
}

/// Finds the best crop for every target independently.  Overlap
/// between pairs of crops is logged, never resolved.
pub fn select_crops(
    image: &RgbaImage,
    plane: &PlaneMapper,
    targets: &[AspectTarget],
    config: &QualityConfig,
) -> Vec<DeviceCrop> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let mut crops: Vec<DeviceCrop> = vec![];
    for target in targets {
        let (crop_w, crop_h) = largest_crop(width, height, target.aspect());
        match find_best_crop(image, crop_w, crop_h, config) {
            Some(crop) => {
                let view = crop_view(&crop.rect, plane);
                info!(
                    target = target.name.as_str(),
                    x = crop.rect.x,
                    y = crop.rect.y,
                    w = crop.rect.w,
                    h = crop.rect.h,
                    score = crop.score,
                    "crop chosen"
                );
                crops.push(DeviceCrop {
                    target: target.clone(),
                    crop,
                    view,
                });
            }
            None => debug!(target = target.name.as_str(), "no crop fits"),
        }
    }

    for (i, a) in crops.iter().enumerate() {
        for b in &crops[i + 1..] {
            match overlap(&a.crop.rect, &b.crop.rect) {
                Some(shared) => info!(
                    first = a.target.name.as_str(),
                    second = b.target.name.as_str(),
                    pixels = shared.area(),
                    first_share = shared.area() as f64 / a.crop.rect.area() as f64,
                    second_share = shared.area() as f64 / b.crop.rect.area() as f64,
                    "crops overlap"
                ),
                None => debug!(
                    first = a.target.name.as_str(),
                    second = b.target.name.as_str(),
                    "crops are disjoint"
                ),
            }
        }
    }
    crops
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    // Busy stripes below row 100, black above.
    fn bottom_heavy() -> RgbaImage {
        RgbaImage::from_fn(160, 160, |x, y| {
            if y < 100 {
                return Rgba([0, 0, 0, 255]);
            }
            let v = if (x / 2) % 2 == 0 {
                150 + ((x * 7 + y * 3) % 100) as u8
            } else {
                20 + ((x * 13 + y) % 40) as u8
            };
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn largest_crop_fills_one_axis() {
        assert_eq!(largest_crop(1200, 1200, 16.0 / 9.0), (1200, 675));
        assert_eq!(largest_crop(1200, 1200, 9.0 / 16.0), (675, 1200));
        assert_eq!(largest_crop(1600, 900, 1.0), (900, 900));
    }

    #[test]
    fn crop_follows_the_detail() {
        let image = bottom_heavy();
        let (w, h) = largest_crop(160, 160, 16.0 / 9.0);
        assert_eq!((w, h), (160, 90));
        let crop = find_best_crop(&image, w, h, &QualityConfig::default()).unwrap();
        assert_eq!(crop.rect, Rect { x: 0, y: 70, w: 160, h: 90 });
    }

    #[test]
    fn crop_search_is_deterministic() {
        let image = bottom_heavy();
        let config = QualityConfig::default();
        let first = find_best_crop(&image, 90, 160, &config);
        for _ in 0..3 {
            assert_eq!(find_best_crop(&image, 90, 160, &config), first);
        }
    }

    #[test]
    fn oversized_crops_do_not_fit() {
        let image = bottom_heavy();
        assert!(find_best_crop(&image, 161, 10, &QualityConfig::default()).is_none());
    }

    #[test]
    fn overlap_is_the_intersection() {
        let a = Rect { x: 0, y: 10, w: 100, h: 50 };
        let b = Rect { x: 60, y: 0, w: 30, h: 100 };
        assert_eq!(overlap(&a, &b), Some(Rect { x: 60, y: 10, w: 30, h: 50 }));
        let c = Rect { x: 100, y: 0, w: 5, h: 5 };
        assert_eq!(overlap(&a, &c), None);
    }

    #[test]
    fn crop_view_frames_the_crop() {
        let scan = Viewport::new(-0.75, 0.1, 4.0);
        let plane = PlaneMapper::for_view(&scan, 1200, 1200).unwrap();
        let rect = Rect { x: 0, y: 0, w: 1200, h: 675 };
        let view = crop_view(&rect, &plane);

        // Rendered at 16:9, the crop view covers exactly the crop.
        let region = plane.pixel_rect_to_plane(rect.x, rect.y, rect.w, rect.h);
        let framed = view.bounds(1600, 900);
        assert!((framed.0 - region.0).norm() < 1e-9);
        assert!((framed.1 - region.1).norm() < 1e-9);
        assert!(view.zoom > scan.zoom);
    }
}
