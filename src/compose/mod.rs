pub mod anchor;
pub mod blend;
pub mod de;

use std::fmt;

use image::DynamicImage;
use image::RgbaImage;
use image::imageops;
use image::imageops::FilterType;

use crate::error::FrameError;
use crate::error::FrameResult;


pub const DEFAULT_HEIGHT_RATIO: f64 = 0.4;
pub const DEFAULT_WIDTH_RATIO: f64 = 1.0;
pub const DEFAULT_OFFSET_RATIO: f64 = 0.28;

pub const FILTER_NAMES: &'static [&'static str] = &["nearest", "triangle", "gaussian", "catmullrom", "lanczos3"];

pub fn parse_filter(name: &str) -> Option<FilterType> {
    match name {
        "nearest" => Some(FilterType::Nearest),
        "triangle" => Some(FilterType::Triangle),
        "gaussian" => Some(FilterType::Gaussian),
        "catmullrom" => Some(FilterType::CatmullRom),
        "lanczos3" => Some(FilterType::Lanczos3),
        _ => None,
    }
}


/// Footprint of the resized overlay inside the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Placement {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{}x{}+{}+{}", self.width, self.height, self.x, self.y))
    }
}

impl Placement {

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64 &&
        self.y as u64 + self.height as u64 <= height as u64
    }
}


/// Where and how large the frame lands, relative to the base image.
#[derive(Debug, Clone)]
pub struct FrameGeometry {
    height_ratio: f64,
    width_ratio: f64,
    offset_ratio: f64,
    filter: FilterType,
}

impl Default for FrameGeometry {

    fn default() -> Self {
        FrameGeometry {
            height_ratio: DEFAULT_HEIGHT_RATIO,
            width_ratio: DEFAULT_WIDTH_RATIO,
            offset_ratio: DEFAULT_OFFSET_RATIO,
            filter: FilterType::Triangle,
        }
    }
}

impl FrameGeometry {

    pub fn set_height_ratio(&mut self, ratio: f64) {
        if ratio.is_finite() && ratio > 0.0 {
            self.height_ratio = ratio;
        }
    }

    pub fn set_width_ratio(&mut self, ratio: f64) {
        if ratio.is_finite() && ratio > 0.0 {
            self.width_ratio = ratio;
        }
    }

    pub fn set_offset_ratio(&mut self, ratio: f64) {
        if ratio.is_finite() && ratio >= 0.0 {
            self.offset_ratio = ratio;
        }
    }

    /// Returns false, leaving the filter untouched, on an unknown name.
    pub fn set_filter(&mut self, name: &str) -> bool {
        if let Some(filter) = parse_filter(name) {
            self.filter = filter;
            true
        } else {
            false
        }
    }

    pub fn filter(&self) -> FilterType {
        self.filter
    }

    pub fn place(&self, width: u32, height: u32) -> Placement {
        let tw = (width as f64 * self.width_ratio).round() as u32;
        let th = (height as f64 * self.height_ratio).round() as u32;
        let oy = (height as f64 * self.offset_ratio).floor() as u32;
        // a wider overlay has no valid x; `fits` rejects it
        let ox = if tw <= width { (width - tw) / 2 } else { 0 };
        Placement {
            x: ox,
            y: oy,
            width: tw,
            height: th,
        }
    }
}


pub fn fit_overlay(overlay: &DynamicImage, placement: &Placement, filter: FilterType) -> RgbaImage {
    let overlay = overlay.to_rgba8();
    if overlay.dimensions() == (placement.width, placement.height) {
        overlay
    } else {
        imageops::resize(&overlay, placement.width, placement.height, filter)
    }
}

/// Blends `overlay` onto a copy of `base`; `base` itself is never modified.
///
/// The result keeps the base's alpha channel (if it has one) as it was. Grayscale
/// bases come back promoted to RGB(A).
pub fn compose(base: &DynamicImage, overlay: &DynamicImage, geometry: &FrameGeometry) -> FrameResult<DynamicImage> {
    let color = overlay.color();
    if !color.has_alpha() {
        return Err(FrameError::MissingAlpha { color });
    }

    let (width, height) = (base.width(), base.height());
    let placement = geometry.place(width, height);
    if !placement.fits(width, height) {
        return Err(FrameError::OutOfBounds { placement, width, height });
    }
    if placement.is_empty() {
        log::debug!("empty frame footprint {} on {}x{} image, nothing to blend", placement, width, height);
        return Ok(promote(base));
    }

    let overlay = fit_overlay(overlay, &placement, geometry.filter());
    let merged = if base.color().has_alpha() {
        let mut panel = base.to_rgba8();
        blend::blend_region(&mut panel, &overlay, placement.x, placement.y);
        DynamicImage::ImageRgba8(panel)
    } else {
        let mut panel = base.to_rgb8();
        blend::blend_region(&mut panel, &overlay, placement.x, placement.y);
        DynamicImage::ImageRgb8(panel)
    };
    Ok(merged)
}

/// Copy of `base` as 8-bit RGB, or RGBA when it has alpha.
pub fn promote(base: &DynamicImage) -> DynamicImage {
    if base.color().has_alpha() {
        DynamicImage::ImageRgba8(base.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(base.to_rgb8())
    }
}


#[cfg(test)]
mod test {

    use super::*;
    use image::Rgb;
    use image::RgbImage;
    use image::Rgba;

    fn solid_base(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])))
    }

    fn solid_overlay(width: u32, height: u32, alpha: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, alpha])))
    }

    #[test]
    fn test_default_placement() {
        let geometry = FrameGeometry::default();
        assert_eq!(geometry.place(200, 100), Placement { x: 0, y: 28, width: 200, height: 40 });
        // round(0.4 * 333) = 133, floor(0.28 * 333) = 93
        assert_eq!(geometry.place(640, 333), Placement { x: 0, y: 93, width: 640, height: 133 });
        // round(0.4 * 7) = 3 where truncation would give 2
        assert_eq!(geometry.place(9, 7).height, 3);
    }

    #[test]
    fn test_narrow_overlay_is_centered() {
        let mut geometry = FrameGeometry::default();
        geometry.set_width_ratio(0.5);
        let p = geometry.place(201, 100);
        assert_eq!(p.width, 101);
        assert_eq!(p.x, 50);
    }

    #[test]
    fn test_invalid_ratios_ignored() {
        let mut geometry = FrameGeometry::default();
        geometry.set_height_ratio(-1.0);
        geometry.set_width_ratio(f64::NAN);
        geometry.set_offset_ratio(-0.1);
        assert!(!geometry.set_filter("bicubic"));
        assert_eq!(geometry.place(200, 100), FrameGeometry::default().place(200, 100));
        assert_eq!(geometry.filter(), FilterType::Triangle);
    }

    #[test]
    fn test_compose_example_scenario() {
        let base = solid_base(200, 100);
        let overlay = solid_overlay(50, 50, 128);
        let merged = compose(&base, &overlay, &FrameGeometry::default()).unwrap();
        let merged = merged.as_rgb8().unwrap();
        assert_eq!(merged.dimensions(), (200, 100));
        for (x, y, p) in merged.enumerate_pixels() {
            if y >= 28 && y < 68 {
                // resampling may move alpha by one step
                let expect = [105i32, 60, 40];
                for c in 0 .. 3 {
                    assert!((p[c] as i32 - expect[c]).abs() <= 1, "pixel ({}, {}) = {:?}", x, y, p);
                }
            } else {
                assert_eq!(*p, Rgb([10, 20, 30]), "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_compose_does_not_touch_input() {
        let base = solid_base(20, 10);
        let overlay = solid_overlay(20, 4, 255);
        let _ = compose(&base, &overlay, &FrameGeometry::default()).unwrap();
        assert!(base.as_rgb8().unwrap().pixels().all(|p| *p == Rgb([10, 20, 30])));
    }

    #[test]
    fn test_opaque_and_transparent_overlays() {
        let base = solid_base(20, 10);
        let opaque = compose(&base, &solid_overlay(20, 4, 255), &FrameGeometry::default()).unwrap();
        let opaque = opaque.as_rgb8().unwrap();
        assert_eq!(*opaque.get_pixel(5, 2), Rgb([200, 100, 50]));
        assert_eq!(*opaque.get_pixel(5, 5), Rgb([200, 100, 50]));
        assert_eq!(*opaque.get_pixel(5, 6), Rgb([10, 20, 30]));

        let clear = compose(&base, &solid_overlay(20, 4, 0), &FrameGeometry::default()).unwrap();
        assert_eq!(clear.as_rgb8().unwrap(), base.as_rgb8().unwrap());
    }

    #[test]
    fn test_base_alpha_preserved() {
        let base = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 10, Rgba([10, 20, 30, 90])));
        let merged = compose(&base, &solid_overlay(20, 4, 255), &FrameGeometry::default()).unwrap();
        let merged = merged.as_rgba8().unwrap();
        assert_eq!(*merged.get_pixel(0, 3), Rgba([200, 100, 50, 90]));
        assert!(merged.pixels().all(|p| p[3] == 90));
    }

    #[test]
    fn test_overlay_without_alpha_fails() {
        let base = solid_base(20, 10);
        let overlay = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 4, Rgb([1, 2, 3])));
        match compose(&base, &overlay, &FrameGeometry::default()) {
            Err(FrameError::MissingAlpha { .. }) => {},
            other => panic!("expected MissingAlpha, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_geometry_overflow_fails() {
        let mut geometry = FrameGeometry::default();
        geometry.set_offset_ratio(0.8);
        let base = solid_base(20, 10);
        match compose(&base, &solid_overlay(20, 4, 255), &geometry) {
            Err(FrameError::OutOfBounds { placement, width, height }) => {
                assert_eq!((width, height), (20, 10));
                assert_eq!(placement.y, 8);
            },
            other => panic!("expected OutOfBounds, got {:?}", other.map(|_| ())),
        }

        let mut geometry = FrameGeometry::default();
        geometry.set_width_ratio(1.5);
        assert!(compose(&base, &solid_overlay(20, 4, 255), &geometry).is_err());
    }

    #[test]
    fn test_tiny_base_returned_unchanged() {
        let base = solid_base(3, 1);
        let merged = compose(&base, &solid_overlay(5, 5, 255), &FrameGeometry::default()).unwrap();
        assert_eq!(merged.as_rgb8().unwrap(), base.as_rgb8().unwrap());
    }

    #[test]
    fn test_grayscale_base_promoted() {
        use image::ColorType;
        use image::GrayImage;
        use image::Luma;

        for (width, height) in &[(3u32, 1u32), (30, 10)] {
            let base = DynamicImage::ImageLuma8(GrayImage::from_pixel(*width, *height, Luma([40])));
            let merged = compose(&base, &solid_overlay(5, 5, 255), &FrameGeometry::default()).unwrap();
            assert_eq!(merged.color(), ColorType::Rgb8, "{}x{}", width, height);
            assert_eq!(*merged.as_rgb8().unwrap().get_pixel(0, 0), Rgb([40, 40, 40]));
        }
    }

    #[test]
    fn test_fit_overlay_size() {
        let geometry = FrameGeometry::default();
        let overlay = solid_overlay(50, 50, 128);
        for (width, height) in &[(200u32, 100u32), (640, 333), (9, 7), (31, 250)] {
            let placement = geometry.place(*width, *height);
            let fitted = fit_overlay(&overlay, &placement, geometry.filter());
            let expect_h = (*height as f64 * 0.4).round() as u32;
            assert_eq!(fitted.dimensions(), (*width, expect_h), "{}x{}", width, height);
        }
    }

    #[test]
    fn test_compose_narrow_overlay_centered() {
        let mut geometry = FrameGeometry::default();
        geometry.set_width_ratio(0.5);
        let base = solid_base(20, 10);
        // footprint 10x4 at (5, 2)
        let merged = compose(&base, &solid_overlay(10, 4, 255), &geometry).unwrap();
        let merged = merged.as_rgb8().unwrap();
        for (x, y, p) in merged.enumerate_pixels() {
            let inside = x >= 5 && x < 15 && y >= 2 && y < 6;
            let expect = if inside { Rgb([200, 100, 50]) } else { Rgb([10, 20, 30]) };
            assert_eq!(*p, expect, "pixel ({}, {})", x, y);
        }
    }
}
