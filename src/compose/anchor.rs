use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use image::ImageBuffer;
use image::Pixel;
use image::RgbaImage;
use image::imageops::FilterType;

use super::blend;
use super::fit_overlay;
use super::promote;
use super::Placement;
use crate::error::FrameError;
use crate::error::FrameResult;


/// Frame width over the distance between the outer eye corners.
pub const WIDTH_PER_EYE_DISTANCE: f64 = 1.8;
/// Frame height over frame width.
pub const FRAME_ASPECT: f64 = 0.8;


/// Pixel position on the base image, `"x,y"` in text form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl FromStr for Point {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sp = s.splitn(2, ',');
        let x: f64 = sp.next().unwrap_or_default().trim().parse().map_err(|_| format!("bad x in `{}`", s))?;
        let y: f64 = sp.next().ok_or_else(|| format!("missing y in `{}`", s))?.trim().parse().map_err(|_| format!("bad y in `{}`", s))?;
        if x.is_finite() && y.is_finite() {
            Ok(Point { x, y })
        } else {
            Err(format!("non-finite point `{}`", s))
        }
    }
}


/// Outer corners of both eyes, as a face landmark detector reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeAnchor {
    pub left: Point,
    pub right: Point,
}

/// Rotated footprint centered between the eyes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchoredPlacement {
    pub center: Point,
    pub width: u32,
    pub height: u32,
    /// Radians, clockwise in image coordinates.
    pub angle: f64,
}

impl fmt::Display for AnchoredPlacement {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{}x{}@({:.1},{:.1})r{:.3}", self.width, self.height, self.center.x, self.center.y, self.angle))
    }
}

impl EyeAnchor {

    pub fn new(left: Point, right: Point) -> Self {
        EyeAnchor {
            left,
            right,
        }
    }

    pub fn place(&self) -> AnchoredPlacement {
        let dx = self.right.x - self.left.x;
        let dy = self.right.y - self.left.y;
        let width = dx.hypot(dy) * WIDTH_PER_EYE_DISTANCE;
        let height = width * FRAME_ASPECT;
        AnchoredPlacement {
            center: Point {
                x: (self.left.x + self.right.x) / 2.0,
                y: (self.left.y + self.right.y) / 2.0,
            },
            width: width.round() as u32,
            height: height.round() as u32,
            angle: dy.atan2(dx),
        }
    }
}


/// Blends `overlay` rotated around `placement.center`. Parts falling outside
/// the panel are clipped.
pub fn blend_rotated<P>(panel: &mut ImageBuffer<P, Vec<u8>>, overlay: &RgbaImage, placement: &AnchoredPlacement)
where
    P: Pixel<Subpixel = u8>,
{
    let (ow, oh) = (overlay.width() as f64, overlay.height() as f64);
    let (sin, cos) = placement.angle.sin_cos();
    let reach = ow.hypot(oh) / 2.0;
    let c = placement.center;

    let x0 = (c.x - reach).floor().max(0.0) as u32;
    let y0 = (c.y - reach).floor().max(0.0) as u32;
    let x1 = ((c.x + reach).ceil().max(0.0) as u32).min(panel.width());
    let y1 = ((c.y + reach).ceil().max(0.0) as u32).min(panel.height());

    for y in y0 .. y1 {
        for x in x0 .. x1 {
            let dx = x as f64 + 0.5 - c.x;
            let dy = y as f64 + 0.5 - c.y;
            // undo the rotation to land in overlay space
            let u = dx * cos + dy * sin + ow / 2.0;
            let v = -dx * sin + dy * cos + oh / 2.0;
            if u < 0.0 || v < 0.0 || u >= ow || v >= oh {
                continue;
            }
            blend::blend_over(panel.get_pixel_mut(x, y), overlay.get_pixel(u as u32, v as u32));
        }
    }
}

/// Like [`super::compose`], but the frame follows the eyes instead of the
/// fixed geometry.
pub fn compose_anchored(base: &DynamicImage, overlay: &DynamicImage, anchor: &EyeAnchor, filter: FilterType) -> FrameResult<DynamicImage> {
    let color = overlay.color();
    if !color.has_alpha() {
        return Err(FrameError::MissingAlpha { color });
    }

    let placement = anchor.place();
    if placement.width == 0 || placement.height == 0 {
        log::debug!("eyes collapse to an empty frame {}, nothing to blend", placement);
        return Ok(promote(base));
    }

    let size = Placement { x: 0, y: 0, width: placement.width, height: placement.height };
    let overlay = fit_overlay(overlay, &size, filter);
    let mut merged = promote(base);
    match &mut merged {
        DynamicImage::ImageRgba8(panel) => blend_rotated(panel, &overlay, &placement),
        DynamicImage::ImageRgb8(panel) => blend_rotated(panel, &overlay, &placement),
        _ => {},
    }
    Ok(merged)
}
