use image::ImageBuffer;
use image::Pixel;
use image::Rgba;
use image::RgbaImage;


/// "over" on the colour channels only; whatever alpha `bg` carries is left alone.
pub fn blend_over<P: Pixel<Subpixel = u8>>(bg: &mut P, fg: &Rgba<u8>) {
    let a = fg[3] as f64 / 255.0;
    let ia = 1.0 - a;
    let channels = bg.channels_mut();
    for c in 0 .. 3 {
        channels[c] = (fg[c] as f64 * a + channels[c] as f64 * ia) as u8;
    }
}

/// Caller guarantees the overlay fits at (ox, oy).
pub fn blend_region<P>(panel: &mut ImageBuffer<P, Vec<u8>>, overlay: &RgbaImage, ox: u32, oy: u32)
where
    P: Pixel<Subpixel = u8>,
{
    for (x, y, fg) in overlay.enumerate_pixels() {
        blend_over(panel.get_pixel_mut(ox + x, oy + y), fg);
    }
}


#[cfg(test)]
mod test {

    use super::*;
    use image::Rgb;
    use image::RgbImage;

    #[test]
    fn test_blend_half_alpha() {
        let mut bg = Rgb([10u8, 20, 30]);
        blend_over(&mut bg, &Rgba([200, 100, 50, 128]));
        assert_eq!(bg, Rgb([105, 60, 40]));
    }

    #[test]
    fn test_blend_extremes() {
        let mut bg = Rgb([10u8, 20, 30]);
        blend_over(&mut bg, &Rgba([200, 100, 50, 255]));
        assert_eq!(bg, Rgb([200, 100, 50]));

        let mut bg = Rgb([10u8, 20, 30]);
        blend_over(&mut bg, &Rgba([200, 100, 50, 0]));
        assert_eq!(bg, Rgb([10, 20, 30]));
    }

    #[test]
    fn test_blend_keeps_base_alpha() {
        let mut bg = Rgba([10u8, 20, 30, 77]);
        blend_over(&mut bg, &Rgba([200, 100, 50, 255]));
        assert_eq!(bg, Rgba([200, 100, 50, 77]));
    }

    #[test]
    fn test_blend_region_offset() {
        let mut panel = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let overlay = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        blend_region(&mut panel, &overlay, 1, 2);
        for (x, y, p) in panel.enumerate_pixels() {
            let inside = (x == 1 || x == 2) && y == 2;
            let expect = if inside { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) };
            assert_eq!(*p, expect, "pixel ({}, {})", x, y);
        }
    }
}
