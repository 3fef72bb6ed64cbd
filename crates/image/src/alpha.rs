//! Alpha flattening for codecs without transparency.

use image::{Rgb, RgbImage, RgbaImage};

/// Background used when flattening for JPEG output.
pub const DEFAULT_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Whether any pixel of the surface is not fully opaque.
pub fn has_alpha(surface: &RgbaImage) -> bool {
    surface.pixels().any(|p| p[3] != 255)
}

/// Composite an RGBA surface over a solid background.
pub fn flatten_alpha(surface: &RgbaImage, background_color: [u8; 3]) -> RgbImage {
    let (width, height) = surface.dimensions();
    let mut output = RgbImage::new(width, height);

    for (x, y, pixel) in surface.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        if a == 255 {
            output.put_pixel(x, y, Rgb([r, g, b]));
            continue;
        }

        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        let blend = |c: u8, bg: u8| ((c as f32 * alpha) + (bg as f32 * inv_alpha)).round() as u8;

        output.put_pixel(
            x,
            y,
            Rgb([
                blend(r, background_color[0]),
                blend(g, background_color[1]),
                blend(b, background_color[2]),
            ]),
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_flatten_over_white() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255])); // Opaque red
        img.put_pixel(0, 1, Rgba([0, 255, 0, 128])); // Semi-transparent green
        img.put_pixel(1, 0, Rgba([0, 0, 255, 0])); // Fully transparent blue
        img.put_pixel(1, 1, Rgba([255, 255, 0, 255])); // Opaque yellow

        let result = flatten_alpha(&img, DEFAULT_BACKGROUND);

        assert_eq!(result.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(result.get_pixel(1, 0), &Rgb([255, 255, 255]));
        assert_eq!(result.get_pixel(1, 1), &Rgb([255, 255, 0]));

        let blended = result.get_pixel(0, 1);
        assert_eq!(blended[1], 255);
        assert!(blended[0] > 120 && blended[0] < 135);
    }

    #[test]
    fn test_has_alpha() {
        let opaque = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 255]));
        assert!(!has_alpha(&opaque));

        let mut translucent = opaque.clone();
        translucent.put_pixel(2, 2, Rgba([10, 20, 30, 254]));
        assert!(has_alpha(&translucent));
    }
}
