//! PNG to JPEG post-processing.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat as RasterFormat, Rgb, RgbImage};

use chemlink_core::{Error, Result};

const JPEG_QUALITY: u8 = 90;

/// Re-encode a PNG as JPEG, flattening transparency onto opaque white.
pub fn png_to_jpeg(png: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(png, RasterFormat::Png)
        .map_err(|e| Error::Image(format!("Failed to decode PNG: {}", e)))?;
    let rgba = decoded.to_rgba8();

    let mut flat = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        flat.put_pixel(x, y, Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]));
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&flat)
        .map_err(|e| Error::Image(format!("Failed to encode JPEG: {}", e)))?;
    Ok(out)
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = u32::from(channel);
    let a = u32::from(alpha);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(img: &RgbaImage) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, RasterFormat::Png).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_over_white() {
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(over_white(200, 255), 200);
        assert_eq!(over_white(0, 128), 127);
    }

    #[test]
    fn test_transparent_png_becomes_white_jpeg() {
        let transparent = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 0]));
        let jpeg = png_to_jpeg(&png(&transparent)).unwrap();

        let decoded = image::load_from_memory_with_format(&jpeg, RasterFormat::Jpeg)
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.dimensions(), (100, 100));
        let Rgb([r, g, b]) = *decoded.get_pixel(50, 50);
        assert!(r > 245 && g > 245 && b > 245);
    }

    #[test]
    fn test_opaque_pixels_survive() {
        let black = RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255]));
        let jpeg = png_to_jpeg(&png(&black)).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (40, 20));
        assert!(decoded.get_pixel(20, 10).0[0] < 10);
    }

    #[test]
    fn test_garbage_is_image_error() {
        assert!(matches!(png_to_jpeg(b"not a png"), Err(Error::Image(_))));
    }
}
