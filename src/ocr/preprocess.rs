use image::{GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};

use crate::config::RoiRect;
use crate::extract::ExtractError;

/// Crops the ROI out of a frame.
///
/// Fails with [`ExtractError::InvalidRegion`] when the rectangle is empty or
/// reaches past the frame edge; no clamping is done.
pub fn crop_roi(img: &RgbaImage, roi: &RoiRect) -> Result<RgbaImage, ExtractError> {
    let (width, height) = img.dimensions();

    if !roi.fits_within(width, height) {
        return Err(ExtractError::InvalidRegion {
            x: roi.x,
            y: roi.y,
            w: roi.w,
            h: roi.h,
            image_width: width,
            image_height: height,
        });
    }

    Ok(image::imageops::crop_imm(img, roi.x, roi.y, roi.w, roi.h).to_image())
}

/// Converts the crop to a black-on-white binary image for Tesseract.
///
/// The threshold is chosen per crop with Otsu's method. The instrument
/// display renders light text on a dark panel, so if the bright class is
/// the minority it is treated as text and drawn black.
pub fn binarize_for_ocr(img: &RgbaImage) -> GrayImage {
    let gray = to_luma(img);
    let threshold = otsu_threshold(&gray);

    let (width, height) = gray.dimensions();
    let bright = gray.pixels().filter(|p| p[0] > threshold).count();
    let text_is_bright = bright * 2 < (width as usize * height as usize);

    let mut output = ImageBuffer::new(width, height);
    for (x, y, pixel) in gray.enumerate_pixels() {
        let is_text = (pixel[0] > threshold) == text_is_bright;
        let value = if is_text { 0u8 } else { 255u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// ITU-R 601 luma, alpha ignored.
fn to_luma(img: &RgbaImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut gray = ImageBuffer::new(width, height);
    for (x, y, Rgba([r, g, b, _])) in img.enumerate_pixels() {
        let l = (299 * *r as u32 + 587 * *g as u32 + 114 * *b as u32) / 1000;
        gray.put_pixel(x, y, Luma([l as u8]));
    }
    gray
}

/// Otsu's method: the level maximizing between-class variance.
/// Pixels `> threshold` form the bright class.
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for p in gray.pixels() {
        histogram[p[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 127;
    }

    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut sum_background = 0.0;
    let mut weight_background = 0u64;
    let mut best_level = 0u8;
    let mut best_variance = -1.0;

    for (level, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += level as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_all - sum_background) / weight_foreground as f64;
        let diff = mean_background - mean_foreground;
        let variance = weight_background as f64 * weight_foreground as f64 * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }

    best_level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_roi() {
        // 100x200 image
        let img: RgbaImage = ImageBuffer::from_fn(100, 200, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        let roi = RoiRect { x: 10, y: 50, w: 50, h: 20 };
        let cropped = crop_roi(&img, &roi).unwrap();

        assert_eq!(cropped.dimensions(), (50, 20));
        // Top-left pixel should be (10, 50) from original
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 50);
    }

    #[test]
    fn test_crop_roi_exact_fit() {
        let img: RgbaImage = ImageBuffer::new(100, 100);
        let roi = RoiRect { x: 0, y: 0, w: 100, h: 100 };
        assert_eq!(crop_roi(&img, &roi).unwrap().dimensions(), (100, 100));
    }

    #[test]
    fn test_crop_roi_out_of_bounds() {
        let img: RgbaImage = ImageBuffer::new(100, 100);
        let roi = RoiRect { x: 90, y: 90, w: 20, h: 5 };

        match crop_roi(&img, &roi) {
            Err(ExtractError::InvalidRegion { image_width, image_height, .. }) => {
                assert_eq!((image_width, image_height), (100, 100));
            }
            other => panic!("expected InvalidRegion, got {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[test]
    fn test_crop_roi_empty_rejected() {
        let img: RgbaImage = ImageBuffer::new(100, 100);
        let roi = RoiRect { x: 0, y: 0, w: 0, h: 10 };
        assert!(crop_roi(&img, &roi).is_err());
    }

    #[test]
    fn test_crop_roi_overflow_rejected() {
        let img: RgbaImage = ImageBuffer::new(100, 100);
        let roi = RoiRect { x: u32::MAX, y: 0, w: 10, h: 10 };
        assert!(crop_roi(&img, &roi).is_err());
    }

    #[test]
    fn test_binarize_light_text_on_dark_panel() {
        // Mostly dark panel with a few bright "text" pixels
        let img: RgbaImage = ImageBuffer::from_fn(10, 1, |x, _| {
            if x < 2 {
                Rgba([240, 240, 240, 255])
            } else {
                Rgba([20, 30, 40, 255])
            }
        });

        let result = binarize_for_ocr(&img);

        assert_eq!(result.get_pixel(0, 0)[0], 0, "Bright text should become black");
        assert_eq!(result.get_pixel(1, 0)[0], 0);
        assert_eq!(result.get_pixel(5, 0)[0], 255, "Dark panel should become white");
    }

    #[test]
    fn test_binarize_dark_text_on_light_background() {
        let img: RgbaImage = ImageBuffer::from_fn(10, 1, |x, _| {
            if x < 3 {
                Rgba([10, 10, 10, 255])
            } else {
                Rgba([250, 250, 250, 255])
            }
        });

        let result = binarize_for_ocr(&img);

        assert_eq!(result.get_pixel(0, 0)[0], 0, "Dark text should stay black");
        assert_eq!(result.get_pixel(9, 0)[0], 255);
    }

    #[test]
    fn test_otsu_splits_two_levels() {
        let gray: GrayImage = ImageBuffer::from_fn(4, 1, |x, _| {
            if x < 2 { Luma([50]) } else { Luma([200]) }
        });
        let t = otsu_threshold(&gray);
        assert!((50..200).contains(&t));
    }
}
