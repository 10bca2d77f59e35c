use image::{DynamicImage, GrayImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::median_filter;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has no pixels")]
    EmptyImage,
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Median kernel radius; 1 gives the 3×3 speckle filter.
const MEDIAN_RADIUS: u32 = 1;

/// Decode an image file without any transformation.
pub fn load_image(path: &Path) -> Result<DynamicImage, PreprocessError> {
    Ok(image::open(path)?)
}

/// Decode to grayscale, binarize with Otsu's threshold and remove speckle noise.
///
/// Only a decode failure is an error. If binarizing or denoising fails the plain
/// grayscale decode is returned so recognition can still make a pass.
pub fn preprocess(path: &Path) -> Result<GrayImage, PreprocessError> {
    let gray = load_image(path)?.to_luma8();
    Ok(preprocess_gray(gray))
}

/// Binarize and denoise an already-decoded grayscale image, returning it
/// unchanged when cleaning fails.
pub fn preprocess_gray(gray: GrayImage) -> GrayImage {
    match binarize_and_denoise(&gray) {
        Ok(cleaned) => cleaned,
        Err(e) => {
            warn!("Preprocessing fell back to grayscale: {e}");
            gray
        }
    }
}

/// Otsu global threshold followed by a 3×3 median filter.
pub fn binarize_and_denoise(gray: &GrayImage) -> Result<GrayImage, PreprocessError> {
    if gray.width() == 0 || gray.height() == 0 {
        return Err(PreprocessError::EmptyImage);
    }
    let level = otsu_level(gray);
    debug!(level, "Otsu threshold computed");
    let binary = threshold(gray, level, ThresholdType::Binary);
    Ok(median_filter(&binary, MEDIAN_RADIUS, MEDIAN_RADIUS))
}

/// Encode a grayscale image as PNG bytes, the input format most engines accept.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, RgbImage};

    fn two_tone(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, _| {
            if x < width / 2 { Luma([40u8]) } else { Luma([210u8]) }
        })
    }

    #[test]
    fn binarized_output_has_two_levels() {
        let result = binarize_and_denoise(&two_tone(20, 20)).unwrap();
        assert!(result.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(result.get_pixel(2, 10)[0], 0);
        assert_eq!(result.get_pixel(17, 10)[0], 255);
    }

    #[test]
    fn median_filter_removes_isolated_speckle() {
        let mut img: GrayImage = ImageBuffer::from_fn(9, 9, |_, _| Luma([230u8]));
        // One dark pixel plus a dark band so Otsu has two classes.
        img.put_pixel(4, 4, Luma([10u8]));
        for x in 0..9 {
            img.put_pixel(x, 0, Luma([10u8]));
            img.put_pixel(x, 1, Luma([10u8]));
        }
        let result = binarize_and_denoise(&img).unwrap();
        assert_eq!(result.get_pixel(4, 4)[0], 255);
    }

    #[test]
    fn empty_image_is_rejected() {
        let empty = GrayImage::new(0, 0);
        assert!(matches!(binarize_and_denoise(&empty), Err(PreprocessError::EmptyImage)));
    }

    #[test]
    fn empty_image_falls_back_unchanged() {
        let gray = preprocess_gray(GrayImage::new(0, 0));
        assert_eq!(gray.dimensions(), (0, 0));
    }

    #[test]
    fn preprocess_gray_cleans_valid_image() {
        let gray = preprocess_gray(two_tone(20, 20));
        assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn preprocess_decodes_color_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        let img: RgbImage = ImageBuffer::from_fn(16, 8, |x, _| {
            if x < 8 { Rgb([20, 20, 20]) } else { Rgb([240, 240, 240]) }
        });
        img.save(&path).unwrap();

        let gray = preprocess(&path).unwrap();
        assert_eq!(gray.dimensions(), (16, 8));
        assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn preprocess_missing_file_is_decode_error() {
        let err = preprocess(Path::new("/nonexistent/card.png")).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn preprocess_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(preprocess(&path), Err(PreprocessError::Decode(_))));
    }

    #[test]
    fn encode_png_produces_png_header() {
        let bytes = encode_png(&two_tone(4, 4)).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}
