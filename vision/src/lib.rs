//! Image preprocessing for vision pipelines
//!
//! Turns an image file (or encoded bytes) into the normalized `[1, 3, H, W]`
//! tensor a vision transformer expects, following the model's
//! `preprocessor_config.json`: resize, optional center crop, rescale and
//! per-channel normalization.

pub mod config;
pub mod error;

pub use config::{PreprocessorConfig, SizeSpec};
pub use error::{Result, VisionError};

use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use std::path::Path;

/// Output of [`ImagePreprocessor::preprocess_image`]
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Normalized pixels, `[1, 3, height, width]`
    pub pixel_values: Array4<f32>,
    /// (height, width) of the decoded input
    pub original_size: (u32, u32),
    /// (height, width) after resize and crop
    pub reshaped_size: (u32, u32),
}

#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessorConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load from `preprocessor_config.json`
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = PreprocessorConfig::from_file(path)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessorConfig {
        &self.config
    }

    pub fn preprocess_path<P: AsRef<Path>>(&self, path: P) -> Result<ProcessedImage> {
        let path = path.as_ref();
        log::debug!("Decoding image {:?}", path);
        let image = image::open(path)?;
        self.preprocess_image(&image)
    }

    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<ProcessedImage> {
        let image = image::load_from_memory(bytes)?;
        self.preprocess_image(&image)
    }

    pub fn preprocess_image(&self, image: &DynamicImage) -> Result<ProcessedImage> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(VisionError::InvalidImage(format!(
                "image has zero area ({width}x{height})"
            )));
        }

        let mut current = rgb;
        if self.config.do_resize {
            let (target_h, target_w) = self.config.size.resolve(height, width);
            if (target_h, target_w) != (height, width) {
                current = image::imageops::resize(&current, target_w, target_h, self.config.filter());
            }
        }

        if self.config.do_center_crop {
            if let Some(crop) = self.config.crop_size {
                let (crop_h, crop_w) = crop.resolve(current.height(), current.width());
                current = center_crop(&current, crop_h, crop_w);
            }
        }

        let reshaped_size = (current.height(), current.width());
        let pixel_values = self.normalize(&current)?;
        log::debug!(
            "Preprocessed image {}x{} -> {}x{}",
            height, width, reshaped_size.0, reshaped_size.1
        );

        Ok(ProcessedImage {
            pixel_values,
            original_size: (height, width),
            reshaped_size,
        })
    }

    fn normalize(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);
        let scale = if self.config.do_rescale { self.config.rescale_factor } else { 1.0 };

        let mut data = vec![0.0f32; 3 * h * w];
        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                let mut value = pixel[c] as f32 * scale;
                if self.config.do_normalize {
                    value = (value - self.config.image_mean[c]) / self.config.image_std[c];
                }
                data[c * h * w + y as usize * w + x as usize] = value;
            }
        }

        Ok(Array4::from_shape_vec((1, 3, h, w), data)?)
    }
}

/// Crop the centre `crop_h x crop_w` region, padding with black when the
/// image is smaller than the crop.
fn center_crop(image: &RgbImage, crop_h: u32, crop_w: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width >= crop_w && height >= crop_h {
        let left = (width - crop_w) / 2;
        let top = (height - crop_h) / 2;
        return image::imageops::crop_imm(image, left, top, crop_w, crop_h).to_image();
    }

    let mut canvas = RgbImage::new(crop_w, crop_h);
    let offset_x = (crop_w as i64 - width as i64) / 2;
    let offset_y = (crop_h as i64 - height as i64) / 2;
    image::imageops::overlay(&mut canvas, image, offset_x, offset_y);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
    }

    #[test]
    fn test_exact_resize_and_normalize() {
        let processor = ImagePreprocessor::new(PreprocessorConfig::default()).expect("valid config");
        let processed = processor.preprocess_image(&solid(64, 32, 255)).expect("preprocess");

        assert_eq!(processed.pixel_values.shape(), &[1, 3, 224, 224]);
        assert_eq!(processed.original_size, (32, 64));
        // (1.0 - 0.5) / 0.5
        assert!(processed.pixel_values.iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_shortest_edge_then_center_crop() {
        let config = PreprocessorConfig {
            size: SizeSpec::ShortestEdge { shortest_edge: 20 },
            do_center_crop: true,
            crop_size: Some(SizeSpec::Exact { height: 16, width: 16 }),
            ..PreprocessorConfig::default()
        };
        let processor = ImagePreprocessor::new(config).expect("valid config");
        let processed = processor.preprocess_image(&solid(40, 20, 0)).expect("preprocess");

        assert_eq!(processed.reshaped_size, (16, 16));
        assert_eq!(processed.pixel_values.shape(), &[1, 3, 16, 16]);
        assert!(processed.pixel_values.iter().all(|v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_no_resize_keeps_dimensions() {
        let config = PreprocessorConfig {
            do_resize: false,
            do_normalize: false,
            ..PreprocessorConfig::default()
        };
        let processor = ImagePreprocessor::new(config).expect("valid config");
        let processed = processor.preprocess_image(&solid(5, 3, 51)).expect("preprocess");

        assert_eq!(processed.pixel_values.shape(), &[1, 3, 3, 5]);
        assert!((processed.pixel_values[[0, 2, 1, 4]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_crop_larger_than_image_pads() {
        let image = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let cropped = center_crop(&image, 8, 8);
        assert_eq!(cropped.dimensions(), (8, 8));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(cropped.get_pixel(4, 4), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let processor = ImagePreprocessor::new(PreprocessorConfig::default()).expect("valid config");
        let result = processor.preprocess_bytes(b"not an image");
        assert!(matches!(result, Err(VisionError::DecodeFailed(_))));
    }
}
