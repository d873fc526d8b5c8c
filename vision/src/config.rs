//! `preprocessor_config.json` as shipped next to vision models

use crate::error::{Result, VisionError};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Target size of a resize or crop step.
///
/// HF configs spell this three ways: `{"height": h, "width": w}`,
/// `{"shortest_edge": n}` or a bare integer for a square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Exact { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
    Square(u32),
}

impl SizeSpec {
    /// Output (height, width) for an input of the given dimensions
    pub fn resolve(&self, height: u32, width: u32) -> (u32, u32) {
        match *self {
            SizeSpec::Exact { height, width } => (height, width),
            SizeSpec::Square(side) => (side, side),
            SizeSpec::ShortestEdge { shortest_edge } => {
                let (short, long) = if height <= width { (height, width) } else { (width, height) };
                if short == 0 {
                    return (shortest_edge, shortest_edge);
                }
                let scaled_long = ((long as f64) * (shortest_edge as f64) / (short as f64)).round() as u32;
                if height <= width {
                    (shortest_edge, scaled_long)
                } else {
                    (scaled_long, shortest_edge)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    pub do_resize: bool,
    pub size: SizeSpec,
    /// PIL resampling filter id (0 nearest, 1 lanczos, 2 bilinear, 3 bicubic)
    pub resample: Option<u8>,
    pub do_center_crop: bool,
    pub crop_size: Option<SizeSpec>,
    pub do_rescale: bool,
    pub rescale_factor: f32,
    pub do_normalize: bool,
    pub image_mean: Vec<f32>,
    pub image_std: Vec<f32>,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: SizeSpec::Exact { height: 224, width: 224 },
            resample: Some(2),
            do_center_crop: false,
            crop_size: None,
            do_rescale: true,
            rescale_factor: 1.0 / 255.0,
            do_normalize: true,
            image_mean: vec![0.5, 0.5, 0.5],
            image_std: vec![0.5, 0.5, 0.5],
        }
    }
}

impl PreprocessorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_mean.len() != 3 || self.image_std.len() != 3 {
            return Err(VisionError::InvalidConfig(
                "image_mean and image_std must have exactly 3 elements for RGB".to_string(),
            ));
        }
        for (i, &s) in self.image_std.iter().enumerate() {
            if s <= 0.0 {
                return Err(VisionError::InvalidConfig(format!(
                    "image_std at index {i} must be greater than 0, got {s}"
                )));
            }
        }
        if self.do_rescale && self.rescale_factor <= 0.0 {
            return Err(VisionError::InvalidConfig(
                "rescale_factor must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn filter(&self) -> FilterType {
        match self.resample {
            Some(0) => FilterType::Nearest,
            Some(1) => FilterType::Lanczos3,
            Some(3) => FilterType::CatmullRom,
            _ => FilterType::Triangle,
        }
    }
}
