#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use imagefront::{ClassifierError, ExtractorDescriptor, FeatureExtractor, ImageSettings};
use ndarray::{Array1, Array4, Axis};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Small images keep the tests fast; the layout is still Inception's.
pub fn test_settings() -> ImageSettings {
    ImageSettings {
        width: 8,
        height: 8,
        ..ImageSettings::default()
    }
}

/// Writes `count` solid-colour PNGs into `root/label`, nudging the shade per file.
pub fn write_class(root: &Path, label: &str, colour: [u8; 3], count: usize) {
    let dir = root.join(label);
    fs::create_dir_all(&dir).unwrap();
    for i in 0..count {
        let shade = |c: u8| c.saturating_sub((i * 3) as u8);
        let pixel = Rgb([shade(colour[0]), shade(colour[1]), shade(colour[2])]);
        RgbImage::from_pixel(16, 12, pixel)
            .save(dir.join(format!("{}_{:02}.png", label, i)))
            .unwrap();
    }
}

pub fn write_png(path: &Path, colour: [u8; 3]) {
    RgbImage::from_pixel(10, 10, Rgb(colour)).save(path).unwrap();
}

/// Red, green and blue classes with `per_class` images each.
pub fn write_rgb_dataset(root: &Path, per_class: usize) {
    write_class(root, "red", [230, 20, 20], per_class);
    write_class(root, "green", [20, 230, 20], per_class);
    write_class(root, "blue", [20, 20, 230], per_class);
}

/// Stand-in for the pretrained network: the mean of each colour channel.
pub struct ColourExtractor {
    pub output_name: String,
}

impl Default for ColourExtractor {
    fn default() -> Self {
        Self {
            output_name: ImageSettings::default().output_name,
        }
    }
}

impl FeatureExtractor for ColourExtractor {
    fn extract(&self, pixels: &Array4<f32>) -> Result<Array1<f32>, ClassifierError> {
        // NHWC with a batch of one
        Ok((0..3)
            .map(|c| pixels.index_axis(Axis(3), c).mean().unwrap_or(0.0) / 255.0)
            .collect())
    }

    fn descriptor(&self) -> ExtractorDescriptor {
        ExtractorDescriptor {
            input_name: "input".into(),
            output_name: self.output_name.clone(),
            feature_size: Some(3),
            fingerprint: None,
        }
    }
}
