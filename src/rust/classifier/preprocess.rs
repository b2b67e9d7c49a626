use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use crate::dataset::ImageSource;

/// How images are shaped before they reach the pretrained network, and which
/// tensors of that network are read.
///
/// The defaults match the Inception v1 graph: 224x224 RGB, channels last,
/// a mean offset of 117 and the `softmax2_pre_activation` feature layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    pub width: u32,
    pub height: u32,
    /// `true` for NHWC (interleaved colours), `false` for NCHW
    pub channels_last: bool,
    /// Subtracted from every 0..=255 channel value
    pub mean: f32,
    /// Applied after the mean offset
    pub scale: f32,
    /// Name of the network's image input tensor
    pub input_name: String,
    /// Name of the tensor used as the feature vector
    pub output_name: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            channels_last: true,
            mean: 117.0,
            scale: 1.0,
            input_name: "input".to_string(),
            output_name: "softmax2_pre_activation".to_string(),
        }
    }
}

impl ImageSettings {
    /// Shape of the batched input tensor produced by [`ImagePreprocessor::extract_pixels`]
    pub fn input_shape(&self) -> [usize; 4] {
        let (h, w) = (self.height as usize, self.width as usize);
        if self.channels_last {
            [1, h, w, 3]
        } else {
            [1, 3, h, w]
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ClassifierError> {
        if self.width == 0 || self.height == 0 {
            return Err(ClassifierError::ValidationError(format!(
                "Image size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.input_name.is_empty() || self.output_name.is_empty() {
            return Err(ClassifierError::ValidationError(
                "Input and output tensor names cannot be empty".into(),
            ));
        }
        if !self.scale.is_finite() || !self.mean.is_finite() {
            return Err(ClassifierError::ValidationError(
                "Mean and scale must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Turns an [`ImageSource`] into the batched pixel tensor the network expects.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    settings: ImageSettings,
}

impl ImagePreprocessor {
    pub fn new(settings: ImageSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ImageSettings {
        &self.settings
    }

    /// Decodes the image from disk or memory
    pub fn load(&self, source: &ImageSource) -> Result<DynamicImage, ClassifierError> {
        let image = match source {
            ImageSource::Path(path) => image::open(path)?,
            ImageSource::Bytes(bytes) => image::load_from_memory(bytes)?,
        };
        Ok(image)
    }

    /// Resizes to exactly the configured input size, ignoring aspect ratio
    pub fn resize(&self, image: &DynamicImage) -> DynamicImage {
        image.resize_exact(self.settings.width, self.settings.height, FilterType::Triangle)
    }

    /// Extracts RGB pixels as `(v - mean) * scale` with a leading batch dimension.
    ///
    /// The image must already have the configured size.
    pub fn extract_pixels(&self, image: &DynamicImage) -> Result<Array4<f32>, ClassifierError> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width != self.settings.width || height != self.settings.height {
            return Err(ClassifierError::ValidationError(format!(
                "Expected a {}x{} image, got {}x{}",
                self.settings.width, self.settings.height, width, height
            )));
        }

        let mean = self.settings.mean;
        let scale = self.settings.scale;
        let mut pixels = Array4::<f32>::zeros(self.settings.input_shape());
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let value = (pixel.0[c] as f32 - mean) * scale;
                if self.settings.channels_last {
                    pixels[[0, y, x, c]] = value;
                } else {
                    pixels[[0, c, y, x]] = value;
                }
            }
        }
        Ok(pixels)
    }

    /// Load, resize and extract in one step
    pub fn prepare(&self, source: &ImageSource) -> Result<Array4<f32>, ClassifierError> {
        let image = self.load(source)?;
        let resized = self.resize(&image);
        self.extract_pixels(&resized)
    }
}
