use image::imageops::{self, FilterType};

use crate::error::PreprocessError;

/// Resize and scaling applied to every upload before inference.
///
/// These must match what the model saw at training time, otherwise the
/// probabilities it returns are meaningless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessConfig {
    pub width: u32,
    pub height: u32,
    pub filter: FilterType,
    pub normalize: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            filter: FilterType::Lanczos3,
            normalize: false,
        }
    }
}

/// A single-image batch in NHWC layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
    pub height: usize,
    pub width: usize,
}

impl ImageTensor {
    pub const CHANNELS: usize = 3;

    pub fn shape(&self) -> [usize; 4] {
        [1, self.height, self.width, Self::CHANNELS]
    }
}

pub fn preprocess_image(
    image_data: &[u8],
    config: &PreprocessConfig,
) -> Result<ImageTensor, PreprocessError> {
    let img = image::load_from_memory(image_data)?;

    let rgb = img.to_rgb8();
    let resized = imageops::resize(&rgb, config.width, config.height, config.filter);

    let scale = if config.normalize { 1.0 / 255.0 } else { 1.0 };
    let mut flat_img = Vec::with_capacity(
        config.width as usize * config.height as usize * ImageTensor::CHANNELS,
    );

    for pixel in resized.pixels() {
        flat_img.push(pixel[0] as f32 * scale);
        flat_img.push(pixel[1] as f32 * scale);
        flat_img.push(pixel[2] as f32 * scale);
    }

    let tensor = ImageTensor {
        data: flat_img,
        height: config.height as usize,
        width: config.width as usize,
    };
    tracing::debug!("Preprocessed image to shape {:?}", tensor.shape());

    Ok(tensor)
}
