//! Turns an inbound base64 image into the normalized model input

use crate::config::{INPUT_CHANNELS, INPUT_SIZE};
use anyhow::{Context, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use image::imageops::{self, FilterType};
use ndarray::Array4;

/// An NHWC batch of one image, every value in [0, 1]
pub type InputTensor = Array4<f32>;

/// Strip a `data:image/...;base64,` style prefix. Everything after the first
/// comma is the payload; without a comma the whole string is.
pub fn payload(image: &str) -> &str {
    match image.split_once(',') {
        Some((_, data)) => data,
        None => image,
    }
}

/// Standard alphabet that tolerates non-zero bits after the last symbol,
/// as browser and mobile encoders sometimes emit
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Decode a base64 (or data-URI) string into raw image bytes. ASCII
/// whitespace anywhere in the payload is ignored, so line-wrapped input works.
pub fn decode_b64(image: &str) -> Result<Vec<u8>> {
    let compact: String = payload(image)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    LENIENT.decode(compact).context("invalid base64 image data")
}

/// Decode, force to RGB, resize to the model input size and scale to [0, 1]
pub fn load_tensor(image: &str) -> Result<InputTensor> {
    let bytes = decode_b64(image)?;
    let img = image::load_from_memory(&bytes).context("cannot identify image file")?;
    let rgb = img.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let side = INPUT_SIZE as usize;
    let tensor = Array4::from_shape_fn((1, side, side, INPUT_CHANNELS), |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.
    });
    Ok(tensor)
}
