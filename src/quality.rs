//! Cheap image statistics that reject unusable photos before any model runs

use crate::config::{MAX_BRIGHTNESS, MIN_BRIGHTNESS, MIN_TEXTURE};
use crate::pipeline::RejectReason;
use crate::preprocess::InputTensor;

/// Whole-tensor statistics, taken across every channel at once
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    /// Mean of all values
    pub brightness: f32,

    /// Population standard deviation of all values
    pub texture: f32,
}

impl ImageStats {
    pub fn of(tensor: &InputTensor) -> Self {
        // accumulate in f64; f32 sums drift over 150k elements
        let values = tensor.mapv(f64::from);
        ImageStats {
            brightness: values.mean().unwrap_or(0.) as f32,
            texture: values.std(0.) as f32,
        }
    }
}

/// Run the brightness and texture checks. The first failing check wins:
/// too dark, then overexposed, then uniform.
pub fn check(tensor: &InputTensor) -> Result<ImageStats, RejectReason> {
    let stats = ImageStats::of(tensor);
    if stats.brightness < MIN_BRIGHTNESS {
        return Err(RejectReason::TooDark);
    }
    if stats.brightness > MAX_BRIGHTNESS {
        return Err(RejectReason::Overexposed);
    }
    if stats.texture < MIN_TEXTURE {
        return Err(RejectReason::Uniform);
    }
    Ok(stats)
}
