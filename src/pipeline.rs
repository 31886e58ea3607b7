//! The prediction pipeline: decode, quality gate, subject gate, regression,
//! sanitizer and cycle mapping. Every stage can short-circuit with a
//! rejection; only a request that passes them all yields a prediction.

use crate::config::*;
use crate::preprocess::{self, InputTensor};
use crate::quality;
use crate::sanitize;
use crate::torch::{ModelSlot, ScalarModel};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// A successful prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub days_until_hatch: i64,
    pub confidence: f64,
    pub current_day: i64,
    /// The model output after clamping into the cycle, before rounding
    pub raw_prediction: f64,
}

/// The fixed result handed out when no regression model is loaded
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placeholder {
    pub days_until_hatch: i64,
    pub confidence: f64,
    pub current_day: i64,
    pub note: &'static str,
}

impl Default for Placeholder {
    fn default() -> Self {
        Placeholder {
            days_until_hatch: DUMMY_DAYS_UNTIL_HATCH,
            confidence: DUMMY_CONFIDENCE,
            current_day: DUMMY_CURRENT_DAY,
            note: DUMMY_NOTE,
        }
    }
}

/// Why an image was turned away. All of these are recoverable by taking a
/// better photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TooDark,
    Overexposed,
    Uniform,
    SubjectNotDetected,
    InvalidPrediction,
    UnrealisticPrediction,
    LowConfidence,
}

impl RejectReason {
    /// The message shown to the user
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::TooDark => {
                "Image too dark. Cannot detect prawn eggs. Please use better lighting."
            }
            RejectReason::Overexposed => {
                "Image overexposed. Cannot detect prawn eggs. Please adjust lighting."
            }
            RejectReason::Uniform => "No prawn eggs detected. Image appears blank or uniform.",
            RejectReason::SubjectNotDetected => {
                "No prawn eggs detected. Please upload a clear photo of prawn eggs."
            }
            RejectReason::InvalidPrediction => {
                "Invalid prediction result. Image may not contain prawn eggs."
            }
            RejectReason::UnrealisticPrediction => {
                "Prediction outside normal range. Please upload a clear image of prawn eggs."
            }
            RejectReason::LowConfidence => {
                "Low confidence prediction. Image quality may be poor. Please try again with a clearer image."
            }
        }
    }
}

/// A rejected image, with optional diagnostics that are never the primary
/// message
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub debug_info: Option<String>,
}

impl From<RejectReason> for Rejection {
    fn from(reason: RejectReason) -> Self {
        Rejection {
            reason,
            debug_info: None,
        }
    }
}

impl Rejection {
    fn with_debug(reason: RejectReason, debug_info: String) -> Self {
        Rejection {
            reason,
            debug_info: Some(debug_info),
        }
    }
}

/// What a request for prediction can end in
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(PredictionResult),
    Placeholder(Placeholder),
    Rejected(Rejection),
    /// The request carried no image at all
    MissingInput,
    /// Decoding or inference blew up; the message is returned to the caller
    Failed(String),
}

/// Result of the subject gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubjectCheck {
    Passed { confidence: f32 },
    NotDetected { confidence: f32 },
}

/// Holds both models for the lifetime of the process. Built once at startup
/// and only read afterwards.
pub struct Predictor {
    regressor: ModelSlot<Box<dyn ScalarModel>>,
    classifier: ModelSlot<Box<dyn ScalarModel>>,
}

impl Predictor {
    pub fn new(
        regressor: ModelSlot<Box<dyn ScalarModel>>,
        classifier: ModelSlot<Box<dyn ScalarModel>>,
    ) -> Self {
        Predictor {
            regressor,
            classifier,
        }
    }

    pub fn regressor_available(&self) -> bool {
        self.regressor.is_available()
    }

    pub fn classifier_available(&self) -> bool {
        self.classifier.is_available()
    }

    /// Run the whole pipeline on a base64 or data-URI image
    pub fn predict(&self, image: &str) -> Outcome {
        if image.trim().is_empty() {
            return Outcome::MissingInput;
        }

        // Without a regression model nothing downstream is meaningful, so the
        // placeholder is returned before the image is even decoded.
        let regressor = match &self.regressor {
            ModelSlot::Available(model) => model,
            ModelSlot::Unavailable => {
                warn!("model not loaded, returning dummy prediction");
                return Outcome::Placeholder(Placeholder::default());
            }
        };

        let tensor = match preprocess::load_tensor(image) {
            Ok(tensor) => tensor,
            Err(e) => {
                error!("prediction error: {e:#}");
                return Outcome::Failed(format!("Prediction failed: {e:#}"));
            }
        };

        match self.run(regressor.as_ref(), &tensor) {
            Ok(Ok(result)) => {
                info!(
                    "prediction: {} days (raw: {:.2}, confidence: {:.1}%)",
                    result.days_until_hatch, result.raw_prediction, result.confidence
                );
                Outcome::Success(result)
            }
            Ok(Err(rejection)) => {
                info!(
                    "rejected image: {:?} {}",
                    rejection.reason,
                    rejection.debug_info.as_deref().unwrap_or("")
                );
                Outcome::Rejected(rejection)
            }
            Err(e) => {
                error!("prediction error: {e:?}");
                Outcome::Failed(format!("Prediction failed: {e:#}"))
            }
        }
    }

    /// Gates and regression on an already decoded tensor. The outer error is
    /// an inference failure, the inner one a rejection.
    fn run(
        &self,
        regressor: &dyn ScalarModel,
        tensor: &InputTensor,
    ) -> anyhow::Result<Result<PredictionResult, Rejection>> {
        if let Err(reason) = quality::check(tensor) {
            return Ok(Err(reason.into()));
        }

        if let SubjectCheck::NotDetected { confidence } = self.check_subject(tensor) {
            return Ok(Err(Rejection::with_debug(
                RejectReason::SubjectNotDetected,
                format!("Classifier confidence: {confidence:.3}"),
            )));
        }

        let predicted_days = regressor.predict(tensor)? as f64;
        Ok(finish(predicted_days))
    }

    /// Ask the classifier whether the image shows prawn eggs. A missing or
    /// failing classifier never blocks a prediction.
    pub fn check_subject(&self, tensor: &InputTensor) -> SubjectCheck {
        let classifier = match &self.classifier {
            ModelSlot::Available(model) => model,
            ModelSlot::Unavailable => return SubjectCheck::Passed { confidence: 1.0 },
        };

        match classifier.predict(tensor) {
            Ok(confidence) if confidence < SUBJECT_THRESHOLD => {
                SubjectCheck::NotDetected { confidence }
            }
            Ok(confidence) => SubjectCheck::Passed { confidence },
            Err(e) => {
                warn!("classifier failed, skipping subject check: {e:#}");
                SubjectCheck::Passed { confidence: 1.0 }
            }
        }
    }
}

/// Sanitize a raw regression output and map it onto the cycle
pub fn finish(predicted_days: f64) -> Result<PredictionResult, Rejection> {
    let sanitized = sanitize::sanitize(predicted_days).map_err(|reason| {
        let debug_info = match reason {
            RejectReason::LowConfidence => {
                let clamped = predicted_days.clamp(0., CYCLE_LENGTH as f64);
                let confidence = sanitize::confidence(clamped, clamped.round() as i64);
                format!("Confidence: {confidence:.1}%")
            }
            _ => format!("Predicted: {predicted_days:.2} days"),
        };
        Rejection::with_debug(reason, debug_info)
    })?;

    Ok(PredictionResult {
        days_until_hatch: sanitized.days_until_hatch,
        confidence: sanitized.confidence,
        current_day: sanitize::current_day(sanitized.days_until_hatch),
        raw_prediction: sanitized.clamped,
    })
}
