use crate::pipeline::{Outcome, RejectReason};
use crate::store::{NewPrediction, Prawn, SavedPrediction};
use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};

/// A photo to predict on, base64 or data URI
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub image: Option<String>,
}

/// The JSON body of `/api/predict`. Only the fields relevant to the outcome
/// are present.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until_hatch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_day: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_prediction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_prawn_detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<String>,
}

impl PredictResponse {
    /// The HTTP status and body for a pipeline outcome
    pub fn from_outcome(outcome: Outcome) -> (StatusCode, Self) {
        match outcome {
            Outcome::Success(r) => (
                StatusCode::OK,
                PredictResponse {
                    success: true,
                    days_until_hatch: Some(r.days_until_hatch),
                    confidence: Some(r.confidence),
                    current_day: Some(r.current_day),
                    raw_prediction: Some(r.raw_prediction),
                    ..Default::default()
                },
            ),
            Outcome::Placeholder(p) => (
                StatusCode::OK,
                PredictResponse {
                    success: true,
                    days_until_hatch: Some(p.days_until_hatch),
                    confidence: Some(p.confidence),
                    current_day: Some(p.current_day),
                    note: Some(p.note.to_string()),
                    ..Default::default()
                },
            ),
            Outcome::Rejected(rejection) => (
                StatusCode::BAD_REQUEST,
                PredictResponse {
                    success: false,
                    error: Some(rejection.reason.message().to_string()),
                    reason: Some(rejection.reason),
                    no_prawn_detected: Some(true),
                    debug_info: rejection.debug_info,
                    ..Default::default()
                },
            ),
            Outcome::MissingInput => (
                StatusCode::BAD_REQUEST,
                PredictResponse {
                    success: false,
                    error: Some("No image data provided".to_string()),
                    ..Default::default()
                },
            ),
            Outcome::Failed(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                PredictResponse {
                    success: false,
                    error: Some(message),
                    ..Default::default()
                },
            ),
        }
    }
}

/// An accepted prediction, with the photo it was made from
#[derive(Debug, Deserialize)]
pub struct SavePredictionRequest {
    #[serde(flatten)]
    pub prediction: NewPrediction,
    #[serde(default)]
    pub image_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SavePrawnRequest {
    pub name: String,
    pub date_of_birth: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletePrawnRequest {
    pub prawn_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PredictionsQuery {
    pub prawn_id: i64,
}

/// Reply to a write that returns nothing but a message
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PrawnResponse {
    pub success: bool,
    pub prawn: Prawn,
}

#[derive(Debug, Serialize)]
pub struct PrawnsResponse {
    pub success: bool,
    pub prawns: Vec<Prawn>,
}

#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    pub success: bool,
    pub predictions: Vec<SavedPrediction>,
}
