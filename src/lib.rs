pub mod pipeline;
pub mod preprocess;
pub mod quality;
pub mod sanitize;
pub mod server;
pub mod settings;
pub mod store;
pub mod torch;

/// Hatchly domain constants. Anything an operator may want to change at
/// runtime lives in `settings` instead.
pub mod config {
    /// Total maturation period of a prawn egg cluster, in days
    pub const CYCLE_LENGTH: i64 = 21;

    /// Side length of the square model input
    pub const INPUT_SIZE: u32 = 224;

    /// Number of color channels in the model input
    pub const INPUT_CHANNELS: usize = 3;

    /// Mean pixel value below which an image is considered too dark
    pub const MIN_BRIGHTNESS: f32 = 0.05;

    /// Mean pixel value above which an image is considered overexposed
    pub const MAX_BRIGHTNESS: f32 = 0.98;

    /// Standard deviation below which an image is considered blank
    pub const MIN_TEXTURE: f32 = 0.05;

    /// Classifier probability below which no eggs are assumed present
    pub const SUBJECT_THRESHOLD: f32 = 0.5;

    /// Raw predictions below this are rejected as invalid
    pub const MIN_RAW_PREDICTION: f64 = -1.0;

    /// Raw predictions above this are rejected as biologically unrealistic
    pub const MAX_RAW_PREDICTION: f64 = 25.0;

    /// Confidence lost per day of distance from the nearest whole day
    pub const CONFIDENCE_PENALTY: f64 = 20.0;

    pub const MIN_CONFIDENCE: f64 = 60.0;
    pub const MAX_CONFIDENCE: f64 = 99.0;

    /// Results below this confidence are rejected. Unreachable while the
    /// penalty is 20 and the clamp floor is 60, since the worst offset after
    /// rounding is half a day.
    pub const REJECT_CONFIDENCE: f64 = 65.0;

    /// Returned in place of a real prediction when no regression model loaded
    pub const DUMMY_DAYS_UNTIL_HATCH: i64 = 7;
    pub const DUMMY_CONFIDENCE: f64 = 85.5;
    pub const DUMMY_CURRENT_DAY: i64 = 14;
    pub const DUMMY_NOTE: &str = "Using dummy prediction - model not loaded";

    /// Largest accepted request body
    pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;
}
