use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuantizeError {
    #[error("input has {input} samples but output has room for {output}")]
    LengthMismatch { input: usize, output: usize },

    #[error("invalid calibration range [{min}, {max}]")]
    InvalidRange { min: f32, max: f32 },

    #[error("non-finite transform parameters (slope {slope}, intercept {intercept})")]
    NonFinite { slope: f32, intercept: f32 },
}
