//! Client-side capture and generation: turning text into QR images, turning
//! camera frames or uploads back into text, and submitting results to the API.

pub mod client;
pub mod codec;
pub mod content;
pub mod generate;
pub mod scan;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot encode text as QR code: {0}")]
    Encode(String),

    #[error("cannot read image: {0}")]
    Image(#[from] image::ImageError),

    #[error("unusable font: {0}")]
    Font(String),

    #[error("malformed data URI: {0}")]
    DataUri(String),

    #[error("camera error: {0}")]
    Camera(String),

    #[error("decoder task failed: {0}")]
    Decoder(String),
}
