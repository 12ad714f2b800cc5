//! Error taxonomy shared by the canvas engine, the session and the service client.

use thiserror::Error;

/// Errors surfaced by canvas operations and recognition exports.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// A pixel coordinate fell outside the surface. Input routing clamps
    /// pointer positions first, so this only reaches callers that bypass it.
    #[error("pixel ({x}, {y}) is outside the {width}x{height} surface")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    /// The surface (or a returned image) could not be encoded/decoded.
    #[error("image encoding failed: {0}")]
    EncodingFailure(String),

    /// The recognition service was unreachable or answered with garbage.
    #[error("recognition service failed: {0}")]
    TransportFailure(String),
}

impl From<image::ImageError> for CanvasError {
    fn from(e: image::ImageError) -> Self {
        CanvasError::EncodingFailure(e.to_string())
    }
}

impl From<reqwest::Error> for CanvasError {
    fn from(e: reqwest::Error) -> Self {
        CanvasError::TransportFailure(e.to_string())
    }
}

impl From<serde_json::Error> for CanvasError {
    fn from(e: serde_json::Error) -> Self {
        CanvasError::TransportFailure(format!("invalid response body: {}", e))
    }
}

impl CanvasError {
    /// Short text for status bars and CLI output.
    pub fn user_message(&self) -> String {
        match self {
            CanvasError::OutOfBounds { .. } => "Internal error: coordinate out of range".to_string(),
            CanvasError::EncodingFailure(e) => format!("Could not encode the drawing: {}", e),
            CanvasError::TransportFailure(e) => format!("Could not reach the solver: {}", e),
        }
    }
}
