use std::sync::Mutex;

use image::{Rgba, RgbaImage};
use mathcanvas::CanvasError;
use mathcanvas::service::{RecognitionRequest, RecognitionResult, RecognitionService};

/// In-memory stand-in for the recognition service.
///
/// Replies with canned results (or a transport failure) and keeps every
/// request it receives for inspection.
#[derive(Default)]
pub struct FakeService {
    pub results: Vec<RecognitionResult>,
    pub fail: bool,
    pub requests: Mutex<Vec<RecognitionRequest>>,
}

#[allow(dead_code)]
impl FakeService {
    pub fn answering(results: Vec<RecognitionResult>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<RecognitionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: &RecognitionRequest) -> Result<(), CanvasError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(CanvasError::TransportFailure("connection refused".into()));
        }
        Ok(())
    }
}

impl RecognitionService for FakeService {
    fn calculate(&self, request: &RecognitionRequest) -> Result<Vec<RecognitionResult>, CanvasError> {
        self.record(request)?;
        Ok(self.results.clone())
    }

    fn generate(&self, request: &RecognitionRequest) -> Result<RgbaImage, CanvasError> {
        self.record(request)?;
        Ok(RgbaImage::from_pixel(4, 4, Rgba([0, 128, 255, 255])))
    }
}
