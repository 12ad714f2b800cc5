//! Recognition service client.
//!
//! The canvas engine only needs a synchronous request/response contract:
//! [`RecognitionService`]. [`HttpRecognitionService`] implements it over a
//! blocking HTTP client; tests substitute an in-memory fake.

use std::collections::BTreeMap;
use std::time::Duration;

use image::RgbaImage;
use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CanvasError;

/// Accumulated variable assignments, resent with every request.
pub type SymbolValues = BTreeMap<String, String>;

/// Body of both the calculate and generate requests.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecognitionRequest {
    /// PNG data URL of the full surface.
    pub image: String,
    #[serde(rename = "dict_of_vars")]
    pub symbol_values: SymbolValues,
}

/// One recognised expression.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RecognitionResult {
    #[serde(rename = "expr")]
    pub expression: String,
    #[serde(deserialize_with = "string_or_number")]
    pub result: String,
    #[serde(rename = "assign", default)]
    pub is_assignment: bool,
}

impl RecognitionResult {
    pub fn new(expression: impl Into<String>, result: impl Into<String>, is_assignment: bool) -> Self {
        Self {
            expression: expression.into(),
            result: result.into(),
            is_assignment,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CalculateResponse {
    #[serde(default)]
    data: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    image: String,
}

/// Results may come back as `"4"` or `4`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// Parse a calculate response body.
pub fn parse_calculate_response(body: &str) -> Result<Vec<RecognitionResult>, CanvasError> {
    let parsed: CalculateResponse = serde_json::from_str(body)?;
    Ok(parsed.data)
}

/// Parse a generate response body and decode its image.
pub fn parse_generate_response(body: &str) -> Result<RgbaImage, CanvasError> {
    let parsed: GenerateResponse = serde_json::from_str(body)?;
    crate::io::decode_image_payload(&parsed.image)
}

/// The external recognition/solving collaborator.
pub trait RecognitionService {
    /// Recognise and solve the expressions drawn in `request.image`.
    fn calculate(&self, request: &RecognitionRequest) -> Result<Vec<RecognitionResult>, CanvasError>;

    /// Produce an image from the drawing.
    fn generate(&self, request: &RecognitionRequest) -> Result<RgbaImage, CanvasError>;
}

// ============================================================================
// HTTP transport
// ============================================================================

/// Talks JSON to `<base_url>/calculate` and `<base_url>/generate`.
/// No retries: a failed call is reported once and the caller decides.
#[derive(Clone, Debug)]
pub struct HttpRecognitionService {
    client: Client,
    base_url: String,
}

impl HttpRecognitionService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CanvasError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("MathCanvas/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, endpoint: &str, request: &RecognitionRequest) -> Result<String, CanvasError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let body = serde_json::to_vec(request)?;
        tracing::debug!("POST {} ({} bytes)", url, body.len());
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(CanvasError::TransportFailure(format!(
                "{} answered {}",
                url, status
            )));
        }
        Ok(text)
    }
}

impl RecognitionService for HttpRecognitionService {
    fn calculate(&self, request: &RecognitionRequest) -> Result<Vec<RecognitionResult>, CanvasError> {
        let body = self.post("calculate", request)?;
        parse_calculate_response(&body)
    }

    fn generate(&self, request: &RecognitionRequest) -> Result<RgbaImage, CanvasError> {
        let body = self.post("generate", request)?;
        parse_generate_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_service_field_names() {
        let mut vars = SymbolValues::new();
        vars.insert("x".into(), "3".into());
        let req = RecognitionRequest {
            image: "data:image/png;base64,AAAA".into(),
            symbol_values: vars,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["image"], "data:image/png;base64,AAAA");
        assert_eq!(json["dict_of_vars"]["x"], "3");
    }

    #[test]
    fn calculate_response_normalises_results() {
        let body = r#"{"message":"ok","data":[
            {"expr":"2 + 2","result":4,"assign":false},
            {"expr":"x","result":"5","assign":true},
            {"expr":"y","result":1.5}
        ],"status":"success"}"#;
        let results = parse_calculate_response(body).unwrap();
        assert_eq!(
            results,
            vec![
                RecognitionResult::new("2 + 2", "4", false),
                RecognitionResult::new("x", "5", true),
                RecognitionResult::new("y", "1.5", false),
            ]
        );
    }

    #[test]
    fn missing_data_is_an_empty_result_set() {
        assert!(parse_calculate_response("{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_body_is_a_transport_failure() {
        assert!(matches!(
            parse_calculate_response("<html>oops</html>"),
            Err(CanvasError::TransportFailure(_))
        ));
        assert!(matches!(
            parse_generate_response(r#"{"image": 7}"#),
            Err(CanvasError::TransportFailure(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let svc = HttpRecognitionService::new("http://localhost:8900/", Duration::from_secs(1)).unwrap();
        assert_eq!(svc.base_url(), "http://localhost:8900");
    }
}
