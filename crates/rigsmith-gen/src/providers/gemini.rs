//! Google Generative Language provider (Imagen, Gemini, Veo)
//!
//! Images come from Imagen's `:predict`, detection, description and face
//! analysis from Gemini's `:generateContent` (JSON response schemas where a
//! structured answer is needed), and video from Veo's
//! `:predictLongRunning`, which returns an operation that is polled until
//! done.

use crate::config::RigConfig;
use crate::prompt::{ANALYZE_PROMPT, DEFAULT_DESCRIPTION, DESCRIBE_PROMPT, DETECT_PROMPT};
use crate::provider::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rigsmith_core::{
    decode_image, encode_png, BoundingBox, RasterBuffer, Result, RigError, RiggingAnalysis,
};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_RETRIES: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
const POLL_INTERVAL_SECS: u64 = 5;
/// 10 minutes at the poll interval
const MAX_POLL_ATTEMPTS: u32 = 120;
/// Generated media can be far larger than ureq's default body limit
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Provider for the Gemini API family
pub struct GeminiProvider {
    api_key: String,
    api_url: String,
    image_model: String,
    text_model: String,
    video_model: String,
}

impl GeminiProvider {
    pub fn from_config(config: &RigConfig) -> Result<Self> {
        let api_key = config
            .api_key("gemini")
            .ok_or_else(|| {
                RigError::ConfigError(
                    "Gemini API key not configured. Set RIGSMITH_GEMINI_API_KEY or add to .rigsmith/config.toml".to_string(),
                )
            })?
            .to_string();

        let api_url = config
            .api_url("gemini")
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_key,
            api_url,
            image_model: config.generation.image_model.clone(),
            text_model: config.generation.text_model.clone(),
            video_model: config.generation.video_model.clone(),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.api_url, model, method)
    }

    /// Ask the text model about an image, optionally constraining the answer
    /// to a JSON schema; returns the model's text
    fn ask_about_image(
        &self,
        image: &RasterBuffer,
        question: &str,
        schema: Option<Value>,
    ) -> Result<String> {
        let png = encode_png(image)?;
        let mut payload = json!({
            "contents": [{
                "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode(&png) } },
                    { "text": question }
                ]
            }]
        });
        if let Some(schema) = schema {
            payload["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": schema
            });
        }

        let response = self.post_json_with_retry(
            &self.model_url(&self.text_model, "generateContent"),
            &payload,
        )?;
        parse_content_text(&response)
    }

    fn post_json_with_retry(&self, url: &str, payload: &Value) -> Result<Value> {
        for attempt in 0..MAX_RETRIES {
            let agent = build_agent();
            let response = agent
                .post(url)
                .header(API_KEY_HEADER, &self.api_key)
                .header("Content-Type", "application/json")
                .send_json(payload);

            match response {
                Ok(mut ok) => {
                    return ok
                        .body_mut()
                        .with_config()
                        .limit(MAX_BODY_BYTES)
                        .read_json()
                        .map_err(|e| {
                            RigError::GenerationFailed(format!(
                                "Failed to parse Gemini response: {}",
                                e
                            ))
                        });
                }
                Err(e) => {
                    if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) {
                        tracing::debug!(url, attempt, error = %e, "retrying Gemini request");
                        sleep_backoff(attempt);
                        continue;
                    }
                    return Err(RigError::GenerationFailed(format!(
                        "Gemini API request failed: {}",
                        e
                    )));
                }
            }
        }

        Err(RigError::GenerationFailed(
            "Gemini API request failed after retries".to_string(),
        ))
    }

    fn get_json_with_retry(&self, url: &str) -> Result<Value> {
        for attempt in 0..MAX_RETRIES {
            let agent = build_agent();
            let response = agent.get(url).header(API_KEY_HEADER, &self.api_key).call();

            match response {
                Ok(mut ok) => {
                    return ok.body_mut().read_json().map_err(|e| {
                        RigError::GenerationFailed(format!(
                            "Failed to parse operation status: {}",
                            e
                        ))
                    });
                }
                Err(e) => {
                    if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) {
                        tracing::debug!(url, attempt, error = %e, "retrying operation poll");
                        sleep_backoff(attempt);
                        continue;
                    }
                    return Err(RigError::GenerationFailed(format!(
                        "Operation poll failed: {}",
                        e
                    )));
                }
            }
        }

        Err(RigError::GenerationFailed(
            "Operation poll failed after retries".to_string(),
        ))
    }

    fn download_bytes_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        for attempt in 0..MAX_RETRIES {
            let agent = build_agent();
            let response = agent.get(url).header(API_KEY_HEADER, &self.api_key).call();

            match response {
                Ok(ok) => {
                    let mut reader = ok.into_body().into_reader();
                    let mut bytes = Vec::new();
                    std::io::Read::read_to_end(&mut reader, &mut bytes).map_err(|e| {
                        RigError::GenerationFailed(format!("Failed to read video data: {}", e))
                    })?;
                    return Ok(bytes);
                }
                Err(e) => {
                    if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) {
                        tracing::debug!(attempt, error = %e, "retrying video download");
                        sleep_backoff(attempt);
                        continue;
                    }
                    return Err(RigError::GenerationFailed(format!(
                        "Failed to download video: {}",
                        e
                    )));
                }
            }
        }

        Err(RigError::GenerationFailed(
            "Video download failed after retries".to_string(),
        ))
    }
}

fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .build();
    config.into()
}

fn is_retryable_error(e: &ureq::Error) -> bool {
    match e {
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound => true,
        ureq::Error::StatusCode(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
        _ => false,
    }
}

fn sleep_backoff(attempt: usize) {
    let delay_ms = RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt);
    std::thread::sleep(Duration::from_millis(delay_ms));
}

impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn health_check(&self) -> Result<ProviderStatus> {
        if self.api_key.is_empty() {
            return Ok(ProviderStatus::NoApiKey);
        }
        Ok(ProviderStatus::Available)
    }

    fn generate_image(&self, prompt: &str, aspect: AspectRatio) -> Result<RasterBuffer> {
        let payload = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": aspect.as_str(),
                "outputOptions": { "mimeType": "image/png" }
            }
        });
        let response =
            self.post_json_with_retry(&self.model_url(&self.image_model, "predict"), &payload)?;
        let encoded = parse_image_prediction(&response)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| RigError::GenerationFailed(format!("Invalid image data: {}", e)))?;
        decode_image(&bytes)
    }

    fn generate_video(&self, prompt: &str, still: &RasterBuffer) -> Result<Vec<u8>> {
        let png = encode_png(still)?;
        let payload = json!({
            "instances": [{
                "prompt": prompt,
                "image": { "bytesBase64Encoded": STANDARD.encode(&png), "mimeType": "image/png" }
            }],
            "parameters": {
                "sampleCount": 1,
                "resolution": "720p",
                "aspectRatio": AspectRatio::Portrait9x16.as_str()
            }
        });
        let submitted = self.post_json_with_retry(
            &self.model_url(&self.video_model, "predictLongRunning"),
            &payload,
        )?;
        let operation = submitted
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| {
                RigError::GenerationFailed("Veo response did not name an operation".to_string())
            })?
            .to_string();
        tracing::info!(operation = %operation, "video generation submitted");

        let poll_url = format!("{}/{}", self.api_url, operation);
        let mut poll_attempts = 0u32;
        let video_uri = loop {
            poll_attempts += 1;
            if poll_attempts > MAX_POLL_ATTEMPTS {
                return Err(RigError::GenerationFailed(format!(
                    "Video generation timed out after {} poll attempts",
                    MAX_POLL_ATTEMPTS
                )));
            }
            std::thread::sleep(Duration::from_secs(POLL_INTERVAL_SECS));

            let status = self.get_json_with_retry(&poll_url)?;
            if let Some(uri) = parse_video_operation(&status)? {
                break uri;
            }
            tracing::debug!(attempt = poll_attempts, "video still processing");
        };

        self.download_bytes_with_retry(&video_uri)
    }

    fn detect_bounding_box(&self, image: &RasterBuffer) -> Result<BoundingBox> {
        let schema = json!({ "type": "ARRAY", "items": { "type": "INTEGER" } });
        let text = self.ask_about_image(image, DETECT_PROMPT, Some(schema))?;
        parse_detection(&text)
    }

    fn describe(&self, image: &RasterBuffer) -> Result<String> {
        let text = self.ask_about_image(image, DESCRIBE_PROMPT, None)?;
        Ok(description_or_default(&text))
    }

    fn analyze_face(&self, image: &RasterBuffer) -> Result<RiggingAnalysis> {
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "faceBoundingBox": {
                    "type": "ARRAY",
                    "items": { "type": "INTEGER" },
                    "description": "[ymin, xmin, ymax, xmax] on 0-1000 scale"
                },
                "recommendations": { "type": "STRING" }
            },
            "required": ["faceBoundingBox", "recommendations"]
        });
        let text = self.ask_about_image(image, ANALYZE_PROMPT, Some(schema))?;
        Ok(RiggingAnalysis::from_response_or_default(&text))
    }
}

/// Base64 image bytes from an Imagen `:predict` response
pub fn parse_image_prediction(response: &Value) -> Result<&str> {
    response
        .get("predictions")
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.first())
        .and_then(|p| p.get("bytesBase64Encoded"))
        .and_then(|b| b.as_str())
        .ok_or_else(|| {
            let reason = response
                .pointer("/predictions/0/raiFilteredReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no image returned");
            RigError::GenerationFailed(format!("Failed to generate image: {}", reason))
        })
}

/// Concatenated text parts of the first `:generateContent` candidate
pub fn parse_content_text(response: &Value) -> Result<String> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            RigError::GenerationFailed("Gemini response had no candidate content".to_string())
        })?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

/// A `[ymin, xmin, ymax, xmax]` array on the 0-1000 scale
pub fn parse_detection(text: &str) -> Result<BoundingBox> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| RigError::DetectionFailed(format!("detection was not JSON: {}", e)))?;
    let coords: Vec<i64> = value
        .as_array()
        .ok_or_else(|| RigError::DetectionFailed("detection was not an array".to_string()))?
        .iter()
        .map(|v| v.as_f64().map(|f| f.round() as i64))
        .collect::<Option<_>>()
        .ok_or_else(|| RigError::DetectionFailed("detection contains non-numbers".to_string()))?;
    BoundingBox::from_values(&coords)
}

/// The model's description, or [`DEFAULT_DESCRIPTION`] when empty
pub fn description_or_default(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        text.to_string()
    }
}

/// `Some(uri)` once a Veo operation is done, `None` while it is running
pub fn parse_video_operation(status: &Value) -> Result<Option<String>> {
    if !status.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
        return Ok(None);
    }
    if let Some(error) = status.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(RigError::GenerationFailed(format!(
            "Video generation failed: {}",
            message
        )));
    }
    status
        .pointer("/response/generateVideoResponse/generatedSamples/0/video/uri")
        .and_then(|u| u.as_str())
        .map(|u| Some(u.to_string()))
        .ok_or_else(|| {
            RigError::GenerationFailed("Video generation finished without a video URI".to_string())
        })
}
