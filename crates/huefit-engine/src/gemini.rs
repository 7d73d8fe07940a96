use std::env;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use huefit_contracts::images::EncodedImage;
use huefit_contracts::palette::{parse_palette, ColorSuggestion};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::error::{error_chain_text, truncate_text, GatewayError};
use crate::gateway::{
    analysis_instruction, composition_instruction, restyle_instruction, TryOnGateway,
};

pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

const DEFAULT_TIMEOUT_SECONDS: f64 = 90.0;
const TRANSPORT_RETRIES: usize = 2;
const RETRY_BACKOFF_SECONDS: f64 = 1.2;

/// Gateway backed by the Gemini `generateContent` API over blocking HTTP.
/// The credential is resolved once at construction; a missing key is fatal.
pub struct GeminiGateway {
    api_base: String,
    api_key: String,
    analysis_model: String,
    image_model: String,
    request_timeout: Duration,
    http: HttpClient,
}

impl GeminiGateway {
    pub fn from_env() -> Result<Self, GatewayError> {
        let Some(api_key) = non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
        else {
            return Err(GatewayError::Credentials);
        };
        Ok(Self {
            api_base: env::var("GEMINI_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            api_key,
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS),
            http: HttpClient::new(),
        })
    }

    pub fn with_models(mut self, analysis_model: Option<String>, image_model: Option<String>) -> Self {
        if let Some(model) = analysis_model.filter(|value| !value.trim().is_empty()) {
            self.analysis_model = model;
        }
        if let Some(model) = image_model.filter(|value| !value.trim().is_empty()) {
            self.image_model = model;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn post_with_transport_retries(&self, endpoint: &str, payload: &Value) -> Result<HttpResponse> {
        for attempt in 0..=TRANSPORT_RETRIES {
            let response = self
                .http
                .post(endpoint)
                .query(&[("key", self.api_key.as_str())])
                .timeout(self.request_timeout)
                .json(payload)
                .send();

            match response {
                Ok(ok) => return Ok(ok),
                Err(raw) => {
                    let err =
                        anyhow::Error::new(raw).context(format!("Gemini request failed ({endpoint})"));
                    if !is_retryable_transport_error(&err) || attempt >= TRANSPORT_RETRIES {
                        return Err(err);
                    }
                    let delay_s = RETRY_BACKOFF_SECONDS * (attempt as f64 + 1.0);
                    thread::sleep(Duration::from_secs_f64(delay_s));
                }
            }
        }
        unreachable!("transport retry loop always returns a response or error")
    }

    fn generate(&self, model: &str, payload: Value) -> Result<Value> {
        let endpoint = self.endpoint_for_model(model);
        let response = self.post_with_transport_retries(&endpoint, &payload)?;
        response_json_or_error(response)
    }

    fn analyze_payload(&self, portrait: &EncodedImage) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    inline_image_part(portrait),
                    { "text": analysis_instruction() },
                ],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "colors": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" },
                        },
                    },
                },
            },
        })
    }

    fn image_payload(&self, parts: Vec<Value>) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE", "TEXT"],
            },
        })
    }

    fn analyze_inner(&self, portrait: &EncodedImage) -> Result<Vec<ColorSuggestion>> {
        let response = self.generate(&self.analysis_model, self.analyze_payload(portrait))?;
        let text = extract_text_payload(&response)
            .context("Gemini analysis returned no text payload")?;
        let structured: Value = serde_json::from_str(text.trim())
            .context("Gemini analysis returned unparseable JSON")?;
        parse_palette(&structured).map_err(|reason| anyhow::anyhow!(reason))
    }

    fn image_op_inner(&self, parts: Vec<Value>, artifact_name: &str) -> Result<EncodedImage> {
        let response = self.generate(&self.image_model, self.image_payload(parts))?;
        let Some((bytes, mime_type)) = extract_first_inline_image(&response)? else {
            bail!("no image payload returned");
        };
        Ok(EncodedImage::from_bytes(
            &bytes,
            mime_type.unwrap_or_else(|| "image/png".to_string()),
            artifact_name,
        ))
    }
}

impl TryOnGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze_undertone(
        &self,
        portrait: &EncodedImage,
    ) -> Result<Vec<ColorSuggestion>, GatewayError> {
        self.analyze_inner(portrait)
            .map_err(|err| GatewayError::Analysis(error_chain_text(&err, 512)))
    }

    fn compose_try_on(
        &self,
        person: &EncodedImage,
        garment: &EncodedImage,
        target_hex: &str,
    ) -> Result<EncodedImage, GatewayError> {
        let parts = vec![
            inline_image_part(person),
            inline_image_part(garment),
            json!({ "text": composition_instruction(target_hex) }),
        ];
        self.image_op_inner(parts, "try-on.png")
            .map_err(|err| GatewayError::Composition(error_chain_text(&err, 512)))
    }

    fn restyle_hair(
        &self,
        photo: &EncodedImage,
        style_description: &str,
    ) -> Result<EncodedImage, GatewayError> {
        let parts = vec![
            inline_image_part(photo),
            json!({ "text": restyle_instruction(style_description) }),
        ];
        self.image_op_inner(parts, "restyle.png")
            .map_err(|err| GatewayError::Restyle(error_chain_text(&err, 512)))
    }
}

fn inline_image_part(image: &EncodedImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.data,
        }
    })
}

/// Collects the first non-empty text part across candidates.
fn extract_text_payload(response: &Value) -> Option<&str> {
    candidate_parts(response)
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
}

/// Returns the first inline image part, decoded, with its MIME type. Both
/// `inlineData` and `inline_data` spellings appear in the wild.
fn extract_first_inline_image(response: &Value) -> Result<Option<(Vec<u8>, Option<String>)>> {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    for part in candidate_parts(response) {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64
            .decode(data.as_bytes())
            .context("Gemini image base64 decode failed")?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(Some((bytes, mime_type)));
    }
    Ok(None)
}

fn candidate_parts(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|candidate| {
            candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
        })
        .flatten()
}

fn response_json_or_error(response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().context("Gemini response body read failed")?;
    if !status.is_success() {
        bail!("Gemini request failed ({code}): {}", truncate_text(&body, 512));
    }
    let parsed: Value =
        serde_json::from_str(&body).context("Gemini returned invalid JSON payload")?;
    Ok(parsed)
}

fn is_retryable_transport_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|reqwest_err| {
                reqwest_err.is_timeout() || reqwest_err.is_connect() || reqwest_err.is_request()
            })
            .unwrap_or(false)
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde_json::json;

    use super::*;

    fn gateway() -> GeminiGateway {
        GeminiGateway {
            api_base: "https://example.invalid/v1beta".to_string(),
            api_key: "test-key".to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout: Duration::from_secs(5),
            http: HttpClient::new(),
        }
    }

    #[test]
    fn endpoint_appends_models_prefix_once() {
        let gateway = gateway();
        assert_eq!(
            gateway.endpoint_for_model("gemini-2.5-flash"),
            "https://example.invalid/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            gateway.endpoint_for_model("models/custom"),
            "https://example.invalid/v1beta/models/custom:generateContent"
        );
    }

    #[test]
    fn analyze_payload_carries_inline_part_and_schema() {
        let gateway = gateway();
        let portrait = EncodedImage::from_bytes(&[1, 2, 3], "image/jpeg", "p.jpg");
        let payload = gateway.analyze_payload(&portrait);
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(parts[0]["inlineData"]["data"], json!(portrait.data));
        assert!(parts[1]["text"].as_str().unwrap_or("").contains("6"));
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
    }

    #[test]
    fn text_extraction_skips_empty_and_image_parts() {
        let response = json!({
            "candidates": [{
                "content": { "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": "aaaa" } },
                    { "text": "   " },
                    { "text": "{\"colors\": []}" },
                ]}
            }]
        });
        assert_eq!(extract_text_payload(&response), Some("{\"colors\": []}"));
    }

    #[test]
    fn inline_image_extraction_handles_both_spellings() -> Result<()> {
        let bytes = vec![0x89u8, b'P', b'N', b'G'];
        let encoded = BASE64.encode(&bytes);
        let camel = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": encoded } }
            ]}}]
        });
        let (decoded, mime) = extract_first_inline_image(&camel)?.unwrap();
        assert_eq!(decoded, bytes);
        assert_eq!(mime.as_deref(), Some("image/png"));

        let snake = json!({
            "candidates": [{ "content": { "parts": [
                { "inline_data": { "mime_type": "image/jpeg", "data": BASE64.encode(&bytes) } }
            ]}}]
        });
        let (_, mime) = extract_first_inline_image(&snake)?.unwrap();
        assert_eq!(mime.as_deref(), Some("image/jpeg"));
        Ok(())
    }

    #[test]
    fn missing_image_parts_yield_none() -> Result<()> {
        let response = json!({
            "candidates": [{ "content": { "parts": [ { "text": "sorry" } ] } }]
        });
        assert!(extract_first_inline_image(&response)?.is_none());
        Ok(())
    }
}
