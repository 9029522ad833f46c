//! Gemini (Google) image generation provider.

use crate::error::{parse_retry_after, sanitize_error_message, Result, StickerError};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProviderKind,
};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality, supports 2K/4K).
    #[default]
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "gemini-3-pro-image-preview",
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GEMINI_API_KEY`, then
    /// `GOOGLE_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL (proxies, regional endpoints).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets an HTTP timeout for the whole request. None by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                StickerError::Auth(
                    "GEMINI_API_KEY / GOOGLE_API_KEY not set and no API key provided".into(),
                )
            })?;

        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }

        Ok(GeminiProvider {
            client: client.build()?,
            api_key,
            model: self.model,
            timeout: self.timeout,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Gemini image generation provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the configured model.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    async fn generate_impl(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let start = Instant::now();

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        let body = GeminiRequest::from_generation_request(request);

        tracing::debug!(
            model = self.model.as_str(),
            aspect_ratio = ?request.aspect_ratio,
            image_size = ?request.image_size,
            input_images = request.input_images.len(),
            "submitting Gemini image generation request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| match self.timeout {
                Some(timeout) if e.is_timeout() => StickerError::Timeout(timeout),
                _ => StickerError::Network(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let body = response.bytes().await?;
        let gemini_response = parse_response_body(&body)?;
        let image = self.image_from_response(gemini_response, request.seed, start)?;

        tracing::debug!(
            bytes = image.size(),
            duration_ms = image.metadata.duration_ms,
            "Gemini image generation complete"
        );
        Ok(image)
    }

    /// Extracts the first inline image from a successful response.
    fn image_from_response(
        &self,
        response: GeminiResponse,
        seed: Option<u64>,
        start: Instant,
    ) -> Result<GeneratedImage> {
        // Prompt blocks come back as HTTP 200
        if let Some(ref feedback) = response.prompt_feedback {
            if let Some(ref reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .clone()
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(StickerError::ContentBlocked(msg));
            }
        }

        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            StickerError::MissingOutput("no candidates in Gemini response".into())
        })?;

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY"
                | "IMAGE_SAFETY"
                | "IMAGE_PROHIBITED_CONTENT"
                | "IMAGE_RECITATION"
                | "RECITATION"
                | "PROHIBITED_CONTENT"
                | "BLOCKLIST" => {
                    return Err(StickerError::ContentBlocked(format!(
                        "Content blocked by Gemini safety filter: {}",
                        finish_reason
                    )));
                }
                "IMAGE_OTHER" | "NO_IMAGE" => {
                    return Err(StickerError::MissingOutput(format!(
                        "generation failed: {}. Try a different prompt.",
                        finish_reason
                    )));
                }
                _ => {} // STOP, MAX_TOKENS, etc. are normal
            }
        }

        let content = candidate.content.ok_or_else(|| {
            StickerError::MissingOutput("no content in Gemini candidate".into())
        })?;

        let inline_data = content
            .parts
            .into_iter()
            .find_map(|p| p.inline_data)
            .ok_or_else(|| StickerError::MissingOutput("no image part in Gemini response".into()))?;

        let data = base64::engine::general_purpose::STANDARD
            .decode(inline_data.data.trim())
            .map_err(|e| StickerError::Decode(e.to_string()))?;

        let format = ImageFormat::from_mime_type(&inline_data.mime_type).ok_or_else(|| {
            StickerError::Decode(format!("unsupported mime type: {}", inline_data.mime_type))
        })?;

        Ok(GeneratedImage::new(
            data,
            format,
            ImageProviderKind::Gemini,
            GenerationMetadata {
                model: Some(self.model.as_str().to_string()),
                seed,
                duration_ms: Some(start.elapsed().as_millis() as u64),
                mime_type: Some(inline_data.mime_type),
            },
        ))
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> StickerError {
        let text = sanitize_error_message(text);
        if status == 402 {
            return StickerError::Billing(
                "Gemini billing issue: enable billing at https://aistudio.google.com".into(),
            );
        }
        if status == 404 {
            return StickerError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            );
        }
        if status == 429 {
            let retry_after = parse_retry_after(headers).map(Duration::from_secs);
            return StickerError::RateLimited { retry_after };
        }
        if status == 401 || status == 403 {
            return StickerError::Auth(text);
        }
        let lower = text.to_lowercase();
        if lower.contains("safety")
            || lower.contains("blocked")
            || lower.contains("prohibited")
        {
            return StickerError::ContentBlocked(text);
        }
        StickerError::Api {
            status,
            message: text,
        }
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        self.generate_impl(request).await
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Gemini
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(StickerError::Auth("Invalid API key".into())),
            404 => Err(StickerError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(StickerError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<GeminiImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<&'static str>,
}

impl GeminiRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        // Reference images first, prompt last
        let mut parts: Vec<GeminiRequestPart> = req
            .input_images
            .iter()
            .map(|image| GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                },
            })
            .collect();

        parts.push(GeminiRequestPart::Text {
            text: req.prompt.clone(),
        });

        let image_config = (req.aspect_ratio.is_some() || req.image_size.is_some()).then(|| {
            GeminiImageConfig {
                aspect_ratio: req.aspect_ratio.map(|r| r.as_str()),
                image_size: req.image_size.map(|s| s.as_str()),
            }
        });

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                seed: req.seed,
                image_config,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Parses a 200 body. Proxies sometimes answer with an HTML page.
fn parse_response_body(body: &[u8]) -> Result<GeminiResponse> {
    serde_json::from_slice(body).map_err(|e| {
        let text = String::from_utf8_lossy(body);
        StickerError::UnexpectedResponse(format!(
            "Gemini response is not valid JSON ({e}): {}",
            sanitize_error_message(&text)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::provider::ImageProviderExt;
    use crate::image::types::{AspectRatio, ImageSize, InputImage};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn provider() -> GeminiProvider {
        GeminiProviderBuilder::new()
            .api_key("test-key")
            .build()
            .unwrap()
    }

    fn extract(json: &str) -> Result<GeneratedImage> {
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        provider().image_from_response(resp, None, Instant::now())
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::NanoBananaPro.as_str(),
            "gemini-3-pro-image-preview"
        );
        assert_eq!(GeminiModel::default(), GeminiModel::NanoBananaPro);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = GeminiProviderBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::NanoBanana)
            .base_url("http://localhost:9999/v1beta/")
            .build()
            .unwrap();
        assert_eq!(provider.model(), GeminiModel::NanoBanana);
        assert_eq!(provider.base_url, "http://localhost:9999/v1beta");
        assert!(!format!("{provider:?}").contains("test-key"));
    }

    #[test]
    fn test_request_construction_basic() {
        let req = GenerationRequest::new("A puppy");
        let gemini_req = GeminiRequest::from_generation_request(&req);

        assert_eq!(gemini_req.contents.len(), 1);
        assert_eq!(gemini_req.contents[0].parts.len(), 1);
        assert_eq!(
            gemini_req.generation_config.response_modalities,
            vec!["IMAGE"]
        );
        assert!(gemini_req.generation_config.seed.is_none());
        assert!(gemini_req.generation_config.image_config.is_none());
    }

    #[test]
    fn test_request_image_config() {
        let req = GenerationRequest::new("A puppy")
            .with_aspect_ratio(AspectRatio::Square)
            .with_image_size(ImageSize::TwoK);
        let json = serde_json::to_value(GeminiRequest::from_generation_request(&req)).unwrap();

        assert_eq!(
            json["generationConfig"]["imageConfig"],
            serde_json::json!({"aspectRatio": "1:1", "imageSize": "2K"})
        );
        assert!(json.get("generation_config").is_none());
    }

    #[test]
    fn test_request_input_images_precede_prompt() {
        let png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let req = GenerationRequest::new("Make it a sticker")
            .with_input_image(InputImage::from_bytes(png))
            .with_input_image(InputImage {
                data: vec![1, 2, 3],
                mime_type: "image/jpeg".into(),
            });
        let json = serde_json::to_value(GeminiRequest::from_generation_request(&req)).unwrap();
        let parts = json["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
        assert_eq!(parts[2]["text"], "Make it a sticker");
    }

    #[test]
    fn test_extracts_inline_image() {
        let image = extract(
            r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your sticker"},
                        {"inlineData": {"mimeType": "image/jpeg", "data": "AQID"}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#,
        )
        .unwrap();

        assert_eq!(image.data, vec![1, 2, 3]);
        assert_eq!(image.format, ImageFormat::Jpeg);
        assert_eq!(image.metadata.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(
            image.metadata.model.as_deref(),
            Some("gemini-3-pro-image-preview")
        );
    }

    #[test]
    fn test_text_only_response_is_missing_output() {
        let err = extract(
            r#"{"candidates": [{"content": {"parts": [{"text": "I can't draw that"}]}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, StickerError::MissingOutput(_)));
    }

    #[test]
    fn test_no_candidates_is_missing_output() {
        let err = extract(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, StickerError::MissingOutput(_)));
    }

    #[test]
    fn test_no_image_finish_reason() {
        let err = extract(r#"{"candidates": [{"finishReason": "NO_IMAGE"}]}"#).unwrap_err();
        assert!(matches!(err, StickerError::MissingOutput(_)));
    }

    #[test]
    fn test_bad_base64_is_decode_error() {
        let err = extract(
            r#"{"candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "not base64!!"}}
            ]}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, StickerError::Decode(_)));
    }

    #[test]
    fn test_prompt_feedback_block() {
        let err = extract(
            r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "content blocked: Prompt was blocked due to safety"
        );
    }

    #[test]
    fn test_safety_finish_reason() {
        let err = extract(r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#).unwrap_err();
        assert!(matches!(err, StickerError::ContentBlocked(_)));
    }

    #[test]
    fn test_parse_error_statuses() {
        let provider = provider();
        let mut headers = reqwest::header::HeaderMap::new();

        assert!(matches!(
            provider.parse_error(401, "bad key", &headers),
            StickerError::Auth(_)
        ));
        assert!(matches!(
            provider.parse_error(402, "", &headers),
            StickerError::Billing(_)
        ));
        assert!(matches!(
            provider.parse_error(404, "", &headers),
            StickerError::InvalidRequest(_)
        ));
        assert!(matches!(
            provider.parse_error(500, "internal", &headers),
            StickerError::Api { status: 500, .. }
        ));

        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        match provider.parse_error(429, "slow down", &headers) {
            StickerError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    /// Reads one HTTP request, headers and body, off the stream.
    fn read_request(stream: &mut std::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).expect("read request failed");
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    return;
                }
            }
        }
    }

    /// Serves `body` with status 200 to every connection and counts them.
    fn serve_ok(body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let addr = listener.local_addr().expect("read local addr failed");
        let served = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&served);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                read_request(&mut stream);
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        (format!("http://127.0.0.1:{}/v1beta", addr.port()), served)
    }

    #[test]
    fn test_non_json_body_is_unexpected_response() {
        let err = parse_response_body(b"<html>proxy error</html>").unwrap_err();
        assert!(matches!(err, StickerError::UnexpectedResponse(_)));
        assert!(err.to_string().contains("proxy error"));
    }

    #[tokio::test]
    async fn test_non_json_ok_response_is_not_retried() {
        let (base_url, served) = serve_ok("<html>proxy error</html>");
        let provider = GeminiProviderBuilder::new()
            .api_key("test-key")
            .base_url(base_url)
            .build()
            .unwrap();

        let err = provider
            .generate_with_retries(&GenerationRequest::new("cat"), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, StickerError::UnexpectedResponse(_)));
        assert!(!err.is_retryable());
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }
}
