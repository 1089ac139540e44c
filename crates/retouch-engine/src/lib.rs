use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use retouch_contracts::asset::{sniff_media_type, ImageAsset, MAX_UPLOAD_BYTES};
use retouch_contracts::error::{EditError, EditResult};
use retouch_contracts::events::{now_utc_iso, EventPayload, EventWriter};
use retouch_contracts::models::{ModelRegistry, ModelSpec};
use retouch_contracts::operation::Operation;
use retouch_contracts::prompt::build_prompt;
use retouch_contracts::session::{derive_result_meta, EditRecord, SessionPhase, SessionState};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const GEMINI_DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One remote edit call: the source image, the instruction, the model.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub prompt: String,
    pub image_base64: String,
    pub media_type: String,
    pub model: String,
}

/// First inline image found in a provider response.
#[derive(Debug, Clone)]
pub struct EditReply {
    pub image_base64: String,
    pub media_type: Option<String>,
}

pub trait EditProvider: Send + Sync {
    fn name(&self) -> &str;
    fn edit(&self, request: &EditRequest) -> EditResult<EditReply>;
}

#[derive(Default)]
pub struct EditProviderRegistry {
    providers: BTreeMap<String, Box<dyn EditProvider>>,
}

impl EditProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: EditProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn EditProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

/// Offline provider: answers every edit with a small synthesized PNG
/// whose color is derived from the prompt.
pub struct DryrunProvider;

impl EditProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn edit(&self, request: &EditRequest) -> EditResult<EditReply> {
        let bytes = render_dryrun_image(&request.prompt, 64, 64)?;
        Ok(EditReply {
            image_base64: BASE64.encode(bytes),
            media_type: Some("image/png".to_string()),
        })
    }
}

fn render_dryrun_image(prompt: &str, width: u32, height: u32) -> EditResult<Vec<u8>> {
    let (r, g, b) = color_from_prompt(prompt);
    let mut canvas = RgbImage::new(width, height);
    for pixel in canvas.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut buffer = Cursor::new(Vec::new());
    canvas
        .write_to(&mut buffer, ImageFormat::Png)
        .context("dryrun image encode failed")?;
    Ok(buffer.into_inner())
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

/// Client for the Gemini `generateContent` image endpoint.
pub struct GeminiProvider {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl GeminiProvider {
    /// Fails when no API key is present in the environment. A session
    /// must not be able to reach dispatch without a credential.
    pub fn from_env() -> EditResult<Self> {
        let Some(api_key) = api_key_from_env() else {
            return Err(EditError::configuration(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set",
            ));
        };
        let api_base =
            non_empty_env("GEMINI_API_BASE").unwrap_or_else(|| GEMINI_DEFAULT_API_BASE.to_string());
        Ok(Self::new(api_key, api_base))
    }

    fn new(api_key: String, api_base: String) -> Self {
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key,
            http: HttpClient::new(),
        }
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

    /// Request body: the source image first, then the instruction, and
    /// an image-only response modality.
    fn build_payload(request: &EditRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": request.media_type,
                            "data": request.image_base64,
                        }
                    },
                    { "text": request.prompt },
                ],
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
            },
        })
    }

    /// Walk candidates in order, then parts in order, and take the
    /// first inline image with non-empty data. Both camelCase and
    /// snake_case field spellings appear in the wild.
    fn first_inline_image(response_payload: &Value) -> Option<EditReply> {
        let candidates = response_payload.get("candidates").and_then(Value::as_array)?;
        for candidate in candidates {
            let Some(parts) = candidate
                .get("content")
                .and_then(Value::as_object)
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
            else {
                continue;
            };
            for part in parts {
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
                let media_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Some(EditReply {
                    image_base64: data.to_string(),
                    media_type,
                });
            }
        }
        None
    }
}

impl EditProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn edit(&self, request: &EditRequest) -> EditResult<EditReply> {
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = Self::build_payload(request);

        // One attempt per dispatch. A failed call surfaces to the user,
        // who decides whether to re-issue the operation.
        let response = match self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
        {
            Ok(response) => response,
            Err(raw) => {
                let err =
                    anyhow::Error::new(raw).context(format!("Gemini request failed ({endpoint})"));
                return Err(EditError::remote(error_chain_text(&err, 2048)));
            }
        };
        let response_payload = match response_json_or_error("Gemini", response) {
            Ok(parsed) => parsed,
            Err(err) => return Err(EditError::remote(error_chain_text(&err, 2048))),
        };

        Self::first_inline_image(&response_payload).ok_or(EditError::NoImageReturned)
    }
}

fn api_key_from_env() -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

/// Drives one editing session: holds the state machine, routes edits
/// to the selected provider, and logs every transition.
pub struct EditSession {
    session_id: String,
    state: SessionState,
    history: Vec<EditRecord>,
    events: EventWriter,
    registry: ModelRegistry,
    providers: EditProviderRegistry,
    model: ModelSpec,
}

impl EditSession {
    pub fn new(events_path: impl Into<PathBuf>, requested_model: Option<&str>) -> EditResult<Self> {
        let session_id = Uuid::new_v4().to_string();
        let events = EventWriter::new(events_path.into(), session_id.clone());
        let registry = ModelRegistry::new(None);
        let model = registry
            .resolve(requested_model)
            .map_err(EditError::configuration)?;

        let mut session = Self {
            session_id,
            state: SessionState::new(),
            history: Vec::new(),
            events,
            registry,
            providers: EditProviderRegistry::new(),
            model: model.clone(),
        };
        session.providers.register(DryrunProvider);
        session.ensure_provider(&model)?;
        session.events.emit(
            "session_started",
            map_object(json!({
                "model": session.model.name,
                "provider": session.model.provider,
            })),
        )?;
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &[EditRecord] {
        &self.history
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn events_path(&self) -> &Path {
        self.events.path()
    }

    fn ensure_provider(&mut self, model: &ModelSpec) -> EditResult<()> {
        if self.providers.get(&model.provider).is_some() {
            return Ok(());
        }
        match model.provider.as_str() {
            "gemini" => {
                self.providers.register(GeminiProvider::from_env()?);
                Ok(())
            }
            other => Err(EditError::configuration(format!(
                "no provider registered for '{other}' (available: [{}])",
                self.providers.names().join(", ")
            ))),
        }
    }

    /// Switch the session to another registered model.
    pub fn set_model(&mut self, name: &str) -> EditResult<&ModelSpec> {
        let model = self
            .registry
            .resolve(Some(name))
            .map_err(EditError::configuration)?;
        self.ensure_provider(&model)?;
        self.model = model;
        self.events.emit(
            "model_selected",
            map_object(json!({
                "model": self.model.name,
                "provider": self.model.provider,
            })),
        )?;
        Ok(&self.model)
    }

    /// Upload entry point. Validates size and magic bytes, then makes
    /// the image the session's original.
    pub fn load_image(&mut self, display_name: &str, bytes: &[u8]) -> EditResult<&ImageAsset> {
        if bytes.len() > MAX_UPLOAD_BYTES {
            let message = "Please upload an image up to 10MB in size.";
            self.events.emit(
                "upload_rejected",
                map_object(json!({
                    "name": display_name,
                    "bytes": bytes.len(),
                    "reason": message,
                })),
            )?;
            return Err(EditError::validation(message));
        }
        let Some(media_type) = sniff_media_type(bytes) else {
            let message = "Please upload a valid image file.";
            self.events.emit(
                "upload_rejected",
                map_object(json!({
                    "name": display_name,
                    "bytes": bytes.len(),
                    "reason": message,
                })),
            )?;
            return Err(EditError::validation(message));
        };

        let asset = ImageAsset::from_bytes(display_name, media_type, bytes);
        let stored = self.state.accept_upload(asset);
        self.events.emit(
            "image_loaded",
            map_object(json!({
                "name": display_name,
                "media_type": media_type,
                "bytes": bytes.len(),
            })),
        )?;
        Ok(stored)
    }

    /// Read a file and load it as the session's original image.
    pub fn load_image_from_path(&mut self, path: &Path) -> EditResult<&ImageAsset> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => return Err(EditError::validation("Could not read the provided file.")),
        };
        let display_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("upload.png")
            .to_string();
        self.load_image(&display_name, &bytes)
    }

    /// Apply one operation to the current source image. The result
    /// becomes the session's processed image and the source of the
    /// next edit.
    pub fn dispatch(&mut self, operation: Operation) -> EditResult<&ImageAsset> {
        let kind = operation.kind();
        if self.state.phase == SessionPhase::Processing {
            let message = "An edit is already in progress.";
            self.events.emit(
                "dispatch_rejected",
                map_object(json!({
                    "operation": kind.slug(),
                    "reason": message,
                })),
            )?;
            return Err(EditError::validation(message));
        }
        let Some(source) = self.state.source_image() else {
            let message = "Please upload an image first.";
            self.state.last_error = Some(message.to_string());
            self.events.emit(
                "dispatch_rejected",
                map_object(json!({
                    "operation": kind.slug(),
                    "reason": message,
                })),
            )?;
            return Err(EditError::validation(message));
        };

        let prompt = build_prompt(&operation);
        let request = EditRequest {
            prompt: prompt.clone(),
            image_base64: source.content.clone(),
            media_type: source.media_type.clone(),
            model: self.model.name.clone(),
        };
        let (output_name, output_media_type) = derive_result_meta(source, &operation);
        let source_name = source.display_name.clone();

        self.events.emit(
            "edit_started",
            map_object(json!({
                "operation": kind.slug(),
                "model": self.model.name,
                "source": source_name,
                "prompt": prompt,
            })),
        )?;
        self.state.begin_edit(kind);

        let started = Instant::now();
        let outcome = match self.providers.get(&self.model.provider) {
            Some(provider) => provider.edit(&request),
            None => Err(EditError::configuration(format!(
                "no provider registered for '{}'",
                self.model.provider
            ))),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let reply = match outcome {
            Ok(reply) => reply,
            Err(err) => {
                self.state.fail_edit(err.user_message());
                self.events.emit(
                    "edit_failed",
                    map_object(json!({
                        "operation": kind.slug(),
                        "model": self.model.name,
                        "elapsed_ms": elapsed_ms,
                        "error": err.log_message(),
                    })),
                )?;
                return Err(err);
            }
        };

        let record = EditRecord {
            record_id: short_id(&prompt, self.history.len() as u64),
            operation: kind,
            prompt,
            output_name,
            output_media_type,
            content_digest: content_digest(&reply.image_base64),
            completed_at: now_utc_iso(),
        };
        let applied = map_object(json!({
            "record_id": record.record_id,
            "operation": kind.slug(),
            "model": self.model.name,
            "output_name": record.output_name,
            "media_type": record.output_media_type,
            "digest": record.content_digest,
            "elapsed_ms": elapsed_ms,
        }));
        let result = ImageAsset {
            content: reply.image_base64,
            media_type: record.output_media_type.clone(),
            display_name: record.output_name.clone(),
        };
        self.history.push(record);
        // The result is committed before the log append.
        let stored = self.state.complete_edit(result);
        self.events.emit("edit_applied", applied)?;
        Ok(stored)
    }

    /// Write the current result into `out_dir` under its display name.
    pub fn save_result(&self, out_dir: &Path) -> EditResult<PathBuf> {
        let Some(processed) = self.state.processed_image.as_ref() else {
            return Err(EditError::validation("No processed image to save yet."));
        };
        let bytes = processed.decode()?;
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let path = out_dir.join(&processed.display_name);
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        self.events.emit(
            "result_saved",
            map_object(json!({
                "path": path.to_string_lossy(),
                "media_type": processed.media_type,
            })),
        )?;
        Ok(path)
    }

    /// Drop all images and history, keeping the session log.
    pub fn reset(&mut self) -> EditResult<()> {
        self.state = SessionState::new();
        self.history.clear();
        self.events.emit("session_reset", EventPayload::new())?;
        Ok(())
    }

    /// Emit the closing summary event for the session.
    pub fn finish(&mut self) -> EditResult<()> {
        self.events.emit(
            "session_finished",
            map_object(json!({
                "edits_applied": self.history.len(),
                "had_error": self.state.last_error.is_some(),
            })),
        )?;
        Ok(())
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({}): {}",
            status.as_u16(),
            truncate_text(&body, 512)
        );
    }
    serde_json::from_str(&body).with_context(|| format!("{provider} returned invalid JSON payload"))
}

fn error_chain_text(err: &anyhow::Error, max_len: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if parts.last().map(|prev| prev == &text).unwrap_or(false) {
            continue;
        }
        parts.push(text);
    }
    truncate_text(&parts.join(" | caused by: "), max_len)
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_len).collect();
    truncated.push('…');
    truncated
}

fn map_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

fn short_id(seed: &str, index: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(index.to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}

fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
