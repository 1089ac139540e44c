use serde::{Deserialize, Serialize};

use crate::asset::ImageAsset;
use crate::operation::{Operation, OperationKind};

/// Where a session sits between uploads and edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Ready,
    Processing,
}

/// Mutable state for one editing session. The original image survives
/// every failure; only a new upload replaces it.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub original_image: Option<ImageAsset>,
    pub processed_image: Option<ImageAsset>,
    pub active_operation: Option<OperationKind>,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SessionPhase::Processing
    }

    /// Edits chain: the latest result feeds the next edit when present.
    pub fn source_image(&self) -> Option<&ImageAsset> {
        self.processed_image.as_ref().or(self.original_image.as_ref())
    }

    /// A new upload replaces the original and clears prior results.
    pub fn accept_upload(&mut self, asset: ImageAsset) -> &ImageAsset {
        self.processed_image = None;
        self.last_error = None;
        self.phase = SessionPhase::Ready;
        self.original_image.insert(asset)
    }

    pub fn begin_edit(&mut self, operation: OperationKind) {
        self.phase = SessionPhase::Processing;
        self.active_operation = Some(operation);
        self.last_error = None;
    }

    pub fn complete_edit(&mut self, result: ImageAsset) -> &ImageAsset {
        self.phase = SessionPhase::Ready;
        self.active_operation = None;
        self.last_error = None;
        self.processed_image.insert(result)
    }

    pub fn fail_edit(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.phase = SessionPhase::Ready;
        self.active_operation = None;
    }
}

/// Name and media type for an edit result. Convert picks its own
/// extension; every other operation keeps the source's, defaulting to
/// png when the source name has none.
pub fn derive_result_meta(source: &ImageAsset, operation: &Operation) -> (String, String) {
    let base = format!("{}_{}", source.stem(), operation.kind().slug());
    if let Operation::ConvertFormat {
        format: Some(format),
    } = operation
    {
        if !format.is_empty() {
            let ext = format.to_lowercase();
            return (format!("{base}.{ext}"), format!("image/{ext}"));
        }
    }
    let ext = source.extension().unwrap_or("png");
    (format!("{base}.{ext}"), source.media_type.clone())
}

/// One applied edit, kept in session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRecord {
    pub record_id: String,
    pub operation: OperationKind,
    pub prompt: String,
    pub output_name: String,
    pub output_media_type: String,
    pub content_digest: String,
    pub completed_at: String,
}
