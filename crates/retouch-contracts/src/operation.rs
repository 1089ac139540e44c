use serde::{Deserialize, Serialize};

/// Formats the convert operation accepts.
pub const CONVERT_FORMATS: &[&str] = &["png", "jpeg", "webp"];

/// One editing operation together with its options. Options that are
/// absent fall back to defaults when the prompt is built, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    RemoveBackground,
    ResizeCanvas {
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
    },
    ConvertFormat {
        #[serde(default)]
        format: Option<String>,
    },
    Compress,
    AutoEnhance,
    Adjust {
        #[serde(default)]
        brightness: i64,
        #[serde(default)]
        contrast: i64,
        #[serde(default)]
        saturation: i64,
    },
    Rotate {
        #[serde(default)]
        degrees: Option<i64>,
    },
    Flip {
        #[serde(default)]
        direction: Option<FlipDirection>,
    },
    CustomPrompt {
        #[serde(default)]
        prompt: String,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::RemoveBackground => OperationKind::RemoveBackground,
            Operation::ResizeCanvas { .. } => OperationKind::ResizeCanvas,
            Operation::ConvertFormat { .. } => OperationKind::ConvertFormat,
            Operation::Compress => OperationKind::Compress,
            Operation::AutoEnhance => OperationKind::AutoEnhance,
            Operation::Adjust { .. } => OperationKind::Adjust,
            Operation::Rotate { .. } => OperationKind::Rotate,
            Operation::Flip { .. } => OperationKind::Flip,
            Operation::CustomPrompt { .. } => OperationKind::CustomPrompt,
        }
    }
}

/// Operation identity without its options. Used for status display,
/// history records, and derived result names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    RemoveBackground,
    ResizeCanvas,
    ConvertFormat,
    Compress,
    AutoEnhance,
    Adjust,
    Rotate,
    Flip,
    CustomPrompt,
}

impl OperationKind {
    pub fn slug(&self) -> &'static str {
        match self {
            OperationKind::RemoveBackground => "remove_background",
            OperationKind::ResizeCanvas => "resize_canvas",
            OperationKind::ConvertFormat => "convert_format",
            OperationKind::Compress => "compress",
            OperationKind::AutoEnhance => "auto_enhance",
            OperationKind::Adjust => "adjust",
            OperationKind::Rotate => "rotate",
            OperationKind::Flip => "flip",
            OperationKind::CustomPrompt => "custom_prompt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipDirection {
    Horizontally,
    Vertically,
}

impl FlipDirection {
    /// Accepts both the adverb and the adjective spellings.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "horizontally" => Some(FlipDirection::Horizontally),
            "vertical" | "vertically" => Some(FlipDirection::Vertically),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlipDirection::Horizontally => "horizontally",
            FlipDirection::Vertically => "vertically",
        }
    }
}
