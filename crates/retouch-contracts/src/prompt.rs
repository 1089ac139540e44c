use crate::operation::Operation;

/// Instruction sent when an operation has nothing to change.
pub const NO_CHANGE_PROMPT: &str = "Make no changes to the image.";

/// Render the instruction text for an operation. Absent options fall
/// back to their documented defaults; explicit values are kept as
/// given, including zero.
pub fn build_prompt(operation: &Operation) -> String {
    match operation {
        Operation::RemoveBackground => {
            "Remove the background of this image, leaving only the main subject. \
             The new background must be transparent."
                .to_string()
        }
        Operation::ResizeCanvas { width, height } => format!(
            "Resize the canvas of this image to {}x{} pixels. If the original image \
             is smaller, add transparent padding around it to fill the canvas. If it \
             is larger, do not crop, but scale it down to fit within the new \
             dimensions, preserving aspect ratio, and add transparent padding if \
             necessary.",
            width.unwrap_or(1024),
            height.unwrap_or(1024)
        ),
        Operation::ConvertFormat { format } => format!(
            "Convert this image to {} format.",
            format.as_deref().unwrap_or("png").to_uppercase()
        ),
        Operation::Compress => {
            "Compress this image to reduce its file size as much as possible while \
             maintaining good visual quality."
                .to_string()
        }
        Operation::AutoEnhance => {
            "Automatically enhance this image to improve its colors, lighting, and \
             sharpness in a balanced way."
                .to_string()
        }
        Operation::Adjust {
            brightness,
            contrast,
            saturation,
        } => {
            let mut adjustments = Vec::new();
            if *brightness != 0 {
                adjustments.push(format!("brightness by {brightness}%"));
            }
            if *contrast != 0 {
                adjustments.push(format!("contrast by {contrast}%"));
            }
            if *saturation != 0 {
                adjustments.push(format!("saturation by {saturation}%"));
            }
            if adjustments.is_empty() {
                NO_CHANGE_PROMPT.to_string()
            } else {
                format!(
                    "Adjust this image with the following settings: {}.",
                    adjustments.join(", ")
                )
            }
        }
        Operation::Rotate { degrees } => format!(
            "Rotate this image by {} degrees. Preserve the original canvas size and \
             fill empty areas with transparency.",
            degrees.unwrap_or(90)
        ),
        Operation::Flip { direction } => format!(
            "Flip this image {}.",
            direction
                .map(|value| value.as_str())
                .unwrap_or("horizontally")
        ),
        Operation::CustomPrompt { prompt } => {
            if prompt.trim().is_empty() {
                NO_CHANGE_PROMPT.to_string()
            } else {
                prompt.clone()
            }
        }
    }
}
