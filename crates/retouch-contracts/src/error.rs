use thiserror::Error;

pub type EditResult<T> = Result<T, EditError>;

/// Failure categories for an editing session.
#[derive(Debug, Error)]
pub enum EditError {
    /// A user action that cannot proceed as issued.
    #[error("{0}")]
    Validation(String),
    /// The remote edit call failed in transport, status, or decoding.
    #[error("image edit request failed: {cause}")]
    RemoteCallFailed { cause: String },
    /// The remote call succeeded but carried no image payload.
    #[error("no image data found in the model response")]
    NoImageReturned,
    /// The session cannot start or switch models as configured.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EditError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn remote(cause: impl Into<String>) -> Self {
        Self::RemoteCallFailed {
            cause: cause.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Message shown to the user. Remote failures collapse to a generic
    /// retry suggestion; the underlying cause goes to the event log.
    pub fn user_message(&self) -> String {
        match self {
            EditError::Validation(message) => message.clone(),
            EditError::RemoteCallFailed { .. } | EditError::NoImageReturned => {
                "Failed to process the image. Please try again.".to_string()
            }
            EditError::Configuration(message) => format!("Configuration error: {message}"),
            EditError::Internal(err) => format!("{err:#}"),
        }
    }

    /// Text for the event log. Unlike `user_message` this keeps the
    /// full cause chain.
    pub fn log_message(&self) -> String {
        match self {
            EditError::RemoteCallFailed { cause } => cause.clone(),
            EditError::Internal(err) => format!("{err:#}"),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_share_one_user_message() {
        let transport = EditError::remote("connect timeout");
        let empty = EditError::NoImageReturned;
        assert_eq!(transport.user_message(), "Failed to process the image. Please try again.");
        assert_eq!(empty.user_message(), transport.user_message());
    }

    #[test]
    fn validation_messages_surface_unchanged() {
        let err = EditError::validation("Please upload an image first.");
        assert_eq!(err.user_message(), "Please upload an image first.");
    }

    #[test]
    fn log_message_keeps_the_remote_cause() {
        let err = EditError::remote("Gemini request failed (503): overloaded");
        assert_eq!(err.log_message(), "Gemini request failed (503): overloaded");
        assert!(err.user_message().starts_with("Failed to process"));
    }

    #[test]
    fn internal_errors_render_their_chain() {
        let err = EditError::from(
            anyhow::anyhow!("disk full").context("failed to write events.jsonl"),
        );
        let text = err.user_message();
        assert!(text.contains("failed to write events.jsonl"));
        assert!(text.contains("disk full"));
    }
}
