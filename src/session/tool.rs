use std::time::Duration;

use serde_json::Value;

use crate::schemas::ImageData;

/// A named, schema-described action or query exposed by a provider session.
/// Immutable once discovered.
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON-Schema-like parameter description, exactly as declared by the
    /// provider.
    pub parameters: Value,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Outcome of one tool invocation. Invocation failures are values, not
/// errors: the orchestration loop reacts to `success == false` without
/// special-casing exceptions.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub success: bool,
    pub message: String,
    /// Total characters in the message, used for informativeness scoring.
    pub context_size: Option<usize>,
    pub duration: Option<Duration>,
    /// Image payload when the provider returned an image content part.
    pub image: Option<ImageData>,
}

impl InvocationResult {
    pub fn success(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: true,
            context_size: Some(message.len()),
            message,
            duration: None,
            image: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            context_size: Some(message.len()),
            message,
            duration: None,
            image: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_image(mut self, image: Option<ImageData>) -> Self {
        self.image = image;
        self
    }
}
