use serde::{Deserialize, Serialize};
use std::fmt;

/// Enum `MessageType` represents the role of a message in the conversation.
#[derive(PartialEq, Eq, Serialize, Deserialize, Debug, Clone)]
pub enum MessageType {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "ai")]
    Ai,
    #[serde(rename = "human")]
    Human,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::System => write!(f, "system"),
            MessageType::Ai => write!(f, "ai"),
            MessageType::Human => write!(f, "human"),
        }
    }
}

/// A screenshot or other binary image payload, kept as base64 with its mime
/// type so it can be forwarded to a multimodal model as a data URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub data: String,
    pub mime_type: String,
}

impl ImageData {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Message payload. Text-only turns and turns that carry an image are
/// distinct variants so downstream code cannot confuse the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Multimodal { text: String, image: ImageData },
}

impl MessageContent {
    pub fn text(&self) -> &str {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Multimodal { text, .. } => text,
        }
    }

    pub fn image(&self) -> Option<&ImageData> {
        match self {
            MessageContent::Text(_) => None,
            MessageContent::Multimodal { image, .. } => Some(image),
        }
    }
}

/// A single turn in the conversation transcript sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_type: MessageType,
    pub content: MessageContent,
}

impl Message {
    pub fn new_system_message(content: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::System,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn new_human_message(content: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Human,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn new_human_message_with_image(content: impl Into<String>, image: ImageData) -> Self {
        Self {
            message_type: MessageType::Human,
            content: MessageContent::Multimodal {
                text: content.into(),
                image,
            },
        }
    }

    pub fn new_ai_message(content: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Ai,
            content: MessageContent::Text(content.into()),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message_type, self.content.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multimodal_content_keeps_text_and_image_separate() {
        let image = ImageData::new("aGVsbG8=", "image/png");
        let message = Message::new_human_message_with_image("Page state", image.clone());

        assert_eq!(message.content.text(), "Page state");
        assert_eq!(message.content.image(), Some(&image));
        assert_eq!(
            image.to_data_url(),
            "data:image/png;base64,aGVsbG8="
        );
    }

    #[test]
    fn text_content_has_no_image() {
        let message = Message::new_human_message("plain");
        assert!(message.content.image().is_none());
    }
}
