use serde::{Deserialize, Serialize};

use super::domain::Transcript;

/// Produces the conversational reply to a user turn.
pub trait AssistantResponder: Send + Sync {
    fn reply(&self, transcript: &Transcript, message: &str) -> Result<String, CollaboratorError>;
}

/// Extracts narrative text from an uploaded document.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> Result<String, CollaboratorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("unsupported document type: {0}")]
    Unsupported(String),
    #[error("document could not be read: {0}")]
    Unreadable(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
    Text,
    Markdown,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Text => "txt",
            Self::Markdown => "md",
        }
    }

    /// Resolves the kind from the file extension, falling back to the declared
    /// content type when the name carries no usable extension.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Option<Self> {
        let by_extension = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| Self::from_extension(&ext.to_ascii_lowercase()));
        if by_extension.is_some() {
            return by_extension;
        }

        let declared = content_type
            .and_then(|raw| raw.parse::<mime::Mime>().ok())
            .or_else(|| mime_guess::from_path(filename).first());
        declared.and_then(|mime| Self::from_mime(&mime))
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    fn from_mime(mime: &mime::Mime) -> Option<Self> {
        match (mime.type_().as_str(), mime.subtype().as_str()) {
            ("application", "pdf") => Some(Self::Pdf),
            ("application", "msword") => Some(Self::Doc),
            ("application", "vnd.openxmlformats-officedocument.wordprocessingml.document") => {
                Some(Self::Docx)
            }
            ("text", "markdown") => Some(Self::Markdown),
            ("text", "plain") => Some(Self::Text),
            _ => None,
        }
    }
}

/// Deterministic stand-in for a language model.
#[derive(Debug, Clone, Default)]
pub struct AcknowledgingResponder;

impl AssistantResponder for AcknowledgingResponder {
    fn reply(&self, transcript: &Transcript, message: &str) -> Result<String, CollaboratorError> {
        // the incoming message is not in the transcript yet
        let turns = transcript.user_turns().count() + 1;
        let words = message.split_whitespace().count();
        Ok(format!(
            "Thank you. I recorded that accomplishment ({words} words; {turns} so far). \
             Add specific numbers, the people you led, and how far the results reached, \
             or select Generate Recommendation when you are ready."
        ))
    }
}

/// Handles text and markdown uploads; binary office formats need an external extractor.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> Result<String, CollaboratorError> {
        match kind {
            DocumentKind::Text | DocumentKind::Markdown => String::from_utf8(bytes.to_vec())
                .map_err(|err| CollaboratorError::Unreadable(err.to_string())),
            other => Err(CollaboratorError::Unavailable(format!(
                "no extractor configured for {} files",
                other.label()
            ))),
        }
    }
}
