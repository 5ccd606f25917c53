//! Transport-independent view of an incoming chat message.

use crate::session::SenderId;

/// One resolution of an uploaded photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoVariant {
    /// Identifier used to download the file
    pub file_id: String,
    /// Identifier that is stable across bots; only used for logging
    pub unique_id: String,
    pub width: u32,
    pub height: u32,
    /// File size in bytes, zero when the platform did not report it
    pub file_size: u64,
}

impl PhotoVariant {
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Photo(Vec<PhotoVariant>),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: SenderId,
    /// IETF language tag of the user, when the platform shares it
    pub language_code: Option<String>,
    pub content: MessageContent,
}

impl InboundMessage {
    pub fn text(sender: SenderId, text: impl Into<String>) -> Self {
        Self {
            sender,
            language_code: None,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn photo(sender: SenderId, variants: Vec<PhotoVariant>) -> Self {
        Self {
            sender,
            language_code: None,
            content: MessageContent::Photo(variants),
        }
    }

    pub fn with_language(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = Some(language_code.into());
        self
    }

    pub fn language(&self) -> Option<&str> {
        self.language_code.as_deref()
    }
}

/// Pick the highest-resolution variant of a photo
///
/// Compares pixel counts, then file size. The order in which the platform
/// lists variants is not trusted.
pub fn largest_variant(variants: &[PhotoVariant]) -> Option<&PhotoVariant> {
    variants
        .iter()
        .max_by_key(|variant| (variant.pixels(), variant.file_size))
}
