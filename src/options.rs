use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::file::{guess_content_type, FileResource};
use crate::plan::{ContentRangeStyle, DeliveryMetadata, Disposition};
use crate::stream::DEFAULT_CHUNK_SIZE;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Per-file delivery settings. Every field may be omitted when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryOptions {
    /// Name sent in `Content-Disposition`. Defaults to the file's base name.
    pub file_name: Option<String>,
    pub disposition: Disposition,
    /// Defaults to a type guessed from the extension, then
    /// `application/octet-stream`.
    pub content_type: Option<String>,
    pub chunk_size: usize,
    /// Send RFC 7233 `Content-Range` values, including `bytes */<size>` on a
    /// 416. Off by default because it changes what clients observe.
    pub rfc7233_content_range: bool,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        DeliveryOptions {
            file_name: None,
            disposition: Disposition::Attachment,
            content_type: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            rfc7233_content_range: false,
        }
    }
}

impl DeliveryOptions {
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_disposition(mut self, disposition: impl Into<Disposition>) -> Self {
        self.disposition = disposition.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_rfc7233_content_range(mut self, enabled: bool) -> Self {
        self.rfc7233_content_range = enabled;
        self
    }

    pub(crate) fn content_range_style(&self) -> ContentRangeStyle {
        if self.rfc7233_content_range {
            ContentRangeStyle::Rfc7233
        } else {
            ContentRangeStyle::Bare
        }
    }

    /// Fills unset fields from the resource.
    pub(crate) fn metadata_for(&self, resource: &FileResource) -> Result<DeliveryMetadata> {
        let file_name = self.file_name.clone().unwrap_or_else(|| resource.base_name());
        let content_type = self
            .content_type
            .clone()
            .or_else(|| guess_content_type(resource.path()))
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        DeliveryMetadata::new(file_name, self.disposition.clone(), content_type)
    }
}
