use std::fmt;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, HeaderMapExt};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::range::{ByteRange, RangeOutcome};

/// Value of the `Content-Disposition` type token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Disposition {
    #[default]
    Attachment,
    Inline,
    Custom(String),
}

impl From<String> for Disposition {
    fn from(value: String) -> Self {
        match value.as_str() {
            "attachment" => Disposition::Attachment,
            "inline" => Disposition::Inline,
            _ => Disposition::Custom(value),
        }
    }
}

impl From<&str> for Disposition {
    fn from(value: &str) -> Self {
        Disposition::from(value.to_string())
    }
}

impl From<Disposition> for String {
    fn from(value: Disposition) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Attachment => f.write_str("attachment"),
            Disposition::Inline => f.write_str("inline"),
            Disposition::Custom(value) => f.write_str(value),
        }
    }
}

/// How `Content-Range` is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentRangeStyle {
    /// `<start>-<end>/<size>` on 206 and nothing on 416.
    #[default]
    Bare,
    /// `bytes <start>-<end>/<size>` on 206 and `bytes */<size>` on 416.
    Rfc7233,
}

/// Descriptive headers fixed for the lifetime of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMetadata {
    file_name: String,
    disposition: Disposition,
    content_type: String,
    content_type_value: HeaderValue,
    disposition_value: HeaderValue,
}

impl DeliveryMetadata {
    /// Fails if the content type or the rendered disposition cannot be sent as
    /// a header value.
    pub fn new(
        file_name: impl Into<String>,
        disposition: Disposition,
        content_type: impl Into<String>,
    ) -> Result<Self> {
        let file_name = file_name.into();
        let content_type = content_type.into();

        let content_type_value = header_value(&content_type)?;
        let disposition_value = header_value(&format!(
            "{disposition}; filename=\"{}\"",
            quote_escape(&file_name)
        ))?;

        Ok(DeliveryMetadata {
            file_name,
            disposition,
            content_type,
            content_type_value,
            disposition_value,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn disposition(&self) -> &Disposition {
        &self.disposition
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_bytes(value.as_bytes())
        .map_err(|_| Error::InvalidHeaderValue(value.to_string()))
}

// quoted-string: only '"' and '\' need a backslash
fn quote_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Status, headers and body span for one response.
#[derive(Debug, Clone)]
pub struct HeaderPlan {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Span to stream, `None` for a 416 or an empty resource.
    pub span: Option<ByteRange>,
}

/// Maps a resolved range to the response status and headers.
///
/// `Content-Type`, `Accept-Ranges` and `Content-Disposition` are always
/// present. A full response carries `Content-Length`; a partial one carries
/// `Content-Range` then `Content-Length`; a 416 carries neither unless
/// [`ContentRangeStyle::Rfc7233`] asks for `Content-Range: bytes */<size>`.
pub fn plan(
    size: u64,
    outcome: &RangeOutcome,
    metadata: &DeliveryMetadata,
    style: ContentRangeStyle,
) -> HeaderPlan {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, metadata.content_type_value.clone());
    headers.typed_insert(AcceptRanges::bytes());
    headers.insert(header::CONTENT_DISPOSITION, metadata.disposition_value.clone());

    match *outcome {
        RangeOutcome::Unsatisfiable => {
            if style == ContentRangeStyle::Rfc7233 {
                headers.typed_insert(ContentRange::unsatisfied_bytes(size));
            }
            HeaderPlan { status: StatusCode::RANGE_NOT_SATISFIABLE, headers, span: None }
        }
        RangeOutcome::NoRangeRequested => {
            headers.typed_insert(ContentLength(size));
            HeaderPlan { status: StatusCode::OK, headers, span: ByteRange::full(size) }
        }
        RangeOutcome::Satisfiable(range) => {
            match style {
                ContentRangeStyle::Bare => {
                    let value = format!("{}-{}/{}", range.start(), range.end(), size);
                    headers.insert(header::CONTENT_RANGE, HeaderValue::from_str(&value)
                        .expect("digits and punctuation are valid header characters"));
                }
                ContentRangeStyle::Rfc7233 => {
                    let content_range = ContentRange::bytes(range.start()..range.end() + 1, size)
                        .expect("ByteRange lies within size");
                    headers.typed_insert(content_range);
                }
            }
            headers.typed_insert(ContentLength(range.len()));
            HeaderPlan { status: StatusCode::PARTIAL_CONTENT, headers, span: Some(range) }
        }
    }
}
