use std::future::Future;
use std::io;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::file::{FileResource, LocalStorage, Storage};
use crate::options::DeliveryOptions;
use crate::plan::{plan, ContentRangeStyle, DeliveryMetadata, HeaderPlan};
use crate::range::{resolve, RangeOutcome};
use crate::stream::{stream_range, Cancellation, ChunkStream, StreamOutcome};

/// Receiver for the status line and headers of a response.
///
/// [`FileDelivery::deliver`] calls [`status`](ResponseHead::status), then
/// [`header`](ResponseHead::header) once per header, then
/// [`commit_headers`](ResponseHead::commit_headers), and writes body bytes
/// only after the commit has completed.
pub trait ResponseHead {
    fn status(&mut self, status: StatusCode);

    fn header(&mut self, name: HeaderName, value: HeaderValue);

    fn commit_headers(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// [`ResponseHead`] that keeps what it was given in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectedHead {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub committed: bool,
}

impl ResponseHead for CollectedHead {
    fn status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    async fn commit_headers(&mut self) -> io::Result<()> {
        self.committed = true;
        Ok(())
    }
}

/// What a call to [`FileDelivery::deliver`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    pub status: StatusCode,
    /// `None` when there was no body to stream (416 or an empty file).
    pub stream: Option<StreamOutcome>,
}

/// Serves one file, honouring single `Range` requests.
///
/// The file is validated once, at construction. Each request opens its own
/// handle, so one instance can serve any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct FileDelivery<S = LocalStorage> {
    storage: S,
    resource: FileResource,
    metadata: DeliveryMetadata,
    chunk_size: usize,
    content_range: ContentRangeStyle,
}

impl FileDelivery<LocalStorage> {
    /// Validates a file on the local file system.
    pub async fn open(path: impl Into<PathBuf>, options: DeliveryOptions) -> Result<Self> {
        FileDelivery::with_storage(LocalStorage, path, options).await
    }
}

impl<S: Storage> FileDelivery<S> {
    /// Fails with [`Error::ResourceUnavailable`] if the file is missing or
    /// unreadable, and with [`Error::InvalidChunkSize`] for a zero chunk size.
    pub async fn with_storage(storage: S, path: impl Into<PathBuf>, options: DeliveryOptions) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }

        let resource = FileResource::validate(&storage, path).await?;
        let metadata = options.metadata_for(&resource)?;
        debug!(
            path = %resource.path().display(),
            size = resource.size(),
            content_type = metadata.content_type(),
            "file ready for delivery"
        );

        Ok(FileDelivery {
            storage,
            resource,
            metadata,
            chunk_size: options.chunk_size,
            content_range: options.content_range_style(),
        })
    }

    pub fn resource(&self) -> &FileResource {
        &self.resource
    }

    pub fn metadata(&self) -> &DeliveryMetadata {
        &self.metadata
    }

    /// Resolves `range` and plans the response for it.
    pub fn plan(&self, range: Option<&str>) -> HeaderPlan {
        let size = self.resource.size();
        let outcome = resolve(range, size);
        match outcome {
            RangeOutcome::Unsatisfiable => warn!(range, size, "range not satisfiable"),
            _ => debug!(range, size, ?outcome, "resolved range"),
        }
        plan(size, &outcome, &self.metadata, self.content_range)
    }

    /// Sends the response for `range` through `head` and `body`.
    ///
    /// The file is opened before anything is committed, so a file that
    /// vanished since construction fails without touching the response.
    /// Errors after the commit (I/O or [`Error::ShortRead`]) are returned
    /// with the response already partly sent. Cancellation is not an error.
    pub async fn deliver<H, W, C>(
        &self,
        range: Option<&str>,
        head: &mut H,
        body: &mut W,
        cancel: &C,
    ) -> Result<Delivered>
    where
        H: ResponseHead,
        W: AsyncWrite + Unpin + ?Sized,
        C: Cancellation + ?Sized,
    {
        let HeaderPlan { status, headers, span } = self.plan(range);

        let source = match span {
            Some(span) => Some((self.storage.open(self.resource.path()).await?, span)),
            None => None,
        };

        head.status(status);
        for (name, value) in headers.iter() {
            head.header(name.clone(), value.clone());
        }
        head.commit_headers().await?;

        let stream = match source {
            Some((source, span)) => Some(stream_range(source, span, body, self.chunk_size, cancel).await?),
            None => None,
        };

        Ok(Delivered { status, stream })
    }

    /// Builds an axum response for `range`. The body streams from a freshly
    /// opened handle as the server polls it.
    pub async fn respond(&self, range: Option<&str>) -> Result<FileResponse> {
        let HeaderPlan { status, headers, span } = self.plan(range);

        let body = match span {
            Some(span) => {
                let source = self.storage.open(self.resource.path()).await?;
                Some(ChunkStream::new(source, span, self.chunk_size))
            }
            None => None,
        };

        Ok(FileResponse { status, headers, body })
    }

    /// Like [`respond`](Self::respond), reading `Range` from request headers.
    pub async fn respond_to(&self, request_headers: &HeaderMap) -> Result<FileResponse> {
        match request_headers.get(header::RANGE).map(HeaderValue::to_str) {
            None => self.respond(None).await,
            Some(Ok(range)) => self.respond(Some(range)).await,
            // not text, so it cannot be a valid byte range either
            Some(Err(_)) => self.respond(Some("")).await,
        }
    }
}

/// Planned response with its streaming body. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct FileResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<ChunkStream>,
}

impl FileResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn into_stream(self) -> Option<ChunkStream> {
        self.body
    }
}

impl IntoResponse for FileResponse {
    fn into_response(self) -> Response {
        let body = match self.body {
            Some(stream) => Body::from_stream(stream),
            None => Body::empty(),
        };
        (self.status, self.headers, body).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::ResourceUnavailable { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
