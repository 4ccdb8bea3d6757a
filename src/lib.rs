//! # axum-file-delivery
//!
//! Serves a single file over HTTP with support for one `Range` per request.
//!
//! A [`FileDelivery`] is built once per file. Construction checks that the
//! file exists and is readable and records its size; after that the instance
//! is read-only and can answer any number of concurrent requests, each with
//! its own file handle.
//!
//! Supported `Range` forms are `bytes=<start>-<end>`, `bytes=<start>-` and
//! `bytes=-<suffix>`. Anything else, multiple ranges included, gets a `416`.
//!
//! There are two ways to send a response:
//!
//! - [`FileDelivery::respond`] returns a [`FileResponse`] implementing
//!   [`IntoResponse`](axum::response::IntoResponse), whose body streams the
//!   file in bounded chunks.
//! - [`FileDelivery::deliver`] drives any [`ResponseHead`] and
//!   [`AsyncWrite`](tokio::io::AsyncWrite) sink directly, polling a
//!   [`Cancellation`] signal between chunks.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::Router;
//! use axum::extract::State;
//! use axum::http::HeaderMap;
//! use axum::routing::get;
//!
//! use axum_file_delivery::{DeliveryOptions, Error, FileDelivery, FileResponse};
//!
//! async fn download(
//!     State(delivery): State<Arc<FileDelivery>>,
//!     headers: HeaderMap,
//! ) -> Result<FileResponse, Error> {
//!     delivery.respond_to(&headers).await
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = DeliveryOptions::default().with_disposition("inline");
//!     let delivery = FileDelivery::open("document.pdf", options).await.unwrap();
//!
//!     let app = Router::new()
//!         .route("/document", get(download))
//!         .with_state(Arc::new(delivery));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod delivery;
mod error;
mod file;
mod options;
mod plan;
mod range;
mod stream;

use tokio::io::{AsyncRead, AsyncSeek};

pub use delivery::{CollectedHead, Delivered, FileDelivery, FileResponse, ResponseHead};
pub use error::{Error, Result};
pub use file::{guess_content_type, FileResource, LocalStorage, Storage};
pub use options::DeliveryOptions;
pub use plan::{plan, ContentRangeStyle, DeliveryMetadata, Disposition, HeaderPlan};
pub use range::{resolve, ByteRange, RangeOutcome};
pub use stream::{stream_range, Cancellation, ChunkStream, StreamOutcome, DEFAULT_CHUNK_SIZE};

/// A byte source that can be positioned before reading.
///
/// Implemented for every [`AsyncRead`] + [`AsyncSeek`] + [`Unpin`] type, such
/// as [`tokio::fs::File`] and [`std::io::Cursor`].
pub trait SeekableReader: AsyncRead + AsyncSeek + Unpin {}

impl<T: AsyncRead + AsyncSeek + Unpin + ?Sized> SeekableReader for T {}
