//! Serves files from the working directory: `GET /file?path=<path>`.
//!
//! ```text
//! cargo run --example serve
//! curl -i -H 'Range: bytes=0-4' 'http://127.0.0.1:3000/file?path=test/fixture.txt'
//! ```

use axum::extract::Query;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use axum_file_delivery::{DeliveryOptions, Disposition, FileDelivery};

#[derive(Debug, Deserialize)]
struct FileRequest {
    path: String,
    #[serde(default)]
    inline: bool,
}

async fn get_file(headers: HeaderMap, Query(q): Query<FileRequest>) -> Response {
    let disposition = if q.inline { Disposition::Inline } else { Disposition::Attachment };
    let options = DeliveryOptions::default().with_disposition(disposition);

    let delivery = match FileDelivery::open(&q.path, options).await {
        Ok(delivery) => delivery,
        Err(e) => return e.into_response(),
    };

    match delivery.respond_to(&headers).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let router = Router::new().route("/file", get(get_file));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, router).await.unwrap();
}
