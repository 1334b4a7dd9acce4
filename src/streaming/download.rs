//! Bidirectional stream → chunked file download.
//!
//! # Responsibilities
//! - Send the optional request frame and read the file header
//! - Build response headers before any body byte exists
//! - Relay chunks to the client as they arrive
//!
//! # Design Decisions
//! - Once headers are out, failures can only be logged and the body cut short
//! - Dropping the body (client gone) drops the stream, which cancels the call

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures_util::stream::{self, Stream};

use crate::error::GatewayError;
use crate::rpc::frames::{self, BeginFile};
use crate::rpc::proto::Message;
use crate::rpc::transport::FrameStream;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A download whose header has been received; the chunks are still upstream.
pub struct FileDownload {
    pub header: BeginFile,
    source: ChunkSource,
}

/// Send `request` (if any), half-close, and wait for the file header.
pub async fn start(
    mut stream: Box<dyn FrameStream>,
    request: Option<Message>,
    method: &str,
) -> Result<FileDownload, GatewayError> {
    if let Some(frame) = request {
        stream.send(frame).await?;
    }
    stream.close_send();

    let first = stream
        .recv()
        .await?
        .ok_or_else(|| GatewayError::protocol("stream ended before the file header"))?;
    let header = BeginFile::from_message(&first)?;

    Ok(FileDownload {
        header,
        source: ChunkSource {
            stream,
            method: method.to_string(),
            delivered: 0,
            finished: false,
        },
    })
}

impl FileDownload {
    pub fn into_response(self) -> Response {
        let FileDownload { header, source } = self;

        let mut response = Response::new(Body::from_stream(source.into_stream()));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();

        let disposition = format!("attachment; filename={}", header.file_name);
        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition)
                .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
        );
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&header.content_type)
                .ok()
                .filter(|_| !header.content_type.is_empty())
                .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE)),
        );
        if header.content_length > 0 {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(header.content_length));
        } else {
            headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        }
        response
    }
}

struct ChunkSource {
    stream: Box<dyn FrameStream>,
    method: String,
    delivered: u64,
    finished: bool,
}

impl ChunkSource {
    fn into_stream(self) -> impl Stream<Item = Result<Bytes, GatewayError>> + Send + 'static {
        stream::unfold(Some(self), |state| async move {
            let mut source = state?;
            match source.stream.recv().await {
                Ok(Some(frame)) if frames::is_end_of_file(&frame) => {
                    source.complete();
                    None
                }
                Ok(None) => {
                    source.complete();
                    None
                }
                Ok(Some(frame)) => match frame.as_bytes() {
                    Some(data) => {
                        source.delivered += data.len() as u64;
                        Some((Ok(data.clone()), Some(source)))
                    }
                    None => {
                        tracing::error!(
                            method = %source.method,
                            frame = frame.describe(),
                            "Expected bytes chunk in file download"
                        );
                        Some((
                            Err(GatewayError::protocol("non-binary frame in file download")),
                            None,
                        ))
                    }
                },
                Err(err) => {
                    tracing::warn!(
                        method = %source.method,
                        delivered = source.delivered,
                        error = %err,
                        "File download failed after headers were sent"
                    );
                    Some((Err(err), None))
                }
            }
        })
    }

    fn complete(&mut self) {
        self.finished = true;
        tracing::debug!(method = %self.method, bytes = self.delivered, "File download complete");
    }
}

impl Drop for ChunkSource {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                method = %self.method,
                delivered = self.delivered,
                "File download ended early, cancelling upstream stream"
            );
        }
    }
}
