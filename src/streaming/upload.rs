//! Multipart upload → bidirectional stream.

use base64::Engine;
use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::GatewayError;
use crate::rpc::frames::{self, BeginFile};
use crate::rpc::proto::Message;
use crate::rpc::transport::FrameStream;
use crate::streaming::multipart::UploadForm;

/// Send every file in `form` and collect one acknowledgement per file.
///
/// Files go strictly one after another: header, chunks, end-of-file, then a
/// single reply. Any failure aborts the whole upload.
pub async fn send_form(
    stream: &mut dyn FrameStream,
    form: UploadForm,
    buffer_size: usize,
) -> Result<Vec<Value>, GatewayError> {
    let UploadForm { fields, files } = form;
    let mut acks = Vec::with_capacity(files.len());

    for part in files {
        let header = BeginFile {
            file_name: part.file_name.clone(),
            form_data_name: part.field_name.clone(),
            content_type: part.content_type.clone(),
            content_length: i64::try_from(part.size).unwrap_or(i64::MAX),
            form_data: fields.clone(),
        };
        let field = header.form_data_name.clone();
        stream.send(header.to_message()).await?;

        let chunks = send_chunks(stream, part.into_reader(), buffer_size).await?;
        stream.send(frames::end_of_file()).await?;

        let ack = stream.recv().await?.ok_or_else(|| {
            GatewayError::protocol(format!("stream ended before acknowledging file in field {field}"))
        })?;
        tracing::debug!(field = %field, chunks, "File uploaded");
        acks.push(ack_to_json(&ack));
    }

    stream.close_send();
    Ok(acks)
}

/// Stream `source` as bytes frames of exactly `buffer_size` (the last one may be shorter).
async fn send_chunks<R>(
    stream: &mut dyn FrameStream,
    mut source: R,
    buffer_size: usize,
) -> Result<usize, GatewayError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut chunks = 0;
    loop {
        let filled = fill(&mut source, &mut buffer).await?;
        if filled == 0 {
            return Ok(chunks);
        }
        stream
            .send(Message::bytes(Bytes::copy_from_slice(&buffer[..filled])))
            .await?;
        chunks += 1;
        if filled < buffer.len() {
            return Ok(chunks);
        }
    }
}

/// Read until `buffer` is full or the source is exhausted.
async fn fill<R>(source: &mut R, buffer: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buffer.len() {
        let n = source.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Acknowledgement as it appears in the response array.
fn ack_to_json(ack: &Message) -> Value {
    match ack.as_bytes() {
        Some(data) => Value::String(base64::engine::general_purpose::STANDARD.encode(data)),
        None => ack.to_json().unwrap_or(Value::Null),
    }
}
