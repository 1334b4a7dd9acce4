//! Multipart form parsing for uploads.
//!
//! File parts are spooled to anonymous temporary files while the body is
//! read, so a large upload never sits in memory. The files disappear when
//! the form is dropped.

use std::io::SeekFrom;

use axum::extract::Multipart;
use serde_json::{Map, Value};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::error::GatewayError;

/// One uploaded file, rewound and ready to read.
#[derive(Debug)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    file: File,
}

impl FilePart {
    async fn create(field_name: &str, file_name: &str, content_type: &str) -> Result<Self, GatewayError> {
        let file = tokio::task::spawn_blocking(tempfile::tempfile)
            .await
            .map_err(std::io::Error::other)??;
        Ok(Self {
            field_name: field_name.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            size: 0,
            file: File::from_std(file),
        })
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<(), GatewayError> {
        self.file.write_all(chunk).await?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    async fn finish(mut self) -> Result<Self, GatewayError> {
        self.file.flush().await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(self)
    }

    /// Spool `data` the same way a parsed part would be.
    pub async fn from_bytes(
        field_name: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<Self, GatewayError> {
        let mut part = Self::create(field_name, file_name, content_type).await?;
        part.write(data).await?;
        part.finish().await
    }

    pub fn into_reader(self) -> File {
        self.file
    }
}

/// Parsed multipart body.
#[derive(Debug, Default)]
pub struct UploadForm {
    /// Plain fields; only the first value of a repeated field is kept.
    pub fields: Map<String, Value>,
    /// First file of each file field, in order of first appearance.
    pub files: Vec<FilePart>,
}

fn client_input(err: axum::extract::multipart::MultipartError) -> GatewayError {
    GatewayError::ClientInput(format!("Not able to read request body: {}", err.body_text()))
}

pub async fn read_form(mut multipart: Multipart) -> Result<UploadForm, GatewayError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(client_input)? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field.text().await.map_err(client_input)?;
            form.fields.entry(name).or_insert(Value::String(text));
            continue;
        };

        if form.files.iter().any(|part| part.field_name == name) {
            tracing::debug!(field = %name, file = %file_name, "Ignoring extra file for field");
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let mut part = FilePart::create(&name, &file_name, &content_type).await?;
        while let Some(chunk) = field.chunk().await.map_err(client_input)? {
            part.write(&chunk).await?;
        }
        form.files.push(part.finish().await?);
    }

    Ok(form)
}
