//! Streaming transfer subsystem.
//!
//! # Data Flow
//! ```text
//! Upload:   multipart body → multipart.rs (spool files) → upload.rs
//!           → BeginFile, chunks, EOF, ack per file → JSON array of acks
//! Download: JSON body → download.rs → request frame, BeginFile header
//!           → response headers → chunks relayed as the HTTP body
//! ```
//!
//! # Design Decisions
//! - Fixed-size chunks in both directions bound memory per transfer
//! - One file at a time; no pipelining across files

pub mod download;
pub mod multipart;
pub mod upload;

pub use download::FileDownload;
pub use multipart::{read_form, FilePart, UploadForm};
pub use upload::send_form;
