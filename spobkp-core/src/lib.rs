mod auth;
mod client;
mod retention;
mod upload;

pub use auth::{AuthClient, AuthError};
pub use client::{DriveItem, GraphClient, GraphError, UploadSession};
pub use retention::{RetentionReport, enforce_retention};
pub use upload::{CHUNK_SIZE, ChunkedUploader, UploadError};
