//! # quill-client
//!
//! HTTP transport for the Quill chat client.
//!
//! Follows the composition pattern of one entry point over focused modules:
//! [`api::ApiClient`] (requests) uses [`chunk::ChunkDecoder`] (bytes → text
//! fragments) and [`upload`] (multipart body with byte progress), and
//! implements the [`transport::Transport`] trait the runtime consumes.
//!
//! ## Crate Position
//!
//! Sits between `quill-core` (vocabulary) and `quill-runtime` (the
//! reconciliation engine). Nothing in here mutates session state; this crate
//! only opens requests and turns responses into fragments, receipts, and
//! typed errors.

#![deny(unsafe_code)]

pub mod api;
pub mod chunk;
pub mod error;
pub mod transport;
pub mod upload;

pub use api::ApiClient;
pub use chunk::ChunkDecoder;
pub use error::{ClientError, ClientResult};
pub use transport::{
    ChatStream, ChatStreamRequest, ProgressFn, RemoteMessage, RemoteSession, Transport, UploadFile,
};
