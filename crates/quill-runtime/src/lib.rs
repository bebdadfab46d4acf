//! # quill-runtime
//!
//! Streaming session reconciliation engine for the Quill chat client.
//!
//! Sits between a presentation layer and the remote chat service: consumes
//! token streams, paces their visual reveal ([`reveal::RevealScheduler`]),
//! keeps the session message log consistent under interleaved updates
//! ([`store::SessionStore`]), coordinates sequential document uploads with
//! monotonic batch progress ([`upload::UploadCoordinator`]), and fires
//! one-shot title generation. [`chat::ChatRuntime`] is the single entry
//! point that sequences all of it.
//!
//! ## Crate Position
//!
//! Top of the stack: depends on `quill-core` (vocabulary), `quill-client`
//! (the transport seam), and `quill-settings`. Presentation layers depend on
//! this crate and observe it through store snapshots and broadcast events.

#![deny(unsafe_code)]

pub mod chat;
pub mod emitter;
pub mod errors;
pub mod reveal;
pub mod store;
pub mod upload;

pub use chat::{ChatRuntime, RuntimeConfig, SendOutcome, SkipReason, TitleOutcome};
pub use emitter::EventEmitter;
pub use errors::{ChatError, RuntimeResult};
pub use reveal::{RevealMode, RevealScheduler, RevealSink};
pub use store::SessionStore;
pub use upload::{UploadCoordinator, overall_percent};
