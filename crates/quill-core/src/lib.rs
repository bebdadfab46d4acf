//! # quill-core
//!
//! Foundation types for the Quill document-chat client.
//!
//! This crate provides the shared vocabulary the other Quill crates depend on:
//!
//! - **Branded IDs**: [`ids::SessionId`], [`ids::MessageId`] as newtypes
//! - **Messages**: [`message::Message`] with role, content, and streaming flag;
//!   [`message::Session`] holding the ordered message log
//! - **Events**: [`events::ChatEvent`] broadcast to presentation layers
//! - **Logging**: [`logging::init`] for `tracing` subscriber setup
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `quill-client`, `quill-settings`, and
//! `quill-runtime`.

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod logging;
pub mod message;
