//! ComfyUI HTTP and WebSocket client library.
//!
//! Provides the shared backend HTTP session with its retry policies, the
//! typed REST endpoints used to queue workflows and read back results,
//! WebSocket event parsing, and the completion strategies that wait for
//! a queued workflow to finish and fetch its artifact.

pub mod api;
pub mod backend;
pub mod client;
pub mod completion;
pub mod history;
pub mod messages;
pub mod retry;
