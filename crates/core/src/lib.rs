//! Core domain logic for the ComfyUI job relay.
//!
//! Pure functions and types shared by the backend client and the worker:
//! the job model, request schemas and their evaluator, error
//! classification, and the result envelopes returned to the job queue.
//! Nothing in this crate performs network I/O.

pub mod envelope;
pub mod error;
pub mod job;
pub mod types;
pub mod validation;
