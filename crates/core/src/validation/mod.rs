//! Request validation.
//!
//! Static schemas, a pure evaluator, and the three-layer job validation
//! (input, api block, endpoint payload) that precedes any backend call.

pub mod evaluator;
pub mod request;
pub mod schema;
pub mod schemas;

pub use evaluator::validate;
pub use request::{validate_graph_job, validate_job};
