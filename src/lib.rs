//! Grade aggregation engine for an academic-records portal.
//!
//! Raw evaluation/grade records are normalized ([`normalize`]), folded into
//! weighted subject averages ([`calc`]) and aggregated into a per-student
//! academic summary ([`summary`]). [`lifecycle`] validates and applies
//! professor-side changes to a subject's evaluations. All of it is pure: no
//! I/O, no shared state. [`ipc`] exposes the same operations as a JSON-lines
//! sidecar.

pub mod calc;
pub mod config;
pub mod error;
pub mod ipc;
pub mod lifecycle;
pub mod model;
pub mod normalize;
pub mod summary;
pub mod term;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
