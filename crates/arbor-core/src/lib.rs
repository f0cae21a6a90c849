#![forbid(unsafe_code)]

//! Core: geometry, input events, click classification, deferred timers, and logging.

pub mod click;
pub mod deferred;
pub mod event;
pub mod geometry;
pub mod logging;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, error, info, trace, trace_span, warn};
