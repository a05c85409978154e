#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # profiling-examples
//!
//! Small, independent examples of defensive checks, timing and profiling.
//! Each example is a routine registered by name in [`registry::DEMOS`] and
//! run through [`registry::dispatch`].
//!
//! Two examples depend on optional facilities (Cargo features
//! `line-memory` and `process-memory`). Without them the examples print a
//! warning and return instead of failing.

pub mod alloc_trace;
pub mod callgraph;
pub mod checks;
pub mod config;
pub mod context;
pub mod demos;
pub mod error;
pub mod facility;
pub mod heap;
pub mod line_memory;
pub mod process_memory;
pub mod registry;
pub mod timing;
pub mod workload;

pub use config::DemoConfig;
pub use context::DemoContext;
pub use error::{DemoError, Result};
pub use facility::{Facilities, Facility};
pub use registry::{DEMOS, DemoEntry, Dispatch, dispatch, lookup, names};
