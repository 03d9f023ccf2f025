//! # flexstore Testkit
//!
//! Test utilities for flexstore backends.
//!
//! This crate provides:
//! - Fixtures holding initialized backends with automatic cleanup
//! - Property-based test generators using proptest
//! - A backend-agnostic conformance suite for meta and data backends
//! - Test log output through `tracing-subscriber`
//!
//! ## Usage
//!
//! ```rust
//! use flexstore_testkit::prelude::*;
//!
//! with_memory_meta(|backend| {
//!     run_meta_suite(backend);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use logging::init_test_logging;
