//! # flexstore Semantics
//!
//! Semantics descriptors that parameterize how storage operations behave.
//!
//! A descriptor carries four independent axes: consistency, concurrency,
//! persistency and security. Each axis takes one of an enumerated set of
//! levels; a freshly created descriptor has every axis at its strictest level.
//!
//! Descriptors are shared: cloning a [`Semantics`] hands out another reference
//! to the same instance, and [`Semantics::set`] is observed by every holder.
//! The descriptor carries no behavior of its own. Backends read the axes they
//! care about and ignore the rest.
//!
//! ## Example
//!
//! ```rust
//! use flexstore_semantics::{Axis, Persistency, Semantics};
//!
//! let semantics = Semantics::new();
//! let shared = semantics.share();
//!
//! shared.set_persistency(Persistency::Eventual);
//! assert_eq!(semantics.persistency(), Persistency::Eventual);
//! assert_eq!(semantics.get(Axis::Persistency), Persistency::Eventual.as_code());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod axis;
mod config;
mod error;
mod semantics;
mod template;

pub use axis::{Axis, Concurrency, Consistency, Persistency, Security};
pub use config::SemanticsConfig;
pub use error::{SemanticsError, SemanticsResult};
pub use semantics::{Semantics, SemanticsSnapshot, WeakSemantics};
pub use template::Template;
