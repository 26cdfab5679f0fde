//! Runtime configuration for ratesync hosts.
//!
//! Channel capacities, the log filter and the settings record seeded into an
//! empty store. Loaded from a file, an inline JSON override or defaults.

#![allow(missing_docs)]

pub mod error;
pub mod runtime;

pub use error::ConfigLoadError;
pub use runtime::{ConfigSource, RuntimeConfig};
