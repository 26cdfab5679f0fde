//! In-process implementations of the ports, used by single-process hosts,
//! the CLI simulation and the test suites.

pub mod broker_handle;
pub mod hub;
pub mod memory;

pub use broker_handle::{BrokerEnvelope, BrokerHandle};
pub use hub::ContextHub;
pub use memory::{MemoryDocument, MemoryMedia, MemoryStore, OverlaySnapshot};
