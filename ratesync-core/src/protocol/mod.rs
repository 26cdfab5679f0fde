//! Message contract exchanged between the broker and every context.

mod context;
pub mod messages;
pub mod wire;

pub use context::ContextId;
pub use messages::{
    Ack, BrokerRequest, BrokerResponse, ContextMessage, SetSpeedResponse,
    StateSnapshot,
};
