//! Async seams between the protocol logic and its collaborators.

pub mod channel;
pub mod store;

pub use channel::{BrokerClient, ContextChannel, DeliveryReport, fan_out};
pub use store::{
    Store, StoreChange, StoreExt, StoreKey, decode_settings, decode_state,
};
