//! # Ratesync Core
//!
//! Keeps one playback speed consistent across many independent browsing
//! contexts. Any context may change the speed optimistically; a single
//! broker owns the authoritative record and fans every change out.
//!
//! ## Overview
//!
//! - **Synchronization broker**: sole writer of the shared state record,
//!   broadcasts changes directly and again on every store change
//! - **Control agents**: one per context; discover media elements, enforce
//!   the authoritative speed on them, decode hotkeys, drive the feedback
//!   surface
//! - **Peripheral clients**: quick panel and settings editor, speaking the
//!   same request contract
//! - **In-process infrastructure**: memory store, context hub and broker
//!   handle for single-process hosts and tests
//!
//! Convergence is last-writer-wins on the store. Nothing in the
//! synchronization path is fatal: an unreachable context simply misses a
//! delivery and catches up on the next one.
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ratesync_core::{
//!     agent::ControlAgent,
//!     broker::SyncBroker,
//!     infra::{BrokerHandle, ContextHub, MemoryDocument, MemoryStore},
//! };
//!
//! # async fn demo() {
//! let store = Arc::new(MemoryStore::default());
//! let hub = ContextHub::default();
//! let broker = SyncBroker::new(store.clone(), Arc::new(hub.clone()));
//! broker.initialize().await.ok();
//!
//! let (handle, requests) = BrokerHandle::channel(128);
//! tokio::spawn(broker.run(requests));
//!
//! let (document, events) = MemoryDocument::new();
//! document.add_media();
//! let (context, inbox) = hub.register();
//! let agent = ControlAgent::new(context, document, Arc::new(handle), store);
//! tokio::spawn(agent.run(inbox, events));
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Per-context control agent: discovery, enforcement, hotkeys, feedback
pub mod agent;

/// Synchronization broker
pub mod broker;

/// Quick panel and settings editor
pub mod clients;

/// Error types
pub mod error;

/// In-process store, context hub, broker handle and scripted document
pub mod infra;

/// Store and messaging ports
pub mod ports;

/// Message contract and wire codec
pub mod protocol;

pub use error::{CoreError, Result};
