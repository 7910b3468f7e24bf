//! Cashbook Agent
//!
//! A chat bot that keeps a personal income/expense ledger:
//! - Records entries from free-text lines like `14.00 pot` or `-5 coffee`
//! - Tags entries through a short post-entry keyboard window
//! - Renders full, daily and monthly reports as text or PDF
//! - Keeps per-user conversation state in a pluggable store
//!
//! MESSAGE FLOW:
//! TRANSPORT → DISPATCHER (STATE STORE, LEDGER, REPORTS) → REPLY → TRANSPORT

pub mod api;
pub mod clock;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod models;
pub mod report;
pub mod state;
pub mod stores;
pub mod transport;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use command::Command;
pub use dispatcher::Dispatcher;
