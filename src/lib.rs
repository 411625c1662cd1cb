//! Dispatch core of a ride-hailing platform.
//!
//! Matches ride requests to available drivers, tracks each ride through its
//! lifecycle and settles the fare through a composable pricing pipeline. The
//! entry point is [`service::DispatchService`].

pub mod acceptance;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod matching;
pub mod models;
pub mod pricing;
pub mod ride;
pub mod service;

// Re-export commonly used types
pub use config::DispatchConfig;
pub use error::{DispatchError, DispatchResult, ExhaustionReason};
pub use service::DispatchService;
