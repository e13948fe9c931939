//! Fieldreg core library: domain types, durable queue store, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and domain structs
//! - [`error`]: [`StoreError`]
//! - [`queue`]: the on-device registration queue (append / list / flag)
//! - [`config`]: device configuration (endpoint, timings)
//! - [`session`]: read-only accessor for the signed-in operator

pub mod config;
pub mod error;
pub mod queue;
pub mod session;
pub mod types;

pub use config::Config;
pub use error::StoreError;
pub use session::Session;
pub use types::{Beneficiary, PendingRegistration, QueueFile, RecordId};
