//! Background daemon: connectivity probe + drain processor + socket server.
//!
//! The daemon is what turns the queue from "reconciled whenever the operator
//! remembers to run `fieldreg sync`" into "reconciled as soon as the device
//! is back online": every offline→online transition triggers exactly one
//! drain pass over the on-device queue.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, DaemonReply, DaemonRequest,
};
pub use runtime::{run, start_blocking, DrainSummary};
