//! Fan-out of resource notifications to metric workers.
//!
//! This crate provides:
//! - `Dispatcher`, which selects the handlers a notification applies to and
//!   publishes one worker notification per handler
//! - `DispatchReport`, the per-invocation summary
//! - the `manager-handler` binary wiring it to SNS and the Lambda runtime

pub mod dispatcher;
pub mod error;
pub mod report;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use report::{DispatchReport, DispatchedHandler};
