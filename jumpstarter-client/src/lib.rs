//  LIB.rs
//
//  Description:
//!   The client library (§4.7, §4.9): the allow-listed driver proxy tree
//!   and the lease client it's built on top of.

pub mod config;
pub mod errors;
pub mod lease;
pub mod proxy;

pub use errors::CliError;
pub use lease::{LeaseClient, RouterAssignment};
pub use proxy::{AllowList, DriverProxy};
