//  LIB.rs
//    by Lut99
//
//  Description:
//!   Implements the driver tree, dispatcher, stream multiplexer and
//!   session that together serve the `Exporter` gRPC service (§3-§4.5).
//

// Declare the modules
pub mod dispatch;
pub mod driver;
pub mod handler;
pub mod mocks;
pub mod registry;
pub mod session;
pub mod stream;
pub mod tree;
