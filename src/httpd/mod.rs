//! HTTP shim in front of the loan decoder.

pub mod context;
pub mod error;
pub mod routes;
pub mod server;
