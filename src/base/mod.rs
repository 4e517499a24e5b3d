//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): error codes shared by the DNS, SNI, HTTP
//!   and crawler layers
//! - [`IoResultExt`](context::IoResultExt): context helpers for I/O results

pub mod context;
pub mod neterror;
