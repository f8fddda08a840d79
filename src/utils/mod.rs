//! Utility functions shared across layers.
//!
//! - [`clock`] - Injectable time source
//! - [`client_ip`] - Client address extraction from headers and peer socket
//! - [`db_error`] - SQLx error classification
//! - [`trace_id`] - Request trace identifiers

pub mod client_ip;
pub mod clock;
pub mod db_error;
pub mod trace_id;
