//! Top-level facade crate for Beacon.
//!
//! Re-exports the core instrumentation types and the server library so users
//! can depend on a single crate.

pub mod core {
    pub use beacon_core::*;
}

pub mod server {
    pub use beacon_server::*;
}
