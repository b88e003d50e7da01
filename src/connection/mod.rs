//! Connection lifecycle management.

mod manager;

pub use manager::{ConnectionGuard, ConnectionState};
