//! LoRa routing core integration tests.
//!
//! Everything runs in-process: a router, a static directory and brokers
//! that keep device state in real stores. No network or external services
//! are needed.
//!
//!   cargo test --test integration
//!
//! Set RUST_LOG=debug to see the race decisions.

mod infra;

mod activation;
mod stores;

pub use infra::*;
