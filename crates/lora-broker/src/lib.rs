//! lora-broker — router and handler stream registrations.
//!
//! Routers and handlers connect to a broker and keep one outbound stream
//! open each. The broker delivers downlinks to routers and deduplicated
//! uplinks to the handler responsible for the application.

mod broker;

pub use broker::{Broker, BrokerError};
