//! Sluice - attribute-filtered event routing
//!
//! Events published to a topic carry classification attributes. Subscriptions
//! pair an allow/deny rule over one attribute with a destination: a durable
//! queue, or an active consumer invoked directly. The bundled rescue consumer
//! forwards payloads missing a required field to a secondary queue.

pub mod bus;
pub mod config;
pub mod consumers;
pub mod event;
pub mod lookup;
pub mod pipeline;
pub mod routing;
pub mod utils;
