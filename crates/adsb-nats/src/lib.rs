//! NATS publishing: connection handling and the fire-and-forget bus sink.

mod client;
mod sink;
mod traits;

pub use client::NatsClient;
pub use sink::BusSink;
pub use traits::EventPublisher;

#[cfg(any(test, feature = "testing"))]
pub use traits::MockEventPublisher;
