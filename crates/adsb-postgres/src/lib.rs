//! PostgreSQL storage: pooled client, schema bootstrap and the batched
//! relational sink.

mod client;
mod schema;
mod sink;

pub use client::{PostgresClient, PostgresSettings};
pub use schema::ensure_schema;
pub use sink::RelationalSink;
