//! Reconnect-forever TCP line reader for the SBS-1 receiver feed.
//!
//! The reader exposes one unbroken lazy sequence of lines; connect failures,
//! mid-stream errors and EOFs are handled internally with a fixed reconnect
//! delay, so the consumer only ever observes a gap in timestamps. There is no
//! terminal failure state short of an explicit shutdown.

mod reader;

pub use reader::{FeedConfig, FeedReader};
