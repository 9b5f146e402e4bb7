pub mod envelope;
pub mod error;
pub mod parser;
pub mod registry;
pub mod sink;

pub use envelope::{Aircraft, Codes, Position, PositionEvent, RawMessage, EVENT_TYPE};
pub use error::{ParseFailure, SinkError, SinkResult};
pub use parser::SbsParser;
pub use registry::{AircraftInfo, AircraftRegistry};
pub use sink::EventSink;

#[cfg(any(test, feature = "testing"))]
pub use sink::MockEventSink;
