//! Fetch Module
//!
//! Network and decoder collaborators, delivery sinks, and the coordinator
//! that ties them to the two cache tiers.

mod coordinator;
mod decoder;
mod sink;
mod transport;

pub use coordinator::{FetchCoordinator, FetchStats, Registration};
pub use decoder::{Decoder, ImageDecoder};
pub use sink::{ChannelSink, OneshotSink, Sink, SinkBindings, SinkId, Ticket};
pub use transport::{ByteStream, HttpTransport, Transport};
