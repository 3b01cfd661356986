//! In-process message plumbing between the axon workers and result sinks.

mod message_bus;
mod middleware;
mod transport;

pub use message_bus::{MessageBus, Subscriber, TransportBus};
pub use middleware::{Dispatch, DispatchError, DispatchMiddleware, Handler, Message};
pub use transport::{Listener, MemoryTransport, Transport, TransportError};

use scraping_common::QueryType;

/// Transport channel carrying completed scrapes of one kind.
pub fn results_topic(kind: QueryType) -> String {
    format!("results.{}", kind.source_type())
}

/// Bus topic announcing each served request.
pub const SERVED_TOPIC: &str = "miner.served";
