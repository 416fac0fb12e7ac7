pub mod memory_sink;
pub mod middleware;
pub mod pipeline;
pub mod responder;
pub mod server;
pub mod tracing_sink;

/// Re-export commonly used types from adapters
pub use memory_sink::{CapturedEvent, MemorySink};
pub use middleware::*;
pub use pipeline::{Pipeline, Position};
pub use responder::{ClassifyResultExt, handle_error};
pub use server::Server;
pub use tracing_sink::TracingSink;
