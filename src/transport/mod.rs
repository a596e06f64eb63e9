//! TCP transport built on the reactor.
//!
//! - [`Server`]: non-blocking listener handing out accepted connections
//! - [`FramedStream`]: newline-framed message stream over one connection

pub mod server;
pub mod stream;

pub use server::{ConnectionListener, Server};
pub use stream::{FramedStream, MessageListener, MESSAGE_BOUNDARY, READ_CHUNK_SIZE};
