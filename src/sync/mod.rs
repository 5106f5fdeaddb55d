//! Synchronous MySQL client.

mod conn;
mod framer;
mod result_stream;
mod stream;

pub use conn::{Conn, ConnectionState};
pub use framer::Framer;
pub use result_stream::ResultStream;
pub use stream::{Stream, TcpConnector};
