//! Byte channel and connector abstractions.
//!
//! The connection never opens sockets itself: it asks its [`Connector`] for a
//! fresh [`Channel`] on connect and on every reconnect.

use std::io;

use crate::error::Result;

/// A blocking, bidirectional byte stream.
pub trait Channel {
    /// Read exactly `buf.len()` bytes.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Returns false once the channel is known to be closed.
    ///
    /// A closed channel makes the next command reconnect.
    fn is_open(&self) -> bool {
        true
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Opens channels to the server.
pub trait Connector {
    fn connect(&mut self) -> Result<Box<dyn Channel>>;
}

impl<F, C> Connector for F
where
    F: FnMut() -> io::Result<C>,
    C: Channel + 'static,
{
    fn connect(&mut self) -> Result<Box<dyn Channel>> {
        Ok(Box::new(self()?))
    }
}
