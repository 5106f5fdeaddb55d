use std::io::{BufReader, ErrorKind, Read, Write};
use std::net::TcpStream;

use crate::channel::{Channel, Connector};
use crate::error::{Error, Result};
use crate::opts::Opts;

/// Buffered TCP channel.
pub struct Stream {
    inner: BufReader<TcpStream>,
}

impl Stream {
    pub fn tcp(stream: TcpStream) -> Self {
        Self {
            inner: BufReader::new(stream),
        }
    }
}

impl Channel for Stream {
    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.inner.read_exact(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.get_mut().write_all(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.get_mut().flush()
    }

    /// Peeks the socket without blocking: a zero-byte read means the peer
    /// closed it, so the next command reconnects instead of failing.
    fn is_open(&self) -> bool {
        if !self.inner.buffer().is_empty() {
            return true;
        }
        let tcp = self.inner.get_ref();
        if tcp.set_nonblocking(true).is_err() {
            return false;
        }
        let peeked = tcp.peek(&mut [0u8; 1]);
        if tcp.set_nonblocking(false).is_err() {
            return false;
        }
        match peeked {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => matches!(
                e.kind(),
                ErrorKind::WouldBlock | ErrorKind::Interrupted
            ),
        }
    }
}

/// Connects to `opts.host:opts.port` over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    nodelay: bool,
}

impl TcpConnector {
    pub fn new(opts: &Opts) -> Result<Self> {
        if opts.host.is_empty() {
            return Err(Error::Config("host is empty".into()));
        }
        Ok(Self {
            host: opts.host.clone(),
            port: opts.port,
            nodelay: opts.tcp_nodelay,
        })
    }
}

impl Connector for TcpConnector {
    fn connect(&mut self) -> Result<Box<dyn Channel>> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))?;
        tcp.set_nodelay(self.nodelay)?;
        Ok(Box::new(Stream::tcp(tcp)))
    }
}
